//! Repository discovery and the multi-repository index.
//!
//! When several repositories share one output directory, the site root
//! gets an `index.html` listing them. The list is remembered in
//! `<output>/.cache/index` so repositories rendered by earlier runs stay
//! listed when a later run only renders some of them.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::cache::write_atomic;
use crate::git::Signature;

const INDEX_FILE: &str = "index";

/// One repository row of the site index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoSummary {
    pub name: String,
    pub description: Option<String>,
    pub default_ref: Option<String>,
    /// Author of the default ref's tip.
    pub last_author: Option<Signature>,
}

/// Merges freshly rendered repositories into the cached index.
///
/// Entries from `rendered` replace cached entries of the same name. The
/// merged list, sorted by name, is written back and returned.
///
/// # Arguments
///
/// * `cache_dir`: The site's `.cache` directory
/// * `rendered`: Repositories rendered in this run
///
/// # Errors
///
/// Returns error if the merged index cannot be written.
pub fn update_index(cache_dir: &Path, rendered: Vec<RepoSummary>) -> Result<Vec<RepoSummary>> {
    let path = cache_dir.join(INDEX_FILE);
    let mut merged: BTreeMap<String, RepoSummary> = load_index(&path)
        .into_iter()
        .map(|repo| (repo.name.clone(), repo))
        .collect();
    for repo in rendered {
        merged.insert(repo.name.clone(), repo);
    }

    let repos: Vec<RepoSummary> = merged.into_values().collect();
    let json = serde_json::to_vec_pretty(&repos).context("Failed to serialize repository index")?;
    write_atomic(&path, &json)?;
    debug!(repos = repos.len(), "updated repository index");
    Ok(repos)
}

fn load_index(path: &Path) -> Vec<RepoSummary> {
    let Ok(bytes) = fs::read(path) else {
        return Vec::new();
    };
    serde_json::from_slice(&bytes).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "discarding undecodable repository index");
        Vec::new()
    })
}

/// Finds git repositories below `root`.
///
/// A directory holding `HEAD` (bare) or `.git/HEAD` is a repository; its
/// subdirectories are not searched further. Hidden directories are
/// skipped.
///
/// # Errors
///
/// Returns error if `root` cannot be read.
pub fn find_repositories(root: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        if is_repository(&dir) {
            found.push(dir);
            continue;
        }

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if dir.as_path() == root => {
                return Err(e).with_context(|| format!("Failed to read directory: {}", dir.display()));
            }
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "skipping unreadable directory");
                continue;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            if !hidden && path.is_dir() {
                pending.push(path);
            }
        }
    }

    found.sort();
    Ok(found)
}

fn is_repository(dir: &Path) -> bool {
    dir.join("HEAD").is_file() || dir.join(".git").join("HEAD").is_file()
}
