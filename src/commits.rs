//! Commit history materialization with two cache tiers.
//!
//! The in-memory arena maps commit ids to shared `CommitInfo` values for the
//! length of one run, so a commit reachable from several refs is diffed
//! once. The on-disk tier (`diffs` namespace) keeps every materialized
//! commit as JSON so later runs skip diffing altogether.
//!
//! Parent links are id keys into the arena rather than owning pointers.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

use crate::cache::{CacheKey, CacheStore};
use crate::diff::{CommitInfo, get_diff};
use crate::git;

const DIFF_NAMESPACE: &str = "diffs";

/// Shared commit arena for one run.
pub struct CommitStore<'a> {
    cache: &'a CacheStore,
    arena: Mutex<HashMap<String, Arc<CommitInfo>>>,
    computed: AtomicUsize,
    disk_hits: AtomicUsize,
}

impl<'a> CommitStore<'a> {
    pub fn new(cache: &'a CacheStore) -> Self {
        Self {
            cache,
            arena: Mutex::new(HashMap::new()),
            computed: AtomicUsize::new(0),
            disk_hits: AtomicUsize::new(0),
        }
    }

    /// Looks up a commit already materialized in this run.
    pub fn get(&self, id: &str) -> Option<Arc<CommitInfo>> {
        self.arena.lock().get(id).cloned()
    }

    /// Number of commits in the arena.
    pub fn len(&self) -> usize {
        self.arena.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Diffs computed from the backend during this run.
    pub fn computed(&self) -> usize {
        self.computed.load(Ordering::Relaxed)
    }

    /// Commits loaded from the on-disk cache during this run.
    pub fn disk_hits(&self) -> usize {
        self.disk_hits.load(Ordering::Relaxed)
    }

    /// Returns the `CommitInfo` for `id`, materializing it if needed.
    ///
    /// Lookup order is arena, disk cache, backend. Results from the latter
    /// two are inserted into the arena; a diff computed from the backend is
    /// also written to disk. Two tasks racing on the same id compute the
    /// same value, and the first insert wins.
    ///
    /// # Errors
    ///
    /// Returns error if the diff cannot be computed.
    pub fn materialize(&self, repo: &gix::Repository, id: gix::ObjectId) -> Result<Arc<CommitInfo>> {
        let hex = id.to_string();
        if let Some(info) = self.get(&hex) {
            return Ok(info);
        }

        let key = CacheKey::new(DIFF_NAMESPACE, hex.as_str())?;
        let info = match self.load(&key) {
            Some(info) => {
                self.disk_hits.fetch_add(1, Ordering::Relaxed);
                info
            }
            None => {
                let info = get_diff(repo, id)?;
                self.computed.fetch_add(1, Ordering::Relaxed);
                let json = serde_json::to_vec(&info)
                    .with_context(|| format!("Failed to serialize commit {}", hex))?;
                self.cache.write_entry(&key, &json)?;
                info
            }
        };

        let mut arena = self.arena.lock();
        let shared = arena.entry(hex).or_insert_with(|| Arc::new(info));
        Ok(Arc::clone(shared))
    }

    fn load(&self, key: &CacheKey) -> Option<CommitInfo> {
        let bytes = self.cache.read_entry(key)?;
        match serde_json::from_slice(&bytes) {
            Ok(info) => Some(info),
            Err(e) => {
                warn!(commit = key.id(), error = %e, "discarding undecodable diff cache entry");
                None
            }
        }
    }
}

/// Commits of one ref, newest first.
#[derive(Debug, Clone)]
pub struct History {
    commits: Vec<Arc<CommitInfo>>,
    total: usize,
}

impl History {
    /// Listed commits, possibly truncated.
    pub fn commits(&self) -> &[Arc<CommitInfo>] {
        &self.commits
    }

    /// Commits reachable from the tip.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Commits reachable but not listed.
    pub fn left_out(&self) -> usize {
        self.total.saturating_sub(self.commits.len())
    }
}

/// Lists every ancestor of `tip`, newest first by commit time.
///
/// Merged side branches are included. Stops after `max_commits` entries
/// when that is non-zero; `total` still counts the whole walk. Commits
/// already in the arena are reused without touching the disk cache or the
/// backend.
///
/// # Arguments
///
/// * `repo`: Repository handle for this worker
/// * `tip`: Commit the ref resolves to
/// * `store`: Arena shared by all refs of the run
/// * `max_commits`: Listing limit, 0 for unlimited
///
/// # Errors
///
/// Returns error if the walk fails or a listed commit cannot be
/// materialized.
pub fn get_commits(
    repo: &gix::Repository,
    tip: gix::ObjectId,
    store: &CommitStore<'_>,
    max_commits: usize,
) -> Result<History> {
    let ids = git::ancestors(repo, tip)?;
    let total = ids.len();
    let limit = if max_commits == 0 { usize::MAX } else { max_commits };

    let mut reused = 0;
    let mut commits = Vec::with_capacity(total.min(limit));
    for id in ids.into_iter().take(limit) {
        let info = match store.get(&id.to_string()) {
            Some(info) => {
                reused += 1;
                info
            }
            None => store.materialize(repo, id)?,
        };
        commits.push(info);
    }
    if reused > 0 {
        debug!(tip = %tip, reused, "history reused arena commits");
    }

    Ok(History { commits, total })
}

#[cfg(test)]
impl History {
    pub(crate) fn new_for_test(commits: Vec<Arc<CommitInfo>>, total: usize) -> Self {
        Self { commits, total }
    }
}
