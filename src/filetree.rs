//! File tree emission for one ref.
//!
//! Writes `R/files/` (listing pages and one page per blob) and `R/blobs/`
//! (raw copies). Blob page bodies are cached by blob id and raw copies are
//! hard links into `.cache/blobs`, so content shared between refs or
//! commits is rendered and stored once. A marker holding the last emitted
//! tip lets unchanged refs skip the whole walk.

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::cache::{CacheKey, CacheStore};
use crate::components::file_list::FileRow;
use crate::config::SplitPolicy;
use crate::git::{self, EntryKind, FlatEntry};
use crate::pages::blob::BlobRenderer;
use crate::pages::{self, RepoContext};
use crate::preview::Previews;
use crate::refs::ReferenceInfo;
use crate::tree::{DirNode, FileTree, entry_name, is_submodule};
use crate::util::{relative_root, unhide_path};

const MARKER_NAMESPACE: &str = "filetree";
const BLOB_NAMESPACE: &str = "blobs";
const PAGE_NAMESPACE: &str = "files";

/// Result of one tree emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeOutcome {
    /// Pages were written for this many blobs.
    Emitted { blobs: usize },
    /// The tip matched the marker and the previous output was kept.
    Skipped,
}

/// Everything needed to emit file trees of one repository.
pub struct TreeEmitter<'a> {
    pub repo: &'a gix::Repository,
    pub cache: &'a CacheStore,
    pub ctx: &'a RepoContext,
    pub renderer: &'a BlobRenderer<'a>,
    pub previews: &'a Previews<'a>,
    pub split: SplitPolicy,
}

impl TreeEmitter<'_> {
    /// Emits the file tree of `reference` into `ref_dir`
    ///
    /// Skipped when the stored marker names the same tip, force mode is
    /// off and the root listing exists. Otherwise `files/` and `blobs/`
    /// are rebuilt from scratch so paths deleted since the last run
    /// disappear.
    ///
    /// # Arguments
    ///
    /// * `reference`: Ref whose tip tree is emitted
    /// * `ref_dir`: Output directory of the ref
    /// * `progress`: Bar advanced once per blob
    ///
    /// # Errors
    ///
    /// Returns error if the tree cannot be read or an output file cannot be
    /// written.
    pub fn emit(&self, reference: &ReferenceInfo, ref_dir: &Path, progress: &ProgressBar) -> Result<TreeOutcome> {
        let tip = reference.commit();
        let marker_key = CacheKey::new(MARKER_NAMESPACE, reference.refname())?;
        let marker = tip.id.to_string();
        let files_dir = ref_dir.join("files");
        let blobs_dir = ref_dir.join("blobs");

        let unchanged = self.cache.read_entry(&marker_key).as_deref() == Some(marker.as_bytes())
            && files_dir.join("index.html").is_file();
        if unchanged {
            debug!(refname = reference.refname(), "file tree unchanged");
            progress.finish_and_clear();
            return Ok(TreeOutcome::Skipped);
        }

        for dir in [&files_dir, &blobs_dir] {
            remove_dir(dir)?;
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }

        let entries = git::flatten_tree(self.repo, tip.tree_id)
            .with_context(|| format!("Failed to list tree of {}", reference.name()))?;
        let entries: Vec<FlatEntry> = entries
            .into_iter()
            .filter(|entry| !entry_name(entry).is_empty())
            .collect();
        let tree = FileTree::from_entries(entries);

        let blobs = tree.blobs();
        progress.set_length(blobs.len() as u64);

        let mut sizes = HashMap::with_capacity(blobs.len());
        for entry in &blobs {
            let size = self
                .emit_blob(entry, &files_dir, &blobs_dir)
                .with_context(|| format!("Failed to emit {} in {}", entry.path, reference.name()))?;
            sizes.insert(entry.path.as_str(), size);
            progress.inc(1);
        }

        self.emit_listing(reference.name(), tree.root(), "", &files_dir, &sizes)?;

        self.cache.write_entry(&marker_key, marker.as_bytes())?;
        progress.finish_and_clear();
        Ok(TreeOutcome::Emitted { blobs: blobs.len() })
    }

    /// Writes the raw copy and the page of one blob, returning its size.
    fn emit_blob(&self, entry: &FlatEntry, files_dir: &Path, blobs_dir: &Path) -> Result<u64> {
        let data = git::read_blob(self.repo, entry.oid)?;
        let path = unhide_path(&entry.path);
        let name = entry_name(entry);

        let raw_target = blobs_dir.join(&path);
        self.write_raw(&entry.oid, &data, &raw_target)?;

        let raw_href = format!(
            "{}blobs/{}",
            relative_root(1 + entry.path.matches('/').count()),
            path
        );
        let preview = if self.previews.is_positional(name) {
            self.previews.render(name, &entry.oid, &data, &raw_href)
        } else {
            None
        };

        let key = page_key(&entry.oid, name)?;
        let mut body = Vec::new();
        self.cache.cached_render(&mut body, &key, |w| {
            let markup = self.renderer.body(name, &entry.oid, &data);
            w.write_all(markup.0.as_bytes())?;
            Ok(())
        })?;

        let page = pages::blob::generate(
            self.ctx,
            &entry.path,
            data.len() as u64,
            &raw_href,
            preview,
            &String::from_utf8_lossy(&body),
        );
        pages::write_page(&files_dir.join(format!("{}.html", path)), &page)?;
        Ok(data.len() as u64)
    }

    /// Stores the blob once under `.cache/blobs` and links it into place.
    fn write_raw(&self, oid: &gix::ObjectId, data: &[u8], target: &Path) -> Result<()> {
        let key = CacheKey::new(BLOB_NAMESPACE, oid.to_string())?;
        let stored = self.cache.path(&key);
        if self.cache.force() || !stored.is_file() {
            self.cache.write_entry(&key, data)?;
        }

        if let Some(dir) = target.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
        if let Err(e) = fs::hard_link(&stored, target) {
            debug!(target = %target.display(), error = %e, "hard link failed, copying");
            fs::write(target, data)
                .with_context(|| format!("Failed to write raw file: {}", target.display()))?;
        }
        Ok(())
    }

    /// Writes the listing page of `dir_path` and of every split child.
    fn emit_listing(
        &self,
        ref_name: &str,
        node: &DirNode,
        dir_path: &str,
        files_dir: &Path,
        sizes: &HashMap<&str, u64>,
    ) -> Result<()> {
        let mut rows = Vec::new();
        let mut split = Vec::new();
        self.collect_rows(node, dir_path, "", sizes, &mut rows, &mut split);

        let page = pages::tree::generate(self.ctx, ref_name, dir_path, &rows);
        let mut target = PathBuf::from(files_dir);
        if !dir_path.is_empty() {
            target.push(unhide_path(dir_path));
        }
        pages::write_page(&target.join("index.html"), &page)?;

        for (child_path, child) in split {
            self.emit_listing(ref_name, child, &child_path, files_dir, sizes)?;
        }
        Ok(())
    }

    /// Builds the rows of one listing page.
    ///
    /// Directories the split policy keeps inline contribute their entries
    /// as `child/name` rows; split directories become a single link row
    /// and are returned through `split` for their own page.
    fn collect_rows<'n>(
        &self,
        node: &'n DirNode,
        dir_path: &str,
        rel: &str,
        sizes: &HashMap<&str, u64>,
        rows: &mut Vec<FileRow>,
        split: &mut Vec<(String, &'n DirNode)>,
    ) {
        for (name, child) in node.subdirs() {
            let child_path = join(dir_path, name);
            let rel_name = join(rel, name);
            if self.split.splits(child.file_count()) {
                rows.push(FileRow {
                    mode: EntryKind::Tree.mode_string(),
                    href: Some(format!("{}/index.html", unhide_path(&rel_name))),
                    name: rel_name,
                    suffix: None,
                    size: None,
                });
                split.push((child_path, child));
            } else {
                self.collect_rows(child, &child_path, &rel_name, sizes, rows, split);
            }
        }

        for entry in node.files() {
            let rel_name = join(rel, entry_name(entry));
            if is_submodule(entry) {
                rows.push(FileRow {
                    mode: entry.kind.mode_string(),
                    name: rel_name,
                    href: None,
                    suffix: Some(format!("@ {}", entry.oid)),
                    size: None,
                });
            } else {
                rows.push(FileRow {
                    mode: entry.kind.mode_string(),
                    href: Some(format!("{}.html", unhide_path(&rel_name))),
                    name: rel_name,
                    suffix: None,
                    size: sizes.get(entry.path.as_str()).copied(),
                });
            }
        }
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

fn remove_dir(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "failed to clear previous output");
            Err(e).with_context(|| format!("Failed to remove directory: {}", dir.display()))
        }
    }
}

/// Cache key of a rendered blob page body.
///
/// The body depends on the content and on the file name, which selects the
/// syntax; the name enters through a digest so any name yields a valid
/// key of bounded length.
fn page_key(oid: &gix::ObjectId, name: &str) -> Result<CacheKey> {
    let digest = gix::objs::compute_hash(oid.kind(), gix::objs::Kind::Blob, name.as_bytes());
    CacheKey::new(PAGE_NAMESPACE, format!("{}-{}", oid, digest.to_hex_with_len(16)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_key_accepts_any_name() -> Result<()> {
        // Arrange
        let oid = gix::ObjectId::empty_blob(gix::hash::Kind::Sha1);
        let long = "n".repeat(224);

        // Act
        let backslash = page_key(&oid, "a\\b.txt")?;
        let long_key = page_key(&oid, &long)?;
        let other = page_key(&oid, "b.txt")?;

        // Assert
        assert_eq!(long_key.id().len(), 40 + 1 + 16);
        assert!(backslash.id().starts_with(&oid.to_string()));
        assert_ne!(backslash.id(), other.id());
        assert_eq!(page_key(&oid, "b.txt")?.id(), other.id());
        Ok(())
    }

    #[test]
    fn test_join_paths() {
        assert_eq!(join("", "src"), "src");
        assert_eq!(join("src", "bin"), "src/bin");
    }

    #[test]
    fn test_remove_missing_dir_is_ok() {
        // Arrange
        let dir = tempfile::TempDir::new().expect("tempdir");

        // Act
        let result = remove_dir(&dir.path().join("absent"));

        // Assert
        assert!(result.is_ok());
    }
}
