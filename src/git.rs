//! Git repository operations.
//!
//! Thin layer over `gix` exposing the handful of primitives the renderer
//! needs: commit headers, history walks, tree listings and blob reads.

use anyhow::{Context, Result, anyhow};
use gix::bstr::ByteSlice;
use gix::objs::tree::EntryKind as GixEntryKind;
use gix::traverse::commit::simple::Sorting;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Bytes inspected by the NUL byte heuristic (the same window git uses).
const BINARY_CHECK_LEN: usize = 8000;

/// Opens a repository for use from several worker threads.
///
/// A path ending in `.git` is first tried as a git directory; when that
/// fails and it holds a `.git` entry it is opened as a work tree.
///
/// # Errors
///
/// Returns error if no repository exists at `path`.
pub fn open_repository(path: impl AsRef<Path>) -> Result<gix::ThreadSafeRepository> {
    let path = path.as_ref();
    let repo = match gix::open(path) {
        Ok(repo) => repo,
        Err(err) => {
            let dot_git = path.join(".git");
            if !dot_git.exists() {
                return Err(err)
                    .with_context(|| format!("Failed to open repository at {}", path.display()));
            }
            gix::open(&dot_git)
                .with_context(|| format!("Failed to open repository at {}", path.display()))?
        }
    };
    Ok(repo.into_sync())
}

/// Derives a display name from the repository directory.
///
/// `project.git` and `project/.git` both become `project`.
///
/// # Errors
///
/// Returns error if the path has no usable final component.
pub fn repository_name(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let resolved = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let resolved = if resolved.file_name().is_some_and(|n| n == ".git") {
        resolved.parent().map(Path::to_path_buf).unwrap_or(resolved)
    } else {
        resolved
    };

    let name = resolved
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| {
            format!(
                "Cannot determine repository name from path: {}",
                resolved.display()
            )
        })?;
    Ok(name.strip_suffix(".git").unwrap_or(name).to_string())
}

/// Reads the repository's `description` file, ignoring git's placeholder.
pub fn description(repo: &gix::Repository) -> Option<String> {
    let text = fs::read_to_string(repo.git_dir().join("description")).ok()?;
    let text = text.trim();
    if text.is_empty() || text.starts_with("Unnamed repository") {
        return None;
    }
    Some(text.to_string())
}

/// Short name of the branch HEAD points at, if HEAD is not detached.
pub fn head_branch(repo: &gix::Repository) -> Option<String> {
    let head = repo.head_ref().ok()??;
    head.name().shorten().to_str().ok().map(str::to_string)
}

/// Commit author or committer.
///
/// `valid` is false when the signature could not be decoded; the other
/// fields are empty in that case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub email: String,
    /// Seconds since the Unix epoch.
    pub time: i64,
    /// Timezone offset in seconds east of UTC.
    pub offset: i32,
    pub valid: bool,
}

impl Signature {
    fn from_ref(sig: gix::actor::SignatureRef<'_>) -> Self {
        Self {
            name: sig.name.to_str_lossy().to_string(),
            email: sig.email.to_str_lossy().to_string(),
            time: sig.time.seconds,
            offset: sig.time.offset,
            valid: true,
        }
    }

    fn decode<E>(sig: std::result::Result<gix::actor::SignatureRef<'_>, E>) -> Self {
        sig.map(Self::from_ref).unwrap_or_default()
    }
}

/// Commit header fields, without any diff information.
#[derive(Debug, Clone)]
pub struct CommitHeader {
    pub id: gix::ObjectId,
    pub parent_id: Option<gix::ObjectId>,
    pub tree_id: gix::ObjectId,
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
}

impl CommitHeader {
    /// First line of the message.
    pub fn summary(&self) -> &str {
        summary_of(&self.message)
    }
}

/// First non-empty line of a commit message, trimmed.
pub fn summary_of(message: &str) -> &str {
    message
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("")
}

/// Reads the header of commit `id`.
///
/// # Errors
///
/// Returns error if the object is missing or not a commit.
pub fn read_commit(repo: &gix::Repository, id: gix::ObjectId) -> Result<CommitHeader> {
    let commit = repo
        .find_object(id)
        .with_context(|| format!("Failed to find commit {}", id))?
        .try_into_commit()
        .with_context(|| format!("Object {} is not a commit", id))?;

    let tree_id = commit
        .tree_id()
        .with_context(|| format!("Failed to read tree of commit {}", id))?
        .detach();
    let parent_id = commit.parent_ids().next().map(|p| p.detach());
    let message = commit
        .message_raw()
        .with_context(|| format!("Failed to read message of commit {}", id))?
        .to_str_lossy()
        .to_string();

    Ok(CommitHeader {
        id,
        parent_id,
        tree_id,
        author: Signature::decode(commit.author()),
        committer: Signature::decode(commit.committer()),
        message,
    })
}

/// Ids of every commit reachable from `tip`, `tip` included, newest first
/// by commit time.
///
/// # Errors
///
/// Returns error if the walk cannot start or any commit cannot be read.
pub fn ancestors(repo: &gix::Repository, tip: gix::ObjectId) -> Result<Vec<gix::ObjectId>> {
    repo.rev_walk([tip])
        .sorting(Sorting::ByCommitTimeNewestFirst)
        .all()
        .with_context(|| format!("Failed to walk history of {}", tip))?
        .map(|info| {
            info.map(|info| info.id)
                .with_context(|| format!("Failed to walk history of {}", tip))
        })
        .collect()
}

/// Kind of a tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    Tree,
    Blob,
    Executable,
    Link,
    Submodule,
}

impl EntryKind {
    fn from_gix(kind: GixEntryKind) -> Self {
        match kind {
            GixEntryKind::Tree => Self::Tree,
            GixEntryKind::Blob => Self::Blob,
            GixEntryKind::BlobExecutable => Self::Executable,
            GixEntryKind::Link => Self::Link,
            GixEntryKind::Commit => Self::Submodule,
        }
    }

    /// `ls -l` style mode column.
    pub fn mode_string(self) -> &'static str {
        match self {
            Self::Tree => "d---------",
            Self::Blob => "-rw-r--r--",
            Self::Executable => "-rwxr-xr-x",
            Self::Link => "lrwxrwxrwx",
            Self::Submodule => "m---------",
        }
    }

    /// Permission bits used when writing archive entries.
    pub fn unix_mode(self) -> u32 {
        match self {
            Self::Tree | Self::Executable => 0o755,
            Self::Blob => 0o644,
            Self::Link | Self::Submodule => 0o777,
        }
    }

    /// Whether the entry's object is a blob (regular file or symlink).
    pub fn is_blob(self) -> bool {
        matches!(self, Self::Blob | Self::Executable | Self::Link)
    }
}

/// One entry of a tree object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub name: String,
    pub oid: gix::ObjectId,
    pub kind: EntryKind,
}

/// Lists the immediate entries of tree `tree_id` in tree order.
///
/// Entries with an empty name are skipped.
///
/// # Errors
///
/// Returns error if the tree cannot be read or decoded.
pub fn tree_entries(repo: &gix::Repository, tree_id: gix::ObjectId) -> Result<Vec<TreeEntry>> {
    let tree = repo
        .find_object(tree_id)
        .with_context(|| format!("Failed to find tree {}", tree_id))?
        .try_into_tree()
        .with_context(|| format!("Object {} is not a tree", tree_id))?;
    let decoded = tree
        .decode()
        .with_context(|| format!("Failed to decode tree {}", tree_id))?;

    Ok(decoded
        .entries
        .iter()
        .filter(|entry| !entry.filename.is_empty())
        .map(|entry| TreeEntry {
            name: entry.filename.to_str_lossy().to_string(),
            oid: entry.oid.to_owned(),
            kind: EntryKind::from_gix(entry.mode.kind()),
        })
        .collect())
}

/// A non-directory entry reached by walking a tree recursively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatEntry {
    /// Slash separated path from the tree root.
    pub path: String,
    pub oid: gix::ObjectId,
    pub kind: EntryKind,
}

/// Walks tree `tree_id` depth first and returns every non-tree entry.
///
/// # Errors
///
/// Returns error if any tree on the way cannot be read.
pub fn flatten_tree(repo: &gix::Repository, tree_id: gix::ObjectId) -> Result<Vec<FlatEntry>> {
    let mut entries = Vec::new();
    flatten_into(repo, tree_id, "", &mut entries)?;
    Ok(entries)
}

fn flatten_into(
    repo: &gix::Repository,
    tree_id: gix::ObjectId,
    prefix: &str,
    out: &mut Vec<FlatEntry>,
) -> Result<()> {
    for entry in tree_entries(repo, tree_id)? {
        let path = if prefix.is_empty() {
            entry.name
        } else {
            format!("{}/{}", prefix, entry.name)
        };
        if entry.kind == EntryKind::Tree {
            flatten_into(repo, entry.oid, &path, out)?;
        } else {
            out.push(FlatEntry {
                path,
                oid: entry.oid,
                kind: entry.kind,
            });
        }
    }
    Ok(())
}

/// Reads blob `oid`.
///
/// # Errors
///
/// Returns error if the object is missing or not a blob.
pub fn read_blob(repo: &gix::Repository, oid: gix::ObjectId) -> Result<Vec<u8>> {
    let blob = repo
        .find_object(oid)
        .with_context(|| format!("Failed to find blob {}", oid))?
        .try_into_blob()
        .with_context(|| format!("Object {} is not a blob", oid))?;
    Ok(blob.data.to_vec())
}

/// Looks up a file by path in `tree_id`.
///
/// Returns `None` when the path does not exist or is not a blob; only
/// backend failures are errors.
///
/// # Errors
///
/// Returns error if the tree cannot be traversed or the blob read.
pub fn find_blob_by_path(
    repo: &gix::Repository,
    tree_id: gix::ObjectId,
    path: &str,
) -> Result<Option<(gix::ObjectId, Vec<u8>)>> {
    let mut tree = repo
        .find_object(tree_id)
        .with_context(|| format!("Failed to find tree {}", tree_id))?
        .try_into_tree()
        .with_context(|| format!("Object {} is not a tree", tree_id))?;

    let Some(entry) = tree
        .peel_to_entry_by_path(path)
        .with_context(|| format!("Failed to traverse tree to {}", path))?
    else {
        return Ok(None);
    };

    let mode = entry.mode();
    if mode.is_tree() || mode.is_commit() {
        return Ok(None);
    }
    let oid = entry.object_id();
    let data = read_blob(repo, oid)?;
    Ok(Some((oid, data)))
}

/// Git's binary heuristic: a NUL byte within the first 8000 bytes.
pub fn is_binary(data: &[u8]) -> bool {
    data.iter().take(BINARY_CHECK_LEN).any(|&b| b == 0)
}

/// Parses a hex object id.
///
/// # Errors
///
/// Returns error if `hex` is not a valid object id.
pub fn parse_oid(hex: &str) -> Result<gix::ObjectId> {
    gix::ObjectId::from_hex(hex.as_bytes()).map_err(|e| anyhow!("Invalid object id '{}': {}", hex, e))
}
