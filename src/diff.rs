//! Per-commit diff computation.
//!
//! A commit is compared with its first parent (root commits with the empty
//! tree) using gix's tree diff; renames and copies are detected by exact
//! object id only. Line statistics
//! and hunks come from a histogram diff of each changed text blob.

use anyhow::{Context, Result};
use gix::bstr::ByteSlice;
use gix::diff::blob::intern::InternedInput;
use gix::diff::blob::{Algorithm, Sink};
use gix::diff::Rewrites;
use gix::object::tree::EntryMode;
use gix::object::tree::diff::change::Event;
use gix::object::tree::diff::{Action, Change};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::convert::Infallible;
use std::ops::Range;

use crate::git::{self, CommitHeader, Signature};

/// Lines of unchanged context around each hunk.
const CONTEXT_LINES: u32 = 3;

/// Deltas with more lines than this keep their counts but drop their hunks.
const MAX_HUNK_LINES: usize = 200_000;

/// How a path changed between parent and commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaStatus {
    Added,
    Deleted,
    Modified,
    Renamed,
    Copied,
    TypeChanged,
}

impl DeltaStatus {
    /// Single letter used in diffstat tables.
    pub fn letter(self) -> char {
        match self {
            Self::Added => 'A',
            Self::Deleted => 'D',
            Self::Modified => 'M',
            Self::Renamed => 'R',
            Self::Copied => 'C',
            Self::TypeChanged => 'T',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineOrigin {
    Context,
    Addition,
    Deletion,
}

impl LineOrigin {
    pub fn marker(self) -> char {
        match self {
            Self::Context => ' ',
            Self::Addition => '+',
            Self::Deletion => '-',
        }
    }
}

/// One line of a hunk with its position on either side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineChange {
    pub origin: LineOrigin,
    pub old_line: Option<u32>,
    pub new_line: Option<u32>,
    pub content: String,
}

/// Contiguous block of changed lines plus surrounding context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hunk {
    pub header: String,
    pub lines: Vec<LineChange>,
}

/// One changed path within a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaInfo {
    pub old_path: String,
    pub new_path: String,
    pub status: DeltaStatus,
    /// Binary deltas carry zero line counts and no hunks.
    pub binary: bool,
    pub added_lines: usize,
    pub deleted_lines: usize,
    pub hunks: Vec<Hunk>,
}

impl DeltaInfo {
    /// Path shown for the delta: the new path unless the file was deleted.
    pub fn path(&self) -> &str {
        if self.status == DeltaStatus::Deleted {
            &self.old_path
        } else {
            &self.new_path
        }
    }
}

/// A commit together with its diff against the first parent.
///
/// Immutable once built: the diff of a commit against its first parent
/// never changes, so instances are cached by id indefinitely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    id: String,
    parent_id: Option<String>,
    author: Signature,
    committer: Signature,
    message: String,
    summary: String,
    added_lines: usize,
    deleted_lines: usize,
    deltas: Vec<DeltaInfo>,
}

impl CommitInfo {
    /// Full commit hash.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Short commit hash (7 characters).
    pub fn short_id(&self) -> &str {
        &self.id[..self.id.len().min(7)]
    }

    /// First parent hash, `None` for root commits.
    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    pub fn author(&self) -> &Signature {
        &self.author
    }

    pub fn committer(&self) -> &Signature {
        &self.committer
    }

    /// Full commit message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// First line of the commit message.
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Lines added over all deltas.
    pub fn added_lines(&self) -> usize {
        self.added_lines
    }

    /// Lines deleted over all deltas.
    pub fn deleted_lines(&self) -> usize {
        self.deleted_lines
    }

    pub fn deltas(&self) -> &[DeltaInfo] {
        &self.deltas
    }

    fn from_parts(header: CommitHeader, deltas: Vec<DeltaInfo>) -> Self {
        let added_lines = deltas.iter().map(|d| d.added_lines).sum();
        let deleted_lines = deltas.iter().map(|d| d.deleted_lines).sum();
        let summary = header.summary().to_string();
        Self {
            id: header.id.to_string(),
            parent_id: header.parent_id.map(|p| p.to_string()),
            author: header.author,
            committer: header.committer,
            message: header.message,
            summary,
            added_lines,
            deleted_lines,
            deltas,
        }
    }
}

#[cfg(test)]
impl CommitInfo {
    pub(crate) fn new_for_test(
        id: &str,
        parent_id: Option<&str>,
        summary: &str,
        time: i64,
        deltas: Vec<DeltaInfo>,
    ) -> Self {
        let signature = Signature {
            name: "Test User".to_string(),
            email: "test@example.com".to_string(),
            time,
            offset: 0,
            valid: true,
        };
        let header = CommitHeader {
            id: git::parse_oid(id).unwrap_or_else(|_| gix::ObjectId::null(gix::hash::Kind::Sha1)),
            parent_id: parent_id.and_then(|p| git::parse_oid(p).ok()),
            tree_id: gix::ObjectId::empty_tree(gix::hash::Kind::Sha1),
            author: signature.clone(),
            committer: signature,
            message: format!("{}\n", summary),
        };
        Self::from_parts(header, deltas)
    }
}

/// Computes the diff of commit `commit_id` against its first parent.
///
/// Submodule entries are ignored. Renames and copies are tracked by exact
/// content only: a file whose content moved unchanged is reported as
/// renamed (source deleted) or copied (source modified in the same commit).
/// Binary deltas appear with zero counts.
///
/// # Errors
///
/// Returns error if the commit, its trees or any changed blob cannot be
/// read.
///
/// # Examples
///
/// ```no_run
/// use gitin::diff::get_diff;
///
/// let repo = gix::open(".")?;
/// let head = repo.head_id()?.detach();
/// let info = get_diff(&repo, head)?;
/// println!("{} +{} -{}", info.summary(), info.added_lines(), info.deleted_lines());
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn get_diff(repo: &gix::Repository, commit_id: gix::ObjectId) -> Result<CommitInfo> {
    let header = git::read_commit(repo, commit_id)?;

    let old_tree = match header.parent_id {
        Some(parent) => {
            let parent = git::read_commit(repo, parent)
                .with_context(|| format!("Failed to read parent of {}", commit_id))?;
            find_tree(repo, parent.tree_id)?
        }
        None => repo.empty_tree(),
    };
    let new_tree = find_tree(repo, header.tree_id)?;

    let mut changes = Vec::new();
    old_tree
        .changes()
        .context("Failed to read diff configuration")?
        .track_path()
        .track_rewrites(Some(exact_rewrites()))
        .for_each_to_obtain_tree(&new_tree, |change| {
            changes.extend(RawChange::from_change(change));
            Ok::<_, Infallible>(Action::Continue)
        })
        .with_context(|| format!("Failed to compare trees of {}", commit_id))?;
    mark_copies(&mut changes);
    changes.sort_by(|a, b| a.sort_key().cmp(b.sort_key()));

    let deltas = changes
        .into_iter()
        .map(|change| materialize(repo, change))
        .collect::<Result<Vec<_>>>()
        .with_context(|| format!("Failed to diff commit {}", commit_id))?;

    Ok(CommitInfo::from_parts(header, deltas))
}

fn find_tree(repo: &gix::Repository, tree_id: gix::ObjectId) -> Result<gix::Tree<'_>> {
    repo.find_object(tree_id)
        .with_context(|| format!("Failed to find tree {}", tree_id))?
        .try_into_tree()
        .with_context(|| format!("Object {} is not a tree", tree_id))
}

/// Rename tracking restricted to identical content.
///
/// Copies are left to [`mark_copies`]: gix drops a modification from the
/// change set once it served as a copy source.
fn exact_rewrites() -> Rewrites {
    Rewrites {
        copies: None,
        percentage: None,
        limit: 0,
    }
}

/// Turns additions whose content equals the previous content of a
/// modified or renamed file into copies of that file.
fn mark_copies(changes: &mut [RawChange]) {
    let sources: HashMap<gix::ObjectId, String> = changes
        .iter()
        .filter(|c| matches!(c.status, DeltaStatus::Modified | DeltaStatus::Renamed))
        .filter_map(|c| c.old.map(|oid| (oid, c.old_path.clone())))
        .collect();
    for change in changes.iter_mut().filter(|c| c.status == DeltaStatus::Added) {
        if let Some(source) = change.new.and_then(|oid| sources.get(&oid)) {
            change.status = DeltaStatus::Copied;
            change.old_path = source.clone();
            change.old = change.new;
        }
    }
}

/// A tree-level change before line statistics are computed.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RawChange {
    status: DeltaStatus,
    old_path: String,
    new_path: String,
    old: Option<gix::ObjectId>,
    new: Option<gix::ObjectId>,
}

impl RawChange {
    fn added(path: String, id: gix::ObjectId) -> Self {
        Self {
            status: DeltaStatus::Added,
            old_path: path.clone(),
            new_path: path,
            old: None,
            new: Some(id),
        }
    }

    fn deleted(path: String, id: gix::ObjectId) -> Self {
        Self {
            status: DeltaStatus::Deleted,
            old_path: path.clone(),
            new_path: path,
            old: Some(id),
            new: None,
        }
    }

    /// Maps a tree diff event onto a file change; directories and
    /// submodules yield `None`.
    fn from_change(change: Change<'_, '_, '_>) -> Option<Self> {
        let path = change.location.to_str_lossy().into_owned();
        match change.event {
            Event::Addition { entry_mode, id } => {
                is_file(entry_mode).then(|| Self::added(path, id.detach()))
            }
            Event::Deletion { entry_mode, id } => {
                is_file(entry_mode).then(|| Self::deleted(path, id.detach()))
            }
            Event::Modification {
                previous_entry_mode,
                previous_id,
                entry_mode,
                id,
            } => match (is_file(previous_entry_mode), is_file(entry_mode)) {
                (true, true) => {
                    let status = if previous_entry_mode.is_link() != entry_mode.is_link() {
                        DeltaStatus::TypeChanged
                    } else {
                        DeltaStatus::Modified
                    };
                    Some(Self {
                        status,
                        old_path: path.clone(),
                        new_path: path,
                        old: Some(previous_id.detach()),
                        new: Some(id.detach()),
                    })
                }
                (true, false) => Some(Self::deleted(path, previous_id.detach())),
                (false, true) => Some(Self::added(path, id.detach())),
                (false, false) => None,
            },
            Event::Rewrite {
                source_location,
                source_id,
                entry_mode,
                id,
                copy,
                ..
            } => is_file(entry_mode).then(|| Self {
                status: if copy {
                    DeltaStatus::Copied
                } else {
                    DeltaStatus::Renamed
                },
                old_path: source_location.to_str_lossy().into_owned(),
                new_path: path,
                old: Some(source_id.detach()),
                new: Some(id.detach()),
            }),
        }
    }

    fn sort_key(&self) -> &str {
        if self.status == DeltaStatus::Deleted {
            &self.old_path
        } else {
            &self.new_path
        }
    }
}

fn is_file(mode: EntryMode) -> bool {
    mode.is_blob_or_symlink()
}

fn materialize(repo: &gix::Repository, change: RawChange) -> Result<DeltaInfo> {
    let mut delta = DeltaInfo {
        old_path: change.old_path,
        new_path: change.new_path,
        status: change.status,
        binary: false,
        added_lines: 0,
        deleted_lines: 0,
        hunks: Vec::new(),
    };

    if matches!(change.status, DeltaStatus::Renamed | DeltaStatus::Copied) {
        return Ok(delta);
    }

    let old = change.old.map(|oid| git::read_blob(repo, oid)).transpose()?;
    let new = change.new.map(|oid| git::read_blob(repo, oid)).transpose()?;
    let old = old.unwrap_or_default();
    let new = new.unwrap_or_default();

    if git::is_binary(&old) || git::is_binary(&new) {
        delta.binary = true;
        return Ok(delta);
    }

    let stats = diff_lines(&String::from_utf8_lossy(&old), &String::from_utf8_lossy(&new));
    delta.added_lines = stats.added;
    delta.deleted_lines = stats.deleted;
    delta.hunks = stats.hunks;
    Ok(delta)
}

/// Line statistics and hunks for one text change.
#[derive(Debug, Default)]
pub struct LineStats {
    pub added: usize,
    pub deleted: usize,
    pub hunks: Vec<Hunk>,
}

/// Diffs two texts line by line with the histogram algorithm.
pub fn diff_lines(old: &str, new: &str) -> LineStats {
    let input = InternedInput::new(old, new);
    let record = input.before.len() + input.after.len() <= MAX_HUNK_LINES;
    gix::diff::blob::diff(Algorithm::Histogram, &input, HunkCollector::new(&input, record))
}

struct PendingHunk {
    old_start: u32,
    new_start: u32,
    old_count: u32,
    new_count: u32,
    lines: Vec<LineChange>,
}

/// Sink turning change ranges into unified-diff style hunks.
struct HunkCollector<'a> {
    input: &'a InternedInput<&'a str>,
    record: bool,
    stats: LineStats,
    current: Option<PendingHunk>,
    old_pos: u32,
    new_pos: u32,
}

impl<'a> HunkCollector<'a> {
    fn new(input: &'a InternedInput<&'a str>, record: bool) -> Self {
        Self {
            input,
            record,
            stats: LineStats::default(),
            current: None,
            old_pos: 0,
            new_pos: 0,
        }
    }

    fn text(&self, token: gix::diff::blob::intern::Token) -> String {
        self.input.interner[token]
            .trim_end_matches(['\n', '\r'])
            .to_string()
    }

    fn push_context(&mut self, old_range: Range<u32>) {
        let offset = self.new_pos as i64 - self.old_pos as i64;
        for old in old_range {
            let new = (old as i64 + offset) as u32;
            let content = self.text(self.input.before[old as usize]);
            if let Some(hunk) = self.current.as_mut() {
                hunk.lines.push(LineChange {
                    origin: LineOrigin::Context,
                    old_line: Some(old + 1),
                    new_line: Some(new + 1),
                    content,
                });
                hunk.old_count += 1;
                hunk.new_count += 1;
            }
        }
    }

    fn close(&mut self) {
        let old_len = self.input.before.len() as u32;
        let trailing = self.old_pos..(self.old_pos + CONTEXT_LINES).min(old_len);
        self.push_context(trailing);
        if let Some(hunk) = self.current.take() {
            let old_start = if hunk.old_count == 0 { hunk.old_start } else { hunk.old_start + 1 };
            let new_start = if hunk.new_count == 0 { hunk.new_start } else { hunk.new_start + 1 };
            self.stats.hunks.push(Hunk {
                header: format!(
                    "@@ -{},{} +{},{} @@",
                    old_start, hunk.old_count, new_start, hunk.new_count
                ),
                lines: hunk.lines,
            });
        }
    }
}

impl Sink for HunkCollector<'_> {
    type Out = LineStats;

    fn process_change(&mut self, before: Range<u32>, after: Range<u32>) {
        self.stats.deleted += (before.end - before.start) as usize;
        self.stats.added += (after.end - after.start) as usize;
        if !self.record {
            return;
        }

        let joins_current =
            self.current.is_some() && before.start - self.old_pos <= 2 * CONTEXT_LINES;
        if joins_current {
            self.push_context(self.old_pos..before.start);
        } else {
            if self.current.is_some() {
                self.close();
            }
            let lead = before.start.saturating_sub(CONTEXT_LINES);
            let lead_len = before.start - lead;
            self.current = Some(PendingHunk {
                old_start: lead,
                new_start: after.start - lead_len,
                old_count: 0,
                new_count: 0,
                lines: Vec::new(),
            });
            self.old_pos = lead;
            self.new_pos = after.start - lead_len;
            self.push_context(lead..before.start);
        }

        let deletions: Vec<LineChange> = before
            .clone()
            .map(|old| LineChange {
                origin: LineOrigin::Deletion,
                old_line: Some(old + 1),
                new_line: None,
                content: self.text(self.input.before[old as usize]),
            })
            .collect();
        let additions: Vec<LineChange> = after
            .clone()
            .map(|new| LineChange {
                origin: LineOrigin::Addition,
                old_line: None,
                new_line: Some(new + 1),
                content: self.text(self.input.after[new as usize]),
            })
            .collect();

        if let Some(hunk) = self.current.as_mut() {
            hunk.old_count += deletions.len() as u32;
            hunk.new_count += additions.len() as u32;
            hunk.lines.extend(deletions);
            hunk.lines.extend(additions);
        }
        self.old_pos = before.end;
        self.new_pos = after.end;
    }

    fn finish(mut self) -> Self::Out {
        if self.current.is_some() {
            self.close();
        }
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_added_file_counts_every_line() {
        // Act
        let stats = diff_lines("", "hello\n");

        // Assert
        assert_eq!(stats.added, 1);
        assert_eq!(stats.deleted, 0);
        assert_eq!(stats.hunks.len(), 1);
        assert_eq!(stats.hunks[0].header, "@@ -0,0 +1,1 @@");
        assert_eq!(stats.hunks[0].lines[0].content, "hello");
        assert_eq!(stats.hunks[0].lines[0].origin, LineOrigin::Addition);
    }

    #[test]
    fn test_modification_has_context() {
        // Arrange
        let old = "a\nb\nc\nd\ne\nf\ng\nh\n";
        let new = "a\nb\nc\nd\nE\nf\ng\nh\n";

        // Act
        let stats = diff_lines(old, new);

        // Assert
        assert_eq!((stats.added, stats.deleted), (1, 1));
        assert_eq!(stats.hunks.len(), 1);
        let hunk = &stats.hunks[0];
        assert_eq!(hunk.header, "@@ -2,7 +2,7 @@");
        assert_eq!(hunk.lines.first().map(|l| l.content.as_str()), Some("b"));
        assert_eq!(hunk.lines.last().map(|l| l.content.as_str()), Some("h"));
    }

    #[test]
    fn test_distant_changes_make_separate_hunks() {
        // Arrange
        let old: String = (1..=20).map(|i| format!("{}\n", i)).collect();
        let new = old.replacen("2\n", "two\n", 1).replacen("19\n", "nineteen\n", 1);

        // Act
        let stats = diff_lines(&old, &new);

        // Assert
        assert_eq!(stats.hunks.len(), 2);
        assert_eq!(stats.added, 2);
        assert_eq!(stats.deleted, 2);
    }

    fn oid(byte: u8) -> gix::ObjectId {
        gix::ObjectId::from_bytes_or_panic(&[byte; 20])
    }

    #[test]
    fn test_addition_matching_modified_source_becomes_copy() {
        // Arrange: a.txt changes, its old content appears as c.txt
        let mut changes = vec![
            RawChange {
                status: DeltaStatus::Modified,
                old_path: "a.txt".to_string(),
                new_path: "a.txt".to_string(),
                old: Some(oid(1)),
                new: Some(oid(2)),
            },
            RawChange::added("c.txt".to_string(), oid(1)),
            RawChange::added("d.txt".to_string(), oid(3)),
        ];

        // Act
        mark_copies(&mut changes);

        // Assert
        assert_eq!(changes[0].status, DeltaStatus::Modified);
        assert_eq!(changes[1].status, DeltaStatus::Copied);
        assert_eq!(changes[1].old_path, "a.txt");
        assert_eq!(changes[2].status, DeltaStatus::Added);
    }

    #[test]
    fn test_deleted_source_is_not_a_copy_source() {
        // Arrange
        let mut changes = vec![
            RawChange::deleted("gone.txt".to_string(), oid(1)),
            RawChange::added("new.txt".to_string(), oid(1)),
        ];

        // Act
        mark_copies(&mut changes);

        // Assert
        assert_eq!(changes[1].status, DeltaStatus::Added);
    }

    #[test]
    fn test_commit_totals_sum_deltas() {
        // Arrange
        let delta = |added, deleted| DeltaInfo {
            old_path: "f".to_string(),
            new_path: "f".to_string(),
            status: DeltaStatus::Modified,
            binary: false,
            added_lines: added,
            deleted_lines: deleted,
            hunks: Vec::new(),
        };

        // Act
        let info = CommitInfo::new_for_test(
            "3b18e512dba79e4c8300dd08aeb37f8e728b8dad",
            None,
            "Initial",
            0,
            vec![delta(3, 1), delta(2, 5)],
        );

        // Assert
        assert_eq!(info.added_lines(), 5);
        assert_eq!(info.deleted_lines(), 6);
        assert_eq!(info.short_id(), "3b18e51");
        assert_eq!(info.summary(), "Initial");
    }

    #[test]
    fn test_status_letters() {
        assert_eq!(DeltaStatus::Added.letter(), 'A');
        assert_eq!(DeltaStatus::Copied.letter(), 'C');
        assert_eq!(DeltaStatus::TypeChanged.letter(), 'T');
    }
}
