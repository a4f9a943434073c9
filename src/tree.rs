//! In-memory directory tree over a flattened git tree.
//!
//! The tree emitter needs two things per directory: its immediate children
//! and the number of files anywhere below it, which drives the split
//! policy. Both are answered here without touching the object database
//! again.

use std::collections::BTreeMap;

use crate::git::{EntryKind, FlatEntry};

/// Directory hierarchy of one commit tree.
///
/// # Examples
///
/// ```no_run
/// use gitin::git::flatten_tree;
/// use gitin::tree::FileTree;
///
/// let repo = gix::open(".")?;
/// let commit = repo.head_commit()?;
/// let entries = flatten_tree(&repo, commit.tree_id()?.detach())?;
/// let tree = FileTree::from_entries(entries);
/// println!("{} files in total", tree.root().file_count());
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct FileTree {
    root: DirNode,
}

/// One directory: its own entries, child directories and a subtree count.
#[derive(Debug, Clone, Default)]
pub struct DirNode {
    files: Vec<FlatEntry>,
    subdirs: BTreeMap<String, DirNode>,
    file_count: usize,
}

impl DirNode {
    /// Non-directory entries directly in this directory, sorted by name.
    pub fn files(&self) -> &[FlatEntry] {
        &self.files
    }

    /// Child directories in name order.
    pub fn subdirs(&self) -> impl Iterator<Item = (&str, &DirNode)> {
        self.subdirs.iter().map(|(name, node)| (name.as_str(), node))
    }

    /// Entries anywhere below this directory.
    pub fn file_count(&self) -> usize {
        self.file_count
    }
}

impl FileTree {
    /// Builds the hierarchy from a flat listing in one pass.
    ///
    /// Entry paths are slash separated and relative to the tree root.
    pub fn from_entries(entries: Vec<FlatEntry>) -> Self {
        let mut root = DirNode::default();

        for entry in entries {
            let mut current = &mut root;
            current.file_count += 1;

            let mut components = entry.path.split('/').peekable();
            while let Some(component) = components.next() {
                if components.peek().is_none() {
                    break;
                }
                current = current.subdirs.entry(component.to_string()).or_default();
                current.file_count += 1;
            }
            current.files.push(entry);
        }

        root.sort();
        Self { root }
    }

    pub fn root(&self) -> &DirNode {
        &self.root
    }

    /// Entries whose object is a blob; these get pages and raw copies.
    pub fn blobs(&self) -> Vec<&FlatEntry> {
        let mut blobs = Vec::new();
        collect_blobs(&self.root, &mut blobs);
        blobs
    }
}

impl DirNode {
    fn sort(&mut self) {
        self.files.sort_by(|a, b| a.path.cmp(&b.path));
        for child in self.subdirs.values_mut() {
            child.sort();
        }
    }
}

fn collect_blobs<'a>(node: &'a DirNode, out: &mut Vec<&'a FlatEntry>) {
    for (_, child) in node.subdirs() {
        collect_blobs(child, out);
    }
    out.extend(node.files.iter().filter(|entry| entry.kind.is_blob()));
}

/// Final path component of an entry.
pub fn entry_name(entry: &FlatEntry) -> &str {
    entry.path.rsplit('/').next().unwrap_or(&entry.path)
}

/// Whether an entry is a submodule link rather than file content.
pub fn is_submodule(entry: &FlatEntry) -> bool {
    entry.kind == EntryKind::Submodule
}

#[cfg(test)]
impl FileTree {
    /// Looks up a directory by path, the empty string being the root.
    pub(crate) fn node(&self, dir_path: &str) -> Option<&DirNode> {
        if dir_path.is_empty() {
            return Some(&self.root);
        }
        dir_path
            .split('/')
            .try_fold(&self.root, |node, component| node.subdirs.get(component))
    }

    /// Files anywhere below `dir_path`, 0 for unknown directories.
    pub(crate) fn file_count(&self, dir_path: &str) -> usize {
        self.node(dir_path).map_or(0, DirNode::file_count)
    }
}
