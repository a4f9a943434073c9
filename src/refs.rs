//! Branch and tag resolution.

use anyhow::{Context, Result};
use gix::bstr::ByteSlice;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::error;

use crate::error::RefCollision;
use crate::git::{self, CommitHeader};
use crate::util::escape_refname;

/// A branch or tag resolved to the commit it points at.
#[derive(Debug, Clone)]
pub struct ReferenceInfo {
    name: String,
    refname: String,
    is_tag: bool,
    commit: CommitHeader,
}

impl ReferenceInfo {
    /// Short name, e.g. `main` or `v1.0`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name usable as a single output directory component.
    pub fn refname(&self) -> &str {
        &self.refname
    }

    pub fn is_tag(&self) -> bool {
        self.is_tag
    }

    /// Commit the reference peels to.
    pub fn commit(&self) -> &CommitHeader {
        &self.commit
    }

    pub fn tip(&self) -> gix::ObjectId {
        self.commit.id
    }

    fn new(name: String, is_tag: bool, commit: CommitHeader) -> Self {
        Self {
            refname: escape_refname(&name),
            name,
            is_tag,
            commit,
        }
    }
}

#[cfg(test)]
impl ReferenceInfo {
    pub(crate) fn new_for_test(name: &str, is_tag: bool, time: i64) -> Self {
        let signature = git::Signature {
            name: "Test User".to_string(),
            email: "test@example.com".to_string(),
            time,
            offset: 0,
            valid: true,
        };
        let commit = CommitHeader {
            id: gix::ObjectId::null(gix::hash::Kind::Sha1),
            parent_id: None,
            tree_id: gix::ObjectId::empty_tree(gix::hash::Kind::Sha1),
            author: signature.clone(),
            committer: signature,
            message: format!("{}\n", name),
        };
        Self::new(name.to_string(), is_tag, commit)
    }
}

/// Display order: branches before tags, newest commit first, then name.
///
/// Ties are broken all the way down to the name, so this is a total order
/// for refs with distinct names.
pub fn compare_refs(a: &ReferenceInfo, b: &ReferenceInfo) -> Ordering {
    a.is_tag
        .cmp(&b.is_tag)
        .then_with(|| b.commit.committer.time.cmp(&a.commit.committer.time))
        .then_with(|| a.name.cmp(&b.name))
}

/// Enumerates local branches and tags, resolved and sorted.
///
/// Other references (remotes, notes, stashes) are skipped. A reference
/// that does not peel to a commit is logged and left out rather than
/// failing the whole listing.
///
/// # Errors
///
/// Returns error if the reference database cannot be read at all.
///
/// # Examples
///
/// ```no_run
/// use gitin::refs::get_refs;
///
/// let repo = gix::open(".")?;
/// for r in get_refs(&repo)? {
///     println!("{} -> {}", r.name(), r.tip());
/// }
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn get_refs(repo: &gix::Repository) -> Result<Vec<ReferenceInfo>> {
    let platform = repo.references().context("Failed to read references")?;
    let mut refs = Vec::new();

    let branches = platform
        .local_branches()
        .context("Failed to list local branches")?;
    for reference in branches {
        match reference {
            Ok(reference) => push_resolved(repo, reference, false, &mut refs),
            Err(e) => error!(error = %e, "skipping unreadable branch"),
        }
    }

    let tags = platform.tags().context("Failed to list tags")?;
    for reference in tags {
        match reference {
            Ok(reference) => push_resolved(repo, reference, true, &mut refs),
            Err(e) => error!(error = %e, "skipping unreadable tag"),
        }
    }

    refs.sort_by(compare_refs);
    Ok(refs)
}

fn push_resolved(
    repo: &gix::Repository,
    reference: gix::Reference<'_>,
    is_tag: bool,
    out: &mut Vec<ReferenceInfo>,
) {
    let name = reference.name().shorten().to_str_lossy().to_string();
    match resolve(repo, reference) {
        Ok(commit) => out.push(ReferenceInfo::new(name, is_tag, commit)),
        Err(e) => error!(reference = %name, error = %format!("{:#}", e), "dropping reference"),
    }
}

fn resolve(repo: &gix::Repository, reference: gix::Reference<'_>) -> Result<CommitHeader> {
    let name = reference.name().as_bstr().to_string();
    let id = reference
        .into_fully_peeled_id()
        .with_context(|| format!("Failed to peel reference '{}'", name))?
        .object()
        .with_context(|| format!("Failed to resolve target of '{}'", name))?
        .try_into_commit()
        .with_context(|| format!("Reference '{}' does not point to a commit", name))?
        .id;
    git::read_commit(repo, id)
}

/// Gives every ref its own output directory.
///
/// `refs` must be in display order. A ref whose escaped name matches one
/// seen earlier (`a/b` next to `a-b`, or a tag named like a branch) is
/// left out and reported, so the earlier ref keeps the directory.
pub fn claim_directories(refs: Vec<ReferenceInfo>) -> (Vec<ReferenceInfo>, Vec<RefCollision>) {
    let mut owners: HashMap<String, String> = HashMap::new();
    let mut kept = Vec::with_capacity(refs.len());
    let mut collisions = Vec::new();

    for reference in refs {
        match owners.get(&reference.refname) {
            Some(owner) => {
                error!(reference = %reference.name, directory = %reference.refname, "directory already taken");
                collisions.push(RefCollision {
                    kind: if reference.is_tag { "tag" } else { "branch" },
                    name: reference.name,
                    dir: reference.refname,
                    taken_by: owner.clone(),
                });
            }
            None => {
                owners.insert(reference.refname.clone(), reference.name.clone());
                kept.push(reference);
            }
        }
    }
    (kept, collisions)
}

/// Picks the ref the top-level redirect points at.
///
/// The branch HEAD names wins when it is in the set, otherwise the first
/// ref in display order.
pub fn default_ref<'r>(refs: &'r [ReferenceInfo], head: Option<&str>) -> Option<&'r ReferenceInfo> {
    head.and_then(|head| refs.iter().find(|r| !r.is_tag && r.name == head))
        .or_else(|| refs.first())
}
