//! Atom and JSON feeds.
//!
//! Per ref: `log.xml` over the listed commits and `log.json`. Per
//! repository: `atom.xml` over all ref tips and `index.json` listing
//! branches and tags.

use anyhow::{Context, Result};
use maud::{Markup, PreEscaped, html};
use serde::Serialize;

use crate::diff::CommitInfo;
use crate::git::{CommitHeader, Signature, summary_of};
use crate::refs::ReferenceInfo;
use crate::util::format_rfc3339;

const ATOM_NAMESPACE: &str = "http://www.w3.org/2005/Atom";
const XML_HEADER: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

/// One Atom entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub id: String,
    pub parent: Option<String>,
    pub title: String,
    pub href: String,
    pub author: Signature,
    pub message: String,
}

impl FeedEntry {
    /// Entry for a listed commit; `root` leads from the feed to the site.
    pub fn from_commit(commit: &CommitInfo, root: &str) -> Self {
        Self {
            id: commit.id().to_string(),
            parent: commit.parent_id().map(str::to_string),
            title: commit.summary().to_string(),
            href: format!("{}commit/{}.html", root, commit.id()),
            author: commit.author().clone(),
            message: commit.message().to_string(),
        }
    }

    /// Entry for a ref tip, titled `[ref] summary`.
    pub fn from_ref(reference: &ReferenceInfo) -> Self {
        let commit = reference.commit();
        let summary = commit.summary();
        let title = if summary.is_empty() {
            String::new()
        } else {
            format!("[{}] {}", reference.name(), summary)
        };
        Self {
            id: commit.id.to_string(),
            parent: commit.parent_id.map(|p| p.to_string()),
            title,
            href: format!("commit/{}.html", commit.id),
            author: commit.author.clone(),
            message: commit.message.clone(),
        }
    }

    fn published(&self) -> Option<String> {
        self.author
            .valid
            .then(|| format_rfc3339(self.author.time, self.author.offset))
    }

    fn content(&self) -> String {
        let mut body = format!("commit {}\n", self.id);
        if let Some(parent) = &self.parent {
            body.push_str(&format!("parent {}\n", parent));
        }
        if self.author.valid {
            body.push_str(&format!("Author: {} <{}>\n", self.author.name, self.author.email));
            body.push_str(&format!(
                "Date:   {}\n",
                format_rfc3339(self.author.time, self.author.offset)
            ));
        }
        if !self.message.is_empty() {
            body.push('\n');
            body.push_str(&self.message);
        }
        body
    }
}

/// Renders an Atom feed document.
///
/// # Arguments
///
/// * `title`: Feed title
/// * `subtitle`: Optional feed subtitle, e.g. the repository description
/// * `entries`: Entries in feed order, newest first
///
/// # Returns
///
/// Complete XML document
pub fn atom_feed(title: &str, subtitle: Option<&str>, entries: &[FeedEntry]) -> String {
    let updated = entries.first().and_then(FeedEntry::published);
    let feed: Markup = html! {
        (PreEscaped(XML_HEADER))
        feed xmlns=(ATOM_NAMESPACE) {
            title { (title) }
            @if let Some(subtitle) = subtitle {
                subtitle { (subtitle) }
            }
            @if let Some(updated) = updated {
                updated { (updated) }
            }
            @for entry in entries {
                entry {
                    id { (entry.id) }
                    @if let Some(published) = entry.published() {
                        published { (published) }
                        updated { (published) }
                    }
                    title { (entry.title) }
                    link rel="alternate" type="text/html" href=(entry.href) {}
                    @if entry.author.valid {
                        author {
                            name { (entry.author.name) }
                            email { (entry.author.email) }
                        }
                    }
                    content type="text" { (entry.content()) }
                }
            }
        }
    };
    feed.into_string()
}

#[derive(Debug, Serialize)]
struct PersonJson<'a> {
    name: &'a str,
    email: &'a str,
    date: String,
}

impl<'a> PersonJson<'a> {
    fn new(sig: &'a Signature) -> Self {
        Self {
            name: &sig.name,
            email: &sig.email,
            date: format_rfc3339(sig.time, sig.offset),
        }
    }
}

#[derive(Debug, Serialize)]
struct CommitJson<'a> {
    id: String,
    parent: Option<String>,
    author: PersonJson<'a>,
    committer: PersonJson<'a>,
    summary: &'a str,
    message: &'a str,
}

impl<'a> CommitJson<'a> {
    fn from_info(info: &'a CommitInfo) -> Self {
        Self {
            id: info.id().to_string(),
            parent: info.parent_id().map(str::to_string),
            author: PersonJson::new(info.author()),
            committer: PersonJson::new(info.committer()),
            summary: info.summary(),
            message: info.message(),
        }
    }

    fn from_header(header: &'a CommitHeader) -> Self {
        Self {
            id: header.id.to_string(),
            parent: header.parent_id.map(|p| p.to_string()),
            author: PersonJson::new(&header.author),
            committer: PersonJson::new(&header.committer),
            summary: summary_of(&header.message),
            message: &header.message,
        }
    }
}

#[derive(Debug, Serialize)]
struct RefJson<'a> {
    name: &'a str,
    commit: CommitJson<'a>,
}

impl<'a> RefJson<'a> {
    fn new(reference: &'a ReferenceInfo) -> Self {
        Self {
            name: reference.name(),
            commit: CommitJson::from_header(reference.commit()),
        }
    }
}

#[derive(Debug, Serialize)]
struct RefsJson<'a> {
    branches: Vec<RefJson<'a>>,
    tags: Vec<RefJson<'a>>,
}

#[derive(Debug, Serialize)]
struct LogJson<'a> {
    commits: Vec<CommitJson<'a>>,
}

/// Serializes `{"commits": [...]}` for a ref's listed commits.
///
/// # Errors
///
/// Returns error if serialization fails.
pub fn log_json<'a>(commits: impl IntoIterator<Item = &'a CommitInfo>) -> Result<Vec<u8>> {
    let log = LogJson {
        commits: commits.into_iter().map(CommitJson::from_info).collect(),
    };
    let mut json = serde_json::to_vec_pretty(&log).context("Failed to serialize commit log")?;
    json.push(b'\n');
    Ok(json)
}

/// Serializes `{"branches": [...], "tags": [...]}` for the ref set.
///
/// # Errors
///
/// Returns error if serialization fails.
pub fn refs_json(refs: &[ReferenceInfo]) -> Result<Vec<u8>> {
    let (branches, tags): (Vec<&ReferenceInfo>, Vec<&ReferenceInfo>) =
        refs.iter().partition(|r| !r.is_tag());
    let index = RefsJson {
        branches: branches.into_iter().map(RefJson::new).collect(),
        tags: tags.into_iter().map(RefJson::new).collect(),
    };
    let mut json = serde_json::to_vec_pretty(&index).context("Failed to serialize ref index")?;
    json.push(b'\n');
    Ok(json)
}
