//! Page generation modules for the different views.
//!
//! Every page of a repository shares the header built from a
//! [`RepoContext`]; page modules only produce their own body.

use anyhow::{Context, Result};
use maud::Markup;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::components::layout::page_wrapper;
use crate::components::nav::repo_header;
use crate::util::relative_root;

pub mod blob;
pub mod commit;
pub mod log;
pub mod redirect;
pub mod repos;
pub mod summary;
pub mod tree;

/// Stylesheet written next to the site root.
pub const STYLESHEET: &str = "style.css";
/// Syntax highlighting stylesheet for the configured theme.
pub const HIGHLIGHT_STYLESHEET: &str = "highlight.css";

/// Repository-wide values shared by all of its pages.
#[derive(Debug, Clone, Default)]
pub struct RepoContext {
    pub site_name: String,
    pub name: String,
    pub description: Option<String>,
    pub clone_url: Option<String>,
    /// Raw HTML placed in the page footer.
    pub footer: Option<String>,
    /// Output directory of the default ref.
    pub default_ref: Option<String>,
    /// Pinned files present in the default ref's tree.
    pub pin_files: Vec<String>,
    /// Paths present in the default ref's tree; diff headers link to them.
    pub head_files: HashSet<String>,
    /// Directory levels between the repository output and the site root.
    pub site_depth: usize,
}

impl RepoContext {
    /// Prefix from a page `depth` levels below the repository to the site root.
    pub fn site_root(&self, depth: usize) -> String {
        relative_root(depth + self.site_depth)
    }

    /// Prefix from a page `depth` levels below the repository to its root.
    pub fn repo_root(&self, depth: usize) -> String {
        relative_root(depth)
    }
}

/// Wraps a body in the repository page frame.
///
/// # Arguments
///
/// * `ctx`: Repository values for the header
/// * `title`: Page subject, shown before the repository name
/// * `depth`: Directory levels between the page and the repository root
/// * `in_ref`: Whether the page lives inside a ref directory
/// * `body`: Page specific markup
pub fn repo_page(ctx: &RepoContext, title: &str, depth: usize, in_ref: bool, body: Markup) -> Markup {
    let root = ctx.site_root(depth);
    let stylesheet = format!("{}{}", root, STYLESHEET);
    let highlight = format!("{}{}", root, HIGHLIGHT_STYLESHEET);
    let full_title = if title.is_empty() {
        format!("{} - {}", ctx.name, ctx.site_name)
    } else {
        format!("{} - {} - {}", title, ctx.name, ctx.site_name)
    };

    page_wrapper(
        &full_title,
        &[&stylesheet, &highlight],
        ctx.footer.as_deref(),
        maud::html! {
            (repo_header(ctx, depth, in_ref))
            (body)
        },
    )
}

/// Writes a rendered page, creating parent directories as needed.
///
/// # Errors
///
/// Returns error if the directory or file cannot be written.
pub fn write_page(path: &Path, page: &Markup) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    }
    fs::write(path, &page.0)
        .with_context(|| format!("Failed to write page: {}", path.display()))
}

#[cfg(test)]
impl RepoContext {
    pub(crate) fn new_for_test(name: &str) -> Self {
        Self {
            site_name: "Repositories".to_string(),
            name: name.to_string(),
            default_ref: Some("main".to_string()),
            ..Self::default()
        }
    }
}
