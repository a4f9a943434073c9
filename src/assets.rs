//! CSS asset bundling

use anyhow::{Context, Result};
use std::path::Path;

use crate::cache::write_atomic;
use crate::highlight::theme_css;
use crate::pages::{HIGHLIGHT_STYLESHEET, STYLESHEET};

const BASE: &str = include_str!("../assets/base.css");
const LAYOUT: &str = include_str!("../assets/components/layout.css");
const NAV: &str = include_str!("../assets/components/nav.css");
const FILE_LIST: &str = include_str!("../assets/components/file-list.css");

const LOG_PAGE: &str = include_str!("../assets/page-log.css");
const COMMIT_PAGE: &str = include_str!("../assets/page-commit.css");
const BLOB_PAGE: &str = include_str!("../assets/page-blob.css");

/// Writes `style.css` and the theme's `highlight.css` into `dir`
///
/// # Errors
///
/// Returns error if the theme is unknown or a file cannot be written.
pub fn write_css_assets(dir: &Path, theme: &str) -> Result<()> {
    write_bundled(
        dir,
        STYLESHEET,
        &[BASE, LAYOUT, NAV, FILE_LIST, LOG_PAGE, COMMIT_PAGE, BLOB_PAGE],
    )?;
    let highlight = theme_css(theme)?;
    write_atomic(&dir.join(HIGHLIGHT_STYLESHEET), highlight.as_bytes())
        .with_context(|| format!("Failed to write CSS asset: {}", HIGHLIGHT_STYLESHEET))
}

fn write_bundled(dir: &Path, name: &str, parts: &[&str]) -> Result<()> {
    let css = parts.join("\n");
    write_atomic(&dir.join(name), css.as_bytes())
        .with_context(|| format!("Failed to write CSS asset: {}", name))
}
