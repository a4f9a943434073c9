//! Incremental static site generator for Git repositories.

pub mod archive;
mod assets;
pub mod cache;
pub mod commits;
pub mod components;
pub mod config;
pub mod diff;
pub mod error;
pub mod execute;
pub mod feeds;
pub mod filetree;
pub mod git;
pub mod highlight;
pub mod index;
pub mod markdown;
pub mod pages;
pub mod preview;
pub mod progress;
pub mod refs;
pub mod render;
pub mod shortlog;
pub mod tree;
pub mod util;

pub use assets::write_css_assets;
pub use config::{Cli, RenderConfig};
pub use error::RenderErrors;
pub use highlight::Highlighter;
pub use markdown::MarkdownRenderer;
pub use render::{RenderReport, SiteReport, render_repository, render_site};
