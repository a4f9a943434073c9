//! Repository header and navigation component

use maud::{Markup, html};

use crate::pages::RepoContext;
use crate::util::unhide_path;

/// Renders the repository header with its navigation links
///
/// Pages inside a ref directory link to that ref's summary, log and file
/// listing. Pinned files always point into the default ref, and the
/// repository list is linked when several repositories share the site.
///
/// # Arguments
///
/// * `ctx`: Repository values
/// * `depth`: Directory levels between the page and the repository root
/// * `in_ref`: Whether the page lives inside a ref directory
///
/// # Returns
///
/// Header markup ending in a horizontal rule
pub fn repo_header(ctx: &RepoContext, depth: usize, in_ref: bool) -> Markup {
    let repo_root = ctx.repo_root(depth);
    let ref_root = ctx.repo_root(depth.saturating_sub(1));

    html! {
        header {
            h1 { (ctx.name) }
            @if let Some(description) = &ctx.description {
                span class="desc" { (description) }
            }
            @if let Some(url) = &ctx.clone_url {
                div class="url" { code { "git clone " a href=(url) { (url) } } }
            }
            nav {
                @if ctx.site_depth > 0 {
                    a href=(format!("{}index.html", ctx.site_root(depth))) { "Repositories" }
                    " "
                }
                @if in_ref {
                    a href=(format!("{}index.html", ref_root)) { "Summary" }
                    " | "
                    a href=(format!("{}log.html", ref_root)) { "Log" }
                    " | "
                    a href=(format!("{}files/index.html", ref_root)) { "Files" }
                }
                @if let Some(default_ref) = &ctx.default_ref {
                    @for pin in &ctx.pin_files {
                        " | "
                        a href=(format!("{}{}/files/{}.html", repo_root, default_ref, unhide_path(pin))) { (pin) }
                    }
                }
            }
        }
        hr;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ref_links_are_relative_to_ref_directory() {
        // Arrange
        let ctx = RepoContext::new_for_test("demo");

        // Act
        let html = repo_header(&ctx, 3, true).into_string();

        // Assert
        assert!(html.contains("href=\"../../index.html\""));
        assert!(html.contains("href=\"../../log.html\""));
        assert!(html.contains("href=\"../../files/index.html\""));
        assert!(!html.contains("Repositories"));
    }

    #[test]
    fn test_pin_files_point_into_default_ref() {
        // Arrange
        let mut ctx = RepoContext::new_for_test("demo");
        ctx.pin_files = vec![".github/README.md".to_string()];
        ctx.site_depth = 1;

        // Act
        let html = repo_header(&ctx, 1, false).into_string();

        // Assert
        assert!(html.contains("href=\"../main/files/-github/README.md.html\""));
        assert!(html.contains("href=\"../../index.html\">Repositories"));
        assert!(!html.contains("Summary"));
    }
}
