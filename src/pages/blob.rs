//! Blob page generation for file content viewing
//!
//! A blob page has two parts. The header (name, size, download link) and
//! image previews link to the raw copy, so they are rendered per page.
//! The body (text previews and highlighted content) only depends on the
//! blob itself and is what the tree emitter caches by blob id.

use maud::{Markup, PreEscaped, html};

use crate::cache::CacheStore;
use crate::git::is_binary;
use crate::highlight::{HighlightOptions, Highlighter, highlight_cached};
use crate::pages::{RepoContext, repo_page};
use crate::preview::Previews;

/// Renders the location-independent body of blob pages.
pub struct BlobRenderer<'a> {
    pub cache: &'a CacheStore,
    pub highlighter: &'a Highlighter,
    pub highlight: HighlightOptions<'a>,
    pub previews: &'a Previews<'a>,
    /// Blobs of this size or larger are not shown.
    pub max_file_size: u64,
}

impl BlobRenderer<'_> {
    /// Renders preview and content for one blob
    ///
    /// # Arguments
    ///
    /// * `name`: File name, used for preview matching and syntax detection
    /// * `oid`: Blob id, the cache fingerprint
    /// * `data`: Blob content
    ///
    /// # Returns
    ///
    /// Body markup: a text preview when one matches, then `Binary file.`,
    /// `File too big.` or the highlighted lines
    pub fn body(&self, name: &str, oid: &gix::ObjectId, data: &[u8]) -> Markup {
        let preview = if self.previews.is_positional(name) {
            None
        } else {
            self.previews.render(name, oid, data, "")
        };

        html! {
            @if let Some(preview) = preview {
                (preview)
            }
            @if is_binary(data) {
                p { "Binary file." }
            } @else if data.len() as u64 >= self.max_file_size {
                p { "File too big." }
            } @else {
                (self.content(name, oid, data))
            }
        }
    }

    fn content(&self, name: &str, oid: &gix::ObjectId, data: &[u8]) -> Markup {
        let text = String::from_utf8_lossy(data);
        let lines = text.lines().count().max(1);
        let highlighted = highlight_cached(self.cache, self.highlighter, &self.highlight, oid, name, &text);

        html! {
            table class="blob" {
                tbody {
                    tr {
                        td class="linenos" {
                            pre {
                                @for number in 1..=lines {
                                    a id=(format!("L{}", number)) href=(format!("#L{}", number)) { (number) }
                                    "\n"
                                }
                            }
                        }
                        td class="code expand" {
                            pre { code class="highlight" { (PreEscaped(highlighted)) } }
                        }
                    }
                }
            }
        }
    }
}

/// Generates `R/files/<path>.html`
///
/// # Arguments
///
/// * `ctx`: Repository values
/// * `path`: Path of the blob within the tree
/// * `size`: Blob size in bytes
/// * `raw_href`: Link to the raw copy, relative to this page
/// * `preview`: Image preview, rendered for this page's location
/// * `body`: Cached body from [`BlobRenderer::body`]
///
/// # Returns
///
/// Complete blob page
pub fn generate(
    ctx: &RepoContext,
    path: &str,
    size: u64,
    raw_href: &str,
    preview: Option<Markup>,
    body: &str,
) -> Markup {
    let name = path.rsplit('/').next().unwrap_or(path);
    let depth = 2 + path.matches('/').count();

    repo_page(
        ctx,
        path,
        depth,
        true,
        html! {
            p class="blob-header" {
                (name) " (" (size) "B) "
                a href=(raw_href) { "download" }
            }
            hr;
            @if let Some(preview) = preview {
                (preview)
            }
            (PreEscaped(body))
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn oid() -> gix::ObjectId {
        gix::ObjectId::empty_blob(gix::hash::Kind::Sha1)
    }

    fn render(name: &str, data: &[u8], max_file_size: u64) -> String {
        let dir = TempDir::new().expect("tempdir");
        let cache = CacheStore::new(dir.path(), false);
        let highlighter = Highlighter::new();
        let previews = Previews::new(&cache, &highlighter, &[], None);
        let renderer = BlobRenderer {
            cache: &cache,
            highlighter: &highlighter,
            highlight: HighlightOptions {
                command: None,
                scheme: "InspiredGitHub",
                timeout: None,
            },
            previews: &previews,
            max_file_size,
        };
        renderer.body(name, &oid(), data).into_string()
    }

    #[test]
    fn test_text_body_has_line_anchors() {
        // Act
        let html = render("main.rs", b"fn main() {}\nfn other() {}\n", 1000);

        // Assert
        assert!(html.contains("<a id=\"L1\" href=\"#L1\">1</a>"));
        assert!(html.contains("<a id=\"L2\" href=\"#L2\">2</a>"));
        assert!(!html.contains("id=\"L3\""));
        assert!(html.contains("<code class=\"highlight\">"));
    }

    #[test]
    fn test_binary_and_oversized_bodies() {
        assert!(render("blob.bin", b"\x00\x01\x02", 1000).contains("<p>Binary file.</p>"));
        assert!(render("big.txt", b"0123456789", 10).contains("<p>File too big.</p>"));
    }

    #[test]
    fn test_markdown_body_includes_preview() {
        // Act
        let html = render("README.md", b"# Title\n", 1000);

        // Assert
        assert!(html.contains("<div class=\"preview\">"));
        assert!(html.contains("Title</h1>"));
        assert!(html.contains("id=\"L1\""));
    }

    #[test]
    fn test_image_preview_is_left_to_the_page() {
        // Act
        let html = render("logo.png", b"\x89PNG\r\n\x1a\n\x00", 1000);

        // Assert
        assert!(!html.contains("<img"));
        assert!(html.contains("Binary file."));
    }

    #[test]
    fn test_page_header_links_download() {
        // Arrange
        let ctx = RepoContext::new_for_test("demo");

        // Act
        let html = generate(&ctx, "docs/guide.md", 5, "../../blobs/docs/guide.md", None, "<p>x</p>").into_string();

        // Assert
        assert!(html.contains("guide.md (5B) <a href=\"../../blobs/docs/guide.md\">download</a>"));
        assert!(html.contains("<p>x</p>"));
        assert!(html.contains("href=\"../../../style.css\""));
    }
}
