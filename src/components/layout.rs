//! Page layout wrapper component

use maud::{DOCTYPE, Markup, PreEscaped, html};

/// Wraps page content with standard HTML structure
///
/// Provides the DOCTYPE, head with charset, viewport and stylesheets, the
/// content container and the optional footer. The footer text is site
/// configuration and inserted verbatim.
///
/// # Arguments
///
/// * `title`: Full page title
/// * `stylesheets`: CSS file paths, relative to the page
/// * `footer`: Raw HTML footer, if configured
/// * `body`: Page-specific body markup
///
/// # Returns
///
/// Complete HTML document with wrapped content
pub fn page_wrapper(title: &str, stylesheets: &[&str], footer: Option<&str>, body: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                @for stylesheet in stylesheets {
                    link rel="stylesheet" href=(stylesheet);
                }
            }
            body {
                div id="content" {
                    (body)
                }
                @if let Some(footer) = footer {
                    div id="footer" { (PreEscaped(footer)) }
                }
            }
        }
    }
}
