//! Redirect page for the top-level `index.html`

use maud::{DOCTYPE, Markup, html};

/// Generates a page that forwards the browser to `target`.
///
/// Uses a meta refresh with a plain link for clients that ignore it.
pub fn generate(target: &str) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta http-equiv="refresh" content=(format!("0; url={}", target));
                title { "Redirect" }
            }
            body {
                a href=(target) { "Redirect" }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_targets_ref() {
        // Act
        let html = generate("main/").into_string();

        // Assert
        assert!(html.contains("<meta http-equiv=\"refresh\" content=\"0; url=main/\">"));
        assert!(html.contains("<a href=\"main/\">Redirect</a>"));
    }
}
