//! Tree page generation for directory browsing

use maud::{Markup, html};

use crate::components::file_list::{FileRow, file_table};
use crate::pages::{RepoContext, repo_page};

/// Generates `R/files/<dir>/index.html`
///
/// Rows are built by the tree emitter; directories inlined by the split
/// policy appear as `child/name` rows of this page.
///
/// # Arguments
///
/// * `ctx`: Repository values
/// * `ref_name`: Ref the listing belongs to
/// * `dir_path`: Directory within the tree, empty for the root
/// * `rows`: Listing rows in display order
///
/// # Returns
///
/// Complete listing page
///
/// # Examples
///
/// ```no_run
/// use gitin::components::file_list::FileRow;
/// use gitin::pages::RepoContext;
/// use gitin::pages::tree::generate;
///
/// let ctx = RepoContext::default();
/// let rows = vec![FileRow {
///     mode: "-rw-r--r--",
///     name: "README.md".to_string(),
///     href: Some("README.md.html".to_string()),
///     suffix: None,
///     size: Some(5),
/// }];
/// let page = generate(&ctx, "main", "", &rows);
/// ```
pub fn generate(ctx: &RepoContext, ref_name: &str, dir_path: &str, rows: &[FileRow]) -> Markup {
    let depth = if dir_path.is_empty() {
        2
    } else {
        3 + dir_path.matches('/').count()
    };
    let title = if dir_path.is_empty() {
        format!("Files of {}", ref_name)
    } else {
        dir_path.to_string()
    };

    repo_page(
        ctx,
        &title,
        depth,
        true,
        html! {
            h2 class="path" {
                (ref_name) ":/" (dir_path)
            }
            @if rows.is_empty() {
                p { "Empty directory." }
            } @else {
                (file_table(rows))
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str) -> FileRow {
        FileRow {
            mode: "-rw-r--r--",
            name: name.to_string(),
            href: Some(format!("{}.html", name)),
            suffix: None,
            size: Some(5),
        }
    }

    #[test]
    fn test_root_listing() {
        // Arrange
        let ctx = RepoContext::new_for_test("demo");

        // Act
        let html = generate(&ctx, "main", "", &[row("README.md")]).into_string();

        // Assert
        assert!(html.contains("<title>Files of main - demo - Repositories</title>"));
        assert!(html.contains("<a href=\"README.md.html\">README.md</a>"));
        assert!(html.contains("href=\"../../style.css\""));
        assert!(html.contains("<a href=\"../index.html\">Summary</a>"));
    }

    #[test]
    fn test_nested_listing_depth() {
        // Arrange
        let ctx = RepoContext::new_for_test("demo");

        // Act
        let html = generate(&ctx, "main", "src/bin", &[row("tool.rs")]).into_string();

        // Assert
        assert!(html.contains("main:/src/bin"));
        assert!(html.contains("href=\"../../../../style.css\""));
        assert!(html.contains("<a href=\"../../../log.html\">Log</a>"));
    }

    #[test]
    fn test_empty_listing() {
        // Arrange
        let ctx = RepoContext::new_for_test("demo");

        // Act
        let html = generate(&ctx, "main", "", &[]).into_string();

        // Assert
        assert!(html.contains("Empty directory."));
    }
}
