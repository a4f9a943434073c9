//! File listing table components

use maud::{Markup, html};

/// One row of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRow {
    /// `ls -l` style mode column.
    pub mode: &'static str,
    /// Path shown, relative to the listed directory.
    pub name: String,
    /// Link target relative to the listing page; submodules have none.
    pub href: Option<String>,
    /// Text after the name, e.g. the commit of a submodule.
    pub suffix: Option<String>,
    /// Blob size in bytes; directories and submodules have none.
    pub size: Option<u64>,
}

/// Wraps file rows in the listing table
///
/// # Arguments
///
/// * `rows`: Rows in display order
///
/// # Returns
///
/// Table with Mode, Name and Size columns
pub fn file_table(rows: &[FileRow]) -> Markup {
    html! {
        table id="files" {
            thead {
                tr {
                    td { "Mode" }
                    td class="expand" { "Name" }
                    td class="num" align="right" { "Size" }
                }
            }
            tbody {
                @for row in rows {
                    (file_row(row))
                }
            }
        }
    }
}

/// Renders a single listing row
pub fn file_row(row: &FileRow) -> Markup {
    html! {
        tr {
            td { code { (row.mode) } }
            td {
                @if let Some(href) = &row.href {
                    a href=(href) { (row.name) }
                } @else {
                    (row.name)
                }
                @if let Some(suffix) = &row.suffix {
                    " " (suffix)
                }
            }
            td class="num" align="right" {
                @if let Some(size) = row.size {
                    (size) "B"
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_row_shows_size_in_bytes() {
        // Arrange
        let row = FileRow {
            mode: "-rw-r--r--",
            name: "README.md".to_string(),
            href: Some("README.md.html".to_string()),
            suffix: None,
            size: Some(5),
        };

        // Act
        let html = file_table(&[row]).into_string();

        // Assert
        assert!(html.contains("<a href=\"README.md.html\">README.md</a>"));
        assert!(html.contains(">5B</td>"));
    }

    #[test]
    fn test_submodule_row_has_no_link() {
        // Arrange
        let row = FileRow {
            mode: "m---------",
            name: "vendor/lib".to_string(),
            href: None,
            suffix: Some("@ 3b18e512dba79e4c8300dd08aeb37f8e728b8dad".to_string()),
            size: None,
        };

        // Act
        let html = file_row(&row).into_string();

        // Assert
        assert!(html.contains("<code>m---------</code>"));
        assert!(html.contains("vendor/lib @ 3b18e512"));
        assert!(!html.contains("<a "));
    }
}
