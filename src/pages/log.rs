//! Ref log page: archives, shortlog, commit graph and the commit listing

use maud::{Markup, html};
use std::sync::Arc;

use crate::archive::ArchiveInfo;
use crate::commits::History;
use crate::components::commit::signature_date;
use crate::diff::CommitInfo;
use crate::pages::{RepoContext, repo_page};
use crate::refs::ReferenceInfo;
use crate::shortlog::Shortlog;
use crate::util::{plural, split_unit};

/// Generates `R/log.html`
///
/// # Arguments
///
/// * `ctx`: Repository values
/// * `reference`: Ref being listed
/// * `history`: Listed commits of the ref, newest first
/// * `archives`: Archives written for the ref's tip
/// * `shortlog`: Author counts and histogram over the ref's history
///
/// # Returns
///
/// Complete log page
pub fn generate(
    ctx: &RepoContext,
    reference: &ReferenceInfo,
    history: &History,
    archives: &[ArchiveInfo],
    shortlog: &Shortlog,
) -> Markup {
    let title = format!("Log of {}", reference.name());

    repo_page(
        ctx,
        &title,
        1,
        true,
        html! {
            @if !archives.is_empty() {
                h2 { "Archives" }
                table id="archives" {
                    thead {
                        tr {
                            td class="expand" { "Name" }
                            td class="num" align="right" { "Size" }
                        }
                    }
                    tbody {
                        @for archive in archives {
                            tr {
                                td { a href=(archive.file_name) { (archive.file_name) } }
                                td class="num" align="right" { (split_unit(archive.size)) }
                            }
                        }
                    }
                }
            }
            @if !shortlog.is_empty() {
                h2 { "Shortlog" }
                table id="shortlog" {
                    thead {
                        tr {
                            td class="num" align="right" { "Count" }
                            td { "Author" }
                            td class="expand" { "E-Mail" }
                        }
                    }
                    tbody {
                        @for author in shortlog.authors() {
                            tr {
                                td class="num" align="right" { (author.count) }
                                td { (author.name) }
                                td { a href=(format!("mailto:{}", author.email)) { (author.email) } }
                            }
                        }
                    }
                }
                h2 { "Commit Graph" }
                img id="shortlog-graph" src="log.svg" alt="Commits per day";
            }
            h2 { "Commits of " (reference.name()) }
            table id="log" {
                thead {
                    tr {
                        td { "Date" }
                        td class="expand" { "Commit message" }
                        td { "Author" }
                        td class="num" align="right" { "Files" }
                        td class="num" align="right" { "+" }
                        td class="num" align="right" { "-" }
                    }
                }
                tbody {
                    @for commit in history.commits() {
                        (commit_row(commit))
                    }
                    @if history.left_out() > 0 {
                        tr {
                            td {}
                            td colspan="5" {
                                (history.left_out()) " commit" (plural(history.left_out())) " left out."
                            }
                        }
                    }
                }
            }
        },
    )
}

fn commit_row(commit: &Arc<CommitInfo>) -> Markup {
    html! {
        tr {
            td { (signature_date(commit.author())) }
            td { a href=(format!("../commit/{}.html", commit.id())) { (commit.summary()) } }
            td { @if commit.author().valid { (commit.author().name) } }
            td class="num" align="right" { (commit.deltas().len()) }
            td class="num" align="right" { "+" (commit.added_lines()) }
            td class="num" align="right" { "-" (commit.deleted_lines()) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArchiveFormat;
    use crate::git::Signature;

    const ID: &str = "3b18e512dba79e4c8300dd08aeb37f8e728b8dad";

    fn history(total: usize) -> History {
        let commit = Arc::new(CommitInfo::new_for_test(ID, None, "Add <README>", 1_704_067_200, Vec::new()));
        History::new_for_test(vec![commit], total)
    }

    #[test]
    fn test_log_lists_commits() {
        // Arrange
        let ctx = RepoContext::new_for_test("demo");
        let reference = ReferenceInfo::new_for_test("main", false, 1);
        let shortlog = Shortlog::default();

        // Act
        let html = generate(&ctx, &reference, &history(1), &[], &shortlog).into_string();

        // Assert
        assert!(html.contains("<h2>Commits of main</h2>"));
        assert!(html.contains(&format!("<a href=\"../commit/{}.html\">Add &lt;README&gt;</a>", ID)));
        assert!(html.contains("2024-01-01 00:00 +00:00"));
        assert!(!html.contains("left out"));
        assert!(!html.contains("<h2>Archives</h2>"));
        assert!(!html.contains("shortlog-graph"));
    }

    #[test]
    fn test_log_reports_truncation() {
        // Arrange
        let ctx = RepoContext::new_for_test("demo");
        let reference = ReferenceInfo::new_for_test("main", false, 1);

        // Act
        let html = generate(&ctx, &reference, &history(4), &[], &Shortlog::default()).into_string();

        // Assert
        assert!(html.contains("3 commits left out."));
    }

    #[test]
    fn test_log_archives_and_shortlog() {
        // Arrange
        let ctx = RepoContext::new_for_test("demo");
        let reference = ReferenceInfo::new_for_test("main", false, 1);
        let archives = vec![ArchiveInfo {
            format: ArchiveFormat::TarGz,
            file_name: "demo-main.tar.gz".to_string(),
            size: 1536,
        }];
        let author = Signature {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            time: 1_704_067_200,
            offset: 0,
            valid: true,
        };
        let shortlog = Shortlog::from_signatures(&[author], &[]);

        // Act
        let html = generate(&ctx, &reference, &history(1), &archives, &shortlog).into_string();

        // Assert
        assert!(html.contains("<a href=\"demo-main.tar.gz\">demo-main.tar.gz</a>"));
        assert!(html.contains("1.5 KiB"));
        assert!(html.contains("<h2>Shortlog</h2>"));
        assert!(html.contains("mailto:ada@example.com"));
        assert!(html.contains("<img id=\"shortlog-graph\" src=\"log.svg\""));
    }
}
