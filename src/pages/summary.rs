//! Ref summary page: branch and tag tables, clone hint and about file

use maud::{Markup, html};

use crate::components::commit::signature_date;
use crate::pages::{RepoContext, repo_page};
use crate::refs::ReferenceInfo;
use crate::util::truncate;

/// Characters of a tip's summary shown in the ref tables.
const MAX_SUMMARY: usize = 30;

/// Generates `R/index.html`
///
/// # Arguments
///
/// * `ctx`: Repository values
/// * `refs`: All refs in display order
/// * `current`: Ref whose directory the page is written to
/// * `about`: Rendered about file, if one exists in the ref's tree
///
/// # Returns
///
/// Complete summary page
pub fn generate(
    ctx: &RepoContext,
    refs: &[ReferenceInfo],
    current: &ReferenceInfo,
    about: Option<Markup>,
) -> Markup {
    let (branches, tags): (Vec<&ReferenceInfo>, Vec<&ReferenceInfo>) =
        refs.iter().partition(|r| !r.is_tag());

    repo_page(
        ctx,
        current.name(),
        1,
        true,
        html! {
            div id="refcontainer" {
                (ref_table("Branches", &branches, current))
                @if !tags.is_empty() {
                    (ref_table("Tags", &tags, current))
                }
            }
            hr;
            @if let Some(prefix) = &ctx.clone_url {
                h2 { "Clone" }
                pre { "git clone " (prefix) }
            }
            @if let Some(about) = about {
                h2 { "About" }
                (about)
            }
        },
    )
}

fn ref_table(title: &str, refs: &[&ReferenceInfo], current: &ReferenceInfo) -> Markup {
    html! {
        div class="ref" {
            h2 { (title) }
            table {
                thead {
                    tr {
                        td class="expand" { "Name" }
                        td { "Last commit date" }
                        td { "Author" }
                    }
                }
                tbody {
                    @for reference in refs {
                        @let commit = reference.commit();
                        @let is_current = reference.name() == current.name() && reference.is_tag() == current.is_tag();
                        tr class=[is_current.then_some("current-ref")] {
                            td {
                                a href=(format!("../{}/", reference.refname())) { (reference.name()) }
                                " "
                                small {
                                    "at \""
                                    a href=(format!("../commit/{}.html", commit.id)) {
                                        (truncate(commit.summary(), MAX_SUMMARY))
                                    }
                                    "\""
                                }
                            }
                            td { (signature_date(&commit.author)) }
                            td { @if commit.author.valid { (commit.author.name) } }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refs::compare_refs;

    #[test]
    fn test_summary_marks_current_ref() {
        // Arrange
        let ctx = RepoContext::new_for_test("demo");
        let mut refs = vec![
            ReferenceInfo::new_for_test("main", false, 200),
            ReferenceInfo::new_for_test("dev", false, 100),
            ReferenceInfo::new_for_test("v1.0", true, 50),
        ];
        refs.sort_by(compare_refs);

        // Act
        let html = generate(&ctx, &refs, &refs[1], None).into_string();

        // Assert
        assert!(html.contains("<h2>Branches</h2>"));
        assert!(html.contains("<h2>Tags</h2>"));
        assert!(html.contains("<tr class=\"current-ref\"><td><a href=\"../dev/\">dev</a>"));
        assert_eq!(html.matches("current-ref").count(), 1);
        assert!(!html.contains("<h2>About</h2>"));
    }

    #[test]
    fn test_summary_truncates_tip_message() {
        // Arrange
        let ctx = RepoContext::new_for_test("demo");
        let long = "a-branch-name-that-is-much-longer-than-thirty";
        let refs = vec![ReferenceInfo::new_for_test(long, false, 1)];

        // Act
        let html = generate(&ctx, &refs, &refs[0], None).into_string();

        // Assert
        assert!(html.contains("a-branch-name-that-is-much-lon..."));
    }

    #[test]
    fn test_summary_clone_and_about() {
        // Arrange
        let mut ctx = RepoContext::new_for_test("demo");
        ctx.clone_url = Some("https://git.example.com/demo".to_string());
        let refs = vec![ReferenceInfo::new_for_test("main", false, 1)];

        // Act
        let html = generate(&ctx, &refs, &refs[0], Some(html! { p { "hello" } })).into_string();

        // Assert
        assert!(html.contains("<pre>git clone https://git.example.com/demo</pre>"));
        assert!(html.contains("<h2>About</h2><p>hello</p>"));
    }
}
