//! Repository index page listing every rendered repository

use maud::{Markup, html};

use crate::components::commit::signature_date;
use crate::components::layout::page_wrapper;
use crate::index::RepoSummary;
use crate::pages::STYLESHEET;

/// Generates `<output>/index.html` for a multi-repository site
///
/// # Arguments
///
/// * `site_name`: Site title
/// * `footer`: Raw HTML footer, if configured
/// * `repos`: Repositories in display order
///
/// # Returns
///
/// Complete index page
pub fn generate(site_name: &str, footer: Option<&str>, repos: &[RepoSummary]) -> Markup {
    page_wrapper(
        site_name,
        &[STYLESHEET],
        footer,
        html! {
            header {
                h1 { (site_name) }
            }
            hr;
            table id="repositories" {
                thead {
                    tr {
                        td { "Name" }
                        td class="expand" { "Description" }
                        td { "Last changes" }
                    }
                }
                tbody {
                    @for repo in repos {
                        tr {
                            td { a href=(format!("{}/", repo.name)) { (repo.name) } }
                            td { @if let Some(description) = &repo.description { (description) } }
                            td {
                                @if let Some(author) = &repo.last_author && author.valid {
                                    (signature_date(author)) " by " (author.name)
                                }
                            }
                        }
                    }
                }
            }
        },
    )
}
