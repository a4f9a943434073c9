//! Commit page: header, diffstat and per-file hunks

use maud::{Markup, html};

use crate::components::commit::{signature, signature_date};
use crate::diff::{CommitInfo, DeltaInfo, DeltaStatus, Hunk, LineOrigin};
use crate::pages::{RepoContext, repo_page};
use crate::util::{plural, unhide_path};

/// Commits touching more files than this show no diff.
const MAX_DELTAS: usize = 1000;
/// Commits adding or deleting more lines than this show no diff.
const MAX_CHANGED_LINES: usize = 100_000;
/// Width of the diffstat bar in characters.
const BAR_WIDTH: usize = 80;

/// Generates `commit/<id>.html`
///
/// # Arguments
///
/// * `ctx`: Repository values
/// * `commit`: Materialized commit with its diff
/// * `parent_linked`: Whether the parent's page exists and can be linked
///
/// # Returns
///
/// Complete commit page
pub fn generate(ctx: &RepoContext, commit: &CommitInfo, parent_linked: bool) -> Markup {
    let too_large = commit.deltas().len() > MAX_DELTAS
        || commit.added_lines() > MAX_CHANGED_LINES
        || commit.deleted_lines() > MAX_CHANGED_LINES;

    repo_page(
        ctx,
        commit.summary(),
        1,
        false,
        html! {
            table id="commit-info" {
                tbody {
                    tr {
                        th { "commit" }
                        td { code { (commit.id()) } }
                    }
                    @if let Some(parent) = commit.parent_id() {
                        tr {
                            th { "parent" }
                            td {
                                @if parent_linked {
                                    a href=(format!("{}.html", parent)) { code { (parent) } }
                                } @else {
                                    code { (parent) }
                                }
                            }
                        }
                    }
                    tr {
                        th { "author" }
                        td { (signature(commit.author())) }
                        td class="date" { (signature_date(commit.author())) }
                    }
                    tr {
                        th { "committer" }
                        td { (signature(commit.committer())) }
                        td class="date" { (signature_date(commit.committer())) }
                    }
                }
            }
            pre class="commit-msg" { (commit.message()) }
            @if too_large {
                p { "Diff is too large, output suppressed." }
            } @else {
                (diffstat(commit))
                hr;
                @for (index, delta) in commit.deltas().iter().enumerate() {
                    (delta_section(ctx, index, delta))
                }
            }
        },
    )
}

fn diffstat(commit: &CommitInfo) -> Markup {
    let files = commit.deltas().len();
    html! {
        table id="diffstat" {
            tbody {
                @for (index, delta) in commit.deltas().iter().enumerate() {
                    @let (add, del) = bar_lengths(delta.added_lines, delta.deleted_lines);
                    tr {
                        td class=(status_class(delta.status)) { (delta.status.letter()) }
                        td class="expand" { a href=(format!("#h{}", index)) { (delta_label(delta)) } }
                        td class="num" align="right" {
                            @if delta.binary { "bin" } @else { (delta.added_lines + delta.deleted_lines) }
                        }
                        td class="graph" {
                            span class="add" { ("+".repeat(add)) }
                            span class="del" { ("-".repeat(del)) }
                        }
                    }
                }
            }
        }
        p class="diffstat-summary" {
            (files) " file" (plural(files)) " changed, "
            (commit.added_lines()) " insertion" (plural(commit.added_lines())) "(+), "
            (commit.deleted_lines()) " deletion" (plural(commit.deleted_lines())) "(-)"
        }
    }
}

fn delta_section(ctx: &RepoContext, index: usize, delta: &DeltaInfo) -> Markup {
    let mut line = 0usize;
    html! {
        div class="delta" id=(format!("h{}", index)) {
            pre class="delta-header" {
                "diff --git a/" (delta.old_path) " b/"
                @if let Some(href) = head_file_href(ctx, delta) {
                    a href=(href) { (delta.new_path) }
                } @else {
                    (delta.new_path)
                }
            }
            @if delta.binary {
                p { "Binary files differ." }
            } @else if !delta.hunks.is_empty() {
                table class="diff" {
                    tbody {
                        @for hunk in &delta.hunks {
                            (hunk_rows(index, hunk, &mut line))
                        }
                    }
                }
            }
        }
    }
}

fn hunk_rows(delta: usize, hunk: &Hunk, line: &mut usize) -> Markup {
    let first = *line;
    *line += hunk.lines.len();
    html! {
        tr class="hunk" {
            td {}
            td {}
            td { code { (hunk.header) } }
        }
        @for (offset, change) in hunk.lines.iter().enumerate() {
            @let anchor = format!("h{}-{}", delta, first + offset + 1);
            tr class=(origin_class(change.origin)) id=(anchor) {
                td class="num" {
                    a href=(format!("#{}", anchor)) {
                        @if let Some(old) = change.old_line { (old) }
                    }
                }
                td class="num" {
                    @if let Some(new) = change.new_line { (new) }
                }
                td { code { (change.origin.marker()) (change.content) } }
            }
        }
    }
}

/// Link into the default ref's file pages when the path still exists there.
fn head_file_href(ctx: &RepoContext, delta: &DeltaInfo) -> Option<String> {
    let default_ref = ctx.default_ref.as_ref()?;
    if delta.status == DeltaStatus::Deleted || !ctx.head_files.contains(&delta.new_path) {
        return None;
    }
    Some(format!(
        "{}{}/files/{}.html",
        ctx.repo_root(1),
        default_ref,
        unhide_path(&delta.new_path)
    ))
}

fn delta_label(delta: &DeltaInfo) -> String {
    match delta.status {
        DeltaStatus::Renamed | DeltaStatus::Copied => {
            format!("{} => {}", delta.old_path, delta.new_path)
        }
        _ => delta.path().to_string(),
    }
}

fn status_class(status: DeltaStatus) -> String {
    format!("status-{}", status.letter().to_ascii_lowercase())
}

fn origin_class(origin: LineOrigin) -> &'static str {
    match origin {
        LineOrigin::Context => "ctx",
        LineOrigin::Addition => "add",
        LineOrigin::Deletion => "del",
    }
}

/// Scales a delta's `+`/`-` counts to fit the bar.
fn bar_lengths(added: usize, deleted: usize) -> (usize, usize) {
    let changed = added + deleted;
    if changed <= BAR_WIDTH {
        return (added, deleted);
    }
    let add = if added == 0 { 0 } else { (BAR_WIDTH * added / changed + 1).min(BAR_WIDTH) };
    let del = if deleted == 0 { 0 } else { BAR_WIDTH - add };
    (add, del)
}
