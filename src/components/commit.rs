//! Commit attribution display components

use maud::{Markup, html};

use crate::git::Signature;
use crate::util::format_date;

/// Renders `Name <email>` with a mailto link, or nothing for an invalid
/// signature.
pub fn signature(sig: &Signature) -> Markup {
    if !sig.valid {
        return html! {};
    }
    html! {
        (sig.name) " <" a href=(format!("mailto:{}", sig.email)) { (sig.email) } ">"
    }
}

/// Absolute signature date, empty for an invalid signature.
pub fn signature_date(sig: &Signature) -> String {
    if sig.valid {
        format_date(sig.time, sig.offset)
    } else {
        String::new()
    }
}

/// Renders a link to a commit page showing the short hash.
pub fn commit_hash(href: &str, hash: &str) -> Markup {
    let short = &hash[..hash.len().min(7)];
    html! {
        a class="commit-hash" href=(href) title=(hash) { code { (short) } }
    }
}
