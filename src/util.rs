//! Utility functions for page and path generation

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

/// Counts the directory levels between a site-relative page path and the
/// site root.
///
/// Pages live at paths such as `main/files/src/lib.rs.html`; every `/`
/// separates one directory level that must be climbed back with `../`.
///
/// # Arguments
///
/// * `page_path`: Site-relative path of the generated page
///
/// # Returns
///
/// Number of `../` prefixes needed to reach the site root
pub fn calculate_depth(page_path: &str) -> usize {
    page_path.trim_start_matches('/').matches('/').count()
}

/// Builds the `../` prefix for a page at the given depth.
pub fn relative_root(depth: usize) -> String {
    "../".repeat(depth)
}

/// Replaces a leading dot in every path component with `-`.
///
/// Web servers commonly refuse to serve dotfiles, so `.github/ci.yml`
/// is written as `-github/ci.yml` in the output tree.
pub fn unhide_path(path: &str) -> String {
    path.split('/')
        .map(|component| match component.strip_prefix('.') {
            Some(rest) => format!("-{}", rest),
            _ => component.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Turns a short reference name into a single directory component.
///
/// `feature/login` becomes `feature-login`.
pub fn escape_refname(shorthand: &str) -> String {
    shorthand.replace('/', "-")
}

/// Formats a byte count with binary unit suffixes.
///
/// # Arguments
///
/// * `bytes`: Size in bytes
///
/// # Returns
///
/// Strings like `512 B`, `1.5 KiB` or `2.0 MiB`
pub fn split_unit(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", size, UNITS[unit])
}

fn to_datetime(seconds: i64, offset: i32) -> OffsetDateTime {
    let utc = OffsetDateTime::from_unix_timestamp(seconds).unwrap_or(OffsetDateTime::UNIX_EPOCH);
    match UtcOffset::from_whole_seconds(offset) {
        Ok(offset) => utc.to_offset(offset),
        Err(_) => utc,
    }
}

/// Formats a commit timestamp in the committer's own timezone.
///
/// Output is absolute (`2024-03-01 14:05 +01:00`) so repeated runs produce
/// identical pages.
pub fn format_date(seconds: i64, offset: i32) -> String {
    let fmt = format_description!(
        "[year]-[month]-[day] [hour]:[minute] [offset_hour sign:mandatory]:[offset_minute]"
    );
    to_datetime(seconds, offset)
        .format(&fmt)
        .unwrap_or_else(|_| seconds.to_string())
}

/// Formats a calendar day (`2024-03-01`) in UTC.
pub fn format_day(seconds: i64) -> String {
    let fmt = format_description!("[year]-[month]-[day]");
    to_datetime(seconds, 0)
        .format(&fmt)
        .unwrap_or_else(|_| seconds.to_string())
}

/// Formats a calendar month (`2024-03`) in UTC.
pub fn format_month(seconds: i64) -> String {
    let fmt = format_description!("[year]-[month]");
    to_datetime(seconds, 0)
        .format(&fmt)
        .unwrap_or_else(|_| seconds.to_string())
}

/// Formats a timestamp as RFC 3339 for feeds.
pub fn format_rfc3339(seconds: i64, offset: i32) -> String {
    to_datetime(seconds, offset)
        .format(&Rfc3339)
        .unwrap_or_else(|_| seconds.to_string())
}

/// Escapes HTML special characters.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Returns `"s"` unless `count` is exactly one.
pub fn plural(count: usize) -> &'static str {
    if count == 1 { "" } else { "s" }
}

/// Shortens text to at most `max` characters, appending `...` when cut.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max).collect();
    cut.push_str("...");
    cut
}
