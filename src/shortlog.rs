//! Author statistics and the commit activity graph of a ref.
//!
//! Counts come from every commit reachable from the tip, not the truncated
//! listing, and only need commit headers, so the walk is cheap compared to
//! diffing.

use anyhow::{Context, Result};
use maud::html;
use std::collections::BTreeMap;
use time::macros::format_description;
use time::{Date, Month, OffsetDateTime};

use crate::git::{self, Signature};
use crate::refs::ReferenceInfo;

const SECONDS_PER_DAY: i64 = 60 * 60 * 24;
const DAYS_PER_YEAR: i64 = 365;
/// Oldest month kept in the monthly histogram, counted back from the newest.
const MAX_MONTHS: i64 = 1200;

const GRAPH_WIDTH: i64 = 1200;
const GRAPH_HEIGHT: i64 = 500;
const PAD_TOP: i64 = 100;
const PAD_BOTTOM: i64 = 100;
const PAD_LEFT: i64 = 20;
const PAD_RIGHT: i64 = 20;
const POINT_RADIUS: i64 = 3;
const LABEL_CHAR_WIDTH: i64 = 4;
const GRAPH_COLOR: &str = "#3498db";

/// Commits by one author identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorCount {
    pub name: String,
    pub email: String,
    pub count: usize,
}

/// Commits on one day (or month) of the history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayCount {
    /// Days since the Unix epoch; the first day of the month for monthly
    /// entries.
    pub day: i64,
    pub count: usize,
    /// Labels of refs whose tip falls on this day.
    pub refs: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Shortlog {
    authors: Vec<AuthorCount>,
    days: Vec<DayCount>,
    by_month: bool,
}

impl Shortlog {
    /// Walks every ancestor of `tip` and aggregates their authors.
    ///
    /// # Errors
    ///
    /// Returns error if the walk fails or a commit cannot be read.
    pub fn collect(repo: &gix::Repository, tip: gix::ObjectId, refs: &[ReferenceInfo]) -> Result<Self> {
        let authors = git::ancestors(repo, tip)?
            .into_iter()
            .map(|id| {
                git::read_commit(repo, id)
                    .map(|header| header.author)
                    .with_context(|| format!("Failed to read history of {}", tip))
            })
            .collect::<Result<Vec<_>>>()?;

        let labels: Vec<(String, i64)> = refs
            .iter()
            .map(|r| {
                let label = if r.is_tag() {
                    format!("[{}]", r.name())
                } else {
                    r.name().to_string()
                };
                (label, r.commit().author.time)
            })
            .collect();

        Ok(Self::from_signatures(&authors, &labels))
    }

    /// Aggregates author signatures (newest first) and ref labels.
    ///
    /// The histogram has one entry per day between the oldest and newest
    /// commit, newest first. When that spans more than a year it has one
    /// entry per calendar month instead, limited to the newest
    /// `MAX_MONTHS` months.
    pub fn from_signatures(signatures: &[Signature], labels: &[(String, i64)]) -> Self {
        let mut by_author: Vec<AuthorCount> = Vec::new();
        let mut per_day: BTreeMap<i64, usize> = BTreeMap::new();

        for sig in signatures {
            match by_author
                .iter_mut()
                .find(|a| a.name == sig.name && a.email == sig.email)
            {
                Some(author) => author.count += 1,
                None => by_author.push(AuthorCount {
                    name: sig.name.clone(),
                    email: sig.email.clone(),
                    count: 1,
                }),
            }
            *per_day.entry(sig.time.div_euclid(SECONDS_PER_DAY)).or_default() += 1;
        }
        by_author.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));

        let span = match (per_day.keys().next(), per_day.keys().next_back()) {
            (Some(&first), Some(&last)) => last - first,
            _ => 0,
        };
        let by_month = span >= DAYS_PER_YEAR;
        let days = if by_month {
            month_buckets(&per_day, labels)
        } else {
            day_buckets(&per_day, labels)
        };

        Self {
            authors: by_author,
            days,
            by_month,
        }
    }

    pub fn authors(&self) -> &[AuthorCount] {
        &self.authors
    }

    /// Histogram entries, newest first.
    pub fn days(&self) -> &[DayCount] {
        &self.days
    }

    pub fn by_month(&self) -> bool {
        self.by_month
    }

    pub fn is_empty(&self) -> bool {
        self.authors.is_empty()
    }

    /// Renders the histogram as a standalone SVG line graph.
    ///
    /// Newest entries are drawn on the right. Entries with commits or ref
    /// labels get a point, a count and a date label; ref labels are drawn
    /// along a dashed marker at the top.
    pub fn render_svg(&self) -> String {
        let max_count = self.days.iter().map(|d| d.count).max().unwrap_or(0).max(1) as f64;
        let x_scale = if self.days.len() > 1 {
            (GRAPH_WIDTH - PAD_LEFT - PAD_RIGHT) as f64 / (self.days.len() - 1) as f64
        } else {
            0.0
        };
        let y_scale = (GRAPH_HEIGHT - PAD_TOP - PAD_BOTTOM) as f64 / max_count;

        let x_at = |i: usize| GRAPH_WIDTH - PAD_RIGHT - (i as f64 * x_scale) as i64;
        let y_at = |count: usize| GRAPH_HEIGHT - PAD_BOTTOM - (count as f64 * y_scale) as i64;
        let label_y = GRAPH_HEIGHT - PAD_BOTTOM + 10;

        html! {
            svg xmlns="http://www.w3.org/2000/svg" viewBox=(format!("0 0 {} {}", GRAPH_WIDTH, GRAPH_HEIGHT)) {
                @for (i, pair) in self.days.windows(2).enumerate() {
                    line x1=(x_at(i)) y1=(y_at(pair[0].count)) x2=(x_at(i + 1)) y2=(y_at(pair[1].count))
                        stroke=(GRAPH_COLOR) stroke-width="2" {}
                }
                @for (i, entry) in self.days.iter().enumerate() {
                    @let x = x_at(i);
                    @let y = y_at(entry.count);
                    @if entry.count > 0 || !entry.refs.is_empty() {
                        text x=(x - 2) y=(label_y) font-size="8px" text-anchor="start"
                            transform=(format!("rotate(90 {},{})", x - 2, label_y)) {
                            (self.date_label(entry.day))
                        }
                        text x=(x) y=(y - 10) font-size="10px" text-anchor="middle" { (entry.count) }
                        circle cx=(x) cy=(y) r=(POINT_RADIUS) fill=(GRAPH_COLOR) {}
                    }
                    @if !entry.refs.is_empty() {
                        @let label = entry.refs.join(", ");
                        line x1=(x) y1=(20 + LABEL_CHAR_WIDTH * label.chars().count() as i64) x2=(x) y2=(y - 30)
                            stroke="#000" stroke-width="1" stroke-dasharray="4" {}
                        text x=(x - 2) y="10" font-size="8px" text-anchor="start"
                            transform=(format!("rotate(90 {},10)", x - 2)) {
                            (label)
                        }
                    }
                }
            }
        }
        .into_string()
    }

    fn date_label(&self, day: i64) -> String {
        let date = OffsetDateTime::from_unix_timestamp(day * SECONDS_PER_DAY)
            .unwrap_or(OffsetDateTime::UNIX_EPOCH);
        let formatted = if self.by_month {
            date.format(format_description!("[month repr:long] [year]"))
        } else {
            date.format(format_description!("[day padding:none] [month repr:long] [year]"))
        };
        formatted.unwrap_or_else(|_| day.to_string())
    }
}

/// One entry per day from the newest commit day back to the oldest.
fn day_buckets(per_day: &BTreeMap<i64, usize>, labels: &[(String, i64)]) -> Vec<DayCount> {
    let (Some(&first), Some(&last)) = (per_day.keys().next(), per_day.keys().next_back()) else {
        return Vec::new();
    };
    let mut refs = labels_by(labels, |time| Some(time.div_euclid(SECONDS_PER_DAY)));

    (first..=last)
        .rev()
        .map(|day| DayCount {
            day,
            count: per_day.get(&day).copied().unwrap_or(0),
            refs: refs.remove(&day).unwrap_or_default(),
        })
        .collect()
}

/// One entry per calendar month, newest first, with empty months filled.
///
/// Only months present in existing commits are looked up, so distant
/// outlier timestamps cost one entry each rather than one per day.
fn month_buckets(per_day: &BTreeMap<i64, usize>, labels: &[(String, i64)]) -> Vec<DayCount> {
    let mut per_month: BTreeMap<i64, usize> = BTreeMap::new();
    for (&day, &count) in per_day {
        if let Some(month) = month_index(day) {
            *per_month.entry(month).or_default() += count;
        }
    }
    let (Some(&first), Some(&last)) = (per_month.keys().next(), per_month.keys().next_back()) else {
        return Vec::new();
    };
    let first = first.max(last - MAX_MONTHS + 1);
    let mut refs = labels_by(labels, |time| month_index(time.div_euclid(SECONDS_PER_DAY)));

    (first..=last)
        .rev()
        .filter_map(|month| {
            Some(DayCount {
                day: month_start(month)?,
                count: per_month.get(&month).copied().unwrap_or(0),
                refs: refs.remove(&month).unwrap_or_default(),
            })
        })
        .collect()
}

/// Groups ref labels by the bucket their tip time falls into.
fn labels_by(labels: &[(String, i64)], bucket: impl Fn(i64) -> Option<i64>) -> BTreeMap<i64, Vec<String>> {
    let mut grouped: BTreeMap<i64, Vec<String>> = BTreeMap::new();
    for (label, time) in labels {
        if let Some(key) = bucket(*time) {
            grouped.entry(key).or_default().push(label.clone());
        }
    }
    grouped
}

/// Months since year 0 of the calendar month containing `day`.
fn month_index(day: i64) -> Option<i64> {
    let date = OffsetDateTime::from_unix_timestamp(day.checked_mul(SECONDS_PER_DAY)?).ok()?;
    Some(i64::from(date.year()) * 12 + i64::from(u8::from(date.month())) - 1)
}

/// First day (since the epoch) of month `index`.
fn month_start(index: i64) -> Option<i64> {
    let year = i32::try_from(index.div_euclid(12)).ok()?;
    let month = Month::try_from(u8::try_from(index.rem_euclid(12) + 1).ok()?).ok()?;
    let date = Date::from_calendar_date(year, month, 1).ok()?;
    Some(date.midnight().assume_utc().unix_timestamp().div_euclid(SECONDS_PER_DAY))
}
