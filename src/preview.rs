//! File previews shown above the highlighted source.
//!
//! A preview is chosen by matching the file name against the configured
//! `[[preview]]` rules first, then the built-in table. Rendering failures
//! never break the page: the file is shown as escaped text instead.

use anyhow::{Context, Result, bail};
use maud::{Markup, PreEscaped, html};
use std::time::Duration;
use tracing::warn;

use crate::cache::{CacheKey, CacheStore};
use crate::config::PreviewRule;
use crate::execute::execute_cached;
use crate::highlight::{Highlighter, file_type};
use crate::markdown::MarkdownRenderer;

const MARKDOWN_PATTERNS: &[&str] = &["*.md", "*.markdown"];
const IMAGE_PATTERNS: &[&str] = &[
    "*.png", "*.jpg", "*.jpeg", "*.gif", "*.svg", "*.webp", "*.ico",
];

/// Parsed structured configuration, rendered as a nested list.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Null,
    Scalar(String),
    Sequence(Vec<ConfigValue>),
    Mapping(Vec<(String, ConfigValue)>),
}

impl ConfigValue {
    /// Parses `data` as the given format (`json` or `toml`).
    ///
    /// # Errors
    ///
    /// Returns error if the format is unsupported or the data does not parse.
    pub fn parse(data: &str, format: &str) -> Result<Self> {
        match format.to_ascii_lowercase().as_str() {
            "json" => {
                let value: serde_json::Value =
                    serde_json::from_str(data).context("Failed to parse JSON")?;
                Ok(Self::from(value))
            }
            "toml" => {
                let value: toml::Value = toml::from_str(data).context("Failed to parse TOML")?;
                Ok(Self::from(value))
            }
            other => bail!("Unsupported config format: {}", other),
        }
    }

    pub fn render(&self) -> Markup {
        match self {
            Self::Null => html! { i { "null" } },
            Self::Scalar(value) => html! { code { (value) } },
            Self::Sequence(items) => html! {
                ol {
                    @for item in items {
                        li { (item.render()) }
                    }
                }
            },
            Self::Mapping(entries) => html! {
                ul {
                    @for (key, value) in entries {
                        li { b { (key) ":" } " " (value.render()) }
                    }
                }
            },
        }
    }
}

impl From<serde_json::Value> for ConfigValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Scalar(b.to_string()),
            Value::Number(n) => Self::Scalar(n.to_string()),
            Value::String(s) => Self::Scalar(s),
            Value::Array(items) => Self::Sequence(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => {
                Self::Mapping(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<toml::Value> for ConfigValue {
    fn from(value: toml::Value) -> Self {
        use toml::Value;
        match value {
            Value::String(s) => Self::Scalar(s),
            Value::Integer(i) => Self::Scalar(i.to_string()),
            Value::Float(f) => Self::Scalar(f.to_string()),
            Value::Boolean(b) => Self::Scalar(b.to_string()),
            Value::Datetime(d) => Self::Scalar(d.to_string()),
            Value::Array(items) => Self::Sequence(items.into_iter().map(Self::from).collect()),
            Value::Table(map) => {
                Self::Mapping(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

/// Matches a file name against a pattern with at most one `*`.
pub fn matches_pattern(pattern: &str, name: &str) -> bool {
    match pattern.split_once('*') {
        Some((prefix, suffix)) => {
            name.len() >= prefix.len() + suffix.len()
                && name.starts_with(prefix)
                && name.ends_with(suffix)
        }
        None => pattern == name,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Previewer<'r> {
    Markdown,
    Image,
    ConfigTree(&'static str),
    Command { index: usize, rule: &'r PreviewRule },
}

fn select<'r>(rules: &'r [PreviewRule], name: &str) -> Option<Previewer<'r>> {
    if let Some((index, rule)) = rules
        .iter()
        .enumerate()
        .find(|(_, rule)| matches_pattern(&rule.pattern, name))
    {
        return Some(Previewer::Command { index, rule });
    }

    let lower = name.to_ascii_lowercase();
    let any = |patterns: &[&str]| patterns.iter().any(|p| matches_pattern(p, &lower));
    if any(MARKDOWN_PATTERNS) {
        Some(Previewer::Markdown)
    } else if any(IMAGE_PATTERNS) {
        Some(Previewer::Image)
    } else if matches_pattern("*.json", &lower) {
        Some(Previewer::ConfigTree("json"))
    } else if matches_pattern("*.toml", &lower) {
        Some(Previewer::ConfigTree("toml"))
    } else {
        None
    }
}

/// Preview renderer shared by blob and summary pages.
pub struct Previews<'a> {
    cache: &'a CacheStore,
    highlighter: &'a Highlighter,
    rules: &'a [PreviewRule],
    timeout: Option<Duration>,
}

impl<'a> Previews<'a> {
    pub fn new(
        cache: &'a CacheStore,
        highlighter: &'a Highlighter,
        rules: &'a [PreviewRule],
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            cache,
            highlighter,
            rules,
            timeout,
        }
    }

    /// Whether the preview for `name` depends on where the page lives.
    ///
    /// Image previews link to the raw file, so they cannot be shared
    /// between pages at different paths.
    pub fn is_positional(&self, name: &str) -> bool {
        matches!(select(self.rules, name), Some(Previewer::Image))
    }

    /// Renders the preview for a blob, or `None` if nothing matches.
    ///
    /// # Arguments
    ///
    /// * `name`: File name used for matching
    /// * `oid`: Blob id, the cache fingerprint for command previews
    /// * `data`: Blob content
    /// * `raw_href`: Link to the raw file, relative to the page
    pub fn render(
        &self,
        name: &str,
        oid: &gix::ObjectId,
        data: &[u8],
        raw_href: &str,
    ) -> Option<Markup> {
        let previewer = select(self.rules, name)?;

        let body = match &previewer {
            Previewer::Image => Ok(html! { img height="100px" src=(raw_href) alt=(name); }),
            Previewer::Markdown => MarkdownRenderer::new(self.highlighter)
                .render(&String::from_utf8_lossy(data))
                .map(PreEscaped),
            Previewer::ConfigTree(format) => {
                ConfigValue::parse(&String::from_utf8_lossy(data), format).map(|v| v.render())
            }
            Previewer::Command { index, rule } => self.run_command(*index, rule, name, oid, data),
        };

        let body = body.unwrap_or_else(|e| {
            warn!(file = name, error = %format!("{:#}", e), "preview failed, showing text");
            html! { pre { (String::from_utf8_lossy(data)) } }
        });

        Some(html! {
            div class="preview" { (body) }
        })
    }

    fn run_command(
        &self,
        index: usize,
        rule: &PreviewRule,
        name: &str,
        oid: &gix::ObjectId,
        data: &[u8],
    ) -> Result<Markup> {
        let kind = rule.kind.as_deref().unwrap_or_else(|| file_type(name));
        let key = CacheKey::new(format!("preview-{}", index), format!("{}.{}", oid, kind))?;
        let env = [("filename", name), ("type", kind)];

        let mut out = Vec::new();
        execute_cached(self.cache, &mut out, &key, data, &rule.command, &env, self.timeout)?;
        Ok(PreEscaped(String::from_utf8_lossy(&out).into_owned()))
    }
}
