//! Syntax highlighting for blob pages.
//!
//! Built-in highlighting uses syntect with CSS classes, so the colours come
//! from one `highlight.css` generated for the configured theme. A site may
//! instead name an external `highlight_command`, which runs through the
//! filter sandbox. Either way the result is cached per blob and file type.

use anyhow::{Context, Result, anyhow};
use std::time::Duration;
use syntect::highlighting::ThemeSet;
use syntect::html::{ClassStyle, ClassedHTMLGenerator, css_for_theme_with_class_style};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;
use tracing::warn;

use crate::cache::{CacheKey, CacheStore};
use crate::execute::execute_cached;
use crate::util::escape_html;

const HIGHLIGHT_NAMESPACE: &str = "highlight";

/// Class-based syntax highlighter.
///
/// Loading the syntax definitions is the expensive part, so one instance
/// is built per run and shared by every worker.
pub struct Highlighter {
    syntax_set: SyntaxSet,
}

impl Highlighter {
    pub fn new() -> Self {
        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
        }
    }

    /// Highlights `code`, picking the syntax from `file_name`.
    ///
    /// Detection tries the extension, then the whole file name (for
    /// `Makefile` and friends), then the first line. Unknown files come
    /// back as escaped plain text.
    ///
    /// # Arguments
    ///
    /// * `code`: File content
    /// * `file_name`: Name used for syntax detection
    ///
    /// # Returns
    ///
    /// HTML fragment with `<span class="...">` tokens
    ///
    /// # Errors
    ///
    /// Returns error if the syntax definition fails to parse a line.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use gitin::highlight::Highlighter;
    ///
    /// let highlighter = Highlighter::new();
    /// let html = highlighter.highlight("fn main() {}\n", "main.rs")?;
    /// assert!(html.contains("<span"));
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn highlight(&self, code: &str, file_name: &str) -> Result<String> {
        if code.is_empty() {
            return Ok(String::new());
        }

        let Some(syntax) = self.find_syntax(code, file_name) else {
            return Ok(escape_html(code));
        };

        self.generate(code, syntax, file_name)
    }

    /// Highlights a fenced code block by its language token (`rust`, `py`).
    ///
    /// # Errors
    ///
    /// Returns error if the syntax definition fails to parse a line.
    pub fn highlight_language(&self, code: &str, language: &str) -> Result<String> {
        let syntax = self
            .syntax_set
            .find_syntax_by_token(language)
            .or_else(|| self.syntax_set.find_syntax_by_extension(language));
        match syntax {
            Some(syntax) if !code.is_empty() => self.generate(code, syntax, language),
            _ => Ok(escape_html(code)),
        }
    }

    fn generate(&self, code: &str, syntax: &SyntaxReference, label: &str) -> Result<String> {
        let mut generator =
            ClassedHTMLGenerator::new_with_class_style(syntax, &self.syntax_set, ClassStyle::Spaced);
        for line in LinesWithEndings::from(code) {
            generator
                .parse_html_for_line_which_includes_newline(line)
                .with_context(|| format!("Failed to highlight {}", label))?;
        }
        Ok(generator.finalize())
    }

    fn find_syntax(&self, code: &str, file_name: &str) -> Option<&SyntaxReference> {
        let extension = file_name.rsplit_once('.').map(|(_, ext)| ext);
        extension
            .and_then(|ext| self.syntax_set.find_syntax_by_extension(ext))
            .or_else(|| self.syntax_set.find_syntax_by_extension(file_name))
            .or_else(|| self.syntax_set.find_syntax_by_first_line(code))
    }
}

impl Default for Highlighter {
    fn default() -> Self {
        Self::new()
    }
}

/// Stylesheet for a syntect theme, matching the classes [`Highlighter`]
/// emits.
///
/// # Errors
///
/// Returns error if `theme` is not one of the bundled themes.
pub fn theme_css(theme: &str) -> Result<String> {
    let themes = ThemeSet::load_defaults();
    let selected = themes.themes.get(theme).ok_or_else(|| {
        let mut known: Vec<&str> = themes.themes.keys().map(String::as_str).collect();
        known.sort_unstable();
        anyhow!("Unknown theme '{}', available: {}", theme, known.join(", "))
    })?;
    css_for_theme_with_class_style(selected, ClassStyle::Spaced)
        .with_context(|| format!("Failed to build stylesheet for theme {}", theme))
}

/// How a blob's code section is highlighted.
pub struct HighlightOptions<'a> {
    pub command: Option<&'a str>,
    pub scheme: &'a str,
    pub timeout: Option<Duration>,
}

/// File type token passed to filters and used in cache keys.
///
/// The extension when there is one, otherwise the whole name, and `txt`
/// for names that start with their only dot.
pub fn file_type(file_name: &str) -> &str {
    match file_name.rsplit_once('.') {
        Some(("", _)) => "txt",
        Some((_, ext)) if !ext.is_empty() => ext,
        _ => file_name,
    }
}

/// Highlights a blob through the cache.
///
/// With a configured command the blob is piped through the filter sandbox
/// with `filename`, `type` and `scheme` in the environment; a failing
/// command is logged and the content falls back to escaped text, which is
/// not cached. Without one the built-in highlighter runs.
///
/// # Arguments
///
/// * `cache`: Run cache store
/// * `highlighter`: Shared built-in highlighter
/// * `options`: External command and theme settings
/// * `oid`: Blob id, the cache fingerprint
/// * `file_name`: Name used for syntax detection
/// * `code`: Blob content
pub fn highlight_cached(
    cache: &CacheStore,
    highlighter: &Highlighter,
    options: &HighlightOptions<'_>,
    oid: &gix::ObjectId,
    file_name: &str,
    code: &str,
) -> String {
    let kind = file_type(file_name);
    let key = match CacheKey::new(HIGHLIGHT_NAMESPACE, format!("{}.{}", oid, kind)) {
        Ok(key) => key,
        Err(e) => {
            warn!(file = file_name, error = %e, "unusable highlight cache key");
            return escape_html(code);
        }
    };

    let mut out = Vec::with_capacity(code.len() * 2);
    let result = match options.command {
        Some(command) => {
            let env = [("filename", file_name), ("type", kind), ("scheme", options.scheme)];
            execute_cached(cache, &mut out, &key, code.as_bytes(), command, &env, options.timeout)
        }
        None => cache.cached_render(&mut out, &key, |w| {
            w.write_all(highlighter.highlight(code, file_name)?.as_bytes())?;
            Ok(())
        }),
    };

    match result {
        Ok(()) => String::from_utf8_lossy(&out).into_owned(),
        Err(e) => {
            warn!(file = file_name, error = %format!("{:#}", e), "highlighting failed, using plain text");
            escape_html(code)
        }
    }
}
