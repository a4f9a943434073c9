//! Markdown rendering with GitHub Flavored Markdown support.

use anyhow::{Context, Result};
use comrak::Options;

use crate::highlight::Highlighter;

const CODE_OPEN: &str = "<code class=\"language-";
const CODE_CLOSE: &str = "</code>";

/// Renders markdown to HTML with GFM extensions.
///
/// Fenced code blocks that name a language are highlighted with the same
/// CSS classes as blob pages, so `highlight.css` styles both.
pub struct MarkdownRenderer<'a> {
    options: Options<'static>,
    highlighter: &'a Highlighter,
}

impl<'a> MarkdownRenderer<'a> {
    /// Creates a renderer with tables, strikethrough, autolinks, task lists,
    /// footnotes and description lists enabled.
    ///
    /// Raw HTML in documents is passed through: the documents come from the
    /// repository being published.
    pub fn new(highlighter: &'a Highlighter) -> Self {
        let mut options = Options::default();

        options.extension.strikethrough = true;
        options.extension.table = true;
        options.extension.autolink = true;
        options.extension.tasklist = true;
        options.extension.footnotes = true;
        options.extension.description_lists = true;

        options.parse.smart = true;

        options.render.unsafe_ = true;

        Self {
            options,
            highlighter,
        }
    }

    /// Renders markdown content to an HTML fragment.
    ///
    /// # Errors
    ///
    /// Returns error if highlighting a code block fails.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use gitin::highlight::Highlighter;
    /// use gitin::markdown::MarkdownRenderer;
    ///
    /// let highlighter = Highlighter::new();
    /// let html = MarkdownRenderer::new(&highlighter).render("# Title")?;
    /// assert!(html.contains("<h1>"));
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn render(&self, content: &str) -> Result<String> {
        let html = comrak::markdown_to_html(content, &self.options);
        self.highlight_code_blocks(&html)
    }

    /// Replaces the text of every `<code class="language-X">` block with
    /// highlighted markup.
    fn highlight_code_blocks(&self, html: &str) -> Result<String> {
        let mut result = String::with_capacity(html.len());
        let mut last_end = 0;
        let mut search_pos = 0;

        while let Some(found) = html[search_pos..].find(CODE_OPEN) {
            let code_start = search_pos + found;
            let lang_start = code_start + CODE_OPEN.len();

            let Some(lang_len) = html[lang_start..].find('"') else {
                search_pos = lang_start;
                continue;
            };
            let lang_end = lang_start + lang_len;
            let Some(tag_len) = html[lang_end..].find('>') else {
                search_pos = lang_end;
                continue;
            };
            let content_start = lang_end + tag_len + 1;
            let Some(content_len) = html[content_start..].find(CODE_CLOSE) else {
                search_pos = content_start;
                continue;
            };
            let content_end = content_start + content_len;

            let language = &html[lang_start..lang_end];
            let code = html_decode(&html[content_start..content_end]);
            let highlighted = self
                .highlighter
                .highlight_language(&code, language)
                .with_context(|| format!("Failed to highlight {} code block", language))?;

            result.push_str(&html[last_end..code_start]);
            result.push_str(CODE_OPEN);
            result.push_str(language);
            result.push_str("\">");
            result.push_str(&highlighted);
            result.push_str(CODE_CLOSE);

            last_end = content_end + CODE_CLOSE.len();
            search_pos = last_end;
        }

        result.push_str(&html[last_end..]);
        Ok(result)
    }
}

/// Reverses the entity escaping comrak applies inside code blocks.
fn html_decode(html: &str) -> String {
    html.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
