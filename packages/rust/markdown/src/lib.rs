//! Markdown-to-HTML rendering and document block extraction.
//!
//! Renders Markdown with `comrak`, optionally wrapping the fragment in a
//! standalone HTML5 document, and flattens rendered HTML into layout
//! [`Block`]s for engines that do not consume HTML directly.

mod blocks;

use std::path::Path;

use comrak::nodes::{AstNode, NodeValue};
use comrak::options::Options;
use comrak::{Arena, format_html, parse_document};
use tracing::{debug, instrument};

use mdpress_shared::{HtmlConfig, MdpressError, Result};

pub use blocks::{Block, extract_blocks};

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Markdown renderer configured from the `[html]` config section.
pub struct HtmlRenderer {
    options: Options<'static>,
    standalone: bool,
    stylesheet: Option<String>,
}

impl HtmlRenderer {
    pub fn new(config: &HtmlConfig) -> Self {
        let mut options = Options::default();
        let ext = &mut options.extension;
        ext.table = config.table;
        ext.strikethrough = config.strikethrough;
        ext.autolink = config.autolink;
        ext.tasklist = config.tasklist;
        if config.header_ids {
            ext.header_id_prefix = Some(String::new());
        }

        Self {
            options,
            standalone: config.standalone,
            stylesheet: config.stylesheet.clone(),
        }
    }

    /// Render `markdown` read from `source` into the configured HTML shape.
    ///
    /// In standalone mode the document title is the first H1, falling back
    /// to the source file stem.
    #[instrument(skip(self, markdown), fields(source = %source.display()))]
    pub fn render(&self, source: &Path, markdown: &str) -> Result<String> {
        let fragment = self.render_fragment(source, markdown)?;
        if !self.standalone {
            return Ok(fragment.html);
        }

        let title = fragment.title_or_stem(source);
        Ok(wrap_document(&title, self.stylesheet.as_deref(), &fragment.html))
    }

    /// Render `markdown` to an HTML fragment, ignoring standalone mode.
    pub fn render_fragment(&self, source: &Path, markdown: &str) -> Result<Fragment> {
        let arena = Arena::new();
        let root = parse_document(&arena, markdown, &self.options);
        let title = first_h1(root);

        let mut html = String::new();
        format_html(root, &self.options, &mut html)
            .map_err(|e| MdpressError::render(source, e.to_string()))?;

        debug!(input_len = markdown.len(), html_len = html.len(), "rendered markdown");
        Ok(Fragment { html, title })
    }
}

/// An HTML fragment plus the title found while parsing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub html: String,
    /// Text of the first level-1 heading, ATX or setext.
    pub title: Option<String>,
}

impl Fragment {
    /// The heading title, or the stem of `source` when there is none.
    pub fn title_or_stem(&self, source: &Path) -> String {
        self.title.clone().unwrap_or_else(|| {
            source
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "Untitled".to_string())
        })
    }
}

impl Default for HtmlRenderer {
    fn default() -> Self {
        Self::new(&HtmlConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn first_h1<'a>(root: &'a AstNode<'a>) -> Option<String> {
    let heading = root.descendants().find(|node| {
        matches!(&node.data.borrow().value, NodeValue::Heading(h) if h.level == 1)
    })?;
    let title = collect_text(heading);
    let title = title.trim();
    (!title.is_empty()).then(|| title.to_string())
}

fn collect_text<'a>(node: &'a AstNode<'a>) -> String {
    let mut text = String::new();
    for child in node.descendants().skip(1) {
        match &child.data.borrow().value {
            NodeValue::Text(t) => text.push_str(t),
            NodeValue::Code(code) => text.push_str(&code.literal),
            NodeValue::LineBreak | NodeValue::SoftBreak => text.push(' '),
            _ => {}
        }
    }
    text
}

fn wrap_document(title: &str, stylesheet: Option<&str>, body: &str) -> String {
    let mut doc = String::from("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    doc.push_str(&format!("<title>{}</title>\n", escape_html(title)));
    if let Some(href) = stylesheet {
        doc.push_str(&format!(
            "<link rel=\"stylesheet\" href=\"{}\">\n",
            escape_html(href)
        ));
    }
    doc.push_str("</head>\n<body>\n");
    doc.push_str(body);
    doc.push_str("</body>\n</html>\n");
    doc
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
