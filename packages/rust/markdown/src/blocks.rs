//! Flatten rendered HTML into a linear sequence of layout blocks.
//!
//! Walks the top-level elements of an HTML fragment and keeps just enough
//! structure (heading level, list nesting, preformatted text) for a simple
//! page layout.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html};

/// One unit of page layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { level: u8, text: String },
    Paragraph(String),
    /// A list item; `marker` is `-` or `N.`, `depth` starts at 0.
    ListItem { marker: String, depth: usize, text: String },
    /// Preformatted text, line breaks preserved.
    Code(String),
    Quote(String),
    Rule,
}

/// Extract layout blocks from an HTML fragment.
pub fn extract_blocks(html: &str) -> Vec<Block> {
    let fragment = Html::parse_fragment(html);
    let mut blocks = Vec::new();

    for child in fragment.root_element().children() {
        if let Some(el) = ElementRef::wrap(child) {
            push_element(el, 0, &mut blocks);
        } else if let Some(text) = child.value().as_text() {
            push_paragraph(text, &mut blocks);
        }
    }

    blocks
}

fn push_element(el: ElementRef<'_>, depth: usize, blocks: &mut Vec<Block>) {
    match el.value().name() {
        name @ ("h1" | "h2" | "h3" | "h4" | "h5" | "h6") => {
            let level = name[1..].parse().unwrap_or(1);
            let text = collapse_whitespace(&el.text().collect::<String>());
            if !text.is_empty() {
                blocks.push(Block::Heading { level, text });
            }
        }
        "ul" | "ol" => push_list(el, depth, blocks),
        "pre" => {
            let code: String = el.text().collect();
            blocks.push(Block::Code(code.trim_end_matches('\n').to_string()));
        }
        "blockquote" => {
            let text = collapse_whitespace(&el.text().collect::<String>());
            if !text.is_empty() {
                blocks.push(Block::Quote(text));
            }
        }
        "hr" => blocks.push(Block::Rule),
        "table" => {
            for row in el.descendants().filter_map(ElementRef::wrap) {
                if row.value().name() != "tr" {
                    continue;
                }
                let cells: Vec<String> = row
                    .children()
                    .filter_map(ElementRef::wrap)
                    .map(|cell| collapse_whitespace(&cell.text().collect::<String>()))
                    .collect();
                push_paragraph(&cells.join(" | "), blocks);
            }
        }
        "div" | "section" | "article" => {
            for child in el.children().filter_map(ElementRef::wrap) {
                push_element(child, depth, blocks);
            }
        }
        _ => push_paragraph(&el.text().collect::<String>(), blocks),
    }
}

fn push_list(list: ElementRef<'_>, depth: usize, blocks: &mut Vec<Block>) {
    let ordered = list.value().name() == "ol";
    let start: usize = list
        .value()
        .attr("start")
        .and_then(|s| s.parse().ok())
        .unwrap_or(1);

    let items = list
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|c| c.value().name() == "li");

    for (i, item) in items.enumerate() {
        let mut text = String::new();
        let mut nested = Vec::new();

        for child in item.children() {
            match ElementRef::wrap(child) {
                Some(el) if matches!(el.value().name(), "ul" | "ol") => nested.push(el),
                Some(el) => {
                    text.push(' ');
                    text.extend(el.text());
                }
                None => {
                    if let Some(t) = child.value().as_text() {
                        text.push_str(t);
                    }
                }
            }
        }

        let marker = if ordered {
            format!("{}.", start + i)
        } else {
            "-".to_string()
        };
        blocks.push(Block::ListItem {
            marker,
            depth,
            text: collapse_whitespace(&text),
        });

        for sub in nested {
            push_list(sub, depth + 1, blocks);
        }
    }
}

fn push_paragraph(text: &str, blocks: &mut Vec<Block>) {
    let text = collapse_whitespace(text);
    if !text.is_empty() {
        blocks.push(Block::Paragraph(text));
    }
}

/// Collapse whitespace runs to single spaces and trim.
fn collapse_whitespace(s: &str) -> String {
    static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

    WS_RE.replace_all(s, " ").trim().to_string()
}
