//! Prismic rich text: the structured text shape and its plain-text / HTML views

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::helpers::escape_html;

/// Separator placed between blocks when flattening rich text
pub const BLOCK_SEPARATOR: &str = " ";

/// A CMS text field that may arrive either already flattened or as rich text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextField {
    Plain(String),
    Rich(Vec<RichTextBlock>),
}

impl TextField {
    /// Reduce the field to plain text
    ///
    /// Plain strings come back unchanged, rich text is flattened in reading order
    /// with all styling dropped.
    pub fn as_text(&self) -> String {
        match self {
            TextField::Plain(s) => s.clone(),
            TextField::Rich(blocks) => as_text(blocks),
        }
    }
}

/// One block of rich text (paragraph, heading, list item, image, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RichTextBlock {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub spans: Vec<Span>,

    /// Block specific payload (`url`, `alt`, `oembed`, `label`, ...)
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RichTextBlock {
    /// Build a text block without spans
    pub fn text(kind: &str, text: &str) -> Self {
        Self {
            kind: kind.to_string(),
            text: Some(text.to_string()),
            spans: Vec::new(),
            extra: serde_json::Map::new(),
        }
    }

    fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(|v| v.as_str())
    }
}

/// Inline styling over a range of a block's text
///
/// `start` and `end` are UTF-16 offsets, as produced by the CMS editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Flatten rich text to plain text
pub fn as_text(blocks: &[RichTextBlock]) -> String {
    blocks
        .iter()
        .filter_map(|b| b.text.as_deref())
        .collect::<Vec<_>>()
        .join(BLOCK_SEPARATOR)
}

/// Render rich text to HTML
///
/// Consecutive list items are grouped into a single `<ul>` / `<ol>`.
pub fn as_html(blocks: &[RichTextBlock]) -> String {
    let mut html = String::new();
    let mut open_list: Option<&'static str> = None;

    for block in blocks {
        let list_tag = match block.kind.as_str() {
            "list-item" => Some("ul"),
            "o-list-item" => Some("ol"),
            _ => None,
        };

        if open_list != list_tag {
            if let Some(tag) = open_list {
                html.push_str(&format!("</{}>", tag));
            }
            if let Some(tag) = list_tag {
                html.push_str(&format!("<{}>", tag));
            }
            open_list = list_tag;
        }

        html.push_str(&render_block(block));
    }

    if let Some(tag) = open_list {
        html.push_str(&format!("</{}>", tag));
    }

    html
}

fn render_block(block: &RichTextBlock) -> String {
    let inner = || render_spans(block.text.as_deref().unwrap_or(""), &block.spans);

    match block.kind.as_str() {
        "heading1" | "heading2" | "heading3" | "heading4" | "heading5" | "heading6" => {
            let level = &block.kind["heading".len()..];
            format!("<h{}>{}</h{}>", level, inner(), level)
        }
        "paragraph" => format!("<p>{}</p>", inner()),
        "preformatted" => format!("<pre>{}</pre>", inner()),
        "list-item" | "o-list-item" => format!("<li>{}</li>", inner()),
        "image" => {
            let url = block.extra_str("url").unwrap_or("");
            let alt = block.extra_str("alt").unwrap_or("");
            format!(
                r#"<p class="block-img"><img src="{}" alt="{}" /></p>"#,
                escape_html(url),
                escape_html(alt)
            )
        }
        "embed" => {
            let oembed = block.extra.get("oembed");
            let url = oembed
                .and_then(|o| o.get("embed_url"))
                .and_then(|v| v.as_str())
                .unwrap_or("");
            let embed_html = oembed
                .and_then(|o| o.get("html"))
                .and_then(|v| v.as_str())
                .unwrap_or("");
            format!(
                r#"<div data-oembed="{}">{}</div>"#,
                escape_html(url),
                embed_html
            )
        }
        other => {
            tracing::debug!("Unknown rich text block type {:?}, rendering as paragraph", other);
            format!("<p>{}</p>", inner())
        }
    }
}

/// Apply spans to a block's text, keeping tags properly nested even when
/// spans overlap
fn render_spans(text: &str, spans: &[Span]) -> String {
    if spans.is_empty() {
        return escape_text(text);
    }

    let mut starts: HashMap<usize, Vec<usize>> = HashMap::new();
    for (i, span) in spans.iter().enumerate() {
        if span.end > span.start {
            starts.entry(span.start).or_default().push(i);
        }
    }

    let mut out = String::with_capacity(text.len());
    let mut run = String::new();
    let mut stack: Vec<usize> = Vec::new();
    let mut offset = 0usize;

    for c in text.chars() {
        let boundary =
            starts.contains_key(&offset) || stack.iter().any(|&i| spans[i].end <= offset);
        if boundary {
            out.push_str(&escape_text(&run));
            run.clear();
        }

        close_spans_ending_at(offset, spans, &mut stack, &mut out);
        if let Some(opening) = starts.get(&offset) {
            // Longer spans open first so they enclose the shorter ones
            let mut opening = opening.clone();
            opening.sort_by(|a, b| spans[*b].end.cmp(&spans[*a].end));
            for i in opening {
                out.push_str(&open_tag(&spans[i]));
                stack.push(i);
            }
        }
        run.push(c);
        offset += c.len_utf16();
    }
    out.push_str(&escape_text(&run));

    // Spans past the end of the text are closed here
    close_spans_ending_at(usize::MAX, spans, &mut stack, &mut out);

    out
}

fn close_spans_ending_at(offset: usize, spans: &[Span], stack: &mut Vec<usize>, out: &mut String) {
    while let Some(pos) = stack.iter().position(|&i| spans[i].end <= offset) {
        let reopen: Vec<usize> = stack.drain(pos..).collect();
        for &i in reopen.iter().rev() {
            out.push_str(close_tag(&spans[i]));
        }
        for i in reopen.into_iter().skip(1) {
            if spans[i].end > offset {
                out.push_str(&open_tag(&spans[i]));
                stack.push(i);
            }
        }
    }
}

fn open_tag(span: &Span) -> String {
    match span.kind.as_str() {
        "strong" => "<strong>".to_string(),
        "em" => "<em>".to_string(),
        "hyperlink" => {
            let url = span
                .data
                .as_ref()
                .and_then(|d| d.get("url"))
                .and_then(|v| v.as_str())
                .unwrap_or("#");
            let blank = span
                .data
                .as_ref()
                .and_then(|d| d.get("target"))
                .and_then(|v| v.as_str())
                == Some("_blank");
            if blank {
                format!(
                    r#"<a href="{}" target="_blank" rel="noopener">"#,
                    escape_html(url)
                )
            } else {
                format!(r#"<a href="{}">"#, escape_html(url))
            }
        }
        "label" => {
            let label = span
                .data
                .as_ref()
                .and_then(|d| d.get("label"))
                .and_then(|v| v.as_str())
                .unwrap_or("");
            format!(r#"<span class="{}">"#, escape_html(label))
        }
        _ => "<span>".to_string(),
    }
}

fn close_tag(span: &Span) -> &'static str {
    match span.kind.as_str() {
        "strong" => "</strong>",
        "em" => "</em>",
        "hyperlink" => "</a>",
        _ => "</span>",
    }
}

/// Escape block text, keeping soft line breaks
fn escape_text(text: &str) -> String {
    escape_html(text).replace('\n', "<br />")
}
