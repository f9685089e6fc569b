//! One search result rendered as a labelled chat message.

use crate::db::{ColumnInfo, Row, Value};
use crate::format::{escape_html, Markup};

/// Characters of the snippet kept in a reply.
pub const SNIPPET_LENGTH: usize = 600;

/// Sent in place of a record whose fields are all empty.
pub const EMPTY_RECORD: &str = "(empty record)";

/// Renders one `search_results` row. Empty and NULL fields are left out.
pub fn format_record(columns: &[ColumnInfo], row: &Row, markup: Markup) -> String {
    let field = |name: &str| -> Option<String> {
        let index = columns.iter().position(|c| c.name == name)?;
        match row.get(index)? {
            Value::Null => None,
            value => Some(value.to_display_string()).filter(|text| !text.is_empty()),
        }
    };

    let mut parts = Vec::new();
    for (label, column) in [("Repo", "repo"), ("Path", "path")] {
        if let Some(text) = field(column) {
            parts.push(labelled(label, &text, markup));
        }
    }
    if let Some(url) = field("html_url") {
        parts.push(match markup {
            Markup::Html => format!("<b>URL:</b> <a href=\"{}\">link</a>", escape_html(&url)),
            Markup::Plain => format!("URL: {url}"),
        });
    }
    for (label, column) in [("Score", "score"), ("Found", "found_at")] {
        if let Some(text) = field(column) {
            parts.push(labelled(label, &text, markup));
        }
    }
    if let Some(snippet) = field("snippet") {
        let snippet: String = snippet.chars().take(SNIPPET_LENGTH).collect();
        parts.push(match markup {
            Markup::Html => format!("<pre>{}</pre>", escape_html(&snippet)),
            Markup::Plain => snippet,
        });
    }

    if parts.is_empty() {
        return EMPTY_RECORD.to_string();
    }
    parts.join("\n")
}

fn labelled(label: &str, text: &str, markup: Markup) -> String {
    match markup {
        Markup::Html => format!("<b>{label}:</b> {}", escape_html(text)),
        Markup::Plain => format!("{label}: {text}"),
    }
}
