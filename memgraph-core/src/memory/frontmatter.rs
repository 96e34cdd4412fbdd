// src/memory/frontmatter.rs
//! Frontmatter grammar for node files.
//!
//! Deliberately small: the block between two `---` lines holds
//! - scalars: `key: value` (optionally single or double quoted)
//! - inline lists: `key: [a, "b c", [[d]]]`
//! - block lists: `key:` followed by `- item` lines
//!
//! Blank lines and `#` comments are skipped. Anything else (nested maps,
//! multi-line strings) is ignored rather than rejected.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MARKER: &str = "---";

/// A single frontmatter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Scalar(String),
    List(Vec<String>),
}

impl FieldValue {
    /// Lists as-is; a non-empty scalar becomes a one-item list.
    pub fn to_list(&self) -> Vec<String> {
        match self {
            FieldValue::List(items) => items.clone(),
            FieldValue::Scalar(s) if s.is_empty() => Vec::new(),
            FieldValue::Scalar(s) => vec![s.clone()],
        }
    }

    /// Render back into the one-line form the grammar reads.
    pub fn render(&self) -> String {
        match self {
            FieldValue::Scalar(s) => s.clone(),
            FieldValue::List(items) => format!("[{}]", items.join(", ")),
        }
    }
}

pub type Fields = BTreeMap<String, FieldValue>;

/// Split a file into `(frontmatter, body)`.
///
/// The first line must be the marker; the block ends at the next marker
/// line. Returns `None` when either marker is missing.
pub fn split_frontmatter(text: &str) -> Option<(&str, &str)> {
    let mut lines = text.split_inclusive('\n');
    let first = lines.next()?;
    if first.trim_end() != MARKER {
        return None;
    }
    let start = first.len();
    let mut offset = start;
    for line in lines {
        if line.trim_end() == MARKER {
            return Some((&text[start..offset], &text[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

/// Parse a frontmatter block into fields. Later keys overwrite earlier ones.
pub fn parse_fields(block: &str) -> Fields {
    let mut fields = Fields::new();
    let mut open_list: Option<String> = None;

    for raw in block.lines() {
        let line = raw.trim_end();
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if let Some(item) = list_item(trimmed) {
            if let Some(FieldValue::List(items)) = open_list.as_ref().and_then(|k| fields.get_mut(k)) {
                let item = unquote(item);
                if !item.is_empty() {
                    items.push(item);
                }
            }
            continue;
        }

        // Indented non-item lines belong to structures this grammar skips.
        if trimmed.len() != line.len() {
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            open_list = None;
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            open_list = None;
            continue;
        }
        let value = value.trim();

        if value.is_empty() {
            fields.insert(key.to_string(), FieldValue::List(Vec::new()));
            open_list = Some(key.to_string());
        } else if value.starts_with('[') && value.ends_with(']') {
            fields.insert(key.to_string(), FieldValue::List(parse_inline_list(value)));
            open_list = None;
        } else {
            fields.insert(key.to_string(), FieldValue::Scalar(unquote(value)));
            open_list = None;
        }
    }

    fields
}

fn list_item(trimmed: &str) -> Option<&str> {
    let rest = trimmed.strip_prefix('-')?;
    if rest.is_empty() || rest.starts_with(' ') || rest.starts_with('\t') {
        Some(rest.trim())
    } else {
        None
    }
}

/// Split the inside of `[...]` on commas that are not nested in brackets or
/// quotes.
fn parse_inline_list(value: &str) -> Vec<String> {
    let inner = &value[1..value.len() - 1];
    let mut items = Vec::new();
    let mut current = String::new();
    let mut depth: i32 = 0;
    let mut quote: Option<char> = None;

    for c in inner.chars() {
        if let Some(q) = quote {
            current.push(c);
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' if current.trim().is_empty() => {
                quote = Some(c);
                current.push(c);
            }
            '[' => {
                depth += 1;
                current.push(c);
            }
            ']' => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth <= 0 => {
                push_item(&mut items, &current);
                current.clear();
            }
            _ => current.push(c),
        }
    }
    push_item(&mut items, &current);
    items
}

fn push_item(items: &mut Vec<String>, raw: &str) {
    let item = unquote(raw);
    if !item.is_empty() {
        items.push(item);
    }
}

/// Remove one pair of surrounding quotes.
pub fn unquote(s: &str) -> String {
    let s = s.trim();
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        s[1..s.len() - 1].replace("\\\"", "\"")
    } else if s.len() >= 2 && s.starts_with('\'') && s.ends_with('\'') {
        s[1..s.len() - 1].to_string()
    } else {
        s.to_string()
    }
}
