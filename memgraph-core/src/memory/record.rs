// src/memory/record.rs
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use super::frontmatter::{parse_fields, split_frontmatter, FieldValue, Fields};
use crate::utils::timefmt::normalize_stamp;

static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[([^\]|]+)(?:\|[^\]]+)?\]\]").unwrap());

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)#([a-zA-Z][a-zA-Z0-9_-]*)").unwrap());

// Keys lifted into typed fields; everything else lands in `extra`.
const KNOWN_KEYS: &[&str] = &[
    "id", "type", "created", "updated", "status", "tags", "related", "supersedes",
    "file_path", "path", "session_id",
];

pub const DEFAULT_STATUS: &str = "active";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeMetadata {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub created: String,
    pub updated: String,
    pub path: PathBuf,
    /// Declared tags merged with `#tag` markers from the content, sorted.
    pub tags: Vec<String>,
    /// Relation ids as written in `related`, markers unwrapped, in order.
    pub related: Vec<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, FieldValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeRecord {
    pub metadata: NodeMetadata,
    pub content: String,
    /// Content markers plus relation ids, sorted and deduplicated.
    pub links: Vec<String>,
}

impl NodeRecord {
    pub fn id(&self) -> &str {
        &self.metadata.id
    }
}

/// Read and parse a node file. Unreadable or invalid files yield `None`.
pub fn parse_node(path: &Path) -> Option<NodeRecord> {
    let text = fs::read_to_string(path).ok()?;
    parse_node_text(&text, path)
}

/// Parse node text. A record needs frontmatter with a non-empty `id` and `type`.
pub fn parse_node_text(text: &str, path: &Path) -> Option<NodeRecord> {
    let (block, content) = split_frontmatter(text)?;
    let mut fields = parse_fields(block);

    let id = take_scalar(&mut fields, "id").filter(|s| !s.is_empty())?;
    let node_type = take_scalar(&mut fields, "type").filter(|s| !s.is_empty())?;

    let declared_tags = fields.remove("tags").map(|v| v.to_list()).unwrap_or_default();
    let related: Vec<String> = fields
        .remove("related")
        .map(|v| v.to_list())
        .unwrap_or_default()
        .iter()
        .filter_map(|entry| unwrap_relation(entry))
        .collect();

    let tags: BTreeSet<String> = declared_tags
        .into_iter()
        .filter(|t| !t.is_empty())
        .chain(extract_tags(content))
        .collect();
    let links: BTreeSet<String> = extract_links(content)
        .into_iter()
        .chain(related.iter().cloned())
        .collect();

    let created = take_scalar(&mut fields, "created").map(|s| normalize_stamp(&s)).unwrap_or_default();
    let updated = take_scalar(&mut fields, "updated").map(|s| normalize_stamp(&s)).unwrap_or_default();
    let status = take_scalar(&mut fields, "status")
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_STATUS.to_string());

    let supersedes = take_scalar(&mut fields, "supersedes").filter(|s| !s.is_empty());
    let file_path = take_scalar(&mut fields, "file_path").filter(|s| !s.is_empty());
    let file_path = file_path.or_else(|| take_scalar(&mut fields, "path").filter(|s| !s.is_empty()));
    let session_id = take_scalar(&mut fields, "session_id").filter(|s| !s.is_empty());

    fields.retain(|k, _| !KNOWN_KEYS.contains(&k.as_str()));

    Some(NodeRecord {
        metadata: NodeMetadata {
            id,
            node_type,
            created,
            updated,
            path: path.to_path_buf(),
            tags: tags.into_iter().collect(),
            related,
            status,
            supersedes,
            file_path,
            session_id,
            extra: fields,
        },
        content: content.to_string(),
        links: links.into_iter().collect(),
    })
}

fn take_scalar(fields: &mut Fields, key: &str) -> Option<String> {
    match fields.remove(key)? {
        FieldValue::Scalar(s) => Some(s),
        FieldValue::List(items) => items.into_iter().next(),
    }
}

/// `[[id]]` and `[[id|label]]` become `id`; bare ids pass through; anything
/// else that still looks like a marker is dropped.
pub fn unwrap_relation(entry: &str) -> Option<String> {
    let entry = entry.trim();
    if let Some(caps) = LINK_RE.captures(entry) {
        let id = caps[1].trim();
        return (!id.is_empty()).then(|| id.to_string());
    }
    if entry.is_empty() || entry.starts_with("[[") {
        return None;
    }
    Some(entry.to_string())
}

/// Relationship markers in document order, deduplicated.
pub fn extract_links(text: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    LINK_RE
        .captures_iter(text)
        .map(|c| c[1].trim().to_string())
        .filter(|id| !id.is_empty() && seen.insert(id.clone()))
        .collect()
}

/// `#tag` markers in document order, deduplicated. Headings never match
/// because the `#` must be followed directly by a letter.
pub fn extract_tags(text: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    TAG_RE
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .filter(|tag| seen.insert(tag.clone()))
        .collect()
}
