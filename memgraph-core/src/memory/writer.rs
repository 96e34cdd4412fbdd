// src/memory/writer.rs
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use super::frontmatter::FieldValue;
use super::record::DEFAULT_STATUS;
use crate::utils::timefmt::format_stamp;

// Written from typed fields; never taken from `extra`.
const RESERVED: &[&str] = &["id", "type", "created", "updated", "status", "tags", "related"];

/// Everything needed to render a fresh node file.
#[derive(Debug, Clone, Default)]
pub struct NewNode {
    pub id: String,
    pub node_type: String,
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
    pub related: Vec<String>,
    /// `active` when unset.
    pub status: Option<String>,
    pub extra: BTreeMap<String, FieldValue>,
}

impl NewNode {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn status(&self) -> &str {
        self.status.as_deref().unwrap_or(DEFAULT_STATUS)
    }
}

/// Render a node stamped with the current time.
pub fn render_node(node: &NewNode) -> String {
    render_node_at(node, Utc::now())
}

/// Render a node with `created` and `updated` both set to `now`.
pub fn render_node_at(node: &NewNode, now: DateTime<Utc>) -> String {
    let stamp = format_stamp(now);
    let related: Vec<String> = node.related.iter().map(|r| format!("[[{r}]]")).collect();

    let mut out = String::new();
    out.push_str("---\n");
    out.push_str(&format!("id: {}\n", node.id));
    out.push_str(&format!("type: {}\n", node.node_type));
    out.push_str(&format!("created: {stamp}\n"));
    out.push_str(&format!("updated: {stamp}\n"));
    out.push_str(&format!("status: {}\n", node.status()));
    out.push_str(&format!("tags: [{}]\n", node.tags.join(", ")));
    out.push_str(&format!("related: [{}]\n", related.join(", ")));
    for (key, value) in &node.extra {
        if RESERVED.contains(&key.as_str()) {
            continue;
        }
        out.push_str(&format!("{key}: {}\n", value.render()));
    }
    out.push_str("---\n\n");
    out.push_str(&format!("# {}\n\n", node.title));
    out.push_str(&node.body);
    if !node.body.is_empty() && !node.body.ends_with('\n') {
        out.push('\n');
    }
    out
}
