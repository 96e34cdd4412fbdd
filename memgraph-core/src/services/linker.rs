// src/services/linker.rs
//! Adds `[[target]]` to a node's `related` list and bumps its `updated`
//! stamp, then re-indexes the node.

use anyhow::{Context, Result};
use serde::Serialize;
use std::{fs, path::PathBuf};

use crate::memory::frontmatter::{split_frontmatter, MARKER};
use crate::memory::graph::{GraphIndex, IndexSync};
use crate::utils::fsio::write_atomic;
use crate::utils::path::node_path;
use crate::utils::timefmt::now_stamp;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LinkOutcome {
    Linked { path: PathBuf, sync: IndexSync },
    /// The target already appears somewhere in the source file.
    AlreadyLinked,
    MissingSource { path: PathBuf },
    /// The source has no frontmatter block to edit.
    Unlinkable { path: PathBuf },
    Failed { reason: String },
}

impl LinkOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, LinkOutcome::Linked { .. } | LinkOutcome::AlreadyLinked)
    }
}

/// Link `source_id` (of `source_type`) to `target`. Never errors; I/O
/// problems are reported as [`LinkOutcome::Failed`].
pub fn link(index: &mut GraphIndex, source_type: &str, source_id: &str, target: &str) -> LinkOutcome {
    match try_link(index, source_type, source_id, target) {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!("linking {source_id} -> {target} failed: {e:#}");
            LinkOutcome::Failed {
                reason: format!("{e:#}"),
            }
        }
    }
}

fn try_link(index: &mut GraphIndex, source_type: &str, source_id: &str, target: &str) -> Result<LinkOutcome> {
    let path = node_path(index.nodes_dir(), source_type, source_id)?;
    if !path.is_file() {
        return Ok(LinkOutcome::MissingSource { path });
    }
    let text = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    if text.contains(target) {
        return Ok(LinkOutcome::AlreadyLinked);
    }
    let Some(updated) = add_relation(&text, target, &now_stamp()) else {
        return Ok(LinkOutcome::Unlinkable { path });
    };
    write_atomic(&path, updated.as_bytes())?;
    let sync = index.sync_node(&path);
    tracing::debug!("linked {source_id} -> {target}");
    Ok(LinkOutcome::Linked { path, sync })
}

/// Rewrite node text with `[[target]]` appended to `related` and `updated`
/// set to `stamp`. `None` when the text has no frontmatter block.
pub fn add_relation(text: &str, target: &str, stamp: &str) -> Option<String> {
    let (block, body) = split_frontmatter(text)?;
    let marker = format!("[[{target}]]");
    let mut lines: Vec<String> = block.lines().map(str::to_string).collect();

    match lines.iter().position(|l| key_of(l) == Some("related")) {
        Some(i) => {
            let value = value_of(&lines[i]).to_string();
            if value.is_empty() {
                // block list: append after the last item
                let mut end = i + 1;
                while end < lines.len() && lines[end].trim_start().starts_with('-') {
                    end += 1;
                }
                lines.insert(end, format!("  - {marker}"));
            } else if value.starts_with('[') && value.ends_with(']') {
                let inner = value[1..value.len() - 1].trim();
                lines[i] = if inner.is_empty() {
                    format!("related: [{marker}]")
                } else {
                    format!("related: [{inner}, {marker}]")
                };
            } else {
                lines[i] = format!("related: [{value}, {marker}]");
            }
        }
        None => lines.push(format!("related: [{marker}]")),
    }

    touch_updated(&mut lines, stamp);

    let mut out = String::with_capacity(text.len() + marker.len() + 32);
    out.push_str(MARKER);
    out.push('\n');
    for line in &lines {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(MARKER);
    out.push('\n');
    out.push_str(body);
    Some(out)
}

/// Set `updated:` to `stamp`, adding the line when it is missing.
pub fn touch_updated(lines: &mut Vec<String>, stamp: &str) {
    match lines.iter_mut().find(|l| key_of(l) == Some("updated")) {
        Some(line) => *line = format!("updated: {stamp}"),
        None => lines.push(format!("updated: {stamp}")),
    }
}

fn key_of(line: &str) -> Option<&str> {
    if line.starts_with(' ') || line.starts_with('\t') || line.starts_with('-') {
        return None;
    }
    line.split_once(':').map(|(k, _)| k.trim())
}

fn value_of(line: &str) -> &str {
    line.split_once(':').map(|(_, v)| v.trim()).unwrap_or("")
}
