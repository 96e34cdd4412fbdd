// src/utils/path.rs
use anyhow::{Context, Result};
use std::path::{Component, Path, PathBuf};

/// Directory under `nodes/` that holds a given node type.
pub fn type_dir(node_type: &str) -> String {
    match node_type {
        "file-summary" => "files".to_string(),
        "decision" => "decisions".to_string(),
        "discovery" => "discoveries".to_string(),
        "session" => "sessions".to_string(),
        "task" => "tasks".to_string(),
        "error" => "errors".to_string(),
        "subagent" => "subagents".to_string(),
        other => format!("{other}s"),
    }
}

/// `<nodes_dir>/<type dir>/<id>.md`, refusing ids or types that would leave
/// `nodes_dir`.
pub fn node_path(nodes_dir: &Path, node_type: &str, node_id: &str) -> Result<PathBuf> {
    let node_type = check_segment(node_type).context("node type")?;
    let node_id = check_segment(node_id).context("node id")?;
    Ok(nodes_dir
        .join(type_dir(node_type))
        .join(format!("{node_id}.md")))
}

/// Turn free text into an id fragment: lowercase ascii alphanumerics joined by
/// single dashes, at most 60 chars.
pub fn sanitize_id(text: &str) -> String {
    let mapped: String = text
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .collect();
    let mut out = mapped
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase();
    out.truncate(60);
    out.trim_end_matches('-').to_string()
}

/// Resolve `value` against `root` unless it is already absolute.
pub fn absolutize(root: &Path, value: &Path) -> PathBuf {
    if value.is_absolute() {
        value.to_path_buf()
    } else {
        root.join(value)
    }
}

fn check_segment(seg: &str) -> Result<&str> {
    let seg = seg.trim();
    if seg.is_empty() {
        anyhow::bail!("empty path segment");
    }
    if seg.contains('/') || seg.contains('\\') {
        anyhow::bail!("path separators not allowed: {seg:?}");
    }
    let mut comps = Path::new(seg).components();
    match (comps.next(), comps.next()) {
        (Some(Component::Normal(_)), None) if !seg.starts_with('.') => Ok(seg),
        _ => anyhow::bail!("invalid path segment: {seg:?}"),
    }
}
