use std::collections::BTreeMap;
use std::path::Path;

use chrono::{TimeZone, Utc};
use memgraph_core::memory::record::{extract_links, extract_tags, parse_node, parse_node_text};
use memgraph_core::memory::writer::render_node_at;
use memgraph_core::{FieldValue, NewNode};

fn parse(text: &str) -> Option<memgraph_core::NodeRecord> {
    parse_node_text(text, Path::new("nodes/tasks/x.md"))
}

#[test]
fn parses_metadata_links_and_tags() {
    let text = "---\n\
id: t1\n\
type: task\n\
created: 2025-01-01T10:00:00Z\n\
updated: 2025-01-02T10:00:00Z\n\
status: in_progress\n\
tags: [api, \"auth\"]\n\
related: [[[d1]], [[d2|Second]], plain-id]\n\
---\n\
\n\
# Fix login\n\
\n\
Blocked on [[d3]] and [[ d1 ]]. #auth #Backend-2 and not#tag.\n\
## Notes\n";
    let rec = parse(text).expect("valid record");
    let meta = &rec.metadata;
    assert_eq!(rec.id(), "t1");
    assert_eq!(meta.node_type, "task");
    assert_eq!(meta.status, "in_progress");
    assert_eq!(meta.created, "2025-01-01T10:00:00Z");
    assert_eq!(meta.related, vec!["d1", "d2", "plain-id"]);
    assert_eq!(meta.tags, vec!["Backend-2", "api", "auth"]);
    assert_eq!(rec.links, vec!["d1", "d2", "d3", "plain-id"]);
    assert!(rec.content.contains("# Fix login"));
    assert_eq!(meta.path, Path::new("nodes/tasks/x.md"));
}

#[test]
fn block_lists_and_scalar_tags() {
    let text = "---\nid: d1\ntype: decision\ntags: single\nrelated:\n  - [[a]]\n  - \"[[b|Bee]]\"\n---\nbody\n";
    let rec = parse(text).expect("valid record");
    assert_eq!(rec.metadata.tags, vec!["single"]);
    assert_eq!(rec.metadata.related, vec!["a", "b"]);
    assert_eq!(rec.metadata.status, "active");
    assert_eq!(rec.metadata.created, "");
}

#[test]
fn timestamps_are_normalized() {
    let text = "---\nid: n\ntype: note\ncreated: 2025-01-02 03:04:05\nupdated: 2025-01-02T05:04:05+02:00\n---\n";
    let rec = parse(text).expect("valid record");
    assert_eq!(rec.metadata.created, "2025-01-02T03:04:05Z");
    assert_eq!(rec.metadata.updated, "2025-01-02T03:04:05Z");

    let text = "---\nid: n\ntype: note\ncreated: 2025-01-02\nupdated: last tuesday\n---\n";
    let rec = parse(text).expect("valid record");
    assert_eq!(rec.metadata.created, "2025-01-02T00:00:00Z");
    assert_eq!(rec.metadata.updated, "last tuesday");
}

#[test]
fn passthrough_fields() {
    let text = "---\nid: f1\ntype: file-summary\npath: src/lib.rs\nsession_id: s-42\nsupersedes: f0\nlanguage: rust\nsymbols: [parse, render]\n---\n";
    let rec = parse(text).expect("valid record");
    let meta = &rec.metadata;
    assert_eq!(meta.file_path.as_deref(), Some("src/lib.rs"));
    assert_eq!(meta.session_id.as_deref(), Some("s-42"));
    assert_eq!(meta.supersedes.as_deref(), Some("f0"));
    assert_eq!(meta.extra.len(), 2);
    assert_eq!(meta.extra["language"], FieldValue::Scalar("rust".into()));
    assert_eq!(
        meta.extra["symbols"],
        FieldValue::List(vec!["parse".into(), "render".into()])
    );
}

#[test]
fn empty_file_path_falls_back_to_path() {
    let text = "---\nid: f2\ntype: file-summary\nfile_path: \"\"\npath: src/main.rs\n---\n";
    let rec = parse(text).expect("valid record");
    assert_eq!(rec.metadata.file_path.as_deref(), Some("src/main.rs"));
}

#[test]
fn invalid_records_are_none() {
    assert!(parse("---\ntype: task\n---\nno id\n").is_none());
    assert!(parse("---\nid: x\n---\nno type\n").is_none());
    assert!(parse("---\nid: \"\"\ntype: task\n---\n").is_none());
    assert!(parse("# Plain markdown\n\nid: x\ntype: task\n").is_none());
    assert!(parse("---\nid: x\ntype: task\n").is_none());
    assert!(parse_node(Path::new("/definitely/not/here.md")).is_none());
}

#[test]
fn marker_extraction() {
    assert_eq!(extract_links("[[a]] [[b|label]] [[a]] [[c]]"), vec!["a", "b", "c"]);
    assert!(extract_links("[[]] [not a link]").is_empty());
    assert_eq!(extract_tags("#one two #two\n#three ##four # heading"), vec!["one", "two", "three"]);
    assert!(extract_tags("# Title\n## Subtitle\nissue#12 #9lives").is_empty());
}

#[test]
fn writer_output_is_stable() {
    let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
    let mut extra = BTreeMap::new();
    extra.insert("supersedes".to_string(), FieldValue::Scalar("d0".into()));
    extra.insert("files".to_string(), FieldValue::List(vec!["a.rs".into(), "b.rs".into()]));
    let node = NewNode {
        body: "Because it is simple.".into(),
        tags: vec!["storage".into(), "db".into()],
        related: vec!["t1".into()],
        extra,
        ..NewNode::new("d1", "decision", "Use JSON")
    };

    let text = render_node_at(&node, now);
    assert_eq!(
        text,
        "---\n\
id: d1\n\
type: decision\n\
created: 2025-03-01T12:00:00Z\n\
updated: 2025-03-01T12:00:00Z\n\
status: active\n\
tags: [storage, db]\n\
related: [[[t1]]]\n\
files: [a.rs, b.rs]\n\
supersedes: d0\n\
---\n\
\n\
# Use JSON\n\
\n\
Because it is simple.\n"
    );

    let rec = parse(&text).expect("rendered node parses");
    assert_eq!(rec.metadata.id, "d1");
    assert_eq!(rec.metadata.related, vec!["t1"]);
    assert_eq!(rec.metadata.tags, vec!["db", "storage"]);
    assert_eq!(rec.metadata.supersedes.as_deref(), Some("d0"));
    assert_eq!(rec.metadata.extra["files"], FieldValue::List(vec!["a.rs".into(), "b.rs".into()]));
}

#[test]
fn writer_handles_empty_lists_and_status() {
    let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
    let mut node = NewNode::new("t9", "task", "Ship it");
    node.status = Some("in_progress".into());
    let mut extra = BTreeMap::new();
    extra.insert("id".to_string(), FieldValue::Scalar("hijack".into()));
    node.extra = extra;

    let text = render_node_at(&node, now);
    assert!(text.contains("\nstatus: in_progress\n"));
    assert!(text.contains("\ntags: []\n"));
    assert!(text.contains("\nrelated: []\n"));
    assert!(!text.contains("hijack"));
    assert!(text.ends_with("# Ship it\n\n"));

    let rec = parse(&text).expect("rendered node parses");
    assert_eq!(rec.metadata.status, "in_progress");
    assert!(rec.metadata.tags.is_empty());
    assert!(rec.links.is_empty());
}
