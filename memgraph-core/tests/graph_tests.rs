use std::fs;
use std::path::{Path, PathBuf};

use memgraph_core::config::GraphConfig;
use memgraph_core::{Commands, GraphIndex};

fn node_text(id: &str, ty: &str, updated: &str, tags: &str, related: &str, body: &str) -> String {
    format!(
        "---\nid: {id}\ntype: {ty}\ncreated: {updated}\nupdated: {updated}\nstatus: active\ntags: [{tags}]\nrelated: [{related}]\n---\n\n{body}\n"
    )
}

fn write(root: &Path, rel: &str, text: &str) -> PathBuf {
    let p = root.join("nodes").join(rel);
    fs::create_dir_all(p.parent().unwrap()).unwrap();
    fs::write(&p, text).unwrap();
    p
}

fn seed(root: &Path) {
    write(
        root,
        "decisions/d1.md",
        &node_text("d1", "decision", "2025-01-01T10:00:00Z", "db", "", "# Use sqlite\n\nSee [[t1]]."),
    );
    write(
        root,
        "tasks/t1.md",
        &node_text("t1", "task", "2025-01-03T10:00:00Z", "db, perf", "[[d1]]", "# Speed up queries"),
    );
    write(
        root,
        "discoveries/x1.md",
        &node_text("x1", "discovery", "2025-01-02T10:00:00Z", "perf", "", "# Index helps #hot-path\n\nMentions [[t1|the task]] and [[ghost]]."),
    );
}

#[test]
fn rebuild_is_idempotent() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    seed(dir.path());
    let mut cmds = Commands::open(dir.path())?;

    assert_eq!(cmds.rebuild()?, 3);
    let first = cmds.index().cache().clone();
    assert_eq!(cmds.rebuild()?, 3);
    let second = cmds.index().cache();

    assert_eq!(first.nodes, second.nodes);
    assert_eq!(first.tags, second.tags);
    assert_eq!(first.types, second.types);
    assert_eq!(first.recent, second.recent);
    assert_eq!(second.recent, vec!["t1", "x1", "d1"]);
    Ok(())
}

#[test]
fn backlinks_cover_every_marker_source() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    seed(dir.path());
    let mut cmds = Commands::open(dir.path())?;
    cmds.rebuild()?;

    let t1 = cmds.node("t1").expect("t1 indexed");
    assert_eq!(t1.backlinks, vec!["d1", "x1"]);
    let d1 = cmds.node("d1").expect("d1 indexed");
    assert_eq!(d1.backlinks, vec!["t1"]);

    // unknown targets stay in links_to but never get an entry
    let x1 = cmds.node("x1").expect("x1 indexed");
    assert_eq!(x1.links_to, vec!["ghost", "t1"]);
    assert!(cmds.node("ghost").is_none());
    assert_eq!(x1.tags, vec!["hot-path", "perf"]);
    Ok(())
}

#[test]
fn persisted_index_has_expected_shape() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    seed(dir.path());
    let mut cmds = Commands::open(dir.path())?;
    cmds.rebuild()?;

    let raw: serde_json::Value = serde_json::from_slice(&fs::read(dir.path().join("graph.json"))?)?;
    assert_eq!(raw["version"], "1.0.0");
    assert_eq!(raw["node_count"], 3);
    assert_eq!(raw["nodes"]["t1"]["type"], "task");
    assert_eq!(raw["types"]["decision"], serde_json::json!(["d1"]));
    assert_eq!(raw["tags"]["perf"], serde_json::json!(["x1", "t1"]));
    assert!(raw["updated_at"].as_str().is_some_and(|s| s.ends_with('Z')));
    assert!(!dir.path().join("graph.tmp").exists());

    // a fresh handle reads the same index back
    let reopened = Commands::open(dir.path())?;
    let (a, b) = (reopened.index().cache(), cmds.index().cache());
    assert_eq!(a.recent, b.recent);
    assert_eq!(a.tags, b.tags);
    assert_eq!(a.nodes.keys().collect::<Vec<_>>(), b.nodes.keys().collect::<Vec<_>>());
    assert_eq!(reopened.node("t1").unwrap().backlinks, vec!["d1", "x1"]);
    Ok(())
}

#[test]
fn duplicate_id_keeps_only_winning_memberships() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write(
        dir.path(),
        "decisions/dup.md",
        &node_text("dup", "decision", "2025-01-01T10:00:00Z", "old", "", "# First"),
    );
    write(
        dir.path(),
        "tasks/dup.md",
        &node_text("dup", "task", "2025-01-02T10:00:00Z", "new", "", "# Second"),
    );
    let mut cmds = Commands::open(dir.path())?;
    assert_eq!(cmds.rebuild()?, 1);

    assert_eq!(cmds.node("dup").map(|e| e.node_type.as_str()), Some("task"));
    assert_eq!(cmds.by_type("task"), vec!["dup"]);
    assert_eq!(cmds.by_tag("new"), vec!["dup"]);
    assert!(cmds.by_type("decision").is_empty());
    assert!(cmds.by_tag("old").is_empty());
    assert_eq!(cmds.stats().tag_count, 1);
    Ok(())
}

#[test]
fn update_single_node_is_idempotent() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    seed(dir.path());
    let mut cmds = Commands::open(dir.path())?;
    cmds.rebuild()?;

    let path = dir.path().join("nodes/decisions/d1.md");
    assert!(cmds.update(&path)?);
    let once = cmds.index().cache().clone();
    assert!(cmds.update(&path)?);
    let twice = cmds.index().cache();

    assert_eq!(once.nodes, twice.nodes);
    assert_eq!(once.tags, twice.tags);
    assert_eq!(once.types, twice.types);
    assert_eq!(once.recent, twice.recent);
    assert_eq!(twice.recent[0], "d1");
    Ok(())
}

#[test]
fn update_adds_new_node_and_backlinks() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    seed(dir.path());
    let mut cmds = Commands::open(dir.path())?;
    cmds.rebuild()?;

    let path = write(
        dir.path(),
        "sessions/s1.md",
        &node_text("s1", "session", "2025-01-04T10:00:00Z", "db", "", "Worked on [[d1]]."),
    );
    assert!(cmds.update(&path)?);

    assert_eq!(cmds.stats().node_count, 4);
    assert_eq!(cmds.node("d1").unwrap().backlinks, vec!["t1", "s1"]);
    assert_eq!(cmds.by_tag("db"), vec!["d1", "t1", "s1"]);
    assert_eq!(cmds.by_type("session"), vec!["s1"]);
    assert_eq!(cmds.recent(2), vec!["s1", "t1"]);
    Ok(())
}

#[test]
fn update_keeps_stale_backlinks_but_refreshes_memberships() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    seed(dir.path());
    let mut cmds = Commands::open(dir.path())?;
    cmds.rebuild()?;

    // x1 drops its link to t1, loses the perf tag and changes type
    let path = write(
        dir.path(),
        "discoveries/x1.md",
        &node_text("x1", "error", "2025-01-05T10:00:00Z", "flaky", "", "Nothing linked here."),
    );
    assert!(cmds.update(&path)?);

    assert!(cmds.node("t1").unwrap().backlinks.contains(&"x1".to_string()));
    assert_eq!(cmds.by_tag("perf"), vec!["t1"]);
    assert!(cmds.by_tag("hot-path").is_empty());
    assert!(!cmds.index().cache().tags.contains_key("hot-path"));
    assert_eq!(cmds.by_tag("flaky"), vec!["x1"]);
    assert!(!cmds.index().cache().types.contains_key("discovery"));
    assert_eq!(cmds.by_type("error"), vec!["x1"]);

    // a rebuild drops the stale edge
    cmds.rebuild()?;
    assert_eq!(cmds.node("t1").unwrap().backlinks, vec!["d1"]);
    Ok(())
}

#[test]
fn update_of_invalid_file_changes_nothing() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    seed(dir.path());
    let mut cmds = Commands::open(dir.path())?;
    cmds.rebuild()?;
    let before = cmds.index().cache().clone();

    let path = write(dir.path(), "tasks/broken.md", "---\nid: broken\n---\nno type\n");
    assert!(!cmds.update(&path)?);
    assert_eq!(cmds.index().cache(), &before);
    assert!(!cmds.update(&dir.path().join("nodes/tasks/absent.md"))?);
    Ok(())
}

#[test]
fn file_missing_type_is_not_indexed() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    seed(dir.path());
    write(dir.path(), "misc/no-type.md", "---\nid: orphan\nstatus: active\n---\n\nbody\n");
    write(dir.path(), "misc/no-frontmatter.md", "# just text\n");
    write(dir.path(), "misc/notes.txt", "---\nid: txt\ntype: note\n---\n");

    let mut cmds = Commands::open(dir.path())?;
    assert_eq!(cmds.rebuild()?, 3);
    assert!(cmds.node("orphan").is_none());
    assert!(cmds.node("txt").is_none());
    assert_eq!(cmds.stats().node_count, 3);
    Ok(())
}

#[test]
fn missing_nodes_dir_rebuilds_empty() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let cfg = GraphConfig {
        nodes_dir: dir.path().join("nowhere"),
        cache_file: dir.path().join("graph.json"),
        recent_window: 20,
    };
    let mut index = GraphIndex::load(&cfg);
    assert_eq!(index.stats().updated_at, "never");
    assert_eq!(index.rebuild()?, 0);
    assert!(cfg.cache_file.exists());
    assert_ne!(index.stats().updated_at, "never");
    Ok(())
}

#[test]
fn corrupt_index_loads_empty() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join("graph.json"), "{ not json")?;
    let cmds = Commands::open(dir.path())?;
    assert_eq!(cmds.stats().node_count, 0);
    assert!(cmds.recent(5).is_empty());
    Ok(())
}

#[test]
fn recent_window_comes_from_config() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    fs::write(
        dir.path().join("config.toml"),
        "[graph]\nnodes_dir = \"notes\"\nrecent_window = 2\n",
    )?;
    let p = dir.path().join("notes/tasks/t1.md");
    fs::create_dir_all(p.parent().unwrap())?;
    fs::write(&p, node_text("t1", "task", "2025-01-03T10:00:00Z", "", "", "a"))?;
    let p = dir.path().join("notes/tasks/t2.md");
    fs::write(&p, node_text("t2", "task", "2025-01-04T10:00:00Z", "", "", "b"))?;
    let p = dir.path().join("notes/tasks/t3.md");
    fs::write(&p, node_text("t3", "task", "2025-01-02T10:00:00Z", "", "", "c"))?;

    let mut cmds = Commands::open(dir.path())?;
    assert_eq!(cmds.rebuild()?, 3);
    assert_eq!(cmds.recent(10), vec!["t2", "t1"]);
    Ok(())
}

#[test]
fn malformed_config_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("config.toml"), "[graph\nrecent_window = ").unwrap();
    assert!(Commands::open(dir.path()).is_err());
}

#[test]
fn related_ranks_links_above_shared_tags() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write(dir.path(), "tasks/a.md", &node_text("a", "task", "2025-01-01T00:00:00Z", "x, y, z", "[[b]], [[missing]]", "A"));
    write(dir.path(), "tasks/b.md", &node_text("b", "task", "2025-01-01T00:00:00Z", "", "", "B"));
    write(dir.path(), "tasks/c.md", &node_text("c", "task", "2025-01-01T00:00:00Z", "x, y", "", "C"));
    write(dir.path(), "tasks/d.md", &node_text("d", "task", "2025-01-01T00:00:00Z", "z", "[[a]]", "D"));
    write(dir.path(), "tasks/e.md", &node_text("e", "task", "2025-01-01T00:00:00Z", "y", "", "E"));

    let mut cmds = Commands::open(dir.path())?;
    cmds.rebuild()?;

    let scored = cmds.related_scored("a", 10);
    assert_eq!(
        scored,
        vec![
            ("d".to_string(), 4),
            ("b".to_string(), 3),
            ("c".to_string(), 2),
            ("e".to_string(), 1),
        ]
    );
    assert!(scored.windows(2).all(|w| w[0].1 >= w[1].1));
    assert!(scored.iter().all(|(id, _)| id != "a" && id != "missing"));

    assert_eq!(cmds.related("a", 2), vec!["d", "b"]);
    assert!(cmds.related("nope", 5).is_empty());
    Ok(())
}

#[test]
fn search_is_case_insensitive_and_limited() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    seed(dir.path());
    let mut cmds = Commands::open(dir.path())?;
    cmds.rebuild()?;

    assert_eq!(cmds.search("SQLITE", 10), vec!["d1"]);
    assert_eq!(cmds.search("perf", 10), vec!["t1", "x1"]);
    assert_eq!(cmds.search("perf", 1), vec!["t1"]);
    assert!(cmds.search("nothing matches this", 10).is_empty());

    // a file deleted behind the index is skipped
    fs::remove_file(dir.path().join("nodes/tasks/t1.md"))?;
    assert_eq!(cmds.search("perf", 10), vec!["x1"]);
    Ok(())
}
