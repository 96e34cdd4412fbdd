// memgraph-core/src/commands/init.rs

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::CoreConfig;

pub const ROOT_ENV: &str = "MEMGRAPH_DIR";
pub const DEFAULT_ROOT: &str = ".memgraph";

#[derive(Debug, Clone)]
pub struct InitReport {
    pub root: PathBuf,
    pub config: CoreConfig,
    pub created: Vec<String>,
    pub existed: Vec<String>,
}

/// Resolve the memory dir. Allow override via MEMGRAPH_DIR (tests, hooks).
pub fn memory_root() -> PathBuf {
    std::env::var_os(ROOT_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT))
}

/// Ensure the memory dir and its nodes dir exist, then load config.
/// Idempotent; never touches existing files.
pub fn ensure_initialized(root: &Path) -> Result<InitReport> {
    let mut created = Vec::new();
    let mut existed = Vec::new();

    ensure_dir(root, &mut created, &mut existed)?;
    let config = CoreConfig::load(root)?;
    ensure_dir(&config.graph.nodes_dir, &mut created, &mut existed)?;

    if !created.is_empty() {
        tracing::info!("initialized memory dir {} ({} created)", root.display(), created.len());
    }

    Ok(InitReport {
        root: root.to_path_buf(),
        config,
        created,
        existed,
    })
}

fn ensure_dir(p: &Path, created: &mut Vec<String>, existed: &mut Vec<String>) -> Result<()> {
    let label = p.display().to_string();
    if p.is_dir() {
        existed.push(label);
        return Ok(());
    }
    fs::create_dir_all(p).with_context(|| format!("create_dir_all({:?})", p))?;
    created.push(label);
    Ok(())
}
