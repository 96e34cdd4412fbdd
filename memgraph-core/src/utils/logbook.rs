// src/utils/logbook.rs
use anyhow::Result;
use serde_json::Value;
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use crate::utils::timefmt::now_stamp;

/// Append-only JSONL record of index operations. Best effort: a write that
/// fails is logged at debug level and otherwise ignored.
#[derive(Debug, Clone)]
pub struct Logbook {
    path: Option<PathBuf>,
}

impl Logbook {
    pub fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn emit(&self, event: &str, data: Value) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = append_line(path, event, data) {
            tracing::debug!("logbook append to {} failed: {e}", path.display());
        }
    }
}

fn append_line(path: &Path, event: &str, data: Value) -> Result<()> {
    let line = serde_json::json!({
        "timestamp": now_stamp(),
        "event": event,
        "data": data
    });
    let json = serde_json::to_string(&line)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut f = fs::OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(f, "{}", json)?;
    Ok(())
}
