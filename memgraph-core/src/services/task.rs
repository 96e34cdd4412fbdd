// src/services/task.rs
use anyhow::{Context, Result};
use serde::Serialize;
use std::{
    fs, io,
    path::{Path, PathBuf},
};

use crate::utils::fsio::write_atomic;

pub const STATUS_IN_PROGRESS: &str = "in_progress";
pub const STATUS_COMPLETED: &str = "completed";

/// The task currently being worked on, if any.
///
/// Held in memory for the life of a `Commands`; the pointer file is only read
/// on load and rewritten when the pointer changes.
#[derive(Debug, Clone)]
pub struct TaskContext {
    path: PathBuf,
    current: Option<String>,
}

/// What a status change did to the pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskTransition {
    Started,
    Completed,
    Unchanged,
}

impl TaskContext {
    pub fn load(path: &Path) -> Self {
        let current = match fs::read_to_string(path) {
            Ok(text) => Some(text.trim().to_string()).filter(|s| !s.is_empty()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!("cannot read task pointer {}: {e}", path.display());
                None
            }
        };
        Self {
            path: path.to_path_buf(),
            current,
        }
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn set(&mut self, task_id: &str) -> Result<()> {
        write_atomic(&self.path, format!("{task_id}\n").as_bytes())
            .with_context(|| format!("writing task pointer {}", self.path.display()))?;
        self.current = Some(task_id.to_string());
        Ok(())
    }

    pub fn clear(&mut self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| format!("removing task pointer {}", self.path.display()));
            }
        }
        self.current = None;
        Ok(())
    }

    /// `in_progress` points at the task; `completed` clears the pointer only
    /// when it still points at this task. Other statuses leave it alone.
    pub fn apply_status(&mut self, task_id: &str, status: &str) -> Result<TaskTransition> {
        match status {
            STATUS_IN_PROGRESS => {
                self.set(task_id)?;
                Ok(TaskTransition::Started)
            }
            STATUS_COMPLETED if self.current() == Some(task_id) => {
                self.clear()?;
                Ok(TaskTransition::Completed)
            }
            _ => Ok(TaskTransition::Unchanged),
        }
    }
}
