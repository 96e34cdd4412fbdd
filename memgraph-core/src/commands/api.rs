// src/commands/api.rs
use anyhow::{bail, Result};
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};

use crate::commands::init::ensure_initialized;
use crate::commands::query::{self, QueryError, QueryRequest};
use crate::config::CoreConfig;
use crate::memory::graph::{GraphIndex, GraphStats, IndexEntry, IndexSync};
use crate::memory::writer::{render_node, NewNode};
use crate::services::linker::{self, LinkOutcome};
use crate::services::task::{TaskContext, TaskTransition};
use crate::utils::fsio::write_atomic;
use crate::utils::logbook::Logbook;
use crate::utils::path::node_path;

/// One memory dir: its config, graph index, task pointer and logbook.
pub struct Commands {
    root: PathBuf,
    config: CoreConfig,
    index: GraphIndex,
    task: TaskContext,
    logbook: Logbook,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateReport {
    pub node_id: String,
    pub path: PathBuf,
    pub sync: IndexSync,
    pub task: TaskTransition,
    /// Set when the node was written but the task pointer could not be moved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_error: Option<String>,
}

impl Commands {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root: PathBuf = root.into();
        let report = ensure_initialized(&root)?;
        let config = report.config;
        let index = GraphIndex::load(&config.graph);
        let task = TaskContext::load(&config.session.current_task_file);
        let logbook = if config.logbook.enabled {
            Logbook::new(config.logbook.path.clone())
        } else {
            Logbook::disabled()
        };
        Ok(Self {
            root: report.root,
            config,
            index,
            task,
            logbook,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn index(&self) -> &GraphIndex {
        &self.index
    }

    // ---------- index maintenance ----------

    pub fn rebuild(&mut self) -> Result<usize> {
        let count = self.index.rebuild()?;
        self.logbook.emit("rebuild", json!({ "node_count": count }));
        Ok(count)
    }

    /// Re-index one node file. `Ok(false)` when it is not a valid node.
    pub fn update(&mut self, path: &Path) -> Result<bool> {
        let updated = self.index.update_single_node(path)?;
        self.logbook.emit(
            "update",
            json!({ "path": path.display().to_string(), "updated": updated }),
        );
        Ok(updated)
    }

    // ---------- reads ----------

    pub fn stats(&self) -> GraphStats {
        self.index.stats()
    }

    pub fn node(&self, id: &str) -> Option<&IndexEntry> {
        self.index.node(id)
    }

    pub fn recent(&self, n: usize) -> Vec<String> {
        self.index.recent(n)
    }

    pub fn by_type(&self, node_type: &str) -> Vec<String> {
        self.index.by_type(node_type).to_vec()
    }

    pub fn by_tag(&self, tag: &str) -> Vec<String> {
        self.index.by_tag(tag).to_vec()
    }

    pub fn related(&self, id: &str, n: usize) -> Vec<String> {
        self.index.related(id, n)
    }

    pub fn related_scored(&self, id: &str, n: usize) -> Vec<(String, u32)> {
        self.index.related_scored(id, n)
    }

    pub fn search(&self, query: &str, n: usize) -> Vec<String> {
        self.index.search(query, n)
    }

    pub fn query(&self, req: &QueryRequest) -> Result<String, QueryError> {
        query::run(&self.index, req, self.config.query.summary_width)
    }

    // ---------- writes ----------

    /// Write a new node file and index it. Refuses to replace an existing
    /// file unless `overwrite` is set. Task nodes move the task pointer.
    pub fn create_node(&mut self, node: &NewNode, overwrite: bool) -> Result<CreateReport> {
        let path = node_path(self.index.nodes_dir(), &node.node_type, &node.id)?;
        if path.exists() && !overwrite {
            bail!("node file already exists: {}", path.display());
        }
        write_atomic(&path, render_node(node).as_bytes())?;
        let sync = self.index.sync_node(&path);

        let (task, task_error) = if node.node_type == "task" {
            match self.record_task_status(&node.id, node.status()) {
                Ok(transition) => (transition, None),
                Err(e) => {
                    tracing::warn!("task pointer not updated for {}: {e:#}", node.id);
                    (TaskTransition::Unchanged, Some(format!("{e:#}")))
                }
            }
        } else {
            (TaskTransition::Unchanged, None)
        };

        self.logbook.emit(
            "create",
            json!({
                "id": node.id,
                "type": node.node_type,
                "path": path.display().to_string(),
                "synced": sync.is_synced(),
                "task_error": task_error,
            }),
        );
        tracing::info!("created {} node {}", node.node_type, node.id);

        Ok(CreateReport {
            node_id: node.id.clone(),
            path,
            sync,
            task,
            task_error,
        })
    }

    pub fn link(&mut self, source_type: &str, source_id: &str, target: &str) -> LinkOutcome {
        let outcome = linker::link(&mut self.index, source_type, source_id, target);
        self.logbook.emit(
            "link",
            json!({ "source": source_id, "target": target, "success": outcome.is_success() }),
        );
        outcome
    }

    /// Link `a -> b` and `b -> a`.
    pub fn link_both(&mut self, a: (&str, &str), b: (&str, &str)) -> (LinkOutcome, LinkOutcome) {
        let forward = self.link(a.0, a.1, b.1);
        let backward = self.link(b.0, b.1, a.1);
        (forward, backward)
    }

    /// Link a node and the current task both ways. `None` without a current task.
    pub fn link_to_current_task(&mut self, node_type: &str, node_id: &str) -> Option<(LinkOutcome, LinkOutcome)> {
        let task_id = self.task.current()?.to_string();
        if task_id == node_id {
            return None;
        }
        Some(self.link_both((node_type, node_id), ("task", &task_id)))
    }

    // ---------- task pointer ----------

    pub fn current_task(&self) -> Option<&str> {
        self.task.current()
    }

    pub fn record_task_status(&mut self, task_id: &str, status: &str) -> Result<TaskTransition> {
        let transition = self.task.apply_status(task_id, status)?;
        if transition != TaskTransition::Unchanged {
            self.logbook.emit(
                "task_pointer",
                json!({ "task": task_id, "status": status, "current": self.task.current() }),
            );
        }
        Ok(transition)
    }
}
