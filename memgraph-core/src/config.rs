use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::utils::path::absolutize;

/// Settings read from `<memory dir>/config.toml`. Every section and field is
/// optional; relative paths are resolved against the memory dir on load.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoreConfig {
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logbook: LogbookConfig,
}

impl CoreConfig {
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join("config.toml");
        let mut cfg = if path.exists() {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            toml::from_str::<CoreConfig>(&text)
                .with_context(|| format!("parsing config file {}", path.display()))?
        } else {
            tracing::debug!(
                "No config file found at {}. Using CoreConfig::default().",
                path.display()
            );
            CoreConfig::default()
        };
        cfg.resolve_paths(root);
        Ok(cfg)
    }

    fn resolve_paths(&mut self, root: &Path) {
        self.graph.nodes_dir = absolutize(root, &self.graph.nodes_dir);
        self.graph.cache_file = absolutize(root, &self.graph.cache_file);
        self.session.current_task_file = absolutize(root, &self.session.current_task_file);
        self.logbook.path = absolutize(root, &self.logbook.path);
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "GraphConfig::default_nodes_dir")]
    pub nodes_dir: PathBuf,
    #[serde(default = "GraphConfig::default_cache_file")]
    pub cache_file: PathBuf,
    #[serde(default = "GraphConfig::default_recent_window")]
    pub recent_window: usize,
}

impl GraphConfig {
    fn default_nodes_dir() -> PathBuf {
        PathBuf::from("nodes")
    }

    fn default_cache_file() -> PathBuf {
        PathBuf::from("graph.json")
    }

    fn default_recent_window() -> usize {
        20
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            nodes_dir: Self::default_nodes_dir(),
            cache_file: Self::default_cache_file(),
            recent_window: Self::default_recent_window(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "QueryConfig::default_limit")]
    pub default_limit: usize,
    #[serde(default = "QueryConfig::default_search_limit")]
    pub search_limit: usize,
    #[serde(default = "QueryConfig::default_summary_width")]
    pub summary_width: usize,
}

impl QueryConfig {
    fn default_limit() -> usize {
        5
    }

    fn default_search_limit() -> usize {
        10
    }

    fn default_summary_width() -> usize {
        80
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: Self::default_limit(),
            search_limit: Self::default_search_limit(),
            summary_width: Self::default_summary_width(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "SessionConfig::default_current_task_file")]
    pub current_task_file: PathBuf,
}

impl SessionConfig {
    fn default_current_task_file() -> PathBuf {
        PathBuf::from(".current_task")
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            current_task_file: Self::default_current_task_file(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogbookConfig {
    #[serde(default = "LogbookConfig::default_enabled")]
    pub enabled: bool,
    #[serde(default = "LogbookConfig::default_path")]
    pub path: PathBuf,
}

impl LogbookConfig {
    fn default_enabled() -> bool {
        true
    }

    fn default_path() -> PathBuf {
        PathBuf::from("logbook.jsonl")
    }
}

impl Default for LogbookConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            path: Self::default_path(),
        }
    }
}
