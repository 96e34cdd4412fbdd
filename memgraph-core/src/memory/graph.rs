// src/memory/graph.rs
//! Graph index over the node files:
//! - nodes live under <memory>/nodes/<type dir>/<id>.md
//! - the index lives in <memory>/graph.json and is rewritten after every mutation
//! - `rebuild` recomputes everything from disk; `update_single_node` patches
//!   one entry and only ever adds backlink edges
//!
//! Readers go through the accessors; only this module writes `graph.json`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashSet},
    fs, io,
    path::{Path, PathBuf},
};

use super::record::{parse_node, NodeRecord, DEFAULT_STATUS};
use crate::config::GraphConfig;
use crate::utils::fsio::{list_node_files, mtime_secs, write_atomic};
use crate::utils::timefmt::now_stamp;

pub const INDEX_VERSION: &str = "1.0.0";

const FORWARD_LINK_WEIGHT: u32 = 3;
const BACKLINK_WEIGHT: u32 = 3;

// ---------- persisted shape ----------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub path: PathBuf,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub links_to: Vec<String>,
    #[serde(default)]
    pub backlinks: Vec<String>,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub updated: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub mtime: f64,
}

fn default_status() -> String {
    DEFAULT_STATUS.to_string()
}

impl IndexEntry {
    fn from_record(record: &NodeRecord, path: &Path) -> Self {
        let meta = &record.metadata;
        Self {
            path: path.to_path_buf(),
            node_type: meta.node_type.clone(),
            tags: meta.tags.clone(),
            links_to: record.links.clone(),
            backlinks: Vec::new(),
            created: meta.created.clone(),
            updated: meta.updated.clone(),
            status: meta.status.clone(),
            mtime: mtime_secs(path),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphCache {
    #[serde(default = "GraphCache::default_version")]
    pub version: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub node_count: usize,
    #[serde(default)]
    pub nodes: BTreeMap<String, IndexEntry>,
    #[serde(default)]
    pub tags: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub types: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub recent: Vec<String>,
}

impl GraphCache {
    fn default_version() -> String {
        INDEX_VERSION.to_string()
    }
}

impl Default for GraphCache {
    fn default() -> Self {
        Self {
            version: Self::default_version(),
            updated_at: String::new(),
            node_count: 0,
            nodes: BTreeMap::new(),
            tags: BTreeMap::new(),
            types: BTreeMap::new(),
            recent: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub tag_count: usize,
    pub type_count: usize,
    pub updated_at: String,
}

/// Outcome of re-indexing a node after its file was written. Failures here
/// never undo the write that preceded them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum IndexSync {
    Synced,
    /// The file did not parse into a valid record.
    Skipped,
    Failed(String),
}

impl IndexSync {
    pub fn is_synced(&self) -> bool {
        matches!(self, IndexSync::Synced)
    }
}

// ---------- index ----------

#[derive(Debug)]
pub struct GraphIndex {
    nodes_dir: PathBuf,
    cache_path: PathBuf,
    recent_window: usize,
    cache: GraphCache,
}

impl GraphIndex {
    /// Load the persisted index, or start empty when it is missing or unreadable.
    pub fn load(cfg: &GraphConfig) -> Self {
        Self {
            nodes_dir: cfg.nodes_dir.clone(),
            cache_path: cfg.cache_file.clone(),
            recent_window: cfg.recent_window,
            cache: read_cache(&cfg.cache_file),
        }
    }

    pub fn nodes_dir(&self) -> &Path {
        &self.nodes_dir
    }

    pub fn cache(&self) -> &GraphCache {
        &self.cache
    }

    /// Re-parse every node file and replace the index. Returns the node count.
    pub fn rebuild(&mut self) -> Result<usize> {
        let mut cache = GraphCache::default();
        // construction order, used to break ties in `recent`
        let mut order: Vec<String> = Vec::new();
        let mut skipped = 0usize;

        for path in list_node_files(&self.nodes_dir) {
            let Some(record) = parse_node(&path) else {
                tracing::debug!("skipping {}: not a valid node", path.display());
                skipped += 1;
                continue;
            };
            let id = record.metadata.id.clone();
            let entry = IndexEntry::from_record(&record, &path);

            if cache.nodes.insert(id.clone(), entry).is_some() {
                tracing::debug!("duplicate node id {id}; {} wins", path.display());
            } else {
                order.push(id);
            }
        }

        // memberships come from the surviving entry of each id
        for id in &order {
            let Some(entry) = cache.nodes.get(id) else {
                continue;
            };
            for tag in &entry.tags {
                push_unique(cache.tags.entry(tag.clone()).or_default(), id);
            }
            push_unique(cache.types.entry(entry.node_type.clone()).or_default(), id);
        }

        let edges: Vec<(String, String)> = cache
            .nodes
            .iter()
            .flat_map(|(source, entry)| {
                entry
                    .links_to
                    .iter()
                    .map(move |target| (source.clone(), target.clone()))
            })
            .collect();
        for (source, target) in edges {
            if let Some(entry) = cache.nodes.get_mut(&target) {
                push_unique(&mut entry.backlinks, &source);
            }
        }

        order.sort_by(|a, b| updated_of(&cache, b).cmp(updated_of(&cache, a)));
        order.truncate(self.recent_window);
        cache.recent = order;
        cache.node_count = cache.nodes.len();

        self.cache = cache;
        self.persist()?;
        tracing::info!(
            "rebuilt graph index: {} nodes ({} files skipped)",
            self.cache.node_count,
            skipped
        );
        Ok(self.cache.node_count)
    }

    /// Re-index one node file. `Ok(false)` when the file is not a valid node;
    /// the index is left untouched in that case.
    pub fn update_single_node(&mut self, path: &Path) -> Result<bool> {
        let Some(record) = parse_node(path) else {
            tracing::debug!("not updating {}: not a valid node", path.display());
            return Ok(false);
        };
        let id = record.metadata.id.clone();
        let mut entry = IndexEntry::from_record(&record, path);
        let cache = &mut self.cache;

        if let Some(previous) = cache.nodes.get(&id) {
            entry.backlinks = previous.backlinks.clone();
            for tag in &previous.tags {
                if !entry.tags.contains(tag) {
                    remove_member(&mut cache.tags, tag, &id);
                }
            }
            if previous.node_type != entry.node_type {
                remove_member(&mut cache.types, &previous.node_type, &id);
            }
        }
        for tag in &entry.tags {
            push_unique(cache.tags.entry(tag.clone()).or_default(), &id);
        }
        push_unique(cache.types.entry(entry.node_type.clone()).or_default(), &id);

        let targets = entry.links_to.clone();
        cache.nodes.insert(id.clone(), entry);
        for target in &targets {
            if let Some(target_entry) = cache.nodes.get_mut(target) {
                push_unique(&mut target_entry.backlinks, &id);
            }
        }

        cache.recent.retain(|r| r != &id);
        cache.recent.insert(0, id.clone());
        cache.recent.truncate(self.recent_window);
        cache.node_count = cache.nodes.len();

        self.persist()?;
        tracing::debug!("updated node {id} from {}", path.display());
        Ok(true)
    }

    /// `update_single_node` with failures folded into an [`IndexSync`].
    pub fn sync_node(&mut self, path: &Path) -> IndexSync {
        match self.update_single_node(path) {
            Ok(true) => IndexSync::Synced,
            Ok(false) => {
                tracing::warn!("index sync skipped for {}: not a valid node", path.display());
                IndexSync::Skipped
            }
            Err(e) => {
                tracing::warn!("index sync failed for {}: {e:#}", path.display());
                IndexSync::Failed(format!("{e:#}"))
            }
        }
    }

    /// Stamp and atomically rewrite `graph.json`.
    pub fn persist(&mut self) -> Result<()> {
        self.cache.updated_at = now_stamp();
        let bytes = serde_json::to_vec_pretty(&self.cache).context("serializing graph index")?;
        write_atomic(&self.cache_path, &bytes)
            .with_context(|| format!("persisting graph index to {}", self.cache_path.display()))
    }

    // ---------- accessors ----------

    pub fn node(&self, id: &str) -> Option<&IndexEntry> {
        self.cache.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.cache.nodes.contains_key(id)
    }

    pub fn by_type(&self, node_type: &str) -> &[String] {
        self.cache.types.get(node_type).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn by_tag(&self, tag: &str) -> &[String] {
        self.cache.tags.get(tag).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn recent(&self, limit: usize) -> Vec<String> {
        self.cache.recent.iter().take(limit).cloned().collect()
    }

    pub fn related(&self, id: &str, limit: usize) -> Vec<String> {
        self.related_scored(id, limit)
            .into_iter()
            .map(|(id, _)| id)
            .collect()
    }

    /// Related nodes with their connection scores, strongest first.
    ///
    /// Candidates are forward links, then backlinks, then nodes sharing a tag
    /// (in the node's tag order). Ties keep that first-seen order.
    pub fn related_scored(&self, id: &str, limit: usize) -> Vec<(String, u32)> {
        let Some(node) = self.node(id) else {
            return Vec::new();
        };

        let mut seen: HashSet<&str> = HashSet::new();
        seen.insert(id);
        let mut candidates: Vec<&str> = Vec::new();
        let tag_peers = node.tags.iter().flat_map(|tag| self.by_tag(tag).iter());
        for other in node.links_to.iter().chain(node.backlinks.iter()).chain(tag_peers) {
            if self.contains(other) && seen.insert(other.as_str()) {
                candidates.push(other.as_str());
            }
        }

        let mut scored: Vec<(String, u32)> = candidates
            .into_iter()
            .map(|other| (other.to_string(), self.connection_strength(node, other)))
            .collect();
        scored.sort_by(|a, b| b.1.cmp(&a.1));
        scored.truncate(limit);
        scored
    }

    fn connection_strength(&self, node: &IndexEntry, other_id: &str) -> u32 {
        let Some(other) = self.node(other_id) else {
            return 0;
        };
        let mut score = 0;
        if node.links_to.iter().any(|t| t == other_id) {
            score += FORWARD_LINK_WEIGHT;
        }
        if node.backlinks.iter().any(|b| b == other_id) {
            score += BACKLINK_WEIGHT;
        }
        score + node.tags.iter().filter(|t| other.tags.contains(t)).count() as u32
    }

    /// Case-insensitive substring search over the full text of each indexed
    /// file, in id order. Files that can no longer be read are skipped.
    pub fn search(&self, query: &str, limit: usize) -> Vec<String> {
        let needle = query.to_lowercase();
        let mut hits = Vec::new();
        if limit == 0 {
            return hits;
        }
        for (id, entry) in &self.cache.nodes {
            let Ok(text) = fs::read_to_string(&entry.path) else {
                continue;
            };
            if text.to_lowercase().contains(&needle) {
                hits.push(id.clone());
                if hits.len() >= limit {
                    break;
                }
            }
        }
        hits
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            node_count: self.cache.node_count,
            tag_count: self.cache.tags.len(),
            type_count: self.cache.types.len(),
            updated_at: if self.cache.updated_at.is_empty() {
                "never".to_string()
            } else {
                self.cache.updated_at.clone()
            },
        }
    }
}

// ---------- helpers ----------

fn read_cache(path: &Path) -> GraphCache {
    match fs::read(path) {
        Ok(bytes) => match serde_json::from_slice::<GraphCache>(&bytes) {
            Ok(cache) => cache,
            Err(e) => {
                tracing::warn!("graph index {} is corrupt, starting empty: {e}", path.display());
                GraphCache::default()
            }
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => GraphCache::default(),
        Err(e) => {
            tracing::warn!("cannot read graph index {}, starting empty: {e}", path.display());
            GraphCache::default()
        }
    }
}

fn updated_of<'a>(cache: &'a GraphCache, id: &str) -> &'a str {
    cache.nodes.get(id).map(|e| e.updated.as_str()).unwrap_or("")
}

fn push_unique(list: &mut Vec<String>, id: &str) {
    if !list.iter().any(|x| x == id) {
        list.push(id.to_string());
    }
}

fn remove_member(map: &mut BTreeMap<String, Vec<String>>, key: &str, id: &str) {
    if let Some(members) = map.get_mut(key) {
        members.retain(|m| m != id);
        if members.is_empty() {
            map.remove(key);
        }
    }
}
