// src/commands/query.rs
//! Read-side query pipeline: resolve a command against the index, filter by
//! status and time window, render in one of four formats.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::{fmt, fs, str::FromStr};
use thiserror::Error;

use crate::memory::graph::{GraphIndex, IndexEntry};
use crate::memory::record::parse_node;
use crate::utils::timefmt::parse_stamp;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("invalid time window {window:?}: {reason}")]
    InvalidTimeWindow { window: String, reason: &'static str },
    #[error("unknown query command {0:?} (expected recent, type, tag, related, search or id)")]
    UnknownCommand(String),
    #[error("unknown output format {0:?} (expected summary, json, full or ids)")]
    UnknownFormat(String),
    #[error("unknown status filter {0:?} (expected active, archived or all)")]
    UnknownStatus(String),
    #[error("query command `{0}` needs a query argument")]
    MissingQuery(QueryCommand),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryCommand {
    Recent,
    Type,
    Tag,
    Related,
    Search,
    Id,
}

impl QueryCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            QueryCommand::Recent => "recent",
            QueryCommand::Type => "type",
            QueryCommand::Tag => "tag",
            QueryCommand::Related => "related",
            QueryCommand::Search => "search",
            QueryCommand::Id => "id",
        }
    }

    fn needs_query(self) -> bool {
        !matches!(self, QueryCommand::Recent)
    }
}

impl fmt::Display for QueryCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryCommand {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "recent" => Ok(QueryCommand::Recent),
            "type" => Ok(QueryCommand::Type),
            "tag" => Ok(QueryCommand::Tag),
            "related" => Ok(QueryCommand::Related),
            "search" => Ok(QueryCommand::Search),
            "id" => Ok(QueryCommand::Id),
            other => Err(QueryError::UnknownCommand(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Summary,
    Json,
    Full,
    Ids,
}

impl FromStr for OutputFormat {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "summary" => Ok(OutputFormat::Summary),
            "json" => Ok(OutputFormat::Json),
            "full" => Ok(OutputFormat::Full),
            "ids" => Ok(OutputFormat::Ids),
            other => Err(QueryError::UnknownFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    Active,
    Archived,
    All,
}

impl StatusFilter {
    pub fn admits(self, status: &str) -> bool {
        match self {
            StatusFilter::Active => status == "active",
            StatusFilter::Archived => status == "archived",
            StatusFilter::All => true,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "active" => Ok(StatusFilter::Active),
            "archived" => Ok(StatusFilter::Archived),
            "all" => Ok(StatusFilter::All),
            other => Err(QueryError::UnknownStatus(other.to_string())),
        }
    }
}

/// `<N><unit>` lookback, unit one of h, d, m (30 days), y (365 days).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    amount: u32,
    unit: char,
}

impl TimeWindow {
    /// `Ok(None)` for `all`, which disables the time filter.
    pub fn parse(raw: &str) -> Result<Option<Self>, QueryError> {
        let s = raw.trim();
        let invalid = |reason| QueryError::InvalidTimeWindow {
            window: raw.to_string(),
            reason,
        };
        if s.is_empty() {
            return Err(invalid("empty"));
        }
        if s == "all" {
            return Ok(None);
        }
        let Some(unit) = s.chars().last() else {
            return Err(invalid("empty"));
        };
        if !matches!(unit, 'h' | 'd' | 'm' | 'y') {
            return Err(invalid("unit must be one of h, d, m, y"));
        }
        let digits = &s[..s.len() - unit.len_utf8()];
        if digits.is_empty() {
            return Err(invalid("missing number"));
        }
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("number must be a positive integer"));
        }
        let amount: u32 = digits
            .parse()
            .map_err(|_| invalid("number out of range"))?;
        if amount == 0 {
            return Err(invalid("number must be a positive integer"));
        }
        let window = Self { amount, unit };
        if window.checked_duration().is_none() {
            return Err(invalid("number out of range"));
        }
        Ok(Some(window))
    }

    fn checked_duration(&self) -> Option<Duration> {
        let n = i64::from(self.amount);
        match self.unit {
            'h' => Duration::try_hours(n),
            'm' => Duration::try_days(n * 30),
            'y' => Duration::try_days(n * 365),
            _ => Duration::try_days(n),
        }
    }

    pub fn duration(&self) -> Duration {
        self.checked_duration().unwrap_or(Duration::MAX)
    }

    /// Oldest admitted instant. Windows reaching past the earliest
    /// representable date admit everything dated.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.duration())
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

impl FromStr for TimeWindow {
    type Err = QueryError;

    /// Like [`TimeWindow::parse`] but `all` is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeWindow::parse(s)?.ok_or_else(|| QueryError::InvalidTimeWindow {
            window: s.to_string(),
            reason: "`all` is not a bounded window",
        })
    }
}

#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub command: QueryCommand,
    pub query: String,
    pub format: OutputFormat,
    pub limit: usize,
    pub status: StatusFilter,
    pub since: Option<TimeWindow>,
}

impl QueryRequest {
    pub fn new(command: QueryCommand, query: impl Into<String>) -> Self {
        Self {
            command,
            query: query.into(),
            format: OutputFormat::default(),
            limit: 5,
            status: StatusFilter::default(),
            since: None,
        }
    }
}

/// Resolve, filter and render. Returns the text to print.
pub fn run(index: &GraphIndex, req: &QueryRequest, summary_width: usize) -> Result<String, QueryError> {
    let ids = select(index, req, Utc::now())?;
    Ok(render(index, &ids, req.format, summary_width))
}

/// Resolve the command and apply the status and time filters.
pub fn select(index: &GraphIndex, req: &QueryRequest, now: DateTime<Utc>) -> Result<Vec<String>, QueryError> {
    let ids = resolve(index, req)?;
    let cutoff = req.since.map(|w| w.cutoff(now));
    Ok(ids
        .into_iter()
        .filter(|id| {
            let Some(entry) = index.node(id) else {
                return false;
            };
            req.status.admits(&entry.status) && within(entry, cutoff)
        })
        .collect())
}

fn resolve(index: &GraphIndex, req: &QueryRequest) -> Result<Vec<String>, QueryError> {
    let query = req.query.trim();
    if req.command.needs_query() && query.is_empty() {
        return Err(QueryError::MissingQuery(req.command));
    }
    let limit = req.limit;
    Ok(match req.command {
        QueryCommand::Recent => index.recent(limit),
        QueryCommand::Type => index.by_type(query).iter().take(limit).cloned().collect(),
        QueryCommand::Tag => index.by_tag(query).iter().take(limit).cloned().collect(),
        QueryCommand::Related => index.related(query, limit),
        QueryCommand::Search => index.search(query, limit),
        QueryCommand::Id if index.contains(query) => vec![query.to_string()],
        QueryCommand::Id => Vec::new(),
    })
}

fn within(entry: &IndexEntry, cutoff: Option<DateTime<Utc>>) -> bool {
    let Some(cutoff) = cutoff else {
        return true;
    };
    parse_stamp(&entry.updated).is_some_and(|ts| ts >= cutoff)
}

// ---------- rendering ----------

#[derive(Serialize)]
struct JsonNode<'a> {
    id: &'a str,
    #[serde(flatten)]
    entry: &'a IndexEntry,
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    nodes: Vec<JsonNode<'a>>,
    count: usize,
}

pub fn render(index: &GraphIndex, ids: &[String], format: OutputFormat, summary_width: usize) -> String {
    match format {
        OutputFormat::Ids => ids.join("\n"),
        OutputFormat::Json => {
            let nodes: Vec<JsonNode<'_>> = ids
                .iter()
                .filter_map(|id| index.node(id).map(|entry| JsonNode { id, entry }))
                .collect();
            let out = JsonOutput {
                count: nodes.len(),
                nodes,
            };
            serde_json::to_string_pretty(&out).unwrap_or_else(|e| {
                tracing::warn!("rendering query results as json failed: {e}");
                String::from("{\"nodes\": [], \"count\": 0}")
            })
        }
        OutputFormat::Full => ids
            .iter()
            .filter_map(|id| {
                let entry = index.node(id)?;
                let text = fs::read_to_string(&entry.path).ok()?;
                Some(format!("--- {id} ---\n{text}"))
            })
            .collect::<Vec<_>>()
            .join("\n\n"),
        OutputFormat::Summary => ids
            .iter()
            .filter_map(|id| {
                let entry = index.node(id)?;
                let display = summary_line(entry, id, summary_width)?;
                Some(format!("[{}] {display}", entry.node_type))
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// First heading, else the first non-blank line cut to `width` chars, else the
/// id. `None` when the file can no longer be parsed.
fn summary_line(entry: &IndexEntry, id: &str, width: usize) -> Option<String> {
    let record = parse_node(&entry.path)?;
    let mut first_line: Option<&str> = None;
    for line in record.content.lines().map(str::trim) {
        if line.starts_with('#') {
            let heading = line.trim_start_matches('#').trim();
            if !heading.is_empty() {
                return Some(heading.to_string());
            }
            break;
        }
        if !line.is_empty() && first_line.is_none() {
            first_line = Some(line);
        }
    }
    Some(match first_line {
        Some(line) => line.chars().take(width).collect(),
        None => id.to_string(),
    })
}
