use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use memgraph_core::commands::memory_root;
use memgraph_core::memory::record::parse_node;
use memgraph_core::memory::writer::render_node;
use memgraph_core::utils::path::sanitize_id;
use memgraph_core::{
    Commands, FieldValue, LinkOutcome, NewNode, OutputFormat, QueryCommand, QueryRequest,
    StatusFilter, TimeWindow,
};

#[derive(Parser, Debug)]
#[command(
    name = "memgraph",
    about = "Index and query a graph of markdown memory nodes"
)]
struct Cli {
    /// Memory dir (defaults to $MEMGRAPH_DIR, then .memgraph)
    #[arg(long, global = true)]
    memory_dir: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Re-parse every node file and rewrite graph.json
    Rebuild,
    /// Re-index a single node file
    Update { path: PathBuf },
    /// Node, tag and type counts
    Stats,
    /// Most recently updated node ids
    Recent {
        /// Defaults to `[query] default_limit`
        n: Option<usize>,
    },
    /// Node ids of one type
    Type { node_type: String },
    /// Node ids carrying a tag
    Tag { tag: String },
    /// Nodes connected to a node, strongest first
    Related {
        id: String,
        n: Option<usize>,
        /// Include connection scores
        #[arg(long)]
        scores: bool,
    },
    /// Case-insensitive full-text search
    Search {
        query: String,
        /// Defaults to `[query] search_limit`
        n: Option<usize>,
    },
    /// Index entry for one node
    Node { id: String },
    /// Filtered, formatted query
    Query {
        #[arg(long, value_parser = ["recent", "type", "tag", "related", "search", "id"])]
        command: String,
        #[arg(long, default_value = "")]
        query: String,
        #[arg(long, default_value = "summary", value_parser = ["summary", "json", "full", "ids"])]
        format: String,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, default_value = "active", value_parser = ["active", "archived", "all"])]
        status: String,
        /// Lookback window such as 12h, 3d, 2m, 1y, or `all`
        #[arg(long, default_value = "all")]
        since: String,
    },
    /// Write a new node and index it
    Create {
        #[arg(long = "type")]
        node_type: String,
        #[arg(long)]
        title: String,
        /// Defaults to `<type>-<sanitized title>`
        #[arg(long)]
        id: Option<String>,
        #[arg(long, default_value = "")]
        body: String,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long = "related")]
        related: Vec<String>,
        #[arg(long)]
        status: Option<String>,
        /// Extra frontmatter as key=value; repeat a key to make a list
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,
        /// Replace an existing node file
        #[arg(long)]
        force: bool,
        /// Print the rendered node instead of writing it
        #[arg(long)]
        dry_run: bool,
    },
    /// Add [[target]] to a node's related list
    Link {
        source_type: String,
        source_id: String,
        target: String,
        /// Also link the target back; takes the target's type
        #[arg(long = "both", value_name = "TARGET_TYPE")]
        both: Option<String>,
    },
    /// Show the current task id
    Task,
    /// Record a task status change and move the task pointer
    TaskStatus { id: String, status: String },
    /// Parse one node file and print the record as JSON
    Parse { path: PathBuf },
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.trim().to_string())),
        _ => Err(format!("expected key=value, got {raw:?}")),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("MEMGRAPH_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("memgraph=warn,memgraph_core=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    if let Cmd::Parse { path } = &cli.cmd {
        let record = parse_node(path).ok_or_else(|| anyhow!("not a valid node: {}", path.display()))?;
        return print_json(&record);
    }

    let root = cli.memory_dir.clone().unwrap_or_else(memory_root);
    let mut cmds = Commands::open(&root).with_context(|| format!("opening memory dir {}", root.display()))?;
    let limits = cmds.config().query.clone();
    tracing::debug!("opened memory dir {}", cmds.root().display());

    match cli.cmd {
        Cmd::Rebuild => {
            let count = cmds.rebuild()?;
            println!("Rebuilt graph with {count} nodes");
        }
        Cmd::Update { path } => {
            if !cmds.update(&path)? {
                bail!("not a valid node: {}", path.display());
            }
            println!("Updated cache for: {}", path.display());
        }
        Cmd::Stats => print_json(&cmds.stats())?,
        Cmd::Recent { n } => print_json(&cmds.recent(n.unwrap_or(limits.default_limit)))?,
        Cmd::Type { node_type } => print_json(&cmds.by_type(&node_type))?,
        Cmd::Tag { tag } => print_json(&cmds.by_tag(&tag))?,
        Cmd::Related { id, n, scores } => {
            let n = n.unwrap_or(limits.default_limit);
            if scores {
                print_json(&cmds.related_scored(&id, n))?
            } else {
                print_json(&cmds.related(&id, n))?
            }
        }
        Cmd::Search { query, n } => print_json(&cmds.search(&query, n.unwrap_or(limits.search_limit)))?,
        Cmd::Node { id } => {
            let entry = cmds.node(&id).ok_or_else(|| anyhow!("node not found: {id}"))?;
            print_json(entry)?
        }
        Cmd::Query {
            command,
            query,
            format,
            limit,
            status,
            since,
        } => {
            let command: QueryCommand = command.parse()?;
            let req = QueryRequest {
                command,
                query,
                format: format.parse::<OutputFormat>()?,
                limit: limit.unwrap_or(match command {
                    QueryCommand::Search => limits.search_limit,
                    _ => limits.default_limit,
                }),
                status: status.parse::<StatusFilter>()?,
                since: TimeWindow::parse(&since)?,
            };
            let out = cmds.query(&req)?;
            if !out.is_empty() {
                println!("{out}");
            }
        }
        Cmd::Create {
            node_type,
            title,
            id,
            body,
            tags,
            related,
            status,
            fields,
            force,
            dry_run,
        } => {
            let id = id.unwrap_or_else(|| format!("{node_type}-{}", sanitize_id(&title)));
            let node = NewNode {
                id,
                node_type,
                title,
                body,
                tags,
                related,
                status,
                extra: collect_fields(fields),
            };
            if dry_run {
                print!("{}", render_node(&node));
                return Ok(());
            }
            let report = cmds.create_node(&node, force)?;
            print_json(&report)?;
        }
        Cmd::Link {
            source_type,
            source_id,
            target,
            both,
        } => {
            let outcomes = match both {
                Some(target_type) => {
                    let (a, b) = cmds.link_both(
                        (source_type.as_str(), source_id.as_str()),
                        (target_type.as_str(), target.as_str()),
                    );
                    vec![a, b]
                }
                None => vec![cmds.link(&source_type, &source_id, &target)],
            };
            print_json(&outcomes)?;
            for outcome in outcomes.iter().filter(|o| !o.is_success()) {
                tracing::warn!("link {source_id} -> {target}: {outcome:?}");
            }
            if !outcomes.iter().all(LinkOutcome::is_success) {
                bail!("link {source_id} -> {target} failed");
            }
        }
        Cmd::Task => match cmds.current_task() {
            Some(id) => println!("{id}"),
            None => bail!("no current task"),
        },
        Cmd::TaskStatus { id, status } => {
            let transition = cmds.record_task_status(&id, &status)?;
            print_json(&transition)?;
        }
        Cmd::Parse { .. } => {}
    }
    Ok(())
}

fn collect_fields(fields: Vec<(String, String)>) -> BTreeMap<String, FieldValue> {
    let mut out: BTreeMap<String, FieldValue> = BTreeMap::new();
    for (key, value) in fields {
        let merged = match out.remove(&key) {
            None => FieldValue::Scalar(value),
            Some(FieldValue::Scalar(first)) => FieldValue::List(vec![first, value]),
            Some(FieldValue::List(mut items)) => {
                items.push(value);
                FieldValue::List(items)
            }
        };
        out.insert(key, merged);
    }
    out
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
