// memgraph-core/src/lib.rs
pub mod commands;
pub mod config;
pub mod memory;
pub mod services;
pub mod utils;

pub use commands::query::{OutputFormat, QueryCommand, QueryError, QueryRequest, StatusFilter, TimeWindow};
pub use commands::{Commands, CreateReport};
pub use memory::frontmatter::FieldValue;
pub use memory::graph::{GraphIndex, GraphStats, IndexEntry, IndexSync};
pub use memory::record::{parse_node, NodeRecord};
pub use memory::writer::NewNode;
pub use services::linker::LinkOutcome;
pub use services::task::{TaskContext, TaskTransition};
