// src/memory/mod.rs
pub mod frontmatter;
pub mod graph;
pub mod record;
pub mod writer;
