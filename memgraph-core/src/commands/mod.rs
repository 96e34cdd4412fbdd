// src/commands/mod.rs
pub mod init;
pub mod query;
mod api;

pub use api::{Commands, CreateReport};

pub use init::{ensure_initialized, memory_root, InitReport};
