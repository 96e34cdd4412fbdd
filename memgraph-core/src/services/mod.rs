// src/services/mod.rs
pub mod linker;
pub mod task;
