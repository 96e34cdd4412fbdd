// src/utils/mod.rs
pub mod fsio;
pub mod logbook;
pub mod path;
pub mod timefmt;
