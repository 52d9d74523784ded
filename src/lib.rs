// src/lib.rs

pub mod config;
pub mod constants;
pub mod engine;
pub mod errors;
pub mod orchestrator;
pub mod power;
pub mod query;
pub mod selector;
pub mod snapshot;
pub mod utils;

#[cfg(test)]
mod testing;
