//! pronlex: term extraction and pronunciation lookup
//!
//! Builds a `term=pronunciation` lexicon from reference documents:
//! - Term extraction with declarative per-source cleanup policies
//! - Dictionary resolution with spelling-correction follow and bounded retry
//! - Checkpointed, resumable batch writing into UTF-16 sinks
//! - Cross-source ignore sets and an ordered first-writer-wins merge

pub mod batch;
pub mod config;
pub mod content;
pub mod extract;
pub mod pipeline;
pub mod resolver;
pub mod sink;
pub mod types;

pub use config::Config;
pub use types::*;
