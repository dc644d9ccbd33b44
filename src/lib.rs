//! Sibyl - themed-persona question answering
//!
//! Answers free-text questions with a themed persona by retrieving relevant
//! passages from a fixed corpus, blending them into a single synthesized
//! answer, and modulating tone with a tracked emotional state.

pub mod corpus;
pub mod embedding;
pub mod error;
pub mod index;
pub mod memory;
pub mod mood;
pub mod persona;
pub mod pipeline;
pub mod scanner;
pub mod synthesis;
pub mod types;

pub use corpus::CorpusStore;
pub use error::{Result, SibylError};
pub use pipeline::{Pipeline, PipelineConfig};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
