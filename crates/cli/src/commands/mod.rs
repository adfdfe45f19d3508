//! CLI command implementations.

pub mod catalog;
pub mod embeddings;
pub mod migrate;
