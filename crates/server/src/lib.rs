//! Shopvox server library.
//!
//! Semantic product search and cart functions for a conversational shopping
//! assistant. An orchestrator calls named functions (`search_products`,
//! `add_to_cart`, ...) over HTTP; each call returns a JSON envelope with a
//! ready-to-speak `response` string.
//!
//! # Layout
//!
//! - [`embeddings`] - text to vector (`OpenAI`)
//! - [`store`] - storage traits, models and the in-memory store
//! - [`db`] - `PostgreSQL` + pgvector stores
//! - [`search`] - retrieval, ranking cascade and answer composition
//! - [`functions`] - function dispatcher and handlers
//! - [`indexing`] - embedding backfill and reindex
//! - [`routes`] - axum routes

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod embeddings;
pub mod error;
pub mod functions;
pub mod indexing;
pub mod routes;
pub mod search;
pub mod state;
pub mod store;

#[cfg(test)]
mod testing;
