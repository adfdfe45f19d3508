//! Shopvox Core - Shared types library.
//!
//! This crate provides common types used across all Shopvox components:
//! - `server` - Search engine, function dispatcher and HTTP API
//! - `cli` - Command-line tools for migrations, seeding and embedding maintenance
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices and catalog statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
