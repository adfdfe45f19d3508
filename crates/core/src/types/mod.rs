//! Core types for Shopvox.
//!
//! This module provides type-safe wrappers for common catalog concepts.

pub mod id;
pub mod price;
pub mod status;

pub use id::*;
pub use price::{CurrencyCode, Price};
pub use status::*;
