//! # protoprop-core
//!
//! A library for compiling Protocol Buffer schemas into `proptest` strategies.
//!
//! This crate provides the core functionality for:
//! - Mapping every message and enum type of a schema to a strategy
//! - Resolving forward, self and mutual references between message types
//! - Overriding the strategy of any field or enum by fully-qualified name
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`convert`]: Module scheduling, type resolution and the strategy table
//! - [`strategy`]: Scalar policy, label transforms and overrides
//! - [`error`]: Error types and handling
//!
//! Schemas are read through `prost-reflect` descriptors and generated messages
//! are `prost_reflect::DynamicMessage`s.
//!
//! ## Example
//!
//! ```no_run
//! use protoprop_core::{load_descriptor_set, Converter};
//! use proptest::prelude::*;
//!
//! let pool = load_descriptor_set("schema.binpb")?;
//! let table = Converter::new().convert_pool(&pool)?;
//! let users = table.message_by_name("accounts.User").expect("resolved");
//!
//! proptest!(|(user in users)| {
//!     prop_assert!(user.has_field_by_name("id"));
//! });
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod convert;
pub mod error;
pub mod strategy;

#[cfg(test)]
mod testing;

// Re-export primary types for convenience
pub use convert::{
    convert, load_descriptor_set, load_descriptor_sets, Converter, ConverterConfig, SchemaType,
    StrategyTable,
};
pub use error::{Error, Result};
pub use strategy::{full_field_name, optional, FieldStrategy, FieldValue, Override, Overrides};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
