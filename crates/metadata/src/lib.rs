//! Durable snapshot metadata store
//!
//! This crate provides:
//! - The SQLite-backed store of snapshot records and file-change rows
//! - Transactional upsert keyed by snapshot id
//! - Indexed recency, search and cleanup queries

pub mod store;

pub use store::{MetadataStore, StoreStats};
