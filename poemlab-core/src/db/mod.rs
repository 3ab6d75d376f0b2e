//! Database layer for poemlab
//!
//! This module provides the storage layer using SQLite with:
//! - Schema migrations
//! - Overwrite-in-place session snapshots
//! - The append-only summary table

pub mod repo;
pub mod schema;

pub use repo::Database;
