//! SQLite-backed storage for cache namespaces and their entries.
//!
//! This module provides the persistent key-value capability the engine is
//! built on, using SQLite with async access via tokio-rusqlite:
//!
//! - Named namespaces, created on demand and deleted wholesale
//! - Entries keyed by a SHA-256 hash of method and URL
//! - Automatic schema migrations
//! - WAL mode for concurrent access

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod namespaces;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::{CachedEntry, EntryWrite};
