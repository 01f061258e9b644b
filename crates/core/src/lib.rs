//! Core types and shared functionality for offcache.
//!
//! This crate provides:
//! - Namespaced cache storage with SQLite backend
//! - Request classification
//! - Request/response types and URL canonicalization
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod classify;
pub mod config;
pub mod error;
pub mod manifest;
pub mod namespace;
pub mod request;
pub mod url;

pub use cache::{CacheDb, CachedEntry};
pub use classify::{Classifier, ClassifierConfig, RequestClassification};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use manifest::AssetManifest;
pub use namespace::{CacheRole, CacheStore, NamespaceManager};
pub use request::{Destination, RequestDescriptor, RequestMode, ResponseSnapshot};
