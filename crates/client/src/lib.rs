//! Network side of offcache.
//!
//! This crate provides the HTTP fetcher and reachability probe, the caching
//! strategies, background revalidation, the install/activate lifecycle and
//! the command channel. [`OfflineService`] wires them together.

pub mod command;
pub mod fetch;
pub mod lifecycle;
pub mod offline;
pub mod probe;
pub mod revalidate;
pub mod service;
pub mod strategy;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use command::{Command, CommandAck, CommandHandler, PreloadFailure, PreloadReport};
pub use fetch::{FetchClient, FetchConfig, Fetcher, fetch_success};
pub use lifecycle::{ActivateReport, BACKGROUND_SYNC_TAG, InstallReport, Lifecycle, RefreshReport};
pub use probe::{HttpProbe, Reachability, ReachabilityProbe};
pub use revalidate::{RevalidateJob, Revalidator};
pub use service::OfflineService;
pub use strategy::{FetchOutcome, Served, ServedFrom, Strategy, StrategyExecutor};
