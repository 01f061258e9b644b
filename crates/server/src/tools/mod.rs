//! MCP tool implementations.
//!
//! One module per tool exposed by the offcache server.

pub mod cache;
pub mod fetch;
pub mod message;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{CacheGetParams, get_impl};
pub use fetch::{FetchParams, fetch_impl};
pub use message::{PostMessageParams, post_message_impl};
pub use sync::{BackgroundSyncParams, background_sync_impl};
