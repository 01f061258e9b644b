//! Service fixture for tool tests.

use std::sync::Arc;

use offcache_client::OfflineService;
use offcache_client::testing::{FakeFetcher, FakeProbe};
use offcache_core::{AppConfig, CacheDb};

/// Service over a fetcher with no routes and an unreachable probe.
pub async fn service() -> OfflineService {
    let config = AppConfig { origin: "https://app.example".into(), ..AppConfig::default() };
    let db = CacheDb::open_in_memory().await.unwrap();
    OfflineService::with_network(&config, db, Arc::new(FakeFetcher::new()), Arc::new(FakeProbe::new(false))).unwrap()
}
