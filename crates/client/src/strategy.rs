//! Strategy executor.
//!
//! Every eligible request is classified, mapped to exactly one [`Strategy`],
//! and served from the namespace that strategy owns:
//!
//! | Classification | Strategy | Store |
//! |---|---|---|
//! | Image | stale-while-revalidate | image |
//! | Api | network-first | api |
//! | StaticAsset | cache-first | static |
//! | Html | network-first with offline fallback | static |
//! | Other | pass-through with offline fallback | static (read only) |
//!
//! A network success means a 2xx response; anything else counts as a failed
//! fetch and is never written to a store. The only exception is pass-through,
//! which returns whatever the network answered.

use std::sync::Arc;

use serde::Serialize;

use offcache_core::{
    CacheRole, CacheStore, Classifier, Error, NamespaceManager, RequestClassification, RequestDescriptor,
    ResponseSnapshot,
};

use crate::fetch::{Fetcher, fetch_success};
use crate::offline::{offline_page, placeholder_image};
use crate::probe::{Reachability, ReachabilityProbe};
use crate::revalidate::{RevalidateJob, Revalidator};

/// Caching algorithm applied to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    CacheFirst,
    NetworkFirst,
    StaleWhileRevalidate,
    NetworkFirstOfflineFallback,
    PassThroughOfflineFallback,
}

impl Strategy {
    pub fn for_classification(classification: RequestClassification) -> Self {
        match classification {
            RequestClassification::Image => Strategy::StaleWhileRevalidate,
            RequestClassification::Api => Strategy::NetworkFirst,
            RequestClassification::StaticAsset => Strategy::CacheFirst,
            RequestClassification::Html => Strategy::NetworkFirstOfflineFallback,
            RequestClassification::Other => Strategy::PassThroughOfflineFallback,
        }
    }

    /// Namespace role the strategy reads from and writes to.
    pub fn role(&self) -> CacheRole {
        match self {
            Strategy::StaleWhileRevalidate => CacheRole::Image,
            Strategy::NetworkFirst => CacheRole::Api,
            Strategy::CacheFirst | Strategy::NetworkFirstOfflineFallback | Strategy::PassThroughOfflineFallback => {
                CacheRole::Static
            }
        }
    }
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServedFrom {
    Network,
    Cache,
    OfflinePage,
    Placeholder,
}

/// A response produced by the engine.
#[derive(Debug, Clone)]
pub struct Served {
    pub response: ResponseSnapshot,
    pub source: ServedFrom,
    pub strategy: Strategy,
    pub classification: RequestClassification,
}

/// Result of handling a request.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// Not eligible; the host should pass the request through untouched.
    Declined,
    Served(Served),
}

impl FetchOutcome {
    pub fn served(&self) -> Option<&Served> {
        match self {
            FetchOutcome::Served(served) => Some(served),
            FetchOutcome::Declined => None,
        }
    }
}

/// Runs the caching strategies against the namespaces it is given.
pub struct StrategyExecutor {
    classifier: Classifier,
    namespaces: Arc<NamespaceManager>,
    fetcher: Arc<dyn Fetcher>,
    probe: Arc<dyn ReachabilityProbe>,
    revalidator: Revalidator,
    offline_page: RequestDescriptor,
}

impl StrategyExecutor {
    /// `offline_page` is the request identity the cached offline page is stored under.
    pub fn new(
        classifier: Classifier, namespaces: Arc<NamespaceManager>, fetcher: Arc<dyn Fetcher>,
        probe: Arc<dyn ReachabilityProbe>, revalidator: Revalidator, offline_page: RequestDescriptor,
    ) -> Self {
        Self { classifier, namespaces, fetcher, probe, revalidator, offline_page }
    }

    /// Serve a request, or decline it if it is not eligible for caching.
    pub async fn handle(&self, request: &RequestDescriptor) -> Result<FetchOutcome, Error> {
        let Some(classification) = self.classifier.route(request) else {
            tracing::debug!(method = %request.method, url = %request.url, "declined request");
            return Ok(FetchOutcome::Declined);
        };

        let strategy = Strategy::for_classification(classification);
        let store = self.namespaces.store(strategy.role());

        let (response, source) = match strategy {
            Strategy::CacheFirst => self.cache_first(&store, request).await?,
            Strategy::NetworkFirst => self.network_first(&store, request).await?,
            Strategy::StaleWhileRevalidate => self.stale_while_revalidate(&store, request).await,
            Strategy::NetworkFirstOfflineFallback => self.network_first_offline(&store, request).await?,
            Strategy::PassThroughOfflineFallback => self.pass_through_offline(&store, request).await?,
        };

        tracing::debug!(
            url = %request.url,
            ?classification,
            ?strategy,
            ?source,
            status = response.status,
            "served request"
        );

        Ok(FetchOutcome::Served(Served { response, source, strategy, classification }))
    }

    async fn cache_first(
        &self, store: &CacheStore, request: &RequestDescriptor,
    ) -> Result<(ResponseSnapshot, ServedFrom), Error> {
        if let Some(cached) = lookup(store, request).await {
            return Ok((cached, ServedFrom::Cache));
        }

        let response = fetch_success(self.fetcher.as_ref(), request)
            .await
            .map_err(|e| Error::asset_failure(request.url.as_str(), &e))?;
        write(store, request, &response).await;
        Ok((response, ServedFrom::Network))
    }

    async fn network_first(
        &self, store: &CacheStore, request: &RequestDescriptor,
    ) -> Result<(ResponseSnapshot, ServedFrom), Error> {
        match fetch_success(self.fetcher.as_ref(), request).await {
            Ok(response) => {
                write(store, request, &response).await;
                Ok((response, ServedFrom::Network))
            }
            Err(err) => match lookup(store, request).await {
                Some(cached) => {
                    tracing::debug!(url = %request.url, error = %err, "network failed, serving cached copy");
                    Ok((cached, ServedFrom::Cache))
                }
                None => Err(err),
            },
        }
    }

    async fn stale_while_revalidate(
        &self, store: &CacheStore, request: &RequestDescriptor,
    ) -> (ResponseSnapshot, ServedFrom) {
        if let Some(cached) = lookup(store, request).await {
            self.revalidator
                .submit(RevalidateJob { store: store.clone(), request: request.clone() });
            return (cached, ServedFrom::Cache);
        }

        match fetch_success(self.fetcher.as_ref(), request).await {
            Ok(response) => {
                write(store, request, &response).await;
                (response, ServedFrom::Network)
            }
            Err(err) => {
                tracing::debug!(url = %request.url, error = %err, "image unavailable, serving placeholder");
                (placeholder_image(), ServedFrom::Placeholder)
            }
        }
    }

    async fn network_first_offline(
        &self, store: &CacheStore, request: &RequestDescriptor,
    ) -> Result<(ResponseSnapshot, ServedFrom), Error> {
        match fetch_success(self.fetcher.as_ref(), request).await {
            Ok(response) => {
                write(store, request, &response).await;
                Ok((response, ServedFrom::Network))
            }
            Err(err) => self.offline_fallback(store, request, err).await,
        }
    }

    async fn pass_through_offline(
        &self, store: &CacheStore, request: &RequestDescriptor,
    ) -> Result<(ResponseSnapshot, ServedFrom), Error> {
        match self.fetcher.fetch(request).await {
            Ok(response) => Ok((response, ServedFrom::Network)),
            Err(err) if request.is_document_like() => self.offline_fallback(store, request, err).await,
            Err(err) => Err(err),
        }
    }

    /// Pick the offline page or a cached copy, else return the fetch error.
    async fn offline_fallback(
        &self, store: &CacheStore, request: &RequestDescriptor, err: Error,
    ) -> Result<(ResponseSnapshot, ServedFrom), Error> {
        match self.probe.probe().await {
            Reachability::Unreachable => {
                tracing::info!(url = %request.url, error = %err, "offline, serving offline page");
                let page = lookup(store, &self.offline_page).await.unwrap_or_else(offline_page);
                Ok((page, ServedFrom::OfflinePage))
            }
            Reachability::Reachable => match lookup(store, request).await {
                Some(cached) => {
                    tracing::debug!(url = %request.url, error = %err, "resource failed while online, serving cached copy");
                    Ok((cached, ServedFrom::Cache))
                }
                None => Err(err),
            },
        }
    }
}

/// Read an entry, treating storage errors as a miss.
async fn lookup(store: &CacheStore, request: &RequestDescriptor) -> Option<ResponseSnapshot> {
    match store.get(request).await {
        Ok(Some(entry)) => {
            tracing::debug!(url = %request.url, namespace = store.name(), "cache hit");
            Some(entry.response)
        }
        Ok(None) => {
            tracing::debug!(url = %request.url, namespace = store.name(), "cache miss");
            None
        }
        Err(e) => {
            tracing::warn!(url = %request.url, namespace = store.name(), error = %e, "cache read failed");
            None
        }
    }
}

/// Store a fresh response; a failed write never replaces the response with an error.
async fn write(store: &CacheStore, request: &RequestDescriptor, response: &ResponseSnapshot) {
    if let Err(e) = store.put(request, response).await {
        tracing::warn!(url = %request.url, namespace = store.name(), error = %e, "cache write failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offline::OFFLINE_PAGE_HTML;
    use crate::testing::{FakeFetcher, FakeProbe};
    use offcache_core::{CacheDb, ClassifierConfig, Destination, RequestMode};
    use std::time::Duration;

    const ORIGIN: &str = "https://app.example";

    struct Harness {
        db: CacheDb,
        executor: StrategyExecutor,
        namespaces: Arc<NamespaceManager>,
        fetcher: Arc<FakeFetcher>,
        probe: Arc<FakeProbe>,
    }

    impl Harness {
        async fn new() -> Self {
            let db = CacheDb::open_in_memory().await.unwrap();
            let namespaces = Arc::new(NamespaceManager::new(db.clone(), "offcache", "v1"));
            let fetcher = Arc::new(FakeFetcher::new());
            let probe = Arc::new(FakeProbe::new(true));
            let revalidator = Revalidator::spawn(fetcher.clone(), 2);
            let executor = StrategyExecutor::new(
                Classifier::from_config(&ClassifierConfig::default()).unwrap(),
                namespaces.clone(),
                fetcher.clone(),
                probe.clone(),
                revalidator,
                RequestDescriptor::get(&format!("{ORIGIN}/offline.html")).unwrap(),
            );
            Self { db, executor, namespaces, fetcher, probe }
        }

        async fn store(&self, role: CacheRole) -> CacheStore {
            self.namespaces.open(role).await.unwrap()
        }

        async fn seed(&self, role: CacheRole, url: &str, body: &'static str) {
            let req = RequestDescriptor::get(url).unwrap();
            self.store(role).await.put(&req, &ResponseSnapshot::ok("text/plain", body)).await.unwrap();
        }

        async fn serve(&self, request: &RequestDescriptor) -> Result<Served, Error> {
            match self.executor.handle(request).await? {
                FetchOutcome::Served(served) => Ok(served),
                FetchOutcome::Declined => panic!("request was declined"),
            }
        }
    }

    fn url(path: &str) -> String {
        format!("{ORIGIN}{path}")
    }

    fn get(path: &str) -> RequestDescriptor {
        RequestDescriptor::get(&url(path)).unwrap()
    }

    fn page(path: &str) -> RequestDescriptor {
        get(path).with_mode(RequestMode::Navigate).with_destination(Destination::Document)
    }

    #[test]
    fn test_every_classification_has_one_strategy() {
        use offcache_core::RequestClassification::*;
        let strategies: Vec<Strategy> =
            [Image, Api, StaticAsset, Html, Other].into_iter().map(Strategy::for_classification).collect();
        let unique: std::collections::HashSet<_> = strategies.iter().collect();
        assert_eq!(unique.len(), 5);
        assert_eq!(Strategy::StaleWhileRevalidate.role(), CacheRole::Image);
        assert_eq!(Strategy::NetworkFirst.role(), CacheRole::Api);
        assert_eq!(Strategy::CacheFirst.role(), CacheRole::Static);
        assert_eq!(Strategy::PassThroughOfflineFallback.role(), CacheRole::Static);
    }

    #[tokio::test]
    async fn test_declines_non_get() {
        let h = Harness::new().await;
        let outcome = h.executor.handle(&get("/api/items").with_method("POST")).await.unwrap();
        assert!(matches!(outcome, FetchOutcome::Declined));
        assert_eq!(h.fetcher.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_cache_first_hit_skips_network() {
        let h = Harness::new().await;
        h.seed(CacheRole::Static, &url("/app.css"), "cached css").await;
        h.fetcher.respond(&url("/app.css"), ResponseSnapshot::ok("text/css", "fresh css"));

        let served = h.serve(&get("/app.css")).await.unwrap();
        assert_eq!(served.strategy, Strategy::CacheFirst);
        assert_eq!(served.source, ServedFrom::Cache);
        assert_eq!(served.response.text(), Some("cached css"));
        assert_eq!(h.fetcher.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_cache_first_miss_fetches_and_stores() {
        let h = Harness::new().await;
        h.fetcher.respond(&url("/app.js"), ResponseSnapshot::ok("text/javascript", "js"));

        let served = h.serve(&get("/app.js")).await.unwrap();
        assert_eq!(served.source, ServedFrom::Network);

        let stored = h.store(CacheRole::Static).await.get(&get("/app.js")).await.unwrap();
        assert_eq!(stored.unwrap().response.text(), Some("js"));
    }

    #[tokio::test]
    async fn test_cache_first_miss_failure_is_asset_failure() {
        let h = Harness::new().await;
        let result = h.serve(&get("/app.js")).await;
        assert!(matches!(result, Err(Error::AssetFetchFailure { .. })));
    }

    #[tokio::test]
    async fn test_cache_first_non_2xx_not_cached() {
        let h = Harness::new().await;
        h.fetcher.respond(&url("/app.js"), ResponseSnapshot::new(500, vec![], "oops"));

        let result = h.serve(&get("/app.js")).await;
        assert!(matches!(result, Err(Error::AssetFetchFailure { .. })));
        assert!(h.store(CacheRole::Static).await.get(&get("/app.js")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_network_first_overwrites_cache() {
        let h = Harness::new().await;
        h.seed(CacheRole::Api, &url("/api/items"), "old").await;
        h.fetcher.respond(&url("/api/items"), ResponseSnapshot::ok("application/json", "new"));

        let served = h.serve(&get("/api/items")).await.unwrap();
        assert_eq!(served.strategy, Strategy::NetworkFirst);
        assert_eq!(served.source, ServedFrom::Network);
        assert_eq!(served.response.text(), Some("new"));

        let stored = h.store(CacheRole::Api).await.get(&get("/api/items")).await.unwrap().unwrap();
        assert_eq!(stored.response.text(), Some("new"));
    }

    #[tokio::test]
    async fn test_network_first_failure_returns_prior_entry_unchanged() {
        let h = Harness::new().await;
        h.seed(CacheRole::Api, &url("/api/items"), "prior").await;
        let before = h.store(CacheRole::Api).await.get(&get("/api/items")).await.unwrap().unwrap();

        let served = h.serve(&get("/api/items")).await.unwrap();
        assert_eq!(served.source, ServedFrom::Cache);
        assert_eq!(served.response, before.response);

        let after = h.store(CacheRole::Api).await.get(&get("/api/items")).await.unwrap().unwrap();
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn test_network_first_failure_without_cache_propagates() {
        let h = Harness::new().await;
        let result = h.serve(&get("/api/items")).await;
        assert!(matches!(result, Err(Error::NetworkUnavailable(_))));
    }

    #[tokio::test]
    async fn test_swr_returns_cached_without_waiting() {
        let h = Harness::new().await;
        h.seed(CacheRole::Image, &url("/images/logo.png"), "cached image").await;
        let gate = h.fetcher.hold(&url("/images/logo.png"));
        h.fetcher.set_offline(true);

        let served = tokio::time::timeout(Duration::from_secs(1), h.serve(&get("/images/logo.png")))
            .await
            .expect("stale-while-revalidate waited on the network")
            .unwrap();
        assert_eq!(served.strategy, Strategy::StaleWhileRevalidate);
        assert_eq!(served.source, ServedFrom::Cache);
        assert_eq!(served.response.text(), Some("cached image"));

        tokio::time::timeout(Duration::from_secs(5), h.fetcher.wait_for_calls(&url("/images/logo.png"), 1))
            .await
            .unwrap();
        gate.notify_one();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(served.response.text(), Some("cached image"));
        let stored = h.store(CacheRole::Image).await.get(&get("/images/logo.png")).await.unwrap().unwrap();
        assert_eq!(stored.response.text(), Some("cached image"));
    }

    #[tokio::test]
    async fn test_swr_background_refresh_updates_cache() {
        let h = Harness::new().await;
        h.seed(CacheRole::Image, &url("/images/logo.png"), "v1").await;
        h.fetcher.respond(&url("/images/logo.png"), ResponseSnapshot::ok("image/png", "v2"));

        let served = h.serve(&get("/images/logo.png")).await.unwrap();
        assert_eq!(served.response.text(), Some("v1"));

        let store = h.store(CacheRole::Image).await;
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let entry = store.get(&get("/images/logo.png")).await.unwrap().unwrap();
                if entry.response.text() == Some("v2") {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_swr_miss_fetches_into_image_store() {
        let h = Harness::new().await;
        h.fetcher.respond(&url("/images/new.png"), ResponseSnapshot::ok("image/png", "png"));

        let served = h.serve(&get("/images/new.png")).await.unwrap();
        assert_eq!(served.source, ServedFrom::Network);
        assert!(h.store(CacheRole::Image).await.get(&get("/images/new.png")).await.unwrap().is_some());
        assert!(h.store(CacheRole::Static).await.get(&get("/images/new.png")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_swr_miss_failure_returns_placeholder() {
        let h = Harness::new().await;
        let served = h.serve(&get("/images/missing.png")).await.unwrap();
        assert_eq!(served.source, ServedFrom::Placeholder);
        assert!(served.response.body.is_empty());
        assert_eq!(served.response.content_type(), Some("image/svg+xml"));
    }

    #[tokio::test]
    async fn test_html_success_is_cached() {
        let h = Harness::new().await;
        h.fetcher.respond(&url("/about"), ResponseSnapshot::ok("text/html", "<p>about</p>"));

        let served = h.serve(&page("/about")).await.unwrap();
        assert_eq!(served.strategy, Strategy::NetworkFirstOfflineFallback);
        assert_eq!(served.source, ServedFrom::Network);
        assert!(h.store(CacheRole::Static).await.get(&page("/about")).await.unwrap().is_some());
        assert_eq!(h.probe.probes(), 0);
    }

    #[tokio::test]
    async fn test_html_offline_serves_cached_offline_page() {
        let h = Harness::new().await;
        h.seed(CacheRole::Static, &url("/offline.html"), "cached offline page").await;
        h.seed(CacheRole::Static, &url("/about"), "cached about").await;
        h.probe.set_reachable(false);

        let served = h.serve(&page("/about")).await.unwrap();
        assert_eq!(served.source, ServedFrom::OfflinePage);
        assert_eq!(served.response.text(), Some("cached offline page"));
        assert_eq!(h.probe.probes(), 1);
    }

    #[tokio::test]
    async fn test_html_offline_without_cached_page_synthesizes_one() {
        let h = Harness::new().await;
        h.probe.set_reachable(false);

        let served = h.serve(&page("/about")).await.unwrap();
        assert_eq!(served.source, ServedFrom::OfflinePage);
        assert_eq!(served.response.text(), Some(OFFLINE_PAGE_HTML));
        assert_eq!(served.response.content_type(), Some("text/html; charset=utf-8"));
    }

    #[tokio::test]
    async fn test_html_reachable_prefers_cached_copy() {
        let h = Harness::new().await;
        h.seed(CacheRole::Static, &url("/offline.html"), "cached offline page").await;
        h.seed(CacheRole::Static, &url("/about"), "cached about").await;
        h.fetcher.respond(&url("/about"), ResponseSnapshot::new(503, vec![], "unavailable"));

        let served = h.serve(&page("/about")).await.unwrap();
        assert_eq!(served.source, ServedFrom::Cache);
        assert_eq!(served.response.text(), Some("cached about"));
    }

    #[tokio::test]
    async fn test_html_reachable_without_copy_propagates() {
        let h = Harness::new().await;
        h.fetcher.respond(&url("/about"), ResponseSnapshot::new(503, vec![], "unavailable"));

        let result = h.serve(&page("/about")).await;
        assert!(matches!(result, Err(Error::HttpStatus { status: 503, .. })));
    }

    #[tokio::test]
    async fn test_other_passes_through_without_caching() {
        let h = Harness::new().await;
        h.fetcher.respond(&url("/download/report.pdf"), ResponseSnapshot::new(404, vec![], "missing"));

        let served = h.serve(&get("/download/report.pdf")).await.unwrap();
        assert_eq!(served.strategy, Strategy::PassThroughOfflineFallback);
        assert_eq!(served.source, ServedFrom::Network);
        assert_eq!(served.response.status, 404);
        assert!(h.store(CacheRole::Static).await.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_other_document_failure_uses_offline_page() {
        let h = Harness::new().await;
        h.probe.set_reachable(false);
        let req = get("/download/report").with_mode(RequestMode::Navigate);

        let served = h.serve(&req).await.unwrap();
        assert_eq!(served.strategy, Strategy::PassThroughOfflineFallback);
        assert_eq!(served.source, ServedFrom::OfflinePage);
    }

    #[tokio::test]
    async fn test_other_non_document_failure_propagates() {
        let h = Harness::new().await;
        h.probe.set_reachable(false);

        let result = h.serve(&get("/download/report.pdf")).await;
        assert!(matches!(result, Err(Error::NetworkUnavailable(_))));
        assert_eq!(h.probe.probes(), 0);
    }

    #[tokio::test]
    async fn test_other_document_failure_online_serves_cached_copy() {
        let h = Harness::new().await;
        h.seed(CacheRole::Static, &url("/download/report"), "cached report").await;

        let served = h.serve(&get("/download/report").with_mode(RequestMode::Navigate)).await.unwrap();
        assert_eq!(served.strategy, Strategy::PassThroughOfflineFallback);
        assert_eq!(served.source, ServedFrom::Cache);
        assert_eq!(served.response.text(), Some("cached report"));
        assert_eq!(h.probe.probes(), 1);
    }

    #[tokio::test]
    async fn test_storage_failure_still_reaches_network() {
        let h = Harness::new().await;
        h.fetcher.respond(&url("/download/report.pdf"), ResponseSnapshot::ok("application/pdf", "pdf"));
        h.fetcher.respond(&url("/api/items"), ResponseSnapshot::ok("application/json", "[]"));
        h.db.clone().close().await.unwrap();

        let other = h.serve(&get("/download/report.pdf")).await.unwrap();
        assert_eq!(other.source, ServedFrom::Network);
        assert_eq!(other.response.text(), Some("pdf"));

        let api = h.serve(&get("/api/items")).await.unwrap();
        assert_eq!(api.source, ServedFrom::Network);
        assert_eq!(api.response.text(), Some("[]"));
        assert_eq!(h.fetcher.total_calls(), 2);
    }

    #[tokio::test]
    async fn test_failed_write_returns_network_response() {
        let h = Harness::new().await;
        h.fetcher.respond(&url("/app.css"), ResponseSnapshot::ok("text/css", "body {}"));
        h.db.clone().close().await.unwrap();

        let served = h.serve(&get("/app.css")).await.unwrap();
        assert_eq!(served.strategy, Strategy::CacheFirst);
        assert_eq!(served.source, ServedFrom::Network);
        assert_eq!(served.response.text(), Some("body {}"));
    }
}
