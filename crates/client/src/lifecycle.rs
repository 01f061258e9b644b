//! Install, activate and background refresh.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use offcache_core::{CacheRole, Error, NamespaceManager, RequestDescriptor, ResponseSnapshot};

use crate::fetch::{Fetcher, fetch_success};

/// Tag that triggers a manifest refresh on background sync.
pub const BACKGROUND_SYNC_TAG: &str = "background-sync";

/// Summary of an install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub namespace: String,
    pub stored: usize,
}

/// Summary of an activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivateReport {
    pub deleted: Vec<String>,
    pub active: Vec<String>,
}

/// Outcome of a manifest refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    pub refreshed: Vec<String>,
    pub failed: Vec<String>,
}

/// Owns the manifest and the startup sequence.
pub struct Lifecycle {
    namespaces: Arc<NamespaceManager>,
    fetcher: Arc<dyn Fetcher>,
    manifest: Vec<RequestDescriptor>,
    concurrency: usize,
}

impl Lifecycle {
    /// `manifest` is the already resolved asset list, in manifest order.
    pub fn new(
        namespaces: Arc<NamespaceManager>, fetcher: Arc<dyn Fetcher>, manifest: Vec<RequestDescriptor>,
        concurrency: usize,
    ) -> Self {
        Self { namespaces, fetcher, manifest, concurrency: concurrency.max(1) }
    }

    pub fn manifest(&self) -> &[RequestDescriptor] {
        &self.manifest
    }

    /// Warm the static namespace with the whole manifest.
    ///
    /// Either every entry is fetched and written in one transaction, or the
    /// install fails with [`Error::AssetFetchFailure`] and nothing is written.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        let store = self.namespaces.open(CacheRole::Static).await?;
        tracing::info!(namespace = store.name(), assets = self.manifest.len(), "installing asset manifest");

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut join_set = JoinSet::new();

        for (index, request) in self.manifest.iter().cloned().enumerate() {
            let fetcher = self.fetcher.clone();
            let semaphore = semaphore.clone();
            join_set.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| Error::InvalidInput(format!("install semaphore closed: {e}")))?;
                let response = fetch_success(fetcher.as_ref(), &request)
                    .await
                    .map_err(|e| Error::asset_failure(request.url.as_str(), &e))?;
                Ok::<_, Error>((index, request, response))
            });
        }

        let mut fetched: Vec<(usize, RequestDescriptor, ResponseSnapshot)> = Vec::with_capacity(self.manifest.len());
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Ok(item)) => fetched.push(item),
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "install aborted");
                    join_set.abort_all();
                    return Err(e);
                }
                Err(e) => {
                    join_set.abort_all();
                    return Err(Error::InvalidInput(format!("install task failed: {e}")));
                }
            }
        }

        fetched.sort_by_key(|(index, _, _)| *index);
        let batch = fetched.into_iter().map(|(_, request, response)| (request, response)).collect();
        let stored = store.put_all(batch).await?;

        tracing::info!(namespace = store.name(), stored, "install complete");
        Ok(InstallReport { namespace: store.name().to_string(), stored })
    }

    /// Create the current namespace of every role and drop every other one.
    ///
    /// Must finish before the first request is served.
    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        for role in CacheRole::ALL {
            self.namespaces.open(role).await?;
        }
        let deleted = self.namespaces.reconcile(&CacheRole::ALL).await?;
        let active = self.namespaces.list().await?;
        tracing::info!(deleted = deleted.len(), active = ?active, "activated");
        Ok(ActivateReport { deleted, active })
    }

    /// Re-fetch every manifest entry, one at a time, overwriting the static copy.
    ///
    /// Failures are logged and skipped.
    pub async fn refresh(&self) -> Result<RefreshReport, Error> {
        let store = self.namespaces.open(CacheRole::Static).await?;
        let mut report = RefreshReport::default();

        for request in &self.manifest {
            let result = match fetch_success(self.fetcher.as_ref(), request).await {
                Ok(response) => store.put(request, &response).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => report.refreshed.push(request.url.to_string()),
                Err(e) => {
                    tracing::warn!(url = %request.url, error = %e, "refresh failed");
                    report.failed.push(request.url.to_string());
                }
            }
        }

        tracing::info!(refreshed = report.refreshed.len(), failed = report.failed.len(), "manifest refreshed");
        Ok(report)
    }

    /// Run a refresh when `tag` is the background sync tag; `None` otherwise.
    pub async fn on_background_sync(&self, tag: &str) -> Result<Option<RefreshReport>, Error> {
        if tag != BACKGROUND_SYNC_TAG {
            tracing::debug!(tag, "ignoring background sync");
            return Ok(None);
        }
        self.refresh().await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeFetcher;
    use offcache_core::CacheDb;

    const ORIGIN: &str = "https://app.example";

    fn url(path: &str) -> String {
        format!("{ORIGIN}{path}")
    }

    fn manifest() -> Vec<RequestDescriptor> {
        ["/", "/index.html", "/offline.html"]
            .iter()
            .map(|p| RequestDescriptor::get(&url(p)).unwrap())
            .collect()
    }

    fn serve_manifest(fetcher: &FakeFetcher, body: &'static str) {
        for path in ["/", "/index.html", "/offline.html"] {
            fetcher.respond(&url(path), ResponseSnapshot::ok("text/html", body));
        }
    }

    async fn lifecycle(db: CacheDb, version: &str, fetcher: Arc<FakeFetcher>) -> (Lifecycle, Arc<NamespaceManager>) {
        let namespaces = Arc::new(NamespaceManager::new(db, "offcache", version));
        (Lifecycle::new(namespaces.clone(), fetcher, manifest(), 2), namespaces)
    }

    #[tokio::test]
    async fn test_install_stores_whole_manifest() {
        let fetcher = Arc::new(FakeFetcher::new());
        serve_manifest(&fetcher, "v1");
        let (lifecycle, namespaces) = lifecycle(CacheDb::open_in_memory().await.unwrap(), "v1", fetcher).await;

        let report = lifecycle.install().await.unwrap();
        assert_eq!(report.stored, 3);
        assert_eq!(report.namespace, "offcache-static-v1");

        let keys = namespaces.open(CacheRole::Static).await.unwrap().keys().await.unwrap();
        assert_eq!(keys.len(), 3);
    }

    #[tokio::test]
    async fn test_install_failure_writes_nothing() {
        let fetcher = Arc::new(FakeFetcher::new());
        serve_manifest(&fetcher, "v1");
        fetcher.forget(&url("/offline.html"));
        let (lifecycle, namespaces) = lifecycle(CacheDb::open_in_memory().await.unwrap(), "v1", fetcher).await;

        let result = lifecycle.install().await;
        assert!(matches!(result, Err(Error::AssetFetchFailure { .. })));

        let keys = namespaces.open(CacheRole::Static).await.unwrap().keys().await.unwrap();
        assert!(keys.is_empty());
    }

    #[tokio::test]
    async fn test_version_bump_activation_leaves_one_namespace_per_role() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let fetcher = Arc::new(FakeFetcher::new());

        let old = NamespaceManager::new(db.clone(), "offcache", "v1");
        for role in CacheRole::ALL {
            old.open(role).await.unwrap();
        }

        let (lifecycle, namespaces) = lifecycle(db, "v2", fetcher).await;
        let report = lifecycle.activate().await.unwrap();

        assert_eq!(report.deleted.len(), 3);
        assert!(report.deleted.iter().all(|n| n.ends_with("-v1")));
        assert_eq!(
            namespaces.list().await.unwrap(),
            vec!["offcache-api-v2", "offcache-image-v2", "offcache-static-v2"]
        );
    }

    #[tokio::test]
    async fn test_refresh_overwrites_and_skips_failures() {
        let fetcher = Arc::new(FakeFetcher::new());
        serve_manifest(&fetcher, "v1");
        let (lifecycle, namespaces) =
            lifecycle(CacheDb::open_in_memory().await.unwrap(), "v1", fetcher.clone()).await;
        lifecycle.install().await.unwrap();

        serve_manifest(&fetcher, "v2");
        fetcher.forget(&url("/offline.html"));

        let report = lifecycle.refresh().await.unwrap();
        assert_eq!(report.refreshed, vec![url("/"), url("/index.html")]);
        assert_eq!(report.failed, vec![url("/offline.html")]);

        let store = namespaces.open(CacheRole::Static).await.unwrap();
        let index = store.get(&RequestDescriptor::get(&url("/index.html")).unwrap()).await.unwrap().unwrap();
        assert_eq!(index.response.text(), Some("v2"));
        let offline = store.get(&RequestDescriptor::get(&url("/offline.html")).unwrap()).await.unwrap().unwrap();
        assert_eq!(offline.response.text(), Some("v1"));
    }

    #[tokio::test]
    async fn test_background_sync_only_for_known_tag() {
        let fetcher = Arc::new(FakeFetcher::new());
        serve_manifest(&fetcher, "v1");
        let (lifecycle, _) = lifecycle(CacheDb::open_in_memory().await.unwrap(), "v1", fetcher.clone()).await;

        assert!(lifecycle.on_background_sync("other-tag").await.unwrap().is_none());
        assert_eq!(fetcher.total_calls(), 0);

        let report = lifecycle.on_background_sync(BACKGROUND_SYNC_TAG).await.unwrap().unwrap();
        assert_eq!(report.refreshed.len(), 3);
        assert!(report.failed.is_empty());
    }
}
