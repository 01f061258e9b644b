//! Command channel.
//!
//! Commands arrive as JSON objects tagged by `type`:
//!
//! ```json
//! {"type": "SKIP_WAITING"}
//! {"type": "CLEAR_CACHE"}
//! {"type": "PRELOAD_IMAGES", "urls": ["/images/a.png"]}
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use url::Url;

use offcache_core::url::{is_http, resolve};
use offcache_core::{CacheRole, Error, NamespaceManager, RequestDescriptor};

use crate::fetch::{Fetcher, fetch_success};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    SkipWaiting,
    ClearCache,
    PreloadImages { urls: Vec<String> },
}

impl Command {
    /// Parse a command object.
    pub fn from_value(value: serde_json::Value) -> Result<Self, Error> {
        serde_json::from_value(value).map_err(|e| Error::InvalidInput(format!("unrecognized command: {e}")))
    }
}

/// Per-URL result of a preload batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreloadReport {
    pub stored: Vec<String>,
    pub failed: Vec<PreloadFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreloadFailure {
    pub url: String,
    pub error: String,
}

/// Acknowledgement returned for each command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandAck {
    SkipWaiting,
    ClearCache { deleted: u64 },
    PreloadImages(PreloadReport),
}

/// Executes commands against the namespaces.
pub struct CommandHandler {
    namespaces: Arc<NamespaceManager>,
    fetcher: Arc<dyn Fetcher>,
    origin: Url,
    concurrency: usize,
}

impl CommandHandler {
    pub fn new(namespaces: Arc<NamespaceManager>, fetcher: Arc<dyn Fetcher>, origin: Url, concurrency: usize) -> Self {
        Self { namespaces, fetcher, origin, concurrency: concurrency.max(1) }
    }

    pub async fn handle(&self, command: Command) -> Result<CommandAck, Error> {
        match command {
            Command::SkipWaiting => {
                tracing::info!("skip waiting requested");
                Ok(CommandAck::SkipWaiting)
            }
            Command::ClearCache => {
                let deleted = self.namespaces.clear_all().await?;
                Ok(CommandAck::ClearCache { deleted })
            }
            Command::PreloadImages { urls } => self.preload_images(urls).await.map(CommandAck::PreloadImages),
        }
    }

    /// Fetch each URL into the image namespace. A failing URL never aborts the batch.
    pub async fn preload_images(&self, urls: Vec<String>) -> Result<PreloadReport, Error> {
        let store = self.namespaces.open(CacheRole::Image).await?;
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut join_set = JoinSet::new();
        let mut report = PreloadReport::default();

        for raw in urls {
            let request = match self.image_request(&raw) {
                Ok(request) => request,
                Err(e) => {
                    report.failed.push(PreloadFailure { url: raw, error: e.to_string() });
                    continue;
                }
            };

            let fetcher = self.fetcher.clone();
            let store = store.clone();
            let semaphore = semaphore.clone();
            join_set.spawn(async move {
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => match fetch_success(fetcher.as_ref(), &request).await {
                        Ok(response) => store.put(&request, &response).await,
                        Err(e) => Err(e),
                    },
                    Err(e) => Err(Error::InvalidInput(format!("preload semaphore closed: {e}"))),
                };
                (raw, outcome)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((url, Ok(()))) => report.stored.push(url),
                Ok((url, Err(e))) => {
                    tracing::debug!(url = %url, error = %e, "preload failed");
                    report.failed.push(PreloadFailure { url, error: e.to_string() });
                }
                Err(e) => tracing::warn!(error = %e, "preload task panicked"),
            }
        }

        report.stored.sort();
        report.failed.sort_by(|a, b| a.url.cmp(&b.url));
        tracing::info!(stored = report.stored.len(), failed = report.failed.len(), "preloaded images");
        Ok(report)
    }

    fn image_request(&self, raw: &str) -> Result<RequestDescriptor, Error> {
        let url = resolve(raw, Some(&self.origin))?;
        if !is_http(&url) {
            return Err(Error::InvalidUrl(format!("{raw} is not http(s)")));
        }
        Ok(RequestDescriptor::from_url(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeFetcher;
    use offcache_core::{CacheDb, ResponseSnapshot};
    use serde_json::json;

    const ORIGIN: &str = "https://app.example";

    async fn handler(fetcher: Arc<FakeFetcher>) -> (CommandHandler, Arc<NamespaceManager>) {
        let db = CacheDb::open_in_memory().await.unwrap();
        let namespaces = Arc::new(NamespaceManager::new(db, "offcache", "v1"));
        let handler = CommandHandler::new(namespaces.clone(), fetcher, Url::parse(ORIGIN).unwrap(), 2);
        (handler, namespaces)
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::from_value(json!({"type": "SKIP_WAITING"})).unwrap(), Command::SkipWaiting);
        assert_eq!(Command::from_value(json!({"type": "CLEAR_CACHE"})).unwrap(), Command::ClearCache);
        assert_eq!(
            Command::from_value(json!({"type": "PRELOAD_IMAGES", "urls": ["/a.png"]})).unwrap(),
            Command::PreloadImages { urls: vec!["/a.png".into()] }
        );
    }

    #[test]
    fn test_parse_rejects_unknown_type() {
        let err = Command::from_value(json!({"type": "REBOOT"})).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_ack_serializes_tagged() {
        let ack = serde_json::to_value(CommandAck::ClearCache { deleted: 3 }).unwrap();
        assert_eq!(ack, json!({"type": "CLEAR_CACHE", "deleted": 3}));
    }

    #[tokio::test]
    async fn test_skip_waiting_acknowledges() {
        let (handler, namespaces) = handler(Arc::new(FakeFetcher::new())).await;
        namespaces.open(CacheRole::Static).await.unwrap();

        assert_eq!(handler.handle(Command::SkipWaiting).await.unwrap(), CommandAck::SkipWaiting);
        assert_eq!(namespaces.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_clear_cache_twice() {
        let (handler, namespaces) = handler(Arc::new(FakeFetcher::new())).await;
        for role in CacheRole::ALL {
            namespaces.open(role).await.unwrap();
        }

        let first = handler.handle(Command::ClearCache).await.unwrap();
        assert_eq!(first, CommandAck::ClearCache { deleted: 3 });
        assert!(namespaces.list().await.unwrap().is_empty());

        let second = handler.handle(Command::ClearCache).await.unwrap();
        assert_eq!(second, CommandAck::ClearCache { deleted: 0 });
        assert!(namespaces.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_preload_partial_failure_stores_the_rest() {
        let fetcher = Arc::new(FakeFetcher::new());
        fetcher.respond("https://app.example/images/a.png", ResponseSnapshot::ok("image/png", "a"));
        fetcher.respond("https://app.example/images/c.png", ResponseSnapshot::ok("image/png", "c"));
        let (handler, namespaces) = handler(fetcher).await;

        let urls = vec!["/images/a.png".to_string(), "/images/b.png".to_string(), "/images/c.png".to_string()];
        let report = handler.preload_images(urls).await.unwrap();

        assert_eq!(report.stored, vec!["/images/a.png", "/images/c.png"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].url, "/images/b.png");

        let keys = namespaces.open(CacheRole::Image).await.unwrap().keys().await.unwrap();
        assert_eq!(keys, vec!["https://app.example/images/a.png", "https://app.example/images/c.png"]);
    }

    #[tokio::test]
    async fn test_preload_invalid_url_reported() {
        let (handler, _) = handler(Arc::new(FakeFetcher::new())).await;
        let report = handler.preload_images(vec!["ftp://example.com/a.png".to_string()]).await.unwrap();
        assert!(report.stored.is_empty());
        assert_eq!(report.failed.len(), 1);
    }
}
