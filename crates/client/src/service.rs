//! Wiring of the engine from configuration.

use std::sync::Arc;

use url::Url;

use offcache_core::url::resolve;
use offcache_core::{AppConfig, CacheDb, Classifier, Error, NamespaceManager, RequestDescriptor};

use crate::command::{Command, CommandAck, CommandHandler};
use crate::fetch::{FetchClient, FetchConfig, Fetcher};
use crate::lifecycle::Lifecycle;
use crate::probe::{HttpProbe, ReachabilityProbe};
use crate::revalidate::Revalidator;
use crate::strategy::{FetchOutcome, StrategyExecutor};

/// The offline engine: strategies, lifecycle and command channel over one
/// set of namespaces.
pub struct OfflineService {
    namespaces: Arc<NamespaceManager>,
    executor: StrategyExecutor,
    lifecycle: Lifecycle,
    commands: CommandHandler,
    origin: Url,
}

impl OfflineService {
    /// Build the service with the reqwest fetcher and HTTP probe.
    ///
    /// Must be called inside a tokio runtime; the revalidation worker is
    /// spawned here.
    pub fn from_config(config: &AppConfig, db: CacheDb) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidInput(e.to_string()))?;
        let fetcher: Arc<dyn Fetcher> = Arc::new(FetchClient::new(FetchConfig::from(config))?);
        let probe: Arc<dyn ReachabilityProbe> = Arc::new(HttpProbe::new(
            &origin,
            &config.probe_path,
            config.probe_timeout(),
            &config.user_agent,
        )?);
        Self::with_network(config, db, fetcher, probe)
    }

    /// Build the service over caller-supplied network seams.
    pub fn with_network(
        config: &AppConfig, db: CacheDb, fetcher: Arc<dyn Fetcher>, probe: Arc<dyn ReachabilityProbe>,
    ) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidInput(e.to_string()))?;
        let classifier = Classifier::from_config(&config.classifier)
            .map_err(|e| Error::InvalidInput(format!("invalid classifier pattern: {e}")))?;
        let namespaces = Arc::new(NamespaceManager::new(db, &config.cache_prefix, &config.cache_version));
        let manifest = config.asset_manifest().requests(&origin)?;
        let offline_page = RequestDescriptor::from_url(resolve(&config.offline_page, Some(&origin))?);

        let revalidator = Revalidator::spawn(fetcher.clone(), config.revalidate_concurrency);
        let executor = StrategyExecutor::new(
            classifier,
            namespaces.clone(),
            fetcher.clone(),
            probe,
            revalidator,
            offline_page,
        );
        let lifecycle = Lifecycle::new(namespaces.clone(), fetcher.clone(), manifest, config.preload_concurrency);
        let commands = CommandHandler::new(namespaces.clone(), fetcher, origin.clone(), config.preload_concurrency);

        Ok(Self { namespaces, executor, lifecycle, commands, origin })
    }

    pub fn namespaces(&self) -> &Arc<NamespaceManager> {
        &self.namespaces
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Install then activate; the service is ready once this returns.
    pub async fn start(&self) -> Result<(), Error> {
        self.lifecycle.install().await?;
        self.lifecycle.activate().await?;
        Ok(())
    }

    pub async fn fetch(&self, request: &RequestDescriptor) -> Result<FetchOutcome, Error> {
        self.executor.handle(request).await
    }

    pub async fn post_message(&self, command: Command) -> Result<CommandAck, Error> {
        self.commands.handle(command).await
    }
}
