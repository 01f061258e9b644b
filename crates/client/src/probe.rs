//! Reachability probe.
//!
//! Tells "this resource failed" apart from "there is no network". The probe
//! requests a small same-origin resource with caching disabled; any answer at
//! all, including a 404 or 500, means the network is there.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, header};
use serde::Serialize;
use url::Url;

use offcache_core::Error;

/// Outcome of a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Reachability {
    Reachable,
    Unreachable,
}

/// Connectivity check used on the offline-fallback path.
///
/// Implementations hold no state between calls; every decision probes fresh.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn probe(&self) -> Reachability;
}

/// Probe that issues a no-cache GET against the origin.
pub struct HttpProbe {
    http: Client,
    target: Url,
}

impl HttpProbe {
    /// Build a probe for `{origin}{path}` with its own short timeout.
    pub fn new(origin: &Url, path: &str, timeout: Duration, user_agent: &str) -> Result<Self, Error> {
        let target = origin
            .join(path)
            .map_err(|e| Error::InvalidUrl(format!("probe target {path}: {e}")))?;
        let http = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .use_rustls_tls()
            .build()
            .map_err(|e| Error::NetworkUnavailable(format!("failed to build probe client: {}", e)))?;
        Ok(Self { http, target })
    }

    pub fn target(&self) -> &Url {
        &self.target
    }
}

#[async_trait]
impl ReachabilityProbe for HttpProbe {
    async fn probe(&self) -> Reachability {
        let result = self
            .http
            .get(self.target.as_str())
            .header(header::CACHE_CONTROL, "no-cache")
            .header(header::PRAGMA, "no-cache")
            .send()
            .await;

        match result {
            Ok(response) => {
                tracing::debug!(probe_url = %self.target, status = response.status().as_u16(), "probe reachable");
                Reachability::Reachable
            }
            Err(e) => {
                tracing::debug!(probe_url = %self.target, error = %e, "probe unreachable");
                Reachability::Unreachable
            }
        }
    }
}
