//! In-memory fakes for the network seams.
//!
//! Enabled for other crates with the `test-util` feature.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::Notify;

use offcache_core::{Error, RequestDescriptor, ResponseSnapshot};

use crate::fetch::Fetcher;
use crate::probe::{Reachability, ReachabilityProbe};

/// Scripted fetcher: canned responses per URL, everything else fails.
#[derive(Default)]
pub struct FakeFetcher {
    responses: Mutex<HashMap<String, ResponseSnapshot>>,
    holds: Mutex<HashMap<String, Arc<Notify>>>,
    calls: Mutex<HashMap<String, usize>>,
    total: AtomicUsize,
    offline: AtomicBool,
    called: Notify,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, response: ResponseSnapshot) {
        self.responses.lock().unwrap_or_else(PoisonError::into_inner).insert(url.to_string(), response);
    }

    pub fn forget(&self, url: &str) {
        self.responses.lock().unwrap_or_else(PoisonError::into_inner).remove(url);
    }

    /// Make every fetch fail with a transport error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Park fetches of `url` until the returned notify fires.
    pub fn hold(&self, url: &str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.holds.lock().unwrap_or_else(PoisonError::into_inner).insert(url.to_string(), notify.clone());
        notify
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    /// Wait until at least `n` fetches of `url` have started.
    pub async fn wait_for_calls(&self, url: &str, n: usize) {
        loop {
            let notified = self.called.notified();
            if self.calls(url) >= n {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, request: &RequestDescriptor) -> Result<ResponseSnapshot, Error> {
        let url = request.url.to_string();
        *self.calls.lock().unwrap_or_else(PoisonError::into_inner).entry(url.clone()).or_default() += 1;
        self.total.fetch_add(1, Ordering::SeqCst);
        self.called.notify_waiters();

        let hold = self.holds.lock().unwrap_or_else(PoisonError::into_inner).get(&url).cloned();
        if let Some(hold) = hold {
            hold.notified().await;
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::NetworkUnavailable(format!("offline: {url}")));
        }

        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&url)
            .cloned()
            .ok_or_else(|| Error::NetworkUnavailable(format!("no route to {url}")))
    }
}

/// Probe with a switchable answer.
pub struct FakeProbe {
    reachable: AtomicBool,
    probes: AtomicUsize,
}

impl FakeProbe {
    pub fn new(reachable: bool) -> Self {
        Self { reachable: AtomicBool::new(reachable), probes: AtomicUsize::new(0) }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReachabilityProbe for FakeProbe {
    async fn probe(&self) -> Reachability {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if self.reachable.load(Ordering::SeqCst) { Reachability::Reachable } else { Reachability::Unreachable }
    }
}
