//! Background revalidation worker.
//!
//! Stale-while-revalidate hands refresh jobs to this worker and returns
//! immediately. Jobs run on their own tasks, bounded by a semaphore; a failed
//! refresh is logged and dropped, never retried and never reported back.
//! An entry with a refresh already queued or running is not queued again.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Semaphore, mpsc};

use offcache_core::{CacheStore, Error, RequestDescriptor};

use crate::fetch::{Fetcher, fetch_success};

/// A refresh of one entry.
#[derive(Debug, Clone)]
pub struct RevalidateJob {
    pub store: CacheStore,
    pub request: RequestDescriptor,
}

impl RevalidateJob {
    fn key(&self) -> String {
        format!("{}\n{} {}", self.store.name(), self.request.method, self.request.url)
    }
}

type Pending = Arc<Mutex<HashSet<String>>>;

/// Submission handle for the worker. Cloning shares the same worker.
#[derive(Clone)]
pub struct Revalidator {
    tx: mpsc::UnboundedSender<RevalidateJob>,
    pending: Pending,
}

impl Revalidator {
    /// Start the worker on the current tokio runtime.
    ///
    /// The worker stops once every handle has been dropped and the queue is drained.
    pub fn spawn(fetcher: Arc<dyn Fetcher>, concurrency: usize) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<RevalidateJob>();
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let pending: Pending = Arc::default();

        let worker_pending = pending.clone();
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let Ok(permit) = semaphore.clone().acquire_owned().await else {
                    break;
                };
                let fetcher = fetcher.clone();
                let pending = worker_pending.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    if let Err(e) = run(fetcher.as_ref(), &job).await {
                        tracing::debug!(url = %job.request.url, error = %e, "background revalidation failed");
                    }
                    release(&pending, &job.key());
                });
            }
            tracing::debug!("revalidation worker stopped");
        });

        Self { tx, pending }
    }

    /// Queue a refresh. Never blocks and never fails the caller.
    ///
    /// Returns false when the job was dropped, either because the same entry
    /// is already pending or because the worker is gone.
    pub fn submit(&self, job: RevalidateJob) -> bool {
        let key = job.key();
        if !self.pending.lock().unwrap_or_else(PoisonError::into_inner).insert(key.clone()) {
            tracing::debug!(url = %job.request.url, "revalidation already pending");
            return false;
        }

        if let Err(e) = self.tx.send(job) {
            release(&self.pending, &key);
            tracing::debug!(url = %e.0.request.url, "revalidation worker gone; dropping job");
            return false;
        }
        true
    }
}

fn release(pending: &Pending, key: &str) {
    pending.lock().unwrap_or_else(PoisonError::into_inner).remove(key);
}

async fn run(fetcher: &dyn Fetcher, job: &RevalidateJob) -> Result<(), Error> {
    let response = fetch_success(fetcher, &job.request).await?;
    job.store.put(&job.request, &response).await?;
    tracing::debug!(url = %job.request.url, namespace = job.store.name(), "revalidated cache entry");
    Ok(())
}
