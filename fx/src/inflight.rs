//! At-most-one in-flight upstream fetch per key.
//!
//! The first requester for a key spawns the fetch as a detached task and
//! registers a shared handle to it; concurrent requesters for the same key
//! await that handle instead of fetching again. The task is not tied to any
//! requester, so a caller dropping its future does not cancel the fetch for
//! the others.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use moneta_common::ExchangeRate;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{FxError, FxResult};

type SharedFetch = Shared<BoxFuture<'static, FxResult<ExchangeRate>>>;

/// Registry of fetches currently running, keyed by `K`.
pub struct InFlight<K> {
    pending: Mutex<HashMap<K, SharedFetch>>,
    started: AtomicU64,
    joined: AtomicU64,
}

impl<K> InFlight<K>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
{
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            started: AtomicU64::new(0),
            joined: AtomicU64::new(0),
        }
    }

    /// Run `fetch` for `key` unless one is already running, in which case
    /// wait for that one.
    ///
    /// `recheck` is consulted under the registry lock before starting a new
    /// fetch. A completed fetch writes its result where `recheck` can see it
    /// before it deregisters, so a caller that raced past its own cache check
    /// still observes the result instead of fetching twice.
    pub async fn run<R, F, Fut>(self: &Arc<Self>, key: K, recheck: R, fetch: F) -> FxResult<ExchangeRate>
    where
        R: FnOnce() -> Option<ExchangeRate>,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = FxResult<ExchangeRate>> + Send + 'static,
    {
        let shared = {
            let mut pending = self.pending.lock();

            if let Some(existing) = pending.get(&key) {
                self.joined.fetch_add(1, Ordering::Relaxed);
                debug!(key = ?key, "Joining in-flight fetch");
                existing.clone()
            } else if let Some(rate) = recheck() {
                return Ok(rate);
            } else {
                self.started.fetch_add(1, Ordering::Relaxed);
                debug!(key = ?key, "Starting upstream fetch");

                let deregister = Deregister {
                    registry: Arc::clone(self),
                    key: key.clone(),
                };
                let fut = fetch();
                let handle = tokio::spawn(async move {
                    let _deregister = deregister;
                    fut.await
                });

                let shared = async move {
                    handle.await.unwrap_or_else(|e| {
                        Err(FxError::ProviderError(format!("fetch task failed: {}", e)))
                    })
                }
                .boxed()
                .shared();

                pending.insert(key, shared.clone());
                shared
            }
        };

        shared.await
    }

    /// Number of fetches currently running.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Check if nothing is running.
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Fetches started since creation.
    pub fn started(&self) -> u64 {
        self.started.load(Ordering::Relaxed)
    }

    /// Requests that joined an existing fetch.
    pub fn joined(&self) -> u64 {
        self.joined.load(Ordering::Relaxed)
    }
}

/// Removes a key from the registry when the fetch task finishes, including
/// when the fetch panics and the task unwinds.
struct Deregister<K>
where
    K: Hash + Eq,
{
    registry: Arc<InFlight<K>>,
    key: K,
}

impl<K> Drop for Deregister<K>
where
    K: Hash + Eq,
{
    fn drop(&mut self) {
        self.registry.pending.lock().remove(&self.key);
    }
}

impl<K> Default for InFlight<K>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
