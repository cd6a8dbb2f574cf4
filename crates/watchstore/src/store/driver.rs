//! # Backend Driver
//!
//! One async interface over two interchangeable physical stores: the
//! quota-constrained remote store and the unconstrained local store.
//!
//! ## Routing
//!
//! The remote store is probed once in [`Driver::connect`]. If the probe fails
//! every operation goes to the local store for the lifetime of the driver.
//!
//! Otherwise operations go to the remote store, and any failure silently
//! retries on the local store. The failure permanently reroutes that logical
//! value (a key and all of its `_g<n>` shards) to the local store for the
//! rest of the session.
//!
//! ## Known Gap
//!
//! There is no reconciliation between the two stores. A value rerouted in one
//! session is read from the remote store again in the next one, so the two
//! can diverge. This is a documented limitation, not something the driver
//! tries to repair.
//!
//! ## Quota
//!
//! `set` checks the serialized size against the remote quota before writing
//! and fails fast with [`StoreError::QuotaExceeded`], so callers can shard
//! instead of retrying.

use super::backend::{KvBackend, Limits};
use crate::error::{Result, StoreError};
use crate::keys;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Remote,
    Local,
}

pub struct Driver {
    remote: Option<Arc<dyn KvBackend>>,
    local: Arc<dyn KvBackend>,
    rerouted: Mutex<HashSet<String>>,
}

impl Driver {
    /// Probe the remote store and build a driver over both stores.
    pub async fn connect(remote: Arc<dyn KvBackend>, local: Arc<dyn KvBackend>) -> Self {
        let remote = match remote.probe().await {
            Ok(()) => {
                debug!(backend = remote.name(), "remote store available");
                Some(remote)
            }
            Err(e) => {
                warn!(backend = remote.name(), error = %e, "remote store unavailable, using local store");
                None
            }
        };
        Self {
            remote,
            local,
            rerouted: Mutex::new(HashSet::new()),
        }
    }

    /// A driver with no remote store at all.
    pub fn local_only(local: Arc<dyn KvBackend>) -> Self {
        Self {
            remote: None,
            local,
            rerouted: Mutex::new(HashSet::new()),
        }
    }

    /// Where operations go when nothing has failed yet.
    pub fn primary(&self) -> Route {
        if self.remote.is_some() {
            Route::Remote
        } else {
            Route::Local
        }
    }

    /// Where operations on `key` currently go.
    pub fn route(&self, key: &str) -> Route {
        match self.remote_for(&keys::normalize(key)) {
            Some(_) => Route::Remote,
            None => Route::Local,
        }
    }

    pub fn remote_limits(&self) -> Option<Limits> {
        self.remote.as_ref().and_then(|r| r.limits())
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let key = keys::normalize(key);
        if let Some(remote) = self.remote_for(&key) {
            match remote.get(&key).await {
                Ok(value) => return Ok(value),
                Err(e) => self.fall_back(&key, "get", &e),
            }
        }
        self.local.get(&key).await
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        let key = keys::normalize(key);
        if let Some(remote) = self.remote_for(&key) {
            if let Some(limits) = remote.limits() {
                if value.len() > limits.max_value_bytes {
                    return Err(StoreError::QuotaExceeded {
                        key,
                        size: value.len(),
                        limit: limits.max_value_bytes,
                    });
                }
            }
            match remote.set(&key, value).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_quota() => return Err(e),
                Err(e) => self.fall_back(&key, "set", &e),
            }
        }
        self.local.set(&key, value).await
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        let key = keys::normalize(key);
        if let Some(remote) = self.remote_for(&key) {
            match remote.remove(&key).await {
                Ok(()) => return Ok(()),
                Err(e) => self.fall_back(&key, "remove", &e),
            }
        }
        self.local.remove(&key).await
    }

    pub async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let prefix = keys::normalize(prefix);
        if let Some(remote) = &self.remote {
            match remote.list_keys(&prefix).await {
                Ok(found) => return Ok(found),
                Err(e) => {
                    warn!(backend = remote.name(), error = %e, "listing keys failed, using local store")
                }
            }
        }
        self.local.list_keys(&prefix).await
    }

    fn remote_for(&self, key: &str) -> Option<&Arc<dyn KvBackend>> {
        let remote = self.remote.as_ref()?;
        if self.rerouted.lock().contains(route_id(key)) {
            return None;
        }
        Some(remote)
    }

    fn fall_back(&self, key: &str, op: &str, error: &StoreError) {
        warn!(key, op, error = %error, "remote operation failed, rerouting to local store");
        self.rerouted.lock().insert(route_id(key).to_string());
    }
}

/// Shards share the route of their logical key.
fn route_id(key: &str) -> &str {
    match key.rsplit_once("_g") {
        Some((base, index)) if !index.is_empty() && index.chars().all(|c| c.is_ascii_digit()) => {
            base
        }
        _ => key,
    }
}
