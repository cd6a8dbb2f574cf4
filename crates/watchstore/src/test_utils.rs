use crate::config::StoreConfig;
use crate::store::{Driver, MemBackend, UserStore};
use std::sync::Arc;

/// A quota-constrained in-memory "remote" store and an unconstrained local
/// one. Each [`TestEnv::open`] is a new session over the same data, so
/// values written by one store are visible to the next.
pub struct TestEnv {
    pub remote: Arc<MemBackend>,
    pub local: Arc<MemBackend>,
    pub config: StoreConfig,
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl TestEnv {
    pub fn new() -> Self {
        let config = StoreConfig::default();
        Self {
            remote: Arc::new(MemBackend::constrained(config.quota_bytes)),
            local: Arc::new(MemBackend::new()),
            config,
        }
    }

    /// A freshly probed driver over both stores.
    pub async fn driver(&self) -> Arc<Driver> {
        Arc::new(Driver::connect(self.remote.clone(), self.local.clone()).await)
    }

    pub async fn open(&self, user_id: &str) -> UserStore {
        UserStore::open(user_id, self.driver().await, self.config.clone())
            .await
            .expect("failed to open store")
    }
}
