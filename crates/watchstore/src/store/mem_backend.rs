use super::backend::{KvBackend, Limits};
use crate::error::{Result, StoreError};
use crate::keys;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// In-memory storage backend.
///
/// Unconstrained by default. [`MemBackend::constrained`] enforces a value-size
/// quota and the restricted key alphabet, which makes it a stand-in for the
/// remote cloud store in tests. Failures can be injected to exercise the
/// driver's fallback path.
#[derive(Default)]
pub struct MemBackend {
    entries: Mutex<BTreeMap<String, String>>,
    limits: Option<Limits>,
    fail_probe: Mutex<bool>,
    fail_ops: Mutex<bool>,
    writes: Mutex<usize>,
}

impl MemBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constrained(max_value_bytes: usize) -> Self {
        Self {
            limits: Some(Limits {
                max_value_bytes,
                restricted_alphabet: true,
            }),
            ..Self::default()
        }
    }

    /// Make the capability probe fail.
    pub fn set_fail_probe(&self, fail: bool) {
        *self.fail_probe.lock() = fail;
    }

    /// Make every get/set/remove/list fail.
    pub fn set_fail_ops(&self, fail: bool) {
        *self.fail_ops.lock() = fail;
    }

    /// Number of successful `set` calls so far.
    pub fn write_count(&self) -> usize {
        *self.writes.lock()
    }

    /// Test helper to read a raw value synchronously.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    /// Test helper to seed a raw value synchronously.
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.entries.lock().insert(key.to_string(), value.to_string());
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.lock().keys().cloned().collect()
    }

    fn check_available(&self) -> Result<()> {
        if *self.fail_ops.lock() {
            return Err(StoreError::BackendUnavailable(
                "simulated backend failure".to_string(),
            ));
        }
        Ok(())
    }

    fn check_key(&self, key: &str) -> Result<()> {
        match self.limits {
            Some(limits) if limits.restricted_alphabet && !keys::is_remote_safe(key) => Err(
                StoreError::Store(format!("key {} contains unsupported characters", key)),
            ),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl KvBackend for MemBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn limits(&self) -> Option<Limits> {
        self.limits
    }

    async fn probe(&self) -> Result<()> {
        if *self.fail_probe.lock() {
            return Err(StoreError::BackendUnavailable(
                "simulated probe failure".to_string(),
            ));
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check_available()?;
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check_available()?;
        self.check_key(key)?;
        if let Some(limits) = self.limits {
            if value.len() > limits.max_value_bytes {
                return Err(StoreError::QuotaExceeded {
                    key: key.to_string(),
                    size: value.len(),
                    limit: limits.max_value_bytes,
                });
            }
        }
        self.entries
            .lock()
            .insert(key.to_string(), value.to_string());
        *self.writes.lock() += 1;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.check_available()?;
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        self.check_available()?;
        Ok(self
            .entries
            .lock()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}
