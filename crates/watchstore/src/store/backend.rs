use crate::error::Result;
use async_trait::async_trait;

/// Constraints a physical store places on what it accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum serialized size of one value, in bytes.
    pub max_value_bytes: usize,
    /// Key names must match `[A-Za-z0-9_-]`.
    pub restricted_alphabet: bool,
}

/// Abstract interface for raw key-value I/O.
///
/// This trait handles the "how" of storage (remote cloud store, local
/// directory, memory), while [`Driver`](super::driver::Driver) handles routing
/// and fallback and [`UserStore`](super::user_store::UserStore) the "what".
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Constraints of this store. `None` means unconstrained.
    fn limits(&self) -> Option<Limits> {
        None
    }

    /// Capability probe, run once when a driver is built.
    async fn probe(&self) -> Result<()> {
        Ok(())
    }

    /// Read a value. Returns Ok(None) if the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;

    /// List all keys starting with `prefix`.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>>;
}
