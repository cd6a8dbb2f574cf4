//! # Opening a Store from the Environment
//!
//! Hosts without a remote store (the CLI, tests against a real directory)
//! open user stores over a local directory:
//!
//! ```text
//! <data dir>/
//! ├── watchstore.toml      # optional config, see crate::config
//! └── store/
//!     ├── user_42_meta.json
//!     └── user_42_movies_want.json
//! ```
//!
//! ## Data Directory Resolution
//!
//! 1. An explicit override (the CLI's `--data`).
//! 2. `WATCHSTORE_DATA`, primarily for tests that need isolated state.
//! 3. The OS data directory from [`directories::ProjectDirs`].

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::store::{Driver, FsBackend, UserStore};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const DATA_ENV: &str = "WATCHSTORE_DATA";

/// Subdirectory of the data directory holding one file per key.
pub const STORE_DIR: &str = "store";

pub struct StoreContext {
    pub store: UserStore,
    pub config: StoreConfig,
    pub data_dir: PathBuf,
}

pub fn resolve_data_dir(data_override: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = data_override {
        return Ok(path);
    }
    if let Ok(path) = std::env::var(DATA_ENV) {
        return Ok(PathBuf::from(path));
    }
    ProjectDirs::from("com", "watchstore", "watchstore")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| StoreError::Config("could not determine a data directory".to_string()))
}

/// A driver over the local directory store only.
pub fn local_driver(data_dir: &Path) -> Arc<Driver> {
    let backend = Arc::new(FsBackend::new(data_dir.join(STORE_DIR)));
    Arc::new(Driver::local_only(backend))
}

/// Resolve the data directory, load its config and open a user's store.
pub async fn initialize(user_id: &str, data_override: Option<PathBuf>) -> Result<StoreContext> {
    let data_dir = resolve_data_dir(data_override)?;
    let config = StoreConfig::load(&data_dir);
    let store = UserStore::open(user_id, local_driver(&data_dir), config.clone()).await?;
    Ok(StoreContext {
        store,
        config,
        data_dir,
    })
}
