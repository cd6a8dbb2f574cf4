//! # Configuration
//!
//! Store configuration is managed by [`clapfig`], which handles layered loading
//! from TOML files, environment variables, and compiled defaults.
//!
//! ## Resolution Order
//!
//! 1. **Environment variables**: `WATCHSTORE__QUOTA_BYTES`, `WATCHSTORE__SHARD_MARGIN`, etc.
//! 2. **Data directory config**: `<data dir>/watchstore.toml`.
//! 3. **Compiled defaults**: `#[config(default = ...)]` below.
//!
//! ## Available Settings
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `quota_bytes` | `4096` | Hard per-key limit of the remote store |
//! | `shard_margin` | `256` | Bytes held back below the limit when packing shards |
//! | `recent_search_limit` | `10` | Cap on stored recent searches |
//! | `event_capacity` | `64` | Capacity of the store event channel |

use clapfig::{Clapfig, SearchMode, SearchPath};
use confique::Config;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CONFIG_FILENAME: &str = "watchstore.toml";

/// Configuration for a user store, stored in `watchstore.toml`.
#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Maximum serialized size of a single value on the remote store.
    #[config(default = 4096)]
    pub quota_bytes: usize,

    /// Bytes kept free below `quota_bytes` when packing shards.
    #[config(default = 256)]
    pub shard_margin: usize,

    /// How many recent searches are kept.
    #[config(default = 10)]
    pub recent_search_limit: usize,

    /// Buffered events per subscriber before lagging.
    #[config(default = 64)]
    pub event_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            quota_bytes: 4096,
            shard_margin: 256,
            recent_search_limit: 10,
            event_capacity: 64,
        }
    }
}

impl StoreConfig {
    /// Load the layered config for a data directory, falling back to defaults.
    pub fn load(data_dir: &Path) -> Self {
        Clapfig::builder()
            .app_name("watchstore")
            .file_name(CONFIG_FILENAME)
            .search_paths(vec![SearchPath::Path(data_dir.to_path_buf())])
            .search_mode(SearchMode::Merge)
            .load()
            .unwrap_or_default()
    }

    /// Byte budget a single shard may use.
    pub fn shard_budget(&self) -> usize {
        self.quota_bytes.saturating_sub(self.shard_margin).max(2)
    }
}
