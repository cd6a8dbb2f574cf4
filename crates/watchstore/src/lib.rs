//! # Watchstore Architecture
//!
//! Watchstore is the **client-side persistence layer** of a movie and TV
//! tracking app. It keeps each user's watch lists, ratings, episode progress
//! and recent searches durable on a key-value store that rejects any value
//! larger than a few kilobytes, and it carries data written by every earlier
//! version of the app forward to the current layout.
//!
//! ## The Four Components
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Storage Adapter (store::UserStore)                         │
//! │  - Per-user namespace, typed synchronous accessors          │
//! │  - Cache is truth; persistence runs in the background       │
//! └─────────────────────────────────────────────────────────────┘
//!            │                                    │
//!            ▼                                    ▼
//! ┌───────────────────────────┐      ┌──────────────────────────┐
//! │  Size-Bounded Codec       │      │  Migration Pipeline      │
//! │  (codec)                  │      │  (migrate)               │
//! │  - Shards oversized maps  │      │  - 1.0 → 1.3 blob chain  │
//! │    and lists              │      │  - Repair pass           │
//! └───────────────────────────┘      └──────────────────────────┘
//!            │
//!            ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Backend Driver (store::Driver)                             │
//! │  - Remote store when the probe succeeds                     │
//! │  - Silent, permanent per-key fallback to the local store    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Schema Versions
//!
//! Versions 1.0 through 1.3 stored everything in one JSON blob. Version 1.4
//! splits it into one logical key per collection (see [`keys`]), sharded when
//! needed. Opening a store that still holds a blob runs the blob through
//! [`migrate`] and bulk-loads it (the sharded cutover).
//!
//! ## Module Overview
//!
//! - [`store`]: User store, backends, driver, events
//! - [`codec`]: Size-bounded sharding of logical values
//! - [`migrate`]: Versioned blob migrations and repair
//! - [`keys`]: Physical key grammar and normalization
//! - [`episodes`]: Compact episode-set encoding
//! - [`model`]: Core data types (`Meta`, `ListType`, `ReviewRecord`)
//! - [`config`]: Configuration management
//! - [`init`]: Opening a store over a local data directory
//! - [`error`]: Error types

pub mod codec;
pub mod config;
pub mod episodes;
pub mod error;
pub mod init;
pub mod keys;
pub mod migrate;
pub mod model;
pub mod store;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
