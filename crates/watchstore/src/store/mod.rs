//! # Storage Layer
//!
//! A [`UserStore`] keeps one user's watch lists, reviews, episode progress and
//! searches in a typed in-memory cache and mirrors them onto a key-value
//! store whose values must each stay under a small byte quota.
//!
//! ```text
//!   accessors (sync)                         init / flush / clear_all (async)
//!        │                                              │
//!        ▼                                              ▼
//!  ┌───────────┐  logical value  ┌───────┐  shards  ┌───────────┐
//!  │   Cache   │ ──────────────▶ │ Codec │ ───────▶ │ Persister │  background tasks
//!  └───────────┘                 └───────┘          └─────┬─────┘
//!                                                         ▼
//!                                                   ┌──────────┐   probe fails or
//!                                                   │  Driver  │── op fails ──┐
//!                                                   └────┬─────┘              │
//!                                                        ▼                    ▼
//!                                              remote KvBackend        local KvBackend
//!                                              (quota, [A-Za-z0-9_-])  (unconstrained)
//! ```
//!
//! ## Consistency Model
//!
//! The cache is the single source of truth. Every mutation updates it
//! immediately and returns; the write to the durable store happens on a
//! spawned task. Writes to the same logical key are serialized and the last
//! one wins, so the durable store converges on the cache. [`UserStore::flush`]
//! waits for all outstanding writes, which tests and shutdown rely on.
//!
//! ## Errors
//!
//! Only quota exhaustion reaches callers ([`StoreError::QuotaExceeded`]),
//! and the cache is not rolled back when it does. Unavailable backends are
//! handled by silent fallback; malformed stored values are logged and read as
//! empty.
//!
//! ## Physical Layout
//!
//! ```text
//! user_42_meta                 {"version":"1.4","userId":"42"}
//! user_42_movies_want          [550,603]
//! user_42_tvshows_watching     [1399]
//! user_42_movie_reviews_g0     {"550":{..},"603":{..}, ...}
//! user_42_movie_reviews_g1     {...}
//! user_42_season_reviews       {"1399_1":{..}}
//! user_42_episodes             {"1399":{"1":[1,10],"2":[1,3,4]}}
//! user_42_search_recent        ["dune","alien"]
//! ```
//!
//! ## Implementations
//!
//! - [`fs_backend::FsBackend`]: one JSON file per key in a local directory.
//! - [`mem_backend::MemBackend`]: in memory, optionally quota-constrained,
//!   with failure injection. Stands in for the remote store in tests.
//!
//! [`StoreError::QuotaExceeded`]: crate::error::StoreError::QuotaExceeded

pub mod backend;
mod cache;
pub mod driver;
pub mod events;
pub mod fs_backend;
mod legacy;
pub mod mem_backend;
mod persist;
pub mod user_store;

pub use backend::{KvBackend, Limits};
pub use driver::{Driver, Route};
pub use events::{EventBus, ListAction, StoreEvent};
pub use fs_backend::FsBackend;
pub use mem_backend::MemBackend;
pub use user_store::UserStore;
