//! # User Store
//!
//! The storage adapter the app talks to. One [`UserStore`] per user, opened
//! with [`UserStore::open`] and closed with [`UserStore::close`].
//!
//! ## Reads and Writes
//!
//! Every accessor reads the in-memory cache synchronously. A mutation
//! updates the cache first, then encodes the affected logical value through
//! the size-bounded codec and hands it to the background persister. The
//! cache is the source of truth; the durable store follows it.
//!
//! ## Errors
//!
//! Quota exhaustion (`StoreError::QuotaExceeded`) is returned after the cache
//! has already changed. Invalid arguments, such as an episode past
//! [`MAX_EPISODE`](crate::episodes::MAX_EPISODE) or a meta version going
//! backwards, are rejected before it changes. Backend failures fall back to
//! the local store silently. Malformed stored values load as empty.
//!
//! ## Cutover
//!
//! `open` loads every key of the user's namespace, then moves a store still
//! holding a pre-sharding blob onto the per-key layout and stamps it 1.4.

use super::cache::{Cache, Logical, RawValue};
use super::driver::Driver;
use super::events::{EventBus, ListAction, StoreEvent};
use super::persist::{OnDisk, Persister};
use crate::codec::{Codec, CodecError};
use crate::config::StoreConfig;
use crate::episodes;
use crate::error::{Result, StoreError};
use crate::keys::{LogicalKey, Namespace};
use crate::migrate::{self, SchemaVersion};
use crate::model::{ListType, MediaId, Meta, MovieStatus, ReviewRecord, SeasonKey, ShowStatus};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// One user's store: a synchronous typed cache backed by a durable,
/// quota-constrained key-value store.
pub struct UserStore {
    user_id: String,
    ns: Namespace,
    config: StoreConfig,
    codec: Codec,
    driver: Arc<Driver>,
    cache: RwLock<Cache>,
    events: EventBus,
    persister: Persister,
}

impl UserStore {
    /// Create an empty, uninitialized store. Must be called from within a
    /// Tokio runtime, which will run the background writes.
    pub fn new(user_id: &str, driver: Arc<Driver>, config: StoreConfig) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| StoreError::Store(format!("no async runtime available: {}", e)))?;
        let ns = Namespace::new(user_id);
        let events = EventBus::new(config.event_capacity);
        let persister = Persister::new(
            driver.clone(),
            ns.clone(),
            events.clone(),
            user_id.to_string(),
            runtime,
        );
        Ok(Self {
            user_id: user_id.to_string(),
            codec: Codec::new(config.shard_budget()),
            ns,
            config,
            driver,
            cache: RwLock::new(Cache::default()),
            events,
            persister,
        })
    }

    /// Create, load and bring a store to the sharded layout.
    pub async fn open(user_id: &str, driver: Arc<Driver>, config: StoreConfig) -> Result<Self> {
        let store = Self::new(user_id, driver, config)?;
        store.init().await?;
        store.cutover().await?;
        Ok(store)
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn driver(&self) -> &Driver {
        &self.driver
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Load every key of the user's namespace into the cache.
    pub async fn init(&self) -> Result<()> {
        let keys = self.driver.list_keys(self.ns.prefix()).await?;

        let mut raw: BTreeMap<LogicalKey, RawValue> = BTreeMap::new();
        for key in keys {
            let Some(physical) = self.ns.parse(&key) else {
                debug!(key = %key, "ignoring unknown key");
                continue;
            };
            let Some(value) = self.driver.get(&key).await? else {
                continue;
            };
            let slot = raw.entry(physical.logical).or_default();
            match physical.group {
                None => slot.single = Some(value),
                Some(index) => {
                    slot.groups.insert(index, value);
                }
            }
        }

        for (logical, value) in &raw {
            self.persister
                .seed(*logical, OnDisk::loaded(value.single.as_ref(), &value.groups))
                .await;
        }
        *self.cache.write() = Cache::load(&raw);
        debug!(user_id = %self.user_id, keys = raw.len(), "loaded store");
        Ok(())
    }

    /// Move a store that predates the per-key layout onto it.
    ///
    /// A pre-sharding blob is migrated, bulk-loaded and removed. Either way
    /// the store ends up stamped with the sharded version. A blob that fails
    /// to migrate is left in place with the cache untouched and the store
    /// unstamped, so the next open tries again. Once the blob has been loaded
    /// into the cache the import counts as done, even if some values were
    /// over quota, and the blob is never read again.
    async fn cutover(&self) -> Result<()> {
        let (meta, legacy) = {
            let cache = self.cache.read();
            (cache.meta.clone(), cache.legacy.clone())
        };
        if meta.is_some_and(|m| is_sharded(&m.version)) {
            return Ok(());
        }

        if let Some(blob) = legacy {
            info!(user_id = %self.user_id, "migrating single-blob store to per-key layout");
            let migrated = match migrate::migrate(Some(&blob)) {
                Ok(migrated) => migrated,
                Err(e) => {
                    warn!(user_id = %self.user_id, error = %e, "cutover failed, keeping legacy data");
                    return Ok(());
                }
            };
            if let Err(e) = self.migrate_from_old_structure(&migrated.data) {
                warn!(user_id = %self.user_id, error = %e, "legacy data imported with values left unsaved");
            }
            self.cache.write().legacy = None;
            self.persister.schedule(LogicalKey::LegacyData, None);
        }

        self.set_meta(Meta::current(&self.user_id))
    }

    /// Wait for every background write scheduled so far.
    pub async fn flush(&self) {
        self.persister.flush().await;
    }

    pub async fn close(self) {
        self.flush().await;
        debug!(user_id = %self.user_id, "store closed");
    }

    // --- meta ---

    pub fn get_meta(&self) -> Option<Meta> {
        self.cache.read().meta.clone()
    }

    /// Replace the meta record. The version never moves backwards.
    pub fn set_meta(&self, meta: Meta) -> Result<()> {
        {
            let mut cache = self.cache.write();
            if let Some(current) = &cache.meta {
                let (old, new) = (
                    SchemaVersion::numbers(&current.version),
                    SchemaVersion::numbers(&meta.version),
                );
                if let (Some(old), Some(new)) = (old, new) {
                    if new < old {
                        return Err(StoreError::Store(format!(
                            "refusing to move version from {} back to {}",
                            current.version, meta.version
                        )));
                    }
                }
            }
            cache.meta = Some(meta);
        }
        self.persist(LogicalKey::Meta)
    }

    // --- lists ---

    pub fn get_list(&self, list: ListType) -> Vec<MediaId> {
        self.cache.read().list(list).to_vec()
    }

    /// Replace a list. Duplicates are dropped, keeping the first occurrence.
    pub fn set_list(&self, list: ListType, ids: &[MediaId]) -> Result<()> {
        let mut seen = HashSet::new();
        let ids: Vec<MediaId> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();

        let previous = self
            .cache
            .write()
            .lists
            .insert(list, ids.clone())
            .unwrap_or_default();

        let before: HashSet<MediaId> = previous.iter().copied().collect();
        for id in previous.iter().filter(|id| !seen.contains(*id)) {
            self.list_changed(list, ListAction::Removed, *id);
        }
        for id in ids.iter().filter(|id| !before.contains(*id)) {
            self.list_changed(list, ListAction::Added, *id);
        }
        self.persist(LogicalKey::list(list))
    }

    pub fn get_movies_list(&self, status: MovieStatus) -> Vec<MediaId> {
        self.get_list(ListType::Movies(status))
    }

    pub fn set_movies_list(&self, status: MovieStatus, ids: &[MediaId]) -> Result<()> {
        self.set_list(ListType::Movies(status), ids)
    }

    pub fn get_tv_shows_list(&self, status: ShowStatus) -> Vec<MediaId> {
        self.get_list(ListType::TvShows(status))
    }

    pub fn set_tv_shows_list(&self, status: ShowStatus, ids: &[MediaId]) -> Result<()> {
        self.set_list(ListType::TvShows(status), ids)
    }

    pub fn is_in_list(&self, list: ListType, id: MediaId) -> bool {
        self.cache.read().list(list).contains(&id)
    }

    /// Append `id` to a list, taking it out of the other lists of the same
    /// media kind. Returns `false` if it was already there.
    pub fn add_to_list(&self, list: ListType, id: MediaId) -> Result<bool> {
        let moved_from = {
            let mut cache = self.cache.write();
            if cache.list(list).contains(&id) {
                return Ok(false);
            }
            let mut moved_from = Vec::new();
            for sibling in list.siblings() {
                if let Some(ids) = cache.lists.get_mut(&sibling) {
                    let before = ids.len();
                    ids.retain(|other| *other != id);
                    if ids.len() != before {
                        moved_from.push(sibling);
                    }
                }
            }
            cache.lists.entry(list).or_default().push(id);
            moved_from
        };

        for sibling in &moved_from {
            self.list_changed(*sibling, ListAction::Removed, id);
        }
        self.list_changed(list, ListAction::Added, id);

        let mut result = self.persist(LogicalKey::list(list));
        for sibling in moved_from {
            let persisted = self.persist(LogicalKey::list(sibling));
            result = result.and(persisted);
        }
        result.map(|()| true)
    }

    /// Returns `false` if `id` was not in the list.
    pub fn remove_from_list(&self, list: ListType, id: MediaId) -> Result<bool> {
        let removed = {
            let mut cache = self.cache.write();
            match cache.lists.get_mut(&list) {
                Some(ids) => {
                    let before = ids.len();
                    ids.retain(|other| *other != id);
                    ids.len() != before
                }
                None => false,
            }
        };
        if !removed {
            return Ok(false);
        }
        self.list_changed(list, ListAction::Removed, id);
        self.persist(LogicalKey::list(list)).map(|()| true)
    }

    // --- reviews ---

    pub fn get_movie_review(&self, movie_id: MediaId) -> Option<ReviewRecord> {
        self.cache.read().movie_reviews.get(&movie_id).cloned()
    }

    pub fn set_movie_review(&self, movie_id: MediaId, review: ReviewRecord) -> Result<()> {
        self.cache.write().movie_reviews.insert(movie_id, review);
        self.persist(LogicalKey::MovieReviews)
    }

    pub fn remove_movie_review(&self, movie_id: MediaId) -> Result<bool> {
        if self.cache.write().movie_reviews.remove(&movie_id).is_none() {
            return Ok(false);
        }
        self.persist(LogicalKey::MovieReviews).map(|()| true)
    }

    pub fn get_season_review(&self, show_id: MediaId, season: u32) -> Option<ReviewRecord> {
        self.cache
            .read()
            .season_reviews
            .get(&SeasonKey::new(show_id, season))
            .cloned()
    }

    pub fn set_season_review(&self, show_id: MediaId, season: u32, review: ReviewRecord) -> Result<()> {
        self.cache
            .write()
            .season_reviews
            .insert(SeasonKey::new(show_id, season), review);
        self.persist(LogicalKey::SeasonReviews)
    }

    pub fn remove_season_review(&self, show_id: MediaId, season: u32) -> Result<bool> {
        let removed = self
            .cache
            .write()
            .season_reviews
            .remove(&SeasonKey::new(show_id, season));
        if removed.is_none() {
            return Ok(false);
        }
        self.persist(LogicalKey::SeasonReviews).map(|()| true)
    }

    // --- episodes ---

    /// Watched episodes of a season, sorted.
    pub fn get_season_episodes(&self, show_id: MediaId, season: u32) -> Vec<u32> {
        self.cache
            .read()
            .episodes
            .get(&show_id)
            .and_then(|seasons| seasons.get(&season))
            .map(|stored| episodes::decode(stored))
            .unwrap_or_default()
    }

    /// Replace the watched episodes of a season. An empty set removes it.
    pub fn set_season_episodes(&self, show_id: MediaId, season: u32, watched: &[u32]) -> Result<()> {
        if let Some(bad) = watched.iter().find(|n| **n > episodes::MAX_EPISODE) {
            return Err(StoreError::MalformedData {
                key: SeasonKey::new(show_id, season).to_string(),
                reason: format!("episode {} is past {}", bad, episodes::MAX_EPISODE),
            });
        }
        let stored = episodes::encode(watched);
        {
            let mut cache = self.cache.write();
            if stored.is_empty() {
                if let Some(seasons) = cache.episodes.get_mut(&show_id) {
                    seasons.remove(&season);
                    if seasons.is_empty() {
                        cache.episodes.remove(&show_id);
                    }
                }
            } else {
                cache
                    .episodes
                    .entry(show_id)
                    .or_default()
                    .insert(season, stored);
            }
        }
        self.persist(LogicalKey::Episodes)
    }

    /// Every season of a show with its watched episodes.
    pub fn get_all_episodes(&self, show_id: MediaId) -> BTreeMap<u32, Vec<u32>> {
        self.cache
            .read()
            .episodes
            .get(&show_id)
            .map(|seasons| {
                seasons
                    .iter()
                    .map(|(season, stored)| (*season, episodes::decode(stored)))
                    .collect()
            })
            .unwrap_or_default()
    }

    // --- searches ---

    /// Recent searches, oldest first.
    pub fn get_recent_searches(&self) -> Vec<String> {
        self.cache.read().recent_searches.clone()
    }

    /// Record a search. Repeating one moves it to the end.
    pub fn push_recent_search(&self, query: &str) -> Result<()> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(());
        }
        {
            let mut cache = self.cache.write();
            let recent = &mut cache.recent_searches;
            recent.retain(|q| q != query);
            recent.push(query.to_string());
            let excess = recent.len().saturating_sub(self.config.recent_search_limit);
            recent.drain(..excess);
        }
        self.persist(LogicalKey::RecentSearches)
    }

    // --- bulk ---

    /// Load a v1.3 blob into every collection at once. Meta is untouched and
    /// no list events are published.
    pub fn migrate_from_old_structure(&self, data: &Value) -> Result<()> {
        let imported = Cache::from_legacy(data);
        {
            let mut cache = self.cache.write();
            let meta = cache.meta.take();
            let legacy = cache.legacy.take();
            *cache = Cache {
                meta,
                legacy,
                ..imported
            };
        }

        let mut result = Ok(());
        for logical in Cache::persisted_keys() {
            if logical == LogicalKey::Meta {
                continue;
            }
            let persisted = self.persist(logical);
            result = result.and(persisted);
        }
        info!(user_id = %self.user_id, "imported legacy data");
        result
    }

    /// The whole store as a v1.3 blob.
    pub fn load_to_old_format(&self) -> Result<Value> {
        Ok(self.cache.read().to_legacy()?)
    }

    /// Remove every key of the user's namespace, on whichever store holds it,
    /// and start over with a fresh meta record.
    pub async fn clear_all(&self) -> Result<()> {
        let mut keys: BTreeSet<String> = self.persister.forget_all().await.into_iter().collect();
        keys.extend(self.driver.list_keys(self.ns.prefix()).await?);
        *self.cache.write() = Cache::default();

        for key in keys.iter().filter(|key| self.ns.parse(key).is_some()) {
            if let Err(e) = self.driver.remove(key).await {
                warn!(key = %key, error = %e, "failed to remove key while clearing");
            }
        }
        info!(user_id = %self.user_id, keys = keys.len(), "cleared store");
        self.set_meta(Meta::current(&self.user_id))
    }

    // --- internals ---

    fn list_changed(&self, list: ListType, action: ListAction, item: MediaId) {
        self.events
            .publish(StoreEvent::ListChanged { list, action, item });
    }

    /// Encode one logical value from the cache and hand it to the persister.
    ///
    /// A value with an entry too large for any shard is a quota failure: the
    /// cache keeps the change, listeners are told, and the caller gets the
    /// error.
    fn persist(&self, logical: LogicalKey) -> Result<()> {
        let value = self.cache.read().logical_value(logical)?;
        let encoded = match value {
            None => {
                self.persister.schedule(logical, None);
                return Ok(());
            }
            Some(Logical::Map(map)) => self.codec.encode_map(&map),
            Some(Logical::List(items)) => self.codec.encode_list(&items),
        };

        match encoded {
            Ok(shards) => {
                debug!(%logical, shards = shards.len(), grouped = shards.is_grouped(), "scheduling write");
                self.persister.schedule(logical, Some(shards));
                Ok(())
            }
            Err(CodecError::EntryTooLarge { size, limit }) => {
                let error = StoreError::QuotaExceeded {
                    key: self.ns.key(logical),
                    size,
                    limit,
                };
                warn!(user_id = %self.user_id, error = %error, "value exceeds remote quota");
                self.events.publish(StoreEvent::QuotaExceeded {
                    error: error.to_string(),
                    user_id: self.user_id.clone(),
                });
                Err(error)
            }
            Err(CodecError::Serialization(e)) => Err(e.into()),
        }
    }
}

fn is_sharded(version: &str) -> bool {
    SchemaVersion::numbers(version).is_some_and(|v| v >= (1, 4))
}
