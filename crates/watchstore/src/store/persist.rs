//! # Background Persistence
//!
//! Mutations on a [`UserStore`](super::user_store::UserStore) update the cache
//! and hand the encoded value to the [`Persister`], which writes it through the
//! [`Driver`] on a spawned task. Callers never wait for these writes;
//! [`Persister::flush`] does, for tests and shutdown.
//!
//! ## Ordering
//!
//! Each logical key has one pending slot and one async lock. A task takes the
//! lock, then takes whatever is pending *at that moment*. A task that finds
//! the slot empty was overtaken by a later one that already wrote the newer
//! value, so the durable store always converges on the latest cache state no
//! matter in which order the tasks run.
//!
//! ## Stale Forms
//!
//! The persister remembers what each logical key looks like on disk. New
//! shards are written first, then every stale shard (the plain key after a
//! switch to groups, the groups after a switch back, trailing groups after a
//! shrink) is removed. Shards whose content is unchanged are not rewritten.
//!
//! This order never leaves a logical value without a readable form, but it
//! has a window: if the process dies after the new groups land and before a
//! trailing group is removed, the next load merges the stale group back in
//! and entries deleted by that write reappear. Removing first would instead
//! lose entries that moved between groups, which is worse for watch history.
//! The next write of the same logical key removes the stale group, because
//! `init` seeds the persister with every shard it found.

use super::driver::Driver;
use super::events::{EventBus, StoreEvent};
use crate::codec::Shards;
use crate::error::StoreError;
use crate::keys::{LogicalKey, Namespace};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Last known state of one physical key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) enum Stored {
    #[default]
    Absent,
    Known(String),
    /// A write or removal failed; the key may or may not exist.
    Unknown,
}

/// Physical footprint of one logical key.
#[derive(Debug, Clone, Default)]
pub(crate) struct OnDisk {
    single: Stored,
    groups: Vec<Stored>,
}

impl OnDisk {
    pub(crate) fn loaded(single: Option<&String>, groups: &BTreeMap<usize, String>) -> Self {
        let mut on_disk = OnDisk {
            single: single.map_or(Stored::Absent, |s| Stored::Known(s.clone())),
            groups: Vec::new(),
        };
        for (index, content) in groups {
            if on_disk.groups.len() <= *index {
                on_disk.groups.resize(index + 1, Stored::Absent);
            }
            on_disk.groups[*index] = Stored::Known(content.clone());
        }
        on_disk
    }

    fn physical_keys(&self, ns: &Namespace, logical: LogicalKey) -> Vec<String> {
        let mut keys = Vec::new();
        if self.single != Stored::Absent {
            keys.push(ns.key(logical));
        }
        for (index, stored) in self.groups.iter().enumerate() {
            if *stored != Stored::Absent {
                keys.push(ns.group_key(logical, index));
            }
        }
        keys
    }
}

struct Shared {
    driver: Arc<Driver>,
    ns: Namespace,
    events: EventBus,
    user_id: String,
    /// `Some(None)` means the logical value should be removed.
    pending: Mutex<HashMap<LogicalKey, Option<Shards>>>,
    slots: Mutex<HashMap<LogicalKey, Arc<tokio::sync::Mutex<OnDisk>>>>,
}

pub(crate) struct Persister {
    shared: Arc<Shared>,
    runtime: Handle,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Persister {
    pub(crate) fn new(
        driver: Arc<Driver>,
        ns: Namespace,
        events: EventBus,
        user_id: String,
        runtime: Handle,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                driver,
                ns,
                events,
                user_id,
                pending: Mutex::new(HashMap::new()),
                slots: Mutex::new(HashMap::new()),
            }),
            runtime,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Queue a write (`Some`) or removal (`None`) of a logical value.
    pub(crate) fn schedule(&self, logical: LogicalKey, shards: Option<Shards>) {
        self.shared.pending.lock().insert(logical, shards);

        let shared = self.shared.clone();
        let handle = self
            .runtime
            .spawn(async move { shared.write_through(logical).await });

        let mut tasks = self.tasks.lock();
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
    }

    /// Record what `init` found on disk for a logical key.
    pub(crate) async fn seed(&self, logical: LogicalKey, on_disk: OnDisk) {
        *self.shared.slot(logical).lock().await = on_disk;
    }

    /// Wait until every write scheduled so far, and any scheduled while
    /// waiting, has finished.
    pub(crate) async fn flush(&self) {
        loop {
            let tasks = std::mem::take(&mut *self.tasks.lock());
            if tasks.is_empty() {
                break;
            }
            for task in tasks {
                if let Err(e) = task.await {
                    warn!(error = %e, "persistence task did not complete");
                }
            }
        }
    }

    /// Drop all pending work and footprints, returning every physical key
    /// that may still exist.
    pub(crate) async fn forget_all(&self) -> Vec<String> {
        self.flush().await;
        self.shared.pending.lock().clear();
        let slots: Vec<_> = self.shared.slots.lock().drain().collect();

        let mut keys = Vec::new();
        for (logical, slot) in slots {
            let on_disk = slot.lock().await;
            keys.extend(on_disk.physical_keys(&self.shared.ns, logical));
        }
        keys
    }
}

impl Shared {
    fn slot(&self, logical: LogicalKey) -> Arc<tokio::sync::Mutex<OnDisk>> {
        self.slots.lock().entry(logical).or_default().clone()
    }

    async fn write_through(&self, logical: LogicalKey) {
        let slot = self.slot(logical);
        let mut on_disk = slot.lock().await;

        let Some(shards) = self.pending.lock().remove(&logical) else {
            // Overtaken: a later task already wrote the newest value.
            return;
        };

        let (single, groups) = match shards {
            None => (None, Vec::new()),
            Some(Shards::Single(content)) => (Some(content), Vec::new()),
            Some(Shards::Grouped(groups)) => (None, groups),
        };

        let mut failures = Vec::new();

        // 1. New form first
        let wants_single = single.is_some();
        if let Some(content) = single {
            let key = self.ns.key(logical);
            self.put(&key, content, &mut on_disk.single, &mut failures)
                .await;
        }
        let group_count = groups.len();
        if on_disk.groups.len() < group_count {
            on_disk.groups.resize(group_count, Stored::Absent);
        }
        for (index, content) in groups.into_iter().enumerate() {
            let key = self.ns.group_key(logical, index);
            self.put(&key, content, &mut on_disk.groups[index], &mut failures)
                .await;
        }

        // 2. Then remove the stale form
        if !wants_single && on_disk.single != Stored::Absent {
            let key = self.ns.key(logical);
            self.drop_key(&key, &mut on_disk.single, &mut failures).await;
        }
        for index in group_count..on_disk.groups.len() {
            if on_disk.groups[index] != Stored::Absent {
                let key = self.ns.group_key(logical, index);
                self.drop_key(&key, &mut on_disk.groups[index], &mut failures)
                    .await;
            }
        }
        while on_disk.groups.last() == Some(&Stored::Absent) {
            on_disk.groups.pop();
        }

        debug!(%logical, groups = group_count, failures = failures.len(), "persisted");
        for error in failures {
            self.report(error);
        }
    }

    async fn put(
        &self,
        key: &str,
        content: String,
        stored: &mut Stored,
        failures: &mut Vec<StoreError>,
    ) {
        if matches!(stored, Stored::Known(existing) if *existing == content) {
            return;
        }
        match self.driver.set(key, &content).await {
            Ok(()) => *stored = Stored::Known(content),
            Err(e) => {
                *stored = Stored::Unknown;
                failures.push(e);
            }
        }
    }

    async fn drop_key(&self, key: &str, stored: &mut Stored, failures: &mut Vec<StoreError>) {
        match self.driver.remove(key).await {
            Ok(()) => *stored = Stored::Absent,
            Err(e) => {
                *stored = Stored::Unknown;
                failures.push(e);
            }
        }
    }

    fn report(&self, error: StoreError) {
        if error.is_quota() {
            warn!(user_id = %self.user_id, error = %error, "value exceeds remote quota");
            self.events.publish(StoreEvent::QuotaExceeded {
                error: error.to_string(),
                user_id: self.user_id.clone(),
            });
        } else {
            warn!(user_id = %self.user_id, error = %error, "background write failed");
        }
    }
}
