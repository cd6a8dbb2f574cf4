//! Typed in-memory mirror of one user's store.
//!
//! The cache holds logical values, never shards. It is filled once from the
//! physical keys found at `init`, then mutated synchronously by the accessors.
//! [`Cache::logical_value`] turns one logical key back into the JSON shape the
//! codec packs.

use crate::codec::{self, Slot};
use crate::episodes;
use crate::error::StoreError;
use crate::keys::LogicalKey;
use crate::model::{ListType, MediaId, Meta, ReviewRecord, SeasonKey};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::warn;

/// Shards of one logical key as read from the backend.
#[derive(Debug, Clone, Default)]
pub(crate) struct RawValue {
    pub single: Option<String>,
    pub groups: BTreeMap<usize, String>,
}

impl RawValue {
    fn read(&self, slot: Slot) -> Option<String> {
        match slot {
            Slot::Single => self.single.clone(),
            Slot::Group(index) => self.groups.get(&index).cloned(),
        }
    }
}

/// JSON shape of a logical value before encoding.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Logical {
    Map(Map<String, Value>),
    List(Vec<Value>),
}

impl Logical {
    fn is_empty(&self) -> bool {
        match self {
            Logical::Map(map) => map.is_empty(),
            Logical::List(items) => items.is_empty(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Cache {
    pub meta: Option<Meta>,
    pub lists: HashMap<ListType, Vec<MediaId>>,
    pub movie_reviews: BTreeMap<MediaId, ReviewRecord>,
    pub season_reviews: BTreeMap<SeasonKey, ReviewRecord>,
    /// show id -> season -> compact episode encoding
    pub episodes: BTreeMap<MediaId, BTreeMap<u32, Vec<u32>>>,
    pub recent_searches: Vec<String>,
    /// Pre-sharding blob found at init, consumed by the cutover.
    pub legacy: Option<Value>,
}

impl Cache {
    /// Every logical key a user store persists.
    pub(crate) fn persisted_keys() -> Vec<LogicalKey> {
        let mut keys = vec![LogicalKey::Meta];
        keys.extend(ListType::ALL.into_iter().map(LogicalKey::list));
        keys.extend([
            LogicalKey::MovieReviews,
            LogicalKey::SeasonReviews,
            LogicalKey::Episodes,
            LogicalKey::RecentSearches,
        ]);
        keys
    }

    pub(crate) fn load(raw: &BTreeMap<LogicalKey, RawValue>) -> Self {
        let mut cache = Cache::default();
        for (logical, value) in raw {
            cache.load_value(*logical, value);
        }
        cache
    }

    fn load_value(&mut self, logical: LogicalKey, value: &RawValue) {
        let read = |slot| value.read(slot);
        match logical {
            LogicalKey::Meta => {
                let map = codec::decode_map(read);
                if map.is_empty() {
                    return;
                }
                match serde_json::from_value::<Meta>(Value::Object(map)) {
                    Ok(meta) => self.meta = Some(meta),
                    Err(e) => report_malformed("meta", e.to_string()),
                }
            }
            LogicalKey::List(key) => {
                let ids = unique_ids(&codec::decode_list(read));
                self.lists.insert(key.list(), ids);
            }
            LogicalKey::MovieReviews => {
                self.movie_reviews = movie_reviews_from(&codec::decode_map(read));
            }
            LogicalKey::SeasonReviews => {
                self.season_reviews = season_reviews_from(&codec::decode_map(read));
            }
            LogicalKey::Episodes => {
                self.episodes = episodes_from(&codec::decode_map(read));
            }
            LogicalKey::RecentSearches => {
                self.recent_searches = strings_from(&codec::decode_list(read));
            }
            LogicalKey::LegacyData => {
                let map = codec::decode_map(read);
                if !map.is_empty() {
                    self.legacy = Some(Value::Object(map));
                }
            }
        }
    }

    pub(crate) fn list(&self, list: ListType) -> &[MediaId] {
        self.lists.get(&list).map(Vec::as_slice).unwrap_or(&[])
    }

    /// JSON shape of one logical key, or `None` when it holds nothing and the
    /// physical keys should be removed.
    pub(crate) fn logical_value(
        &self,
        logical: LogicalKey,
    ) -> Result<Option<Logical>, serde_json::Error> {
        let value = match logical {
            LogicalKey::Meta => match &self.meta {
                Some(meta) => match serde_json::to_value(meta)? {
                    Value::Object(map) => Logical::Map(map),
                    _ => return Ok(None),
                },
                None => return Ok(None),
            },
            LogicalKey::List(key) => Logical::List(
                self.list(key.list())
                    .iter()
                    .map(|id| Value::from(*id))
                    .collect(),
            ),
            LogicalKey::MovieReviews => Logical::Map(self.movie_reviews_json()?),
            LogicalKey::SeasonReviews => Logical::Map(self.season_reviews_json()?),
            LogicalKey::Episodes => Logical::Map(self.episodes_json()),
            LogicalKey::RecentSearches => Logical::List(
                self.recent_searches
                    .iter()
                    .cloned()
                    .map(Value::String)
                    .collect(),
            ),
            LogicalKey::LegacyData => return Ok(None),
        };
        Ok((!value.is_empty()).then_some(value))
    }

    pub(crate) fn movie_reviews_json(&self) -> Result<Map<String, Value>, serde_json::Error> {
        self.movie_reviews
            .iter()
            .map(|(id, review)| Ok((id.to_string(), serde_json::to_value(review)?)))
            .collect()
    }

    pub(crate) fn season_reviews_json(&self) -> Result<Map<String, Value>, serde_json::Error> {
        self.season_reviews
            .iter()
            .map(|(key, review)| Ok((key.to_string(), serde_json::to_value(review)?)))
            .collect()
    }

    pub(crate) fn episodes_json(&self) -> Map<String, Value> {
        self.episodes
            .iter()
            .map(|(show, seasons)| {
                let seasons: Map<String, Value> = seasons
                    .iter()
                    .map(|(season, compact)| (season.to_string(), Value::from(compact.clone())))
                    .collect();
                (show.to_string(), Value::Object(seasons))
            })
            .collect()
    }
}

fn report_malformed(key: &str, reason: String) {
    let error = StoreError::MalformedData {
        key: key.to_string(),
        reason,
    };
    warn!(error = %error, "ignoring malformed value");
}

fn media_id(value: &Value) -> Option<MediaId> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Numeric ids in first-seen order, without duplicates.
pub(crate) fn unique_ids(values: &[Value]) -> Vec<MediaId> {
    let mut seen = HashSet::new();
    values
        .iter()
        .filter_map(media_id)
        .filter(|id| seen.insert(*id))
        .collect()
}

pub(crate) fn strings_from(values: &[Value]) -> Vec<String> {
    values
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect()
}

fn review_from(key: &str, value: &Value) -> Option<ReviewRecord> {
    match serde_json::from_value(value.clone()) {
        Ok(review) => Some(review),
        Err(e) => {
            report_malformed(key, e.to_string());
            None
        }
    }
}

pub(crate) fn movie_reviews_from(map: &Map<String, Value>) -> BTreeMap<MediaId, ReviewRecord> {
    map.iter()
        .filter_map(|(key, value)| {
            let Ok(id) = key.parse::<MediaId>() else {
                report_malformed(key, "movie review key is not an id".to_string());
                return None;
            };
            Some((id, review_from(key, value)?))
        })
        .collect()
}

pub(crate) fn season_reviews_from(map: &Map<String, Value>) -> BTreeMap<SeasonKey, ReviewRecord> {
    map.iter()
        .filter_map(|(key, value)| {
            let Some(season) = SeasonKey::parse(key) else {
                report_malformed(key, "season review key is not <show>_<season>".to_string());
                return None;
            };
            Some((season, review_from(key, value)?))
        })
        .collect()
}

/// Episode maps are canonicalized on load so later writes compare equal.
pub(crate) fn episodes_from(
    map: &Map<String, Value>,
) -> BTreeMap<MediaId, BTreeMap<u32, Vec<u32>>> {
    let mut shows = BTreeMap::new();
    for (show, seasons) in map {
        let (Ok(show_id), Some(seasons)) = (show.parse::<MediaId>(), seasons.as_object()) else {
            report_malformed(show, "episode entry is not <show>: {season: [..]}".to_string());
            continue;
        };
        let mut parsed = BTreeMap::new();
        for (season, list) in seasons {
            let (Ok(season), Some(list)) = (season.parse::<u32>(), list.as_array()) else {
                report_malformed(show, format!("season {} is not a list", season));
                continue;
            };
            let numbers: Vec<u32> = list
                .iter()
                .filter_map(|n| n.as_u64().and_then(|n| u32::try_from(n).ok()))
                .collect();
            let Some(compact) = episodes::canonical(&numbers) else {
                report_malformed(show, format!("season {} has episodes past the cap", season));
                continue;
            };
            if !compact.is_empty() {
                parsed.insert(season, compact);
            }
        }
        if !parsed.is_empty() {
            shows.insert(show_id, parsed);
        }
    }
    shows
}
