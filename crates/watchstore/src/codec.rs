//! # Size-Bounded Codec
//!
//! Makes an arbitrarily large logical value durable on a backend that rejects
//! any single serialized value above a fixed byte budget.
//!
//! A value that serializes within the budget is stored as one shard under the
//! logical key. Anything larger is packed greedily into groups stored under
//! `<key>_g0`, `<key>_g1`, ... . Maps are packed in a deterministic key order
//! (numeric ids first, then composite `a_b` ids, then plain text) so that
//! re-encoding unchanged data produces byte-identical shards and no spurious
//! writes. Lists keep their own order.
//!
//! Reassembly stops at the first missing group index.

use serde_json::{Map, Value};
use std::cmp::Ordering;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("entry of {size} bytes cannot fit in a {limit} byte shard")]
    EntryTooLarge { size: usize, limit: usize },

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Physical form of an encoded logical value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shards {
    Single(String),
    Grouped(Vec<String>),
}

impl Shards {
    pub fn len(&self) -> usize {
        match self {
            Shards::Single(_) => 1,
            Shards::Grouped(groups) => groups.len(),
        }
    }

    pub fn is_grouped(&self) -> bool {
        matches!(self, Shards::Grouped(_))
    }
}

/// Where a shard lives relative to its logical key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Single,
    Group(usize),
}

#[derive(Debug, Clone, Copy)]
pub struct Codec {
    budget: usize,
}

impl Codec {
    pub fn new(budget: usize) -> Self {
        Self { budget }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn encode_map(&self, map: &Map<String, Value>) -> Result<Shards, CodecError> {
        let mut keys: Vec<&String> = map.keys().collect();
        keys.sort_by(|a, b| shard_order(a, b));

        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            entries.push(format!(
                "{}:{}",
                serde_json::to_string(key)?,
                serde_json::to_string(&map[key.as_str()])?
            ));
        }
        self.pack(entries, '{', '}')
    }

    pub fn encode_list(&self, items: &[Value]) -> Result<Shards, CodecError> {
        let entries = items
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?;
        self.pack(entries, '[', ']')
    }

    fn pack(&self, entries: Vec<String>, open: char, close: char) -> Result<Shards, CodecError> {
        let whole_len = 2 + entries.iter().map(|e| e.len()).sum::<usize>()
            + entries.len().saturating_sub(1);
        if whole_len <= self.budget {
            let mut whole = String::with_capacity(whole_len);
            whole.push(open);
            whole.push_str(&entries.join(","));
            whole.push(close);
            return Ok(Shards::Single(whole));
        }

        let mut groups = Vec::new();
        let mut current = String::from(open);
        for entry in entries {
            if entry.len() + 2 > self.budget {
                return Err(CodecError::EntryTooLarge {
                    size: entry.len() + 2,
                    limit: self.budget,
                });
            }
            let separator = usize::from(current.len() > 1);
            if current.len() + separator + entry.len() + 1 > self.budget {
                current.push(close);
                groups.push(std::mem::replace(&mut current, String::from(open)));
            }
            if current.len() > 1 {
                current.push(',');
            }
            current.push_str(&entry);
        }
        current.push(close);
        groups.push(current);
        Ok(Shards::Grouped(groups))
    }
}

/// Reassemble a logical map. Grouped shards take precedence over a plain one;
/// shards that fail to parse are skipped.
pub fn decode_map(read: impl Fn(Slot) -> Option<String>) -> Map<String, Value> {
    let mut merged = Map::new();
    for (slot, raw) in collect(read) {
        match serde_json::from_str::<Map<String, Value>>(&raw) {
            Ok(part) => merged.extend(part),
            Err(e) => warn!(?slot, error = %e, "skipping malformed map shard"),
        }
    }
    merged
}

/// Reassemble a logical list by concatenating shards in index order.
pub fn decode_list(read: impl Fn(Slot) -> Option<String>) -> Vec<Value> {
    let mut merged = Vec::new();
    for (slot, raw) in collect(read) {
        match serde_json::from_str::<Vec<Value>>(&raw) {
            Ok(part) => merged.extend(part),
            Err(e) => warn!(?slot, error = %e, "skipping malformed list shard"),
        }
    }
    merged
}

fn collect(read: impl Fn(Slot) -> Option<String>) -> Vec<(Slot, String)> {
    let mut shards = Vec::new();
    let mut index = 0;
    while let Some(raw) = read(Slot::Group(index)) {
        shards.push((Slot::Group(index), raw));
        index += 1;
    }
    let single = read(Slot::Single);
    if shards.is_empty() {
        shards.extend(single.map(|raw| (Slot::Single, raw)));
    } else if single.is_some() {
        warn!("both plain and grouped forms present; using grouped");
    }
    shards
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum SortKey<'a> {
    Numeric(i128),
    Composite(Vec<i128>),
    Text(&'a str),
}

fn sort_key(key: &str) -> SortKey<'_> {
    if let Ok(n) = key.parse::<i128>() {
        return SortKey::Numeric(n);
    }
    let parts: Option<Vec<i128>> = key.split('_').map(|p| p.parse().ok()).collect();
    match parts {
        Some(parts) => SortKey::Composite(parts),
        None => SortKey::Text(key),
    }
}

/// Deterministic entry order used when packing maps.
pub fn shard_order(a: &str, b: &str) -> Ordering {
    sort_key(a).cmp(&sort_key(b)).then_with(|| a.cmp(b))
}
