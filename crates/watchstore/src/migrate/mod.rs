//! # Migration Pipeline
//!
//! Brings a single-blob store of any historical version to the current blob
//! shape, which the user store then splits into per-key values (the 1.4
//! sharded cutover, see [`UserStore::open`](crate::store::UserStore::open)).
//!
//! ```text
//!   1.0 ──▶ 1.1 ──▶ 1.2 ──▶ 1.3 ──▶ repair ──▶ stamp "1.3"
//!    │       │       │       │
//!    │       │       │       └─ already current: repair only
//!    │       │       └─ entries collapse to ids, searches capped
//!    │       └─ tv entries split out, movie "watching" dropped
//!    └─ per-id movie map flattened into status lists and reviews
//! ```
//!
//! The chain is an ordered table of `(from, to, step)` rows. A document
//! enters at the row matching its version and walks every later row, so no
//! step is skipped or repeated.
//!
//! ## Version Detection
//!
//! - Missing or unparseable `version`: read from the shape. Status lists
//!   under `tvShows` mean 1.2 (1.3 when every list entry is a bare id),
//!   status arrays under `movies` mean 1.1, anything else is 1.0 (the oldest
//!   shape never carried a version).
//! - Newer than [`SchemaVersion::CURRENT`]: [`MigrationError::UnsupportedVersion`].
//! - Input that is not a JSON object is corrupt and rebuilt from `{}`.
//!
//! Migration never touches its input. On failure the caller still holds the
//! original document.

mod repair;
mod transforms;

pub use repair::{repair, RepairReport};

use crate::error::MigrationError;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SchemaVersion {
    V1_0,
    V1_1,
    V1_2,
    V1_3,
    /// Sharded per-key layout. Never produced by the blob pipeline.
    V1_4,
}

impl SchemaVersion {
    /// Version the blob pipeline migrates to.
    pub const CURRENT: SchemaVersion = SchemaVersion::V1_3;

    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaVersion::V1_0 => "1.0",
            SchemaVersion::V1_1 => "1.1",
            SchemaVersion::V1_2 => "1.2",
            SchemaVersion::V1_3 => "1.3",
            SchemaVersion::V1_4 => "1.4",
        }
    }

    /// Parse `"<major>.<minor>"`. Returns `(major, minor)` for any well-formed
    /// version, known or not.
    pub(crate) fn numbers(s: &str) -> Option<(u32, u32)> {
        let mut parts = s.trim().split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = match parts.next() {
            Some(minor) => minor.parse().ok()?,
            None => 0,
        };
        Some((major, minor))
    }

    pub fn parse(s: &str) -> Option<Self> {
        match Self::numbers(s)? {
            (1, 0) => Some(SchemaVersion::V1_0),
            (1, 1) => Some(SchemaVersion::V1_1),
            (1, 2) => Some(SchemaVersion::V1_2),
            (1, 3) => Some(SchemaVersion::V1_3),
            (1, 4) => Some(SchemaVersion::V1_4),
            _ => None,
        }
    }
}

impl Serialize for SchemaVersion {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type Step = fn(&mut Value) -> Result<(), String>;

const CHAIN: [(SchemaVersion, SchemaVersion, Step); 3] = [
    (SchemaVersion::V1_0, SchemaVersion::V1_1, transforms::v1_0_to_v1_1),
    (SchemaVersion::V1_1, SchemaVersion::V1_2, transforms::v1_1_to_v1_2),
    (SchemaVersion::V1_2, SchemaVersion::V1_3, transforms::v1_2_to_v1_3),
];

/// What a migration did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Version detected on the input.
    pub from: SchemaVersion,
    /// Target version of every step applied, in order.
    pub applied: Vec<SchemaVersion>,
    pub repair: RepairReport,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Migrated {
    pub data: Value,
    pub report: MigrationReport,
}

fn version_field(data: &Value) -> Option<String> {
    match data.get("version")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Detect the schema version of a blob.
pub fn detect_version(data: &Value) -> Result<SchemaVersion, MigrationError> {
    let Some(raw) = version_field(data) else {
        return Ok(infer_version(data));
    };
    if let Some(version) = SchemaVersion::parse(&raw) {
        if version > SchemaVersion::CURRENT {
            return Err(MigrationError::UnsupportedVersion(raw));
        }
        return Ok(version);
    }
    match SchemaVersion::numbers(&raw) {
        Some(numbers) if numbers > (1, 4) => Err(MigrationError::UnsupportedVersion(raw)),
        _ => Ok(infer_version(data)),
    }
}

const STATUS_LISTS: [&str; 3] = ["want", "watched", "watching"];

fn status_lists<'a>(data: &'a Value, section: &str) -> Vec<&'a Vec<Value>> {
    STATUS_LISTS
        .iter()
        .filter_map(|status| data.get(section)?.get(*status)?.as_array())
        .collect()
}

/// Starting version of a blob without a usable version tag.
fn infer_version(data: &Value) -> SchemaVersion {
    let movies = status_lists(data, "movies");
    let shows = status_lists(data, "tvShows");

    if !shows.is_empty() {
        let bare_ids = movies
            .iter()
            .chain(&shows)
            .flat_map(|items| items.iter())
            .all(Value::is_number);
        return if bare_ids {
            SchemaVersion::V1_3
        } else {
            SchemaVersion::V1_2
        };
    }
    if !movies.is_empty() {
        return SchemaVersion::V1_1;
    }
    SchemaVersion::V1_0
}

/// True when `data` is present and not stamped with the current version.
pub fn needs_migration(data: Option<&Value>) -> bool {
    match data {
        None | Some(Value::Null) => false,
        Some(data) => version_field(data).as_deref() != Some(SchemaVersion::CURRENT.as_str()),
    }
}

/// Migrate a blob to [`SchemaVersion::CURRENT`].
///
/// `None` (or JSON `null`) yields a fresh empty store.
pub fn migrate(data: Option<&Value>) -> Result<Migrated, MigrationError> {
    let (mut doc, from) = match data {
        None | Some(Value::Null) => (Value::Object(Map::new()), SchemaVersion::CURRENT),
        Some(input) if input.is_object() => (input.clone(), detect_version(input)?),
        Some(_) => {
            warn!("migration input is not an object, rebuilding from scratch");
            (Value::Object(Map::new()), SchemaVersion::V1_0)
        }
    };

    let mut applied = Vec::new();
    for (step_from, step_to, step) in CHAIN {
        if step_from < from {
            continue;
        }
        step(&mut doc).map_err(|reason| MigrationError::Transform {
            from: step_from.to_string(),
            reason,
        })?;
        info!(from = %step_from, to = %step_to, "applied migration step");
        applied.push(step_to);
    }

    let repair = repair::repair(&mut doc);
    if !repair.is_clean() {
        info!(?repair, "repaired migrated data");
    }
    if let Value::Object(root) = &mut doc {
        root.insert(
            "version".to_string(),
            Value::String(SchemaVersion::CURRENT.to_string()),
        );
    }

    Ok(Migrated {
        data: doc,
        report: MigrationReport {
            from,
            applied,
            repair,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn migrated(data: Value) -> Value {
        migrate(Some(&data)).unwrap().data
    }

    #[test]
    fn test_v1_0_movie_flags_become_lists() {
        let data = migrated(json!({
            "version": "1.0",
            "movies": {"123": {"want": true, "title": "X"}}
        }));
        assert_eq!(data["version"], "1.3");
        assert_eq!(data["movies"]["want"], json!([123]));
        assert!(data["movies"].get("watching").is_none());
    }

    #[test]
    fn test_v1_1_tv_entries_move_to_shows() {
        let data = migrated(json!({
            "version": "1.1",
            "movies": {"want": [{"id": 1, "media_type": "tv"}], "watched": [], "watching": []}
        }));
        assert_eq!(data["tvShows"]["want"], json!([1]));
        assert_eq!(data["movies"]["want"], json!([]));
    }

    #[test]
    fn test_missing_input_yields_fresh_store() {
        let result = migrate(None).unwrap();
        let data = result.data;
        assert_eq!(data["version"], "1.3");
        for (section, list) in [
            ("movies", "want"),
            ("movies", "watched"),
            ("tvShows", "want"),
            ("tvShows", "watching"),
            ("tvShows", "watched"),
        ] {
            assert_eq!(data[section][list], json!([]));
        }
        assert_eq!(data["search"]["recent"], json!([]));
        assert!(result.report.applied.is_empty());
    }

    #[test]
    fn test_chain_applies_every_remaining_step_once() {
        let report = migrate(Some(&json!({"version": "1.0"}))).unwrap().report;
        assert_eq!(report.from, SchemaVersion::V1_0);
        assert_eq!(
            report.applied,
            vec![SchemaVersion::V1_1, SchemaVersion::V1_2, SchemaVersion::V1_3]
        );

        let report = migrate(Some(&json!({"version": "1.2"}))).unwrap().report;
        assert_eq!(report.applied, vec![SchemaVersion::V1_3]);

        let report = migrate(Some(&json!({"version": "1.3"}))).unwrap().report;
        assert!(report.applied.is_empty());
    }

    #[test]
    fn test_migration_is_idempotent() {
        let inputs = [
            json!({"version": "1.0", "movies": {"1": {"watched": true, "rating": 7}}, "activity": []}),
            json!({"version": "1.1", "movies": {"want": [{"id": 2}], "watching": [{"id": 3, "media_type": "tv"}]}}),
            json!({"version": "1.2", "movies": {"want": [{"id": 4}, {"id": 4}]}, "search": {"recent": ["a"]}}),
            json!({"version": "1.3", "tvShows": {"episodes": {"5": {"1": [1, 1, 3]}}}}),
            json!({}),
        ];
        for input in inputs {
            let once = migrated(input);
            assert!(!needs_migration(Some(&once)));
            assert_eq!(migrated(once.clone()), once);
        }
    }

    #[test]
    fn test_full_chain_from_v1_0() {
        let data = migrated(json!({
            "movies": {
                "10": {"want": true},
                "11": {"watched": true, "rating": 8, "review": "good", "date": 5},
                "12": {"watching": true}
            },
            "search": {"recent": ["a", "b"]},
            "activity": [{"t": 1}]
        }));
        assert_eq!(data["movies"]["want"], json!([10]));
        assert_eq!(data["movies"]["watched"], json!([11]));
        assert_eq!(data["movies"]["reviews"]["11"]["text"], "good");
        assert_eq!(data["search"]["recent"], json!(["a", "b"]));
        assert!(data.get("activity").is_none());
    }

    #[test]
    fn test_unversioned_and_garbage_versions_start_at_v1_0() {
        assert_eq!(detect_version(&json!({})).unwrap(), SchemaVersion::V1_0);
        assert_eq!(
            detect_version(&json!({"version": "banana"})).unwrap(),
            SchemaVersion::V1_0
        );
        assert_eq!(
            detect_version(&json!({"version": 1.2})).unwrap(),
            SchemaVersion::V1_2
        );
    }

    #[test]
    fn test_untagged_blob_version_is_read_from_shape() {
        let v1_1 = json!({"movies": {"want": [{"id": 1}], "watched": [], "reviews": {}}});
        assert_eq!(detect_version(&v1_1).unwrap(), SchemaVersion::V1_1);

        let v1_2 = json!({"movies": {"want": [{"id": 1}]}, "tvShows": {"want": [{"id": 2}]}});
        assert_eq!(detect_version(&v1_2).unwrap(), SchemaVersion::V1_2);

        let v1_3 = json!({"movies": {"want": [1]}, "tvShows": {"watching": [2]}});
        assert_eq!(detect_version(&v1_3).unwrap(), SchemaVersion::V1_3);

        let v1_0 = json!({"movies": {"5": {"want": true}}, "tvShows": {"episodes": {}}});
        assert_eq!(detect_version(&v1_0).unwrap(), SchemaVersion::V1_0);

        let garbage = json!({"version": "banana", "movies": {"want": [1]}});
        assert_eq!(detect_version(&garbage).unwrap(), SchemaVersion::V1_1);
    }

    #[test]
    fn test_untagged_current_shape_keeps_lists_and_reviews() {
        let data = migrated(json!({
            "movies": {
                "want": [1, 2],
                "watched": [3],
                "reviews": {"3": {"rating": 9, "text": "great", "date": 5}}
            }
        }));
        assert_eq!(data["movies"]["want"], json!([1, 2]));
        assert_eq!(data["movies"]["watched"], json!([3]));
        assert_eq!(data["movies"]["reviews"]["3"]["text"], "great");
        assert_eq!(data["version"], "1.3");
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let err = migrate(Some(&json!({"version": "2.0"}))).unwrap_err();
        assert_eq!(err, MigrationError::UnsupportedVersion("2.0".to_string()));
        assert!(migrate(Some(&json!({"version": "1.4"}))).is_err());
    }

    #[test]
    fn test_non_object_input_is_rebuilt() {
        let data = migrated(json!([1, 2, 3]));
        assert_eq!(data["version"], "1.3");
        assert_eq!(data["movies"]["want"], json!([]));
    }

    #[test]
    fn test_needs_migration() {
        assert!(!needs_migration(None));
        assert!(needs_migration(Some(&json!({"version": "1.2"}))));
        assert!(needs_migration(Some(&json!({}))));
        assert!(!needs_migration(Some(&json!({"version": "1.3"}))));
    }

    #[test]
    fn test_input_is_left_untouched() {
        let input = json!({"version": "1.0", "movies": {"1": {"want": true}}});
        let copy = input.clone();
        migrate(Some(&input)).unwrap();
        assert_eq!(input, copy);
    }
}
