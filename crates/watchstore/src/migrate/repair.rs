//! Repair pass run at the end of every migration.
//!
//! Whatever the input looked like, the result has every collection at its
//! expected type:
//!
//! ```text
//! movies   { want: [id], watched: [id], reviews: {..} }
//! tvShows  { want: [id], watching: [id], watched: [id],
//!            episodes: { show: { season: [ep] } }, seasonReviews: {..} }
//! search   { recent: [string] }
//! ```
//!
//! Running it twice changes nothing the second time.

use crate::episodes::MAX_EPISODE;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// What the repair pass had to fix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    /// Containers of the wrong type replaced with empty ones.
    pub coerced: usize,
    /// Null, duplicate or id-less list entries and invalid episode numbers.
    pub dropped_entries: usize,
    /// Review values that were not objects.
    pub dropped_reviews: usize,
    /// Obsolete fields removed (`activity`, `movies.watching`).
    pub stripped: usize,
}

impl RepairReport {
    pub fn is_clean(&self) -> bool {
        *self == RepairReport::default()
    }
}

/// Numeric id of a list entry: a number, a numeric string, or an object
/// carrying either under `id`.
pub(crate) fn entry_id(entry: &Value) -> Option<u64> {
    match entry {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Object(fields) => match fields.get("id")? {
            Value::Object(_) => None,
            id => entry_id(id),
        },
        _ => None,
    }
}

pub fn repair(data: &mut Value) -> RepairReport {
    let mut report = RepairReport::default();
    if !data.is_object() {
        *data = Value::Object(Map::new());
        report.coerced += 1;
    }
    let Value::Object(root) = data else {
        return report;
    };

    let mut movies = take_object(root, "movies", &mut report);
    for status in ["want", "watched"] {
        repair_list(&mut movies, status, &mut report);
    }
    if movies.remove("watching").is_some() {
        report.stripped += 1;
    }
    repair_reviews(&mut movies, "reviews", &mut report);
    root.insert("movies".to_string(), Value::Object(movies));

    let mut shows = take_object(root, "tvShows", &mut report);
    for status in ["want", "watching", "watched"] {
        repair_list(&mut shows, status, &mut report);
    }
    repair_episodes(&mut shows, &mut report);
    repair_reviews(&mut shows, "seasonReviews", &mut report);
    root.insert("tvShows".to_string(), Value::Object(shows));

    let mut search = take_object(root, "search", &mut report);
    let recent = take_array(&mut search, "recent", &mut report);
    let kept: Vec<Value> = recent.into_iter().filter(Value::is_string).collect();
    search.insert("recent".to_string(), Value::Array(kept));
    root.insert("search".to_string(), Value::Object(search));

    if root.remove("activity").is_some() {
        report.stripped += 1;
    }
    report
}

fn take_object(
    parent: &mut Map<String, Value>,
    name: &str,
    report: &mut RepairReport,
) -> Map<String, Value> {
    match parent.remove(name) {
        Some(Value::Object(map)) => map,
        None => Map::new(),
        Some(_) => {
            report.coerced += 1;
            Map::new()
        }
    }
}

fn take_array(parent: &mut Map<String, Value>, name: &str, report: &mut RepairReport) -> Vec<Value> {
    match parent.remove(name) {
        Some(Value::Array(items)) => items,
        None => Vec::new(),
        Some(_) => {
            report.coerced += 1;
            Vec::new()
        }
    }
}

fn repair_list(section: &mut Map<String, Value>, name: &str, report: &mut RepairReport) {
    let items = take_array(section, name, report);
    let total = items.len();
    let mut seen = HashSet::new();
    let ids: Vec<Value> = items
        .iter()
        .filter_map(entry_id)
        .filter(|id| seen.insert(*id))
        .map(Value::from)
        .collect();
    report.dropped_entries += total - ids.len();
    section.insert(name.to_string(), Value::Array(ids));
}

fn repair_reviews(section: &mut Map<String, Value>, name: &str, report: &mut RepairReport) {
    let mut reviews = take_object(section, name, report);
    let before = reviews.len();
    reviews.retain(|_, review| review.is_object());
    report.dropped_reviews += before - reviews.len();
    section.insert(name.to_string(), Value::Object(reviews));
}

/// Episode arrays are de-duplicated in place and numbers past
/// [`MAX_EPISODE`] dropped. Order is kept so the compact
/// range shorthand and its reversed two-element form survive.
fn repair_episodes(shows: &mut Map<String, Value>, report: &mut RepairReport) {
    let episodes = take_object(shows, "episodes", report);
    let mut repaired = Map::new();

    for (show, seasons) in episodes {
        let Value::Object(seasons) = seasons else {
            report.coerced += 1;
            continue;
        };
        let mut kept = Map::new();
        for (season, list) in seasons {
            let Value::Array(list) = list else {
                report.coerced += 1;
                continue;
            };
            let total = list.len();
            let mut seen = HashSet::new();
            let numbers: Vec<Value> = list
                .iter()
                .filter_map(|n| n.as_u64().filter(|n| *n <= u64::from(MAX_EPISODE)))
                .filter(|n| seen.insert(*n))
                .map(Value::from)
                .collect();
            report.dropped_entries += total - numbers.len();
            kept.insert(season, Value::Array(numbers));
        }
        repaired.insert(show, Value::Object(kept));
    }

    shows.insert("episodes".to_string(), Value::Object(repaired));
}
