//! The individual schema steps. Each one receives an object root and rewrites
//! it in place to the next version's shape.

use super::repair::entry_id;
use serde_json::{json, Map, Value};

/// How many recent searches survive the 1.2 -> 1.3 step.
const RECENT_SEARCH_KEEP: usize = 10;

const MOVIE_STATUSES: [&str; 3] = ["want", "watched", "watching"];
const SHOW_STATUSES: [&str; 3] = ["want", "watching", "watched"];

fn root(data: &mut Value) -> Result<&mut Map<String, Value>, String> {
    data.as_object_mut()
        .ok_or_else(|| "document root is not an object".to_string())
}

/// Take a child object out of `parent`, replacing anything that is not an
/// object with an empty one.
fn take_object(parent: &mut Map<String, Value>, name: &str) -> Map<String, Value> {
    match parent.remove(name) {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

fn take_array(parent: &mut Map<String, Value>, name: &str) -> Vec<Value> {
    match parent.remove(name) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

fn is_set(value: Option<&Value>) -> bool {
    value.is_some_and(|v| !v.is_null())
}

/// 1.0 -> 1.1
///
/// Movies were a map of per-id entries carrying status flags and an inline
/// review:
///
/// ```text
/// "movies": { "123": { "want": true, "rating": 8, "review": "..", "title": "X" } }
/// ```
///
/// They become status arrays of media objects plus a review map keyed by id.
pub(super) fn v1_0_to_v1_1(data: &mut Value) -> Result<(), String> {
    let root = root(data)?;
    let entries = take_object(root, "movies");

    let mut lists: [Vec<Value>; 3] = Default::default();
    let mut reviews = Map::new();

    for (id, entry) in entries {
        let Value::Object(mut fields) = entry else {
            continue;
        };

        let flags = MOVIE_STATUSES.map(|status| {
            fields
                .remove(status)
                .and_then(|v| v.as_bool())
                .unwrap_or(false)
        });

        let rating = fields.remove("rating").filter(|v| !v.is_null());
        let text = fields.remove("review").filter(|v| !v.is_null());
        let date = fields.remove("date");
        if rating.is_some() || text.is_some() {
            reviews.insert(
                id.clone(),
                json!({
                    "rating": rating.unwrap_or_else(|| json!(0)),
                    "text": text.unwrap_or(Value::Null),
                    "date": date.unwrap_or(Value::Null),
                }),
            );
        }

        let id_value = id
            .parse::<u64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(id.clone()));
        fields.insert("id".to_string(), id_value);
        let media = Value::Object(fields);

        for (list, flagged) in lists.iter_mut().zip(flags) {
            if flagged {
                list.push(media.clone());
            }
        }
    }

    let [want, watched, watching] = lists;
    root.insert(
        "movies".to_string(),
        json!({
            "want": want,
            "watched": watched,
            "watching": watching,
            "reviews": reviews,
        }),
    );
    root.remove("activity");

    let mut shows = take_object(root, "tvShows");
    shows.entry("episodes").or_insert_with(|| json!({}));
    shows.entry("seasonReviews").or_insert_with(|| json!({}));
    root.insert("tvShows".to_string(), Value::Object(shows));

    let mut search = take_object(root, "search");
    search.entry("recent").or_insert_with(|| json!([]));
    root.insert("search".to_string(), Value::Object(search));
    Ok(())
}

/// 1.1 -> 1.2
///
/// Entries tagged `media_type: "tv"` move out of the movie lists into a
/// parallel `tvShows` structure. Movies lose their `watching` list; movie
/// entries in it are dropped with it.
pub(super) fn v1_1_to_v1_2(data: &mut Value) -> Result<(), String> {
    let root = root(data)?;
    let mut movies = take_object(root, "movies");
    let mut shows = take_object(root, "tvShows");

    for status in MOVIE_STATUSES {
        let (tv, films): (Vec<Value>, Vec<Value>) = take_array(&mut movies, status)
            .into_iter()
            .partition(|item| item.get("media_type").and_then(Value::as_str) == Some("tv"));

        let mut existing = take_array(&mut shows, status);
        existing.extend(tv);
        shows.insert(status.to_string(), Value::Array(existing));

        if status != "watching" {
            movies.insert(status.to_string(), Value::Array(films));
        }
    }
    for status in SHOW_STATUSES {
        shows.entry(status).or_insert_with(|| json!([]));
    }

    root.insert("movies".to_string(), Value::Object(movies));
    root.insert("tvShows".to_string(), Value::Object(shows));
    Ok(())
}

/// 1.2 -> 1.3
///
/// List entries collapse to bare numeric ids, recent searches keep only the
/// newest ten, and the activity log is dropped (again).
pub(super) fn v1_2_to_v1_3(data: &mut Value) -> Result<(), String> {
    let root = root(data)?;

    let sections: [(&str, &[&str]); 2] = [
        ("movies", &["want", "watched"]),
        ("tvShows", &SHOW_STATUSES),
    ];
    for (section, statuses) in sections {
        let Some(Value::Object(section)) = root.get_mut(section) else {
            continue;
        };
        for status in statuses {
            if let Some(Value::Array(items)) = section.get_mut(*status) {
                *items = items.iter().filter_map(entry_id).map(Value::from).collect();
            }
        }
    }

    if let Some(Value::Array(recent)) = root
        .get_mut("search")
        .and_then(|search| search.get_mut("recent"))
    {
        let excess = recent.len().saturating_sub(RECENT_SEARCH_KEEP);
        recent.drain(..excess);
    }

    root.remove("activity");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v1_0_flattens_movie_entries() {
        let mut data = json!({
            "movies": {
                "5": {"want": true, "title": "A"},
                "6": {"watched": true, "rating": 9, "review": "wow", "date": 1000},
                "7": {"watching": true}
            },
            "activity": [{"type": "add"}]
        });
        v1_0_to_v1_1(&mut data).unwrap();

        assert_eq!(data["movies"]["want"], json!([{"id": 5, "title": "A"}]));
        assert_eq!(data["movies"]["watched"], json!([{"id": 6}]));
        assert_eq!(data["movies"]["watching"], json!([{"id": 7}]));
        assert_eq!(
            data["movies"]["reviews"]["6"],
            json!({"rating": 9, "text": "wow", "date": 1000})
        );
        assert!(data.get("activity").is_none());
        assert_eq!(data["tvShows"]["episodes"], json!({}));
        assert_eq!(data["search"]["recent"], json!([]));
    }

    #[test]
    fn test_v1_0_text_only_review_gets_zero_rating() {
        let mut data = json!({"movies": {"1": {"review": "meh"}}});
        v1_0_to_v1_1(&mut data).unwrap();
        assert_eq!(data["movies"]["reviews"]["1"]["rating"], 0);
    }

    #[test]
    fn test_v1_1_splits_tv_entries() {
        let mut data = json!({
            "movies": {
                "want": [{"id": 1, "media_type": "tv"}, {"id": 2}],
                "watched": [],
                "watching": [{"id": 3, "media_type": "tv"}, {"id": 4}]
            }
        });
        v1_1_to_v1_2(&mut data).unwrap();

        assert_eq!(data["movies"]["want"], json!([{"id": 2}]));
        assert!(data["movies"].get("watching").is_none());
        assert_eq!(data["tvShows"]["want"], json!([{"id": 1, "media_type": "tv"}]));
        assert_eq!(
            data["tvShows"]["watching"],
            json!([{"id": 3, "media_type": "tv"}])
        );
        assert_eq!(data["tvShows"]["watched"], json!([]));
    }

    #[test]
    fn test_v1_2_collapses_entries_and_trims_searches() {
        let searches: Vec<String> = (0..15).map(|n| format!("q{}", n)).collect();
        let mut data = json!({
            "movies": {"want": [{"id": 1}, "2", 3, null, {"title": "no id"}], "watched": []},
            "tvShows": {"want": [], "watching": [{"id": "9"}], "watched": []},
            "search": {"recent": searches},
            "activity": []
        });
        v1_2_to_v1_3(&mut data).unwrap();

        assert_eq!(data["movies"]["want"], json!([1, 2, 3]));
        assert_eq!(data["tvShows"]["watching"], json!([9]));
        let recent = data["search"]["recent"].as_array().unwrap();
        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0], "q5");
        assert_eq!(recent[9], "q14");
        assert!(data.get("activity").is_none());
    }

    #[test]
    fn test_steps_reject_non_object_roots() {
        let mut data = json!([1, 2]);
        assert!(v1_0_to_v1_1(&mut data).is_err());
        assert!(v1_1_to_v1_2(&mut data).is_err());
        assert!(v1_2_to_v1_3(&mut data).is_err());
    }
}
