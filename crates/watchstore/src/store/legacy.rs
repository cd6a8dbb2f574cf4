//! Conversions between the cache and the single-blob v1.3 shape.
//!
//! ```text
//! {
//!   "version": "1.3",
//!   "movies":  { "want": [id], "watched": [id], "reviews": { "<id>": review } },
//!   "tvShows": { "want": [id], "watching": [id], "watched": [id],
//!                "episodes": { "<show>": { "<season>": [ep] } },
//!                "seasonReviews": { "<show>_<season>": review } },
//!   "search":  { "recent": [string] }
//! }
//! ```
//!
//! Episode arrays carry the same compact encoding as the sharded store, so an
//! export followed by an import reproduces the cache exactly.

use super::cache::{self, Cache};
use crate::model::{ListType, MovieStatus, ShowStatus, LEGACY_VERSION};
use serde_json::{json, Map, Value};

const MOVIE_LISTS: [(MovieStatus, &str); 2] =
    [(MovieStatus::Want, "want"), (MovieStatus::Watched, "watched")];

const SHOW_LISTS: [(ShowStatus, &str); 3] = [
    (ShowStatus::Want, "want"),
    (ShowStatus::Watching, "watching"),
    (ShowStatus::Watched, "watched"),
];

fn section<'a>(data: &'a Value, name: &str) -> Option<&'a Map<String, Value>> {
    data.get(name).and_then(Value::as_object)
}

fn array_in<'a>(section: Option<&'a Map<String, Value>>, name: &str) -> &'a [Value] {
    section
        .and_then(|s| s.get(name))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn object_in(section: Option<&Map<String, Value>>, name: &str) -> Map<String, Value> {
    section
        .and_then(|s| s.get(name))
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

impl Cache {
    /// Build a cache from a v1.3 blob. Meta is left unset.
    pub(crate) fn from_legacy(data: &Value) -> Self {
        let movies = section(data, "movies");
        let shows = section(data, "tvShows");
        let search = section(data, "search");

        let mut cache = Cache::default();
        for (status, name) in MOVIE_LISTS {
            cache.lists.insert(
                ListType::Movies(status),
                cache::unique_ids(array_in(movies, name)),
            );
        }
        for (status, name) in SHOW_LISTS {
            cache.lists.insert(
                ListType::TvShows(status),
                cache::unique_ids(array_in(shows, name)),
            );
        }
        cache.movie_reviews = cache::movie_reviews_from(&object_in(movies, "reviews"));
        cache.season_reviews = cache::season_reviews_from(&object_in(shows, "seasonReviews"));
        cache.episodes = cache::episodes_from(&object_in(shows, "episodes"));
        cache.recent_searches = cache::strings_from(array_in(search, "recent"));
        cache
    }

    /// Project the cache back into a v1.3 blob.
    pub(crate) fn to_legacy(&self) -> Result<Value, serde_json::Error> {
        let ids = |list: ListType| json!(self.list(list));
        Ok(json!({
            "version": LEGACY_VERSION,
            "movies": {
                "want": ids(ListType::Movies(MovieStatus::Want)),
                "watched": ids(ListType::Movies(MovieStatus::Watched)),
                "reviews": self.movie_reviews_json()?,
            },
            "tvShows": {
                "want": ids(ListType::TvShows(ShowStatus::Want)),
                "watching": ids(ListType::TvShows(ShowStatus::Watching)),
                "watched": ids(ListType::TvShows(ShowStatus::Watched)),
                "episodes": self.episodes_json(),
                "seasonReviews": self.season_reviews_json()?,
            },
            "search": { "recent": self.recent_searches },
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SeasonKey;

    fn sample() -> Value {
        json!({
            "version": "1.3",
            "movies": {
                "want": [1, 2, 2],
                "watched": [3],
                "reviews": {"3": {"rating": 9, "text": "great", "date": 1700000000000u64}}
            },
            "tvShows": {
                "want": [],
                "watching": [10],
                "watched": [],
                "episodes": {"10": {"1": [1, 2, 3], "2": [4]}},
                "seasonReviews": {"10_1": {"rating": 7, "text": null, "date": 0}}
            },
            "search": {"recent": ["dune", "alien"]}
        })
    }

    #[test]
    fn test_from_legacy_fills_every_collection() {
        let cache = Cache::from_legacy(&sample());
        assert_eq!(cache.list(ListType::Movies(MovieStatus::Want)), &[1, 2]);
        assert_eq!(cache.list(ListType::TvShows(ShowStatus::Watching)), &[10]);
        assert_eq!(cache.movie_reviews[&3].text.as_deref(), Some("great"));
        assert!(cache.season_reviews.contains_key(&SeasonKey::new(10, 1)));
        assert_eq!(cache.episodes[&10][&1], vec![1, 3]);
        assert_eq!(cache.recent_searches, vec!["dune", "alien"]);
        assert!(cache.meta.is_none());
    }

    #[test]
    fn test_from_legacy_tolerates_missing_sections() {
        let cache = Cache::from_legacy(&json!({"version": "1.3"}));
        assert!(cache.movie_reviews.is_empty());
        assert!(cache.list(ListType::Movies(MovieStatus::Want)).is_empty());
    }

    #[test]
    fn test_legacy_export_reimports_identically() {
        let cache = Cache::from_legacy(&sample());
        let exported = cache.to_legacy().unwrap();
        assert_eq!(exported["version"], LEGACY_VERSION);
        assert_eq!(exported["tvShows"]["episodes"]["10"]["1"], json!([1, 3]));

        let again = Cache::from_legacy(&exported);
        assert_eq!(again.to_legacy().unwrap(), exported);
    }
}
