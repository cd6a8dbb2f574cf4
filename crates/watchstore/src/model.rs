use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type MediaId = u64;

/// Schema version the migration pipeline normalizes legacy blobs to.
pub const LEGACY_VERSION: &str = "1.3";

/// Schema version of the sharded per-key layout.
pub const STORE_VERSION: &str = "1.4";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MovieStatus {
    Want,
    Watched,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShowStatus {
    Want,
    Watching,
    Watched,
}

/// One of the five media lists. Movies have no `Watching` status, so the
/// type cannot name a movies-watching list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListType {
    Movies(MovieStatus),
    TvShows(ShowStatus),
}

impl ListType {
    pub const ALL: [ListType; 5] = [
        ListType::Movies(MovieStatus::Want),
        ListType::Movies(MovieStatus::Watched),
        ListType::TvShows(ShowStatus::Want),
        ListType::TvShows(ShowStatus::Watching),
        ListType::TvShows(ShowStatus::Watched),
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ListType::Movies(MovieStatus::Want) => "movies_want",
            ListType::Movies(MovieStatus::Watched) => "movies_watched",
            ListType::TvShows(ShowStatus::Want) => "tvshows_want",
            ListType::TvShows(ShowStatus::Watching) => "tvshows_watching",
            ListType::TvShows(ShowStatus::Watched) => "tvshows_watched",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|list| list.as_str() == s)
    }

    /// Status name as used in the legacy blob (`want`, `watching`, `watched`).
    pub fn status_name(&self) -> &'static str {
        match self {
            ListType::Movies(MovieStatus::Want) | ListType::TvShows(ShowStatus::Want) => "want",
            ListType::TvShows(ShowStatus::Watching) => "watching",
            ListType::Movies(MovieStatus::Watched) | ListType::TvShows(ShowStatus::Watched) => {
                "watched"
            }
        }
    }

    /// The other lists of the same media kind.
    pub fn siblings(&self) -> Vec<ListType> {
        Self::ALL
            .into_iter()
            .filter(|other| other != self && other.same_kind(self))
            .collect()
    }

    fn same_kind(&self, other: &ListType) -> bool {
        matches!(
            (self, other),
            (ListType::Movies(_), ListType::Movies(_)) | (ListType::TvShows(_), ListType::TvShows(_))
        )
    }
}

impl fmt::Display for ListType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub version: String,
    #[serde(rename = "userId")]
    pub user_id: String,
}

impl Meta {
    pub fn current(user_id: &str) -> Self {
        Self {
            version: STORE_VERSION.to_string(),
            user_id: user_id.to_string(),
        }
    }
}

/// A rating left on a movie or a single season.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub rating: f64,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default = "epoch", with = "timestamp")]
    pub date: DateTime<Utc>,
}

impl ReviewRecord {
    pub fn new(rating: f64, text: Option<String>) -> Self {
        Self {
            rating,
            text,
            date: Utc::now(),
        }
    }
}

fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

/// Review dates are stored as epoch milliseconds. Older blobs carry RFC 3339
/// strings, which are accepted on read.
mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(date: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i64(date.timestamp_millis())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        match Value::deserialize(d)? {
            Value::Number(n) => {
                let millis = n
                    .as_i64()
                    .or_else(|| n.as_f64().map(|f| f as i64))
                    .ok_or_else(|| D::Error::custom("timestamp out of range"))?;
                DateTime::from_timestamp_millis(millis)
                    .ok_or_else(|| D::Error::custom("timestamp out of range"))
            }
            Value::String(s) => DateTime::parse_from_rfc3339(&s)
                .map(|d| d.with_timezone(&Utc))
                .map_err(D::Error::custom),
            Value::Null => Ok(super::epoch()),
            other => Err(D::Error::custom(format!("invalid timestamp: {other}"))),
        }
    }
}

/// Composite key for season reviews: `"<showId>_<season>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeasonKey {
    pub show_id: MediaId,
    pub season: u32,
}

impl SeasonKey {
    pub fn new(show_id: MediaId, season: u32) -> Self {
        Self { show_id, season }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let (show, season) = s.split_once('_')?;
        Some(Self {
            show_id: show.parse().ok()?,
            season: season.parse().ok()?,
        })
    }
}

impl fmt::Display for SeasonKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.show_id, self.season)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_type_names_roundtrip() {
        for list in ListType::ALL {
            assert_eq!(ListType::parse(list.as_str()), Some(list));
        }
        assert_eq!(ListType::parse("movies_watching"), None);
    }

    #[test]
    fn test_siblings_stay_within_kind() {
        let siblings = ListType::TvShows(ShowStatus::Watched).siblings();
        assert_eq!(
            siblings,
            vec![
                ListType::TvShows(ShowStatus::Want),
                ListType::TvShows(ShowStatus::Watching)
            ]
        );
        assert_eq!(
            ListType::Movies(MovieStatus::Want).siblings(),
            vec![ListType::Movies(MovieStatus::Watched)]
        );
    }

    #[test]
    fn test_season_key_format() {
        let key = SeasonKey::new(1399, 3);
        assert_eq!(key.to_string(), "1399_3");
        assert_eq!(SeasonKey::parse("1399_3"), Some(key));
        assert_eq!(SeasonKey::parse("1399"), None);
        assert_eq!(SeasonKey::parse("a_b"), None);
    }

    #[test]
    fn test_review_accepts_millis_and_rfc3339() {
        let from_millis: ReviewRecord =
            serde_json::from_str(r#"{"rating":8,"text":"good","date":1700000000000}"#).unwrap();
        assert_eq!(from_millis.date.timestamp_millis(), 1_700_000_000_000);

        let from_string: ReviewRecord =
            serde_json::from_str(r#"{"rating":7.5,"date":"2024-01-01T00:00:00Z"}"#).unwrap();
        assert_eq!(from_string.text, None);
        assert_eq!(from_string.date.timestamp(), 1_704_067_200);
    }

    #[test]
    fn test_review_without_date_defaults_to_epoch() {
        let review: ReviewRecord = serde_json::from_str(r#"{"rating":5}"#).unwrap();
        assert_eq!(review.date.timestamp_millis(), 0);
    }

    #[test]
    fn test_review_serializes_date_as_millis() {
        let review = ReviewRecord {
            rating: 9.0,
            text: None,
            date: DateTime::from_timestamp_millis(1234).unwrap(),
        };
        let json = serde_json::to_value(&review).unwrap();
        assert_eq!(json["date"], 1234);
    }

    #[test]
    fn test_meta_uses_camel_case_user_id() {
        let meta = Meta::current("42");
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["userId"], "42");
        assert_eq!(json["version"], STORE_VERSION);
    }
}
