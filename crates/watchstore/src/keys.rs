//! # Key Grammar
//!
//! Every physical key is `user_<userId>_<logicalName>`, with shards of a
//! grouped value stored as `user_<userId>_<logicalName>_g<index>`.
//!
//! The remote store accepts only `[A-Za-z0-9_-]` in key names. Keys are
//! normalized once, here, and the normalized form is used on both backends so
//! the two stores can be correlated.

use crate::model::ListType;
use std::fmt;

const GROUP_MARKER: &str = "_g";

/// Replace every character outside `[A-Za-z0-9_-]` with `_`.
pub fn normalize(key: &str) -> String {
    key.chars()
        .map(|c| if is_allowed(c) { c } else { '_' })
        .collect()
}

pub fn is_remote_safe(key: &str) -> bool {
    !key.is_empty() && key.chars().all(is_allowed)
}

fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// A conceptual storage slot that may span one key or many shards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogicalKey {
    Meta,
    List(ListKey),
    MovieReviews,
    SeasonReviews,
    Episodes,
    RecentSearches,
    /// Pre-sharding single-blob store, read once during the cutover.
    LegacyData,
}

/// Ordered wrapper so list keys can live in ordered maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListKey(u8);

impl ListKey {
    pub fn of(list: ListType) -> Self {
        let index = ListType::ALL
            .iter()
            .position(|l| *l == list)
            .unwrap_or_default();
        ListKey(index as u8)
    }

    pub fn list(&self) -> ListType {
        ListType::ALL[self.0 as usize]
    }
}

impl LogicalKey {
    pub fn list(list: ListType) -> Self {
        LogicalKey::List(ListKey::of(list))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalKey::Meta => "meta",
            LogicalKey::List(key) => key.list().as_str(),
            LogicalKey::MovieReviews => "movie_reviews",
            LogicalKey::SeasonReviews => "season_reviews",
            LogicalKey::Episodes => "episodes",
            LogicalKey::RecentSearches => "search_recent",
            LogicalKey::LegacyData => "data",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "meta" => Some(LogicalKey::Meta),
            "movie_reviews" => Some(LogicalKey::MovieReviews),
            "season_reviews" => Some(LogicalKey::SeasonReviews),
            "episodes" => Some(LogicalKey::Episodes),
            "search_recent" => Some(LogicalKey::RecentSearches),
            "data" => Some(LogicalKey::LegacyData),
            other => ListType::parse(other).map(LogicalKey::list),
        }
    }
}

impl fmt::Display for LogicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A physical key resolved back to its logical slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhysicalKey {
    pub logical: LogicalKey,
    pub group: Option<usize>,
}

/// Key namespace of one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    prefix: String,
}

impl Namespace {
    pub fn new(user_id: &str) -> Self {
        Self {
            prefix: normalize(&format!("user_{}_", user_id)),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn key(&self, logical: LogicalKey) -> String {
        format!("{}{}", self.prefix, logical.as_str())
    }

    pub fn group_key(&self, logical: LogicalKey, index: usize) -> String {
        format!("{}{}{}{}", self.prefix, logical.as_str(), GROUP_MARKER, index)
    }

    /// Resolve a physical key of this namespace. Foreign and unknown keys
    /// yield `None`.
    pub fn parse(&self, physical: &str) -> Option<PhysicalKey> {
        let rest = physical.strip_prefix(&self.prefix)?;
        if let Some(logical) = LogicalKey::parse(rest) {
            return Some(PhysicalKey {
                logical,
                group: None,
            });
        }
        let (name, index) = rest.rsplit_once(GROUP_MARKER)?;
        if index.is_empty() || !index.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        Some(PhysicalKey {
            logical: LogicalKey::parse(name)?,
            group: Some(index.parse().ok()?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MovieStatus, ShowStatus};

    #[test]
    fn test_normalize_replaces_foreign_characters() {
        assert_eq!(normalize("user_12:34_meta"), "user_12_34_meta");
        assert_eq!(normalize("user_é_x"), "user___x");
        assert_eq!(normalize("ok-key_1"), "ok-key_1");
    }

    #[test]
    fn test_remote_safe() {
        assert!(is_remote_safe("user_1_meta"));
        assert!(!is_remote_safe("user 1"));
        assert!(!is_remote_safe(""));
    }

    #[test]
    fn test_namespace_keys() {
        let ns = Namespace::new("42");
        assert_eq!(ns.key(LogicalKey::Meta), "user_42_meta");
        assert_eq!(
            ns.group_key(LogicalKey::MovieReviews, 3),
            "user_42_movie_reviews_g3"
        );
        assert_eq!(
            ns.key(LogicalKey::list(ListType::TvShows(ShowStatus::Watching))),
            "user_42_tvshows_watching"
        );
    }

    #[test]
    fn test_namespace_normalizes_user_id() {
        let ns = Namespace::new("a.b@c");
        assert_eq!(ns.prefix(), "user_a_b_c_");
    }

    #[test]
    fn test_parse_plain_and_grouped() {
        let ns = Namespace::new("7");
        assert_eq!(
            ns.parse("user_7_episodes"),
            Some(PhysicalKey {
                logical: LogicalKey::Episodes,
                group: None
            })
        );
        assert_eq!(
            ns.parse("user_7_movies_want_g12"),
            Some(PhysicalKey {
                logical: LogicalKey::list(ListType::Movies(MovieStatus::Want)),
                group: Some(12)
            })
        );
    }

    #[test]
    fn test_parse_rejects_foreign_and_unknown_keys() {
        let ns = Namespace::new("7");
        assert_eq!(ns.parse("user_8_meta"), None);
        assert_eq!(ns.parse("user_7_unknown"), None);
        assert_eq!(ns.parse("user_7_episodes_gx"), None);
        assert_eq!(ns.parse("user_7_episodes_g"), None);
    }

    #[test]
    fn test_list_key_roundtrip() {
        for list in ListType::ALL {
            assert_eq!(ListKey::of(list).list(), list);
        }
    }
}
