//! # Compact Episode Encoding
//!
//! Watched episodes of a season are stored either as an explicit sorted array
//! (`[2, 5, 6]`) or, when every episode from 1 through N is watched, as the
//! two-element range shorthand `[1, N]`.
//!
//! A two-element array starting at 1 is always read as a range. `{1, 2}` is
//! the same set either way. A genuine two-episode set `{1, N}` with `N >= 3`
//! would collide with the shorthand, so it is written in reverse as `[N, 1]`;
//! readers sort explicit arrays, which restores `{1, N}`.
//!
//! The shorthand is only written for `N >= 3`.
//!
//! Episode numbers above [`MAX_EPISODE`] are treated as corrupt. A range
//! past the cap decodes to nothing rather than being expanded.

/// Highest episode number accepted in a season.
pub const MAX_EPISODE: u32 = 10_000;

/// Encode a set of watched episodes into its stored form.
pub fn encode(episodes: &[u32]) -> Vec<u32> {
    let mut set = episodes.to_vec();
    set.sort_unstable();
    set.dedup();

    let n = set.len();
    if n >= 3 && set[0] == 1 && set[n - 1] as usize == n {
        return vec![1, n as u32];
    }
    if n == 2 && set[0] == 1 && set[1] > 2 {
        return vec![set[1], 1];
    }
    set
}

/// Expand a stored form back into the sorted set of watched episodes.
pub fn decode(stored: &[u32]) -> Vec<u32> {
    if is_range(stored) {
        if stored[1] > MAX_EPISODE {
            return Vec::new();
        }
        return (1..=stored[1]).collect();
    }
    let mut set = stored.to_vec();
    set.sort_unstable();
    set.dedup();
    set
}

/// Bring a stored form to the shape [`encode`] would write, without
/// expanding ranges. `None` when the stored form is out of bounds.
pub fn canonical(stored: &[u32]) -> Option<Vec<u32>> {
    if is_range(stored) {
        return match stored[1] {
            n if n > MAX_EPISODE => None,
            n if n >= 3 => Some(vec![1, n]),
            n => Some((1..=n).collect()),
        };
    }
    if stored.iter().any(|n| *n > MAX_EPISODE) {
        return None;
    }
    Some(encode(stored))
}

fn is_range(stored: &[u32]) -> bool {
    stored.len() == 2 && stored[0] == 1 && stored[1] >= 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_prefix_uses_range_shorthand() {
        assert_eq!(encode(&[1, 2, 3]), vec![1, 3]);
        assert_eq!(decode(&[1, 3]), vec![1, 2, 3]);
    }

    #[test]
    fn test_unordered_input_is_normalized() {
        assert_eq!(encode(&[3, 1, 2, 2]), vec![1, 3]);
        assert_eq!(encode(&[7, 2, 5]), vec![2, 5, 7]);
    }

    #[test]
    fn test_gap_keeps_explicit_array() {
        assert_eq!(encode(&[1, 2, 4]), vec![1, 2, 4]);
        assert_eq!(decode(&[1, 2, 4]), vec![1, 2, 4]);
    }

    #[test]
    fn test_short_sets_are_stored_explicitly() {
        assert_eq!(encode(&[1]), vec![1]);
        assert_eq!(encode(&[1, 2]), vec![1, 2]);
        assert_eq!(decode(&[1, 2]), vec![1, 2]);
        assert_eq!(decode(&[1]), vec![1]);
    }

    #[test]
    fn test_one_and_n_does_not_collide_with_range() {
        let stored = encode(&[1, 9]);
        assert_eq!(stored, vec![9, 1]);
        assert_eq!(decode(&stored), vec![1, 9]);
    }

    #[test]
    fn test_legacy_range_is_expanded() {
        assert_eq!(decode(&[1, 10]).len(), 10);
    }

    #[test]
    fn test_range_past_cap_is_not_expanded() {
        assert!(decode(&[1, 4_000_000_000]).is_empty());
        assert_eq!(canonical(&[1, 4_000_000_000]), None);
        assert_eq!(decode(&[1, MAX_EPISODE]).len(), MAX_EPISODE as usize);
    }

    #[test]
    fn test_canonical_keeps_ranges_compact() {
        assert_eq!(canonical(&[1, 500]), Some(vec![1, 500]));
        assert_eq!(canonical(&[1, 2]), Some(vec![1, 2]));
        assert_eq!(canonical(&[3, 2, 1, 2]), Some(vec![1, 3]));
        assert_eq!(canonical(&[9, 1]), Some(vec![9, 1]));
        assert_eq!(canonical(&[4, 20_000]), None);
        assert_eq!(canonical(&[]), Some(vec![]));
    }

    #[test]
    fn test_empty_set() {
        assert!(encode(&[]).is_empty());
        assert!(decode(&[]).is_empty());
    }

    #[test]
    fn test_range_inverse_for_full_seasons() {
        for n in 1..=30u32 {
            let full: Vec<u32> = (1..=n).collect();
            assert_eq!(decode(&encode(&full)), full);
        }
    }
}
