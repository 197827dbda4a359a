use crate::events::{NotificationKind, Timestamp};
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};

/// Rate-limit bucket: notification kind plus destination identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    pub kind: NotificationKind,
    /// Configured destination, empty when none is set
    pub destination: String,
}

impl RateLimitKey {
    pub fn new(kind: NotificationKind, destination: Option<&str>) -> Self {
        Self {
            kind,
            destination: destination.unwrap_or_default().to_string(),
        }
    }
}

/// Rate limiter for preventing notification spam
///
/// Keeps a sliding window of admitted timestamps per key. Stale entries are
/// pruned as part of each admission check; there is no background sweep.
/// Denied attempts are never recorded, so a key never holds more than
/// `max_per_window` timestamps inside its window.
#[derive(Debug)]
pub struct RateLimiter {
    /// Maximum number of notifications admitted per key within the window
    max_per_window: usize,
    /// Length of the sliding window
    window: Duration,
    /// Admitted timestamps per key, oldest first
    admitted: HashMap<RateLimitKey, VecDeque<Timestamp>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(5, Duration::milliseconds(60_000))
    }
}

impl RateLimiter {
    /// Create a new rate limiter
    ///
    /// # Arguments
    ///
    /// * `max_per_window` - Maximum number of notifications admitted per key
    /// * `window` - Length of the sliding window
    pub fn new(max_per_window: usize, window: Duration) -> Self {
        Self {
            max_per_window,
            window,
            admitted: HashMap::new(),
        }
    }

    /// Change the limits used by subsequent checks
    ///
    /// Existing history is kept and re-evaluated against the new window on
    /// the next check of each key.
    pub fn set_limits(&mut self, max_per_window: usize, window: Duration) {
        self.max_per_window = max_per_window;
        self.window = window;
    }

    /// Decide admission for `key` at the current time
    pub fn try_admit(&mut self, key: &RateLimitKey) -> bool {
        self.try_admit_at(key, Utc::now())
    }

    /// Decide admission for `key` at a specific time
    ///
    /// Timestamps at or before `now - window` are dropped. If fewer than
    /// `max_per_window` remain, `now` is appended and the candidate is admitted.
    pub fn try_admit_at(&mut self, key: &RateLimitKey, now: Timestamp) -> bool {
        let window_start = now
            .checked_sub_signed(self.window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let timestamps = self.admitted.entry(key.clone()).or_default();

        timestamps.retain(|&ts| ts > window_start);

        if timestamps.len() < self.max_per_window {
            timestamps.push_back(now);
            true
        } else {
            false
        }
    }

    /// Number of timestamps currently stored for `key`
    ///
    /// Does not prune, so the count may include entries that have gone stale
    /// since the last check of that key.
    pub fn stored_count(&self, key: &RateLimitKey) -> usize {
        self.admitted.get(key).map_or(0, VecDeque::len)
    }

    /// Number of keys with stored history
    pub fn key_count(&self) -> usize {
        self.admitted.len()
    }

    /// Forget all history
    pub fn clear(&mut self) {
        self.admitted.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(kind: NotificationKind) -> RateLimitKey {
        RateLimitKey::new(kind, Some("+15550100"))
    }

    #[test]
    fn test_rate_limiter_allows_within_limit() {
        let mut limiter = RateLimiter::new(3, Duration::seconds(60));
        let now = Utc::now();
        let k = key(NotificationKind::Critical);

        assert!(limiter.try_admit_at(&k, now));
        assert!(limiter.try_admit_at(&k, now));
        assert!(limiter.try_admit_at(&k, now));

        // Fourth should be blocked
        assert!(!limiter.try_admit_at(&k, now));
        assert_eq!(limiter.stored_count(&k), 3);
    }

    #[test]
    fn test_denied_attempts_are_not_recorded() {
        let mut limiter = RateLimiter::new(1, Duration::seconds(60));
        let now = Utc::now();
        let k = key(NotificationKind::Text);

        assert!(limiter.try_admit_at(&k, now));
        for i in 1..10 {
            assert!(!limiter.try_admit_at(&k, now + Duration::seconds(i)));
        }
        assert_eq!(limiter.stored_count(&k), 1);

        // Only the single admitted timestamp needs to expire
        assert!(limiter.try_admit_at(&k, now + Duration::seconds(61)));
    }

    #[test]
    fn test_rate_limiter_sliding_window() {
        let mut limiter = RateLimiter::new(2, Duration::seconds(60));
        let now = Utc::now();
        let k = key(NotificationKind::Critical);

        assert!(limiter.try_admit_at(&k, now));
        assert!(limiter.try_admit_at(&k, now + Duration::seconds(20)));
        assert!(!limiter.try_admit_at(&k, now + Duration::seconds(30)));

        // The first admission has left the window 61s later
        assert!(limiter.try_admit_at(&k, now + Duration::seconds(61)));
        assert!(!limiter.try_admit_at(&k, now + Duration::seconds(62)));
    }

    #[test]
    fn test_window_boundary_is_excluded() {
        let mut limiter = RateLimiter::new(1, Duration::seconds(60));
        let now = Utc::now();
        let k = key(NotificationKind::Critical);

        assert!(limiter.try_admit_at(&k, now));
        // Exactly at the boundary the old entry is pruned
        assert!(limiter.try_admit_at(&k, now + Duration::seconds(60)));
        // One millisecond before the boundary it still counts
        let mut limiter = RateLimiter::new(1, Duration::seconds(60));
        assert!(limiter.try_admit_at(&k, now));
        assert!(!limiter.try_admit_at(&k, now + Duration::milliseconds(59_999)));
    }

    #[test]
    fn test_denial_prunes_stale_entries() {
        let mut limiter = RateLimiter::new(2, Duration::seconds(60));
        let now = Utc::now();
        let k = key(NotificationKind::Critical);

        assert!(limiter.try_admit_at(&k, now));
        assert!(limiter.try_admit_at(&k, now + Duration::seconds(50)));
        assert_eq!(limiter.stored_count(&k), 2);

        assert!(limiter.try_admit_at(&k, now + Duration::seconds(70)));
        assert_eq!(limiter.stored_count(&k), 2);
        assert!(!limiter.try_admit_at(&k, now + Duration::seconds(75)));
        assert_eq!(limiter.stored_count(&k), 2);
    }

    #[test]
    fn test_keys_are_independent() {
        let mut limiter = RateLimiter::new(1, Duration::seconds(60));
        let now = Utc::now();

        assert!(limiter.try_admit_at(&key(NotificationKind::Critical), now));
        assert!(limiter.try_admit_at(&key(NotificationKind::Text), now));
        assert!(limiter.try_admit_at(
            &RateLimitKey::new(NotificationKind::Critical, Some("+15550199")),
            now
        ));
        assert!(!limiter.try_admit_at(&key(NotificationKind::Critical), now));
        assert_eq!(limiter.key_count(), 3);
    }

    #[test]
    fn test_custom_reserved_tag_shares_named_bucket() {
        let mut limiter = RateLimiter::new(1, Duration::seconds(60));
        let now = Utc::now();

        assert!(limiter.try_admit_at(&key(NotificationKind::Critical), now));
        assert!(!limiter.try_admit_at(
            &key(NotificationKind::Custom("critical".to_string())),
            now
        ));
        assert_eq!(limiter.key_count(), 1);
    }

    #[test]
    fn test_clear_forgets_history() {
        let mut limiter = RateLimiter::new(1, Duration::seconds(60));
        let k = key(NotificationKind::Critical);

        assert!(limiter.try_admit(&k));
        assert!(!limiter.try_admit(&k));
        limiter.clear();
        assert_eq!(limiter.key_count(), 0);
        assert!(limiter.try_admit(&k));
    }

    #[test]
    fn test_set_limits_applies_to_next_check() {
        let mut limiter = RateLimiter::new(1, Duration::seconds(60));
        let now = Utc::now();
        let k = key(NotificationKind::Critical);

        assert!(limiter.try_admit_at(&k, now));
        assert!(!limiter.try_admit_at(&k, now));
        limiter.set_limits(2, Duration::seconds(60));
        assert!(limiter.try_admit_at(&k, now));
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    // N+1 attempts inside one window admit exactly N
    #[quickcheck]
    fn prop_at_most_n_per_window(max: u8, window_secs: u16) -> bool {
        let max = (max % 20) as usize + 1;
        let window = Duration::seconds(i64::from(window_secs % 3600) + 1);
        let mut limiter = RateLimiter::new(max, window);
        let start = Utc::now();
        let k = RateLimitKey::new(NotificationKind::Critical, None);

        let admitted = (0..=max)
            .filter(|i| limiter.try_admit_at(&k, start + Duration::microseconds(*i as i64)))
            .count();

        admitted == max && limiter.stored_count(&k) == max
    }

    // Stored history within the trailing window never exceeds the maximum
    #[quickcheck]
    fn prop_window_count_bounded(offsets_ms: Vec<u16>, max: u8) -> bool {
        let max = (max % 5) as usize + 1;
        let window = Duration::milliseconds(1000);
        let mut limiter = RateLimiter::new(max, window);
        let start = Utc::now();
        let k = RateLimitKey::new(NotificationKind::Text, Some("dest"));

        let mut elapsed = 0i64;
        let mut admitted_at = Vec::new();
        for offset in offsets_ms {
            elapsed += i64::from(offset % 500);
            let now = start + Duration::milliseconds(elapsed);
            if limiter.try_admit_at(&k, now) {
                admitted_at.push(now);
            }
            let in_window = admitted_at.iter().filter(|&&ts| ts > now - window).count();
            if in_window > max {
                return false;
            }
        }
        true
    }
}
