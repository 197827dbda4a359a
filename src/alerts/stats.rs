use crate::events::{Notification, Timestamp, UndeliveredNotification, UndeliveredReason};
use serde::Serialize;

/// Snapshot of delivery statistics
///
/// The record lists are copies; mutating the tracker afterwards does not
/// affect a snapshot already taken.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationStats {
    pub sent: usize,
    pub undelivered: usize,
    pub sent_notifications: Vec<Notification>,
    pub undelivered_notifications: Vec<UndeliveredNotification>,
}

/// Append-only bookkeeping of every dispatch decision
///
/// A notification counts as sent once admitted, whatever happens on the
/// channels afterwards.
#[derive(Debug, Default)]
pub struct StatsTracker {
    sent: Vec<Notification>,
    undelivered: Vec<UndeliveredNotification>,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sent(&mut self, notification: Notification) {
        self.sent.push(notification);
    }

    pub fn record_undelivered(
        &mut self,
        notification: Notification,
        reason: UndeliveredReason,
        blocked_at: Timestamp,
    ) {
        self.undelivered.push(UndeliveredNotification {
            notification,
            reason,
            blocked_at,
        });
    }

    pub fn sent_count(&self) -> usize {
        self.sent.len()
    }

    pub fn undelivered_count(&self) -> usize {
        self.undelivered.len()
    }

    /// Total attempts since construction or the last clear
    pub fn attempts(&self) -> usize {
        self.sent.len() + self.undelivered.len()
    }

    pub fn snapshot(&self) -> NotificationStats {
        NotificationStats {
            sent: self.sent.len(),
            undelivered: self.undelivered.len(),
            sent_notifications: self.sent.clone(),
            undelivered_notifications: self.undelivered.clone(),
        }
    }

    /// Drop both record lists
    ///
    /// The engine pairs this with clearing rate-limit history; see
    /// `NotificationEngine::clear_stats`.
    pub fn clear(&mut self) {
        self.sent.clear();
        self.undelivered.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NotificationKind;
    use chrono::Utc;

    #[test]
    fn test_counts_and_attempts() {
        let mut tracker = StatsTracker::new();
        let now = Utc::now();

        tracker.record_sent(Notification::new(NotificationKind::Critical, "a", now));
        tracker.record_sent(Notification::new(NotificationKind::Critical, "b", now));
        tracker.record_undelivered(
            Notification::new(NotificationKind::Critical, "c", now),
            UndeliveredReason::RateLimited,
            now,
        );

        assert_eq!(tracker.sent_count(), 2);
        assert_eq!(tracker.undelivered_count(), 1);
        assert_eq!(tracker.attempts(), 3);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut tracker = StatsTracker::new();
        tracker.record_sent(Notification::new(NotificationKind::Text, "first", Utc::now()));

        let snapshot = tracker.snapshot();
        tracker.record_sent(Notification::new(NotificationKind::Text, "second", Utc::now()));

        assert_eq!(snapshot.sent, 1);
        assert_eq!(snapshot.sent_notifications.len(), 1);
        assert_eq!(snapshot.sent_notifications[0].message, "first");
        assert_eq!(tracker.sent_count(), 2);
    }

    #[test]
    fn test_clear() {
        let mut tracker = StatsTracker::new();
        let now = Utc::now();
        tracker.record_sent(Notification::new(NotificationKind::Text, "x", now));
        tracker.record_undelivered(
            Notification::new(NotificationKind::Text, "y", now),
            UndeliveredReason::RateLimited,
            now,
        );

        tracker.clear();

        assert_eq!(tracker.snapshot(), NotificationStats::default());
    }

    #[test]
    fn test_stats_serialization_shape() {
        let mut tracker = StatsTracker::new();
        tracker.record_sent(Notification::new(NotificationKind::Text, "x", Utc::now()));

        let value = serde_json::to_value(tracker.snapshot()).unwrap();
        assert_eq!(value["sent"], 1);
        assert_eq!(value["undelivered"], 0);
        assert!(value["sentNotifications"].is_array());
        assert!(value["undeliveredNotifications"].is_array());
    }
}
