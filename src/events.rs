//! Core event types for the notification relay
//!
//! This module defines the value objects that flow through the pipeline:
//! the severity of an observed write, the kind of a notification, the
//! notification itself and the records kept for every dispatch decision.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Timestamp type for consistent time handling across the application
pub type Timestamp = DateTime<Utc>;

/// Source tag stamped on every notification payload
pub const NOTIFICATION_SOURCE: &str = "Console.ext";

/// Severity of a write observed on the diagnostic sink
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational output
    Info,
    /// Warning output
    Warn,
    /// Error output
    Error,
}

impl Severity {
    /// Whether messages at this severity are eligible for keyword escalation
    pub fn can_escalate(self) -> bool {
        matches!(self, Severity::Warn | Severity::Error)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "info" | "log" => Ok(Severity::Info),
            "warn" | "warning" => Ok(Severity::Warn),
            "error" => Ok(Severity::Error),
            other => Err(format!("unknown severity '{}'", other)),
        }
    }
}

/// Semantic category of a notification
///
/// Drives channel eligibility: only `Critical` and `Urgent` may place calls.
/// Kinds compare by tag, so a `Custom` holding a reserved tag such as
/// `"critical"` behaves exactly like the named variant.
#[derive(Debug, Clone)]
pub enum NotificationKind {
    /// Manual notification raised through the notify entry point
    Text,
    /// Escalated warning or error containing a critical keyword
    Critical,
    /// Caller-raised urgent notification
    Urgent,
    /// Any other caller-supplied tag
    Custom(String),
}

impl NotificationKind {
    pub fn as_str(&self) -> &str {
        match self {
            NotificationKind::Text => "text",
            NotificationKind::Critical => "critical",
            NotificationKind::Urgent => "urgent",
            NotificationKind::Custom(tag) => tag,
        }
    }

    /// Named variant for reserved tags, otherwise unchanged
    pub fn normalized(self) -> Self {
        match self {
            NotificationKind::Custom(tag) => NotificationKind::from(tag.as_str()),
            other => other,
        }
    }

    /// Whether this kind is allowed to trigger a voice call
    pub fn warrants_call(&self) -> bool {
        matches!(self.as_str(), "critical" | "urgent")
    }
}

impl PartialEq for NotificationKind {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for NotificationKind {}

impl std::hash::Hash for NotificationKind {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl From<&str> for NotificationKind {
    fn from(tag: &str) -> Self {
        match tag {
            "text" => NotificationKind::Text,
            "critical" => NotificationKind::Critical,
            "urgent" => NotificationKind::Urgent,
            other => NotificationKind::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for NotificationKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for NotificationKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(NotificationKind::from(tag.as_str()))
    }
}

/// Serialize timestamps as ISO-8601 with millisecond precision and a `Z` suffix
mod iso_millis {
    use super::Timestamp;
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &Timestamp, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Timestamp, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

/// A single notification attempt
///
/// Serializes to the generic webhook body `{type, message, timestamp, source, id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub message: String,
    #[serde(with = "iso_millis")]
    pub timestamp: Timestamp,
    pub source: String,
    pub id: String,
}

impl Notification {
    /// Create a notification stamped with the given time and a fresh identifier
    pub fn new(kind: NotificationKind, message: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            kind,
            message: message.into(),
            timestamp,
            source: NOTIFICATION_SOURCE.to_string(),
            id: generate_id(timestamp),
        }
    }

    /// ISO-8601 rendering of the creation timestamp
    pub fn iso_timestamp(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

static ID_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Generate a process-unique identifier
///
/// The millisecond component keeps ids roughly sortable; the sequence
/// component keeps them distinct when several are issued within one millisecond.
pub fn generate_id(timestamp: Timestamp) -> String {
    let seq = ID_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let millis = u64::try_from(timestamp.timestamp_millis()).unwrap_or(0);
    format!("{}-{}", to_base36(millis), to_base36(seq))
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Why a notification was not delivered
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UndeliveredReason {
    RateLimited,
}

/// A notification that was denied admission
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UndeliveredNotification {
    #[serde(flatten)]
    pub notification: Notification,
    pub reason: UndeliveredReason,
    #[serde(with = "iso_millis")]
    pub blocked_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_notification_serializes_to_webhook_shape() {
        let ts = DateTime::parse_from_rfc3339("2024-03-01T12:00:00.123Z")
            .unwrap()
            .with_timezone(&Utc);
        let notification = Notification::new(NotificationKind::Critical, "disk on fire", ts);

        let value = serde_json::to_value(&notification).unwrap();
        assert_eq!(value["type"], "critical");
        assert_eq!(value["message"], "disk on fire");
        assert_eq!(value["timestamp"], "2024-03-01T12:00:00.123Z");
        assert_eq!(value["source"], "Console.ext");
        assert!(value["id"].as_str().is_some());
        assert_eq!(value.as_object().unwrap().len(), 5);
    }

    #[test]
    fn test_undelivered_serializes_flat() {
        let now = Utc::now();
        let record = UndeliveredNotification {
            notification: Notification::new(NotificationKind::Text, "hello", now),
            reason: UndeliveredReason::RateLimited,
            blocked_at: now,
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["type"], "text");
        assert_eq!(value["reason"], "rate_limited");
        assert!(value["blockedAt"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_ids_unique_within_same_millisecond() {
        let now = Utc::now();
        let ids: HashSet<String> = (0..10_000).map(|_| generate_id(now)).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn test_kind_round_trips_custom_tag() {
        assert_eq!(NotificationKind::from("urgent"), NotificationKind::Urgent);
        assert_eq!(
            NotificationKind::from("deploy"),
            NotificationKind::Custom("deploy".to_string())
        );
        assert_eq!(NotificationKind::Custom("deploy".to_string()).as_str(), "deploy");
    }

    #[test]
    fn test_custom_with_reserved_tag_matches_named_kind() {
        let custom = NotificationKind::Custom("critical".to_string());

        assert_eq!(custom, NotificationKind::Critical);
        assert!(custom.warrants_call());
        assert!(matches!(custom.clone().normalized(), NotificationKind::Critical));

        let mut keys = HashSet::new();
        keys.insert(NotificationKind::Critical);
        assert!(!keys.insert(custom));
        assert_ne!(
            NotificationKind::Custom("deploy".to_string()),
            NotificationKind::Urgent
        );
    }

    #[test]
    fn test_only_critical_and_urgent_warrant_calls() {
        assert!(NotificationKind::Critical.warrants_call());
        assert!(NotificationKind::Urgent.warrants_call());
        assert!(!NotificationKind::Text.warrants_call());
        assert!(!NotificationKind::Custom("page".to_string()).warrants_call());
    }

    #[test]
    fn test_severity_parsing() {
        assert_eq!("warn".parse::<Severity>().unwrap(), Severity::Warn);
        assert_eq!("WARNING".parse::<Severity>().unwrap(), Severity::Warn);
        assert_eq!("log".parse::<Severity>().unwrap(), Severity::Info);
        assert!("fatal".parse::<Severity>().is_err());
        assert!(!Severity::Info.can_escalate());
        assert!(Severity::Error.can_escalate());
    }

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }
}
