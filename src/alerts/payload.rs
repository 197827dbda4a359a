//! Wire payloads for the delivery channels
//!
//! Field names and values match the webhook contract consumed by existing
//! text/call gateways and the log-aggregation intake.

use crate::events::{Notification, NotificationKind};
use serde::Serialize;

/// Source tag used by the log-aggregation channel
pub const LOG_SOURCE: &str = "console-ext";

/// Header carrying the log-aggregation API key
pub const API_KEY_HEADER: &str = "DD-API-KEY";

/// Action requested from the text/call gateway
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GatewayAction {
    SendText,
    MakeCall,
}

/// Webhook body for text and call requests
///
/// The notification fields are inlined alongside `action` and `to`.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayPayload<'a> {
    #[serde(flatten)]
    pub notification: &'a Notification,
    pub action: GatewayAction,
    pub to: Option<&'a str>,
}

impl<'a> GatewayPayload<'a> {
    pub fn new(notification: &'a Notification, action: GatewayAction, to: Option<&'a str>) -> Self {
        Self {
            notification,
            action,
            to,
        }
    }
}

/// Log severity understood by the log-aggregation intake
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Info,
}

impl From<&NotificationKind> for LogLevel {
    fn from(kind: &NotificationKind) -> Self {
        if *kind == NotificationKind::Critical {
            LogLevel::Error
        } else {
            LogLevel::Info
        }
    }
}

/// Body sent to the log-aggregation intake
#[derive(Debug, Clone, Serialize)]
pub struct LogIntakePayload {
    pub message: String,
    pub level: LogLevel,
    pub timestamp: String,
    pub source: &'static str,
    pub tags: Vec<String>,
}

impl From<&Notification> for LogIntakePayload {
    fn from(notification: &Notification) -> Self {
        Self {
            message: notification.message.clone(),
            level: LogLevel::from(&notification.kind),
            timestamp: notification.iso_timestamp(),
            source: LOG_SOURCE,
            tags: vec![
                format!("type:{}", notification.kind),
                format!("source:{}", LOG_SOURCE),
            ],
        }
    }
}
