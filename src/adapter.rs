//! Bridge between the `log` facade and the notification engine
//!
//! `NotifyingLogger` wraps any `log::Log` implementation. Records reach the
//! inner logger untouched; warnings and errors are then classified like
//! intercepted writes. `log_notifications` mirrors every dispatch decision
//! as a structured record.

use crate::alerts::payload::LOG_SOURCE;
use crate::engine::NotificationEngine;
use crate::events::{NotificationKind, Severity};
use chrono::{SecondsFormat, Utc};
use log::{info, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use serde_json::json;
use std::sync::Arc;

/// Target of the structured notification records
pub const NOTIFICATION_LOG_TARGET: &str = "console_relay::notifications";

/// Longest message excerpt included in a notification record
pub const MAX_LOGGED_MESSAGE_CHARS: usize = 200;

/// Records emitted by this crate are never escalated, so relay diagnostics
/// cannot feed back into the relay
const OWN_TARGET_PREFIX: &str = "console_relay";

/// `log::Log` decorator that escalates critical warnings and errors
pub struct NotifyingLogger<L> {
    inner: L,
    engine: Arc<NotificationEngine>,
}

impl<L: Log> NotifyingLogger<L> {
    pub fn new(inner: L, engine: Arc<NotificationEngine>) -> Self {
        Self { inner, engine }
    }

    /// Install as the global logger
    ///
    /// # Errors
    ///
    /// Returns `SetLoggerError` if a global logger is already installed.
    pub fn install(self, max_level: LevelFilter) -> Result<(), SetLoggerError>
    where
        L: 'static,
    {
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(max_level);
        Ok(())
    }

    pub fn engine(&self) -> &Arc<NotificationEngine> {
        &self.engine
    }
}

fn severity_of(level: Level) -> Severity {
    match level {
        Level::Error => Severity::Error,
        Level::Warn => Severity::Warn,
        _ => Severity::Info,
    }
}

impl<L: Log> Log for NotifyingLogger<L> {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        self.inner.log(record);

        let severity = severity_of(record.level());
        if !severity.can_escalate()
            || record.target().starts_with(OWN_TARGET_PREFIX)
            || !self.inner.enabled(record.metadata())
        {
            return;
        }
        self.engine.observe(severity, &record.args().to_string());
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Register an observer that logs every dispatch decision as a JSON record
pub fn log_notifications(engine: &NotificationEngine) {
    engine.on_notification(|kind, message, delivered| {
        info!(target: NOTIFICATION_LOG_TARGET, "{}", notification_record(kind, message, delivered));
    });
}

/// Structured record describing one dispatch decision
pub fn notification_record(kind: &NotificationKind, message: &str, delivered: bool) -> String {
    let excerpt: String = message.chars().take(MAX_LOGGED_MESSAGE_CHARS).collect();
    json!({
        "type": kind.as_str(),
        "message": excerpt,
        "delivered": delivered,
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "source": LOG_SOURCE,
    })
    .to_string()
}
