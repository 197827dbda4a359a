use super::Sink;
use crate::engine::NotificationEngine;
use crate::events::{NotificationKind, Severity};
use log::debug;
use std::sync::Arc;

/// Prefix written to the original sink for manual notifications
pub const MANUAL_NOTIFY_PREFIX: &str = "[TEXT]";

/// A sink decorated by a notification engine
///
/// Every write goes to the original sink first, unchanged, and is then
/// offered to the engine for classification. `notify` is only available
/// while this handle exists.
///
/// The handle owns the engine's interception slot: an engine hands out at
/// most one at a time. Dropping the handle releases the slot; `restore`
/// does the same and returns the original sink.
pub struct InterceptedSink {
    engine: Arc<NotificationEngine>,
    original: Arc<dyn Sink>,
}

impl InterceptedSink {
    pub(crate) fn new(engine: Arc<NotificationEngine>, original: Arc<dyn Sink>) -> Self {
        debug!("Sink intercepted");
        Self { engine, original }
    }

    /// Write at the given severity and offer the message to the engine
    pub fn log(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Info => self.original.info(message),
            Severity::Warn => self.original.warn(message),
            Severity::Error => self.original.error(message),
        }
        self.engine.observe(severity, message);
    }

    /// Manual notification
    ///
    /// Writes a tagged line to the original sink and submits a `text`
    /// notification without keyword classification. Still rate limited.
    pub fn notify(&self, message: &str) {
        self.original
            .info(&format!("{} {}", MANUAL_NOTIFY_PREFIX, message));
        self.engine.submit(NotificationKind::Text, message);
    }

    /// The engine this sink reports to
    pub fn engine(&self) -> &Arc<NotificationEngine> {
        &self.engine
    }

    /// Release the interception and hand back the original sink
    pub fn restore(self) -> Arc<dyn Sink> {
        Arc::clone(&self.original)
    }
}

impl Sink for InterceptedSink {
    fn info(&self, message: &str) {
        self.log(Severity::Info, message);
    }

    fn warn(&self, message: &str) {
        self.log(Severity::Warn, message);
    }

    fn error(&self, message: &str) {
        self.log(Severity::Error, message);
    }
}

impl Drop for InterceptedSink {
    fn drop(&mut self) {
        self.engine.release_interception();
        debug!("Sink restored");
    }
}

impl std::fmt::Debug for InterceptedSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptedSink").finish_non_exhaustive()
    }
}
