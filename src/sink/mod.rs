//! Diagnostic output sinks
//!
//! A `Sink` is the capability a host uses to write informational, warning
//! and error lines. The relay never touches ambient global output; it
//! decorates a sink handed to it and gives the original back on release.

pub mod interceptor;

pub use interceptor::InterceptedSink;

use crate::events::Severity;
use std::sync::Mutex;

/// Severity-tagged diagnostic output
#[cfg_attr(test, mockall::automock)]
pub trait Sink: Send + Sync {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);

    /// Write at the given severity
    fn write(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Info => self.info(message),
            Severity::Warn => self.warn(message),
            Severity::Error => self.error(message),
        }
    }
}

/// Process console: informational lines on stdout, warnings and errors on stderr
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl Sink for ConsoleSink {
    fn info(&self, message: &str) {
        println!("{}", message);
    }

    fn warn(&self, message: &str) {
        eprintln!("{}", message);
    }

    fn error(&self, message: &str) {
        eprintln!("{}", message);
    }
}

/// Sink that keeps every line in memory
///
/// Useful for hosts that want to inspect relay output and for tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    lines: Mutex<Vec<(Severity, String)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every line written so far, in order
    pub fn lines(&self) -> Vec<(Severity, String)> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Messages written at one severity
    pub fn messages(&self, severity: Severity) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|(s, _)| *s == severity)
            .map(|(_, m)| m)
            .collect()
    }

    fn push(&self, severity: Severity, message: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push((severity, message.to_string()));
        }
    }
}

impl Sink for RecordingSink {
    fn info(&self, message: &str) {
        self.push(Severity::Info, message);
    }

    fn warn(&self, message: &str) {
        self.push(Severity::Warn, message);
    }

    fn error(&self, message: &str) {
        self.push(Severity::Error, message);
    }
}
