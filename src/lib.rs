/// Error types for the notification relay
pub mod error;

/// Notification, severity and record types
pub mod events;

/// Keyword classification of observed writes
pub mod triggers;

/// Rate limiting, dispatch and delivery statistics
pub mod alerts;

/// Diagnostic sinks and interception
pub mod sink;

/// Engine tying classification, admission and dispatch together
pub mod engine;

/// `log` facade integration
pub mod adapter;

/// Configuration management
pub mod config;

// Re-export commonly used types
pub use config::{Config, ConfigUpdate};
pub use engine::{Admission, NotificationEngine};
pub use error::{ConfigError, DeliveryError, InterceptError};
pub use events::{Notification, NotificationKind, Severity};
pub use sink::{ConsoleSink, InterceptedSink, Sink};
