/// Relay configuration, presets and runtime updates
pub mod settings;
pub mod update;

pub use settings::{Config, DEFAULT_CRITICAL_KEYWORDS, DEFAULT_DATADOG_URL};
pub use update::{ConfigUpdate, PublicConfig};
