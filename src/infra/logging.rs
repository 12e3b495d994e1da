// ============================================================
// Layer 6 — Logging
// ============================================================
// Installs the global tracing subscriber: human-readable fmt
// output filtered by an EnvFilter. RUST_LOG, when set, wins
// over the configured filter.
//
// Reference: tracing-subscriber documentation (EnvFilter)

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// EnvFilter directive, e.g. `solubility_predict=debug`.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: "solubility_predict=info".to_string() }
    }
}

impl LoggingConfig {
    pub fn with_filter(filter: impl Into<String>) -> Self {
        Self { filter: filter.into() }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.filter))
            .unwrap_or_else(|_| EnvFilter::new(LoggingConfig::default().filter))
    }
}

/// Install the subscriber. Returns false if one was already installed.
pub fn init(config: &LoggingConfig) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(config.env_filter())
        .with_target(false)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        assert_eq!(LoggingConfig::default().filter, "solubility_predict=info");
    }

    #[test]
    fn test_second_init_is_harmless() {
        init(&LoggingConfig::default());
        assert!(!init(&LoggingConfig::with_filter("debug")));
    }
}
