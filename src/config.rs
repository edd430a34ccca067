//! Application configuration file.
//!
//! Every section is optional; missing fields take their defaults.
//!
//! ```toml
//! [capture]
//! ideal_width = 1280
//! ideal_height = 720
//!
//! [scanner]
//! debounce_ms = 1500
//! policy = "prefer_native_except_mobile"
//!
//! [session]
//! counterparty_mode = "fixed_choice"
//! counterparties = ["Romashka LLC", "Ivanov A.S."]
//! ```

use crate::capture::{CaptureConfig, ConfigError};
use crate::feedback::FeedbackConfig;
use crate::scanner::ScannerConfig;
use crate::session::{CounterpartyMode, SessionConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Metrics endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Serve `/metrics` over HTTP.
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub capture: CaptureConfig,
    pub scanner: ScannerConfig,
    pub feedback: FeedbackConfig,
    pub session: SessionConfig,
    pub metrics: MetricsConfig,
}

impl FileConfig {
    /// Loads and validates a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::parse(&content)
    }

    /// Parses and validates TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.capture.validate()?;
        self.scanner.validate()?;
        if self.session.confirmation_ms == 0 {
            return Err(ConfigError::InvalidConfirmation);
        }
        if self.session.counterparty_mode == CounterpartyMode::FixedChoice
            && self.session.counterparties.is_empty()
        {
            return Err(ConfigError::EmptyDirectory);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{SelectionPolicy, Symbology};

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = FileConfig::parse("").unwrap();
        assert_eq!(config.capture.ideal_width, 1280);
        assert_eq!(config.scanner.debounce_ms, 1_500);
        assert_eq!(config.scanner.library.scan_rate, 10);
        assert_eq!(config.feedback.vibration_ms, 80);
        assert_eq!(config.session.confirmation_ms, 2_000);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn test_sections_override_defaults() {
        let config = FileConfig::parse(
            r#"
            [scanner]
            debounce_ms = 800
            policy = "always_library"
            native_formats = ["ean_13", "qr_code"]

            [feedback]
            enabled = false

            [session]
            counterparty_mode = "fixed_choice"
            counterparties = ["Romashka LLC"]

            [metrics]
            enabled = true
            port = 9100
            "#,
        )
        .unwrap();

        assert_eq!(config.scanner.debounce_ms, 800);
        assert_eq!(config.scanner.policy, SelectionPolicy::AlwaysLibrary);
        assert_eq!(
            config.scanner.native_formats,
            [Symbology::Ean13, Symbology::QrCode]
        );
        assert!(!config.feedback.enabled);
        assert_eq!(config.session.directory().names(), ["Romashka LLC"]);
        assert_eq!(config.metrics.port, 9100);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            FileConfig::parse("[scanner]\ndebounce_ms = 0"),
            Err(ConfigError::InvalidDebounce)
        ));
        assert!(matches!(
            FileConfig::parse("[session]\nconfirmation_ms = 0"),
            Err(ConfigError::InvalidConfirmation)
        ));
        assert!(matches!(
            FileConfig::parse("[session]\ncounterparty_mode = \"fixed_choice\""),
            Err(ConfigError::EmptyDirectory)
        ));
        assert!(matches!(
            FileConfig::parse("[scanner]\npolicy = \"sometimes\""),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            FileConfig::from_file("/nonexistent/scanner.toml"),
            Err(ConfigError::FileReadError(_))
        ));
    }
}
