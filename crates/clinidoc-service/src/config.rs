//! Service configuration: defaults, optional TOML file, `CLINIDOC_`
//! environment overrides.

use anyhow::Context;
use clinidoc_core::MIN_SECTION_COMPLETION;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServiceConfig {
    #[serde(default)]
    pub completeness: CompletenessConfig,
    #[serde(default)]
    pub bundle: BundleConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletenessConfig {
    /// Minimum per-section completion percentage required before signing.
    #[serde(default = "default_threshold")]
    pub threshold: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleConfig {
    /// Wall-clock limit for a transaction bundle before it rolls back.
    #[serde(default = "default_transaction_timeout_ms")]
    pub transaction_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_threshold() -> u8 {
    MIN_SECTION_COMPLETION
}

fn default_transaction_timeout_ms() -> u64 {
    5_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for CompletenessConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
        }
    }
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            transaction_timeout_ms: default_transaction_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from defaults, an optional TOML file, and
    /// `CLINIDOC_`-prefixed environment variables (e.g.
    /// `CLINIDOC_BUNDLE__TRANSACTION_TIMEOUT_MS=2000`).
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix("CLINIDOC")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("failed to assemble configuration sources")?;
        let cfg: Self = settings
            .try_deserialize()
            .context("failed to deserialize configuration")?;
        cfg.validate().map_err(anyhow::Error::msg)?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.completeness.threshold > 100 {
            return Err("completeness.threshold must be <= 100".into());
        }
        if self.bundle.transaction_timeout_ms == 0 {
            return Err("bundle.transaction_timeout_ms must be > 0".into());
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }

    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_millis(self.bundle.transaction_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = ServiceConfig::default();
        assert_eq!(cfg.completeness.threshold, 80);
        assert_eq!(cfg.bundle.transaction_timeout_ms, 5_000);
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_parse_from_toml() {
        let cfg: ServiceConfig = toml::from_str(
            r#"
            [completeness]
            threshold = 90

            [bundle]
            transaction_timeout_ms = 2500
            "#,
        )
        .unwrap();
        assert_eq!(cfg.completeness.threshold, 90);
        assert_eq!(cfg.bundle.transaction_timeout_ms, 2_500);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut cfg = ServiceConfig::default();
        cfg.completeness.threshold = 101;
        assert!(cfg.validate().is_err());

        let mut cfg = ServiceConfig::default();
        cfg.bundle.transaction_timeout_ms = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = ServiceConfig::default();
        cfg.logging.level = "verbose".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_transaction_timeout_duration() {
        let cfg = ServiceConfig::default();
        assert_eq!(cfg.transaction_timeout(), Duration::from_millis(5_000));
    }
}
