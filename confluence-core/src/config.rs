//! Configuration types

use crate::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// TIMER MODE
// ============================================================================

/// Periodic re-emission policy of a recurring load impulse emitter.
///
/// Serialized as an optional number of milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<u64>", into = "Option<u64>")]
pub enum TimerMode {
    /// Only manual emissions.
    #[default]
    None,
    /// Re-emit the latest impulse every period.
    Interval(Duration),
}

impl TimerMode {
    /// Period of the timer, if any.
    pub fn period(&self) -> Option<Duration> {
        match self {
            TimerMode::None => None,
            TimerMode::Interval(period) => Some(*period),
        }
    }
}

impl From<Option<u64>> for TimerMode {
    fn from(millis: Option<u64>) -> Self {
        match millis {
            Some(millis) => TimerMode::Interval(Duration::from_millis(millis)),
            None => TimerMode::None,
        }
    }
}

impl From<TimerMode> for Option<u64> {
    fn from(mode: TimerMode) -> Self {
        mode.period()
            .map(|period| u64::try_from(period.as_millis()).unwrap_or(u64::MAX))
    }
}

// ============================================================================
// PERSISTER CONFIG
// ============================================================================

fn default_max_size_mb() -> usize {
    10
}

/// On-disk persister settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersisterConfig {
    /// Directory holding the LMDB environment.
    pub directory: PathBuf,
    /// Key under which the state is stored. One state per key.
    pub cache_key: String,
    /// LMDB map size in megabytes.
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: usize,
}

impl PersisterConfig {
    pub fn new(directory: impl Into<PathBuf>, cache_key: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            cache_key: cache_key.into(),
            max_size_mb: default_max_size_mb(),
        }
    }

    /// Set the LMDB map size.
    pub fn with_max_size_mb(mut self, max_size_mb: usize) -> Self {
        self.max_size_mb = max_size_mb;
        self
    }

    /// Create from environment variables.
    ///
    /// Returns `None` when no cache directory is configured.
    ///
    /// Environment variables:
    /// - `CONFLUENCE_CACHE_DIR`: LMDB directory (required)
    /// - `CONFLUENCE_CACHE_KEY`: Record key (default: "state")
    /// - `CONFLUENCE_CACHE_MAX_SIZE_MB`: Map size in megabytes (default: 10)
    pub fn from_env() -> Option<Self> {
        let directory = std::env::var("CONFLUENCE_CACHE_DIR").ok()?;

        Some(Self {
            directory: PathBuf::from(directory),
            cache_key: std::env::var("CONFLUENCE_CACHE_KEY")
                .unwrap_or_else(|_| "state".to_string()),
            max_size_mb: std::env::var("CONFLUENCE_CACHE_MAX_SIZE_MB")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_max_size_mb),
        })
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ConfluenceResult<()> {
        if self.cache_key.trim().is_empty() {
            return Err(ConfluenceError::Config(ConfigError::InvalidValue {
                field: "cache_key".to_string(),
                value: self.cache_key.clone(),
                reason: "cache_key must not be empty".to_string(),
            }));
        }

        if self.max_size_mb == 0 {
            return Err(ConfluenceError::Config(ConfigError::InvalidValue {
                field: "max_size_mb".to_string(),
                value: self.max_size_mb.to_string(),
                reason: "max_size_mb must be greater than 0".to_string(),
            }));
        }

        if self.directory.as_os_str().is_empty() {
            return Err(ConfluenceError::Config(ConfigError::MissingRequired {
                field: "directory".to_string(),
            }));
        }

        Ok(())
    }
}

// ============================================================================
// DATASOURCE CONFIG
// ============================================================================

/// Settings for assembling a cached datasource.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DatasourceConfig {
    /// Periodic refresh, in milliseconds when serialized.
    #[serde(default, rename = "refresh_interval_ms")]
    pub timer_mode: TimerMode,
    /// Disk persistence. In-memory persistence when absent.
    #[serde(default)]
    pub persister: Option<PersisterConfig>,
}

impl DatasourceConfig {
    /// Parse and validate a TOML document.
    ///
    /// ```toml
    /// refresh_interval_ms = 30000
    ///
    /// [persister]
    /// directory = "/var/cache/app"
    /// cache_key = "feed"
    /// ```
    pub fn from_toml_str(source: &str) -> ConfluenceResult<Self> {
        let config: Self = toml::from_str(source).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `CONFLUENCE_REFRESH_INTERVAL_MS`: Refresh period (default: no timer)
    /// - persister variables, see [`PersisterConfig::from_env`]
    pub fn from_env() -> Self {
        Self {
            timer_mode: TimerMode::from(
                std::env::var("CONFLUENCE_REFRESH_INTERVAL_MS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok()),
            ),
            persister: PersisterConfig::from_env(),
        }
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - an interval timer has a positive period
    /// - the persister section, when present
    pub fn validate(&self) -> ConfluenceResult<()> {
        if let TimerMode::Interval(period) = self.timer_mode {
            if period.is_zero() {
                return Err(ConfluenceError::Config(ConfigError::InvalidValue {
                    field: "refresh_interval_ms".to_string(),
                    value: format!("{:?}", period),
                    reason: "refresh interval must be positive".to_string(),
                }));
            }
        }

        if let Some(persister) = &self.persister {
            persister.validate()?;
        }

        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = DatasourceConfig::default();
        assert_eq!(config.timer_mode, TimerMode::None);
        assert!(config.persister.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let config = DatasourceConfig {
            timer_mode: TimerMode::Interval(Duration::ZERO),
            persister: None,
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfluenceError::Config(ConfigError::InvalidValue { ref field, .. })
                if field == "refresh_interval_ms"
        ));
    }

    #[test]
    fn test_empty_cache_key_is_rejected() {
        let config = PersisterConfig::new("/tmp/confluence", "  ");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_map_size_is_rejected() {
        let config = PersisterConfig::new("/tmp/confluence", "feed").with_max_size_mb(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_toml_str() {
        let config = DatasourceConfig::from_toml_str(
            r#"
            refresh_interval_ms = 1500

            [persister]
            directory = "/tmp/confluence"
            cache_key = "feed"
            "#,
        )
        .unwrap();

        assert_eq!(
            config.timer_mode,
            TimerMode::Interval(Duration::from_millis(1500))
        );
        let persister = config.persister.unwrap();
        assert_eq!(persister.cache_key, "feed");
        assert_eq!(persister.max_size_mb, 10);
    }

    #[test]
    fn test_from_toml_str_without_timer() {
        let config = DatasourceConfig::from_toml_str("").unwrap();
        assert_eq!(config.timer_mode, TimerMode::None);
    }

    #[test]
    fn test_from_toml_str_rejects_zero_interval() {
        let err = DatasourceConfig::from_toml_str("refresh_interval_ms = 0").unwrap_err();
        assert!(matches!(err, ConfluenceError::Config(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_from_toml_str_reports_parse_errors() {
        let err = DatasourceConfig::from_toml_str("refresh_interval_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, ConfluenceError::Config(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_timer_mode_serializes_as_millis() {
        let json = serde_json::to_value(TimerMode::Interval(Duration::from_secs(2))).unwrap();
        assert_eq!(json, serde_json::json!(2000));
        let json = serde_json::to_value(TimerMode::None).unwrap();
        assert!(json.is_null());
    }

    #[test]
    fn test_oversized_period_saturates_millis() {
        let millis: Option<u64> = TimerMode::Interval(Duration::MAX).into();
        assert_eq!(millis, Some(u64::MAX));
        assert_eq!(Option::<u64>::from(TimerMode::None), None);
    }
}
