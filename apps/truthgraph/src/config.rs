//! # Configuration
//!
//! `AppConfig` is assembled in three layers, later layers winning:
//!
//! 1. Built-in defaults
//! 2. An optional TOML file (`--config truthgraph.toml`)
//! 3. `TRUTHGRAPH_*` environment variables
//!
//! ## Environment Variables
//!
//! - `TRUTHGRAPH_HOST`, `TRUTHGRAPH_PORT`: bind address
//! - `TRUTHGRAPH_SNAPSHOT`: snapshot file backing both stores
//! - `TRUTHGRAPH_CHECK_INTERVAL_SECS`: seconds between scheduled runs (default: 600)
//! - `TRUTHGRAPH_CHECK_TIMEOUT_SECS`: bound on each sub-check (default: 60)
//! - `TRUTHGRAPH_STARTUP_DELAY_SECS`: delay before the first run (default: 5)
//! - `TRUTHGRAPH_CORS_ORIGINS`: comma-separated origins, or "*" (default: localhost only)
//! - `TRUTHGRAPH_RATE_LIMIT`: requests per second (default: 100, 0 to disable)
//! - `TRUTHGRAPH_API_KEY`: if set, requires Bearer token authentication
//! - `TRUTHGRAPH_EXPECTED_RELATIONSHIPS`: comma-separated relationship types

use crate::consistency::CheckerConfig;
use crate::scheduler::{DEFAULT_STARTUP_DELAY_SECS, ScheduleConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use truthgraph_core::TruthGraphError;
use truthgraph_core::primitives::{
    DEFAULT_CHECK_INTERVAL_SECS, DEFAULT_SUBCHECK_TIMEOUT_SECS, EXPECTED_RELATIONSHIP_TYPES,
};

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "TRUTHGRAPH_";

/// Maximum configuration file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// Default requests per second.
pub const DEFAULT_RATE_LIMIT: u32 = 100;

// =============================================================================
// APP CONFIG
// =============================================================================

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub snapshot: Option<PathBuf>,
    pub check_interval_secs: u64,
    pub check_timeout_secs: u64,
    pub startup_delay_secs: u64,
    pub cors_origins: Option<String>,
    pub rate_limit: u32,
    pub api_key: Option<String>,
    pub expected_relationship_types: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            snapshot: None,
            check_interval_secs: DEFAULT_CHECK_INTERVAL_SECS,
            check_timeout_secs: DEFAULT_SUBCHECK_TIMEOUT_SECS,
            startup_delay_secs: DEFAULT_STARTUP_DELAY_SECS,
            cors_origins: None,
            rate_limit: DEFAULT_RATE_LIMIT,
            api_key: None,
            expected_relationship_types: EXPECTED_RELATIONSHIP_TYPES
                .iter()
                .map(|t| (*t).to_string())
                .collect(),
        }
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("snapshot", &self.snapshot)
            .field("check_interval_secs", &self.check_interval_secs)
            .field("check_timeout_secs", &self.check_timeout_secs)
            .field("startup_delay_secs", &self.startup_delay_secs)
            .field("cors_origins", &self.cors_origins)
            .field("rate_limit", &self.rate_limit)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field(
                "expected_relationship_types",
                &self.expected_relationship_types,
            )
            .finish()
    }
}

impl AppConfig {
    /// Defaults, then `path` if given, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, TruthGraphError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, TruthGraphError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            TruthGraphError::ConfigError(format!("Cannot read '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(TruthGraphError::ConfigError(format!(
                "Config file size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            TruthGraphError::ConfigError(format!("Cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, TruthGraphError> {
        toml::from_str(content)
            .map_err(|e| TruthGraphError::ConfigError(format!("Invalid config: {}", e)))
    }

    /// Apply `TRUTHGRAPH_*` overrides read through `lookup`.
    ///
    /// Empty values are ignored, except for `TRUTHGRAPH_API_KEY` where an
    /// empty value disables authentication.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), TruthGraphError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, key)).filter(|v| !v.trim().is_empty())
        };

        if let Some(host) = get("HOST") {
            self.host = host;
        }
        if let Some(port) = get("PORT") {
            self.port = parse_env("PORT", &port)?;
        }
        if let Some(snapshot) = get("SNAPSHOT") {
            self.snapshot = Some(PathBuf::from(snapshot));
        }
        if let Some(secs) = get("CHECK_INTERVAL_SECS") {
            self.check_interval_secs = parse_env("CHECK_INTERVAL_SECS", &secs)?;
        }
        if let Some(secs) = get("CHECK_TIMEOUT_SECS") {
            self.check_timeout_secs = parse_env("CHECK_TIMEOUT_SECS", &secs)?;
        }
        if let Some(secs) = get("STARTUP_DELAY_SECS") {
            self.startup_delay_secs = parse_env("STARTUP_DELAY_SECS", &secs)?;
        }
        if let Some(origins) = get("CORS_ORIGINS") {
            self.cors_origins = Some(origins);
        }
        if let Some(rate) = get("RATE_LIMIT") {
            self.rate_limit = parse_env("RATE_LIMIT", &rate)?;
        }
        if let Some(key) = lookup(&format!("{}API_KEY", ENV_PREFIX)) {
            self.api_key = Some(key).filter(|k| !k.is_empty());
        }
        if let Some(types) = get("EXPECTED_RELATIONSHIPS") {
            self.expected_relationship_types = types
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
        }
        Ok(())
    }

    /// Reject values the runtime cannot honour.
    pub fn validate(&self) -> Result<(), TruthGraphError> {
        if self.check_interval_secs == 0 {
            return Err(TruthGraphError::ConfigError(
                "check_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.check_timeout_secs == 0 {
            return Err(TruthGraphError::ConfigError(
                "check_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.expected_relationship_types.is_empty() {
            return Err(TruthGraphError::ConfigError(
                "expected_relationship_types must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    #[must_use]
    pub fn checker_config(&self) -> CheckerConfig {
        CheckerConfig {
            subcheck_timeout: Duration::from_secs(self.check_timeout_secs),
            expected_relationship_types: self.expected_relationship_types.iter().cloned().collect(),
        }
    }

    #[must_use]
    pub fn schedule_config(&self) -> ScheduleConfig {
        ScheduleConfig {
            startup_delay: Duration::from_secs(self.startup_delay_secs),
            interval: Duration::from_secs(self.check_interval_secs),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, TruthGraphError> {
    value.trim().parse().map_err(|_| {
        TruthGraphError::ConfigError(format!("{}{} has invalid value '{}'", ENV_PREFIX, key, value))
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.check_interval_secs, 600);
        assert_eq!(config.check_timeout_secs, 60);
        assert_eq!(config.rate_limit, 100);
        assert_eq!(config.expected_relationship_types.len(), 5);
    }

    #[test]
    fn toml_overrides_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            port = 9090
            check_interval_secs = 30
            expected_relationship_types = ["ASSERTED"]
            "#,
        )
        .expect("parse");
        assert_eq!(config.port, 9090);
        assert_eq!(config.check_interval_secs, 30);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.expected_relationship_types, vec!["ASSERTED"]);
    }

    #[test]
    fn toml_rejects_unknown_keys() {
        assert!(matches!(
            AppConfig::from_toml_str("prot = 1"),
            Err(TruthGraphError::ConfigError(_))
        ));
    }

    #[test]
    fn env_overrides_file() {
        let mut config = AppConfig::from_toml_str("port = 9090").expect("parse");
        config
            .apply_overrides(env(&[
                ("TRUTHGRAPH_PORT", "7070"),
                ("TRUTHGRAPH_RATE_LIMIT", "0"),
                ("TRUTHGRAPH_API_KEY", "secret"),
                ("TRUTHGRAPH_EXPECTED_RELATIONSHIPS", "ASSERTED, MENTIONS,"),
                ("TRUTHGRAPH_HOST", "  "),
            ]))
            .expect("env");
        assert_eq!(config.port, 7070);
        assert_eq!(config.rate_limit, 0);
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.expected_relationship_types, vec!["ASSERTED", "MENTIONS"]);
        assert_eq!(config.host, "127.0.0.1");
    }

    #[test]
    fn empty_api_key_disables_auth() {
        let mut config = AppConfig {
            api_key: Some("old".to_string()),
            ..AppConfig::default()
        };
        config
            .apply_overrides(env(&[("TRUTHGRAPH_API_KEY", "")]))
            .expect("env");
        assert!(config.api_key.is_none());
    }

    #[test]
    fn invalid_env_value_is_config_error() {
        let mut config = AppConfig::default();
        let result = config.apply_overrides(env(&[("TRUTHGRAPH_PORT", "eighty")]));
        assert!(matches!(result, Err(TruthGraphError::ConfigError(_))));
    }

    #[test]
    fn zero_interval_rejected() {
        let config = AppConfig {
            check_interval_secs: 0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("hunter2".to_string()),
            ..AppConfig::default()
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn from_file_reads_toml() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "startup_delay_secs = 0").expect("write");
        let config = AppConfig::from_file(file.path()).expect("load");
        assert_eq!(config.startup_delay_secs, 0);
        assert_eq!(config.schedule_config().startup_delay, Duration::ZERO);
    }
}
