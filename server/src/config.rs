//! Server configuration loading
//!
//! Loads configuration from `~/.config/jstd/server.toml` (or `JSTD_SERVER_CONFIG` env).
//! Every field has a default, so an absent file yields a runnable server.

use std::path::{Path, PathBuf};
use std::time::Duration;

use jstd_fileset::CapabilityTable;
use jstd_fileset::browser::{DEFAULT_BROWSER_TIMEOUT, DEFAULT_FULL_RESET_BROWSERS};
use serde::Deserialize;

use crate::errors::ConfigError;
use crate::http::DEFAULT_MAX_BODY_BYTES;

/// Root configuration for the file-set server
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ServerConfig {
    /// Interface to bind
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port; 0 picks an ephemeral port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of request-handling loops
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Fallback log filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Split every uploaded case into one case per test file
    #[serde(default)]
    pub isolate_tests: bool,

    /// Largest request body accepted, in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Browser capability overrides
    #[serde(default)]
    pub browsers: BrowsersConfig,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    4224
}

fn default_workers() -> usize {
    4
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: default_workers(),
            log_level: default_log_level(),
            isolate_tests: false,
            max_body_bytes: default_max_body_bytes(),
            browsers: BrowsersConfig::default(),
        }
    }
}

/// Browser capability configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BrowsersConfig {
    /// Browser names that cannot overwrite loaded scripts in place
    #[serde(default = "default_full_reset")]
    pub full_reset: Vec<String>,

    /// Seconds without a heartbeat before a browser is dropped
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_BROWSER_TIMEOUT.as_secs()
}

fn default_full_reset() -> Vec<String> {
    DEFAULT_FULL_RESET_BROWSERS
        .iter()
        .map(|name| (*name).to_string())
        .collect()
}

impl Default for BrowsersConfig {
    fn default() -> Self {
        Self {
            full_reset: default_full_reset(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ServerConfig {
    /// Environment variable for config path override
    pub const ENV_CONFIG_PATH: &'static str = "JSTD_SERVER_CONFIG";

    /// Default config filename
    pub const DEFAULT_CONFIG_FILENAME: &'static str = "server.toml";

    /// Load configuration from file
    ///
    /// Resolution order:
    /// 1. `explicit` (the `--config` flag)
    /// 2. `JSTD_SERVER_CONFIG` environment variable
    /// 3. `~/.config/jstd/server.toml`
    ///
    /// An explicit path must exist. Otherwise a missing file yields defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_from_path(path);
        }

        let path = Self::resolve_config_path();
        if !path.exists() {
            tracing::info!(path = %path.display(), "server config not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from_path(&path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        Self::parse(&contents)
    }

    /// Parse configuration from TOML string
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let cfg: ServerConfig = toml::from_str(contents)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn resolve_config_path() -> PathBuf {
        if let Ok(path) = std::env::var(Self::ENV_CONFIG_PATH) {
            return PathBuf::from(path);
        }

        dirs::home_dir()
            .map(|h| {
                h.join(".config")
                    .join("jstd")
                    .join(Self::DEFAULT_CONFIG_FILENAME)
            })
            .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_CONFIG_FILENAME))
    }

    /// Reject settings the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".to_string()));
        }
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".to_string()));
        }
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_body_bytes must be at least 1".to_string(),
            ));
        }
        if self.browsers.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "browsers.timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// `host:port` for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn capability_table(&self) -> CapabilityTable {
        CapabilityTable::with_full_reset(&self.browsers.full_reset)
    }

    pub fn browser_timeout(&self) -> Duration {
        Duration::from_secs(self.browsers.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn empty_file_uses_defaults() {
        let cfg = ServerConfig::parse("").unwrap_or_else(|e| panic!("parse: {e}"));
        assert_eq!(cfg, ServerConfig::default());
        assert_eq!(cfg.bind_addr(), "127.0.0.1:4224");
        assert_eq!(cfg.browsers.full_reset, vec!["Safari", "Opera", "Konqueror"]);
        assert_eq!(cfg.browser_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
    }

    #[test]
    fn browser_timeout_is_configurable() {
        let cfg = ServerConfig::parse("[browsers]\ntimeout_secs = 5")
            .unwrap_or_else(|e| panic!("parse: {e}"));
        assert_eq!(cfg.browser_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.browsers.full_reset, vec!["Safari", "Opera", "Konqueror"]);

        let err = ServerConfig::parse("[browsers]\ntimeout_secs = 0").err();
        assert!(matches!(err, Some(ConfigError::Invalid(_))), "{err:?}");
    }

    #[test]
    fn zero_body_limit_rejected() {
        let err = ServerConfig::parse("max_body_bytes = 0").err();
        assert!(matches!(err, Some(ConfigError::Invalid(_))), "{err:?}");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let cfg = ServerConfig::parse(
            r#"
port = 9876
isolate_tests = true

[browsers]
full_reset = ["Safari"]
"#,
        )
        .unwrap_or_else(|e| panic!("parse: {e}"));

        assert_eq!(cfg.port, 9876);
        assert!(cfg.isolate_tests);
        assert_eq!(cfg.workers, 4);
        assert_eq!(cfg.browsers.full_reset, vec!["Safari"]);
        assert!(cfg.capability_table().resolve("Opera").supports_incremental_overwrite);
    }

    #[test]
    fn zero_workers_rejected() {
        let err = ServerConfig::parse("workers = 0").err();
        assert!(matches!(err, Some(ConfigError::Invalid(_))), "{err:?}");
    }

    #[test]
    fn blank_host_rejected() {
        let err = ServerConfig::parse("host = \"  \"").err();
        assert!(matches!(err, Some(ConfigError::Invalid(_))), "{err:?}");
    }

    #[test]
    fn ephemeral_port_allowed() {
        let cfg = ServerConfig::parse("port = 0").unwrap_or_else(|e| panic!("parse: {e}"));
        assert_eq!(cfg.port, 0);
    }

    #[test]
    fn bad_toml_is_a_parse_error() {
        let err = ServerConfig::parse("port = \"not a number\"").err();
        assert!(matches!(err, Some(ConfigError::Parse(_))), "{err:?}");
    }

    #[test]
    fn explicit_path_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap_or_else(|e| panic!("tempfile: {e}"));
        writeln!(file, "host = \"0.0.0.0\"\nworkers = 2").unwrap_or_else(|e| panic!("write: {e}"));

        let cfg = ServerConfig::load(Some(file.path())).unwrap_or_else(|e| panic!("load: {e}"));
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.workers, 2);
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
        let err = ServerConfig::load(Some(&dir.path().join("absent.toml"))).err();
        assert!(matches!(err, Some(ConfigError::Read { .. })), "{err:?}");
    }
}
