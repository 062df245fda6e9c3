use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_PATH_ENV: &str = "SOLAR_PROXY_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

fn default_port() -> u16 { 8080 }
fn default_static_dir() -> String { "static".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_base_url() -> String { "https://re.jrc.ec.europa.eu/api/v5_2/".to_string() }
fn default_radiation_database() -> String { "PVGIS-ERA5".to_string() }
fn default_timeout_s() -> u64 { 30 }
fn default_ttl_hours() -> i64 { 24 }
fn default_purge_interval_s() -> u64 { 600 }

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub pvgis: PvgisConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            pvgis: PvgisConfig::default(),
            cache: CacheConfig::default(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory served for any path not matched by the API
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            static_dir: default_static_dir(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PvgisConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_radiation_database")]
    pub radiation_database: String,
    #[serde(default = "default_timeout_s")]
    pub timeout_s: u64,
}

impl Default for PvgisConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            radiation_database: default_radiation_database(),
            timeout_s: default_timeout_s(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: i64,
    #[serde(default = "default_purge_interval_s")]
    pub purge_interval_s: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_hours: default_ttl_hours(),
            purge_interval_s: default_purge_interval_s(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                source,
            },
            other => other,
        })
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(content).map_err(|source| ConfigError::Parse {
            path: "<inline>".to_string(),
            source,
        })?;
        config.validate()
    }

    /// Load from `$SOLAR_PROXY_CONFIG` or `config.json`. A missing file yields
    /// the defaults; an unreadable or invalid one is an error.
    pub fn load_or_default() -> Result<(Self, Option<String>), ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        if Path::new(&path).exists() {
            Ok((Self::load(&path)?, Some(path)))
        } else {
            Ok((Self::default().validate()?, None))
        }
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.cache.ttl_hours <= 0 {
            return Err(ConfigError::Invalid(format!(
                "cache.ttl_hours must be positive, got {}",
                self.cache.ttl_hours
            )));
        }
        if self.pvgis.timeout_s == 0 {
            return Err(ConfigError::Invalid("pvgis.timeout_s must be positive".to_string()));
        }
        if self.cache.purge_interval_s == 0 {
            return Err(ConfigError::Invalid(
                "cache.purge_interval_s must be positive".to_string(),
            ));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_gives_defaults() {
        let cfg = Config::from_json("{}").unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.pvgis.radiation_database, "PVGIS-ERA5");
        assert_eq!(cfg.cache.ttl_hours, 24);
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let cfg = Config::from_json(
            r#"{ "server": { "port": 9000 }, "pvgis": { "timeout_s": 5 } }"#,
        )
        .unwrap();
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.server.static_dir, "static");
        assert_eq!(cfg.pvgis.timeout_s, 5);
        assert!(cfg.pvgis.base_url.starts_with("https://"));
    }

    #[test]
    fn test_rejects_non_positive_ttl() {
        let err = Config::from_json(r#"{ "cache": { "ttl_hours": 0 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(matches!(
            Config::from_json("{ server: 1 }"),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_default_matches_empty_json() {
        let cfg = Config::default();
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.cache.purge_interval_s, 600);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        assert!(matches!(
            Config::load("/nonexistent/solar-proxy.json"),
            Err(ConfigError::Read { .. })
        ));
    }
}
