//! Service configuration.
//!
//! Load order: `.env` (if present) into the process environment, then the
//! optional TOML file, then environment overrides, then validation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use salescast_core::domain::Granularity;
use salescast_core::Horizons;

pub const ENV_SUPABASE_URL: &str = "SUPABASE_URL";
pub const ENV_SUPABASE_ANON_KEY: &str = "SUPABASE_ANON_KEY";
pub const ENV_SUPABASE_SERVICE_KEY: &str = "SUPABASE_SERVICE_KEY";
pub const ENV_TRAINING_API_KEY: &str = "TRAINING_API_KEY";
pub const ENV_HOST: &str = "HOST";
pub const ENV_PORT: &str = "PORT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {message}")]
    Read { path: String, message: String },

    #[error("invalid config: {0}")]
    Parse(String),

    #[error("invalid value for {key}: '{value}'")]
    InvalidEnv { key: String, value: String },

    #[error("{setting} is required when {needed_by}")]
    Missing {
        setting: &'static str,
        needed_by: &'static str,
    },

    #[error("invalid setting {setting}: {message}")]
    Invalid {
        setting: &'static str,
        message: String,
    },

    #[error("cannot build database client: {0}")]
    Client(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub training_api_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostgrestConfig {
    pub url: Option<String>,
    pub anon_key: Option<String>,
    pub service_key: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for PostgrestConfig {
    fn default() -> Self {
        Self {
            url: None,
            anon_key: None,
            service_key: None,
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

impl PostgrestConfig {
    /// Key used for the serving read path.
    pub fn read_key(&self) -> Option<&str> {
        non_empty(&self.anon_key).or_else(|| non_empty(&self.service_key))
    }

    /// Key used by the pipeline: service key, falling back to anon.
    pub fn write_key(&self) -> Option<&str> {
        non_empty(&self.service_key).or_else(|| non_empty(&self.anon_key))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Postgrest,
    Csv,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub table: String,
    pub path: Option<PathBuf>,
    pub page_size: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Postgrest,
            table: "orders".into(),
            path: None,
            page_size: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Postgrest,
    File,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub kind: StoreKind,
    pub table: String,
    pub dir: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::Postgrest,
            table: "forecast_results".into(),
            dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub monthly_periods: usize,
    pub yearly_periods: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            monthly_periods: Granularity::Monthly.default_horizon(),
            yearly_periods: Granularity::Yearly.default_horizon(),
        }
    }
}

impl ForecastConfig {
    pub fn horizons(&self) -> Horizons {
        Horizons {
            monthly: self.monthly_periods,
            yearly: self.yearly_periods,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunsConfig {
    pub history_path: Option<PathBuf>,
    pub workers: usize,
}

impl Default for RunsConfig {
    fn default() -> Self {
        Self {
            history_path: None,
            workers: 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub postgrest: PostgrestConfig,
    pub source: SourceConfig,
    pub store: StoreConfig,
    pub forecast: ForecastConfig,
    pub runs: RunsConfig,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl ServiceConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&text)
    }

    /// Full startup load from `.env`, optional file, and process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(env_path) => debug!(path = %env_path.display(), "loaded .env"),
            Err(e) if e.not_found() => {}
            Err(e) => warn!(error = %e, "ignoring unreadable .env"),
        }

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay environment values. Empty values count as unset.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_SUPABASE_URL) {
            self.postgrest.url = Some(v);
        }
        if let Some(v) = get(ENV_SUPABASE_ANON_KEY) {
            self.postgrest.anon_key = Some(v);
        }
        if let Some(v) = get(ENV_SUPABASE_SERVICE_KEY) {
            self.postgrest.service_key = Some(v);
        }
        if let Some(v) = get(ENV_TRAINING_API_KEY) {
            self.auth.training_api_key = Some(v);
        }
        if let Some(v) = get(ENV_HOST) {
            self.server.host = v;
        }
        if let Some(v) = get(ENV_PORT) {
            self.server.port = v.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                key: ENV_PORT.into(),
                value: v.clone(),
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let needs_postgrest = self.source.kind == SourceKind::Postgrest
            || self.store.kind == StoreKind::Postgrest;
        if needs_postgrest {
            let needed_by = "a postgrest source or store is configured";
            if non_empty(&self.postgrest.url).is_none() {
                return Err(ConfigError::Missing {
                    setting: "postgrest.url (SUPABASE_URL)",
                    needed_by,
                });
            }
            if self.postgrest.read_key().is_none() {
                return Err(ConfigError::Missing {
                    setting: "postgrest.anon_key (SUPABASE_ANON_KEY)",
                    needed_by,
                });
            }
        }
        if self.source.kind == SourceKind::Csv && self.source.path.is_none() {
            return Err(ConfigError::Missing {
                setting: "source.path",
                needed_by: "source.kind is csv",
            });
        }
        if self.store.kind == StoreKind::File && self.store.dir.is_none() {
            return Err(ConfigError::Missing {
                setting: "store.dir",
                needed_by: "store.kind is file",
            });
        }
        if self.source.page_size == 0 {
            return Err(ConfigError::Invalid {
                setting: "source.page_size",
                message: "must be at least 1".into(),
            });
        }
        if self.runs.workers == 0 {
            return Err(ConfigError::Invalid {
                setting: "runs.workers",
                message: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// The shared secret for the trigger endpoint, if configured.
    pub fn training_key(&self) -> Option<&str> {
        non_empty(&self.auth.training_api_key)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_deployment() {
        let c = ServiceConfig::default();
        assert_eq!(c.bind_address(), "0.0.0.0:8000");
        assert_eq!(c.source.table, "orders");
        assert_eq!(c.store.table, "forecast_results");
        assert_eq!(c.source.page_size, 1000);
        assert_eq!(c.forecast.horizons(), Horizons { monthly: 12, yearly: 3 });
        assert_eq!(c.runs.workers, 1);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = ServiceConfig::from_toml_str(
            r#"
            [server]
            port = 9000

            [store]
            kind = "file"
            dir = "/var/lib/salescast"

            [forecast]
            monthly_periods = 6
            "#,
        )
        .unwrap();
        assert_eq!(c.server.host, "0.0.0.0");
        assert_eq!(c.server.port, 9000);
        assert_eq!(c.store.kind, StoreKind::File);
        assert_eq!(c.store.table, "forecast_results");
        assert_eq!(c.forecast.horizons(), Horizons { monthly: 6, yearly: 3 });
    }

    #[test]
    fn unknown_kind_is_parse_error() {
        let err = ServiceConfig::from_toml_str("[source]\nkind = \"excel\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut c = ServiceConfig::from_toml_str("[server]\nport = 9000\n").unwrap();
        c.apply_env(env(&[
            ("SUPABASE_URL", "https://x.supabase.co"),
            ("SUPABASE_ANON_KEY", "anon"),
            ("TRAINING_API_KEY", "secret"),
            ("PORT", "8080"),
            ("HOST", ""),
        ]))
        .unwrap();
        assert_eq!(c.server.port, 8080);
        assert_eq!(c.server.host, "0.0.0.0");
        assert_eq!(c.training_key(), Some("secret"));
        c.validate().unwrap();
    }

    #[test]
    fn bad_port_is_rejected() {
        let mut c = ServiceConfig::default();
        let err = c.apply_env(env(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }

    #[test]
    fn write_key_falls_back_to_anon() {
        let mut c = PostgrestConfig::default();
        c.anon_key = Some("anon".into());
        assert_eq!(c.write_key(), Some("anon"));
        c.service_key = Some("service".into());
        assert_eq!(c.write_key(), Some("service"));
        assert_eq!(c.read_key(), Some("anon"));
    }

    #[test]
    fn postgrest_without_url_is_invalid() {
        let c = ServiceConfig::default();
        assert!(matches!(c.validate(), Err(ConfigError::Missing { .. })));
    }

    #[test]
    fn missing_training_key_is_not_a_startup_error() {
        let mut c = ServiceConfig::default();
        c.source.kind = SourceKind::Csv;
        c.source.path = Some("orders.csv".into());
        c.store.kind = StoreKind::Memory;
        c.validate().unwrap();
        assert_eq!(c.training_key(), None);
    }

    #[test]
    fn zero_workers_is_invalid() {
        let mut c = ServiceConfig::default();
        c.source.kind = SourceKind::Csv;
        c.source.path = Some("orders.csv".into());
        c.store.kind = StoreKind::Memory;
        c.runs.workers = 0;
        assert!(matches!(c.validate(), Err(ConfigError::Invalid { setting: "runs.workers", .. })));
    }
}
