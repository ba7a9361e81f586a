//! Startup wiring: turn a validated [`ServiceConfig`] into the collaborator
//! objects shared by the pipeline and the HTTP server.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use salescast_core::circuit_breaker::CircuitBreaker;
use salescast_core::data::{CsvRecordSource, PostgrestRecordSource, RecordSource};
use salescast_core::postgrest::{PostgrestClient, PostgrestSettings};
use salescast_core::store::{
    FileForecastStore, ForecastStore, MemoryForecastStore, PostgrestForecastStore,
};
use salescast_core::ForecastEngine;

use crate::config::{ConfigError, PostgrestConfig, ServiceConfig, SourceKind, StoreKind};
use crate::history::RunHistory;
use crate::pipeline::Pipeline;

/// Everything built once at process start.
pub struct Services {
    pub pipeline: Arc<Pipeline>,
    pub store: Arc<dyn ForecastStore>,
    pub history: Option<Arc<RunHistory>>,
}

/// Reader and writer clients over one shared breaker.
struct Clients {
    reader: Arc<PostgrestClient>,
    writer: Arc<PostgrestClient>,
}

fn client(
    config: &PostgrestConfig,
    key: &str,
    breaker: &Arc<CircuitBreaker>,
) -> Result<Arc<PostgrestClient>, ConfigError> {
    let url = config.url.as_deref().ok_or(ConfigError::Missing {
        setting: "postgrest.url (SUPABASE_URL)",
        needed_by: "a postgrest source or store is configured",
    })?;
    let mut settings = PostgrestSettings::new(url, key);
    settings.timeout = Duration::from_secs(config.timeout_secs);
    settings.max_retries = config.max_retries;
    PostgrestClient::new(settings, Arc::clone(breaker))
        .map(Arc::new)
        .map_err(|e| ConfigError::Client(e.to_string()))
}

fn clients(config: &PostgrestConfig) -> Result<Clients, ConfigError> {
    let missing = ConfigError::Missing {
        setting: "postgrest.anon_key (SUPABASE_ANON_KEY)",
        needed_by: "a postgrest source or store is configured",
    };
    let read_key = config.read_key().ok_or(missing)?;
    let write_key = config.write_key().unwrap_or(read_key);
    let breaker = Arc::new(CircuitBreaker::default_database());
    Ok(Clients {
        reader: client(config, read_key, &breaker)?,
        writer: client(config, write_key, &breaker)?,
    })
}

impl Services {
    pub fn build(config: &ServiceConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let needs_postgrest = config.source.kind == SourceKind::Postgrest
            || config.store.kind == StoreKind::Postgrest;
        let clients = needs_postgrest.then(|| clients(&config.postgrest)).transpose()?;

        let source: Arc<dyn RecordSource> = match (config.source.kind, &clients) {
            (SourceKind::Postgrest, Some(c)) => Arc::new(PostgrestRecordSource::new(
                Arc::clone(&c.writer),
                config.source.table.clone(),
                config.source.page_size,
            )),
            (SourceKind::Csv, _) => match &config.source.path {
                Some(path) => Arc::new(CsvRecordSource::new(path.clone())),
                None => {
                    return Err(ConfigError::Missing {
                        setting: "source.path",
                        needed_by: "source.kind is csv",
                    })
                }
            },
            (SourceKind::Postgrest, None) => {
                return Err(ConfigError::Client("database client was not built".into()))
            }
        };

        let store: Arc<dyn ForecastStore> = match (config.store.kind, &clients) {
            (StoreKind::Postgrest, Some(c)) => Arc::new(PostgrestForecastStore::new(
                Arc::clone(&c.reader),
                Arc::clone(&c.writer),
                config.store.table.clone(),
            )),
            (StoreKind::File, _) => match &config.store.dir {
                Some(dir) => Arc::new(FileForecastStore::new(dir.clone())),
                None => {
                    return Err(ConfigError::Missing {
                        setting: "store.dir",
                        needed_by: "store.kind is file",
                    })
                }
            },
            (StoreKind::Memory, _) => Arc::new(MemoryForecastStore::new()),
            (StoreKind::Postgrest, None) => {
                return Err(ConfigError::Client("database client was not built".into()))
            }
        };

        let engine = ForecastEngine::new(
            Arc::new(salescast_core::model::SmoothingBuilder),
            config.forecast.horizons(),
        );
        let history = config
            .runs
            .history_path
            .as_ref()
            .map(|path| Arc::new(RunHistory::new(path.clone())));

        info!(
            source = source.name(),
            store = store.name(),
            history = history.is_some(),
            "services built"
        );

        Ok(Self {
            pipeline: Arc::new(Pipeline::new(source, Arc::clone(&store), engine)),
            store,
            history,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use salescast_core::domain::Granularity;

    fn offline_config(dir: &std::path::Path) -> ServiceConfig {
        let mut c = ServiceConfig::default();
        c.source.kind = SourceKind::Csv;
        c.source.path = Some(dir.join("orders.csv"));
        c.store.kind = StoreKind::File;
        c.store.dir = Some(dir.join("forecasts"));
        c.runs.history_path = Some(dir.join("runs.jsonl"));
        c
    }

    #[test]
    fn offline_config_builds_file_backed_services() {
        let dir = tempfile::tempdir().unwrap();
        let services = Services::build(&offline_config(dir.path())).unwrap();
        assert_eq!(services.store.name(), "file");
        assert!(services.history.is_some());
        assert!(services.store.get_latest(Granularity::Monthly).unwrap().is_none());
    }

    #[test]
    fn postgrest_config_builds_without_network() {
        let mut c = ServiceConfig::default();
        c.postgrest.url = Some("http://127.0.0.1:9".into());
        c.postgrest.anon_key = Some("anon".into());
        let services = Services::build(&c).unwrap();
        assert_eq!(services.store.name(), "postgrest");
        assert!(services.history.is_none());
    }

    #[test]
    fn invalid_config_is_rejected() {
        assert!(Services::build(&ServiceConfig::default()).is_err());
    }
}
