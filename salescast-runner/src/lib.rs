//! Salescast Runner: pipeline orchestration, run queue, run history, configuration.
//!
//! This crate builds on `salescast-core` to provide:
//! - Service configuration (TOML file + environment + `.env`)
//! - Startup wiring of record source, forecast store and engine
//! - The per-run pipeline with failure-isolated granularities
//! - A background run queue served by worker threads
//! - JSONL run history

pub mod config;
pub mod history;
pub mod pipeline;
pub mod queue;
pub mod services;
pub mod summary;

pub use config::{ConfigError, ServiceConfig, SourceKind, StoreKind};
pub use history::RunHistory;
pub use pipeline::{Pipeline, PipelineError, Stage, StageFailure};
pub use queue::{execute, QueueError, RunQueue, RunTicket};
pub use services::Services;
pub use summary::{Outcome, RunSummary};
