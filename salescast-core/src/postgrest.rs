//! Blocking client for the hosted database's PostgREST API.
//!
//! One client is built per API key at process start and handed to the record
//! source and the forecast store; nothing in this crate reaches for a global.
//! Idempotent requests (GET, DELETE) are retried with exponential backoff on
//! transient failures. Inserts are sent once.

use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::circuit_breaker::CircuitBreaker;

#[derive(Debug, Error)]
pub enum PostgrestError {
    #[error("database API unavailable (circuit breaker open, retry in {remaining_secs}s)")]
    CircuitOpen { remaining_secs: u64 },

    #[error("network error: {0}")]
    Network(String),

    #[error("authentication rejected: {0}")]
    Unauthorized(String),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("response is not valid JSON: {0}")]
    Decode(String),

    #[error("cannot build HTTP client: {0}")]
    Client(String),
}

impl PostgrestError {
    /// Whether the failure says nothing about the request itself.
    pub fn is_transient(&self) -> bool {
        match self {
            PostgrestError::Network(_) | PostgrestError::CircuitOpen { .. } => true,
            PostgrestError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Connection settings for one API key.
#[derive(Debug, Clone)]
pub struct PostgrestSettings {
    /// Project URL, e.g. `https://abc.supabase.co`. The `/rest/v1` suffix is added.
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl PostgrestSettings {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// A single request against one table.
#[derive(Debug, Clone)]
pub struct TableRequest<'a> {
    pub method: Method,
    pub table: &'a str,
    pub query: Vec<(&'a str, String)>,
    pub body: Option<Value>,
    /// Value of the `Prefer` header (e.g. `return=representation`).
    pub prefer: Option<&'static str>,
}

impl<'a> TableRequest<'a> {
    pub fn new(method: Method, table: &'a str) -> Self {
        Self {
            method,
            table,
            query: Vec::new(),
            body: None,
            prefer: None,
        }
    }

    pub fn param(mut self, key: &'a str, value: impl Into<String>) -> Self {
        self.query.push((key, value.into()));
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn prefer(mut self, prefer: &'static str) -> Self {
        self.prefer = Some(prefer);
        self
    }

    fn is_idempotent(&self) -> bool {
        self.method == Method::GET || self.method == Method::DELETE
    }
}

pub struct PostgrestClient {
    http: Client,
    rest_url: String,
    api_key: String,
    breaker: Arc<CircuitBreaker>,
    max_retries: u32,
    base_delay: Duration,
}

impl std::fmt::Debug for PostgrestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgrestClient")
            .field("rest_url", &self.rest_url)
            .finish_non_exhaustive()
    }
}

impl PostgrestClient {
    pub fn new(
        settings: PostgrestSettings,
        breaker: Arc<CircuitBreaker>,
    ) -> Result<Self, PostgrestError> {
        let http = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| PostgrestError::Client(e.to_string()))?;

        Ok(Self {
            http,
            rest_url: format!("{}/rest/v1", settings.base_url.trim_end_matches('/')),
            api_key: settings.api_key,
            breaker,
            max_retries: settings.max_retries,
            base_delay: settings.base_delay,
        })
    }

    pub fn table_url(&self, table: &str) -> String {
        format!("{}/{table}", self.rest_url)
    }

    /// Execute a request, returning the decoded JSON body (`Value::Null` for
    /// an empty body).
    pub fn execute(&self, request: &TableRequest<'_>) -> Result<Value, PostgrestError> {
        let attempts = if request.is_idempotent() {
            self.max_retries + 1
        } else {
            1
        };
        let mut last_error = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                debug!(table = request.table, attempt, ?delay, "retrying database request");
                std::thread::sleep(delay);
            }

            if !self.breaker.is_allowed() {
                return Err(PostgrestError::CircuitOpen {
                    remaining_secs: self.breaker.remaining_cooldown().as_secs(),
                });
            }

            match self.send_once(request) {
                Ok(value) => {
                    self.breaker.record_success();
                    return Ok(value);
                }
                Err(e) if e.is_transient() => {
                    warn!(table = request.table, attempt, error = %e, "transient database failure");
                    self.breaker.record_failure();
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| PostgrestError::Network("no attempt made".into())))
    }

    fn send_once(&self, request: &TableRequest<'_>) -> Result<Value, PostgrestError> {
        let mut builder = self
            .http
            .request(request.method.clone(), self.table_url(request.table))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .query(&request.query);
        if let Some(prefer) = request.prefer {
            builder = builder.header("Prefer", prefer);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .map_err(|e| PostgrestError::Network(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .map_err(|e| PostgrestError::Network(e.to_string()))?;

        if status == StatusCode::UNAUTHORIZED {
            return Err(PostgrestError::Unauthorized(error_message(&text)));
        }
        if !status.is_success() {
            return Err(PostgrestError::Status {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| PostgrestError::Decode(e.to_string()))
    }
}

/// PostgREST error bodies are `{"message": ..., "details": ..., "hint": ...}`.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.chars().take(200).collect())
}
