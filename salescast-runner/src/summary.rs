//! Run summary: the one externally observable report of a pipeline run.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use salescast_core::domain::Granularity;

/// Final state of one granularity within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    #[serde(rename = "success")]
    Success,
    #[serde(rename = "failed (storage)")]
    FailedStorage,
    #[serde(rename = "failed (exception)")]
    FailedException,
    #[serde(rename = "skipped")]
    Skipped,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::FailedStorage => "failed (storage)",
            Outcome::FailedException => "failed (exception)",
            Outcome::Skipped => "skipped",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::FailedStorage | Outcome::FailedException)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Cleaned records the run trained on (0 if the fetch failed).
    pub record_count: usize,
    /// blake3 of the cleaned record set; `None` if the fetch failed.
    pub dataset_hash: Option<String>,
    pub outcomes: BTreeMap<Granularity, Outcome>,
    /// Error descriptions in the order they occurred.
    pub errors: Vec<String>,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        self.outcomes.values().any(Outcome::is_failure)
    }

    pub fn outcome(&self, granularity: Granularity) -> Option<Outcome> {
        self.outcomes.get(&granularity).copied()
    }

    /// One-line rendering for logs and the CLI, e.g.
    /// `monthly=success yearly=skipped`.
    pub fn outcome_line(&self) -> String {
        self.outcomes
            .iter()
            .map(|(g, o)| format!("{g}={o}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
