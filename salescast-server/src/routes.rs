//! API route handlers

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use salescast_core::domain::{ForecastPoint, Granularity, ParseGranularityError};
use salescast_core::store::ForecastStore;
use salescast_runner::QueueError;

use crate::auth::require_training_key;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

pub async fn root() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Sales Forecast API is running!".into(),
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub message: String,
    pub run_id: String,
    pub queued_at: DateTime<Utc>,
}

pub async fn train_and_store(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<TriggerResponse>), ApiError> {
    require_training_key(&headers, state.training_key.as_deref())?;
    info!("training trigger accepted");

    let ticket = state.trigger.trigger().map_err(|e| match e {
        QueueError::Closed => ApiError::Unavailable("Run queue is not accepting runs.".into()),
        other => ApiError::Internal(other.to_string()),
    })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(TriggerResponse {
            message: "Training and storing process initiated in background.".into(),
            run_id: ticket.run_id,
            queued_at: ticket.queued_at,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct PredictParams {
    pub granularity: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub granularity: Granularity,
    pub forecast: Vec<ForecastPoint>,
    pub generated_at: DateTime<Utc>,
}

pub async fn predict(
    State(state): State<AppState>,
    Query(params): Query<PredictParams>,
) -> Result<Json<PredictResponse>, ApiError> {
    let raw = params
        .granularity
        .ok_or_else(|| ApiError::Validation("query parameter 'granularity' is required".into()))?;
    let granularity: Granularity = raw
        .parse()
        .map_err(|e: ParseGranularityError| ApiError::Validation(e.to_string()))?;
    info!(%granularity, "predict request");

    // Store backends are blocking.
    let store = state.store.clone();
    let latest = tokio::task::spawn_blocking(move || store.get_latest(granularity))
        .await
        .map_err(|e| ApiError::Internal(format!("Internal server error retrieving forecast: {e}")))?;

    match latest {
        Ok(Some(record)) => {
            info!(%granularity, generated_at = %record.generated_at, "returning stored forecast");
            Ok(Json(PredictResponse {
                granularity: record.granularity,
                forecast: record.forecast_data,
                generated_at: record.generated_at,
            }))
        }
        Ok(None) => {
            warn!(%granularity, "no stored forecast");
            Err(ApiError::NotFound(format!(
                "No forecast found for {granularity}. Training may need to run."
            )))
        }
        Err(e) => {
            error!(%granularity, error = %e, "forecast lookup failed");
            Err(ApiError::Internal(format!(
                "Internal server error retrieving forecast: {e}"
            )))
        }
    }
}
