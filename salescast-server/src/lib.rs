//! Salescast Server: HTTP API over the forecast store and run queue.
//!
//! - `GET /` liveness
//! - `POST /train_and_store` guarded trigger, answers 202 and enqueues a run
//! - `GET /predict?granularity=monthly|yearly` latest stored forecast

pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

use std::future::Future;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use state::{AppState, RunTrigger};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::root))
        .route("/train_and_store", post(routes::train_and_store))
        .route("/predict", get(routes::predict))
        .route("/predict/", get(routes::predict))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `shutdown` resolves, then finish in-flight requests.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("salescast-server v{} listening on {}", env!("CARGO_PKG_VERSION"), addr);
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
