//! Shared handler state.

use std::sync::Arc;

use salescast_core::store::ForecastStore;
use salescast_runner::{QueueError, RunQueue, RunTicket};

/// Anything that can accept a fire-and-forget run request.
pub trait RunTrigger: Send + Sync {
    fn trigger(&self) -> Result<RunTicket, QueueError>;
}

impl RunTrigger for RunQueue {
    fn trigger(&self) -> Result<RunTicket, QueueError> {
        self.submit()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ForecastStore>,
    pub trigger: Arc<dyn RunTrigger>,
    /// `None` when the server was started without a training key.
    pub training_key: Option<Arc<str>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ForecastStore>,
        trigger: Arc<dyn RunTrigger>,
        training_key: Option<&str>,
    ) -> Self {
        Self {
            store,
            trigger,
            training_key: training_key.map(Arc::from),
        }
    }
}
