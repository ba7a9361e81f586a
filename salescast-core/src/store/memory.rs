//! In-process forecast store, with optional injected faults for tests.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::{ForecastStore, StorageError};
use crate::domain::{ForecastRecord, Granularity};

/// Failure a [`MemoryForecastStore`] can be told to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreFault {
    RejectDelete,
    RejectInsert,
    /// Insert "succeeds" but confirms no row.
    UnconfirmedInsert,
    RejectRead,
}

#[derive(Debug, Default)]
pub struct MemoryForecastStore {
    rows: Mutex<Vec<ForecastRecord>>,
    faults: HashMap<Granularity, StoreFault>,
}

impl MemoryForecastStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fault(mut self, granularity: Granularity, fault: StoreFault) -> Self {
        self.faults.insert(granularity, fault);
        self
    }

    fn rows(&self) -> MutexGuard<'_, Vec<ForecastRecord>> {
        self.rows.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn fault(&self, granularity: Granularity) -> Option<StoreFault> {
        self.faults.get(&granularity).copied()
    }

    /// Every stored row for the granularity, oldest first.
    pub fn records(&self, granularity: Granularity) -> Vec<ForecastRecord> {
        self.rows()
            .iter()
            .filter(|r| r.granularity == granularity)
            .cloned()
            .collect()
    }
}

impl ForecastStore for MemoryForecastStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn delete(&self, granularity: Granularity) -> Result<(), StorageError> {
        if self.fault(granularity) == Some(StoreFault::RejectDelete) {
            return Err(StorageError::Rejected {
                operation: "delete",
                message: "injected fault".into(),
            });
        }
        self.rows().retain(|r| r.granularity != granularity);
        Ok(())
    }

    fn insert(&self, record: &ForecastRecord) -> Result<ForecastRecord, StorageError> {
        match self.fault(record.granularity) {
            Some(StoreFault::RejectInsert) => Err(StorageError::Rejected {
                operation: "insert",
                message: "injected fault".into(),
            }),
            Some(StoreFault::UnconfirmedInsert) => Err(StorageError::Unconfirmed {
                granularity: record.granularity,
            }),
            _ => {
                self.rows().push(record.clone());
                Ok(record.clone())
            }
        }
    }

    fn get_latest(&self, granularity: Granularity) -> Result<Option<ForecastRecord>, StorageError> {
        if self.fault(granularity) == Some(StoreFault::RejectRead) {
            return Err(StorageError::Unreachable {
                operation: "read",
                message: "injected fault".into(),
            });
        }
        Ok(self
            .rows()
            .iter()
            .filter(|r| r.granularity == granularity)
            .max_by_key(|r| r.generated_at)
            .cloned())
    }
}
