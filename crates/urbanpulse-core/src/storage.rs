//! Hand-off of validated records to a persistence collaborator.

use std::future::Future;
use std::pin::Pin;

use serde::Serialize;
use thiserror::Error;

use crate::{AqiReading, TrafficRecord};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store rejected record: {0}")]
    Rejected(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Write contract of the persistence layer.
pub trait ReadingStore: Send + Sync {
    fn create_aqi<'a>(
        &'a self,
        reading: &'a AqiReading,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>>;

    fn create_traffic_data<'a>(
        &'a self,
        record: &'a TrafficRecord,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>>;
}

/// Outcome of a best-effort batch write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreReport {
    pub stored: usize,
    pub failed: usize,
}

impl StoreReport {
    fn record(&mut self, outcome: Result<(), StoreError>, kind: &str, index: usize) {
        match outcome {
            Ok(()) => self.stored += 1,
            Err(error) => {
                self.failed += 1;
                tracing::warn!(kind, index, error = %error, "failed to persist record");
            }
        }
    }
}

/// Writes every reading, continuing past individual failures.
pub async fn store_aqi_readings(store: &dyn ReadingStore, readings: &[AqiReading]) -> StoreReport {
    let mut report = StoreReport::default();
    for (index, reading) in readings.iter().enumerate() {
        report.record(store.create_aqi(reading).await, "aqi", index);
    }
    report
}

/// Writes every traffic record, continuing past individual failures.
pub async fn store_traffic_records(
    store: &dyn ReadingStore,
    records: &[TrafficRecord],
) -> StoreReport {
    let mut report = StoreReport::default();
    for (index, record) in records.iter().enumerate() {
        report.record(store.create_traffic_data(record).await, "traffic", index);
    }
    report
}
