// Per-operation tracking: timing, record counts and completion logging
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Status of a tracked operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationStatus {
    InProgress,
    Completed,
    Failed,
}

/// Summary of one finished operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationReport {
    pub operation_id: String,
    pub operation_name: String,
    pub status: OperationStatus,
    pub start_time: DateTime<Utc>,
    pub duration_ms: u64,
    pub records_processed: u64,
    /// Records per second, when the operation moved any
    pub throughput: Option<f64>,
    pub error: Option<String>,
}

/// Tracks a single operation from start to completion.
///
/// Trackers are owned by the operation that created them; nothing is shared
/// between operations.
#[derive(Debug)]
pub struct OperationTracker {
    operation_id: String,
    operation_name: String,
    start_time: DateTime<Utc>,
    started: Instant,
    records_processed: u64,
}

impl OperationTracker {
    pub fn start(operation_name: &str) -> Self {
        let operation_id = Uuid::new_v4().to_string();
        info!(
            operation_id = %operation_id,
            operation_name = operation_name,
            "Started operation"
        );
        Self {
            operation_id,
            operation_name: operation_name.to_string(),
            start_time: Utc::now(),
            started: Instant::now(),
            records_processed: 0,
        }
    }

    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    /// Update the number of records handled so far
    pub fn update_progress(&mut self, processed: u64) {
        self.records_processed = processed;
        debug!(
            operation_id = %self.operation_id,
            processed = processed,
            "Operation progress updated"
        );
    }

    pub fn complete_success(self) -> OperationReport {
        let report = self.report(OperationStatus::Completed, None);
        info!(
            operation_id = %report.operation_id,
            operation_name = %report.operation_name,
            duration_ms = report.duration_ms,
            records = report.records_processed,
            throughput = ?report.throughput,
            "Operation completed successfully"
        );
        report
    }

    pub fn complete_failure(self, err: &str) -> OperationReport {
        let report = self.report(OperationStatus::Failed, Some(err.to_string()));
        error!(
            operation_id = %report.operation_id,
            operation_name = %report.operation_name,
            duration_ms = report.duration_ms,
            error = err,
            "Operation failed"
        );
        report
    }

    fn report(self, status: OperationStatus, error: Option<String>) -> OperationReport {
        let duration_ms = self.started.elapsed().as_millis() as u64;
        let throughput = if duration_ms > 0 && self.records_processed > 0 {
            Some(self.records_processed as f64 / (duration_ms as f64 / 1000.0))
        } else {
            None
        };

        OperationReport {
            operation_id: self.operation_id,
            operation_name: self.operation_name,
            status,
            start_time: self.start_time,
            duration_ms,
            records_processed: self.records_processed,
            throughput,
            error,
        }
    }
}
