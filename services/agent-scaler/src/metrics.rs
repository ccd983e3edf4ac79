//! Occupancy metrics.
//!
//! Metrics are written as CloudWatch Embedded Metric Format documents, one
//! line per job state. Lambda forwards stdout to CloudWatch Logs, which
//! extracts the `JobCount` metric with `AutoScalingGroupName` and `State`
//! dimensions.

use std::io::Write;

use async_trait::async_trait;
use fleet_reconcile::OccupancyReport;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::ScalerError;

/// Metric name for job counts.
pub const JOB_COUNT_METRIC: &str = "JobCount";

/// Sink for point-in-time occupancy counters.
#[async_trait]
pub trait MetricsPublisher: Send + Sync {
    async fn publish(&self, fleet: &str, report: &OccupancyReport) -> Result<(), ScalerError>;
}

/// Build the EMF documents for one report.
pub fn emf_documents(
    namespace: &str,
    fleet: &str,
    report: &OccupancyReport,
    timestamp_ms: i64,
) -> Vec<Value> {
    report
        .iter()
        .map(|(state, count)| {
            json!({
                "_aws": {
                    "Timestamp": timestamp_ms,
                    "CloudWatchMetrics": [{
                        "Namespace": namespace,
                        "Dimensions": [["AutoScalingGroupName", "State"]],
                        "Metrics": [{"Name": JOB_COUNT_METRIC, "Unit": "Count"}]
                    }]
                },
                "AutoScalingGroupName": fleet,
                "State": state,
                JOB_COUNT_METRIC: count
            })
        })
        .collect()
}

/// Writes EMF documents to stdout.
pub struct EmfMetrics {
    namespace: String,
}

impl EmfMetrics {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }
}

#[async_trait]
impl MetricsPublisher for EmfMetrics {
    async fn publish(&self, fleet: &str, report: &OccupancyReport) -> Result<(), ScalerError> {
        let documents = emf_documents(
            &self.namespace,
            fleet,
            report,
            chrono::Utc::now().timestamp_millis(),
        );

        let mut out = std::io::stdout().lock();
        for document in &documents {
            writeln!(out, "{}", document).map_err(|e| ScalerError::Metrics(e.to_string()))?;
        }
        out.flush().map_err(|e| ScalerError::Metrics(e.to_string()))?;

        debug!(fleet = %fleet, documents = documents.len(), "Published occupancy metrics");
        Ok(())
    }
}

/// Keeps published reports in memory.
#[derive(Default)]
pub struct RecordingMetrics {
    published: Mutex<Vec<(String, OccupancyReport)>>,
    fail: bool,
}

impl RecordingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// A publisher that records and then fails every call.
    pub fn failing() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub async fn published(&self) -> Vec<(String, OccupancyReport)> {
        self.published.lock().await.clone()
    }
}

#[async_trait]
impl MetricsPublisher for RecordingMetrics {
    async fn publish(&self, fleet: &str, report: &OccupancyReport) -> Result<(), ScalerError> {
        self.published
            .lock()
            .await
            .push((fleet.to_string(), report.clone()));

        if self.fail {
            return Err(ScalerError::Metrics("recording metrics configured to fail".to_string()));
        }
        Ok(())
    }
}
