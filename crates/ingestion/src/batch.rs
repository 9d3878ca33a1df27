//! Batch ingestion across a date range.

use futures::stream::{self, StreamExt};
use metrics::counter;
use tracing::{error, info, instrument};

use swath_common::{DayKey, SwathError};

use crate::day::{DayIngester, DayOutcome};
use crate::error::Result;

/// Counts from one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    /// Days whose pipeline finished, including cached and no-data days.
    pub completed: usize,
    pub failed: usize,
    pub cached: usize,
    pub no_data: usize,
}

/// Runs the per-day pipeline over an inclusive date range.
///
/// Every day is its own task. A failure or panic in one day is logged and
/// counted and never cancels the others.
#[derive(Clone)]
pub struct BatchDriver {
    ingester: DayIngester,
    concurrency: usize,
}

impl BatchDriver {
    pub fn new(ingester: DayIngester, concurrency: usize) -> Self {
        Self {
            ingester,
            concurrency: concurrency.max(1),
        }
    }

    pub fn ingester(&self) -> &DayIngester {
        &self.ingester
    }

    /// Ingest every day from `start` to `end` inclusive.
    ///
    /// Only an inverted range is an error, and it is rejected before any work.
    #[instrument(skip(self), fields(start = %start, end = %end))]
    pub async fn run(&self, start: DayKey, end: DayKey) -> Result<BatchSummary> {
        if start > end {
            return Err(SwathError::InvalidParameter {
                param: "start".to_string(),
                message: format!("start date {} is after end date {}", start, end),
            }
            .into());
        }

        let days = DayKey::range_inclusive(start, end);
        info!(days = days.len(), concurrency = self.concurrency, "Starting batch");

        let summary = stream::iter(days)
            .map(|day| {
                let ingester = self.ingester.clone();
                async move { (day, tokio::spawn(async move { ingester.run(day).await }).await) }
            })
            .buffer_unordered(self.concurrency)
            .fold(BatchSummary::default(), |mut summary, (day, joined)| async move {
                summary.total += 1;
                match joined {
                    Ok(Ok(result)) => {
                        summary.completed += 1;
                        counter!("swath_days_completed_total").increment(1);
                        match result.outcome {
                            DayOutcome::Cached => summary.cached += 1,
                            DayOutcome::NoData { .. } => summary.no_data += 1,
                            DayOutcome::Ingested { .. } => {}
                        }
                    }
                    Ok(Err(e)) => {
                        summary.failed += 1;
                        counter!("swath_days_failed_total").increment(1);
                        error!(date = %day, error = %e, "Day ingestion failed");
                    }
                    Err(e) => {
                        summary.failed += 1;
                        counter!("swath_days_failed_total").increment(1);
                        error!(date = %day, error = %e, "Day ingestion task aborted");
                    }
                }
                summary
            })
            .await;

        info!(
            total = summary.total,
            completed = summary.completed,
            failed = summary.failed,
            cached = summary.cached,
            no_data = summary.no_data,
            "Batch finished"
        );
        Ok(summary)
    }
}
