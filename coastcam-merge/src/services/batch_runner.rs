//! Parallel batch runner
//!
//! Runs one task per day-unit on a bounded pool and joins every outcome into
//! a [`RunSummary`]. Tasks share only the read-only roster; a failing day
//! does not stop its siblings.

use crate::error::MergeError;
use crate::services::day_merger::{DayMerger, DayOutcome, DayUnit};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Counts over a whole run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub days_processed: usize,
    pub days_failed: usize,
    pub units_merged: usize,
    pub units_failed: usize,
    pub files_skipped: usize,
    /// Day and unit failures grouped by error kind
    pub failures_by_kind: BTreeMap<String, usize>,
    pub failed_days: Vec<String>,
}

impl RunSummary {
    /// No day or unit failed
    pub fn is_clean(&self) -> bool {
        self.days_failed == 0 && self.units_failed == 0
    }

    pub fn record_outcome(&mut self, outcome: &DayOutcome) {
        self.days_processed += 1;
        self.units_merged += outcome.merged.len();
        self.units_failed += outcome.failures.len();
        self.files_skipped += outcome.skipped_files;
        for failure in &outcome.failures {
            *self.failures_by_kind.entry(failure.kind.clone()).or_insert(0) += 1;
        }
    }

    pub fn record_day_failure(&mut self, day: &DayUnit, error: &MergeError) {
        self.days_failed += 1;
        *self.failures_by_kind.entry(error.kind().to_string()).or_insert(0) += 1;
        self.failed_days.push(day.to_string());
    }

    fn record(&mut self, day: &DayUnit, result: &Result<DayOutcome, MergeError>) {
        match result {
            Ok(outcome) => self.record_outcome(outcome),
            Err(e) => self.record_day_failure(day, e),
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} days processed ({} failed), {} images merged ({} failed), {} files skipped",
            self.days_processed + self.days_failed,
            self.days_failed,
            self.units_merged,
            self.units_failed,
            self.files_skipped
        )?;
        for (kind, count) in &self.failures_by_kind {
            write!(f, "\n  {}: {}", kind, count)?;
        }
        Ok(())
    }
}

/// Merge every day-unit with at most `workers` running at once
pub async fn run_days(merger: Arc<DayMerger>, days: Vec<DayUnit>, workers: usize) -> RunSummary {
    let total = days.len();
    let workers = workers.max(1);

    tracing::info!(day_units = total, workers, "Starting batch");

    let results: Vec<(DayUnit, Result<DayOutcome, MergeError>)> = stream::iter(days)
        .map(|day| {
            let merger = merger.clone();
            async move {
                tracing::debug!(day = %day, "Worker starting day-unit");
                let result = merger.merge_day(&day).await;
                if let Err(e) = &result {
                    tracing::error!(day = %day, kind = e.kind(), error = %e, "Day-unit failed");
                }
                (day, result)
            }
        })
        .buffer_unordered(workers)
        .collect()
        .await;

    let mut summary = RunSummary::default();
    for (day, result) in &results {
        summary.record(day, result);
    }

    tracing::info!(
        days = total,
        days_failed = summary.days_failed,
        units_merged = summary.units_merged,
        units_failed = summary.units_failed,
        "Batch completed"
    );

    summary
}

/// Merge a single timestamp
pub async fn run_timestamp(merger: &DayMerger, day: &DayUnit, timestamp: i64) -> RunSummary {
    let result = merger.merge_timestamp(day, timestamp).await;
    if let Err(e) = &result {
        tracing::error!(day = %day, timestamp, error = %e, "Timestamp merge failed");
    }

    let mut summary = RunSummary::default();
    summary.record(day, &result);
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::day_merger::UnitFailure;
    use crate::storage::StoreError;

    #[test]
    fn test_summary_aggregation() {
        let day = DayUnit::new("s", "2019", "347_Dec.13");
        let mut summary = RunSummary::default();
        assert!(summary.is_clean());

        summary.record_outcome(&DayOutcome {
            day: day.clone(),
            merged: Vec::new(),
            failures: vec![UnitFailure {
                timestamp: 1000,
                kind: "rectification".to_string(),
                message: "boom".to_string(),
            }],
            skipped_files: 2,
        });
        summary.record_day_failure(
            &DayUnit::new("s", "2019", "348_Dec.14"),
            &MergeError::Storage(StoreError::InvalidKey("x".to_string())),
        );

        assert!(!summary.is_clean());
        assert_eq!(summary.days_processed, 1);
        assert_eq!(summary.days_failed, 1);
        assert_eq!(summary.units_failed, 1);
        assert_eq!(summary.files_skipped, 2);
        assert_eq!(summary.failures_by_kind.get("rectification"), Some(&1));
        assert_eq!(summary.failures_by_kind.get("storage_io"), Some(&1));
        assert_eq!(summary.failed_days, vec!["s/2019/348_Dec.14"]);
        assert!(summary.to_string().starts_with("2 days processed (1 failed)"));
    }
}
