//! Batch scanning with concurrency control.
//!
//! - Concurrency is capped with a semaphore, which bounds concurrent
//!   classifier calls (the throughput bottleneck)
//! - A record whose scan exceeds the per-record timeout is marked failed;
//!   the batch carries on
//! - Results come back in input order
//!
//! # Example
//!
//! ```rust,ignore
//! use shield_core::{Scanner, Taxonomy};
//!
//! let scanner = Scanner::builtin(Taxonomy::PersuasionPressure)?;
//! let batch = scanner.scan_batch(&["first text", "second text"], 5).await;
//! for item in batch.sorted_by_score() {
//!     println!("{}: {:?}", item.index, item.report.as_ref().map(|r| r.score));
//! }
//! ```

use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, instrument, warn};

use super::Scanner;
use crate::error::Error;
use crate::report::ScanReport;

/// Default cap on concurrently scanned records.
pub const DEFAULT_MAX_CONCURRENT: usize = 5;

/// Configuration for batch scanning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Maximum records scanned at once (at least 1)
    pub max_concurrent: usize,
    /// Ceiling on one record's scan, excluding time spent queued
    pub record_timeout_ms: Option<u64>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            record_timeout_ms: None,
        }
    }
}

impl BatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max.max(1);
        self
    }

    pub fn with_record_timeout(mut self, timeout_ms: u64) -> Self {
        self.record_timeout_ms = Some(timeout_ms);
        self
    }
}

/// Outcome for one record of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    /// Position of the record in the input
    pub index: usize,
    pub success: bool,
    pub report: Option<ScanReport>,
    pub error: Option<String>,
}

impl BatchItem {
    pub fn success(index: usize, report: ScanReport) -> Self {
        Self {
            index,
            success: true,
            report: Some(report),
            error: None,
        }
    }

    pub fn failure(index: usize, error: String) -> Self {
        Self {
            index,
            success: false,
            report: None,
            error: Some(error),
        }
    }

    fn score(&self) -> Option<u8> {
        self.report.as_ref().map(|r| r.score)
    }
}

/// Results of a batch, in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub items: Vec<BatchItem>,
    pub success_count: usize,
    pub failure_count: usize,
}

impl BatchReport {
    pub fn from_items(mut items: Vec<BatchItem>) -> Self {
        items.sort_by_key(|item| item.index);

        let success_count = items.iter().filter(|item| item.success).count();
        let failure_count = items.len() - success_count;

        Self {
            items,
            success_count,
            failure_count,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failure_count == 0
    }

    /// Report per record, `None` where the record failed.
    pub fn reports(&self) -> Vec<Option<&ScanReport>> {
        self.items.iter().map(|item| item.report.as_ref()).collect()
    }

    /// Successful records, highest score first; ties keep input order.
    pub fn sorted_by_score(&self) -> Vec<&BatchItem> {
        let mut items: Vec<&BatchItem> =
            self.items.iter().filter(|item| item.success).collect();
        items.sort_by(|a, b| b.score().cmp(&a.score()));
        items
    }

    /// `(index, error)` for every failed record.
    pub fn errors(&self) -> Vec<(usize, &str)> {
        self.items
            .iter()
            .filter(|item| !item.success)
            .filter_map(|item| item.error.as_deref().map(|e| (item.index, e)))
            .collect()
    }

    /// Successful records whose report is degraded.
    pub fn degraded_count(&self) -> usize {
        self.items
            .iter()
            .filter_map(|item| item.report.as_ref())
            .filter(|report| report.is_degraded())
            .count()
    }
}

impl Scanner {
    /// Scan many texts with at most `max_concurrent` in flight.
    pub async fn scan_batch<S: AsRef<str>>(
        &self,
        texts: &[S],
        max_concurrent: usize,
    ) -> BatchReport {
        let config = BatchConfig::new().with_max_concurrent(max_concurrent);
        self.scan_batch_with(texts, &config).await
    }

    /// Scan many texts under a batch configuration.
    #[instrument(
        skip(self, texts, config),
        fields(records = texts.len(), max_concurrent = config.max_concurrent)
    )]
    pub async fn scan_batch_with<S: AsRef<str>>(
        &self,
        texts: &[S],
        config: &BatchConfig,
    ) -> BatchReport {
        if texts.is_empty() {
            return BatchReport::default();
        }

        let semaphore = Semaphore::new(config.max_concurrent.max(1));
        let timeout = config.record_timeout_ms.map(Duration::from_millis);

        let tasks = texts.iter().enumerate().map(|(index, text)| {
            let semaphore = &semaphore;
            async move {
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(e) => return BatchItem::failure(index, e.to_string()),
                };

                let scan = self.scan(text.as_ref());
                match timeout {
                    Some(limit) => match tokio::time::timeout(limit, scan).await {
                        Ok(report) => BatchItem::success(index, report),
                        Err(_) => {
                            let error = Error::timeout(limit.as_millis() as u64);
                            warn!(index, error = %error, "record skipped");
                            BatchItem::failure(index, error.to_string())
                        }
                    },
                    None => BatchItem::success(index, scan.await),
                }
            }
        });

        let report = BatchReport::from_items(join_all(tasks).await);
        debug!(
            succeeded = report.success_count,
            failed = report.failure_count,
            degraded = report.degraded_count(),
            "batch complete"
        );
        report
    }
}
