use crate::config::types::WatchConfig;
use crate::coordinator::report::{CycleOutcome, CycleReport};
use crate::delivery::{DeliveryOutcome, RecordSink};
use crate::source::discover::FileDiscoverer;
use crate::source::tailer::Tailer;
use crate::storage::cursor::{Cursor, CursorError, PendingOffsets};
use crate::storage::traits::CursorStore;
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("cursor error: {0}")]
    Cursor(#[from] CursorError),
}

#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    pub poll_interval: Duration,
    /// Files tailed concurrently within one cycle.
    pub max_concurrent_reads: usize,
}

impl From<&WatchConfig> for CoordinatorOptions {
    fn from(config: &WatchConfig) -> Self {
        Self {
            poll_interval: config.poll_interval,
            max_concurrent_reads: config.max_concurrent_reads,
        }
    }
}

/// Drives discover → tail → deliver → commit cycles.
///
/// The committed cursor lives here and is only advanced after the sink
/// accepts a batch. Cycles take `&mut self`, so two can never run at once.
pub struct CycleCoordinator {
    discoverer: FileDiscoverer,
    tailer: Tailer,
    sink: Arc<dyn RecordSink>,
    store: Arc<dyn CursorStore>,
    cursor: Cursor,
    options: CoordinatorOptions,
    cycles: u64,
}

impl CycleCoordinator {
    /// Loads the committed cursor from `store`.
    ///
    /// An unparseable cursor file is logged and replaced by an empty cursor,
    /// which re-delivers every file from the start. An unreadable one is an
    /// error.
    pub async fn new(
        discoverer: FileDiscoverer,
        tailer: Tailer,
        sink: Arc<dyn RecordSink>,
        store: Arc<dyn CursorStore>,
        options: CoordinatorOptions,
    ) -> Result<Self, CoordinatorError> {
        let cursor = match store.load().await {
            Ok(cursor) => cursor,
            Err(e @ CursorError::Corrupt { .. }) => {
                error!(error = %e, "ignoring unreadable cursor snapshot; files will be re-sent from the start");
                Cursor::new()
            }
            Err(e) => return Err(e.into()),
        };

        info!(files = cursor.len(), "loaded committed cursor");

        Ok(Self {
            discoverer,
            tailer,
            sink,
            store,
            cursor,
            options: CoordinatorOptions {
                max_concurrent_reads: options.max_concurrent_reads.max(1),
                ..options
            },
            cycles: 0,
        })
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run one complete cycle. Never fails: every error is logged and
    /// reflected in the report.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let files = self.discoverer.discover().await;
        self.process_files(files).await
    }

    async fn process_files(&mut self, files: Vec<PathBuf>) -> CycleReport {
        self.cycles += 1;
        let mut report = CycleReport::new(self.cycles, files.len());

        let tailer = &self.tailer;
        let cursor = &self.cursor;
        let results: Vec<_> = stream::iter(files)
            .map(|path| async move {
                let offset = cursor.offset(&path);
                tailer.tail(&path, offset).await
            })
            .buffered(self.options.max_concurrent_reads)
            .collect()
            .await;

        let mut batch = Vec::new();
        let mut pending = PendingOffsets::new();
        for result in results {
            match result {
                Ok(outcome) => {
                    if outcome.truncated {
                        report.files_truncated += 1;
                    }
                    if outcome.dropped_lines > 0 {
                        report.dropped_lines += outcome.dropped_lines;
                        warn!(
                            path = %outcome.path.display(),
                            dropped = outcome.dropped_lines,
                            "dropped malformed lines"
                        );
                    }
                    if outcome.new_offset != self.cursor.offset(&outcome.path) {
                        pending.propose(outcome.path, outcome.new_offset);
                    }
                    batch.extend(outcome.records);
                }
                Err(e) => {
                    report.files_failed += 1;
                    warn!(path = %e.path().display(), error = %e, "skipping file this cycle");
                }
            }
        }

        report.records = batch.len();
        if batch.is_empty() {
            debug!(cycle = report.cycle, files = report.files_discovered, "no new records");
            return report;
        }

        let delivery = self.sink.send(&batch).await;
        drop(batch);

        let status = match delivery {
            DeliveryOutcome::Accepted { status } => status,
            failed => {
                error!(
                    cycle = report.cycle,
                    records = report.records,
                    outcome = %failed,
                    "delivery failed; offsets held back for retry next cycle"
                );
                report.outcome = CycleOutcome::DeliveryFailed(failed);
                return report;
            }
        };

        let files = pending.len();
        self.cursor.commit(pending);

        match self.store.save(&self.cursor).await {
            Ok(()) => {
                info!(
                    cycle = report.cycle,
                    records = report.records,
                    files,
                    status,
                    "forwarded entries"
                );
                report.outcome = CycleOutcome::Committed { status, files };
            }
            Err(e) => {
                error!(
                    cycle = report.cycle,
                    records = report.records,
                    error = %e,
                    "batch delivered but cursor not persisted; a restart will re-send it"
                );
                report.outcome = CycleOutcome::PersistFailed {
                    status,
                    error: e.to_string(),
                };
            }
        }

        report
    }

    /// Run a cycle now and then on every interval tick until `shutdown_rx`
    /// turns true or its sender goes away. A cycle already in flight is
    /// finished before returning.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            interval_ms = self.options.poll_interval.as_millis() as u64,
            root = %self.discoverer.root().display(),
            "coordinator started"
        );

        let mut ticker = tokio::time::interval(self.options.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            tokio::select! {
                biased;
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.run_cycle().await;
                }
            }
        }

        info!(cycles = self.cycles, "coordinator stopped");
    }
}
