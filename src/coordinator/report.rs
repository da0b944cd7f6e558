use crate::delivery::DeliveryOutcome;

/// How a cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No new records: no delivery, no cursor write.
    Idle,
    /// Batch accepted and the advanced cursor persisted.
    Committed { status: u16, files: usize },
    /// Batch not accepted; nothing was committed.
    DeliveryFailed(DeliveryOutcome),
    /// Batch accepted, cursor advanced in memory, but the snapshot write failed.
    PersistFailed { status: u16, error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: u64,
    pub files_discovered: usize,
    pub files_failed: usize,
    pub files_truncated: usize,
    pub records: usize,
    pub dropped_lines: usize,
    pub outcome: CycleOutcome,
}

impl CycleReport {
    pub(crate) fn new(cycle: u64, files_discovered: usize) -> Self {
        Self {
            cycle,
            files_discovered,
            files_failed: 0,
            files_truncated: 0,
            records: 0,
            dropped_lines: 0,
            outcome: CycleOutcome::Idle,
        }
    }

    /// Whether this cycle advanced the committed cursor.
    pub fn advanced(&self) -> bool {
        matches!(
            self.outcome,
            CycleOutcome::Committed { .. } | CycleOutcome::PersistFailed { .. }
        )
    }
}
