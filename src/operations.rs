use std::collections::VecDeque;
use std::time::SystemTime;

use serde::Serialize;

pub const DEFAULT_OPERATION_LOG_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EditOperationKind {
    ImageLoaded,
    Adjustment,
    Filter,
    CropRotate,
    Reset,
    Preset,
    Undo,
    Redo,
    HistoryCleared,
    Export,
}

#[derive(Debug, Clone, Serialize)]
/// Informational log entry. Not reversible; see `EditCommand` for that.
pub struct EditOperation {
    pub kind: EditOperationKind,
    pub description: String,
    pub timestamp: SystemTime,
}

#[derive(Debug, Clone)]
/// Bounded FIFO of recent operations.
pub struct OperationLog {
    entries: VecDeque<EditOperation>,
    capacity: usize,
}

impl Default for OperationLog {
    fn default() -> Self {
        Self::new(DEFAULT_OPERATION_LOG_CAPACITY)
    }
}

impl OperationLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_OPERATION_LOG_CAPACITY)),
            capacity,
        }
    }

    pub fn record(&mut self, kind: EditOperationKind, description: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(EditOperation {
            kind,
            description: description.into(),
            timestamp: SystemTime::now(),
        });
    }

    /// Entries oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &EditOperation> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&EditOperation> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
