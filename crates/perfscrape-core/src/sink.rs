//! Metric records and the shared merge point tasks write into.
//!
//! Every task of a scrape gets a [`MetricSink`] handle onto one
//! [`MergePoint`]. The merge point holds the records, the per-task outcomes,
//! and a single `open` flag, all behind one mutex. [`MergePoint::close`]
//! flips the flag exactly once. After that, writes and outcome updates from
//! straggler tasks are discarded, so a task finishing at the deadline is
//! either fully in the report or reported as pending, never both.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SinkError;
use crate::outcome::{TaskReport, TaskStatus};

/// Exposition type of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Gauge,
    Counter,
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gauge => write!(f, "gauge"),
            Self::Counter => write!(f, "counter"),
        }
    }
}

/// One emitted sample: identity, kind, value, and label pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub name: String,
    #[serde(default)]
    pub help: String,
    pub kind: MetricKind,
    pub value: f64,
    #[serde(default)]
    pub labels: Vec<(String, String)>,
}

impl MetricRecord {
    pub fn gauge(name: impl Into<String>, help: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            kind: MetricKind::Gauge,
            value,
            labels: Vec::new(),
        }
    }

    pub fn counter(name: impl Into<String>, help: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            kind: MetricKind::Counter,
            value,
            labels: Vec::new(),
        }
    }

    /// Builder-style label append.
    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.push((key.into(), value.into()));
        self
    }

    pub fn label_value(&self, key: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Everything the merge point held when it was closed.
#[derive(Debug, Clone)]
pub struct Finalized {
    pub records: Vec<MetricRecord>,
    /// Task reports in registration order.
    pub tasks: Vec<(String, TaskReport)>,
    /// Records dropped because the queue was full.
    pub dropped_full: u64,
}

struct MergeState {
    open: bool,
    records: Vec<MetricRecord>,
    tasks: Vec<(String, TaskReport)>,
    dropped_full: u64,
}

/// Bounded fan-in point shared by all tasks of one scrape.
pub struct MergePoint {
    capacity: usize,
    state: Mutex<MergeState>,
}

impl MergePoint {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(MergeState {
                open: true,
                records: Vec::new(),
                tasks: Vec::new(),
                dropped_full: 0,
            }),
        }
    }

    // Tasks panic outside the lock, so a poisoned guard still holds
    // consistent data.
    fn lock(&self) -> MutexGuard<'_, MergeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a task as pending. Must happen before the task starts.
    pub fn register(&self, task: &str) {
        let mut state = self.lock();
        if !state.tasks.iter().any(|(name, _)| name == task) {
            state.tasks.push((task.to_string(), TaskReport::pending()));
        }
    }

    /// A writer handle for tasks.
    pub fn sink(self: &Arc<Self>) -> MetricSink {
        MetricSink {
            merge: Arc::clone(self),
        }
    }

    fn push(&self, record: MetricRecord) -> Result<(), SinkError> {
        let mut state = self.lock();
        if !state.open {
            return Err(SinkError::Closed);
        }
        if state.records.len() >= self.capacity {
            state.dropped_full += 1;
            return Err(SinkError::Full {
                capacity: self.capacity,
            });
        }
        state.records.push(record);
        Ok(())
    }

    /// Move a registered task out of `Pending`.
    ///
    /// Returns `false` when the merge point is already closed, the task is
    /// unknown, or its outcome was already recorded.
    pub fn finish(
        &self,
        task: &str,
        status: TaskStatus,
        duration: Duration,
        error: Option<String>,
    ) -> bool {
        debug_assert!(status.is_terminal());
        let mut state = self.lock();
        if !state.open {
            return false;
        }
        let Some((_, report)) = state.tasks.iter_mut().find(|(name, _)| name == task) else {
            return false;
        };
        if report.status.is_terminal() {
            return false;
        }
        report.status = status;
        report.duration = duration;
        report.error = error;
        true
    }

    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    /// Stop accepting writes and hand over the contents.
    ///
    /// Only the first call returns `Some`. Tasks still pending get
    /// `pending_duration` as their duration.
    pub fn close(&self, pending_duration: Duration) -> Option<Finalized> {
        let mut state = self.lock();
        if !state.open {
            return None;
        }
        state.open = false;
        for (_, report) in state.tasks.iter_mut() {
            if !report.status.is_terminal() {
                report.duration = pending_duration;
            }
        }
        Some(Finalized {
            records: std::mem::take(&mut state.records),
            tasks: state.tasks.clone(),
            dropped_full: state.dropped_full,
        })
    }
}

/// Append-only, thread-safe write handle onto a [`MergePoint`].
///
/// Writes never block beyond the merge point's mutex. Once the scrape is
/// finalized they return [`SinkError::Closed`] and the record is discarded.
#[derive(Clone)]
pub struct MetricSink {
    merge: Arc<MergePoint>,
}

impl MetricSink {
    pub fn emit(&self, record: MetricRecord) -> Result<(), SinkError> {
        self.merge.push(record)
    }

    pub fn emit_all(
        &self,
        records: impl IntoIterator<Item = MetricRecord>,
    ) -> Result<(), SinkError> {
        for record in records {
            self.emit(record)?;
        }
        Ok(())
    }

    /// Whether the scrape is still accepting records.
    pub fn is_open(&self) -> bool {
        self.merge.is_open()
    }
}
