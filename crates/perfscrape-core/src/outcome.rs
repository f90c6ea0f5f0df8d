//! Per-task outcome bookkeeping for one scrape.

use std::time::Duration;

use serde::{Serialize, Serializer};

/// Task state within one scrape. Transitions out of `Pending` at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// Not finished when the scrape was finalized; reported as a timeout.
    Pending,
    Success,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Label used in logs and reports.
    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "timeout",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for TaskStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Final report for one task of one scrape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskReport {
    pub status: TaskStatus,
    /// Run time for finished tasks; time until finalization for pending ones.
    #[serde(serialize_with = "serialize_secs")]
    pub duration: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskReport {
    pub(crate) fn pending() -> Self {
        Self {
            status: TaskStatus::Pending,
            duration: Duration::ZERO,
            error: None,
        }
    }

    pub fn timed_out(&self) -> bool {
        self.status == TaskStatus::Pending
    }

    pub fn succeeded(&self) -> bool {
        self.status == TaskStatus::Success
    }
}

fn serialize_secs<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(d.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_reads_as_timeout() {
        assert_eq!(TaskStatus::Pending.to_string(), "timeout");
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskReport::pending().timed_out());
    }

    #[test]
    fn report_serializes_seconds() {
        let r = TaskReport {
            status: TaskStatus::Success,
            duration: Duration::from_millis(1500),
            error: None,
        };
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["duration"], 1.5);
        assert!(json.get("error").is_none());
    }
}
