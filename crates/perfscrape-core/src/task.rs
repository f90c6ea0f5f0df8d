//! Collection task trait and per-invocation context.
//!
//! Every collector implements [`CollectionTask`]: static metadata via
//! [`TaskInfo`] (including the snapshot objects it reads) and a `collect`
//! call that turns its slice of the snapshot into metric records.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::CollectError;
use crate::sink::MetricSink;
use crate::snapshot::Snapshot;

/// Metadata about a collection task.
#[derive(Debug, Clone)]
pub struct TaskInfo {
    /// Unique identifier (e.g. `"cpu"`), used as the `collector` label.
    pub name: &'static str,
    /// One-line human-readable description.
    pub description: &'static str,
    /// Snapshot objects this task reads.
    pub objects: &'static [&'static str],
    /// Whether the task is enabled by the `[defaults]` placeholder.
    pub default_enabled: bool,
}

/// Best-effort cancellation flag shared between a scrape and its tasks.
///
/// Set once the scrape stops waiting. Tasks may poll it between steps; calls
/// into opaque OS primitives cannot be interrupted and simply run to
/// completion in the background.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// What a task sees during one invocation.
pub struct ScrapeContext {
    snapshot: Arc<Snapshot>,
    cancel: CancelToken,
}

impl ScrapeContext {
    pub fn new(snapshot: Arc<Snapshot>, cancel: CancelToken) -> Self {
        Self { snapshot, cancel }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// `Err(Cancelled)` once the scrape has been abandoned.
    pub fn checkpoint(&self) -> Result<(), CollectError> {
        if self.is_cancelled() {
            Err(CollectError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Trait that every collector must implement.
///
/// Implementations must not share mutable state with other tasks and must
/// not keep the snapshot beyond `collect`.
pub trait CollectionTask: Send + Sync {
    /// Task metadata.
    fn info(&self) -> &TaskInfo;

    /// Emit records for this scrape into `sink`.
    fn collect(&self, ctx: &ScrapeContext, sink: &MetricSink) -> Result<(), CollectError>;

    /// Convenience: name from info.
    fn name(&self) -> &'static str {
        self.info().name
    }

    /// Convenience: required objects from info.
    fn required_objects(&self) -> &'static [&'static str] {
        self.info().objects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_is_shared() {
        let token = CancelToken::new();
        let ctx = ScrapeContext::new(Arc::new(Snapshot::new()), token.clone());
        assert!(ctx.checkpoint().is_ok());
        token.cancel();
        assert!(ctx.is_cancelled());
        assert!(matches!(ctx.checkpoint(), Err(CollectError::Cancelled)));
    }
}
