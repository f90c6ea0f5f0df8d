//! Scrape orchestrator: run every enabled task concurrently under one deadline.
//!
//! Per scrape:
//! 1. Ask the provider for one snapshot scoped to the union of task objects
//! 2. Start one named thread per task, all sharing the snapshot read-only
//! 3. Tasks write into a shared [`MergePoint`] through a [`MetricSink`]
//! 4. Wait until every task finished or the deadline elapsed
//! 5. Close the merge point once; stragglers keep running but their output
//!    and outcome are discarded
//! 6. Append duration / success / timeout summary records for every task
//!
//! Tasks cannot be interrupted. A task that overruns is abandoned, and the
//! [`CancelToken`] it holds is set. While an abandoned invocation still runs,
//! later scrapes do not start that task again. They report it as timed out,
//! so each task has at most one straggler thread. Scrapes that merely overlap
//! start their own invocations.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, warn};
use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::config::ScrapeConfig;
use crate::error::{ConfigError, ScrapeError};
use crate::outcome::{TaskReport, TaskStatus};
use crate::provider::SnapshotProvider;
use crate::sink::{MergePoint, MetricRecord, MetricSink};
use crate::task::{CancelToken, CollectionTask, ScrapeContext};

/// Per-task run time metric.
pub const DURATION_METRIC: &str = "perfscrape_collector_duration_seconds";
/// Per-task success indicator metric.
pub const SUCCESS_METRIC: &str = "perfscrape_collector_success";
/// Per-task timeout indicator metric.
pub const TIMEOUT_METRIC: &str = "perfscrape_collector_timeout";

/// Result of one scrape cycle.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeReport {
    pub id: Uuid,
    /// Task records that arrived before the deadline, then summary records.
    pub records: Vec<MetricRecord>,
    /// Outcome per task name.
    pub tasks: BTreeMap<String, TaskReport>,
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    /// Records dropped because the merge queue was full.
    pub dropped_records: u64,
}

impl ScrapeReport {
    pub fn status(&self, task: &str) -> Option<TaskStatus> {
        self.tasks.get(task).map(|r| r.status)
    }

    fn names_with(&self, status: TaskStatus) -> Vec<&str> {
        self.tasks
            .iter()
            .filter(|(_, r)| r.status == status)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn succeeded(&self) -> Vec<&str> {
        self.names_with(TaskStatus::Success)
    }

    pub fn failed(&self) -> Vec<&str> {
        self.names_with(TaskStatus::Failed)
    }

    pub fn timed_out(&self) -> Vec<&str> {
        self.names_with(TaskStatus::Pending)
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        format!(
            "{} ok, {} failed, {} timeout, {} records in {:.3}s",
            self.succeeded().len(),
            self.failed().len(),
            self.timed_out().len(),
            self.records.len(),
            self.elapsed.as_secs_f64()
        )
    }
}

fn serialize_secs<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(d.as_secs_f64())
}

/// Background task invocations that are still running.
///
/// An invocation still pending when its scrape closes is marked abandoned.
/// Only an abandoned invocation blocks a later scrape from starting the same
/// task again; overlapping scrapes that are each within their deadline run
/// independently.
#[derive(Default)]
struct InflightRegistry {
    state: Mutex<InflightState>,
}

#[derive(Default)]
struct InflightState {
    next_id: u64,
    running: HashMap<u64, Invocation>,
}

struct Invocation {
    name: &'static str,
    abandoned: bool,
}

impl InflightRegistry {
    fn lock(&self) -> MutexGuard<'_, InflightState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new invocation of `name`, unless an abandoned one is still
    /// running.
    fn try_start(self: &Arc<Self>, name: &'static str) -> Option<InflightGuard> {
        let mut state = self.lock();
        if state.running.values().any(|inv| inv.abandoned && inv.name == name) {
            return None;
        }
        let id = state.next_id;
        state.next_id += 1;
        state.running.insert(id, Invocation { name, abandoned: false });
        Some(InflightGuard {
            registry: Arc::clone(self),
            id,
        })
    }

    /// Mark the given invocations abandoned if they are still running.
    fn abandon(&self, ids: &[u64]) {
        let mut state = self.lock();
        for id in ids {
            if let Some(inv) = state.running.get_mut(id) {
                inv.abandoned = true;
            }
        }
    }

    fn running(&self) -> usize {
        self.lock().running.len()
    }

    fn abandoned(&self) -> usize {
        self.lock().running.values().filter(|inv| inv.abandoned).count()
    }
}

struct InflightGuard {
    registry: Arc<InflightRegistry>,
    id: u64,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.registry.lock().running.remove(&self.id);
    }
}

/// Runs scrapes over a fixed set of tasks and one snapshot provider.
pub struct Scraper {
    provider: Arc<dyn SnapshotProvider>,
    tasks: Vec<Arc<dyn CollectionTask>>,
    default_timeout: Duration,
    sink_capacity: usize,
    inflight: Arc<InflightRegistry>,
}

impl Scraper {
    pub fn new(
        provider: Arc<dyn SnapshotProvider>,
        tasks: Vec<Arc<dyn CollectionTask>>,
        config: &ScrapeConfig,
    ) -> Self {
        Self {
            provider,
            tasks,
            default_timeout: config.timeout(),
            sink_capacity: config.sink_capacity.max(1),
            inflight: Arc::new(InflightRegistry::default()),
        }
    }

    /// Validate `config`, build its provider, and select tasks from the
    /// built-in catalog.
    pub fn from_config(config: &ScrapeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let provider = config.provider.build()?;
        let tasks = config.select_tasks(crate::tasks::all_tasks())?;
        Ok(Self::new(provider, tasks, config))
    }

    pub fn tasks(&self) -> &[Arc<dyn CollectionTask>] {
        &self.tasks
    }

    pub fn task_names(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|t| t.name()).collect()
    }

    pub fn provider(&self) -> &Arc<dyn SnapshotProvider> {
        &self.provider
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Union of the snapshot objects the enabled tasks read.
    pub fn required_objects(&self) -> BTreeSet<String> {
        objects_for(&self.tasks)
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Task invocations still running, from any scrape.
    pub fn in_flight(&self) -> usize {
        self.inflight.running()
    }

    /// Invocations abandoned at a deadline that have not returned yet.
    pub fn stragglers(&self) -> usize {
        self.inflight.abandoned()
    }

    /// Scrape every task with the configured deadline.
    pub fn scrape(&self) -> Result<ScrapeReport, ScrapeError> {
        self.run_scrape(self.default_timeout)
    }

    /// Scrape every task under `deadline`.
    pub fn run_scrape(&self, deadline: Duration) -> Result<ScrapeReport, ScrapeError> {
        self.run_scrape_filtered(deadline, None)
    }

    /// Scrape under `deadline`, optionally restricted to the named tasks.
    ///
    /// Task failures, panics, and timeouts are reported per task in the
    /// returned report. A provider failure aborts the scrape before any task
    /// starts. A deadline too far out to represent means no deadline.
    pub fn run_scrape_filtered(
        &self,
        deadline: Duration,
        filter: Option<&[String]>,
    ) -> Result<ScrapeReport, ScrapeError> {
        let started = Instant::now();
        let id = Uuid::new_v4();
        let tasks = self.select(filter);

        let objects = objects_for(&tasks);
        debug!(
            "scrape {id}: {} task(s), {} object(s) from {}",
            tasks.len(),
            objects.len(),
            self.provider.name()
        );

        let snapshot = match self.provider.snapshot(&objects) {
            Ok(s) => Arc::new(s),
            Err(e) => {
                error!("scrape {id}: snapshot provider {} failed: {e}", self.provider.name());
                return Err(e.into());
            }
        };

        let merge = Arc::new(MergePoint::new(self.sink_capacity));
        let cancel = CancelToken::new();
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let mut launched: Vec<(&'static str, u64)> = Vec::with_capacity(tasks.len());
        let deadline_at = started.checked_add(deadline);

        for task in &tasks {
            let name = task.name();
            merge.register(name);

            let Some(guard) = self.inflight.try_start(name) else {
                warn!("scrape {id}: collector {name} abandoned by an earlier scrape is still running, not restarted");
                continue;
            };
            let invocation = guard.id;

            let task = Arc::clone(task);
            let ctx = ScrapeContext::new(Arc::clone(&snapshot), cancel.clone());
            let sink = merge.sink();
            let merge_handle = Arc::clone(&merge);
            let done = done_tx.clone();
            let spawned = thread::Builder::new()
                .name(format!("scrape-{name}"))
                .spawn(move || {
                    run_task(task.as_ref(), &ctx, &sink, &merge_handle);
                    drop(guard);
                    let _ = done.send(());
                });

            match spawned {
                Ok(_) => launched.push((name, invocation)),
                Err(e) => {
                    warn!("scrape {id}: could not start collector {name}: {e}");
                    merge.finish(
                        name,
                        TaskStatus::Failed,
                        Duration::ZERO,
                        Some(format!("thread spawn failed: {e}")),
                    );
                }
            }
        }
        drop(done_tx);

        let mut finished = 0usize;
        while finished < launched.len() {
            // A deadline past the end of the clock never fires.
            let received = match deadline_at {
                Some(at) => {
                    let remaining = at.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        break;
                    }
                    done_rx.recv_timeout(remaining).is_ok()
                }
                None => done_rx.recv().is_ok(),
            };
            if !received {
                break;
            }
            finished += 1;
        }

        cancel.cancel();
        let finalized = merge
            .close(started.elapsed())
            .ok_or(ScrapeError::AlreadyClosed(id))?;

        let abandoned: Vec<u64> = launched
            .iter()
            .filter(|(name, _)| {
                finalized
                    .tasks
                    .iter()
                    .any(|(task, report)| task.as_str() == *name && report.status == TaskStatus::Pending)
            })
            .map(|(_, invocation)| *invocation)
            .collect();
        self.inflight.abandon(&abandoned);

        let mut records = finalized.records;
        let mut reports = BTreeMap::new();
        for (name, report) in finalized.tasks {
            records.extend(summary_records(&name, &report));
            reports.insert(name, report);
        }

        let report = ScrapeReport {
            id,
            records,
            tasks: reports,
            elapsed: started.elapsed(),
            dropped_records: finalized.dropped_full,
        };

        let timed_out = report.timed_out();
        if !timed_out.is_empty() {
            warn!(
                "scrape {id}: collector(s) still running after {:.3}s deadline: {}",
                deadline.as_secs_f64(),
                timed_out.join(", ")
            );
        }
        if report.dropped_records > 0 {
            warn!(
                "scrape {id}: {} record(s) dropped, merge queue bound is {}",
                report.dropped_records, self.sink_capacity
            );
        }
        debug!("scrape {id}: {}", report.summary());
        Ok(report)
    }

    fn select(&self, filter: Option<&[String]>) -> Vec<Arc<dyn CollectionTask>> {
        let Some(names) = filter else {
            return self.tasks.clone();
        };
        for name in names {
            if !self.tasks.iter().any(|t| t.name() == name.as_str()) {
                warn!("ignoring unknown or disabled collector {name:?} in scrape filter");
            }
        }
        self.tasks
            .iter()
            .filter(|t| names.iter().any(|n| n == t.name()))
            .cloned()
            .collect()
    }
}

fn objects_for(tasks: &[Arc<dyn CollectionTask>]) -> BTreeSet<String> {
    tasks
        .iter()
        .flat_map(|t| t.required_objects())
        .map(|o| (*o).to_string())
        .collect()
}

fn run_task(task: &dyn CollectionTask, ctx: &ScrapeContext, sink: &MetricSink, merge: &MergePoint) {
    let name = task.name();
    let t0 = Instant::now();
    debug!("collector {name}: started");

    let result = panic::catch_unwind(AssertUnwindSafe(|| task.collect(ctx, sink)));
    let elapsed = t0.elapsed();
    let (status, err) = match result {
        Ok(Ok(())) => (TaskStatus::Success, None),
        Ok(Err(e)) => (TaskStatus::Failed, Some(e.to_string())),
        Err(payload) => (
            TaskStatus::Failed,
            Some(format!("panicked: {}", panic_message(payload.as_ref()))),
        ),
    };

    if !merge.finish(name, status, elapsed, err.clone()) {
        debug!(
            "collector {name}: finished after {:.3}s, scrape already finalized; result discarded",
            elapsed.as_secs_f64()
        );
        return;
    }
    match err {
        Some(e) => warn!("collector {name} failed after {:.3}s: {e}", elapsed.as_secs_f64()),
        None => debug!("collector {name}: succeeded in {:.3}s", elapsed.as_secs_f64()),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Duration, success, and timeout records for one task.
fn summary_records(name: &str, report: &TaskReport) -> [MetricRecord; 3] {
    let flag = |b: bool| if b { 1.0 } else { 0.0 };
    [
        MetricRecord::gauge(
            DURATION_METRIC,
            "Time a collector spent on this scrape.",
            report.duration.as_secs_f64(),
        )
        .label("collector", name),
        MetricRecord::gauge(
            SUCCESS_METRIC,
            "Whether a collector succeeded.",
            flag(report.succeeded()),
        )
        .label("collector", name),
        MetricRecord::gauge(
            TIMEOUT_METRIC,
            "Whether a collector was still running at the deadline.",
            flag(report.timed_out()),
        )
        .label("collector", name),
    ]
}
