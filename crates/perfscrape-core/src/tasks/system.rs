//! SystemTask: load averages and scheduler counters from the `System` object.

use crate::counter_record;
use crate::decode::decode_single;
use crate::error::CollectError;
use crate::procfs::SYSTEM_OBJECT;
use crate::sink::{MetricRecord, MetricSink};
use crate::task::{CollectionTask, ScrapeContext, TaskInfo};

counter_record! {
    pub struct SystemCounters {
        load1: "Load 1m" as Gauge,
        load5: "Load 5m" as Gauge,
        load15: "Load 15m" as Gauge,
        context_switches: "Context Switches" as Rate,
        processes_created: "Processes Created" as Rate,
        interrupts: "Interrupts" as Rate,
        running: "Processes Running" as Gauge,
        blocked: "Processes Blocked" as Gauge,
    }
}

static SYSTEM_INFO: TaskInfo = TaskInfo {
    name: "system",
    description: "Load averages, context switches, interrupts, and process counts",
    objects: &[SYSTEM_OBJECT],
    default_enabled: true,
};

pub struct SystemTask;

impl CollectionTask for SystemTask {
    fn info(&self) -> &TaskInfo {
        &SYSTEM_INFO
    }

    fn collect(&self, ctx: &ScrapeContext, sink: &MetricSink) -> Result<(), CollectError> {
        let Some(sys) = decode_single::<SystemCounters>(ctx.snapshot(), SYSTEM_OBJECT)? else {
            return Ok(());
        };

        for (window, value) in [("1m", sys.load1), ("5m", sys.load5), ("15m", sys.load15)] {
            sink.emit(
                MetricRecord::gauge("system_load_average", "Run queue load average.", value)
                    .label("window", window),
            )?;
        }
        ctx.checkpoint()?;

        sink.emit_all([
            MetricRecord::counter(
                "system_context_switches_total",
                "Context switches since boot.",
                sys.context_switches,
            ),
            MetricRecord::counter(
                "system_processes_created_total",
                "Processes and threads created since boot.",
                sys.processes_created,
            ),
            MetricRecord::counter(
                "system_interrupts_total",
                "Interrupts serviced since boot.",
                sys.interrupts,
            ),
            MetricRecord::gauge(
                "system_processes_running",
                "Processes in runnable state.",
                sys.running,
            ),
            MetricRecord::gauge(
                "system_processes_blocked",
                "Processes blocked on I/O.",
                sys.blocked,
            ),
        ])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{MergePoint, MetricKind};
    use crate::snapshot::{Counter, Instance, Object, Snapshot};
    use crate::task::CancelToken;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn emits_loads_and_counters() {
        let inst = Instance::default()
            .with(Counter::gauge("Load 1m", 0.5))
            .with(Counter::gauge("Load 5m", 0.25))
            .with(Counter::gauge("Load 15m", 0.125))
            .with(Counter::rate("Context Switches", 1000.0))
            .with(Counter::rate("Processes Created", 50.0))
            .with(Counter::rate("Interrupts", 7000.0))
            .with(Counter::gauge("Processes Running", 2.0))
            .with(Counter::gauge("Processes Blocked", 0.0));
        let snap = Snapshot::new().with(SYSTEM_OBJECT, Object::single(inst));

        let merge = Arc::new(MergePoint::new(64));
        let ctx = ScrapeContext::new(Arc::new(snap), CancelToken::new());
        SystemTask.collect(&ctx, &merge.sink()).unwrap();
        let records = merge.close(Duration::ZERO).unwrap().records;

        assert_eq!(records.len(), 8);
        assert_eq!(records[2].label_value("window"), Some("15m"));
        assert_eq!(records[2].value, 0.125);
        let ctxt = records
            .iter()
            .find(|r| r.name == "system_context_switches_total")
            .unwrap();
        assert_eq!(ctxt.kind, MetricKind::Counter);
        assert_eq!(ctxt.value, 1000.0);
    }

    #[test]
    fn empty_system_object_emits_nothing() {
        let snap = Snapshot::new().with(SYSTEM_OBJECT, Object::default());
        let merge = Arc::new(MergePoint::new(64));
        let ctx = ScrapeContext::new(Arc::new(snap), CancelToken::new());
        SystemTask.collect(&ctx, &merge.sink()).unwrap();
        assert!(merge.close(Duration::ZERO).unwrap().records.is_empty());
    }
}
