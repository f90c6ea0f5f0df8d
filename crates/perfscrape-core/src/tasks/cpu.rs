//! CpuTask: per-core CPU time from the `Processor` object.
//!
//! Tick counters are converted to seconds here, dividing each by the paired
//! clock tick frequency. Aggregate instances are skipped.

use crate::counter_record;
use crate::decode::decode;
use crate::error::CollectError;
use crate::procfs::PROCESSOR_OBJECT;
use crate::sink::{MetricRecord, MetricSink};
use crate::snapshot::is_aggregate_instance;
use crate::task::{CollectionTask, ScrapeContext, TaskInfo};

counter_record! {
    /// Raw per-core tick counters.
    pub struct ProcessorTicks {
        user: "User Time" as Ticks,
        nice: "Nice Time" as Ticks,
        system: "System Time" as Ticks,
        idle: "Idle Time" as Ticks,
        iowait: "IOWait Time" as Ticks,
        irq: "IRQ Time" as Ticks,
        softirq: "SoftIRQ Time" as Ticks,
        steal: "Steal Time" as Ticks,
        /// Ticks per second.
        frequency: "User Time" as Ticks in base,
    }
}

impl ProcessorTicks {
    /// `(mode, ticks)` pairs in exposition order.
    pub fn modes(&self) -> [(&'static str, f64); 8] {
        [
            ("user", self.user),
            ("nice", self.nice),
            ("system", self.system),
            ("idle", self.idle),
            ("iowait", self.iowait),
            ("irq", self.irq),
            ("softirq", self.softirq),
            ("steal", self.steal),
        ]
    }
}

static CPU_INFO: TaskInfo = TaskInfo {
    name: "cpu",
    description: "Per-core CPU time by mode",
    objects: &[PROCESSOR_OBJECT],
    default_enabled: true,
};

pub struct CpuTask;

impl CollectionTask for CpuTask {
    fn info(&self) -> &TaskInfo {
        &CPU_INFO
    }

    fn collect(&self, ctx: &ScrapeContext, sink: &MetricSink) -> Result<(), CollectError> {
        let cores: Vec<ProcessorTicks> = decode(ctx.snapshot(), PROCESSOR_OBJECT)?;
        let mut count = 0usize;

        for core in cores.iter().filter(|c| !is_aggregate_instance(&c.instance)) {
            ctx.checkpoint()?;
            if core.frequency <= 0.0 {
                return Err(CollectError::Failed(format!(
                    "core {}: non-positive tick frequency {}",
                    core.instance, core.frequency
                )));
            }
            for (mode, ticks) in core.modes() {
                sink.emit(
                    MetricRecord::counter(
                        "cpu_time_seconds_total",
                        "Time spent by each core in each mode.",
                        ticks / core.frequency,
                    )
                    .label("core", core.instance.as_str())
                    .label("mode", mode),
                )?;
            }
            count += 1;
        }

        sink.emit(MetricRecord::gauge(
            "cpu_cores",
            "Number of cores reported.",
            count as f64,
        ))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;
    use crate::sink::MergePoint;
    use crate::snapshot::{Counter, Instance, Object, Snapshot};
    use crate::task::CancelToken;
    use std::sync::Arc;
    use std::time::Duration;

    fn core(name: &str, user: f64) -> Instance {
        let mut inst = Instance::new(name);
        for col in [
            "User Time",
            "Nice Time",
            "System Time",
            "Idle Time",
            "IOWait Time",
            "IRQ Time",
            "SoftIRQ Time",
            "Steal Time",
        ] {
            let v = if col == "User Time" { user } else { 0.0 };
            inst.counters.push(Counter::ticks(col, v, 100.0));
        }
        inst
    }

    fn run(snapshot: Snapshot) -> (Result<(), CollectError>, Vec<MetricRecord>) {
        let merge = Arc::new(MergePoint::new(1024));
        let ctx = ScrapeContext::new(Arc::new(snapshot), CancelToken::new());
        let result = CpuTask.collect(&ctx, &merge.sink());
        (result, merge.close(Duration::ZERO).unwrap().records)
    }

    #[test]
    fn emits_seconds_per_core_and_mode() {
        let snap = Snapshot::new().with(
            PROCESSOR_OBJECT,
            Object::new(vec![core("0", 250.0), core("1", 50.0), core("_Total", 300.0)]),
        );
        let (result, records) = run(snap);
        result.unwrap();
        // 2 cores × 8 modes + cpu_cores
        assert_eq!(records.len(), 17);
        let user0 = records
            .iter()
            .find(|r| r.label_value("core") == Some("0") && r.label_value("mode") == Some("user"))
            .unwrap();
        assert_eq!(user0.value, 2.5);
        assert!(records.iter().all(|r| r.label_value("core") != Some("_Total")));
        assert_eq!(records.last().unwrap().value, 2.0);
    }

    #[test]
    fn missing_object_fails() {
        let (result, records) = run(Snapshot::new());
        assert!(matches!(
            result,
            Err(CollectError::Decode(DecodeError::MissingCategory { .. }))
        ));
        assert!(records.is_empty());
    }

    #[test]
    fn empty_object_reports_zero_cores() {
        let (result, records) = run(Snapshot::new().with(PROCESSOR_OBJECT, Object::default()));
        result.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "cpu_cores");
        assert_eq!(records[0].value, 0.0);
    }

    #[test]
    fn cancelled_before_first_core() {
        let snap = Snapshot::new().with(PROCESSOR_OBJECT, Object::new(vec![core("0", 1.0)]));
        let merge = Arc::new(MergePoint::new(64));
        let token = CancelToken::new();
        token.cancel();
        let ctx = ScrapeContext::new(Arc::new(snap), token);
        let result = CpuTask.collect(&ctx, &merge.sink());
        assert!(matches!(result, Err(CollectError::Cancelled)));
    }
}
