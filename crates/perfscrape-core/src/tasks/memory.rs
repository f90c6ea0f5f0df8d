//! MemoryTask: physical memory and swap gauges from the `Memory` object.

use crate::counter_record;
use crate::decode::decode_single;
use crate::error::CollectError;
use crate::procfs::MEMORY_OBJECT;
use crate::sink::{MetricRecord, MetricSink};
use crate::task::{CollectionTask, ScrapeContext, TaskInfo};

counter_record! {
    pub struct MemoryCounters {
        total: "MemTotal" as Gauge,
        free: "MemFree" as Gauge,
        available: "MemAvailable" as Gauge,
        buffers: "Buffers" as Gauge,
        cached: "Cached" as Gauge,
        swap_total: "SwapTotal" as Gauge,
        swap_free: "SwapFree" as Gauge,
    }
}

static MEMORY_INFO: TaskInfo = TaskInfo {
    name: "memory",
    description: "Physical memory and swap usage in bytes",
    objects: &[MEMORY_OBJECT],
    default_enabled: true,
};

pub struct MemoryTask;

impl CollectionTask for MemoryTask {
    fn info(&self) -> &TaskInfo {
        &MEMORY_INFO
    }

    fn collect(&self, ctx: &ScrapeContext, sink: &MetricSink) -> Result<(), CollectError> {
        let Some(mem) = decode_single::<MemoryCounters>(ctx.snapshot(), MEMORY_OBJECT)? else {
            return Ok(());
        };

        let gauges = [
            ("memory_total_bytes", "Total usable physical memory.", mem.total),
            ("memory_free_bytes", "Unused physical memory.", mem.free),
            (
                "memory_available_bytes",
                "Memory available for new workloads without swapping.",
                mem.available,
            ),
            ("memory_buffers_bytes", "Memory used by block device buffers.", mem.buffers),
            ("memory_cached_bytes", "Memory used by the page cache.", mem.cached),
            ("memory_swap_total_bytes", "Total swap space.", mem.swap_total),
            ("memory_swap_free_bytes", "Unused swap space.", mem.swap_free),
        ];
        for (name, help, value) in gauges {
            sink.emit(MetricRecord::gauge(name, help, value))?;
        }
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

    fn meminfo(skip: Option<&str>) -> Snapshot {
        let mut inst = Instance::default();
        for (i, name) in [
            "MemTotal",
            "MemFree",
            "MemAvailable",
            "Buffers",
            "Cached",
            "SwapTotal",
            "SwapFree",
        ]
        .into_iter()
        .enumerate()
        {
            if Some(name) != skip {
                inst.counters.push(Counter::gauge(name, (i as f64 + 1.0) * 1024.0));
            }
        }
        Snapshot::new().with(MEMORY_OBJECT, Object::single(inst))
    }

    fn run(snapshot: Snapshot) -> (Result<(), CollectError>, Vec<MetricRecord>) {
        let merge = Arc::new(MergePoint::new(64));
        let ctx = ScrapeContext::new(Arc::new(snapshot), CancelToken::new());
        let result = MemoryTask.collect(&ctx, &merge.sink());
        (result, merge.close(Duration::ZERO).unwrap().records)
    }

    #[test]
    fn emits_all_gauges() {
        let (result, records) = run(meminfo(None));
        result.unwrap();
        assert_eq!(records.len(), 7);
        assert_eq!(records[0].name, "memory_total_bytes");
        assert_eq!(records[0].value, 1024.0);
        assert_eq!(records[2].name, "memory_available_bytes");
        assert_eq!(records[2].value, 3072.0);
    }

    #[test]
    fn missing_counter_fails_without_output() {
        let (result, records) = run(meminfo(Some("MemAvailable")));
        assert!(matches!(
            result,
            Err(CollectError::Decode(DecodeError::MissingCounter {
                counter: "MemAvailable",
                ..
            }))
        ));
        assert!(records.is_empty());
    }
}
