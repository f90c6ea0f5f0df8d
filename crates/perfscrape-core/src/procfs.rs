//! Linux procfs snapshot provider.
//!
//! Reads `stat`, `meminfo`, and `loadavg` under a configurable root (default
//! `/proc`) and maps them onto three objects:
//!
//! - `Processor`: one instance per CPU plus `_Total`; tick counters paired
//!   with the kernel clock tick frequency.
//! - `Memory`: one unnamed instance; every `meminfo` line as a byte gauge.
//! - `System`: one unnamed instance; load averages plus scheduler counters.
//!
//! Only requested objects are read.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::ProviderError;
use crate::provider::SnapshotProvider;
use crate::snapshot::{Counter, Instance, Object, Snapshot};

pub const PROCESSOR_OBJECT: &str = "Processor";
pub const MEMORY_OBJECT: &str = "Memory";
pub const SYSTEM_OBJECT: &str = "System";

/// `/proc/stat` cpu columns, in kernel order.
const CPU_COLUMNS: &[&str] = &[
    "User Time",
    "Nice Time",
    "System Time",
    "Idle Time",
    "IOWait Time",
    "IRQ Time",
    "SoftIRQ Time",
    "Steal Time",
];

/// Snapshot provider backed by a procfs mount.
#[derive(Debug, Clone)]
pub struct ProcfsProvider {
    root: PathBuf,
    clk_tck: f64,
}

impl ProcfsProvider {
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    /// Read from an alternate root (containers, fixtures).
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            clk_tck: clk_tck(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read(&self, file: &str) -> Result<(PathBuf, String), ProviderError> {
        let path = self.root.join(file);
        let raw = std::fs::read_to_string(&path).map_err(|source| ProviderError::Io {
            path: path.clone(),
            source,
        })?;
        Ok((path, raw))
    }
}

impl Default for ProcfsProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotProvider for ProcfsProvider {
    fn name(&self) -> &'static str {
        "procfs"
    }

    fn snapshot(&self, objects: &BTreeSet<String>) -> Result<Snapshot, ProviderError> {
        let mut snapshot = Snapshot {
            collected_unix_ms: unix_ms_now(),
            ..Snapshot::default()
        };
        let wants = |name: &str| objects.contains(name);

        if wants(PROCESSOR_OBJECT) || wants(SYSTEM_OBJECT) {
            let (path, raw) = self.read("stat")?;
            let stat = parse_stat(&raw, self.clk_tck)
                .map_err(|message| ProviderError::Parse { path, message })?;
            if wants(PROCESSOR_OBJECT) {
                snapshot.insert(PROCESSOR_OBJECT, stat.processor);
            }
            if wants(SYSTEM_OBJECT) {
                let (path, raw) = self.read("loadavg")?;
                let loads = parse_loadavg(&raw).ok_or_else(|| ProviderError::Parse {
                    path,
                    message: "expected three load averages".to_string(),
                })?;
                let mut system = Instance::default();
                for (name, value) in ["Load 1m", "Load 5m", "Load 15m"].into_iter().zip(loads) {
                    system.counters.push(Counter::gauge(name, value));
                }
                system.counters.extend(stat.system);
                snapshot.insert(SYSTEM_OBJECT, Object::single(system));
            }
        }

        if wants(MEMORY_OBJECT) {
            let (_, raw) = self.read("meminfo")?;
            snapshot.insert(MEMORY_OBJECT, parse_meminfo(&raw));
        }

        Ok(snapshot)
    }
}

/// Parsed `/proc/stat`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcStat {
    pub processor: Object,
    /// Scheduler counters for the `System` object.
    pub system: Vec<Counter>,
}

/// Parse `/proc/stat` contents.
pub fn parse_stat(raw: &str, clk_tck: f64) -> Result<ProcStat, String> {
    let mut total = None;
    let mut cores = Vec::new();
    let mut system = Vec::new();

    for line in raw.lines() {
        let mut parts = line.split_whitespace();
        let Some(key) = parts.next() else {
            continue;
        };

        if let Some(id) = key.strip_prefix("cpu") {
            let ticks: Vec<f64> = parts.filter_map(|v| v.parse().ok()).collect();
            if ticks.len() < 4 {
                return Err(format!("{key}: expected at least 4 tick columns"));
            }
            let mut instance = Instance::new(if id.is_empty() { "_Total" } else { id });
            for (i, name) in CPU_COLUMNS.iter().enumerate() {
                let value = ticks.get(i).copied().unwrap_or(0.0);
                instance.counters.push(Counter::ticks(*name, value, clk_tck));
            }
            if id.is_empty() {
                total = Some(instance);
            } else {
                cores.push(instance);
            }
            continue;
        }

        let Some(value) = parts.next().and_then(|v| v.parse::<f64>().ok()) else {
            continue;
        };
        match key {
            "intr" => system.push(Counter::rate("Interrupts", value)),
            "ctxt" => system.push(Counter::rate("Context Switches", value)),
            "processes" => system.push(Counter::rate("Processes Created", value)),
            "procs_running" => system.push(Counter::gauge("Processes Running", value)),
            "procs_blocked" => system.push(Counter::gauge("Processes Blocked", value)),
            _ => {}
        }
    }

    if cores.is_empty() && total.is_none() {
        return Err("no cpu lines".to_string());
    }
    let mut instances = cores;
    instances.extend(total);
    Ok(ProcStat {
        processor: Object::new(instances),
        system,
    })
}

/// Parse `/proc/meminfo` into a single-instance object of byte gauges.
pub fn parse_meminfo(raw: &str) -> Object {
    let mut instance = Instance::default();
    for line in raw.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        let mut fields = rest.split_whitespace();
        let Some(value) = fields.next().and_then(|v| v.parse::<f64>().ok()) else {
            continue;
        };
        let bytes = match fields.next() {
            Some("kB") => value * 1024.0,
            _ => value,
        };
        instance.counters.push(Counter::gauge(key.trim(), bytes));
    }
    Object::single(instance)
}

/// First three fields of `/proc/loadavg`.
pub fn parse_loadavg(raw: &str) -> Option<[f64; 3]> {
    let mut parts = raw.split_whitespace().map(|v| v.parse::<f64>().ok());
    Some([parts.next()??, parts.next()??, parts.next()??])
}

fn unix_ms_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn clk_tck() -> f64 {
    #[cfg(unix)]
    {
        // SAFETY: `sysconf` is thread-safe for this query and has no side effects.
        let hz = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
        if hz > 0 {
            return hz as f64;
        }
    }
    100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::CounterKind;

    const STAT: &str = "\
cpu  100 5 50 1000 10 1 2 0 0 0
cpu0 60 3 30 500 6 1 1 0 0 0
cpu1 40 2 20 500 4 0 1 0 0 0
intr 12345 0 0
ctxt 999
btime 1700000000
processes 4242
procs_running 3
procs_blocked 1
";

    const MEMINFO: &str = "\
MemTotal:       16000000 kB
MemFree:         8000000 kB
MemAvailable:   12000000 kB
HugePages_Total:       0
";

    #[test]
    fn stat_cores_then_total() {
        let stat = parse_stat(STAT, 100.0).unwrap();
        let names: Vec<_> = stat.processor.instances.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["0", "1", "_Total"]);

        let core0 = &stat.processor.instances[0];
        let user = core0.counter("User Time").unwrap();
        assert_eq!(user.kind, CounterKind::Ticks);
        assert_eq!(user.value, 60.0);
        assert_eq!(user.base, Some(100.0));
        assert_eq!(core0.counters.len(), CPU_COLUMNS.len());
    }

    #[test]
    fn stat_system_counters() {
        let stat = parse_stat(STAT, 100.0).unwrap();
        let find = |n: &str| stat.system.iter().find(|c| c.name == n).map(|c| c.value);
        assert_eq!(find("Context Switches"), Some(999.0));
        assert_eq!(find("Processes Created"), Some(4242.0));
        assert_eq!(find("Processes Running"), Some(3.0));
        assert_eq!(find("Interrupts"), Some(12345.0));
        assert_eq!(find("btime"), None);
    }

    #[test]
    fn stat_short_cpu_line_fills_missing_columns() {
        let stat = parse_stat("cpu0 1 2 3 4\n", 100.0).unwrap();
        let steal = stat.processor.instances[0].counter("Steal Time").unwrap();
        assert_eq!(steal.value, 0.0);
    }

    #[test]
    fn stat_rejects_garbage() {
        assert!(parse_stat("cpu0 1 2\n", 100.0).is_err());
        assert!(parse_stat("ctxt 5\n", 100.0).is_err());
    }

    #[test]
    fn meminfo_scales_kb() {
        let mem = parse_meminfo(MEMINFO);
        let inst = &mem.instances[0];
        assert_eq!(inst.name, "");
        assert_eq!(inst.counter("MemTotal").unwrap().value, 16_000_000.0 * 1024.0);
        assert_eq!(inst.counter("HugePages_Total").unwrap().value, 0.0);
    }

    #[test]
    fn loadavg_parses() {
        assert_eq!(
            parse_loadavg("0.50 0.25 0.10 1/234 5678\n"),
            Some([0.5, 0.25, 0.1])
        );
        assert_eq!(parse_loadavg("0.5 x"), None);
    }

    fn fixture_root() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("stat"), STAT).unwrap();
        std::fs::write(dir.path().join("meminfo"), MEMINFO).unwrap();
        std::fs::write(dir.path().join("loadavg"), "1.00 2.00 3.00 1/1 1\n").unwrap();
        dir
    }

    #[test]
    fn provider_reads_only_requested_objects() {
        let dir = fixture_root();
        let provider = ProcfsProvider::with_root(dir.path());
        let wanted: BTreeSet<String> = [MEMORY_OBJECT.to_string()].into();
        let snap = provider.snapshot(&wanted).unwrap();
        assert!(snap.object(MEMORY_OBJECT).is_some());
        assert!(snap.object(PROCESSOR_OBJECT).is_none());
        assert!(snap.object(SYSTEM_OBJECT).is_none());
        assert!(snap.collected_unix_ms > 0);
    }

    #[test]
    fn provider_builds_system_object() {
        let dir = fixture_root();
        let provider = ProcfsProvider::with_root(dir.path());
        let wanted: BTreeSet<String> = [SYSTEM_OBJECT.to_string()].into();
        let snap = provider.snapshot(&wanted).unwrap();
        let system = &snap.object(SYSTEM_OBJECT).unwrap().instances[0];
        assert_eq!(system.counter("Load 15m").unwrap().value, 3.0);
        assert_eq!(system.counter("Context Switches").unwrap().value, 999.0);
    }

    #[test]
    fn provider_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let provider = ProcfsProvider::with_root(dir.path());
        let wanted: BTreeSet<String> = [PROCESSOR_OBJECT.to_string()].into();
        let err = provider.snapshot(&wanted).unwrap_err();
        assert!(matches!(err, ProviderError::Io { .. }));
    }
}
