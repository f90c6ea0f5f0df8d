//! # perfscrape-core
//!
//! **One snapshot, every collector, one deadline.**
//!
//! `perfscrape-core` turns host performance counters into metric records. Each
//! scrape reads one counter [`Snapshot`] and runs every enabled
//! [`CollectionTask`] concurrently. Whatever the tasks emitted before the
//! global deadline is returned, together with a duration, success, and timeout
//! record for every task.
//!
//! ## Quick Start
//!
//! ```no_run
//! use perfscrape_core::{ScrapeConfig, Scraper};
//!
//! let scraper = Scraper::from_config(&ScrapeConfig::default()).unwrap();
//! let report = scraper.scrape().unwrap();
//! println!("{}", report.summary());
//! for record in &report.records {
//!     println!("{} {:?} {}", record.name, record.labels, record.value);
//! }
//! ```
//!
//! ## Architecture
//!
//! Provider → Snapshot → Tasks (one thread each) → Merge point → Report
//!
//! - **Providers** ([`SnapshotProvider`]) capture counters once per scrape:
//!   procfs on Linux, or a static JSON snapshot for replay.
//! - **Decoding** ([`decode`]) projects snapshot objects into typed records
//!   declared with [`counter_record!`].
//! - **Tasks** ([`tasks`]) turn decoded records into metrics.
//! - **The scraper** ([`Scraper`]) enforces the deadline. Late tasks are
//!   abandoned and reported as timed out; their later output is discarded.

pub mod config;
pub mod decode;
pub mod error;
pub mod outcome;
pub mod procfs;
pub mod provider;
pub mod scrape;
pub mod sink;
pub mod snapshot;
pub mod task;
pub mod tasks;

pub use config::{DEFAULTS_PLACEHOLDER, MAX_TIMEOUT_SECS, ProviderConfig, ScrapeConfig};
pub use decode::{Binding, CounterPart, CounterRecord, decode_object, decode_single};
pub use error::{CollectError, ConfigError, DecodeError, ProviderError, ScrapeError, SinkError};
pub use outcome::{TaskReport, TaskStatus};
pub use procfs::ProcfsProvider;
pub use provider::{SnapshotProvider, StaticProvider};
pub use scrape::{DURATION_METRIC, SUCCESS_METRIC, ScrapeReport, Scraper, TIMEOUT_METRIC};
pub use sink::{MergePoint, MetricKind, MetricRecord, MetricSink};
pub use snapshot::{Counter, CounterKind, Instance, Object, Snapshot, is_aggregate_instance};
pub use task::{CancelToken, CollectionTask, ScrapeContext, TaskInfo};
pub use tasks::{all_tasks, default_task_names};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
