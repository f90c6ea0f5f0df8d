//! Scrape configuration, built once at startup and passed to the [`Scraper`].
//!
//! [`Scraper`]: crate::scrape::Scraper

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ProviderError};
use crate::procfs::ProcfsProvider;
use crate::provider::{SnapshotProvider, StaticProvider};
use crate::task::CollectionTask;

/// Collector list entry that expands to every default-enabled task.
pub const DEFAULTS_PLACEHOLDER: &str = "[defaults]";

/// Default global scrape deadline in seconds.
pub const DEFAULT_TIMEOUT_SECS: f64 = 10.0;

/// Longest deadline accepted from the config file or a caller, in seconds.
pub const MAX_TIMEOUT_SECS: f64 = 86_400.0;

/// Default safety margin subtracted from caller-supplied deadlines.
pub const DEFAULT_TIMEOUT_MARGIN_SECS: f64 = 0.5;

/// Default bound on records buffered per scrape.
pub const DEFAULT_SINK_CAPACITY: usize = 65_536;

/// Where snapshots come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Live procfs; `root` defaults to `/proc`.
    Procfs {
        #[serde(default)]
        root: Option<PathBuf>,
    },
    /// Replay a JSON snapshot file.
    Static { path: PathBuf },
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::Procfs { root: None }
    }
}

impl ProviderConfig {
    pub fn build(&self) -> Result<Arc<dyn SnapshotProvider>, ProviderError> {
        Ok(match self {
            Self::Procfs { root: None } => Arc::new(ProcfsProvider::new()),
            Self::Procfs { root: Some(root) } => Arc::new(ProcfsProvider::with_root(root)),
            Self::Static { path } => Arc::new(StaticProvider::from_json_file(path)?),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    /// Global deadline for one scrape.
    pub timeout_secs: f64,
    /// Subtracted from a caller-supplied deadline.
    pub timeout_margin_secs: f64,
    /// Enabled task names; may contain [`DEFAULTS_PLACEHOLDER`].
    pub collectors: Vec<String>,
    /// Maximum records buffered per scrape.
    pub sink_capacity: usize,
    pub provider: ProviderConfig,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            timeout_margin_secs: DEFAULT_TIMEOUT_MARGIN_SECS,
            collectors: vec![DEFAULTS_PLACEHOLDER.to_string()],
            sink_capacity: DEFAULT_SINK_CAPACITY,
            provider: ProviderConfig::default(),
        }
    }
}

impl ScrapeConfig {
    /// Load and validate a JSON config file. Missing keys take defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if bounded_duration(self.timeout_secs).is_none() {
            return Err(ConfigError::InvalidTimeout(self.timeout_secs));
        }
        if !(0.0..=MAX_TIMEOUT_SECS).contains(&self.timeout_margin_secs) {
            return Err(ConfigError::InvalidTimeout(self.timeout_margin_secs));
        }
        if self.sink_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(())
    }

    /// Configured deadline. An out-of-range value that skipped
    /// [`validate`](Self::validate) falls back to the default.
    pub fn timeout(&self) -> Duration {
        bounded_duration(self.timeout_secs)
            .unwrap_or(Duration::from_secs_f64(DEFAULT_TIMEOUT_SECS))
    }

    /// Deadline for a scrape whose caller announced its own timeout.
    ///
    /// The caller's value minus the margin wins when it leaves a positive
    /// budget, capped at [`MAX_TIMEOUT_SECS`]; otherwise the configured
    /// timeout applies.
    pub fn deadline_for(&self, requested_secs: Option<f64>) -> Duration {
        match requested_secs {
            Some(secs) if secs.is_finite() && secs > self.timeout_margin_secs => {
                let budget = (secs - self.timeout_margin_secs).min(MAX_TIMEOUT_SECS);
                bounded_duration(budget).unwrap_or_else(|| self.timeout())
            }
            _ => self.timeout(),
        }
    }

    /// Collector names with the placeholder expanded, deduplicated, in order.
    pub fn expand_collectors(&self, defaults: &[&str]) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for entry in &self.collectors {
            let entry = entry.trim();
            if entry == DEFAULTS_PLACEHOLDER {
                for name in defaults {
                    if !out.iter().any(|n| n == name) {
                        out.push((*name).to_string());
                    }
                }
            } else if !entry.is_empty() && !out.iter().any(|n| n == entry) {
                out.push(entry.to_string());
            }
        }
        out
    }

    /// Pick the enabled tasks out of `available`, in configured order.
    pub fn select_tasks(
        &self,
        available: Vec<Box<dyn CollectionTask>>,
    ) -> Result<Vec<Arc<dyn CollectionTask>>, ConfigError> {
        let defaults: Vec<&str> = available
            .iter()
            .filter(|t| t.info().default_enabled)
            .map(|t| t.name())
            .collect();
        let wanted = self.expand_collectors(&defaults);

        let mut pool: Vec<Option<Box<dyn CollectionTask>>> =
            available.into_iter().map(Some).collect();
        let mut selected: Vec<Arc<dyn CollectionTask>> = Vec::with_capacity(wanted.len());
        for name in &wanted {
            let slot = pool
                .iter_mut()
                .find(|t| t.as_ref().is_some_and(|t| t.name() == name.as_str()))
                .and_then(Option::take)
                .ok_or_else(|| ConfigError::UnknownTask(name.clone()))?;
            selected.push(Arc::from(slot));
        }
        Ok(selected)
    }

    /// Parse a comma-separated collector list (CLI form).
    pub fn parse_collector_list(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }
}

/// `secs` as a duration, if it is a positive finite value no larger than
/// [`MAX_TIMEOUT_SECS`].
fn bounded_duration(secs: f64) -> Option<Duration> {
    if secs.is_finite() && secs > 0.0 && secs <= MAX_TIMEOUT_SECS {
        Duration::try_from_secs_f64(secs).ok()
    } else {
        None
    }
}
