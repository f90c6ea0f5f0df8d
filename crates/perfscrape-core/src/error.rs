//! Error types for decoding, collection, providers, scraping, and config.

use std::path::PathBuf;

use thiserror::Error;

use crate::snapshot::CounterKind;

/// Errors produced by the counter decoder.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The requested object is not in the snapshot (optional subsystem absent).
    #[error("counter object {object:?} not present in snapshot")]
    MissingCategory { object: String },

    /// A bound counter name does not exist in an instance.
    #[error("field {field}: counter {counter:?} not found in instance {instance:?}")]
    MissingCounter {
        field: &'static str,
        counter: &'static str,
        instance: String,
    },

    /// A binding reads the base/frequency of a counter that carries none.
    #[error("field {field}: counter {counter:?} has no base value in instance {instance:?}")]
    MissingBase {
        field: &'static str,
        counter: &'static str,
        instance: String,
    },

    /// The counter exists but its kind differs from the binding.
    #[error("field {field}: counter {counter:?} is {found}, binding expects {expected}")]
    KindMismatch {
        field: &'static str,
        counter: &'static str,
        expected: CounterKind,
        found: CounterKind,
    },
}

/// Errors returned when writing to a [`MetricSink`](crate::sink::MetricSink).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    /// The scrape was finalized; the record was discarded.
    #[error("scrape already finalized")]
    Closed,

    /// The merge queue reached its bound; the record was dropped.
    #[error("merge queue full ({capacity} records)")]
    Full { capacity: usize },
}

/// Error returned by a collection task.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    /// The task noticed the scrape was abandoned and stopped early.
    #[error("cancelled")]
    Cancelled,

    #[error("{0}")]
    Failed(String),
}

/// Errors from a snapshot provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported: {0}")]
    Unsupported(String),
}

/// Errors that abort a whole scrape cycle.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("snapshot provider failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("merge point for scrape {0} was already closed")]
    AlreadyClosed(uuid::Uuid),
}

/// Configuration errors, reported once at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown collector {0:?}")]
    UnknownTask(String),

    #[error("invalid timeout {0}: must be positive and at most 86400 seconds")]
    InvalidTimeout(f64),

    #[error("sink capacity must be greater than zero")]
    ZeroCapacity,

    #[error("failed to initialise snapshot provider: {0}")]
    Provider(#[from] ProviderError),
}
