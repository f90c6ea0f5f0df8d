//! Snapshot providers.
//!
//! The orchestrator asks a [`SnapshotProvider`] for one snapshot per scrape,
//! scoped to the union of objects the enabled tasks declare.

use std::collections::BTreeSet;
use std::path::Path;

use crate::error::ProviderError;
use crate::snapshot::Snapshot;

/// Source of counter snapshots.
pub trait SnapshotProvider: Send + Sync {
    /// Short identifier for logs.
    fn name(&self) -> &'static str;

    /// Capture one consistent snapshot containing (at most) `objects`.
    ///
    /// Objects the host does not have are simply absent from the result.
    fn snapshot(&self, objects: &BTreeSet<String>) -> Result<Snapshot, ProviderError>;
}

/// Serves a fixed snapshot; used for replay, demos, and tests.
#[derive(Debug, Clone)]
pub struct StaticProvider {
    snapshot: Snapshot,
}

impl StaticProvider {
    pub fn new(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }

    /// Load the serde JSON form of a [`Snapshot`].
    pub fn from_json_file(path: &Path) -> Result<Self, ProviderError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ProviderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(serde_json::from_str(&raw)?))
    }
}

impl SnapshotProvider for StaticProvider {
    fn name(&self) -> &'static str {
        "static"
    }

    fn snapshot(&self, objects: &BTreeSet<String>) -> Result<Snapshot, ProviderError> {
        Ok(self.snapshot.scoped(objects.iter().map(String::as_str)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{Counter, Instance, Object};
    use std::io::Write;

    fn sample() -> Snapshot {
        Snapshot::new()
            .with(
                "Memory",
                Object::single(Instance::default().with(Counter::gauge("MemTotal", 1024.0))),
            )
            .with("Processor", Object::default())
    }

    #[test]
    fn static_provider_scopes_objects() {
        let provider = StaticProvider::new(sample());
        let wanted: BTreeSet<String> = ["Memory".to_string()].into();
        let snap = provider.snapshot(&wanted).unwrap();
        assert!(snap.object("Memory").is_some());
        assert!(snap.object("Processor").is_none());
    }

    #[test]
    fn static_provider_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", serde_json::to_string(&sample()).unwrap()).unwrap();
        let provider = StaticProvider::from_json_file(file.path()).unwrap();
        let wanted: BTreeSet<String> = ["Memory".to_string(), "Processor".to_string()].into();
        assert_eq!(provider.snapshot(&wanted).unwrap(), sample());
    }

    #[test]
    fn static_provider_missing_file() {
        let err = StaticProvider::from_json_file(Path::new("/nonexistent/snap.json")).unwrap_err();
        assert!(matches!(err, ProviderError::Io { .. }));
    }

    #[test]
    fn static_provider_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        let err = StaticProvider::from_json_file(file.path()).unwrap_err();
        assert!(matches!(err, ProviderError::Json(_)));
    }
}
