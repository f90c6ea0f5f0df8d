//! Point-in-time counter snapshot shared read-only by every task of a scrape.
//!
//! A [`Snapshot`] maps object (category) names to an [`Object`], each holding
//! zero or more [`Instance`]s of named [`Counter`]s. Providers build one per
//! scrape; tasks only ever read it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Instance names that stand for an aggregate over all other instances.
///
/// Tasks skip these to avoid double-counting.
pub const AGGREGATE_INSTANCES: &[&str] = &["_Total", "_Global_"];

/// Whether an instance name is an aggregate pseudo-instance.
pub fn is_aggregate_instance(name: &str) -> bool {
    AGGREGATE_INSTANCES.contains(&name)
}

/// How a raw counter value must be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterKind {
    /// Instantaneous gauge-like value.
    Gauge,
    /// Monotonic counter; meaningful as a rate between scrapes.
    Rate,
    /// Numerator of a ratio; divide by the paired base counter.
    Fraction,
    /// Tick count; divide by the paired frequency to get seconds.
    Ticks,
}

impl CounterKind {
    /// Whether values of this kind come with a paired base or frequency.
    pub fn has_base(self) -> bool {
        matches!(self, Self::Fraction | Self::Ticks)
    }
}

impl std::fmt::Display for CounterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gauge => write!(f, "gauge"),
            Self::Rate => write!(f, "rate"),
            Self::Fraction => write!(f, "fraction"),
            Self::Ticks => write!(f, "ticks"),
        }
    }
}

/// One named numeric value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Counter {
    pub name: String,
    pub kind: CounterKind,
    pub value: f64,
    /// Paired base (for fractions) or frequency (for ticks), raw.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<f64>,
}

impl Counter {
    pub fn gauge(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            kind: CounterKind::Gauge,
            value,
            base: None,
        }
    }

    pub fn rate(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            kind: CounterKind::Rate,
            value,
            base: None,
        }
    }

    pub fn fraction(name: impl Into<String>, value: f64, base: f64) -> Self {
        Self {
            name: name.into(),
            kind: CounterKind::Fraction,
            value,
            base: Some(base),
        }
    }

    pub fn ticks(name: impl Into<String>, value: f64, frequency: f64) -> Self {
        Self {
            name: name.into(),
            kind: CounterKind::Ticks,
            value,
            base: Some(frequency),
        }
    }
}

/// One occurrence of an object's counters for a specific resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    /// Empty for single-instance objects.
    #[serde(default)]
    pub name: String,
    pub counters: Vec<Counter>,
}

impl Instance {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            counters: Vec::new(),
        }
    }

    /// Builder-style counter append.
    pub fn with(mut self, counter: Counter) -> Self {
        self.counters.push(counter);
        self
    }

    /// Look up a counter by exact name.
    pub fn counter(&self, name: &str) -> Option<&Counter> {
        self.counters.iter().find(|c| c.name == name)
    }
}

/// A named group of related counters, in instance order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Object {
    pub instances: Vec<Instance>,
}

impl Object {
    pub fn new(instances: Vec<Instance>) -> Self {
        Self { instances }
    }

    /// A global counter set: exactly one unnamed instance.
    pub fn single(instance: Instance) -> Self {
        Self {
            instances: vec![instance],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

/// Immutable object-name → object mapping for one scrape cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub collected_unix_ms: u64,
    pub objects: BTreeMap<String, Object>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, object: Object) {
        self.objects.insert(name.into(), object);
    }

    /// Builder-style object insert.
    pub fn with(mut self, name: impl Into<String>, object: Object) -> Self {
        self.insert(name, object);
        self
    }

    pub fn object(&self, name: &str) -> Option<&Object> {
        self.objects.get(name)
    }

    pub fn object_names(&self) -> impl Iterator<Item = &str> {
        self.objects.keys().map(String::as_str)
    }

    /// Copy of this snapshot restricted to the given object names.
    pub fn scoped<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Snapshot {
        let mut out = Snapshot {
            collected_unix_ms: self.collected_unix_ms,
            objects: BTreeMap::new(),
        };
        for name in names {
            if let Some(object) = self.objects.get(name) {
                out.objects.insert(name.to_string(), object.clone());
            }
        }
        out
    }
}
