//! Declarative projection of snapshot objects into typed records.
//!
//! A record type declares a static binding table of
//! `(field, counter name, counter kind, part)` entries, usually through the
//! [`counter_record!`](crate::counter_record) macro. Decoding an [`Object`]
//! yields one record per [`Instance`], in instance order.
//!
//! The decoder never divides. A counter that needs its paired base or
//! frequency is bound twice, once for the value and once for the base, and
//! the owning task does the division.
//!
//! ```
//! use perfscrape_core::counter_record;
//! use perfscrape_core::decode::decode;
//! use perfscrape_core::snapshot::{Counter, Instance, Object, Snapshot};
//!
//! counter_record! {
//!     pub struct DiskCounters {
//!         busy: "% Disk Time" as Fraction,
//!         busy_base: "% Disk Time" as Fraction in base,
//!         reads: "Disk Reads/sec" as Rate,
//!     }
//! }
//!
//! let snap = Snapshot::new().with(
//!     "PhysicalDisk",
//!     Object::new(vec![
//!         Instance::new("0 C:")
//!             .with(Counter::fraction("% Disk Time", 25.0, 100.0))
//!             .with(Counter::rate("Disk Reads/sec", 7.0)),
//!     ]),
//! );
//! let disks: Vec<DiskCounters> = decode(&snap, "PhysicalDisk").unwrap();
//! assert_eq!(disks[0].instance, "0 C:");
//! assert_eq!(disks[0].busy / disks[0].busy_base, 0.25);
//! ```

use crate::error::DecodeError;
use crate::snapshot::{CounterKind, Instance, Object, Snapshot};

/// Which half of a counter a binding reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterPart {
    /// The raw value.
    Value,
    /// The paired base or frequency.
    Base,
}

/// One field ↔ counter binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub field: &'static str,
    pub counter: &'static str,
    pub kind: CounterKind,
    pub part: CounterPart,
}

/// A record type decodable from one snapshot instance.
pub trait CounterRecord: Sized {
    /// Bindings in field order. `from_values` receives values in this order.
    const BINDINGS: &'static [Binding];

    /// Build a record from resolved values, one per binding.
    fn from_values(instance: &str, values: &[f64]) -> Self;
}

/// Decode the named object from a snapshot.
pub fn decode<R: CounterRecord>(snapshot: &Snapshot, object: &str) -> Result<Vec<R>, DecodeError> {
    decode_object(object, snapshot.object(object))
}

/// Decode an optional object. `None` means the object was absent.
pub fn decode_object<R: CounterRecord>(
    name: &str,
    object: Option<&Object>,
) -> Result<Vec<R>, DecodeError> {
    let object = object.ok_or_else(|| DecodeError::MissingCategory {
        object: name.to_string(),
    })?;

    let mut records = Vec::with_capacity(object.instances.len());
    let mut values = Vec::with_capacity(R::BINDINGS.len());
    for instance in &object.instances {
        values.clear();
        for binding in R::BINDINGS {
            values.push(resolve(binding, instance)?);
        }
        records.push(R::from_values(&instance.name, &values));
    }
    Ok(records)
}

/// Decode the single instance of a global object.
///
/// An object with no instances yields `Ok(None)`.
pub fn decode_single<R: CounterRecord>(
    snapshot: &Snapshot,
    object: &str,
) -> Result<Option<R>, DecodeError> {
    Ok(decode::<R>(snapshot, object)?.into_iter().next())
}

fn resolve(binding: &Binding, instance: &Instance) -> Result<f64, DecodeError> {
    let counter = instance
        .counter(binding.counter)
        .ok_or_else(|| DecodeError::MissingCounter {
            field: binding.field,
            counter: binding.counter,
            instance: instance.name.clone(),
        })?;

    if counter.kind != binding.kind {
        return Err(DecodeError::KindMismatch {
            field: binding.field,
            counter: binding.counter,
            expected: binding.kind,
            found: counter.kind,
        });
    }

    match binding.part {
        CounterPart::Value => Ok(counter.value),
        CounterPart::Base => counter.base.ok_or_else(|| DecodeError::MissingBase {
            field: binding.field,
            counter: binding.counter,
            instance: instance.name.clone(),
        }),
    }
}

/// Declare a record struct together with its counter binding table.
///
/// Each field is written as `name: "Counter Name" as Kind`, optionally
/// followed by `in base` to read the paired base/frequency instead of the
/// value. The generated struct has a leading `instance: String` field and
/// one `f64` per binding.
#[macro_export]
macro_rules! counter_record {
    (@part) => {
        $crate::decode::CounterPart::Value
    };
    (@part base) => {
        $crate::decode::CounterPart::Base
    };
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$fmeta:meta])*
                $field:ident : $counter:literal as $kind:ident $(in $part:ident)?
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        $vis struct $name {
            pub instance: String,
            $(
                $(#[$fmeta])*
                pub $field: f64,
            )*
        }

        impl $crate::decode::CounterRecord for $name {
            const BINDINGS: &'static [$crate::decode::Binding] = &[
                $(
                    $crate::decode::Binding {
                        field: stringify!($field),
                        counter: $counter,
                        kind: $crate::snapshot::CounterKind::$kind,
                        part: $crate::counter_record!(@part $($part)?),
                    },
                )*
            ];

            fn from_values(instance: &str, values: &[f64]) -> Self {
                let mut values = values.iter().copied();
                Self {
                    instance: instance.to_string(),
                    $(
                        $field: values.next().unwrap_or_default(),
                    )*
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Counter;

    crate::counter_record! {
        struct CoreTimes {
            user: "User Time" as Ticks,
            idle: "Idle Time" as Ticks,
            frequency: "User Time" as Ticks in base,
        }
    }

    crate::counter_record! {
        struct Interrupts {
            count: "Interrupts" as Rate,
        }
    }

    fn core(name: &str, user: f64, idle: f64) -> Instance {
        Instance::new(name)
            .with(Counter::ticks("User Time", user, 100.0))
            .with(Counter::ticks("Idle Time", idle, 100.0))
    }

    #[test]
    fn binding_table_in_field_order() {
        let fields: Vec<_> = CoreTimes::BINDINGS.iter().map(|b| b.field).collect();
        assert_eq!(fields, vec!["user", "idle", "frequency"]);
        assert_eq!(CoreTimes::BINDINGS[2].part, CounterPart::Base);
        assert_eq!(CoreTimes::BINDINGS[0].part, CounterPart::Value);
    }

    #[test]
    fn one_record_per_instance_in_order() {
        let snap = Snapshot::new().with(
            "Processor",
            Object::new(vec![core("0", 10.0, 90.0), core("1", 20.0, 80.0), core("_Total", 30.0, 170.0)]),
        );
        let recs: Vec<CoreTimes> = decode(&snap, "Processor").unwrap();
        assert_eq!(recs.len(), 3);
        let names: Vec<_> = recs.iter().map(|r| r.instance.as_str()).collect();
        assert_eq!(names, vec!["0", "1", "_Total"]);
        assert_eq!(recs[1].user, 20.0);
        assert_eq!(recs[1].idle, 80.0);
        assert_eq!(recs[1].frequency, 100.0);
    }

    #[test]
    fn base_is_exposed_not_divided() {
        let snap = Snapshot::new().with("Processor", Object::new(vec![core("0", 250.0, 0.0)]));
        let recs: Vec<CoreTimes> = decode(&snap, "Processor").unwrap();
        assert_eq!(recs[0].user, 250.0);
        assert_eq!(recs[0].frequency, 100.0);
    }

    #[test]
    fn absent_object_is_missing_category() {
        let snap = Snapshot::new();
        let err = decode::<CoreTimes>(&snap, "Processor").unwrap_err();
        assert!(matches!(err, DecodeError::MissingCategory { ref object } if object == "Processor"));
    }

    #[test]
    fn empty_object_yields_no_records() {
        let snap = Snapshot::new().with("Processor", Object::default());
        let recs: Vec<CoreTimes> = decode(&snap, "Processor").unwrap();
        assert!(recs.is_empty());
        assert!(decode_single::<CoreTimes>(&snap, "Processor").unwrap().is_none());
    }

    #[test]
    fn missing_counter_names_field_and_counter() {
        let snap = Snapshot::new().with(
            "Processor",
            Object::new(vec![
                core("0", 1.0, 2.0),
                Instance::new("1").with(Counter::ticks("User Time", 1.0, 100.0)),
            ]),
        );
        let err = decode::<CoreTimes>(&snap, "Processor").unwrap_err();
        match err {
            DecodeError::MissingCounter { field, counter, instance } => {
                assert_eq!(field, "idle");
                assert_eq!(counter, "Idle Time");
                assert_eq!(instance, "1");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_base_is_reported() {
        let mut user = Counter::ticks("User Time", 1.0, 100.0);
        user.base = None;
        let inst = Instance::new("0")
            .with(user)
            .with(Counter::ticks("Idle Time", 1.0, 100.0));
        let snap = Snapshot::new().with("Processor", Object::new(vec![inst]));
        let err = decode::<CoreTimes>(&snap, "Processor").unwrap_err();
        assert!(matches!(err, DecodeError::MissingBase { field: "frequency", .. }));
    }

    #[test]
    fn kind_mismatch_is_reported() {
        let snap = Snapshot::new().with(
            "System",
            Object::single(Instance::default().with(Counter::gauge("Interrupts", 5.0))),
        );
        let err = decode::<Interrupts>(&snap, "System").unwrap_err();
        assert!(matches!(
            err,
            DecodeError::KindMismatch {
                expected: CounterKind::Rate,
                found: CounterKind::Gauge,
                ..
            }
        ));
    }

    #[test]
    fn single_instance_object() {
        let snap = Snapshot::new().with(
            "System",
            Object::single(Instance::default().with(Counter::rate("Interrupts", 42.0))),
        );
        let rec = decode_single::<Interrupts>(&snap, "System").unwrap().unwrap();
        assert_eq!(rec.instance, "");
        assert_eq!(rec.count, 42.0);
    }
}
