//! A scoped registry of named, tagged instruments.
//!
//! Instruments (counters, gauges, histograms, meters and timers) are identified by a
//! [`MetricId`]: a name plus a set of [`Tag`]s.  Every instrument registered under the same name
//! shares one [`Metadata`], which fixes the metric type, unit, description and display name.
//!
//! Registries are partitioned by [`Scope`].  The process-wide set lives in
//! [`Registries::global`], but independent sets can be created for tests or embedding.
//!
//! ```
//! use metrics_registry::{Registries, Scope};
//!
//! let registries = Registries::new();
//! let registry = registries.init(&Scope::APPLICATION);
//!
//! let counter = registry.counter("requests", [("method", "GET")]).unwrap();
//! counter.inc();
//!
//! // Registering the same identity again returns the same counter.
//! let again = registry.counter("requests", [("method", "GET")]).unwrap();
//! assert_eq!(again.count(), 1);
//! ```
#![deny(missing_docs)]

mod error;
pub use self::error::RegistrationError;

mod handles;
pub use self::handles::{
    AtomicGauge, Counter, CounterFn, DynamicInstrument, Gauge, GaugeFn, Histogram, HistogramFn,
    Instrument, Meter, MeterFn, Metric, Rates, Timer, TimerContext, TimerFn,
};

mod id;
pub use self::id::MetricId;

mod metadata;
pub use self::metadata::{
    Metadata, MetadataBuilder, MetadataError, MetadataField, MetricType, NONE,
};

mod quantile;
pub use self::quantile::{parse_quantiles, Quantile, DEFAULT_QUANTILES};

mod registry;
pub use self::registry::{Descriptor, MetricRegistry, Requested};

mod sanitize;
pub use self::sanitize::{escape_help, escape_label_value, sanitize, sanitize_label_key};

mod scope;
pub use self::scope::{Registries, Scope};

mod snapshot;
pub use self::snapshot::Snapshot;

pub mod storage;

mod tag;
pub use self::tag::{is_valid_tag_key, IntoTags, ParseError, Tag};

mod unit;
pub use self::unit::{canonical_unit, scale_to_base, unit_suffix, Unit, BYTES, SECONDS};
