//! The instrument registry.
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use parking_lot::RwLock;
use tracing::debug;

use crate::{
    error::RegistrationError,
    handles::{
        capabilities, Counter, DynamicInstrument, Gauge, Histogram, Instrument, Meter, Metric,
        Timer,
    },
    id::MetricId,
    metadata::{Metadata, MetricType},
    storage::{AtomicStorage, Storage},
    tag::IntoTags,
};

/// What a caller asked for when registering an instrument.
#[derive(Clone, Debug)]
pub enum Requested {
    /// Only a name and type were given; any existing metadata is accepted as long as the type
    /// matches.
    Unspecified(MetricType),
    /// Full metadata was given, and must match any existing metadata field by field.
    Explicit(Metadata),
}

impl Requested {
    /// The requested metric type.
    pub fn metric_type(&self) -> MetricType {
        match self {
            Requested::Unspecified(metric_type) => *metric_type,
            Requested::Explicit(metadata) => metadata.metric_type(),
        }
    }
}

/// A metric name, or full metadata, used when registering a pre-constructed instrument.
#[derive(Clone, Debug)]
pub enum Descriptor {
    /// A bare metric name.
    Name(String),
    /// Full metadata.
    Metadata(Metadata),
}

impl Descriptor {
    fn name(&self) -> &str {
        match self {
            Descriptor::Name(name) => name.as_str(),
            Descriptor::Metadata(metadata) => metadata.name(),
        }
    }
}

impl From<&str> for Descriptor {
    fn from(name: &str) -> Self {
        Descriptor::Name(name.to_string())
    }
}

impl From<String> for Descriptor {
    fn from(name: String) -> Self {
        Descriptor::Name(name)
    }
}

impl From<Metadata> for Descriptor {
    fn from(metadata: Metadata) -> Self {
        Descriptor::Metadata(metadata)
    }
}

impl From<&Metadata> for Descriptor {
    fn from(metadata: &Metadata) -> Self {
        Descriptor::Metadata(metadata.clone())
    }
}

#[derive(Default)]
struct State {
    metadata: BTreeMap<String, Metadata>,
    metrics: BTreeMap<MetricId, Metric>,
}

impl State {
    fn remove_id(&mut self, id: &MetricId) -> bool {
        if self.metrics.remove(id).is_none() {
            return false;
        }

        debug!(metric = %id, "removed metric");
        if !self.metrics.keys().any(|other| other.name() == id.name()) {
            self.metadata.remove(id.name());
            debug!(name = id.name(), "removed metadata for last metric of name");
        }
        true
    }
}

/// A registry of instruments, keyed by [`MetricId`], with one [`Metadata`] per metric name.
///
/// Every instrument registered under a name shares that name's metadata, and therefore its type.
/// Registration reconciles the request against whatever is already registered, and either hands
/// back the live instrument, creates a new one, or fails with a [`RegistrationError`].
///
/// All state lives behind a single lock, so each registration or removal is atomic with respect to
/// every other operation on the same registry.  Reads clone the handles they return and release
/// the lock before returning.
pub struct MetricRegistry {
    state: RwLock<State>,
    storage: Arc<dyn Storage>,
}

impl MetricRegistry {
    /// Creates a new `MetricRegistry` using atomic storage.
    pub fn new() -> Self {
        Self::with_storage(Arc::new(AtomicStorage::new()))
    }

    /// Creates a new `MetricRegistry` using the given storage.
    pub fn with_storage(storage: Arc<dyn Storage>) -> Self {
        MetricRegistry { state: RwLock::new(State::default()), storage }
    }

    /// Gets the instrument for `id`, creating it with `factory` if necessary.
    ///
    /// The request is reconciled against existing state as follows:
    ///
    /// 1. If no metadata exists for the name, the requested metadata (or a default for the
    ///    requested type) is stored and a new instrument is created.
    /// 2. If metadata exists with a different type, [`RegistrationError::TypeConflict`] is
    ///    returned.
    /// 3. If explicit metadata was requested and differs from the stored metadata in unit,
    ///    description, display name or reusability, [`RegistrationError::MetadataConflict`] is
    ///    returned, naming the first field that differs.
    /// 4. If an instrument already exists for `id`, it is returned only if the metadata is
    ///    reusable and the metric is not a gauge; otherwise [`RegistrationError::Duplicate`] is
    ///    returned.
    ///
    /// # Errors
    ///
    /// See above.
    pub fn get_or_create<F>(
        &self,
        id: MetricId,
        requested: Requested,
        factory: F,
    ) -> Result<Metric, RegistrationError>
    where
        F: FnOnce(&MetricId) -> Metric,
    {
        let requested_type = requested.metric_type();
        let mut guard = self.state.write();
        let state = &mut *guard;

        let reusable = match state.metadata.get(id.name()) {
            None => {
                let metadata = match requested {
                    Requested::Unspecified(metric_type) => {
                        Metadata::unspecified(id.name(), metric_type)
                    }
                    Requested::Explicit(metadata) => metadata,
                };
                let reusable = metadata.is_reusable();
                state.metadata.insert(id.name().to_string(), metadata);
                reusable
            }
            Some(existing) => {
                if existing.metric_type() != requested_type {
                    return Err(RegistrationError::TypeConflict {
                        name: id.name().to_string(),
                        existing: existing.metric_type(),
                        requested: requested_type,
                    });
                }

                if let Requested::Explicit(metadata) = &requested {
                    if let Some((field, existing, requested)) = existing.conflicting_field(metadata)
                    {
                        return Err(RegistrationError::MetadataConflict {
                            name: id.name().to_string(),
                            field,
                            existing,
                            requested,
                        });
                    }
                }

                existing.is_reusable()
            }
        };

        if let Some(metric) = state.metrics.get(&id) {
            if reusable
                && metric.metric_type() == requested_type
                && requested_type != MetricType::Gauge
            {
                return Ok(metric.clone());
            }
            return Err(RegistrationError::Duplicate { id });
        }

        let metric = factory(&id);
        debug!(metric = %id, kind = %requested_type, "registered metric");
        state.metrics.insert(id, metric.clone());
        Ok(metric)
    }

    fn typed<I, F>(
        &self,
        id: MetricId,
        requested: Requested,
        factory: F,
    ) -> Result<I, RegistrationError>
    where
        I: Instrument,
        F: FnOnce(&MetricId) -> I,
    {
        if requested.metric_type() != I::METRIC_TYPE {
            return Err(RegistrationError::TypeConflict {
                name: id.name().to_string(),
                existing: requested.metric_type(),
                requested: I::METRIC_TYPE,
            });
        }

        let name = id.name().to_string();
        let metric = self.get_or_create(id, requested, |id| factory(id).into())?;
        let existing = metric.metric_type();
        I::from_metric(metric).ok_or(RegistrationError::TypeConflict {
            name,
            existing,
            requested: I::METRIC_TYPE,
        })
    }

    /// Gets or creates a counter.
    ///
    /// # Errors
    ///
    /// See [`get_or_create`](Self::get_or_create).
    pub fn counter<N, T>(&self, name: N, tags: T) -> Result<Counter, RegistrationError>
    where
        N: Into<String>,
        T: IntoTags,
    {
        let id = MetricId::new(name, tags);
        self.typed(id, Requested::Unspecified(MetricType::Counter), |id| self.storage.counter(id))
    }

    /// Gets or creates a counter with explicit metadata.
    ///
    /// # Errors
    ///
    /// See [`get_or_create`](Self::get_or_create).
    pub fn counter_with<T>(
        &self,
        metadata: &Metadata,
        tags: T,
    ) -> Result<Counter, RegistrationError>
    where
        T: IntoTags,
    {
        let id = MetricId::new(metadata.name(), tags);
        self.typed(id, Requested::Explicit(metadata.clone()), |id| self.storage.counter(id))
    }

    /// Gets or creates a histogram.
    ///
    /// # Errors
    ///
    /// See [`get_or_create`](Self::get_or_create).
    pub fn histogram<N, T>(&self, name: N, tags: T) -> Result<Histogram, RegistrationError>
    where
        N: Into<String>,
        T: IntoTags,
    {
        let id = MetricId::new(name, tags);
        self.typed(id, Requested::Unspecified(MetricType::Histogram), |id| {
            self.storage.histogram(id)
        })
    }

    /// Gets or creates a histogram with explicit metadata.
    ///
    /// # Errors
    ///
    /// See [`get_or_create`](Self::get_or_create).
    pub fn histogram_with<T>(
        &self,
        metadata: &Metadata,
        tags: T,
    ) -> Result<Histogram, RegistrationError>
    where
        T: IntoTags,
    {
        let id = MetricId::new(metadata.name(), tags);
        self.typed(id, Requested::Explicit(metadata.clone()), |id| self.storage.histogram(id))
    }

    /// Gets or creates a meter.
    ///
    /// # Errors
    ///
    /// See [`get_or_create`](Self::get_or_create).
    pub fn meter<N, T>(&self, name: N, tags: T) -> Result<Meter, RegistrationError>
    where
        N: Into<String>,
        T: IntoTags,
    {
        let id = MetricId::new(name, tags);
        self.typed(id, Requested::Unspecified(MetricType::Meter), |id| self.storage.meter(id))
    }

    /// Gets or creates a meter with explicit metadata.
    ///
    /// # Errors
    ///
    /// See [`get_or_create`](Self::get_or_create).
    pub fn meter_with<T>(&self, metadata: &Metadata, tags: T) -> Result<Meter, RegistrationError>
    where
        T: IntoTags,
    {
        let id = MetricId::new(metadata.name(), tags);
        self.typed(id, Requested::Explicit(metadata.clone()), |id| self.storage.meter(id))
    }

    /// Gets or creates a timer.
    ///
    /// # Errors
    ///
    /// See [`get_or_create`](Self::get_or_create).
    pub fn timer<N, T>(&self, name: N, tags: T) -> Result<Timer, RegistrationError>
    where
        N: Into<String>,
        T: IntoTags,
    {
        let id = MetricId::new(name, tags);
        self.typed(id, Requested::Unspecified(MetricType::Timer), |id| self.storage.timer(id))
    }

    /// Gets or creates a timer with explicit metadata.
    ///
    /// # Errors
    ///
    /// See [`get_or_create`](Self::get_or_create).
    pub fn timer_with<T>(&self, metadata: &Metadata, tags: T) -> Result<Timer, RegistrationError>
    where
        T: IntoTags,
    {
        let id = MetricId::new(metadata.name(), tags);
        self.typed(id, Requested::Explicit(metadata.clone()), |id| self.storage.timer(id))
    }

    /// Registers a gauge whose value is read from `f`.
    ///
    /// Gauges are never reusable: registering the same identity twice fails.
    ///
    /// # Errors
    ///
    /// See [`get_or_create`](Self::get_or_create).
    pub fn gauge<N, T, F>(&self, name: N, tags: T, f: F) -> Result<Gauge, RegistrationError>
    where
        N: Into<String>,
        T: IntoTags,
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        let id = MetricId::new(name, tags);
        self.typed(id, Requested::Unspecified(MetricType::Gauge), |_| Gauge::from_fn(f))
    }

    /// Registers a gauge, with explicit metadata, whose value is read from `f`.
    ///
    /// # Errors
    ///
    /// See [`get_or_create`](Self::get_or_create).
    pub fn gauge_with<T, F>(
        &self,
        metadata: &Metadata,
        tags: T,
        f: F,
    ) -> Result<Gauge, RegistrationError>
    where
        T: IntoTags,
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        let id = MetricId::new(metadata.name(), tags);
        self.typed(id, Requested::Explicit(metadata.clone()), |_| Gauge::from_fn(f))
    }

    /// Registers a pre-constructed gauge.
    ///
    /// # Errors
    ///
    /// See [`get_or_create`](Self::get_or_create).
    pub fn register_gauge<D, T>(
        &self,
        descriptor: D,
        tags: T,
        gauge: Gauge,
    ) -> Result<Gauge, RegistrationError>
    where
        D: Into<Descriptor>,
        T: IntoTags,
    {
        let descriptor = descriptor.into();
        let name = descriptor.name().to_string();
        let metric = self.register(descriptor, tags, Metric::Gauge(gauge))?;
        let existing = metric.metric_type();
        Gauge::from_metric(metric).ok_or(RegistrationError::TypeConflict {
            name,
            existing,
            requested: MetricType::Gauge,
        })
    }

    /// Registers a pre-constructed instrument.
    ///
    /// The metric type is taken from the instrument itself.  If full metadata is given, its type
    /// must match.
    ///
    /// # Errors
    ///
    /// See [`get_or_create`](Self::get_or_create).
    pub fn register<D, T>(
        &self,
        descriptor: D,
        tags: T,
        metric: Metric,
    ) -> Result<Metric, RegistrationError>
    where
        D: Into<Descriptor>,
        T: IntoTags,
    {
        let descriptor = descriptor.into();
        let id = MetricId::new(descriptor.name(), tags);
        let requested = match descriptor {
            Descriptor::Name(_) => Requested::Unspecified(metric.metric_type()),
            Descriptor::Metadata(metadata) => {
                if metadata.metric_type() != metric.metric_type() {
                    return Err(RegistrationError::TypeConflict {
                        name: metadata.name().to_string(),
                        existing: metadata.metric_type(),
                        requested: metric.metric_type(),
                    });
                }
                Requested::Explicit(metadata)
            }
        };

        self.get_or_create(id, requested, |_| metric)
    }

    /// Registers an instrument whose type is discovered by probing its capabilities.
    ///
    /// With a bare name, the instrument must provide exactly one capability.  With full metadata,
    /// the capability matching the metadata's type is used.  Anything else fails rather than
    /// guessing.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::AmbiguousInstrument`] if several capabilities are provided and
    /// no type was given, or [`RegistrationError::UnsupportedInstrument`] if the requested
    /// capability (or any capability at all) is missing.  Otherwise, see
    /// [`get_or_create`](Self::get_or_create).
    pub fn register_dynamic<D, T>(
        &self,
        descriptor: D,
        tags: T,
        instrument: Arc<dyn DynamicInstrument>,
    ) -> Result<Metric, RegistrationError>
    where
        D: Into<Descriptor>,
        T: IntoTags,
    {
        let descriptor = descriptor.into();
        let mut candidates = capabilities(instrument.as_ref());

        let metric = match &descriptor {
            Descriptor::Metadata(metadata) => {
                let wanted = metadata.metric_type();
                match candidates.into_iter().find(|m| m.metric_type() == wanted) {
                    Some(metric) => metric,
                    None => {
                        return Err(RegistrationError::UnsupportedInstrument {
                            name: metadata.name().to_string(),
                            requested: Some(wanted),
                        })
                    }
                }
            }
            Descriptor::Name(name) => match candidates.len() {
                0 => {
                    return Err(RegistrationError::UnsupportedInstrument {
                        name: name.clone(),
                        requested: None,
                    })
                }
                1 => candidates.remove(0),
                _ => {
                    return Err(RegistrationError::AmbiguousInstrument {
                        name: name.clone(),
                        candidates: candidates.iter().map(Metric::metric_type).collect(),
                    })
                }
            },
        };

        self.register(descriptor, tags, metric)
    }

    /// Removes every instrument registered under `name`, along with its metadata.
    ///
    /// Returns `true` if anything was removed.
    pub fn remove_by_name(&self, name: &str) -> bool {
        let mut state = self.state.write();
        let before = state.metrics.len();
        state.metrics.retain(|id, _| id.name() != name);
        let removed_metrics = before != state.metrics.len();
        let removed_metadata = state.metadata.remove(name).is_some();
        if removed_metrics || removed_metadata {
            debug!(name, "removed every metric of name");
        }
        removed_metrics || removed_metadata
    }

    /// Removes the instrument registered under `id`.
    ///
    /// When it was the last instrument under its name, the name's metadata is removed too.
    /// Returns `true` if an instrument was removed.
    pub fn remove(&self, id: &MetricId) -> bool {
        self.state.write().remove_id(id)
    }

    /// Removes every instrument for which `filter` returns `true`.
    ///
    /// Returns `true` if anything was removed.
    pub fn remove_matching<F>(&self, filter: F) -> bool
    where
        F: Fn(&MetricId, &Metric) -> bool,
    {
        let mut state = self.state.write();
        let matching = state
            .metrics
            .iter()
            .filter(|(id, metric)| filter(id, metric))
            .map(|(id, _)| id.clone())
            .collect::<Vec<_>>();

        let mut removed = false;
        for id in &matching {
            removed |= state.remove_id(id);
        }
        removed
    }

    /// Removes every instrument and all metadata.
    pub fn clear(&self) {
        let mut state = self.state.write();
        state.metrics.clear();
        state.metadata.clear();
        debug!("cleared registry");
    }

    /// Gets the names of every registered metric.
    pub fn names(&self) -> BTreeSet<String> {
        self.state.read().metadata.keys().cloned().collect()
    }

    /// Gets the identity of every registered instrument.
    pub fn metric_ids(&self) -> BTreeSet<MetricId> {
        self.state.read().metrics.keys().cloned().collect()
    }

    /// Gets the metadata of every registered metric, by name.
    pub fn metadata(&self) -> BTreeMap<String, Metadata> {
        self.state.read().metadata.clone()
    }

    /// Gets the metadata registered for `name`.
    pub fn metadata_for(&self, name: &str) -> Option<Metadata> {
        self.state.read().metadata.get(name).cloned()
    }

    /// Gets the instrument registered under `id`.
    pub fn metric(&self, id: &MetricId) -> Option<Metric> {
        self.state.read().metrics.get(id).cloned()
    }

    /// Gets every registered instrument.
    pub fn metrics(&self) -> BTreeMap<MetricId, Metric> {
        self.state.read().metrics.clone()
    }

    /// Gets every instrument registered under `name`.
    pub fn metrics_named(&self, name: &str) -> BTreeMap<MetricId, Metric> {
        self.state
            .read()
            .metrics
            .iter()
            .filter(|(id, _)| id.name() == name)
            .map(|(id, metric)| (id.clone(), metric.clone()))
            .collect()
    }

    fn collect<I, F>(&self, filter: F) -> BTreeMap<MetricId, I>
    where
        I: Instrument,
        F: Fn(&MetricId, &Metric) -> bool,
    {
        self.state
            .read()
            .metrics
            .iter()
            .filter(|(id, metric)| metric.metric_type() == I::METRIC_TYPE && filter(id, metric))
            .filter_map(|(id, metric)| I::from_metric(metric.clone()).map(|i| (id.clone(), i)))
            .collect()
    }

    /// Gets every counter for which `filter` returns `true`.
    pub fn counters<F>(&self, filter: F) -> BTreeMap<MetricId, Counter>
    where
        F: Fn(&MetricId, &Metric) -> bool,
    {
        self.collect(filter)
    }

    /// Gets every gauge for which `filter` returns `true`.
    pub fn gauges<F>(&self, filter: F) -> BTreeMap<MetricId, Gauge>
    where
        F: Fn(&MetricId, &Metric) -> bool,
    {
        self.collect(filter)
    }

    /// Gets every histogram for which `filter` returns `true`.
    pub fn histograms<F>(&self, filter: F) -> BTreeMap<MetricId, Histogram>
    where
        F: Fn(&MetricId, &Metric) -> bool,
    {
        self.collect(filter)
    }

    /// Gets every meter for which `filter` returns `true`.
    pub fn meters<F>(&self, filter: F) -> BTreeMap<MetricId, Meter>
    where
        F: Fn(&MetricId, &Metric) -> bool,
    {
        self.collect(filter)
    }

    /// Gets every timer for which `filter` returns `true`.
    pub fn timers<F>(&self, filter: F) -> BTreeMap<MetricId, Timer>
    where
        F: Fn(&MetricId, &Metric) -> bool,
    {
        self.collect(filter)
    }

    /// Whether or not any instrument is registered.
    pub fn is_empty(&self) -> bool {
        self.state.read().metrics.is_empty()
    }
}

impl Default for MetricRegistry {
    fn default() -> Self {
        MetricRegistry::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{atomic::AtomicU64, Arc};

    use super::{MetricRegistry, Requested};
    use crate::{
        error::RegistrationError,
        handles::{AtomicGauge, Counter, DynamicInstrument, Gauge, Metric},
        id::MetricId,
        metadata::{Metadata, MetadataField, MetricType},
        tag::Tag,
    };

    fn all(_: &MetricId, _: &Metric) -> bool {
        true
    }

    #[test]
    fn test_counter_dedup_shares_state() {
        let registry = MetricRegistry::new();
        let first = registry.counter("requests", [("a", "b")]).unwrap();
        let second = registry.counter("requests", [("a", "b")]).unwrap();

        first.increment(2);
        second.increment(3);
        assert_eq!(first.count(), 5);
        assert!(first.ptr_eq(&second));
        assert_eq!(registry.metric_ids().len(), 1);
    }

    #[test]
    fn test_identity_ignores_tag_order() {
        let registry = MetricRegistry::new();
        let first = registry.counter("requests", [("a", "1"), ("b", "2")]).unwrap();
        let second = registry.counter("requests", [("b", "2"), ("a", "1")]).unwrap();
        assert!(first.ptr_eq(&second));

        let other = registry.counter("requests", [("a", "1")]).unwrap();
        assert!(!first.ptr_eq(&other));
        assert_eq!(registry.metadata().len(), 1);
        assert_eq!(registry.metric_ids().len(), 2);
    }

    #[test]
    fn test_gauges_are_never_reusable() {
        let registry = MetricRegistry::new();
        registry.gauge("temperature", (), || 20.0).unwrap();

        let result = registry.gauge("temperature", (), || 21.0);
        assert!(matches!(result, Err(RegistrationError::Duplicate { .. })));

        // Same name, different tags: a new instrument under the same metadata.
        let gauge = registry.gauge("temperature", [("room", "den")], || 18.5).unwrap();
        assert_eq!(gauge.value(), 18.5);
    }

    #[test]
    fn test_gauges_with_identical_metadata_are_never_reusable() {
        let registry = MetricRegistry::new();
        let metadata = Metadata::builder("pool_size")
            .with_type(MetricType::Gauge)
            .with_unit("bytes")
            .reusable(true)
            .build()
            .unwrap();

        registry.gauge_with(&metadata, [("pool", "a")], || 1.0).unwrap();
        assert_eq!(
            registry.gauge_with(&metadata, [("pool", "a")], || 2.0).err(),
            Some(RegistrationError::Duplicate {
                id: MetricId::new("pool_size", [("pool", "a")])
            })
        );

        let settable = Gauge::from_arc(Arc::new(AtomicGauge::new(3.0)));
        registry.register_gauge(&metadata, [("pool", "b")], settable.clone()).unwrap();
        assert_eq!(
            registry.register_gauge(&metadata, [("pool", "b")], settable).err(),
            Some(RegistrationError::Duplicate {
                id: MetricId::new("pool_size", [("pool", "b")])
            })
        );

        // The originals stay registered.
        let gauges = registry.gauges(|_, _| true);
        let values = gauges.values().map(Gauge::value).collect::<Vec<_>>();
        assert_eq!(values, vec![1.0, 3.0]);
    }

    #[test]
    fn test_type_conflict() {
        let registry = MetricRegistry::new();
        registry.counter("shared_name", ()).unwrap();

        let result = registry.histogram("shared_name", [("other", "tags")]);
        assert_eq!(
            result.err(),
            Some(RegistrationError::TypeConflict {
                name: "shared_name".to_string(),
                existing: MetricType::Counter,
                requested: MetricType::Histogram,
            })
        );
    }

    #[test]
    fn test_metadata_conflict_names_field() {
        let registry = MetricRegistry::new();
        let seconds = Metadata::builder("latency")
            .with_type(MetricType::Histogram)
            .with_unit("seconds")
            .build()
            .unwrap();
        let millis = Metadata::builder("latency")
            .with_type(MetricType::Histogram)
            .with_unit("milliseconds")
            .build()
            .unwrap();

        registry.histogram_with(&seconds, ()).unwrap();
        match registry.histogram_with(&millis, [("x", "y")]) {
            Err(RegistrationError::MetadataConflict { field, existing, requested, .. }) => {
                assert_eq!(field, MetadataField::Unit);
                assert_eq!(existing, "seconds");
                assert_eq!(requested, "milliseconds");
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }

        // A bare name accepts whatever metadata is already there.
        assert!(registry.histogram("latency", ()).is_ok());
    }

    #[test]
    fn test_absent_description_twice_succeeds() {
        let registry = MetricRegistry::new();
        let metadata = Metadata::builder("hits").with_type(MetricType::Counter).build().unwrap();
        let first = registry.counter_with(&metadata, ()).unwrap();
        let second = registry.counter_with(&metadata, ()).unwrap();
        assert!(first.ptr_eq(&second));
    }

    #[test]
    fn test_non_reusable_duplicate() {
        let registry = MetricRegistry::new();
        let metadata = Metadata::builder("jobs")
            .with_type(MetricType::Counter)
            .reusable(false)
            .build()
            .unwrap();

        registry.counter_with(&metadata, ()).unwrap();
        assert_eq!(
            registry.counter_with(&metadata, ()).err(),
            Some(RegistrationError::Duplicate { id: MetricId::from_name("jobs") })
        );

        // A different identity under the same name is still allowed.
        assert!(registry.counter_with(&metadata, [("queue", "high")]).is_ok());
    }

    #[test]
    fn test_explicit_metadata_type_must_match_instrument() {
        let registry = MetricRegistry::new();
        let metadata = Metadata::builder("x").with_type(MetricType::Gauge).build().unwrap();
        assert!(matches!(
            registry.counter_with(&metadata, ()),
            Err(RegistrationError::TypeConflict { .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_register_prebuilt() {
        let registry = MetricRegistry::new();
        let counter = Counter::from_arc(Arc::new(AtomicU64::new(7)));
        let metric = registry.register("prebuilt", (), Metric::Counter(counter)).unwrap();
        assert_eq!(metric.metric_type(), MetricType::Counter);
        assert_eq!(registry.counter("prebuilt", ()).unwrap().count(), 7);

        let gauge = Arc::new(AtomicGauge::new(1.0));
        let metadata = Metadata::builder("level")
            .with_type(MetricType::Gauge)
            .with_unit("bytes")
            .build()
            .unwrap();
        let handle =
            registry.register_gauge(&metadata, (), Gauge::from_arc(gauge.clone())).unwrap();
        gauge.set(3.0);
        assert_eq!(handle.value(), 3.0);
        assert_eq!(registry.metadata_for("level"), Some(metadata));
    }

    #[test]
    fn test_get_or_create_synthesizes_default_metadata() {
        let registry = MetricRegistry::new();
        let id = MetricId::new("custom", [("k", "v")]);
        let metric = registry
            .get_or_create(id.clone(), Requested::Unspecified(MetricType::Counter), |_| {
                Metric::Counter(Counter::from_arc(Arc::new(AtomicU64::new(0))))
            })
            .unwrap();

        assert_eq!(metric.metric_type(), MetricType::Counter);
        let metadata = registry.metadata_for("custom").unwrap();
        assert_eq!(metadata.description(), None);
        assert_eq!(metadata.unit(), None);
        assert!(metadata.is_reusable());
        assert!(registry.metric(&id).is_some());
    }

    struct Both;

    impl DynamicInstrument for Both {
        fn as_counter(&self) -> Option<Counter> {
            Some(Counter::from_arc(Arc::new(AtomicU64::new(0))))
        }

        fn as_gauge(&self) -> Option<Gauge> {
            Some(Gauge::from_fn(|| 1.0))
        }
    }

    struct Nothing;

    impl DynamicInstrument for Nothing {}

    #[test]
    fn test_dynamic_registration_fails_closed() {
        let registry = MetricRegistry::new();

        match registry.register_dynamic("both", (), Arc::new(Both)) {
            Err(RegistrationError::AmbiguousInstrument { candidates, .. }) => {
                assert_eq!(candidates, vec![MetricType::Counter, MetricType::Gauge]);
            }
            other => panic!("unexpected result: {:?}", other),
        }

        assert_eq!(
            registry.register_dynamic("nothing", (), Arc::new(Nothing)).err(),
            Some(RegistrationError::UnsupportedInstrument {
                name: "nothing".to_string(),
                requested: None
            })
        );

        let timer = Metadata::builder("both").with_type(MetricType::Timer).build().unwrap();
        assert!(matches!(
            registry.register_dynamic(&timer, (), Arc::new(Both)),
            Err(RegistrationError::UnsupportedInstrument { requested: Some(MetricType::Timer), .. })
        ));

        // An explicit type picks the matching capability.
        let gauge = Metadata::builder("both").with_type(MetricType::Gauge).build().unwrap();
        let metric = registry.register_dynamic(&gauge, (), Arc::new(Both)).unwrap();
        assert_eq!(metric.metric_type(), MetricType::Gauge);
        assert!(!registry.is_empty());
    }

    #[test]
    fn test_remove_last_instrument_drops_metadata() {
        let registry = MetricRegistry::new();
        registry.counter("c", [("a", "1")]).unwrap();
        registry.counter("c", [("a", "2")]).unwrap();

        assert!(registry.remove(&MetricId::new("c", [("a", "1")])));
        assert!(registry.names().contains("c"));

        assert!(registry.remove(&MetricId::new("c", [("a", "2")])));
        assert!(!registry.names().contains("c"));
        assert_eq!(registry.metadata_for("c"), None);
        assert!(!registry.remove(&MetricId::new("c", [("a", "2")])));

        // With the metadata gone, the name can be rebound to another type.
        assert!(registry.gauge("c", (), || 0.0).is_ok());
    }

    #[test]
    fn test_remove_by_name_and_matching() {
        let registry = MetricRegistry::new();
        registry.counter("a", [("env", "prod")]).unwrap();
        registry.counter("a", [("env", "dev")]).unwrap();
        registry.meter("b", [("env", "dev")]).unwrap();
        registry.timer("c", ()).unwrap();

        let dev = Tag::new("env", "dev");
        assert!(registry.remove_matching(|id, _| id.tags().contains(&dev)));
        assert_eq!(registry.metric_ids().len(), 2);
        assert_eq!(registry.names().into_iter().collect::<Vec<_>>(), vec!["a", "c"]);

        assert!(registry.remove_by_name("a"));
        assert!(!registry.remove_by_name("a"));
        assert_eq!(registry.timers(all).len(), 1);

        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.names().is_empty());
    }

    #[test]
    fn test_typed_reads() {
        let registry = MetricRegistry::new();
        registry.counter("c", ()).unwrap();
        registry.gauge("g", (), || 1.0).unwrap();
        registry.histogram("h", ()).unwrap();
        registry.meter("m", ()).unwrap();
        registry.timer("t", [("x", "1")]).unwrap();
        registry.timer("t", [("x", "2")]).unwrap();

        assert_eq!(registry.counters(all).len(), 1);
        assert_eq!(registry.gauges(all).len(), 1);
        assert_eq!(registry.histograms(all).len(), 1);
        assert_eq!(registry.meters(all).len(), 1);
        assert_eq!(registry.timers(all).len(), 2);
        assert_eq!(registry.timers(|id, _| id.tags()[0].value() == "2").len(), 1);
        assert_eq!(registry.metrics_named("t").len(), 2);
        assert_eq!(registry.metrics().len(), 6);
    }

    #[test]
    fn test_concurrent_registration() {
        let registry = Arc::new(MetricRegistry::new());
        let handles = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        registry.counter("shared", ()).unwrap().inc();
                    }
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.metadata().len(), 1);
        assert_eq!(registry.metric_ids().len(), 1);
        assert_eq!(registry.counter("shared", ()).unwrap().count(), 800);
    }
}
