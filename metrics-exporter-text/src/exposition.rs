//! Registry traversal shared by every exporter.
use std::{collections::BTreeMap, sync::Arc};

use metrics_registry::{
    parse_quantiles, scale_to_base, Metadata, MetricId, MetricRegistry, MetricType, Metric,
    Quantile, Rates, Registries, Scope, Snapshot, Tag, DEFAULT_QUANTILES,
};
use thiserror::Error;
use tracing::warn;

/// Errors that cause a group of metrics to be left out of an export.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ExportError {
    /// Instruments exist under a name that has no metadata.
    #[error("metric `{name}` has no metadata")]
    MissingMetadata {
        /// Metric name.
        name: String,
    },

    /// An instrument's type differs from the type in its metadata.
    #[error("metric `{id}` is a {found}, but its metadata says {expected}")]
    TypeMismatch {
        /// Identity of the offending instrument.
        id: MetricId,
        /// Type from the metadata.
        expected: MetricType,
        /// Type of the instrument.
        found: MetricType,
    },
}

/// Summary statistics of a histogram or timer, scaled to the canonical unit.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Distribution {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub stddev: f64,
    pub quantiles: Vec<(Quantile, f64)>,
}

impl Distribution {
    fn new(count: u64, sum: f64, snapshot: &Snapshot, unit: Option<&str>) -> Self {
        let quantiles = parse_quantiles(&DEFAULT_QUANTILES)
            .into_iter()
            .map(|q| {
                let value = scale_to_base(unit, snapshot.quantile(q.value()));
                (q, value)
            })
            .collect();

        Distribution {
            count,
            sum: scale_to_base(unit, sum),
            min: scale_to_base(unit, snapshot.min()),
            max: scale_to_base(unit, snapshot.max()),
            mean: scale_to_base(unit, snapshot.mean()),
            stddev: scale_to_base(unit, snapshot.stddev()),
            quantiles,
        }
    }
}

/// The current values of a single instrument, ready to be rendered.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Reading {
    Counter(f64),
    Gauge(f64),
    Meter { count: u64, rates: Rates },
    Histogram(Distribution),
    Timer { distribution: Distribution, rates: Rates },
}

impl Reading {
    fn take(metric: &Metric, unit: Option<&str>) -> Self {
        match metric {
            Metric::Counter(counter) => {
                Reading::Counter(scale_to_base(unit, counter.count() as f64))
            }
            Metric::Gauge(gauge) => Reading::Gauge(scale_to_base(unit, gauge.value())),
            Metric::Meter(meter) => Reading::Meter { count: meter.count(), rates: meter.rates() },
            Metric::Histogram(histogram) => Reading::Histogram(Distribution::new(
                histogram.count(),
                histogram.sum(),
                &histogram.snapshot(),
                unit,
            )),
            Metric::Timer(timer) => {
                let elapsed = timer.elapsed().as_nanos() as f64;
                Reading::Timer {
                    distribution: Distribution::new(
                        timer.count(),
                        elapsed,
                        &timer.snapshot(),
                        Some("nanoseconds"),
                    ),
                    rates: timer.rates(),
                }
            }
        }
    }
}

/// Every instrument registered under one name, with that name's metadata.
pub(crate) struct Group {
    pub metadata: Metadata,
    pub members: Vec<Member>,
}

/// One instrument of a [`Group`].
pub(crate) struct Member {
    /// Tags to render: the instrument's own, merged with the global tags and sorted by key.
    pub tags: Vec<Tag>,
    pub reading: Reading,
}

/// Which metrics an export covers.
#[derive(Clone, Copy, Debug)]
pub enum Selection<'a> {
    /// Every metric in every scope.
    All,
    /// Every metric in one scope.
    Scope(&'a Scope),
    /// Every instrument registered under one name in one scope.
    Metric(&'a Scope, &'a str),
    /// Every instrument registered under one name, in every scope that has it.
    MetricAllScopes(&'a str),
}

impl<'a> Selection<'a> {
    /// Resolves the registries this selection covers, or `None` if a named scope does not exist.
    pub(crate) fn resolve(
        &self,
        registries: &Registries,
    ) -> Option<Vec<(Scope, Arc<MetricRegistry>)>> {
        match self {
            Selection::All | Selection::MetricAllScopes(_) => Some(registries.iter()),
            Selection::Scope(scope) | Selection::Metric(scope, _) => {
                registries.get(scope).map(|registry| vec![((*scope).clone(), registry)])
            }
        }
    }

    /// The single metric name this selection is restricted to, if any.
    pub(crate) fn name(&self) -> Option<&'a str> {
        match self {
            Selection::Metric(_, name) | Selection::MetricAllScopes(name) => Some(*name),
            _ => None,
        }
    }
}

/// Collects the groups of `registry`, optionally restricted to a single name.
///
/// Groups that cannot be exported are logged and skipped; the rest are returned in name order.
pub(crate) fn collect_groups(
    registry: &MetricRegistry,
    name: Option<&str>,
    global_tags: &[Tag],
) -> Vec<Group> {
    let metrics = match name {
        Some(name) => registry.metrics_named(name),
        None => registry.metrics(),
    };

    let mut by_name: BTreeMap<String, Vec<(MetricId, Metric)>> = BTreeMap::new();
    for (id, metric) in metrics {
        by_name.entry(id.name().to_string()).or_default().push((id, metric));
    }

    by_name
        .into_iter()
        .filter_map(|(name, instruments)| {
            match build_group(registry.metadata_for(&name), &name, instruments, global_tags) {
                Ok(group) => Some(group),
                Err(error) => {
                    warn!(%error, "skipping metric group during export");
                    None
                }
            }
        })
        .collect()
}

fn build_group(
    metadata: Option<Metadata>,
    name: &str,
    instruments: Vec<(MetricId, Metric)>,
    global_tags: &[Tag],
) -> Result<Group, ExportError> {
    let metadata =
        metadata.ok_or_else(|| ExportError::MissingMetadata { name: name.to_string() })?;

    let mut members = Vec::with_capacity(instruments.len());
    for (id, metric) in instruments {
        if metric.metric_type() != metadata.metric_type() {
            return Err(ExportError::TypeMismatch {
                found: metric.metric_type(),
                expected: metadata.metric_type(),
                id,
            });
        }

        let reading = Reading::take(&metric, metadata.unit());
        let (_, tags) = id.with_defaults(global_tags).into_parts();
        members.push(Member { tags, reading });
    }

    Ok(Group { metadata, members })
}
