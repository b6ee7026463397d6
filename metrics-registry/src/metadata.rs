use std::{fmt, str::FromStr};

use thiserror::Error;

/// Sentinel used when comparing an absent unit or description.
pub const NONE: &str = "none";

/// Metric type.
///
/// Exactly one type is bound to a metric name at any given time.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum MetricType {
    /// Monotonically increasing count.
    Counter,
    /// Point-in-time value that can go up and down.
    Gauge,
    /// Distribution of arbitrary values.
    Histogram,
    /// Count plus throughput rates.
    Meter,
    /// Distribution of durations plus throughput rates.
    Timer,
}

impl MetricType {
    /// Gets the string form of this `MetricType`.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
            MetricType::Histogram => "histogram",
            MetricType::Meter => "meter",
            MetricType::Timer => "timer",
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricType {
    type Err = MetadataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "counter" => Ok(MetricType::Counter),
            "gauge" => Ok(MetricType::Gauge),
            "histogram" => Ok(MetricType::Histogram),
            "meter" => Ok(MetricType::Meter),
            "timer" => Ok(MetricType::Timer),
            _ => Err(MetadataError::UnknownType(s.to_string())),
        }
    }
}

/// Errors that can occur while building [`Metadata`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MetadataError {
    /// No metric type was set on the builder.
    #[error("metadata for `{0}` has no metric type")]
    MissingType(String),

    /// A metric type could not be parsed.
    #[error("unknown metric type `{0}`")]
    UnknownType(String),
}

/// A descriptive field of [`Metadata`] that must match across registrations.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MetadataField {
    /// The unit.
    Unit,
    /// The description.
    Description,
    /// The display name.
    DisplayName,
    /// The reusable flag.
    Reusable,
}

impl fmt::Display for MetadataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MetadataField::Unit => "unit",
            MetadataField::Description => "description",
            MetadataField::DisplayName => "display name",
            MetadataField::Reusable => "reusable",
        })
    }
}

/// Descriptive, non-identity attributes shared by every instrument registered under one name.
#[derive(Clone, Debug)]
pub struct Metadata {
    name: String,
    display_name: Option<String>,
    description: Option<String>,
    unit: Option<String>,
    metric_type: MetricType,
    reusable: bool,
}

impl Metadata {
    /// Creates a [`MetadataBuilder`] for the given name.
    pub fn builder<N>(name: N) -> MetadataBuilder
    where
        N: Into<String>,
    {
        MetadataBuilder::new(name)
    }

    /// Creates default metadata for the given name and type.
    ///
    /// This is what gets stored when a metric is first registered by name alone.
    pub fn unspecified<N>(name: N, metric_type: MetricType) -> Metadata
    where
        N: Into<String>,
    {
        Metadata {
            name: name.into(),
            display_name: None,
            description: None,
            unit: None,
            metric_type,
            reusable: true,
        }
    }

    /// Name of the metric.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Display name of the metric, which defaults to its name.
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(self.name.as_str())
    }

    /// Description of the metric, if one was given.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Declared unit of the metric, if one was given.
    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    /// Type of the metric.
    pub fn metric_type(&self) -> MetricType {
        self.metric_type
    }

    /// Whether or not a second registration may return the existing instrument.
    pub fn is_reusable(&self) -> bool {
        self.reusable
    }

    /// Finds the first descriptive field that differs between `self` and `other`.
    ///
    /// Absent units and descriptions compare equal to the literal `"none"`.
    pub fn conflicting_field(&self, other: &Metadata) -> Option<(MetadataField, String, String)> {
        let unit = (self.unit().unwrap_or(NONE), other.unit().unwrap_or(NONE));
        if !unit.0.eq_ignore_ascii_case(unit.1) {
            return Some((MetadataField::Unit, unit.0.to_string(), unit.1.to_string()));
        }

        let description =
            (self.description().unwrap_or(NONE), other.description().unwrap_or(NONE));
        if description.0 != description.1 {
            return Some((
                MetadataField::Description,
                description.0.to_string(),
                description.1.to_string(),
            ));
        }

        if self.display_name() != other.display_name() {
            return Some((
                MetadataField::DisplayName,
                self.display_name().to_string(),
                other.display_name().to_string(),
            ));
        }

        if self.reusable != other.reusable {
            return Some((
                MetadataField::Reusable,
                self.reusable.to_string(),
                other.reusable.to_string(),
            ));
        }

        None
    }
}

impl PartialEq for Metadata {
    fn eq(&self, other: &Metadata) -> bool {
        self.name == other.name
            && self.metric_type == other.metric_type
            && self.conflicting_field(other).is_none()
    }
}

impl Eq for Metadata {}

/// Builder for [`Metadata`].
#[derive(Clone, Debug)]
pub struct MetadataBuilder {
    name: String,
    display_name: Option<String>,
    description: Option<String>,
    unit: Option<String>,
    metric_type: Option<MetricType>,
    reusable: bool,
}

impl MetadataBuilder {
    fn new<N>(name: N) -> Self
    where
        N: Into<String>,
    {
        MetadataBuilder {
            name: name.into(),
            display_name: None,
            description: None,
            unit: None,
            metric_type: None,
            reusable: true,
        }
    }

    /// Sets the metric type.
    #[must_use]
    pub fn with_type(mut self, metric_type: MetricType) -> Self {
        self.metric_type = Some(metric_type);
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description<D>(mut self, description: D) -> Self
    where
        D: Into<String>,
    {
        self.description = Some(description.into());
        self
    }

    /// Sets the unit.
    ///
    /// Units recognized by [`Unit`](crate::Unit) are scaled to their base unit when exported;
    /// anything else is carried through as-is.
    #[must_use]
    pub fn with_unit<U>(mut self, unit: U) -> Self
    where
        U: Into<String>,
    {
        self.unit = Some(unit.into());
        self
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_display_name<D>(mut self, display_name: D) -> Self
    where
        D: Into<String>,
    {
        self.display_name = Some(display_name.into());
        self
    }

    /// Sets whether or not the metric may be re-registered.
    ///
    /// Defaults to `true`.  Gauges are never reusable regardless of this flag.
    #[must_use]
    pub fn reusable(mut self, reusable: bool) -> Self {
        self.reusable = reusable;
        self
    }

    /// Builds the [`Metadata`].
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::MissingType`] if no metric type was set.
    pub fn build(self) -> Result<Metadata, MetadataError> {
        let metric_type =
            self.metric_type.ok_or_else(|| MetadataError::MissingType(self.name.clone()))?;

        Ok(Metadata {
            name: self.name,
            display_name: self.display_name,
            description: self.description,
            unit: self.unit,
            metric_type,
            reusable: self.reusable,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Metadata, MetadataError, MetadataField, MetricType};

    #[test]
    fn test_builder_defaults() {
        let metadata = Metadata::builder("requests")
            .with_type(MetricType::Counter)
            .build()
            .expect("failed to build metadata");

        assert_eq!(metadata.name(), "requests");
        assert_eq!(metadata.display_name(), "requests");
        assert_eq!(metadata.description(), None);
        assert_eq!(metadata.unit(), None);
        assert!(metadata.is_reusable());
        assert_eq!(metadata, Metadata::unspecified("requests", MetricType::Counter));
    }

    #[test]
    fn test_builder_requires_type() {
        let result = Metadata::builder("requests").build();
        assert_eq!(result, Err(MetadataError::MissingType("requests".to_string())));
    }

    #[test]
    fn test_absent_fields_compare_as_none() {
        let absent = Metadata::builder("x").with_type(MetricType::Gauge).build().unwrap();
        let explicit =
            Metadata::builder("x").with_type(MetricType::Gauge).with_unit("none").build().unwrap();
        assert_eq!(absent.conflicting_field(&explicit), None);
    }

    #[test]
    fn test_conflicting_field() {
        let a = Metadata::builder("x")
            .with_type(MetricType::Counter)
            .with_description("A")
            .build()
            .unwrap();
        let b = Metadata::builder("x")
            .with_type(MetricType::Counter)
            .with_description("B")
            .build()
            .unwrap();
        let (field, existing, requested) = a.conflicting_field(&b).expect("fields should differ");
        assert_eq!(field, MetadataField::Description);
        assert_eq!(existing, "A");
        assert_eq!(requested, "B");

        let c =
            Metadata::builder("x").with_type(MetricType::Counter).reusable(false).build().unwrap();
        let d = Metadata::unspecified("x", MetricType::Counter);
        assert_eq!(c.conflicting_field(&d).map(|(f, _, _)| f), Some(MetadataField::Reusable));

        let e = Metadata::builder("x")
            .with_type(MetricType::Counter)
            .with_display_name("X")
            .build()
            .unwrap();
        assert_eq!(e.conflicting_field(&d).map(|(f, _, _)| f), Some(MetadataField::DisplayName));
    }

    #[test]
    fn test_metric_type_parsing() {
        assert_eq!("Timer".parse::<MetricType>(), Ok(MetricType::Timer));
        assert_eq!(MetricType::Meter.to_string(), "meter");
        assert!("summary".parse::<MetricType>().is_err());
    }
}
