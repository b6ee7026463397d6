use thiserror::Error;

use crate::{
    id::MetricId,
    metadata::{MetadataField, MetricType},
};

/// Errors that can occur while registering an instrument.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RegistrationError {
    /// The name is already bound to a different metric type.
    #[error("metric `{name}` is already registered as a {existing}, not a {requested}")]
    TypeConflict {
        /// Metric name.
        name: String,
        /// Type bound to the name.
        existing: MetricType,
        /// Type that was requested.
        requested: MetricType,
    },

    /// The name is already bound to metadata that differs in a descriptive field.
    #[error("metric `{name}` is already registered with {field} `{existing}`, not `{requested}`")]
    MetadataConflict {
        /// Metric name.
        name: String,
        /// The first field found to differ.
        field: MetadataField,
        /// Value held by the existing metadata.
        existing: String,
        /// Value that was requested.
        requested: String,
    },

    /// An instrument with this identity exists and may not be returned again.
    ///
    /// Happens for every gauge, and for any metric registered as not reusable.
    #[error("metric `{id}` is already registered and is not reusable")]
    Duplicate {
        /// Identity of the existing instrument.
        id: MetricId,
    },

    /// A dynamic instrument provides more than one capability and no type was given to pick one.
    #[error("instrument for `{name}` is ambiguous, it could be any of: {}", list(.candidates))]
    AmbiguousInstrument {
        /// Metric name.
        name: String,
        /// Every capability the instrument provides.
        candidates: Vec<MetricType>,
    },

    /// A dynamic instrument does not provide the requested capability, or provides none at all.
    #[error(
        "instrument for `{name}` does not provide {}",
        .requested.map_or("any metric type", |t| t.as_str())
    )]
    UnsupportedInstrument {
        /// Metric name.
        name: String,
        /// The type that was requested, if any.
        requested: Option<MetricType>,
    },
}

fn list(types: &[MetricType]) -> String {
    types.iter().map(|t| t.as_str()).collect::<Vec<_>>().join(", ")
}
