//! The JSON format.
use std::sync::Arc;

use metrics_registry::{sanitize, MetricRegistry, Rates, Registries, Scope, Tag, NONE};
use serde_json::{Map, Number, Value};

use crate::{
    exporter::{Exporter, RenderError},
    exposition::{collect_groups, Distribution, Group, Reading, Selection},
    settings::ExportSettings,
};

/// Content type of the JSON format.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Builds the key of one instrument: its sanitized name, then `;key=value` for every tag.
///
/// Semicolons inside tag values are replaced so that the key can be split unambiguously.
pub fn json_key(name: &str, tags: &[Tag]) -> String {
    let mut key = sanitize(name);
    for tag in tags {
        key.push(';');
        key.push_str(tag.key());
        key.push('=');
        key.push_str(&tag.value().replace(';', "_"));
    }
    key
}

const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

fn number(value: f64) -> Value {
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}

/// Counters stay integral in JSON unless scaling made them fractional.
fn whole_number(value: f64) -> Value {
    if value.fract() == 0.0 && (0.0..=MAX_EXACT_INTEGER).contains(&value) {
        Value::from(value as u64)
    } else {
        number(value)
    }
}

fn insert_distribution(
    object: &mut Map<String, Value>,
    sum_key: &str,
    distribution: &Distribution,
) {
    object.insert("count".to_string(), Value::from(distribution.count));
    object.insert(sum_key.to_string(), number(distribution.sum));
    object.insert("min".to_string(), number(distribution.min));
    object.insert("max".to_string(), number(distribution.max));
    object.insert("mean".to_string(), number(distribution.mean));
    object.insert("stddev".to_string(), number(distribution.stddev));
    for (quantile, value) in &distribution.quantiles {
        object.insert(quantile.label().to_string(), number(*value));
    }
}

fn insert_rates(object: &mut Map<String, Value>, rates: &Rates) {
    object.insert("meanRate".to_string(), number(rates.mean));
    object.insert("oneMinRate".to_string(), number(rates.one_minute));
    object.insert("fiveMinRate".to_string(), number(rates.five_minute));
    object.insert("fifteenMinRate".to_string(), number(rates.fifteen_minute));
}

fn reading_value(reading: &Reading) -> Value {
    match reading {
        Reading::Counter(count) => whole_number(*count),
        Reading::Gauge(value) => number(*value),
        Reading::Meter { count, rates } => {
            let mut object = Map::new();
            object.insert("count".to_string(), Value::from(*count));
            insert_rates(&mut object, rates);
            Value::Object(object)
        }
        Reading::Histogram(distribution) => {
            let mut object = Map::new();
            insert_distribution(&mut object, "sum", distribution);
            Value::Object(object)
        }
        Reading::Timer { distribution, rates } => {
            let mut object = Map::new();
            insert_distribution(&mut object, "elapsedTime", distribution);
            insert_rates(&mut object, rates);
            Value::Object(object)
        }
    }
}

fn write_group(object: &mut Map<String, Value>, group: &Group) {
    for member in &group.members {
        let key = json_key(group.metadata.name(), &member.tags);
        object.insert(key, reading_value(&member.reading));
    }
}

fn scope_values(
    registry: &MetricRegistry,
    name: Option<&str>,
    settings: &ExportSettings,
) -> Map<String, Value> {
    let mut object = Map::new();
    for group in collect_groups(registry, name, &settings.global_tags) {
        write_group(&mut object, &group);
    }
    object
}

fn scope_metadata(registry: &MetricRegistry, name: Option<&str>) -> Map<String, Value> {
    let ids = registry.metric_ids();
    let mut object = Map::new();
    for (metric_name, metadata) in registry.metadata() {
        if name.is_some_and(|name| name != metric_name) {
            continue;
        }

        let tags = ids
            .iter()
            .filter(|id| id.name() == metric_name)
            .map(|id| Value::from(id.tags().iter().map(Tag::to_string).collect::<Vec<_>>()))
            .collect::<Vec<_>>();

        let mut entry = Map::new();
        entry.insert("unit".to_string(), Value::from(metadata.unit().unwrap_or(NONE)));
        entry.insert("type".to_string(), Value::from(metadata.metric_type().as_str()));
        entry.insert("description".to_string(), Value::from(metadata.description().unwrap_or("")));
        entry.insert("displayName".to_string(), Value::from(metadata.display_name()));
        entry.insert("tags".to_string(), Value::Array(tags));
        object.insert(sanitize(&metric_name), Value::Object(entry));
    }
    object
}

/// Renders scoped registries as JSON.
///
/// A single scope renders as an object keyed by [`json_key`].  Counters and gauges are plain
/// numbers, while meters, histograms and timers are objects of their statistics.  Rendering every
/// scope wraps those objects in an outer object keyed by scope name.
pub struct JsonExporter {
    registries: Arc<Registries>,
    settings: ExportSettings,
}

impl JsonExporter {
    /// Creates a `JsonExporter` with default settings.
    pub fn new(registries: Arc<Registries>) -> Self {
        Self::with_settings(registries, ExportSettings::default())
    }

    /// Creates a `JsonExporter` with the given settings.
    pub fn with_settings(registries: Arc<Registries>, settings: ExportSettings) -> Self {
        JsonExporter { registries, settings }
    }

    fn build<F>(&self, selection: Selection<'_>, f: F) -> Result<Option<String>, RenderError>
    where
        F: Fn(&MetricRegistry, Option<&str>) -> Map<String, Value>,
    {
        let Some(scopes) = selection.resolve(&self.registries) else {
            return Ok(None);
        };

        let document = match selection {
            Selection::Scope(_) | Selection::Metric(..) => scopes
                .into_iter()
                .next()
                .map(|(_, registry)| f(&registry, selection.name()))
                .unwrap_or_default(),
            Selection::All => scopes
                .into_iter()
                .map(|(scope, registry)| (scope.to_string(), Value::Object(f(&registry, None))))
                .collect(),
            Selection::MetricAllScopes(name) => scopes
                .into_iter()
                .filter_map(|(scope, registry)| {
                    let values = f(&registry, Some(name));
                    (!values.is_empty()).then(|| (scope.to_string(), Value::Object(values)))
                })
                .collect(),
        };

        Ok(Some(serde_json::to_string(&Value::Object(document))?))
    }

    /// Renders the metadata of the metrics covered by `selection`.
    ///
    /// Each metric name maps to its `unit`, `type`, `description`, `displayName`, and `tags`: one
    /// array of `key=value` strings per registered tag combination.  Returns `Ok(None)` if the
    /// selection names a scope that does not exist.
    ///
    /// # Errors
    ///
    /// If the document cannot be serialized, an error variant will be returned describing why.
    pub fn export_metadata(&self, selection: Selection<'_>) -> Result<Option<String>, RenderError> {
        self.build(selection, scope_metadata)
    }

    /// Renders the metadata of every metric in every scope.
    ///
    /// # Errors
    ///
    /// See [`export_metadata`](Self::export_metadata).
    pub fn export_metadata_all_scopes(&self) -> Result<String, RenderError> {
        self.export_metadata(Selection::All).map(Option::unwrap_or_default)
    }

    /// Renders the metadata of every metric in `scope`, or `None` if the scope does not exist.
    ///
    /// # Errors
    ///
    /// See [`export_metadata`](Self::export_metadata).
    pub fn export_metadata_scope(&self, scope: &Scope) -> Result<Option<String>, RenderError> {
        self.export_metadata(Selection::Scope(scope))
    }

    /// Renders the metadata of `name` in `scope`, or `None` if the scope does not exist.
    ///
    /// # Errors
    ///
    /// See [`export_metadata`](Self::export_metadata).
    pub fn export_metadata_metric(
        &self,
        scope: &Scope,
        name: &str,
    ) -> Result<Option<String>, RenderError> {
        self.export_metadata(Selection::Metric(scope, name))
    }
}

impl Exporter for JsonExporter {
    fn content_type(&self) -> &'static str {
        JSON_CONTENT_TYPE
    }

    fn export(&self, selection: Selection<'_>) -> Result<Option<String>, RenderError> {
        self.build(selection, |registry, name| scope_values(registry, name, &self.settings))
    }
}
