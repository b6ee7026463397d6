use metrics_registry::Scope;
use thiserror::Error;

use crate::exposition::Selection;

/// Errors that can occur while rendering an export.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The document could not be serialized.
    #[error("failed to serialize export: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Renders the contents of a set of scoped registries in one exposition format.
pub trait Exporter: Send + Sync {
    /// The HTTP content type of the rendered documents.
    fn content_type(&self) -> &'static str;

    /// Renders the metrics covered by `selection`.
    ///
    /// Returns `Ok(None)` if the selection names a scope that does not exist.
    ///
    /// # Errors
    ///
    /// If the document cannot be serialized, an error variant will be returned describing why.
    fn export(&self, selection: Selection<'_>) -> Result<Option<String>, RenderError>;

    /// Renders every metric in every scope.
    ///
    /// # Errors
    ///
    /// See [`export`](Self::export).
    fn export_all_scopes(&self) -> Result<String, RenderError> {
        self.export(Selection::All).map(Option::unwrap_or_default)
    }

    /// Renders every metric in `scope`, or `None` if the scope does not exist.
    ///
    /// # Errors
    ///
    /// See [`export`](Self::export).
    fn export_scope(&self, scope: &Scope) -> Result<Option<String>, RenderError> {
        self.export(Selection::Scope(scope))
    }

    /// Renders every instrument named `name` in `scope`, or `None` if the scope does not exist.
    ///
    /// # Errors
    ///
    /// See [`export`](Self::export).
    fn export_metric(&self, scope: &Scope, name: &str) -> Result<Option<String>, RenderError> {
        self.export(Selection::Metric(scope, name))
    }

    /// Renders every instrument named `name`, across every scope.
    ///
    /// # Errors
    ///
    /// See [`export`](Self::export).
    fn export_metric_all_scopes(&self, name: &str) -> Result<String, RenderError> {
        self.export(Selection::MetricAllScopes(name)).map(Option::unwrap_or_default)
    }
}
