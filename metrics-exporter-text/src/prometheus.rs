//! The Prometheus text exposition format.
use std::sync::Arc;

use metrics_registry::{sanitize, Registries, Scope};

use crate::{
    exporter::{Exporter, RenderError},
    exposition::Selection,
    formatting::{write_help_line, write_type_line},
    settings::ExportSettings,
    text::{render, Family, TextSyntax},
};

/// Content type of the Prometheus text format.
pub const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

struct PrometheusSyntax;

impl TextSyntax for PrometheusSyntax {
    fn base_name(&self, scope: &Scope, name: &str) -> String {
        sanitize(&format!("{}_{}", scope, name))
    }

    fn counter_names(&self, stem: &str) -> (String, String) {
        let name =
            if stem.ends_with("_total") { stem.to_string() } else { format!("{}_total", stem) };
        (name.clone(), name)
    }

    fn write_header(&self, buffer: &mut String, family: &Family, help: Option<&str>) {
        if let Some(help) = help {
            write_help_line(buffer, &family.name, help, false);
        }
        write_type_line(buffer, &family.name, family.kind);
    }
}

/// Renders scoped registries in the Prometheus text format.
///
/// Metric names are prefixed with their scope, so `requests` in the `application` scope is
/// rendered as `application_requests_total`.
pub struct PrometheusExporter {
    registries: Arc<Registries>,
    settings: ExportSettings,
}

impl PrometheusExporter {
    /// Creates a `PrometheusExporter` with default settings.
    pub fn new(registries: Arc<Registries>) -> Self {
        Self::with_settings(registries, ExportSettings::default())
    }

    /// Creates a `PrometheusExporter` with the given settings.
    pub fn with_settings(registries: Arc<Registries>, settings: ExportSettings) -> Self {
        PrometheusExporter { registries, settings }
    }
}

impl Exporter for PrometheusExporter {
    fn content_type(&self) -> &'static str {
        PROMETHEUS_CONTENT_TYPE
    }

    fn export(&self, selection: Selection<'_>) -> Result<Option<String>, RenderError> {
        Ok(render(&PrometheusSyntax, &self.registries, selection, &self.settings))
    }
}
