//! The OpenMetrics text format.
use std::sync::Arc;

use metrics_registry::{sanitize, Registries, Scope};

use crate::{
    exporter::{Exporter, RenderError},
    exposition::Selection,
    formatting::{write_help_line, write_type_line, write_unit_line},
    settings::ExportSettings,
    text::{render, Family, TextSyntax},
};

/// Content type of the OpenMetrics text format.
pub const OPENMETRICS_CONTENT_TYPE: &str = "text/plain; version=1.0.0; charset=utf-8";

struct OpenMetricsSyntax;

impl TextSyntax for OpenMetricsSyntax {
    fn base_name(&self, scope: &Scope, name: &str) -> String {
        sanitize(&format!("{}:{}", scope, name))
    }

    fn counter_names(&self, stem: &str) -> (String, String) {
        // Counter families are declared without `_total`, and sampled with it.
        let family = stem.strip_suffix("_total").unwrap_or(stem).to_string();
        let sample = format!("{}_total", family);
        (family, sample)
    }

    fn write_header(&self, buffer: &mut String, family: &Family, help: Option<&str>) {
        write_type_line(buffer, &family.name, family.kind);
        if let Some(unit) = &family.unit {
            write_unit_line(buffer, &family.name, unit);
        }
        if let Some(help) = help {
            write_help_line(buffer, &family.name, help, true);
        }
    }

    fn finish(&self, buffer: &mut String) {
        buffer.push_str("# EOF\n");
    }
}

/// Renders scoped registries in the OpenMetrics text format.
///
/// Metric names are prefixed with their scope and a colon, so `requests` in the `application`
/// scope is rendered as `application:requests_total`.
pub struct OpenMetricsExporter {
    registries: Arc<Registries>,
    settings: ExportSettings,
}

impl OpenMetricsExporter {
    /// Creates an `OpenMetricsExporter` with default settings.
    pub fn new(registries: Arc<Registries>) -> Self {
        Self::with_settings(registries, ExportSettings::default())
    }

    /// Creates an `OpenMetricsExporter` with the given settings.
    pub fn with_settings(registries: Arc<Registries>, settings: ExportSettings) -> Self {
        OpenMetricsExporter { registries, settings }
    }
}

impl Exporter for OpenMetricsExporter {
    fn content_type(&self) -> &'static str {
        OPENMETRICS_CONTENT_TYPE
    }

    fn export(&self, selection: Selection<'_>) -> Result<Option<String>, RenderError> {
        Ok(render(&OpenMetricsSyntax, &self.registries, selection, &self.settings))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use metrics_registry::{Metadata, MetricType, Registries, Scope};

    use super::OpenMetricsExporter;
    use crate::exporter::Exporter;

    #[test]
    fn test_counter_family_declared_without_total() {
        let registries = Arc::new(Registries::new());
        let metadata = Metadata::builder("requests_total")
            .with_type(MetricType::Counter)
            .with_description("Requests \"served\"")
            .build()
            .unwrap();
        registries.init(&Scope::APPLICATION).counter_with(&metadata, ()).unwrap().increment(5);

        let exporter = OpenMetricsExporter::new(registries);
        let output = exporter.export_all_scopes().unwrap();
        let expected = concat!(
            "# TYPE application:requests counter\n",
            "# HELP application:requests Requests \\\"served\\\"\n",
            "application:requests_total 5.0\n",
            "# EOF\n",
        );
        assert_eq!(output, expected);
    }

    #[test]
    fn test_unit_line() {
        let registries = Arc::new(Registries::new());
        let metadata = Metadata::builder("uptime")
            .with_type(MetricType::Gauge)
            .with_unit("hours")
            .build()
            .unwrap();
        registries.init(&Scope::BASE).gauge_with(&metadata, (), || 1.0).unwrap();

        let exporter = OpenMetricsExporter::new(registries);
        let output = exporter.export_scope(&Scope::BASE).unwrap().unwrap();
        let expected = concat!(
            "# TYPE base:uptime_seconds gauge\n",
            "# UNIT base:uptime_seconds seconds\n",
            "base:uptime_seconds 3600.0\n",
            "# EOF\n",
        );
        assert_eq!(output, expected);
    }

    #[test]
    fn test_counter_unit_line() {
        let registries = Arc::new(Registries::new());
        let metadata = Metadata::builder("sent")
            .with_type(MetricType::Counter)
            .with_unit("kilobytes")
            .build()
            .unwrap();
        registries.init(&Scope::APPLICATION).counter_with(&metadata, ()).unwrap().increment(3);

        let exporter = OpenMetricsExporter::new(registries);
        let output = exporter.export_all_scopes().unwrap();
        let expected = concat!(
            "# TYPE application:sent_bytes counter\n",
            "# UNIT application:sent_bytes bytes\n",
            "application:sent_bytes_total 3000.0\n",
            "# EOF\n",
        );
        assert_eq!(output, expected);
    }

    #[test]
    fn test_empty_document_still_terminated() {
        let exporter = OpenMetricsExporter::new(Arc::new(Registries::new()));
        assert_eq!(exporter.export_all_scopes().unwrap(), "# EOF\n");
    }
}
