//! Exports scoped metrics registries as Prometheus text, OpenMetrics text, or JSON.
//!
//! Each exporter renders a [`Registries`](metrics_registry::Registries) collection, either in full
//! or restricted by a [`Selection`]:
//!
//! ```
//! use std::sync::Arc;
//!
//! use metrics_exporter_text::{Exporter, PrometheusExporter};
//! use metrics_registry::{Registries, Scope};
//!
//! let registries = Arc::new(Registries::new());
//! registries.init(&Scope::APPLICATION).counter("requests", ()).unwrap().increment(3);
//!
//! let exporter = PrometheusExporter::new(registries);
//! let output = exporter.export_all_scopes().unwrap();
//! assert!(output.contains("application_requests_total 3.0"));
//! ```
//!
//! [`MetricsService`] maps HTTP requests onto exports, negotiating the format from the `Accept`
//! header.  With the `http-listener` feature enabled,
//! `MetricsServiceBuilder::build_with_listener` also produces a future that serves it.
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(broken_intra_doc_links))]

mod exporter;
pub use self::exporter::{Exporter, RenderError};

mod exposition;
pub use self::exposition::{ExportError, Selection};

mod formatting;
mod text;

mod settings;
pub use self::settings::{ExportSettings, ExportSettingsBuilder};

mod prometheus;
pub use self::prometheus::{PrometheusExporter, PROMETHEUS_CONTENT_TYPE};

mod openmetrics;
pub use self::openmetrics::{OpenMetricsExporter, OPENMETRICS_CONTENT_TYPE};

mod json;
pub use self::json::{json_key, JsonExporter, JSON_CONTENT_TYPE};

mod http;
pub use self::http::{Format, MetricsService, MetricsServiceBuilder};

#[cfg(feature = "http-listener")]
mod listener;
#[cfg(feature = "http-listener")]
#[cfg_attr(docsrs, doc(cfg(feature = "http-listener")))]
pub use self::listener::{BuildError, ListenerFuture};
