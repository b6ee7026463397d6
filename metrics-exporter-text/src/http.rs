//! Mapping of HTTP requests onto exports.
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    header::{HeaderValue, ACCEPT, ALLOW, CONTENT_TYPE},
    Method, Request, Response, StatusCode, Uri,
};
use metrics_registry::{Registries, Scope};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    exporter::Exporter,
    exposition::Selection,
    json::JsonExporter,
    openmetrics::OpenMetricsExporter,
    prometheus::PrometheusExporter,
    settings::ExportSettings,
};

/// An exposition format negotiated from an `Accept` header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    /// The Prometheus text format.
    Prometheus,
    /// The OpenMetrics text format.
    OpenMetrics,
    /// JSON.
    Json,
}

impl Format {
    /// Picks a format from the value of an `Accept` header.
    ///
    /// Media ranges are considered in the order given, ignoring parameters and quality values, and
    /// the first one recognized wins.  An absent or empty header means Prometheus.  Returns `None`
    /// if nothing acceptable was requested.
    pub fn negotiate(accept: Option<&str>) -> Option<Format> {
        let accept = match accept.map(str::trim) {
            None | Some("") => return Some(Format::Prometheus),
            Some(accept) => accept,
        };

        accept.split(',').find_map(|range| {
            let media_type = range.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
            match media_type.as_str() {
                "application/openmetrics-text" => Some(Format::OpenMetrics),
                "application/json" => Some(Format::Json),
                "text/plain" | "text/*" | "*/*" => Some(Format::Prometheus),
                _ => None,
            }
        })
    }
}

/// What a request's query string asks for.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
struct Query {
    scope: Option<String>,
    name: Option<String>,
}

impl Query {
    /// Parses the `scope` and `name` parameters; empty values count as absent.
    fn parse(uri: &Uri) -> Result<Query, serde_urlencoded::de::Error> {
        let query: Query = serde_urlencoded::from_str(uri.query().unwrap_or(""))?;
        Ok(Query {
            scope: query.scope.filter(|scope| !scope.is_empty()),
            name: query.name.filter(|name| !name.is_empty()),
        })
    }
}

fn empty_response(status: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::default());
    *response.status_mut() = status;
    response
}

/// Serves exports over HTTP.
///
/// The service is transport-agnostic: [`respond`](MetricsService::respond) maps a method, URI and
/// `Accept` header onto a response, and can be mounted in any `hyper`-based server.  The optional
/// `http-listener` feature provides a standalone listener.
pub struct MetricsService {
    registries: Arc<Registries>,
    prometheus: PrometheusExporter,
    openmetrics: OpenMetricsExporter,
    json: JsonExporter,
}

impl MetricsService {
    /// Creates a `MetricsService` with default settings.
    pub fn new(registries: Arc<Registries>) -> Self {
        Self::builder(registries).build()
    }

    /// Creates a [`MetricsServiceBuilder`].
    pub fn builder(registries: Arc<Registries>) -> MetricsServiceBuilder {
        MetricsServiceBuilder::new(registries)
    }

    fn with_settings(registries: Arc<Registries>, settings: ExportSettings) -> Self {
        MetricsService {
            prometheus: PrometheusExporter::with_settings(registries.clone(), settings.clone()),
            openmetrics: OpenMetricsExporter::with_settings(registries.clone(), settings.clone()),
            json: JsonExporter::with_settings(registries.clone(), settings),
            registries,
        }
    }

    /// Responds to a request.
    pub fn handle<B>(&self, request: &Request<B>) -> Response<Full<Bytes>> {
        let accept = request.headers().get(ACCEPT).and_then(|value| value.to_str().ok());
        self.respond(request.method(), request.uri(), accept)
    }

    /// Responds to a request with the given method, URI and `Accept` header.
    ///
    /// - `GET` and `HEAD` render metrics in the negotiated format; `OPTIONS` renders metadata,
    ///   and requires JSON
    /// - the `scope` and `name` query parameters restrict the export to one scope, one metric
    ///   name, or both
    /// - an unknown scope or metric name responds with `404 Not Found`, and a known scope with
    ///   nothing registered responds with `204 No Content`
    /// - a query string that cannot be decoded responds with `400 Bad Request`
    pub fn respond(
        &self,
        method: &Method,
        uri: &Uri,
        accept: Option<&str>,
    ) -> Response<Full<Bytes>> {
        let metadata = match *method {
            Method::GET | Method::HEAD => false,
            Method::OPTIONS => true,
            _ => return method_not_allowed(),
        };

        let format = match Format::negotiate(accept) {
            Some(format) => format,
            None => return empty_response(StatusCode::NOT_ACCEPTABLE),
        };
        if metadata && format != Format::Json {
            return method_not_allowed();
        }

        let query = match Query::parse(uri) {
            Ok(query) => query,
            Err(error) => {
                debug!(%error, "rejecting malformed query string");
                return empty_response(StatusCode::BAD_REQUEST);
            }
        };
        let scope = query.scope.map(Scope::from);
        let selection = match self.select(scope.as_ref(), query.name.as_deref()) {
            Ok(selection) => selection,
            Err(status) => return empty_response(status),
        };

        let exporter: &dyn Exporter = match format {
            Format::Prometheus => &self.prometheus,
            Format::OpenMetrics => &self.openmetrics,
            Format::Json => &self.json,
        };
        let rendered = if metadata {
            self.json.export_metadata(selection)
        } else {
            exporter.export(selection)
        };

        match rendered {
            Ok(Some(body)) => {
                let body = if *method == Method::HEAD { Bytes::new() } else { Bytes::from(body) };
                let mut response = Response::new(Full::new(body));
                response
                    .headers_mut()
                    .insert(CONTENT_TYPE, HeaderValue::from_static(exporter.content_type()));
                response
            }
            Ok(None) => empty_response(StatusCode::NOT_FOUND),
            Err(error) => {
                warn!(%error, "failed to render export");
                empty_response(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    fn select<'a>(
        &self,
        scope: Option<&'a Scope>,
        name: Option<&'a str>,
    ) -> Result<Selection<'a>, StatusCode> {
        match (scope, name) {
            (Some(scope), name) => {
                let registry = self.registries.get(scope).ok_or(StatusCode::NOT_FOUND)?;
                match name {
                    Some(name) if registry.metadata_for(name).is_none() => {
                        Err(StatusCode::NOT_FOUND)
                    }
                    Some(name) => Ok(Selection::Metric(scope, name)),
                    None if registry.is_empty() => Err(StatusCode::NO_CONTENT),
                    None => Ok(Selection::Scope(scope)),
                }
            }
            (None, Some(name)) => {
                let known = self
                    .registries
                    .iter()
                    .into_iter()
                    .any(|(_, registry)| registry.metadata_for(name).is_some());
                if known {
                    Ok(Selection::MetricAllScopes(name))
                } else {
                    Err(StatusCode::NOT_FOUND)
                }
            }
            (None, None) => Ok(Selection::All),
        }
    }
}

fn method_not_allowed() -> Response<Full<Bytes>> {
    let mut response = empty_response(StatusCode::METHOD_NOT_ALLOWED);
    response.headers_mut().insert(ALLOW, HeaderValue::from_static("GET, HEAD, OPTIONS"));
    response
}

/// Builder for [`MetricsService`].
pub struct MetricsServiceBuilder {
    pub(crate) registries: Arc<Registries>,
    pub(crate) settings: ExportSettings,
    #[cfg(feature = "http-listener")]
    pub(crate) listen_address: std::net::SocketAddr,
}

impl MetricsServiceBuilder {
    fn new(registries: Arc<Registries>) -> Self {
        MetricsServiceBuilder {
            registries,
            settings: ExportSettings::default(),
            #[cfg(feature = "http-listener")]
            listen_address: std::net::SocketAddr::from(([0, 0, 0, 0], 9000)),
        }
    }

    /// Sets the settings used by every exporter.
    #[must_use]
    pub fn with_settings(mut self, settings: ExportSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the address the HTTP listener binds to.
    ///
    /// Defaults to `0.0.0.0:9000`.
    #[cfg(feature = "http-listener")]
    #[cfg_attr(docsrs, doc(cfg(feature = "http-listener")))]
    #[must_use]
    pub fn with_http_listener(mut self, addr: impl Into<std::net::SocketAddr>) -> Self {
        self.listen_address = addr.into();
        self
    }

    /// Builds the [`MetricsService`].
    pub fn build(self) -> MetricsService {
        MetricsService::with_settings(self.registries, self.settings)
    }
}
