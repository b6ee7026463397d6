use std::{sync::Arc, time::Duration};

use http_body_util::BodyExt;
use hyper::{
    header::{ACCEPT, CONTENT_TYPE},
    Method, Request, StatusCode,
};
use metrics_exporter_text::{
    Exporter, MetricsService, OpenMetricsExporter, PrometheusExporter,
    JSON_CONTENT_TYPE,
};
use metrics_registry::{Metadata, MetricType, Registries, Scope};
use serde_json::Value;

fn registries() -> Arc<Registries> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    Arc::new(Registries::new())
}

#[test]
fn test_timer_summary() {
    let registries = registries();
    let timer = registries.init(&Scope::APPLICATION).timer("mytimer", [("color", "blue")]).unwrap();
    timer.update(Duration::from_secs(3));
    timer.update(Duration::from_secs(4));

    let output = PrometheusExporter::new(registries).export_all_scopes().unwrap();
    assert!(output.contains("application_mytimer_seconds_count{color=\"blue\"} 2.0\n"));
    assert!(output.contains("application_mytimer_seconds_max{color=\"blue\"} 4.0\n"));
    assert!(output.contains("application_mytimer_seconds{color=\"blue\",quantile=\"0.5\"} 3.0\n"));
}

#[test]
fn test_counter_total_suffix() {
    let registries = registries();
    let registry = registries.init(&Scope::APPLICATION);
    registry.counter("counter1", [("a", "b")]).unwrap().inc();
    registry.counter("counter2_total", [("a", "b")]).unwrap();

    let output = PrometheusExporter::new(registries.clone()).export_all_scopes().unwrap();
    assert!(output.contains("application_counter1_total{a=\"b\"} 1.0\n"));
    assert!(output.contains("application_counter2_total{a=\"b\"} 0.0\n"));
    assert!(!output.contains("counter2_total_total"));

    let output = OpenMetricsExporter::new(registries).export_all_scopes().unwrap();
    assert!(output.contains("# TYPE application:counter2 counter\n"));
    assert!(output.contains("application:counter2_total{a=\"b\"} 0.0\n"));
    assert!(!output.contains("counter2_total_total"));
}

#[test]
fn test_custom_unit_is_not_scaled() {
    let registries = registries();
    let metadata = Metadata::builder("histogram1")
        .with_type(MetricType::Histogram)
        .with_unit("dollars")
        .build()
        .unwrap();
    let histogram = registries.init(&Scope::APPLICATION).histogram_with(&metadata, ()).unwrap();
    histogram.update(10);
    histogram.update(30);

    let output = PrometheusExporter::new(registries).export_all_scopes().unwrap();
    assert!(output.contains("# TYPE application_histogram1_dollars summary\n"));
    assert!(output.contains("application_histogram1_min_dollars 10.0\n"));
    assert!(output.contains("application_histogram1_max_dollars 30.0\n"));
    assert!(output.contains("application_histogram1_mean_dollars 20.0\n"));
}

#[test]
fn test_removing_last_instrument_removes_name() {
    let registries = registries();
    let registry = registries.init(&Scope::APPLICATION);
    let counter = registry.counter("gone", [("a", "1")]).unwrap();
    registry.counter("kept", ()).unwrap();
    assert!(registry.names().contains("gone"));

    let id = registry
        .metric_ids()
        .into_iter()
        .find(|id| id.name() == "gone")
        .unwrap();
    assert!(registry.remove(&id));
    counter.inc();

    assert!(!registry.names().contains("gone"));
    assert!(registry.metadata_for("gone").is_none());
    let output = PrometheusExporter::new(registries).export_all_scopes().unwrap();
    assert!(!output.contains("gone"));
    assert!(output.contains("application_kept_total 0.0\n"));
}

#[tokio::test]
async fn test_json_over_http() {
    let registries = registries();
    registries.init(&Scope::BASE).gauge("uptime", (), || 12.0).unwrap();
    registries.init(&Scope::APPLICATION).counter("hits", [("page", "a;b")]).unwrap().increment(2);
    let service = MetricsService::new(registries);

    let request = Request::builder()
        .method(Method::GET)
        .uri("/metrics?scope=application")
        .header(ACCEPT, "application/json")
        .body(())
        .unwrap();
    let response = service.handle(&request);
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], JSON_CONTENT_TYPE);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let document: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(document["hits;page=a_b"], Value::from(2));
    assert!(document.get("uptime").is_none());
}

#[test]
fn test_metadata_over_http() {
    let registries = registries();
    let metadata = Metadata::builder("elapsed")
        .with_type(MetricType::Timer)
        .with_description("Time spent")
        .build()
        .unwrap();
    registries.init(&Scope::VENDOR).timer_with(&metadata, ()).unwrap();
    let service = MetricsService::new(registries);

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/metrics?scope=vendor&name=elapsed")
        .header(ACCEPT, "application/json")
        .body(())
        .unwrap();
    let response = service.handle(&request);
    assert_eq!(response.status(), StatusCode::OK);

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/metrics")
        .header(ACCEPT, "text/plain")
        .body(())
        .unwrap();
    assert_eq!(service.handle(&request).status(), StatusCode::METHOD_NOT_ALLOWED);
}
