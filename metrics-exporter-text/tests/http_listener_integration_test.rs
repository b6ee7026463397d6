#[cfg(all(test, feature = "http-listener"))]
mod http_listener_test {
    use std::{net::SocketAddr, sync::Arc, time::Duration};

    use http_body_util::{BodyExt, Empty};
    use hyper::{
        body::Bytes,
        header::{ACCEPT, CONTENT_TYPE},
        Request, StatusCode, Uri,
    };
    use hyper_util::client::legacy::{connect::HttpConnector, Client};
    use metrics_exporter_text::{MetricsService, JSON_CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE};
    use metrics_registry::{Registries, Scope};
    use tokio::net::TcpListener;

    #[test]
    fn test_http_listener() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap_or_else(|e| panic!("Failed to create test runtime: {:?}", e));

        runtime.block_on(async {
            let local = [127, 0, 0, 1];
            let port = get_available_port(local).await;
            let socket_address = SocketAddr::from((local, port));

            let registries = Arc::new(Registries::new());
            registries
                .init(&Scope::APPLICATION)
                .gauge("basic_gauge", [("wutang", "forever")], || -1.23)
                .unwrap();

            let (_service, listener) = MetricsService::builder(registries)
                .with_http_listener(socket_address)
                .build_with_listener()
                .unwrap_or_else(|e| panic!("failed to create http listener: {:?}", e));

            runtime.spawn(listener);
            tokio::time::sleep(Duration::from_millis(200)).await;

            let uri = endpoint(socket_address, "/metrics?scope=application");
            let (status, body, content_type) = read_from(uri, None).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(content_type, PROMETHEUS_CONTENT_TYPE);
            assert!(body.contains("application_basic_gauge{wutang=\"forever\"} -1.23"));

            let uri = endpoint(socket_address, "/metrics");
            let (status, body, content_type) = read_from(uri, Some("application/json")).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(content_type, JSON_CONTENT_TYPE);
            assert!(body.contains("\"basic_gauge;wutang=forever\":-1.23"));

            let uri = endpoint(socket_address, "/metrics?scope=nope");
            let (status, body, _) = read_from(uri, None).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert!(body.is_empty());
        });
    }

    fn endpoint(address: SocketAddr, path: &str) -> Uri {
        format!("http://{address}{path}")
            .parse::<Uri>()
            .unwrap_or_else(|e| panic!("Error parsing URI: {:?}", e))
    }

    async fn get_available_port(listen_address: [u8; 4]) -> u16 {
        let socket_address = SocketAddr::from((listen_address, 0));
        TcpListener::bind(socket_address)
            .await
            .unwrap_or_else(|e| {
                panic!("Unable to bind to an available port on address {socket_address}: {:?}", e);
            })
            .local_addr()
            .expect("Unable to obtain local address from TcpListener")
            .port()
    }

    async fn read_from(endpoint: Uri, accept_header: Option<&str>) -> (StatusCode, String, String) {
        let client =
            Client::builder(hyper_util::rt::TokioExecutor::new()).build(HttpConnector::new());

        let req = Request::builder().uri(endpoint.to_string());
        let req = if let Some(accept) = accept_header { req.header(ACCEPT, accept) } else { req };
        let req = req
            .body(Empty::<Bytes>::new())
            .unwrap_or_else(|e| panic!("Failed building request: {:?}", e));

        let response = client
            .request(req)
            .await
            .unwrap_or_else(|e| panic!("Failed requesting data from {endpoint}: {:?}", e));

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let body = response
            .into_body()
            .collect()
            .await
            .unwrap_or_else(|e| panic!("Error reading response: {:?}", e))
            .to_bytes();

        (status, String::from_utf8(body.to_vec()).unwrap(), content_type)
    }
}
