use std::{future::Future, net::SocketAddr, pin::Pin, sync::Arc};

use hyper::{
    body::Incoming, server::conn::http1::Builder as HyperHttpBuilder, service::service_fn,
    Request,
};
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tracing::warn;

use crate::http::{MetricsService, MetricsServiceBuilder};

/// Errors that can occur while starting the HTTP listener.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Failed to create the HTTP listener.
    #[error("failed to create HTTP listener: {0}")]
    FailedToCreateHTTPListener(String),
}

/// Convenience type for a future running the HTTP listener.
pub type ListenerFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

struct HttpListeningExporter {
    service: Arc<MetricsService>,
}

impl HttpListeningExporter {
    async fn serve(&self, listener: TcpListener) {
        loop {
            let stream = match listener.accept().await {
                Ok((stream, _)) => stream,
                Err(e) => {
                    warn!("Error accepting connection. Ignoring request. Error: {:?}", e);
                    continue;
                }
            };

            self.process_stream(stream);
        }
    }

    fn process_stream(&self, stream: TcpStream) {
        let service = self.service.clone();
        let handler = service_fn(move |req: Request<Incoming>| {
            let service = service.clone();
            async move { Ok::<_, hyper::Error>(service.handle(&req)) }
        });

        tokio::task::spawn(async move {
            if let Err(err) =
                HyperHttpBuilder::new().serve_connection(TokioIo::new(stream), handler).await
            {
                warn!("Error serving connection.  Error: {:?}", err);
            };
        });
    }
}

impl MetricsServiceBuilder {
    /// Builds the [`MetricsService`] along with a future that serves it over HTTP.
    ///
    /// The listener binds immediately; the returned future must be spawned on a Tokio runtime to
    /// start accepting connections.
    ///
    /// # Errors
    ///
    /// If the listen address cannot be bound, an error variant will be returned describing why.
    #[cfg_attr(docsrs, doc(cfg(feature = "http-listener")))]
    pub fn build_with_listener(
        self,
    ) -> Result<(Arc<MetricsService>, ListenerFuture), BuildError> {
        let listen_address = self.listen_address;
        let service = Arc::new(self.build());
        let future = new_http_listener(service.clone(), listen_address)?;
        Ok((service, future))
    }
}

/// Creates a `ListenerFuture` serving `service` on `listen_address`.
fn new_http_listener(
    service: Arc<MetricsService>,
    listen_address: SocketAddr,
) -> Result<ListenerFuture, BuildError> {
    let listener = std::net::TcpListener::bind(listen_address)
        .and_then(|listener| {
            listener.set_nonblocking(true)?;
            Ok(listener)
        })
        .map_err(|e| BuildError::FailedToCreateHTTPListener(e.to_string()))?;

    let exporter = HttpListeningExporter { service };

    Ok(Box::pin(async move {
        match TcpListener::from_std(listener) {
            Ok(listener) => exporter.serve(listener).await,
            Err(e) => warn!("Error registering HTTP listener with the runtime. Error: {:?}", e),
        }
    }))
}
