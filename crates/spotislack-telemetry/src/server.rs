//! HTTP metrics server for Prometheus scraping
//!
//! Exposes a `/metrics` endpoint on the configured address that returns
//! Prometheus text exposition format.

use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::metrics::MetricsRegistry;

/// HTTP server that serves Prometheus metrics on a configurable endpoint.
pub struct MetricsServer {
    metrics: Arc<MetricsRegistry>,
    addr: SocketAddr,
}

impl MetricsServer {
    /// Creates a new `MetricsServer`.
    ///
    /// # Arguments
    /// * `metrics` - The shared metrics registry
    /// * `endpoint` - Address to bind, e.g. `"127.0.0.1:9100"`
    pub fn new(metrics: Arc<MetricsRegistry>, endpoint: &str) -> anyhow::Result<Self> {
        let addr: SocketAddr = endpoint.parse()?;
        Ok(Self { metrics, addr })
    }

    /// Binds the listening socket
    pub async fn bind(&self) -> anyhow::Result<TcpListener> {
        let listener = TcpListener::bind(self.addr).await?;
        info!(addr = %listener.local_addr()?, "Metrics server listening");
        Ok(listener)
    }

    /// Binds and serves until `shutdown` is cancelled.
    ///
    /// Should be spawned as a background task.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let listener = self.bind().await?;
        self.serve(listener, shutdown).await
    }

    /// Serves connections from an already bound listener
    pub async fn serve(&self, listener: TcpListener, shutdown: CancellationToken) -> anyhow::Result<()> {
        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, _) = result?;
                    let io = TokioIo::new(stream);
                    let metrics = Arc::clone(&self.metrics);

                    tokio::spawn(async move {
                        let service = service_fn(move |req| {
                            let metrics = Arc::clone(&metrics);
                            async move { Ok::<_, hyper::Error>(handle_request(req, &metrics)) }
                        });

                        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                            error!(error = %e, "Metrics HTTP connection error");
                        }
                    });
                }
                _ = shutdown.cancelled() => {
                    info!("Metrics server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

fn text_response(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
}

/// Handle a single HTTP request.
fn handle_request<B>(req: Request<B>, metrics: &MetricsRegistry) -> Response<Full<Bytes>> {
    if req.uri().path() != "/metrics" {
        return text_response(StatusCode::NOT_FOUND, "Not Found");
    }

    match metrics.encode() {
        Ok(body) => {
            let mut response = text_response(StatusCode::OK, body);
            response.headers_mut().insert(
                hyper::header::CONTENT_TYPE,
                hyper::header::HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
            );
            response
        }
        Err(e) => text_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to encode metrics: {e}"),
        ),
    }
}
