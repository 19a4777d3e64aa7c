//! # HTTP Server Module
//!
//! Hyper 1.x server, one Tokio task per connection. Requests are routed by
//! method and path to [`HashHandler`]; every handler error is rendered as a
//! JSON error body with the status code from
//! [`HashServerError::status_code`].
//!
//! Shutdown is cooperative: [`ShutdownHandle::trigger`] (called by
//! `POST /shutdown` or by the binary on SIGINT/SIGTERM) stops the accept loop,
//! asks every open connection to finish its in-flight request, and
//! [`HashServer::serve`] returns once they have all closed.

pub mod config;
pub mod handlers;
pub mod middleware;

pub use config::ServerConfig;
pub use handlers::HashHandler;

use crate::error::{HashServerError, Result};
use crate::stats::StatsAccumulator;
use crate::store::RecordStore;
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use middleware::RequestMiddleware;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

/// Handle used to request a graceful shutdown of a running server
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Ask the server to stop accepting connections and drain
    pub fn trigger(&self) {
        if !self.sender.send_replace(true) {
            info!("Shutdown requested");
        }
    }

    /// Whether shutdown has been requested
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.sender.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }

    /// Wait until every subscribed connection has dropped its receiver
    async fn drained(&self) {
        self.sender.closed().await;
    }
}

/// Resolve once shutdown has been requested
///
/// The `watch::Ref` returned by `wait_for` is dropped here so callers never
/// hold it across an await.
async fn shutdown_requested(receiver: &mut watch::Receiver<bool>) {
    let triggered = receiver.wait_for(|stop| *stop).await.is_ok();
    if !triggered {
        // Sender gone: nobody can trigger shutdown any more.
        std::future::pending::<()>().await;
    }
}

/// Routed endpoint for a request
#[derive(Debug, PartialEq, Eq)]
enum Route<'a> {
    Submit,
    Retrieve(&'a str),
    Stats,
    Shutdown,
    Health,
    Metrics,
}

impl<'a> Route<'a> {
    /// Resolve `path`, ignoring a single trailing slash
    fn resolve(path: &'a str) -> Option<(Self, Method)> {
        let path = match path.strip_suffix('/') {
            Some(trimmed) if !trimmed.is_empty() => trimmed,
            _ => path,
        };

        let route = match path {
            "/hash" => (Self::Submit, Method::POST),
            "/stats" => (Self::Stats, Method::GET),
            "/shutdown" => (Self::Shutdown, Method::POST),
            "/health" => (Self::Health, Method::GET),
            "/metrics" => (Self::Metrics, Method::GET),
            _ => {
                let id = path.strip_prefix("/hash/")?;
                if id.is_empty() || id.contains('/') {
                    return None;
                }
                (Self::Retrieve(id), Method::GET)
            }
        };
        Some(route)
    }
}

/// Hash server instance owning the shared store and statistics
#[derive(Debug)]
pub struct HashServer {
    /// Server configuration
    config: ServerConfig,
    /// Handler for the hash and stats endpoints
    hash_handler: HashHandler,
    /// Shutdown signal shared with connections
    shutdown: ShutdownHandle,
}

impl HashServer {
    /// Create a server with a fresh, system-clock backed store
    ///
    /// ## Errors
    /// - `HashServerError::ConfigError` if the configuration is invalid
    pub fn new(config: ServerConfig) -> Result<Self> {
        Self::with_store(config, Arc::new(RecordStore::new()))
    }

    /// Create a server over an existing store
    ///
    /// ## Errors
    /// - `HashServerError::ConfigError` if the configuration is invalid
    #[instrument(level = "info", name = "server_new", skip(store))]
    pub fn with_store(config: ServerConfig, store: Arc<RecordStore>) -> Result<Self> {
        config.validate()?;

        let stats = Arc::new(StatsAccumulator::new());
        let hash_handler = HashHandler::new(store, stats, config.max_payload_size);

        info!("Hash server initialized");

        Ok(Self {
            config,
            hash_handler,
            shutdown: ShutdownHandle::new(),
        })
    }

    /// Handle for requesting shutdown from outside the server
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Shared record store
    #[must_use]
    pub fn store(&self) -> Arc<RecordStore> {
        Arc::clone(&self.hash_handler.store)
    }

    /// Shared submission statistics
    #[must_use]
    pub fn stats(&self) -> Arc<StatsAccumulator> {
        Arc::clone(&self.hash_handler.stats)
    }

    /// Bind the configured address and serve until shutdown
    ///
    /// ## Errors
    /// - `HashServerError::ServerError` if the address cannot be bound
    #[instrument(level = "info", name = "server_start", skip(self))]
    pub async fn start(self) -> Result<()> {
        let bind_addr = self.config.bind_addr;

        let listener = TcpListener::bind(bind_addr).await.map_err(|e| {
            error!("Failed to bind to address {}: {}", bind_addr, e);
            HashServerError::server_error(
                format!("Failed to bind to address {bind_addr}: {e}"),
                Some(Box::new(e)),
            )
        })?;

        self.serve(listener).await
    }

    /// Serve connections from `listener` until shutdown, then drain
    ///
    /// ## Errors
    /// Currently always returns `Ok(())`; failed accepts and connection
    /// errors are logged and do not stop the server.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        if let Ok(local_addr) = listener.local_addr() {
            info!("Server listening on {}", local_addr);
        }

        let shutdown = self.shutdown.clone();
        let mut shutdown_rx = shutdown.subscribe();
        let server = Arc::new(self);

        loop {
            let (stream, remote_addr) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(connection) => connection,
                    Err(e) => {
                        warn!("Failed to accept connection: {}", e);
                        continue;
                    }
                },
                () = shutdown_requested(&mut shutdown_rx) => break,
            };

            let server_clone = Arc::clone(&server);
            let mut connection_shutdown = shutdown.subscribe();

            tokio::task::spawn(async move {
                let connection = hyper::server::conn::http1::Builder::new().serve_connection(
                    TokioIo::new(stream),
                    service_fn(move |req| {
                        let server = Arc::clone(&server_clone);
                        async move { server.handle_request(req, remote_addr).await }
                    }),
                );
                tokio::pin!(connection);

                let result = tokio::select! {
                    result = connection.as_mut() => result,
                    () = shutdown_requested(&mut connection_shutdown) => {
                        connection.as_mut().graceful_shutdown();
                        connection.as_mut().await
                    }
                };

                if let Err(e) = result {
                    debug!("Connection error from {}: {}", remote_addr, e);
                }
            });
        }

        info!("No longer accepting connections, draining");
        drop(shutdown_rx);
        drop(listener);
        shutdown.drained().await;
        info!("All connections closed");

        Ok(())
    }

    /// Handle an individual HTTP request, rendering errors as responses
    #[instrument(level = "debug", name = "handle_request", skip(self, request))]
    async fn handle_request(
        &self,
        request: Request<Incoming>,
        remote_addr: SocketAddr,
    ) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
        let timer = RequestMiddleware::started();
        let method = request.method().clone();
        let path = request.uri().path().to_string();
        let timeout_ms = self.config.request_timeout_ms;

        let response = tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            self.route(request, remote_addr),
        )
        .await
        .unwrap_or_else(|_| Err(HashServerError::timeout(timeout_ms)));

        let final_response = match response {
            Ok(resp) => resp,
            Err(e) => {
                if e.is_critical() {
                    error!("Critical error handling request from {}: {}", remote_addr, e);
                } else {
                    debug!("Request refused for {}: {}", remote_addr, e.internal_message());
                }
                Self::create_error_response(&e)
            }
        };

        timer.log_completion(final_response.status().as_u16(), &path, method.as_str());
        Ok(final_response)
    }

    /// Dispatch a request to its handler
    async fn route(
        &self,
        request: Request<Incoming>,
        remote_addr: SocketAddr,
    ) -> Result<Response<Full<Bytes>>> {
        let path = request.uri().path().to_string();

        let Some((route, allowed)) = Route::resolve(&path) else {
            warn!("Unknown endpoint: {} {}", request.method(), path);
            return Ok(Self::create_status_response(StatusCode::NOT_FOUND, "Not found", None));
        };

        if request.method() != allowed {
            return Ok(Self::create_status_response(
                StatusCode::METHOD_NOT_ALLOWED,
                "Method not allowed",
                Some(&allowed),
            ));
        }

        match route {
            Route::Submit => self.hash_handler.submit(request, remote_addr).await,
            Route::Retrieve(id) => self.hash_handler.retrieve(id),
            Route::Stats => self.hash_handler.stats(),
            Route::Shutdown => self.handle_shutdown(remote_addr),
            Route::Health if self.config.enable_health_check => self.handle_health_check(),
            Route::Metrics if self.config.enable_metrics => self.handle_metrics(),
            Route::Health | Route::Metrics => {
                Ok(Self::create_status_response(StatusCode::NOT_FOUND, "Not found", None))
            }
        }
    }

    /// Handle `POST /shutdown`
    fn handle_shutdown(&self, remote_addr: SocketAddr) -> Result<Response<Full<Bytes>>> {
        info!("Shutdown requested by {}", remote_addr);
        self.shutdown.trigger();

        Ok(Response::builder()
            .status(StatusCode::ACCEPTED)
            .header("connection", "close")
            .body(Full::new(Bytes::new()))?)
    }

    /// Handle `GET /health`
    fn handle_health_check(&self) -> Result<Response<Full<Bytes>>> {
        let submissions = self
            .hash_handler
            .stats
            .snapshot()
            .map_or(0, |snapshot| snapshot.total);

        let health_status = serde_json::json!({
            "status": if self.shutdown.is_triggered() { "shutting_down" } else { "healthy" },
            "version": crate::VERSION,
            "algorithm": crate::crypto::DIGEST_ALGORITHM,
            "records": self.hash_handler.store.len(),
            "submissions": submissions,
        });

        let response_body = serde_json::to_string(&health_status)?;

        Ok(Response::builder()
            .status(StatusCode::OK)
            .header("content-type", "application/json")
            .header("cache-control", "no-cache")
            .body(Full::new(Bytes::from(response_body)))?)
    }

    /// Handle `GET /metrics` in Prometheus text format
    fn handle_metrics(&self) -> Result<Response<Full<Bytes>>> {
        let snapshot = self.hash_handler.stats.snapshot().unwrap_or(crate::StatsSnapshot {
            total: 0,
            average: 0,
        });

        let prometheus_metrics = format!(
            "# HELP hash_server_records Records held in the store\n\
             # TYPE hash_server_records gauge\n\
             hash_server_records {}\n\
             # HELP hash_server_submissions_total Accepted submissions\n\
             # TYPE hash_server_submissions_total counter\n\
             hash_server_submissions_total {}\n\
             # HELP hash_server_submit_average_micros Mean submission handling time\n\
             # TYPE hash_server_submit_average_micros gauge\n\
             hash_server_submit_average_micros {}\n",
            self.hash_handler.store.len(),
            snapshot.total,
            snapshot.average,
        );

        Ok(Response::builder()
            .status(StatusCode::OK)
            .header("content-type", "text/plain; version=0.0.4")
            .header("cache-control", "no-cache")
            .body(Full::new(Bytes::from(prometheus_metrics)))?)
    }

    /// Render an error as a JSON response, adding `retry-after` when known
    fn create_error_response(error: &HashServerError) -> Response<Full<Bytes>> {
        let status =
            StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = Self::create_status_response(status, error.client_message(), None);

        if let Some(secs) = error.retry_after() {
            response
                .headers_mut()
                .insert(hyper::header::RETRY_AFTER, hyper::header::HeaderValue::from(secs));
        }

        response
    }

    /// Build a JSON error body for `status`
    fn create_status_response(
        status: StatusCode,
        message: &str,
        allow: Option<&Method>,
    ) -> Response<Full<Bytes>> {
        let error_body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        let body_string = serde_json::to_string(&error_body)
            .unwrap_or_else(|_| r#"{"error":"Internal server error","status":500}"#.to_string());

        let mut response = Response::new(Full::new(Bytes::from(body_string)));
        *response.status_mut() = status;

        let headers = response.headers_mut();
        headers.insert(
            hyper::header::CONTENT_TYPE,
            hyper::header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            hyper::header::CACHE_CONTROL,
            hyper::header::HeaderValue::from_static("no-cache"),
        );
        if let Some(method) = allow {
            if let Ok(value) = hyper::header::HeaderValue::from_str(method.as_str()) {
                headers.insert(hyper::header::ALLOW, value);
            }
        }

        response
    }
}

/// Create a server from `config` and serve until shutdown
///
/// ## Example
/// ```rust,no_run
/// use hash_server::{start_server, ServerConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     start_server(ServerConfig::default()).await?;
///     Ok(())
/// }
/// ```
///
/// ## Errors
/// - `HashServerError::ConfigError` if the configuration is invalid
/// - `HashServerError::ServerError` if the address cannot be bound
#[instrument(level = "info", name = "start_server")]
pub async fn start_server(config: ServerConfig) -> Result<()> {
    HashServer::new(config)?.start().await
}
