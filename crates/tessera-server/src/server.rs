//! HTTP/1 server.
//!
//! Accepts connections with Tokio, serves them with hyper and hands each
//! request to [`Http::run`]. Shutdown stops the accept loop, asks open
//! connections to finish their current request and waits for them up to
//! `server.shutdown_timeout_secs`.
//!
//! ```no_run
//! use tessera_config::ConfigLoader;
//! use tessera_server::{App, Server};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::new().with_defaults().with_env_prefix("TESSERA").load()?;
//! let app = App::builder(config).build()?;
//! app.init_telemetry()?;
//! Server::new(app).serve().await?;
//! # Ok(())
//! # }
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tessera_core::{Request, Response};
use tokio::net::{TcpListener, TcpStream};

use crate::app::App;
use crate::error::ServerError;
use crate::runner::Http;
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

/// The HTTP server.
#[derive(Debug)]
pub struct Server {
    http: Http,
    addr: String,
    shutdown_timeout: Duration,
    request_timeout: Duration,
    max_body_bytes: usize,
}

impl Server {
    /// Creates a server using the `[server]` section of the app's config.
    #[must_use]
    pub fn new(app: App) -> Self {
        let config = app.config().server.clone();
        Self {
            http: Http::new(app),
            addr: config.http_addr,
            shutdown_timeout: Duration::from_secs(config.shutdown_timeout_secs),
            request_timeout: Duration::from_millis(config.request_timeout_ms),
            max_body_bytes: config.max_body_bytes,
        }
    }

    /// The request runner.
    #[must_use]
    pub const fn http(&self) -> &Http {
        &self.http
    }

    /// Serves until SIGINT or SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when the address is invalid or cannot be bound.
    pub async fn serve(self) -> Result<(), ServerError> {
        self.serve_with_shutdown(ShutdownSignal::from_os_signals()).await
    }

    /// Serves on the configured address until `shutdown` fires.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when the address is invalid or cannot be bound.
    pub async fn serve_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let addr: SocketAddr = self
            .addr
            .parse()
            .map_err(|source| ServerError::InvalidAddress {
                addr: self.addr.clone(),
                source,
            })?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        self.serve_on(listener, shutdown).await
    }

    /// Serves on an already bound listener until `shutdown` fires.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] when the listener's address is unavailable.
    pub async fn serve_on(self, listener: TcpListener, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        tracing::info!(addr = %listener.local_addr()?, "server listening");

        let server = Arc::new(self);
        let tracker = ConnectionTracker::new();
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote)) => {
                        let server = Arc::clone(&server);
                        let guard = tracker.open();
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            server.connection(stream, remote, shutdown).await;
                            drop(guard);
                        });
                    }
                    Err(e) => tracing::warn!(error = %e, "accept failed"),
                },
                () = shutdown.wait() => break,
            }
        }

        tracing::info!(
            connections = tracker.active(),
            timeout_secs = server.shutdown_timeout.as_secs(),
            "shutting down"
        );
        if tokio::time::timeout(server.shutdown_timeout, tracker.drained())
            .await
            .is_err()
        {
            tracing::warn!(connections = tracker.active(), "shutdown timeout reached");
        }
        tracing::info!("server stopped");
        Ok(())
    }

    async fn connection(self: Arc<Self>, stream: TcpStream, remote: SocketAddr, shutdown: ShutdownSignal) {
        let server = Arc::clone(&self);
        let service = service_fn(move |request: http::Request<Incoming>| {
            let server = Arc::clone(&server);
            async move { Ok::<_, Infallible>(server.respond(request).await) }
        });

        let connection = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
        tokio::pin!(connection);
        let result = tokio::select! {
            result = connection.as_mut() => result,
            () = shutdown.wait() => {
                connection.as_mut().graceful_shutdown();
                connection.as_mut().await
            }
        };
        if let Err(e) = result {
            tracing::debug!(remote = %remote, error = %e, "connection closed with error");
        }
    }

    async fn respond(&self, request: http::Request<Incoming>) -> http::Response<Full<Bytes>> {
        let (parts, body) = request.into_parts();
        let collected =
            tokio::time::timeout(self.request_timeout, Limited::new(body, self.max_body_bytes).collect())
                .await;
        let body = match collected {
            Ok(Ok(collected)) => collected.to_bytes(),
            Ok(Err(e)) if e.is::<LengthLimitError>() => {
                return failure(StatusCode::PAYLOAD_TOO_LARGE, "request body too large");
            }
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "failed to read request body");
                return failure(StatusCode::BAD_REQUEST, "invalid request body");
            }
            Err(_) => return failure(StatusCode::REQUEST_TIMEOUT, "request body timed out"),
        };

        let mut request = Request::from_http(parts, body);
        match tokio::time::timeout(self.request_timeout, self.http.run(&mut request)).await {
            Ok(response) => response.into_http(),
            Err(_) => {
                tracing::warn!(
                    request_id = %request.id(),
                    path = %request.pathinfo(),
                    "request timed out"
                );
                failure(StatusCode::GATEWAY_TIMEOUT, "request timed out")
            }
        }
    }
}

fn failure(status: StatusCode, message: &str) -> http::Response<Full<Bytes>> {
    Response::empty(status)
        .with_code(i64::from(status.as_u16()))
        .with_message(message)
        .into_http()
}
