//! Access log middleware.
//!
//! Emits one `info` event per request once the rest of the pipeline has
//! produced a response. Errors are logged at `warn` and passed on
//! unchanged so the pipeline sink can render them.

use std::time::Instant;

use serde_json::Value;
use tessera_core::{BoxFuture, Reply, Request, Response, TesseraResult};

use crate::middleware::Middleware;
use crate::pipeline::Next;

/// Logs method, path, status and duration of each request.
#[derive(Debug, Clone, Default)]
pub struct AccessLogMiddleware;

impl AccessLogMiddleware {
    /// Creates the middleware.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Middleware for AccessLogMiddleware {
    fn name(&self) -> &str {
        "access_log"
    }

    fn handle<'a>(
        &'a self,
        request: &'a mut Request,
        next: Next<'a>,
        _param: Option<&'a Value>,
    ) -> BoxFuture<'a, TesseraResult<Reply>> {
        Box::pin(async move {
            let started = Instant::now();
            let method = request.method().clone();
            let path = request.pathinfo().to_string();

            match next.run(request).await {
                Ok(response) => {
                    tracing::info!(
                        request_id = %request.id(),
                        method = %method,
                        path = %path,
                        status = response.status().as_u16(),
                        duration_ms = started.elapsed().as_secs_f64() * 1000.0,
                        "request completed"
                    );
                    Ok(response.into())
                }
                Err(error) => {
                    tracing::warn!(
                        request_id = %request.id(),
                        method = %method,
                        path = %path,
                        status = error.status_code().as_u16(),
                        error = %error,
                        duration_ms = started.elapsed().as_secs_f64() * 1000.0,
                        "request failed"
                    );
                    Err(error)
                }
            }
        })
    }

    fn end(&self, response: &Response) {
        tracing::debug!(status = response.status().as_u16(), "response sent");
    }
}
