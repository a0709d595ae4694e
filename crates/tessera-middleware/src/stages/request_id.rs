//! Request ID middleware.
//!
//! Assigns every request a UUID v7 identifier and echoes it in the
//! `x-request-id` response header. Incoming identifiers are only reused
//! when the middleware is built with [`RequestIdMiddleware::trust_incoming`].

use serde_json::Value;
use tessera_core::{BoxFuture, Reply, Request, RequestId, TesseraResult};
use uuid::Uuid;

use crate::middleware::Middleware;
use crate::pipeline::Next;

/// Header carrying the request ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Generates or propagates request IDs.
#[derive(Debug, Clone, Default)]
pub struct RequestIdMiddleware {
    trust_incoming: bool,
}

impl RequestIdMiddleware {
    /// Always generates a fresh ID.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reuses a valid UUID from the `x-request-id` header when present.
    #[must_use]
    pub fn trust_incoming() -> Self {
        Self {
            trust_incoming: true,
        }
    }

    fn incoming(&self, request: &Request) -> Option<RequestId> {
        if !self.trust_incoming {
            return None;
        }
        request
            .header(REQUEST_ID_HEADER)
            .and_then(|value| Uuid::parse_str(value.trim()).ok())
            .map(RequestId::from_uuid)
    }
}

impl Middleware for RequestIdMiddleware {
    fn name(&self) -> &str {
        "request_id"
    }

    fn handle<'a>(
        &'a self,
        request: &'a mut Request,
        next: Next<'a>,
        _param: Option<&'a Value>,
    ) -> BoxFuture<'a, TesseraResult<Reply>> {
        Box::pin(async move {
            let id = self.incoming(request).unwrap_or_else(RequestId::new);
            request.set_id(id);

            let response = next.run(request).await?;
            Ok(response.with_header(REQUEST_ID_HEADER, &id.to_string()).into())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::MiddlewarePipe;
    use crate::pipeline::Pipeline;
    use std::sync::Arc;
    use tessera_core::Response;

    const INCOMING: &str = "01890a5d-ac96-774b-bcce-b302099a8057";

    fn echo_id(request: &mut Request) -> BoxFuture<'_, TesseraResult<Response>> {
        Box::pin(async move { Ok(Response::text(request.id().to_string())) })
    }

    async fn run(middleware: RequestIdMiddleware, request: &mut Request) -> Response {
        Pipeline::new()
            .pipe(MiddlewarePipe::new(Arc::new(middleware), None))
            .process(request, echo_id)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_generated_id_matches_header() {
        let mut request = Request::new("/");
        let before = request.id();
        let response = run(RequestIdMiddleware::new(), &mut request).await;

        let header = response.headers()[REQUEST_ID_HEADER].to_str().unwrap().to_string();
        assert_eq!(header, request.id().to_string());
        assert_eq!(response.data().as_str(), Some(header.as_str()));
        assert_ne!(request.id(), before);
    }

    #[tokio::test]
    async fn test_incoming_id_ignored_by_default() {
        let mut request = Request::builder().header(REQUEST_ID_HEADER, INCOMING).build();
        let response = run(RequestIdMiddleware::new(), &mut request).await;
        assert_ne!(response.headers()[REQUEST_ID_HEADER], INCOMING);
    }

    #[tokio::test]
    async fn test_incoming_id_trusted() {
        let mut request = Request::builder().header(REQUEST_ID_HEADER, INCOMING).build();
        let response = run(RequestIdMiddleware::trust_incoming(), &mut request).await;
        assert_eq!(response.headers()[REQUEST_ID_HEADER], INCOMING);
        assert_eq!(request.id().to_string(), INCOMING);
    }

    #[tokio::test]
    async fn test_malformed_incoming_id_replaced() {
        let mut request = Request::builder().header(REQUEST_ID_HEADER, "not-a-uuid").build();
        let response = run(RequestIdMiddleware::trust_incoming(), &mut request).await;
        assert_ne!(response.headers()[REQUEST_ID_HEADER], "not-a-uuid");
    }
}
