//! The [`Middleware`] trait.
//!
//! Middleware wraps request handling: it receives the request, the rest of
//! the pipeline as a [`Next`] and an optional parameter given at
//! registration. It must hand back a [`Reply::Response`]; any other reply
//! is rejected with a server error (code 5010).
//!
//! # Example
//!
//! ```
//! use tessera_core::{BoxFuture, Reply, Request, TesseraResult};
//! use tessera_middleware::{Middleware, Next};
//!
//! struct PoweredBy;
//!
//! impl Middleware for PoweredBy {
//!     fn name(&self) -> &str {
//!         "powered_by"
//!     }
//!
//!     fn handle<'a>(
//!         &'a self,
//!         request: &'a mut Request,
//!         next: Next<'a>,
//!         _param: Option<&'a serde_json::Value>,
//!     ) -> BoxFuture<'a, TesseraResult<Reply>> {
//!         Box::pin(async move {
//!             let response = next.run(request).await?;
//!             Ok(response.with_header("x-powered-by", "tessera").into())
//!         })
//!     }
//! }
//! ```

use std::sync::Arc;

use serde_json::Value;
use tessera_core::{BoxFuture, Container, Reply, Request, Response, TesseraError, TesseraResult};

use crate::error::INVALID_RETURN_CODE;
use crate::pipeline::{Next, Pipe};

/// A request middleware.
pub trait Middleware: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Handles the request.
    ///
    /// Returning without calling `next` short-circuits the pipeline.
    fn handle<'a>(
        &'a self,
        request: &'a mut Request,
        next: Next<'a>,
        param: Option<&'a Value>,
    ) -> BoxFuture<'a, TesseraResult<Reply>>;

    /// Called once with the final response, after dispatch.
    ///
    /// Only middleware resolved through the container by name receive it.
    fn end(&self, _response: &Response) {}
}

/// A middleware built from a closure.
///
/// ```
/// use tessera_middleware::FnMiddleware;
///
/// let mw = FnMiddleware::new("noop", |request, next, _param| {
///     Box::pin(async move { Ok(next.run(request).await?.into()) })
/// });
/// # let _ = mw;
/// ```
pub struct FnMiddleware<F> {
    name: String,
    func: F,
}

impl<F> FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut Request, Next<'a>, Option<&'a Value>) -> BoxFuture<'a, TesseraResult<Reply>>
        + Send
        + Sync
        + 'static,
{
    /// Wraps a closure.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut Request, Next<'a>, Option<&'a Value>) -> BoxFuture<'a, TesseraResult<Reply>>
        + Send
        + Sync
        + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn handle<'a>(
        &'a self,
        request: &'a mut Request,
        next: Next<'a>,
        param: Option<&'a Value>,
    ) -> BoxFuture<'a, TesseraResult<Reply>> {
        (self.func)(request, next, param)
    }
}

enum Source {
    Instance(Arc<dyn Middleware>),
    Named {
        name: String,
        container: Arc<Container>,
    },
}

/// Adapts a [`Middleware`] to a [`Pipe`] over requests.
///
/// Named middleware are looked up in the container when the pipe first
/// runs, not when it is built.
pub struct MiddlewarePipe {
    source: Source,
    param: Option<Value>,
}

impl MiddlewarePipe {
    /// Wraps an instance.
    #[must_use]
    pub fn new(middleware: Arc<dyn Middleware>, param: Option<Value>) -> Self {
        Self {
            source: Source::Instance(middleware),
            param,
        }
    }

    /// Wraps a container identifier.
    #[must_use]
    pub fn named(name: impl Into<String>, container: Arc<Container>, param: Option<Value>) -> Self {
        Self {
            source: Source::Named {
                name: name.into(),
                container,
            },
            param,
        }
    }

    fn resolve(&self) -> TesseraResult<Arc<dyn Middleware>> {
        match &self.source {
            Source::Instance(middleware) => Ok(Arc::clone(middleware)),
            Source::Named { name, container } => Ok(container.make::<dyn Middleware>(name, false)?),
        }
    }
}

impl Pipe<Request, Response, TesseraError> for MiddlewarePipe {
    fn handle<'a>(
        &'a self,
        request: &'a mut Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, TesseraResult<Response>> {
        Box::pin(async move {
            let middleware = self.resolve()?;
            match middleware.handle(request, next, self.param.as_ref()).await? {
                Reply::Response(response) => Ok(response),
                _ => Err(TesseraError::server(
                    INVALID_RETURN_CODE,
                    "The middleware must return Response instance",
                )),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Pipeline;
    use http::StatusCode;
    use serde_json::json;

    fn ok(request: &mut Request) -> BoxFuture<'_, TesseraResult<Response>> {
        Box::pin(async move { Ok(Response::text(request.pathinfo().to_string())) })
    }

    #[tokio::test]
    async fn test_fn_middleware_sees_param() {
        let mw = FnMiddleware::new("tag", |request, next, param| {
            Box::pin(async move {
                let tag = param.and_then(Value::as_str).unwrap_or("none").to_string();
                let response = next.run(request).await?;
                Ok(response.with_header("x-tag", &tag).into())
            })
        });
        assert_eq!(mw.name(), "tag");

        let pipeline = Pipeline::new().pipe(MiddlewarePipe::new(Arc::new(mw), Some(json!("blue"))));
        let mut request = Request::new("/index");
        let response = pipeline.process(&mut request, ok).await.unwrap();
        assert_eq!(response.headers()["x-tag"], "blue");
    }

    #[tokio::test]
    async fn test_non_response_reply_is_rejected() {
        let mw = FnMiddleware::new("answer", |_request, _next, _param| {
            Box::pin(async { Ok(Reply::Data(json!(42))) })
        });
        let pipeline = Pipeline::new().pipe(MiddlewarePipe::new(Arc::new(mw), None));
        let mut request = Request::new("/");

        let err = pipeline.process(&mut request, ok).await.unwrap_err();
        assert_eq!(err.api_code(), INVALID_RETURN_CODE);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_named_middleware_must_be_bound() {
        let pipe = MiddlewarePipe::named("missing", Arc::new(Container::new()), None);
        let pipeline = Pipeline::new().pipe(pipe);
        let mut request = Request::new("/");
        let err = pipeline.process(&mut request, ok).await.unwrap_err();
        assert!(err.to_string().contains("missing"));
    }
}
