//! Request runner.

use std::sync::Arc;

use parking_lot::Mutex;
use tessera_core::{Request, Response};
use tessera_telemetry::InFlightGuard;
use tracing::Instrument;

use crate::app::App;
use crate::dispatch::SharedManager;

/// Runs requests through an [`App`].
///
/// Every request gets its own copy of the boot-time middleware manager, so
/// middleware registered during one dispatch never leaks into another.
///
/// # Example
///
/// ```
/// use http::StatusCode;
/// use tessera_config::TesseraConfig;
/// use tessera_core::Request;
/// use tessera_server::{App, Http};
///
/// # tokio_test::block_on(async {
/// let http = Http::new(App::builder(TesseraConfig::default()).build().unwrap());
/// let mut request = Request::new("/missing/page");
/// let response = http.run(&mut request).await;
/// assert_eq!(response.status(), StatusCode::NOT_FOUND);
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct Http {
    app: Arc<App>,
}

impl Http {
    /// Wraps an application.
    #[must_use]
    pub fn new(app: App) -> Self {
        Self { app: Arc::new(app) }
    }

    /// The application.
    #[must_use]
    pub fn app(&self) -> &App {
        &self.app
    }

    /// Dispatches a request and always produces a response.
    ///
    /// Errors escaping the route pipeline are reported and rendered by the
    /// exception handler. Request metrics are recorded and the end hooks of
    /// every named middleware run once the response exists.
    pub async fn run(&self, request: &mut Request) -> Response {
        let _in_flight = InFlightGuard::new();
        let span = tracing::info_span!(
            "request",
            request_id = %request.id(),
            method = %request.method(),
            path = %request.pathinfo(),
        );
        self.dispatch(request).instrument(span).await
    }

    async fn dispatch(&self, request: &mut Request) -> Response {
        let manager: SharedManager = Arc::new(Mutex::new(self.app.middleware().clone()));
        tracing::debug!("dispatching");

        let response = match self.app.route().dispatch(request, &manager).await {
            Ok(response) => response,
            Err(error) => {
                tessera_telemetry::record_exception(error.category().as_str());
                self.app.handle().handle(request, error)
            }
        };

        tessera_telemetry::record_request(
            request.controller(),
            request.action(),
            response.status().as_u16(),
            request.elapsed(),
        );
        manager.lock().end(&response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use serde_json::json;
    use tessera_config::TesseraConfig;
    use tessera_core::{BoxFuture, Reply, TesseraResult};

    use crate::controller::{ActionSignature, Args, Controller};

    struct Index;

    impl Controller for Index {
        fn actions(&self) -> Vec<ActionSignature> {
            vec![ActionSignature::new("index")]
        }

        fn call<'a>(
            &'a self,
            _action: &'a str,
            _request: &'a mut Request,
            _args: Args,
        ) -> BoxFuture<'a, TesseraResult<Reply>> {
            Box::pin(async { Ok(json!({"home": true}).into()) })
        }
    }

    fn http() -> Http {
        let app = App::builder(TesseraConfig::default())
            .controller("Index", |_| Index)
            .build()
            .unwrap();
        Http::new(app)
    }

    #[tokio::test]
    async fn test_root_uses_default_controller() {
        let mut request = Request::new("/");
        let response = http().run(&mut request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.data()["home"], true);
        assert_eq!(request.controller(), "Index");
        assert_eq!(request.action(), "index");
    }

    #[tokio::test]
    async fn test_pre_pipeline_error_is_rendered() {
        let mut request = Request::new("/index/index.php");
        let response = http().run(&mut request).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_requests_do_not_share_manager() {
        let http = http();
        for _ in 0..2 {
            let mut request = Request::new("/");
            http.run(&mut request).await;
        }
        assert!(http
            .app()
            .middleware()
            .all(&tessera_middleware::MiddlewareKind::Controller)
            .is_empty());
    }
}
