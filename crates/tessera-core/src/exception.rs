//! Exception-to-response translation.
//!
//! [`Handle`] is the single place where a [`TesseraError`] is turned into a
//! log decision and a [`Response`]. Pipelines use it as their exception sink.

use std::fmt::Write as _;

use http::StatusCode;
use serde_json::{json, Map, Value};

use crate::error::{ErrorCategory, TesseraError};
use crate::request::{Params, Request};
use crate::response::{Response, ResponseType};

const GENERIC_SERVER_MESSAGE: &str = "System Exception";
const GENERIC_ARGUMENT_MESSAGE: &str = "Invalid Argument";
const SOURCE_CONTEXT_LINES: u32 = 9;

/// Classification of one error, computed once and shared by report and render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionInfo {
    /// HTTP status of the rendered response.
    pub status: StatusCode,
    /// API status code placed in the body.
    pub api_code: i64,
    /// The error's own message.
    pub message: String,
    /// The message shown to clients.
    pub rendered: String,
}

/// Exception handler.
///
/// Debug mode is fixed when the handler is built and applies to every
/// request it renders.
///
/// # Example
///
/// ```
/// use http::StatusCode;
/// use tessera_core::{Handle, Request, TesseraError};
///
/// let handle = Handle::new(false, false);
/// let request = Request::new("/user/show");
/// let response = handle.handle(&request, TesseraError::server(5010, "broken"));
///
/// assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
/// assert_eq!(response.message(), Some("System Exception"));
/// ```
#[derive(Debug, Clone)]
pub struct Handle {
    debug: bool,
    record_trace: bool,
    ignore: Vec<ErrorCategory>,
}

impl Handle {
    /// Creates a handler.
    ///
    /// Not-found, method, argument, API and response-escape errors are not
    /// reported by default.
    #[must_use]
    pub fn new(debug: bool, record_trace: bool) -> Self {
        Self {
            debug,
            record_trace,
            ignore: vec![
                ErrorCategory::NotFound,
                ErrorCategory::MethodNotAllowed,
                ErrorCategory::InvalidArgument,
                ErrorCategory::Api,
                ErrorCategory::Response,
            ],
        }
    }

    /// Replaces the list of categories that are never reported.
    #[must_use]
    pub fn with_ignored(mut self, ignore: Vec<ErrorCategory>) -> Self {
        self.ignore = ignore;
        self
    }

    /// Returns `true` when debug output is enabled.
    #[must_use]
    pub const fn is_debug(&self) -> bool {
        self.debug
    }

    /// Returns `true` if the error would be logged.
    #[must_use]
    pub fn should_report(&self, error: &TesseraError) -> bool {
        !self.ignore.contains(&error.category())
    }

    /// Classifies an error.
    #[must_use]
    pub fn classify(&self, error: &TesseraError) -> ExceptionInfo {
        let status = error.status_code();
        let api_code = error.api_code();
        let message = error.to_string();
        let rendered = match error {
            TesseraError::Server { .. } | TesseraError::Internal { .. } => {
                if self.debug {
                    message.clone()
                } else {
                    GENERIC_SERVER_MESSAGE.to_string()
                }
            }
            TesseraError::InvalidArgument { .. } => {
                if self.debug {
                    format!("invalid argument: {message}")
                } else {
                    GENERIC_ARGUMENT_MESSAGE.to_string()
                }
            }
            TesseraError::Api { code, .. } => {
                if self.debug || (*code != 0 && !message.is_empty()) {
                    message.clone()
                } else {
                    String::new()
                }
            }
            _ => message.clone(),
        };
        ExceptionInfo {
            status,
            api_code,
            message,
            rendered,
        }
    }

    /// Logs the error unless its category is ignored.
    pub fn report(&self, error: &TesseraError) {
        if self.should_report(error) {
            let info = self.classify(error);
            self.report_with(error, &info);
        }
    }

    /// Renders the error as a response.
    #[must_use]
    pub fn render(&self, request: &Request, error: TesseraError) -> Response {
        let info = self.classify(&error);
        self.render_with(request, error, &info)
    }

    /// Reports and renders an error, classifying it once.
    #[must_use]
    pub fn handle(&self, request: &Request, error: TesseraError) -> Response {
        if let TesseraError::Response(response) = error {
            return *response;
        }
        let info = self.classify(&error);
        if self.should_report(&error) {
            self.report_with(&error, &info);
        }
        self.render_with(request, error, &info)
    }

    fn report_with(&self, error: &TesseraError, info: &ExceptionInfo) {
        let location = error
            .location()
            .map_or_else(|| "unknown".to_string(), |l| format!("{}:{}", l.file(), l.line()));
        let mut line = format!("[{}]{}[{}]", info.api_code, info.message, location);
        if self.record_trace {
            if let Some(trace) = error.trace() {
                let _ = write!(line, "\n{trace}");
            }
        }
        tracing::error!(
            category = error.category().as_str(),
            status = info.status.as_u16(),
            code = info.api_code,
            location = %location,
            "{line}"
        );
    }

    fn render_with(&self, request: &Request, error: TesseraError, info: &ExceptionInfo) -> Response {
        let error = match error {
            TesseraError::Response(response) => return *response,
            other => other,
        };

        let mut response = Response::create(
            Value::Null,
            request.response_type().unwrap_or(ResponseType::Json),
            info.status,
        )
        .with_code(info.api_code)
        .with_message(info.rendered.clone());

        if let Some(headers) = error.headers() {
            for (name, value) in headers {
                response.headers_mut().insert(name.clone(), value.clone());
            }
        }

        if self.debug {
            response = response.with_debug(debug_payload(request, &error, info));
        }
        response
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::new(false, false)
    }
}

fn debug_payload(request: &Request, error: &TesseraError, info: &ExceptionInfo) -> Value {
    let mut payload = Map::new();
    payload.insert("name".into(), Value::from(error.name()));
    if let Some(location) = error.location() {
        payload.insert("file".into(), Value::from(location.file()));
        payload.insert("line".into(), Value::from(location.line()));
        if let Some(source) = source_excerpt(location.file(), location.line()) {
            payload.insert("source".into(), source);
        }
    }
    if let Some(trace) = error.trace() {
        let lines: Vec<Value> = trace
            .to_string()
            .lines()
            .map(|l| Value::from(l.trim_end()))
            .collect();
        payload.insert("trace".into(), Value::Array(lines));
    }
    payload.insert(
        "datas".into(),
        json!({ "status": info.status.as_u16(), "code": info.api_code }),
    );
    payload.insert(
        "tables".into(),
        json!({
            "GET Data": params_value(request.query()),
            "POST Data": params_value(request.body()),
            "Route": params_value(request.route()),
            "Headers": request
                .headers()
                .iter()
                .map(|(k, v)| (k.to_string(), Value::from(v.to_str().unwrap_or(""))))
                .collect::<Map<_, _>>(),
        }),
    );
    Value::Object(payload)
}

fn params_value(params: &Params) -> Value {
    Value::Object(
        params
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
            .collect(),
    )
}

fn source_excerpt(file: &str, line: u32) -> Option<Value> {
    let content = std::fs::read_to_string(file).ok()?;
    let first = line.saturating_sub(SOURCE_CONTEXT_LINES).max(1);
    let lines: Vec<Value> = content
        .lines()
        .skip(first as usize - 1)
        .take((SOURCE_CONTEXT_LINES * 2 + 1) as usize)
        .map(Value::from)
        .collect();
    Some(json!({ "first": first, "source": lines }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> Request {
        Request::builder().path("/user/show").query("id", "7").build()
    }

    #[test]
    fn test_production_hides_server_messages() {
        let handle = Handle::new(false, false);
        let response = handle.handle(&request(), TesseraError::server(5010, "secret detail"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.api_code(), Some(5010));
        assert_eq!(response.message(), Some("System Exception"));
        assert!(response.debug().is_none());
    }

    #[test]
    fn test_debug_exposes_message_and_payload() {
        let handle = Handle::new(true, false);
        let response = handle.handle(&request(), TesseraError::server(5010, "secret detail"));
        assert_eq!(response.message(), Some("secret detail"));

        let debug = response.debug().unwrap();
        assert_eq!(debug["name"], "Server");
        assert!(debug["file"].as_str().unwrap().ends_with("exception.rs"));
        assert_eq!(debug["tables"]["GET Data"]["id"], "7");
    }

    #[test]
    fn test_invalid_argument_messages() {
        let err = || TesseraError::invalid_argument("param miss: page");
        let production = Handle::new(false, false).classify(&err());
        assert_eq!(production.rendered, "Invalid Argument");
        assert_eq!(production.status, StatusCode::BAD_REQUEST);

        let debug = Handle::new(true, false).classify(&err());
        assert_eq!(debug.rendered, "invalid argument: param miss: page");
        assert_eq!(debug.api_code, 4000);
    }

    #[test]
    fn test_api_error_message_rules() {
        let handle = Handle::new(false, false);
        assert_eq!(handle.classify(&TesseraError::api(200, 0, "ok")).rendered, "");
        assert_eq!(
            handle.classify(&TesseraError::api(403, 10003, "forbidden")).rendered,
            "forbidden"
        );
    }

    #[test]
    fn test_api_error_headers_are_rendered() {
        let err = TesseraError::api(429, 10029, "slow down").with_header(
            http::header::RETRY_AFTER,
            http::HeaderValue::from_static("30"),
        );
        let response = Handle::default().handle(&request(), err);
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("retry-after").unwrap(), "30");
    }

    #[test]
    fn test_response_escape_is_returned_verbatim() {
        let redirect = Response::redirect("/login", StatusCode::FOUND);
        let response = Handle::new(true, true).handle(&request(), TesseraError::respond(redirect));
        assert_eq!(response.status(), StatusCode::FOUND);
        assert!(response.api_code().is_none());
        assert_eq!(response.headers().get("location").unwrap(), "/login");
    }

    #[test]
    fn test_reporting_decisions() {
        let handle = Handle::default();
        assert!(!handle.should_report(&TesseraError::not_found("x")));
        assert!(!handle.should_report(&TesseraError::invalid_argument("x")));
        assert!(handle.should_report(&TesseraError::server(1, "x")));
        assert!(handle.should_report(&TesseraError::internal(anyhow::anyhow!("x"))));

        let everything = Handle::default().with_ignored(Vec::new());
        assert!(everything.should_report(&TesseraError::not_found("x")));
    }

    #[test]
    fn test_rendered_type_follows_request() {
        let mut request = request();
        request.set_response_type(ResponseType::Html);
        let response = Handle::default().render(&request, TesseraError::not_found("gone"));
        assert_eq!(response.response_type(), ResponseType::Html);
        assert_eq!(response.body_bytes(), b"gone".to_vec());
    }
}
