//! Response value and the loosely typed [`Reply`] produced by actions.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CACHE_CONTROL, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};
use http_body_util::Full;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{TesseraError, TesseraResult};

/// Output format of a response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// `application/json`
    #[default]
    Json,
    /// `text/html`
    Html,
    /// `text/plain`
    Text,
}

impl ResponseType {
    /// Returns the content type sent for this format.
    #[must_use]
    pub const fn content_type(&self) -> &'static str {
        match self {
            Self::Json => "application/json; charset=utf-8",
            Self::Html => "text/html; charset=utf-8",
            Self::Text => "text/plain; charset=utf-8",
        }
    }
}

impl FromStr for ResponseType {
    type Err = TesseraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "html" => Ok(Self::Html),
            "text" | "txt" => Ok(Self::Text),
            other => Err(TesseraError::server(
                500,
                format!("unknown response type: {other}"),
            )),
        }
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json => "json",
            Self::Html => "html",
            Self::Text => "text",
        })
    }
}

/// A response on its way back through the pipeline.
///
/// Besides the HTTP status and headers a response may carry an API status
/// code and a message. When either is present a JSON response renders the
/// envelope `{"status", "message", "data", "debug"}`; otherwise the data is
/// rendered as the whole body.
///
/// # Example
///
/// ```
/// use http::StatusCode;
/// use serde_json::json;
/// use tessera_core::Response;
///
/// let response = Response::json(json!({"id": 1}))
///     .with_status(StatusCode::CREATED)
///     .with_header("x-trace", "abc");
///
/// assert_eq!(response.status(), StatusCode::CREATED);
/// assert_eq!(response.body_bytes(), br#"{"id":1}"#.as_slice());
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    api_code: Option<i64>,
    message: Option<String>,
    data: Value,
    debug: Option<Value>,
    headers: HeaderMap,
    response_type: ResponseType,
}

impl Response {
    /// Creates a response with the given data, format and status.
    #[must_use]
    pub fn create(data: impl Into<Value>, response_type: ResponseType, status: StatusCode) -> Self {
        Self {
            status,
            api_code: None,
            message: None,
            data: data.into(),
            debug: None,
            headers: HeaderMap::new(),
            response_type,
        }
    }

    /// Creates a 200 JSON response.
    #[must_use]
    pub fn json(data: impl Into<Value>) -> Self {
        Self::create(data, ResponseType::Json, StatusCode::OK)
    }

    /// Creates a 200 HTML response.
    #[must_use]
    pub fn html(content: impl Into<String>) -> Self {
        Self::create(Value::String(content.into()), ResponseType::Html, StatusCode::OK)
    }

    /// Creates a 200 plain-text response.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self::create(Value::String(content.into()), ResponseType::Text, StatusCode::OK)
    }

    /// Creates a response with no body.
    #[must_use]
    pub fn empty(status: StatusCode) -> Self {
        Self::create(Value::Null, ResponseType::Json, status)
    }

    /// Creates a redirect.
    #[must_use]
    pub fn redirect(location: &str, status: StatusCode) -> Self {
        Self::empty(status).with_header("location", location)
    }

    /// Returns the HTTP status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the API status code, if set.
    #[must_use]
    pub const fn api_code(&self) -> Option<i64> {
        self.api_code
    }

    /// Returns the message, if set.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns the data.
    #[must_use]
    pub const fn data(&self) -> &Value {
        &self.data
    }

    /// Returns the debug payload, if any.
    #[must_use]
    pub const fn debug(&self) -> Option<&Value> {
        self.debug.as_ref()
    }

    /// Returns the headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the headers for modification.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Returns the output format.
    #[must_use]
    pub const fn response_type(&self) -> ResponseType {
        self.response_type
    }

    /// Sets the HTTP status.
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Sets the API status code.
    #[must_use]
    pub fn with_code(mut self, code: i64) -> Self {
        self.api_code = Some(code);
        self
    }

    /// Sets the message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Replaces the data.
    #[must_use]
    pub fn with_data(mut self, data: impl Into<Value>) -> Self {
        self.data = data.into();
        self
    }

    /// Attaches a debug payload.
    #[must_use]
    pub fn with_debug(mut self, debug: Value) -> Self {
        self.debug = Some(debug);
        self
    }

    /// Changes the output format.
    #[must_use]
    pub fn with_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    /// Sets a header. Invalid names or values are ignored.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Sets `Cache-Control`.
    #[must_use]
    pub fn cache_control(self, value: &str) -> Self {
        self.with_header(CACHE_CONTROL.as_str(), value)
    }

    /// Overrides `Content-Type`.
    #[must_use]
    pub fn content_type(self, value: &str) -> Self {
        self.with_header(CONTENT_TYPE.as_str(), value)
    }

    fn is_envelope(&self) -> bool {
        self.api_code.is_some() || self.message.is_some()
    }

    /// Renders the body.
    #[must_use]
    pub fn body_bytes(&self) -> Vec<u8> {
        match self.response_type {
            ResponseType::Json => {
                if self.is_envelope() {
                    let mut envelope = Map::new();
                    envelope.insert("status".into(), self.api_code.map_or(Value::Null, Value::from));
                    envelope.insert(
                        "message".into(),
                        Value::String(self.message.clone().unwrap_or_default()),
                    );
                    if !self.data.is_null() {
                        envelope.insert("data".into(), self.data.clone());
                    }
                    if let Some(debug) = &self.debug {
                        envelope.insert("debug".into(), debug.clone());
                    }
                    serde_json::to_vec(&Value::Object(envelope)).unwrap_or_default()
                } else if self.data.is_null() {
                    Vec::new()
                } else {
                    serde_json::to_vec(&self.data).unwrap_or_default()
                }
            }
            ResponseType::Html | ResponseType::Text => match &self.data {
                Value::String(s) => s.clone().into_bytes(),
                Value::Null => self.message.clone().unwrap_or_default().into_bytes(),
                other => other.to_string().into_bytes(),
            },
        }
    }

    /// Converts into an HTTP response.
    #[must_use]
    pub fn into_http(self) -> http::Response<Full<Bytes>> {
        let body = self.body_bytes();
        let mut response = http::Response::new(Full::new(Bytes::from(body)));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        if !response.headers().contains_key(CONTENT_TYPE) {
            response.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static(self.response_type.content_type()),
            );
        }
        response
    }
}

/// The value an action or middleware hands back before it becomes a response.
#[derive(Debug, Clone)]
pub enum Reply {
    /// A finished response.
    Response(Response),
    /// Structured data to be rendered with the request's output format.
    Data(Value),
    /// Nothing; buffered output, if any, becomes the body.
    Empty,
}

impl Reply {
    /// Serializes a value into [`Reply::Data`].
    pub fn data<T: Serialize>(value: &T) -> TesseraResult<Self> {
        serde_json::to_value(value)
            .map(Self::Data)
            .map_err(TesseraError::internal)
    }

    /// Returns the response if this reply is one.
    #[must_use]
    pub fn into_response(self) -> Option<Response> {
        match self {
            Self::Response(response) => Some(response),
            _ => None,
        }
    }
}

impl From<Response> for Reply {
    fn from(response: Response) -> Self {
        Self::Response(response)
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        if value.is_null() {
            Self::Empty
        } else {
            Self::Data(value)
        }
    }
}

impl From<()> for Reply {
    fn from((): ()) -> Self {
        Self::Empty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_json_body() {
        let response = Response::json(json!({"id": 123, "name": "x"}));
        assert_eq!(response.body_bytes(), br#"{"id":123,"name":"x"}"#.to_vec());
    }

    #[test]
    fn test_envelope_body() {
        let response = Response::empty(StatusCode::NOT_FOUND)
            .with_code(404)
            .with_message("controller not exists:Foo");
        let body: Value = serde_json::from_slice(&response.body_bytes()).unwrap();
        assert_eq!(body, json!({"status": 404, "message": "controller not exists:Foo"}));
    }

    #[test]
    fn test_null_body_is_empty() {
        let response = Response::empty(StatusCode::NO_CONTENT);
        assert!(response.body_bytes().is_empty());
    }

    #[test]
    fn test_html_body() {
        let response = Response::html("<p>hi</p>");
        assert_eq!(response.body_bytes(), b"<p>hi</p>".to_vec());
        let http = response.into_http();
        assert_eq!(
            http.headers().get(CONTENT_TYPE).unwrap(),
            "text/html; charset=utf-8"
        );
    }

    #[test]
    fn test_into_http_keeps_explicit_content_type() {
        let http = Response::text("x")
            .content_type("application/xml")
            .with_status(StatusCode::ACCEPTED)
            .into_http();
        assert_eq!(http.status(), StatusCode::ACCEPTED);
        assert_eq!(http.headers().get(CONTENT_TYPE).unwrap(), "application/xml");
    }

    #[test]
    fn test_response_type_from_str() {
        assert_eq!("JSON".parse::<ResponseType>().unwrap(), ResponseType::Json);
        assert_eq!("txt".parse::<ResponseType>().unwrap(), ResponseType::Text);
        assert!("xml".parse::<ResponseType>().is_err());
    }

    #[test]
    fn test_reply_from_value() {
        assert!(matches!(Reply::from(Value::Null), Reply::Empty));
        assert!(matches!(Reply::from(json!([1])), Reply::Data(_)));
        assert!(Reply::from(Response::json(1)).into_response().is_some());
    }
}
