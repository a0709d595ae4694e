//! The request value threaded through every pipeline.
//!
//! [`Request`] carries the HTTP method, the path info used for routing,
//! headers, the parsed query and body data, route variables and the
//! controller/action pair selected by dispatch. Middleware and actions share
//! state through typed extensions.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE, HOST};
use http::{HeaderMap, Method};
use indexmap::IndexMap;
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::response::ResponseType;

/// Ordered string parameters (query, body, route or action parameters).
pub type Params = IndexMap<String, String>;

/// Unique identifier of a request.
///
/// Backed by a UUID v7, so identifiers sort by creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new unique request ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Wraps an existing UUID, e.g. one received in an `x-request-id` header.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An incoming request as seen by middleware, dispatch and actions.
///
/// # Example
///
/// ```
/// use tessera_core::Request;
///
/// let request = Request::builder()
///     .method("POST")
///     .path("/user/save")
///     .query("page", "2")
///     .form("name", "alice")
///     .build();
///
/// assert_eq!(request.pathinfo(), "user/save");
/// assert_eq!(request.data("page"), Some("2"));
/// assert_eq!(request.data("name"), Some("alice"));
/// ```
pub struct Request {
    id: RequestId,
    method: Method,
    pathinfo: String,
    headers: HeaderMap,
    query: Params,
    body: Params,
    raw_body: Bytes,
    route: Params,
    assigned: Params,
    controller: String,
    action: String,
    response_type: Option<ResponseType>,
    output: String,
    started_at: Instant,
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Request {
    /// Creates a GET request for the given path.
    #[must_use]
    pub fn new(path: &str) -> Self {
        Self {
            id: RequestId::new(),
            method: Method::GET,
            pathinfo: normalize_pathinfo(path),
            headers: HeaderMap::new(),
            query: Params::new(),
            body: Params::new(),
            raw_body: Bytes::new(),
            route: Params::new(),
            assigned: Params::new(),
            controller: String::new(),
            action: String::new(),
            response_type: None,
            output: String::new(),
            started_at: Instant::now(),
            extensions: HashMap::new(),
        }
    }

    /// Starts building a request.
    #[must_use]
    pub fn builder() -> RequestBuilder {
        RequestBuilder::default()
    }

    /// Converts an HTTP request whose body has already been collected.
    ///
    /// The path is percent-decoded into the path info and the query string is
    /// decoded into [`query`](Self::query). Bodies sent as
    /// `application/x-www-form-urlencoded` or as a JSON object are decoded into
    /// [`body`](Self::body); scalar JSON values are kept in their textual form.
    #[must_use]
    pub fn from_http(parts: http::request::Parts, body: Bytes) -> Self {
        let path = percent_decode_str(parts.uri.path()).decode_utf8_lossy();
        let mut request = Self::new(&path);
        request.method = parts.method;
        if let Some(query) = parts.uri.query() {
            request.query = parse_query(query);
        }
        request.body = parse_body(&parts.headers, &body);
        request.headers = parts.headers;
        request.raw_body = body;
        request
    }

    /// Returns the request ID.
    #[must_use]
    pub const fn id(&self) -> RequestId {
        self.id
    }

    /// Replaces the request ID.
    pub fn set_id(&mut self, id: RequestId) {
        self.id = id;
    }

    /// Returns the HTTP method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Overrides the HTTP method.
    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    /// Returns the path info: the URL path without leading or trailing slashes.
    #[must_use]
    pub fn pathinfo(&self) -> &str {
        &self.pathinfo
    }

    /// Replaces the path info.
    pub fn set_pathinfo(&mut self, path: &str) {
        self.pathinfo = normalize_pathinfo(path);
    }

    /// Returns the host header without port, or an empty string.
    #[must_use]
    pub fn host(&self) -> &str {
        self.headers
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .map(|h| h.split(':').next().unwrap_or(h))
            .unwrap_or("")
    }

    /// Returns a header value by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns all headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the headers for modification.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Returns the decoded query string.
    #[must_use]
    pub const fn query(&self) -> &Params {
        &self.query
    }

    /// Returns the decoded body fields.
    #[must_use]
    pub const fn body(&self) -> &Params {
        &self.body
    }

    /// Returns the raw body bytes.
    #[must_use]
    pub const fn raw_body(&self) -> &Bytes {
        &self.raw_body
    }

    /// Looks up a value in the merged query and body data.
    ///
    /// Body fields only take part for methods that carry a body
    /// (POST, PUT, PATCH, DELETE) and win over query values.
    #[must_use]
    pub fn data(&self, name: &str) -> Option<&str> {
        if self.has_body_method() {
            if let Some(value) = self.body.get(name) {
                return Some(value);
            }
        }
        self.query.get(name).map(String::as_str)
    }

    /// Returns the merged query and body data.
    #[must_use]
    pub fn all_data(&self) -> Params {
        let mut merged = self.query.clone();
        if self.has_body_method() {
            merged.extend(self.body.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        merged
    }

    /// Looks up a value in the final parameter set.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.assigned
            .get(name)
            .or_else(|| self.route.get(name))
            .map(String::as_str)
            .or_else(|| self.data(name))
    }

    /// Returns the final parameter set: data, then route variables, then
    /// values applied through [`set`](Self::set), later sources winning.
    #[must_use]
    pub fn params(&self) -> Params {
        let mut merged = self.all_data();
        merged.extend(self.route.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged.extend(self.assigned.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }

    /// Applies values on top of the parameter set.
    pub fn set<I, K, V>(&mut self, params: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.assigned
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
    }

    /// Merges route variables resolved during dispatch.
    pub fn set_route<I, K, V>(&mut self, params: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.route
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
    }

    /// Returns the route variables.
    #[must_use]
    pub const fn route(&self) -> &Params {
        &self.route
    }

    /// Returns the controller name selected by dispatch.
    #[must_use]
    pub fn controller(&self) -> &str {
        &self.controller
    }

    /// Sets the controller name.
    pub fn set_controller(&mut self, controller: impl Into<String>) {
        self.controller = controller.into();
    }

    /// Returns the action name selected by dispatch.
    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Sets the action name.
    pub fn set_action(&mut self, action: impl Into<String>) {
        self.action = action.into();
    }

    /// Returns the output format chosen for this request, if any.
    #[must_use]
    pub const fn response_type(&self) -> Option<ResponseType> {
        self.response_type
    }

    /// Chooses the output format for this request.
    pub fn set_response_type(&mut self, response_type: ResponseType) {
        self.response_type = Some(response_type);
    }

    /// Appends to the buffered output.
    pub fn write(&mut self, content: &str) {
        self.output.push_str(content);
    }

    /// Drains the buffered output.
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    /// Returns the time elapsed since the request was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Stores a typed extension, replacing any previous value of that type.
    pub fn insert_extension<T: Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Returns a typed extension.
    #[must_use]
    pub fn extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<T>())
    }

    /// Removes and returns a typed extension.
    pub fn remove_extension<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.extensions
            .remove(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast::<T>().ok())
            .map(|boxed| *boxed)
    }

    fn has_body_method(&self) -> bool {
        matches!(
            self.method,
            Method::POST | Method::PUT | Method::PATCH | Method::DELETE
        )
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("pathinfo", &self.pathinfo)
            .field("controller", &self.controller)
            .field("action", &self.action)
            .field("extensions", &self.extensions.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Request`], mostly used by tests and embedders.
#[derive(Debug, Default)]
pub struct RequestBuilder {
    method: Option<Method>,
    path: String,
    headers: HeaderMap,
    query: Params,
    body: Params,
}

impl RequestBuilder {
    /// Sets the method. Unknown methods fall back to GET.
    #[must_use]
    pub fn method(mut self, method: &str) -> Self {
        self.method = Method::from_bytes(method.to_ascii_uppercase().as_bytes()).ok();
        self
    }

    /// Sets the path.
    #[must_use]
    pub fn path(mut self, path: &str) -> Self {
        self.path = path.to_string();
        self
    }

    /// Adds a header. Invalid names or values are skipped.
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    /// Adds a query parameter.
    #[must_use]
    pub fn query(mut self, name: &str, value: &str) -> Self {
        self.query.insert(name.to_string(), value.to_string());
        self
    }

    /// Adds a body field.
    #[must_use]
    pub fn form(mut self, name: &str, value: &str) -> Self {
        self.body.insert(name.to_string(), value.to_string());
        self
    }

    /// Builds the request.
    #[must_use]
    pub fn build(self) -> Request {
        let mut request = Request::new(&self.path);
        request.method = self.method.unwrap_or(Method::GET);
        request.headers = self.headers;
        request.query = self.query;
        request.body = self.body;
        request
    }
}

fn normalize_pathinfo(path: &str) -> String {
    path.trim_matches('/').to_string()
}

fn parse_query(query: &str) -> Params {
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

fn parse_body(headers: &HeaderMap, body: &Bytes) -> Params {
    if body.is_empty() {
        return Params::new();
    }
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if content_type.starts_with("application/json") {
        match serde_json::from_slice::<serde_json::Value>(body) {
            Ok(serde_json::Value::Object(map)) => map
                .into_iter()
                .map(|(k, v)| {
                    let text = match v {
                        serde_json::Value::String(s) => s,
                        serde_json::Value::Null => String::new(),
                        other => other.to_string(),
                    };
                    (k, text)
                })
                .collect(),
            _ => Params::new(),
        }
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        parse_query(&String::from_utf8_lossy(body))
    } else {
        Params::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_unique() {
        assert_ne!(RequestId::new(), RequestId::new());
    }

    #[test]
    fn test_pathinfo_is_trimmed() {
        let request = Request::new("/user/show/");
        assert_eq!(request.pathinfo(), "user/show");
    }

    #[test]
    fn test_body_ignored_for_get() {
        let request = Request::builder().path("/").form("name", "x").build();
        assert_eq!(request.data("name"), None);
    }

    #[test]
    fn test_body_wins_over_query_for_post() {
        let request = Request::builder()
            .method("post")
            .query("name", "q")
            .form("name", "b")
            .build();
        assert_eq!(request.data("name"), Some("b"));
    }

    #[test]
    fn test_params_precedence() {
        let mut request = Request::builder().query("id", "1").query("page", "3").build();
        request.set_route([("id", "2")]);
        assert_eq!(request.param("id"), Some("2"));

        request.set([("id", "3")]);
        let params = request.params();
        assert_eq!(params.get("id").map(String::as_str), Some("3"));
        assert_eq!(params.get("page").map(String::as_str), Some("3"));
    }

    #[test]
    fn test_from_http_decodes_query_and_json_body() {
        let (parts, ()) = http::Request::builder()
            .method("PUT")
            .uri("/user/update?id=7&tag=a%20b")
            .header("content-type", "application/json")
            .header("host", "api.example.com:8080")
            .body(())
            .unwrap()
            .into_parts();
        let request = Request::from_http(parts, Bytes::from(r#"{"name":"x","age":3}"#));

        assert_eq!(request.method(), Method::PUT);
        assert_eq!(request.pathinfo(), "user/update");
        assert_eq!(request.data("tag"), Some("a b"));
        assert_eq!(request.data("age"), Some("3"));
        assert_eq!(request.host(), "api.example.com");
    }

    #[test]
    fn test_from_http_decodes_path() {
        let (parts, ()) = http::Request::builder()
            .uri("/blog/caf%C3%A9/a%20b")
            .body(())
            .unwrap()
            .into_parts();
        let request = Request::from_http(parts, Bytes::new());
        assert_eq!(request.pathinfo(), "blog/café/a b");
    }

    #[test]
    fn test_from_http_decodes_form_body() {
        let (parts, ()) = http::Request::builder()
            .method("POST")
            .uri("/login")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(())
            .unwrap()
            .into_parts();
        let request = Request::from_http(parts, Bytes::from("user=bob&remember=on"));
        assert_eq!(request.data("user"), Some("bob"));
        assert_eq!(request.data("remember"), Some("on"));
    }

    #[test]
    fn test_output_buffer() {
        let mut request = Request::new("/");
        request.write("hello ");
        request.write("world");
        assert_eq!(request.take_output(), "hello world");
        assert_eq!(request.take_output(), "");
    }

    #[test]
    fn test_extensions() {
        #[derive(Debug, PartialEq)]
        struct UserId(u64);

        let mut request = Request::new("/");
        request.insert_extension(UserId(42));
        assert_eq!(request.extension::<UserId>(), Some(&UserId(42)));
        assert_eq!(request.remove_extension::<UserId>(), Some(UserId(42)));
        assert!(request.extension::<UserId>().is_none());
    }
}
