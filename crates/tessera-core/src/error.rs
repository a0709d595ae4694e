//! Error types for Tessera.
//!
//! [`TesseraError`] is the single error type flowing through pipelines and
//! dispatch. Every variant knows its HTTP status and its API status code, so
//! the exception handler never has to guess how to render it.
//!
//! | Variant | HTTP | API code | Reported |
//! |---|---|---|---|
//! | `NotFound` | 404 | 404 | no |
//! | `MethodNotAllowed` | 405 | 405 | no |
//! | `InvalidArgument` | 400 | caller supplied, default 4000 | no |
//! | `Api` | caller supplied | caller supplied | no |
//! | `Server` | caller supplied, default 500 | caller supplied | yes |
//! | `Internal` | 500 | 50000 | yes |
//! | `Response` | carried | carried | no |

use std::backtrace::Backtrace;
use std::panic::Location;
use std::sync::Arc;

use http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::container::InjectionError;
use crate::response::Response;

/// Result type alias using [`TesseraError`].
pub type TesseraResult<T> = Result<T, TesseraError>;

/// API code used when an invalid argument carries no code of its own.
pub const DEFAULT_INVALID_ARGUMENT_CODE: i64 = 4000;

/// API code of unclassified internal failures.
pub const INTERNAL_ERROR_CODE: i64 = 50000;

/// Categories of errors, used for reporting decisions and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Unresolvable controller, action or binding.
    NotFound,
    /// HTTP verb rejected by the declared method rule.
    MethodNotAllowed,
    /// Missing or malformed input.
    InvalidArgument,
    /// Explicit API error raised by business code.
    Api,
    /// Configuration, container or contract failure.
    Server,
    /// Anything else, including panics.
    Internal,
    /// Early response escape; not a failure.
    Response,
}

impl ErrorCategory {
    /// Returns the default HTTP status code for this category.
    #[must_use]
    pub const fn default_status_code(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::InvalidArgument => StatusCode::BAD_REQUEST,
            Self::Api | Self::Response => StatusCode::OK,
            Self::Server | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the label used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::MethodNotAllowed => "method_not_allowed",
            Self::InvalidArgument => "invalid_argument",
            Self::Api => "api",
            Self::Server => "server",
            Self::Internal => "internal",
            Self::Response => "response",
        }
    }
}

/// Standard error type for Tessera.
///
/// # Example
///
/// ```
/// use tessera_core::{ErrorCategory, TesseraError};
///
/// fn load(id: &str) -> Result<(), TesseraError> {
///     if id.is_empty() {
///         return Err(TesseraError::invalid_argument("id is required"));
///     }
///     Ok(())
/// }
///
/// let err = load("").unwrap_err();
/// assert_eq!(err.category(), ErrorCategory::InvalidArgument);
/// assert_eq!(err.api_code(), 4000);
/// ```
#[derive(Error, Debug)]
pub enum TesseraError {
    /// Controller, action or binding could not be resolved.
    #[error("{message}")]
    NotFound {
        /// Human-readable message.
        message: String,
    },

    /// The request method does not satisfy the declared rule.
    #[error("method not allowed: {method} (allowed: {allowed})")]
    MethodNotAllowed {
        /// The rejected method.
        method: String,
        /// The declared rule.
        allowed: String,
    },

    /// Missing or malformed input.
    #[error("{message}")]
    InvalidArgument {
        /// Human-readable message.
        message: String,
        /// API status code.
        code: i64,
    },

    /// Error raised deliberately by business code.
    #[error("{message}")]
    Api {
        /// HTTP status.
        status: StatusCode,
        /// API status code.
        code: i64,
        /// Human-readable message.
        message: String,
        /// Extra response headers.
        headers: HeaderMap,
    },

    /// Configuration, container or contract failure.
    #[error("{message}")]
    Server {
        /// HTTP status.
        status: StatusCode,
        /// API status code.
        code: i64,
        /// Human-readable message.
        message: String,
        /// Where the error was raised.
        location: &'static Location<'static>,
        /// Backtrace captured when the error was raised.
        trace: Arc<Backtrace>,
    },

    /// Any other failure.
    #[error("{error}")]
    Internal {
        /// The wrapped error.
        error: anyhow::Error,
        /// Where the error was converted.
        location: &'static Location<'static>,
        /// Backtrace captured at conversion.
        trace: Arc<Backtrace>,
    },

    /// Short-circuits to a prebuilt response.
    #[error("early response ({})", .0.status())]
    Response(Box<Response>),
}

impl TesseraError {
    /// Creates a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a method-not-allowed error.
    pub fn method_not_allowed(method: impl Into<String>, allowed: impl Into<String>) -> Self {
        Self::MethodNotAllowed {
            method: method.into(),
            allowed: allowed.into(),
        }
    }

    /// Creates an invalid-argument error with the default API code.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::invalid_argument_with_code(message, DEFAULT_INVALID_ARGUMENT_CODE)
    }

    /// Creates an invalid-argument error with a specific API code.
    pub fn invalid_argument_with_code(message: impl Into<String>, code: i64) -> Self {
        Self::InvalidArgument {
            message: message.into(),
            code,
        }
    }

    /// Creates an API error.
    ///
    /// Unknown HTTP codes fall back to 200, matching how API errors are
    /// commonly delivered inside a successful envelope.
    pub fn api(status: u16, code: i64, message: impl Into<String>) -> Self {
        Self::Api {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::OK),
            code,
            message: message.into(),
            headers: HeaderMap::new(),
        }
    }

    /// Creates a server error with HTTP status 500.
    #[track_caller]
    pub fn server(code: i64, message: impl Into<String>) -> Self {
        Self::server_with_status(StatusCode::INTERNAL_SERVER_ERROR, code, message)
    }

    /// Creates a server error with an explicit HTTP status.
    #[track_caller]
    pub fn server_with_status(status: StatusCode, code: i64, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            code,
            message: message.into(),
            location: Location::caller(),
            trace: Arc::new(Backtrace::capture()),
        }
    }

    /// Wraps any error as an internal failure.
    #[track_caller]
    pub fn internal(error: impl Into<anyhow::Error>) -> Self {
        Self::Internal {
            error: error.into(),
            location: Location::caller(),
            trace: Arc::new(Backtrace::capture()),
        }
    }

    /// Short-circuits dispatch with a prebuilt response.
    pub fn respond(response: Response) -> Self {
        Self::Response(Box::new(response))
    }

    /// Adds a header to an API error. Other variants are returned unchanged.
    #[must_use]
    pub fn with_header(mut self, name: http::HeaderName, value: http::HeaderValue) -> Self {
        if let Self::Api { headers, .. } = &mut self {
            headers.insert(name, value);
        }
        self
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::MethodNotAllowed { .. } => ErrorCategory::MethodNotAllowed,
            Self::InvalidArgument { .. } => ErrorCategory::InvalidArgument,
            Self::Api { .. } => ErrorCategory::Api,
            Self::Server { .. } => ErrorCategory::Server,
            Self::Internal { .. } => ErrorCategory::Internal,
            Self::Response(_) => ErrorCategory::Response,
        }
    }

    /// Returns the HTTP status for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Api { status, .. } | Self::Server { status, .. } => *status,
            Self::Response(response) => response.status(),
            other => other.category().default_status_code(),
        }
    }

    /// Returns the API status code for this error.
    #[must_use]
    pub fn api_code(&self) -> i64 {
        match self {
            Self::NotFound { .. } => 404,
            Self::MethodNotAllowed { .. } => 405,
            Self::InvalidArgument { code, .. }
            | Self::Api { code, .. }
            | Self::Server { code, .. } => *code,
            Self::Internal { .. } => INTERNAL_ERROR_CODE,
            Self::Response(response) => response.api_code().unwrap_or(0),
        }
    }

    /// Returns the variant name shown in debug payloads.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NotFound",
            Self::MethodNotAllowed { .. } => "MethodNotAllowed",
            Self::InvalidArgument { .. } => "InvalidArgument",
            Self::Api { .. } => "Api",
            Self::Server { .. } => "Server",
            Self::Internal { .. } => "Internal",
            Self::Response(_) => "Response",
        }
    }

    /// Returns where the error was raised, for variants that record it.
    #[must_use]
    pub const fn location(&self) -> Option<&'static Location<'static>> {
        match self {
            Self::Server { location, .. } | Self::Internal { location, .. } => Some(*location),
            _ => None,
        }
    }

    /// Returns the captured backtrace, for variants that record one.
    #[must_use]
    pub fn trace(&self) -> Option<&Backtrace> {
        match self {
            Self::Server { trace, .. } | Self::Internal { trace, .. } => Some(trace.as_ref()),
            _ => None,
        }
    }

    /// Returns extra headers to put on the rendered response.
    #[must_use]
    pub const fn headers(&self) -> Option<&HeaderMap> {
        match self {
            Self::Api { headers, .. } => Some(headers),
            _ => None,
        }
    }
}

impl From<InjectionError> for TesseraError {
    #[track_caller]
    fn from(err: InjectionError) -> Self {
        Self::server(50014, err.to_string())
    }
}
