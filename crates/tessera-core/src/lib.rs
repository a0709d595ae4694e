//! # Tessera Core
//!
//! Core types shared by every Tessera crate:
//!
//! - [`Request`] / [`Response`] / [`Reply`] - values threaded through pipelines
//! - [`TesseraError`] - the error taxonomy, with HTTP status and API code per variant
//! - [`Handle`] - turns errors into log lines and responses
//! - [`Container`] - explicit registry of factories for controllers and middleware
//! - [`Validate`] - rule, length and filter checks for declared inputs

#![doc(html_root_url = "https://docs.rs/tessera-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod container;
mod error;
mod exception;
mod request;
mod response;
pub mod validate;

pub use container::{Container, InjectionError};
pub use error::{
    ErrorCategory, TesseraError, TesseraResult, DEFAULT_INVALID_ARGUMENT_CODE, INTERNAL_ERROR_CODE,
};
pub use exception::{ExceptionInfo, Handle};
pub use request::{Params, Request, RequestBuilder, RequestId};
pub use response::{Reply, Response, ResponseType};
pub use validate::Validate;

/// A boxed, sendable future, used wherever a trait hands back async work.
pub type BoxFuture<'a, T> = std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;
