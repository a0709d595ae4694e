//! # Tessera Middleware
//!
//! Onion-style middleware for the Tessera framework.
//!
//! - [`Pipeline`] runs a passable through an ordered list of [`Pipe`]s to a
//!   destination. Each layer can short-circuit, and an optional exception
//!   sink turns errors into output at the layer where they surface.
//! - [`Middleware`] is the request-level trait; [`MiddlewarePipe`] adapts it
//!   to a pipe and enforces that it returns a response.
//! - [`MiddlewareManager`] keeps named queues, expands aliases, orders
//!   entries by priority and builds the pipelines used for dispatch.
//!
//! ## Ordering
//!
//! ```text
//! priority = ["auth", "logger"]
//! queue    = [logger, session, auth]
//! runs     =  auth -> logger -> session -> destination
//! ```
//!
//! Entries listed in the priority table run first, in table order. Every
//! other entry keeps its registration order.

#![doc(html_root_url = "https://docs.rs/tessera-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod manager;
pub mod middleware;
pub mod pipeline;
pub mod stages;

pub use error::{PipelineError, INVALID_MIDDLEWARE_CODE, INVALID_RETURN_CODE, NOTHING_SENT_CODE};
pub use manager::{Entry, MiddlewareKind, MiddlewareManager, MiddlewareRef, MiddlewareSpec};
pub use middleware::{FnMiddleware, Middleware, MiddlewarePipe};
pub use pipeline::{FnPipe, Next, Pipe, Pipeline, SinkFn};
pub use stages::{AccessLogMiddleware, RequestIdMiddleware, REQUEST_ID_HEADER};
