//! # Tessera
//!
//! **Middleware pipelines, URL routing and controller dispatch**
//!
//! Tessera maps a request path onto a controller action, runs it behind
//! two layers of middleware and turns whatever comes out, errors included,
//! into a response:
//!
//! - **Routing**: `/controller/action/key|value` URLs, suffix handling and
//!   bind rules such as `user/:id => @User/show?id=:id`
//! - **Middleware**: named queues with aliases, groups and priorities;
//!   any layer can answer early by not calling `next`
//! - **Declared inputs**: per-action method rules, typed inputs with
//!   defaults and filters
//! - **Errors**: one taxonomy with HTTP status and API code per variant,
//!   rendered as `{status, message, data}` envelopes
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tessera::prelude::*;
//!
//! struct Index;
//!
//! impl Controller for Index {
//!     fn actions(&self) -> Vec<ActionSignature> {
//!         vec![ActionSignature::new("index")]
//!     }
//!
//!     fn call<'a>(
//!         &'a self,
//!         _action: &'a str,
//!         _request: &'a mut Request,
//!         _args: Args,
//!     ) -> BoxFuture<'a, TesseraResult<Reply>> {
//!         Box::pin(async move { Ok(serde_json::json!({ "hello": "world" }).into()) })
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::new()
//!         .with_defaults()
//!         .with_optional_file("tessera.toml")?
//!         .with_env_prefix("TESSERA")
//!         .load()?;
//!
//!     let app = App::builder(config).controller("Index", |_| Index).build()?;
//!     app.init_telemetry()?;
//!     Server::new(app).serve().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Request → route middleware → Dispatch → controller middleware → action
//!                                                                   ↓
//! Response ← end hooks ← Handle (errors) ← coercion ←───────────────┘
//! ```

#![doc(html_root_url = "https://docs.rs/tessera/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use tessera_core as core;

// Re-export configuration
pub use tessera_config as config;

// Re-export logging and metrics
pub use tessera_telemetry as telemetry;

// Re-export middleware types
pub use tessera_middleware as middleware;

// Re-export router types
pub use tessera_router as router;

// Re-export dispatch and server types
pub use tessera_server as server;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use tessera::prelude::*;
///
/// let app = App::builder(TesseraConfig::default()).build().unwrap();
/// assert!(app.container().has("request_id"));
/// ```
pub mod prelude {
    pub use tessera_core::{
        BoxFuture, Container, Handle, Params, Reply, Request, Response, ResponseType,
        TesseraError, TesseraResult, Validate,
    };

    pub use tessera_config::{ConfigLoader, TesseraConfig};

    pub use tessera_middleware::{
        FnMiddleware, Middleware, MiddlewareKind, MiddlewareManager, Next, Pipeline,
    };

    pub use tessera_router::{BindTable, MethodRule, RouteError};

    pub use tessera_server::{
        ActionMeta, ActionSignature, App, Args, Controller, ControllerMiddleware, Http, InputRule,
        RouteOptions, Server, ShutdownSignal,
    };
}
