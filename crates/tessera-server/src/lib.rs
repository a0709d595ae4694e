//! # Tessera Server
//!
//! Controllers, dispatch and the HTTP front end of Tessera.
//!
//! A request travels through these layers:
//!
//! ```text
//! Server ─▶ Http::run ─▶ Route::dispatch ─▶ route pipeline ─▶ Dispatch::run
//!                                                                │
//!                             controller pipeline ◀──────────────┘
//!                                     │
//!                                     ▼
//!                           Controller::call ─▶ Reply ─▶ Response
//! ```
//!
//! - [`Route`] normalizes the path, applies bind rules and builds a
//!   [`Dispatch`]; route middleware wraps everything after that.
//! - [`Dispatch`] builds the controller, checks the method and declared
//!   inputs ([`ActionMeta`]) and runs the action behind controller
//!   middleware.
//! - [`Http`] turns leftover errors into responses, records metrics and runs
//!   middleware end hooks.
//! - [`Server`] serves an [`App`] over HTTP/1 with graceful shutdown.
//!
//! # Example
//!
//! ```
//! use http::StatusCode;
//! use serde_json::json;
//! use tessera_config::TesseraConfig;
//! use tessera_core::{BoxFuture, Reply, Request, TesseraResult};
//! use tessera_server::{ActionMeta, ActionSignature, App, Args, Controller, Http, InputRule};
//!
//! struct User;
//!
//! impl Controller for User {
//!     fn actions(&self) -> Vec<ActionSignature> {
//!         vec![ActionSignature::new("show")
//!             .param("id")
//!             .meta(ActionMeta::new().input("id", InputRule::new().kind("int")))]
//!     }
//!
//!     fn call<'a>(
//!         &'a self,
//!         _action: &'a str,
//!         _request: &'a mut Request,
//!         args: Args,
//!     ) -> BoxFuture<'a, TesseraResult<Reply>> {
//!         Box::pin(async move { Ok(json!({ "id": args.parse::<i64>("id")? }).into()) })
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let mut config = TesseraConfig::default();
//! config.route.bind.insert("user/:id".into(), "@User/show?id=:id".into());
//! let http = Http::new(App::builder(config).controller("User", |_| User).build().unwrap());
//!
//! let mut request = Request::new("/user/42");
//! let response = http.run(&mut request).await;
//! assert_eq!(response.status(), StatusCode::OK);
//! assert_eq!(response.data()["id"], 42);
//! # });
//! ```

#![doc(html_root_url = "https://docs.rs/tessera-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod annotation;
mod app;
mod controller;
mod dispatch;
mod error;
mod route;
mod runner;
mod server;
pub mod shutdown;

pub use annotation::{ActionMeta, InputRule};
pub use app::{App, AppBuilder, ACCESS_LOG, REQUEST_ID};
pub use controller::{ActionSignature, Args, Controller, ControllerMiddleware, ParamSpec};
pub use dispatch::{
    coerce, Dispatch, DispatchContext, DispatchTarget, SharedManager, CONTROLLER_MISSING_CODE,
};
pub use error::ServerError;
pub use route::{route_error, Route, RouteLoader, RouteOptions, ROUTE_ERROR_CODE};
pub use runner::Http;
pub use server::Server;
pub use shutdown::ShutdownSignal;
