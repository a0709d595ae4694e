//! Typed configuration for Tessera applications.
//!
//! Configuration is a single [`TesseraConfig`] value assembled in layers:
//! defaults or a preset, then a TOML/JSON file, then `.env`, then
//! environment variables. Unknown fields are rejected and
//! [`TesseraConfig::validate`] checks everything that serde cannot,
//! including that every bind rule and method rule compiles.
//!
//! # Example
//!
//! ```no_run
//! use tessera_config::ConfigLoader;
//!
//! # fn main() -> Result<(), tessera_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_defaults()
//!     .with_file("config/app.toml")?
//!     .with_env_prefix("TESSERA")
//!     .load()?;
//!
//! println!("listening on {}", config.server.http_addr);
//! # Ok(())
//! # }
//! ```
//!
//! # File format
//!
//! ```toml
//! [app]
//! debug = false
//! default_controller = "Index"
//! default_action = "index"
//! url_html_suffix = "html"
//! default_return_type = "json"
//!
//! [app.route_rest_action]
//! save = "POST"
//!
//! [middleware]
//! priority = ["auth"]
//! global = ["request_id"]
//!
//! [middleware.alias]
//! web = ["access_log", "auth"]
//!
//! [route.bind]
//! "user/:id" = "@User/show?id=:id"
//!
//! [log]
//! level = "info"
//! format = "json"
//!
//! [server]
//! http_addr = "0.0.0.0:8080"
//!
//! [metrics]
//! enabled = true
//! addr = "0.0.0.0:9090"
//! ```
//!
//! # Environment overrides
//!
//! Keys take the form `PREFIX__SECTION__KEY`, for example
//! `TESSERA__APP__DEBUG=true` or `TESSERA__MIDDLEWARE__PRIORITY=auth,log`.
//! Unrecognized keys are ignored.

#![doc(html_root_url = "https://docs.rs/tessera-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::{TesseraConfig, TesseraConfigBuilder};
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{
    AliasTarget, AppConfig, LogFormat, LogSection, MetricsConfig, MiddlewareConfig, RouteConfig,
    ServerConfig,
};
