//! URL resolution for Tessera.
//!
//! Turning a request path into something executable happens in three steps:
//!
//! 1. [`PathInfo`] normalizes the path: the configured separator becomes the
//!    canonical `|` delimiter and the URL suffix is checked and stripped.
//! 2. A [`BindTable`] may claim the path through rules such as
//!    `user/:id => @User/show?id=:id`.
//! 3. Otherwise [`parse_url`] reads the default
//!    `controller|action|key|value|...` layout.
//!
//! [`resolve`] runs steps 2 and 3 and returns a [`Resolution`].
//!
//! # Example
//!
//! ```rust
//! use tessera_router::{resolve, PathInfo, RouteTarget, SuffixPolicy};
//!
//! let path = PathInfo::parse("/blog/read/id/5.html", "/", &SuffixPolicy::default()).unwrap();
//! let resolution = resolve(&path, None).unwrap();
//!
//! assert_eq!(
//!     resolution.target,
//!     RouteTarget::Controller {
//!         controller: Some("blog".into()),
//!         action: Some("read".into()),
//!     }
//! );
//! assert_eq!(resolution.vars.get("id"), Some("5"));
//! ```
//!
//! The crate also carries [`MethodRule`] for allowed-method declarations and
//! the [`text`] helpers used for name conversion.

#![doc(html_root_url = "https://docs.rs/tessera-router/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod bind;
mod error;
mod method_rule;
mod params;
mod parse;
mod path;
mod target;
pub mod text;

pub use bind::{BindMatch, BindRule, BindTable, BindTarget};
pub use error::RouteError;
pub use method_rule::MethodRule;
pub use params::Vars;
pub use parse::{parse_url, parse_url_vars, UrlTarget};
pub use path::{PathInfo, SuffixPolicy, DELIMITER};
pub use target::{resolve, Resolution, RouteTarget};
