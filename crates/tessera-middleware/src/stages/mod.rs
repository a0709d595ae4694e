//! Built-in middleware.
//!
//! | Name         | Middleware              | Purpose                              |
//! |--------------|-------------------------|--------------------------------------|
//! | `request_id` | [`RequestIdMiddleware`] | assign or propagate a UUID v7 ID     |
//! | `access_log` | [`AccessLogMiddleware`] | one structured log event per request |
//!
//! Both are bound in the application container under the names above.

pub mod access_log;
pub mod request_id;

pub use access_log::AccessLogMiddleware;
pub use request_id::{RequestIdMiddleware, REQUEST_ID_HEADER};
