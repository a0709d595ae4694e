//! Routing errors.

use thiserror::Error;

/// Error raised while turning a path into a dispatch target.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// The controller segment is not a valid controller name.
    #[error("controller not exists:{0}")]
    InvalidController(String),

    /// The URL suffix is not in the allowed list.
    #[error("url suffix not allowed:{0}")]
    SuffixNotAllowed(String),

    /// The first segment names a bind rule but no rule of that key matched.
    #[error("route not found:{0}")]
    BindMismatch(String),

    /// A bind target does not start with `\`, `@` or `:`.
    #[error("invalid bind target `{target}` for rule `{rule}`")]
    InvalidBind {
        /// The rule key.
        rule: String,
        /// The offending target.
        target: String,
    },

    /// A method rule names an unknown HTTP verb.
    #[error("invalid method rule: {0}")]
    InvalidMethod(String),
}

impl RouteError {
    /// Returns `true` for errors that mean "nothing lives at this URL".
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::InvalidController(_) | Self::SuffixNotAllowed(_) | Self::BindMismatch(_)
        )
    }
}
