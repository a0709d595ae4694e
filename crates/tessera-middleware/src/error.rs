//! Pipeline errors.

use tessera_core::TesseraError;
use thiserror::Error;

/// API code for a middleware that did not produce a response.
pub const INVALID_RETURN_CODE: i64 = 5010;

/// API code for a middleware reference that cannot be resolved.
pub const INVALID_MIDDLEWARE_CODE: i64 = 5011;

/// API code for a pipeline run without a passable.
pub const NOTHING_SENT_CODE: i64 = 5012;

/// Errors raised by the pipeline itself.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// [`Pipeline::then`](crate::Pipeline::then) was called before `send`.
    #[error("nothing was sent through the pipeline")]
    NothingSent,
}

impl From<PipelineError> for TesseraError {
    #[track_caller]
    fn from(err: PipelineError) -> Self {
        TesseraError::server(NOTHING_SENT_CODE, err.to_string())
    }
}
