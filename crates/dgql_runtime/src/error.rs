//! Error types for payload encoding and multipart framing.

use thiserror::Error;

/// A payload could not be serialized to (or parsed from) JSON.
#[derive(Debug, Error)]
#[error("failed to encode payload as JSON: {0}")]
pub struct EncodeError(#[from] pub serde_json::Error);

/// Failure while framing a payload into a multipart part.
///
/// Any of these aborts the in-flight response stream: the transport closes
/// the connection after flushing what was already written, and no
/// termination marker is sent.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The payload could not be serialized.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// The payload has no `hasNext` field.
    #[error(
        "'hasNext' field is missing in incremental payload; the executing engine broke the incremental delivery contract"
    )]
    MissingTerminalFlag,

    /// The payload has a `hasNext` field that is not a boolean.
    #[error("'hasNext' field must be a boolean, found {0}")]
    InvalidTerminalFlag(String),
}

/// A multipart boundary token that cannot be used on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoundaryError {
    #[error("boundary must be between 1 and 70 characters, got {0}")]
    Length(usize),

    #[error("boundary contains character {0:?} which is not allowed in a multipart boundary")]
    Character(char),

    #[error("boundary must not end with a space")]
    TrailingSpace,
}

/// Result type for framing operations.
pub type FrameResult<T> = Result<T, FrameError>;
