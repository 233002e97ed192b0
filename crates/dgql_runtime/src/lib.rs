//! Incremental delivery runtime for GraphQL over HTTP.
//!
//! This crate turns GraphQL execution results into HTTP-ready bytes:
//! - `payload`: typed `@defer`/`@stream` payloads
//! - `outcome`: execution outcomes and the follow-up payload channel
//! - `codec`: JSON payload codec
//! - `multipart`: `multipart/mixed` part framing
//! - `assembler`: ordered, lazy chunk stream for incremental results
//! - `media`: response media type negotiation
//!
//! It has no HTTP server dependency; see `dgql_server` for that.

pub mod assembler;
pub mod codec;
pub mod error;
pub mod media;
pub mod multipart;
pub mod outcome;
pub mod payload;

/// A GraphQL response object (`data`, `errors`, `hasNext`, `incremental`, ...).
pub type Payload = serde_json::Map<String, serde_json::Value>;

pub use assembler::{Assembler, ChunkStream};
pub use error::{BoundaryError, EncodeError, FrameError, FrameResult};
pub use media::{negotiate, parse_accept, MediaType, SUPPORTED_MEDIA_TYPES};
pub use multipart::{BoundaryToken, Chunk, Framer};
pub use outcome::{
    partial_result_channel, ExecutionOutcome, IncrementalResult, PartialResultSender,
    PartialResults, SendError,
};
pub use payload::{
    DeferPayload, DeferPayloadBuilder, IncrementalItem, InitialPayload, PathSegment,
    StreamPayload, StreamPayloadBuilder, SubsequentPayload,
};
