//! `multipart/mixed` framing for incremental delivery.
//!
//! Wire layout, with the default boundary `-`:
//!
//! ```text
//! ---
//! \r\ncontent-type: application/json; charset=utf-8\r\n\r\n{"data":{..},"hasNext":true}\r\n---
//! \r\ncontent-type: application/json; charset=utf-8\r\n\r\n{"incremental":[..],"hasNext":false}\r\n-----
//! ```
//!
//! The line breaks between rows are not on the wire; the body is the exact
//! concatenation of the rows. The body opens with the delimiter `--<boundary>`,
//! every part ends with `\r\n--<boundary>` and the terminal part ends with the
//! close delimiter `\r\n--<boundary>--`.

use std::fmt;

use bytes::{Bytes, BytesMut};

use crate::codec;
use crate::error::{BoundaryError, FrameError, FrameResult};
use crate::Payload;

/// Boundary used when none is configured.
pub const DEFAULT_BOUNDARY: &str = "-";

/// Headers written at the top of every part.
pub const PART_HEADERS: &str = "content-type: application/json; charset=utf-8";

/// Name of the payload field that says whether more parts follow.
pub const HAS_NEXT: &str = "hasNext";

const LINE_BREAK: &[u8] = b"\r\n";
const CLOSE_SUFFIX: &[u8] = b"--";

/// A validated multipart boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryToken {
    token: String,
    delimiter: Bytes,
    close_delimiter: Bytes,
}

impl BoundaryToken {
    /// Validates `token` against the RFC 2046 boundary grammar.
    pub fn new(token: impl Into<String>) -> Result<Self, BoundaryError> {
        let token = token.into();
        let len = token.chars().count();
        if !(1..=70).contains(&len) {
            return Err(BoundaryError::Length(len));
        }
        if let Some(c) = token.chars().find(|c| !is_bchar(*c)) {
            return Err(BoundaryError::Character(c));
        }
        if token.ends_with(' ') {
            return Err(BoundaryError::TrailingSpace);
        }

        let delimiter = Bytes::from(format!("--{token}"));
        let close_delimiter = Bytes::from(format!("--{token}--"));
        Ok(Self {
            token,
            delimiter,
            close_delimiter,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.token
    }

    /// `--<boundary>`
    pub fn delimiter(&self) -> &[u8] {
        &self.delimiter
    }

    /// `--<boundary>--`
    pub fn close_delimiter(&self) -> &[u8] {
        &self.close_delimiter
    }

    /// The `Content-Type` header value announcing this boundary.
    pub fn content_type(&self) -> String {
        format!("multipart/mixed; boundary=\"{}\"", self.token)
    }
}

impl Default for BoundaryToken {
    fn default() -> Self {
        Self {
            token: DEFAULT_BOUNDARY.to_string(),
            delimiter: Bytes::from_static(b"---"),
            close_delimiter: Bytes::from_static(b"-----"),
        }
    }
}

impl fmt::Display for BoundaryToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token)
    }
}

fn is_bchar(c: char) -> bool {
    c.is_ascii_alphanumeric() || "'()+_,-./:=? ".contains(c)
}

/// One framed, ready-to-send piece of the response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    bytes: Bytes,
    terminal: bool,
}

impl Chunk {
    /// Returns true if this chunk ends the multipart body.
    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<Chunk> for Bytes {
    fn from(chunk: Chunk) -> Self {
        chunk.bytes
    }
}

/// Frames payloads into multipart parts.
#[derive(Debug, Clone, Default)]
pub struct Framer {
    boundary: BoundaryToken,
}

impl Framer {
    pub fn new(boundary: BoundaryToken) -> Self {
        Self { boundary }
    }

    pub fn boundary(&self) -> &BoundaryToken {
        &self.boundary
    }

    /// The delimiter that opens the body, sent before the first part.
    pub fn opening(&self) -> Chunk {
        Chunk {
            bytes: self.boundary.delimiter.clone(),
            terminal: false,
        }
    }

    /// Completes the close delimiter after a part that ended with a plain
    /// delimiter. Only needed when the payload sequence ends without a
    /// `hasNext: false` payload.
    pub fn closing(&self) -> Chunk {
        Chunk {
            bytes: Bytes::from_static(CLOSE_SUFFIX),
            terminal: true,
        }
    }

    /// Frames one payload.
    ///
    /// The part ends with the close delimiter when the payload's `hasNext`
    /// is `false`, and with the plain delimiter otherwise.
    pub fn frame(&self, payload: &Payload) -> FrameResult<Chunk> {
        let has_next = has_next(payload)?;
        let body = codec::encode(payload)?;
        let marker = if has_next {
            self.boundary.delimiter()
        } else {
            self.boundary.close_delimiter()
        };

        let mut buf = BytesMut::with_capacity(
            LINE_BREAK.len() * 4 + PART_HEADERS.len() + body.len() + marker.len(),
        );
        buf.extend_from_slice(LINE_BREAK);
        buf.extend_from_slice(PART_HEADERS.as_bytes());
        buf.extend_from_slice(LINE_BREAK);
        buf.extend_from_slice(LINE_BREAK);
        buf.extend_from_slice(&body);
        buf.extend_from_slice(LINE_BREAK);
        buf.extend_from_slice(marker);

        Ok(Chunk {
            bytes: buf.freeze(),
            terminal: !has_next,
        })
    }
}

/// Reads the `hasNext` flag of a payload.
///
/// A missing or non-boolean flag is an error; it is never defaulted.
pub fn has_next(payload: &Payload) -> FrameResult<bool> {
    match payload.get(HAS_NEXT) {
        Some(serde_json::Value::Bool(value)) => Ok(*value),
        Some(other) => Err(FrameError::InvalidTerminalFlag(other.to_string())),
        None => Err(FrameError::MissingTerminalFlag),
    }
}
