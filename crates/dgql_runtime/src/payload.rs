//! Incremental delivery payloads (`@defer` / `@stream`).
//!
//! Engines build these typed payloads and turn them into [`Payload`] objects
//! with [`InitialPayload::into_payload`] / [`SubsequentPayload::into_payload`].
//! The framer itself only ever sees the JSON object form.

use serde::ser::Error as _;
use serde::{Deserialize, Serialize};

use crate::error::EncodeError;
use crate::Payload;

/// A response path segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

impl From<String> for PathSegment {
    fn from(s: String) -> Self {
        Self::Field(s)
    }
}

impl From<&str> for PathSegment {
    fn from(s: &str) -> Self {
        Self::Field(s.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(i: usize) -> Self {
        Self::Index(i)
    }
}

/// The first payload of an incremental response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<serde_json::Value>,
    pub has_next: bool,
}

impl InitialPayload {
    /// Creates an initial payload carrying `data`, with more payloads pending.
    pub fn new(data: serde_json::Value) -> Self {
        Self {
            data: Some(data),
            has_next: true,
            ..Self::default()
        }
    }

    /// Marks this as the only payload.
    pub fn complete(mut self) -> Self {
        self.has_next = false;
        self
    }

    /// Adds an error.
    pub fn with_error(mut self, error: serde_json::Value) -> Self {
        self.errors.get_or_insert_with(Vec::new).push(error);
        self
    }

    /// Converts to the JSON object sent on the wire.
    pub fn into_payload(self) -> Result<Payload, EncodeError> {
        to_payload(&self)
    }
}

/// A deferred fragment result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeferPayload {
    /// Path to where this data should be merged.
    pub path: Vec<PathSegment>,
    /// The deferred data.
    pub data: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<serde_json::Value>>,
}

/// A batch of streamed list items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamPayload {
    /// Path to the list these items are appended to.
    pub path: Vec<PathSegment>,
    pub items: Vec<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<serde_json::Value>>,
}

/// One entry of a subsequent payload's `incremental` list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IncrementalItem {
    Defer(DeferPayload),
    Stream(StreamPayload),
}

impl From<DeferPayload> for IncrementalItem {
    fn from(payload: DeferPayload) -> Self {
        Self::Defer(payload)
    }
}

impl From<StreamPayload> for IncrementalItem {
    fn from(payload: StreamPayload) -> Self {
        Self::Stream(payload)
    }
}

/// A follow-up payload of an incremental response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubsequentPayload {
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub incremental: Vec<IncrementalItem>,
    pub has_next: bool,
}

impl SubsequentPayload {
    /// Creates an empty subsequent payload.
    pub fn new(has_next: bool) -> Self {
        Self {
            incremental: Vec::new(),
            has_next,
        }
    }

    /// Appends an incremental item.
    pub fn with_item(mut self, item: impl Into<IncrementalItem>) -> Self {
        self.incremental.push(item.into());
        self
    }

    /// Converts to the JSON object sent on the wire.
    pub fn into_payload(self) -> Result<Payload, EncodeError> {
        to_payload(&self)
    }
}

fn to_payload<T: Serialize>(value: &T) -> Result<Payload, EncodeError> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(map) => Ok(map),
        _ => Err(serde_json::Error::custom("payload must serialize to a JSON object").into()),
    }
}

/// Builder for defer payloads.
#[derive(Debug, Clone, Default)]
pub struct DeferPayloadBuilder {
    path: Vec<PathSegment>,
    data: serde_json::Value,
    label: Option<String>,
    errors: Option<Vec<serde_json::Value>>,
}

impl DeferPayloadBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the full path.
    pub fn path(mut self, path: Vec<PathSegment>) -> Self {
        self.path = path;
        self
    }

    /// Adds a field path segment.
    pub fn at_field(mut self, field: impl Into<String>) -> Self {
        self.path.push(PathSegment::Field(field.into()));
        self
    }

    /// Adds an index path segment.
    pub fn at_index(mut self, index: usize) -> Self {
        self.path.push(PathSegment::Index(index));
        self
    }

    pub fn data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_error(mut self, error: serde_json::Value) -> Self {
        self.errors.get_or_insert_with(Vec::new).push(error);
        self
    }

    pub fn build(self) -> DeferPayload {
        DeferPayload {
            path: self.path,
            data: self.data,
            label: self.label,
            errors: self.errors,
        }
    }
}

/// Builder for stream payloads.
#[derive(Debug, Clone, Default)]
pub struct StreamPayloadBuilder {
    path: Vec<PathSegment>,
    items: Vec<serde_json::Value>,
    label: Option<String>,
    errors: Option<Vec<serde_json::Value>>,
}

impl StreamPayloadBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(mut self, path: Vec<PathSegment>) -> Self {
        self.path = path;
        self
    }

    pub fn at_field(mut self, field: impl Into<String>) -> Self {
        self.path.push(PathSegment::Field(field.into()));
        self
    }

    /// Adds an index path segment; for streams this is the index of the
    /// first item in the batch.
    pub fn at_index(mut self, index: usize) -> Self {
        self.path.push(PathSegment::Index(index));
        self
    }

    pub fn add_item(mut self, item: serde_json::Value) -> Self {
        self.items.push(item);
        self
    }

    pub fn items(mut self, items: Vec<serde_json::Value>) -> Self {
        self.items = items;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_error(mut self, error: serde_json::Value) -> Self {
        self.errors.get_or_insert_with(Vec::new).push(error);
        self
    }

    pub fn build(self) -> StreamPayload {
        StreamPayload {
            path: self.path,
            items: self.items,
            label: self.label,
            errors: self.errors,
        }
    }
}
