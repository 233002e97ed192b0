//! Per-request execution context passed to the engine.

use std::collections::HashMap;

use hyper::HeaderMap;
use serde::{de::DeserializeOwned, Serialize};

/// Request context.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    /// Request headers, lowercased names.
    pub headers: HashMap<String, String>,
    /// Request-scoped data.
    pub data: HashMap<String, serde_json::Value>,
    incremental_delivery: bool,
}

impl ExecutionContext {
    /// Creates an empty context with incremental delivery disabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context from request headers. Non-UTF-8 values are skipped.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let headers = headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        Self {
            headers,
            ..Self::default()
        }
    }

    /// Allows or forbids incremental results for this request.
    pub fn with_incremental_delivery(mut self, enabled: bool) -> Self {
        self.incremental_delivery = enabled;
        self
    }

    /// Whether the engine may defer or stream parts of the result.
    pub fn incremental_delivery(&self) -> bool {
        self.incremental_delivery
    }

    /// Gets a header value.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Sets a value in the context.
    pub fn set<T: Serialize>(&mut self, key: impl Into<String>, value: T) {
        if let Ok(v) = serde_json::to_value(value) {
            self.data.insert(key.into(), v);
        }
    }

    /// Gets a value from the context.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}
