//! Book catalogue served over GraphQL with incremental delivery.
//!
//! `bookById` resolves after a short delay and its `author` can be deferred,
//! which makes the response arrive in two `multipart/mixed` parts.

pub mod domain;
pub mod engine;
pub mod infrastructure;
pub mod query;

pub use engine::{BookEngine, Latency};
