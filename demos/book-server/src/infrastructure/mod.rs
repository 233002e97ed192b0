//! Infrastructure layer - Data access.

pub mod repositories;

pub use repositories::*;
