//! GraphQL over HTTP server with incremental delivery.
//!
//! Executes operations through a pluggable [`GraphQlEngine`] and sends the
//! outcome either as one JSON body or, for `@defer`/`@stream` results, as a
//! `multipart/mixed` stream.
//!
//! # Example
//!
//! ```rust,ignore
//! use dgql_server::{GraphQlServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> dgql_server::ServerResult<()> {
//!     GraphQlServer::builder()
//!         .config(ServerConfig::new().port(4000))
//!         .engine(MyEngine::new())
//!         .build()?
//!         .listen()
//!         .await
//! }
//! ```

pub mod config;
pub mod context;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod http;
pub mod server;

pub use config::ServerConfig;
pub use context::ExecutionContext;
pub use dispatch::{Dispatcher, ResponseBody};
pub use engine::{GraphQlEngine, GraphQlRequest};
pub use error::{ErrorCode, ServerError, ServerResult};
pub use http::GraphQlService;
pub use server::{GraphQlServer, ServerBuilder};

// Re-export the runtime for engine implementors.
pub use dgql_runtime as runtime;
