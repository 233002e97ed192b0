//! GraphQL server with incremental delivery.
//!
//! Owns the listener and hands every request to a [`GraphQlService`]. The
//! engine decides what to execute; the server decides how results are sent.

use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::engine::GraphQlEngine;
use crate::error::{ErrorCode, ServerError, ServerResult};
use crate::http::{run_server, GraphQlService};

/// Server builder.
#[derive(Default)]
pub struct ServerBuilder {
    config: ServerConfig,
    engine: Option<Arc<dyn GraphQlEngine>>,
}

impl ServerBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the engine that executes operations.
    pub fn engine<E: GraphQlEngine + 'static>(mut self, engine: E) -> Self {
        self.engine = Some(Arc::new(engine));
        self
    }

    /// Sets a shared engine.
    pub fn shared_engine(mut self, engine: Arc<dyn GraphQlEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Builds the server.
    pub fn build(self) -> ServerResult<GraphQlServer> {
        let engine = self
            .engine
            .ok_or_else(|| ServerError::config("An engine is required"))?;
        let service = GraphQlService::new(self.config, engine)?;

        Ok(GraphQlServer {
            service: Arc::new(service),
        })
    }
}

/// The GraphQL server.
#[derive(Debug, Clone)]
pub struct GraphQlServer {
    service: Arc<GraphQlService>,
}

impl GraphQlServer {
    /// Creates a new server builder.
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &ServerConfig {
        self.service.config()
    }

    /// Returns the request handler.
    pub fn service(&self) -> Arc<GraphQlService> {
        Arc::clone(&self.service)
    }

    /// Binds the configured address.
    pub async fn bind(&self) -> ServerResult<TcpListener> {
        let addr = self.config().socket_addr()?;
        TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::new(ErrorCode::Bind, format!("Failed to bind {addr}: {e}")))
    }

    /// Starts the server and blocks until Ctrl-C.
    pub async fn listen(self) -> ServerResult<()> {
        self.listen_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Starts the server and runs until `shutdown` resolves.
    pub async fn listen_with_shutdown<F>(self, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()>,
    {
        let listener = self.bind().await?;
        self.serve(listener, shutdown).await
    }

    /// Serves on an already bound listener until `shutdown` resolves.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()>,
    {
        if let Ok(addr) = listener.local_addr() {
            info!(
                "GraphQL server running at http://{}{}",
                addr,
                self.config().path
            );
        }

        run_server(listener, self.service, shutdown).await;
        Ok(())
    }
}
