//! Server configuration.

use std::net::SocketAddr;

use crate::error::{ErrorCode, ServerError, ServerResult};

/// Default request body limit (1 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Path of the GraphQL endpoint.
    pub path: String,
    /// Multipart boundary for incremental responses.
    pub boundary: String,
    /// Ask the engine for incremental delivery on every request.
    pub incremental_delivery: bool,
    /// Send `transfer-encoding`, `connection` and `keep-alive` headers with
    /// incremental responses. These are HTTP/1.1 only.
    pub connection_headers: bool,
    /// Value of the `keep-alive: timeout=` hint.
    pub keep_alive_secs: u64,
    /// `access-control-max-age` for CORS preflight responses.
    pub cors_max_age_secs: u64,
    /// Largest request body accepted, in bytes.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerConfig {
    /// Creates a new config with default values.
    pub fn new() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4000,
            path: "/graphql".to_string(),
            boundary: dgql_runtime::multipart::DEFAULT_BOUNDARY.to_string(),
            incremental_delivery: true,
            connection_headers: true,
            keep_alive_secs: 5,
            cors_max_age_secs: 3600,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Sets the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the endpoint path.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Sets the multipart boundary.
    pub fn boundary(mut self, boundary: impl Into<String>) -> Self {
        self.boundary = boundary.into();
        self
    }

    /// Disables incremental delivery; every result is sent as one JSON body.
    pub fn no_incremental_delivery(mut self) -> Self {
        self.incremental_delivery = false;
        self
    }

    /// Omits connection-specific headers from incremental responses.
    pub fn no_connection_headers(mut self) -> Self {
        self.connection_headers = false;
        self
    }

    /// Sets the keep-alive hint.
    pub fn keep_alive_secs(mut self, secs: u64) -> Self {
        self.keep_alive_secs = secs;
        self
    }

    /// Sets the CORS preflight cache duration.
    pub fn cors_max_age_secs(mut self, secs: u64) -> Self {
        self.cors_max_age_secs = secs;
        self
    }

    /// Sets the request body limit.
    pub fn max_body_bytes(mut self, bytes: usize) -> Self {
        self.max_body_bytes = bytes;
        self
    }

    /// Resolves the listen address.
    pub fn socket_addr(&self) -> ServerResult<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ServerError::new(ErrorCode::InvalidAddress, format!("Invalid address: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config() {
        let config = ServerConfig::new()
            .port(8080)
            .host("0.0.0.0")
            .no_connection_headers();

        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.path, "/graphql");
        assert!(!config.connection_headers);
        assert!(config.incremental_delivery);
        assert_eq!(config.keep_alive_secs, 5);
        assert_eq!(config.cors_max_age_secs, 3600);
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
        assert_eq!(ServerConfig::new().max_body_bytes(64).max_body_bytes, 64);
    }

    #[test]
    fn test_socket_addr() {
        let addr = ServerConfig::new().port(9000).socket_addr().unwrap();
        assert_eq!(addr.port(), 9000);

        let err = ServerConfig::new().host("not a host").socket_addr().unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidAddress);
    }
}
