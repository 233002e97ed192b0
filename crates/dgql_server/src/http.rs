//! HTTP layer.
//!
//! Handles:
//! - POST /graphql - GraphQL queries and mutations
//! - OPTIONS /graphql - CORS preflight

use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dgql_runtime::{codec, parse_accept, MediaType};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::{Body, Incoming};
use hyper::header::{
    HeaderValue, ACCEPT, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE, ALLOW, CONTENT_TYPE,
};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{HeaderMap, Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info};

use crate::config::ServerConfig;
use crate::context::ExecutionContext;
use crate::dispatch::{full, Dispatcher, ResponseBody};
use crate::engine::{GraphQlEngine, GraphQlRequest};
use crate::error::{ErrorCode, ServerError, ServerResult};

#[derive(Debug, Serialize)]
struct ErrorDocument<'a> {
    errors: [&'a ServerError; 1],
}

/// Pause after a failed accept.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        ErrorCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        code if code.is_client_error() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: &ServerError) -> Response<ResponseBody> {
    let body = codec::encode(&ErrorDocument { errors: [error] })
        .unwrap_or_else(|_| r#"{"errors":[{"message":"Internal server error"}]}"#.into());
    let mut response = Response::new(full(body));
    *response.status_mut() = status_for(error.code);
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Serves the GraphQL endpoint for one engine.
pub struct GraphQlService {
    config: ServerConfig,
    engine: Arc<dyn GraphQlEngine>,
    dispatcher: Dispatcher,
    max_age: HeaderValue,
}

impl fmt::Debug for GraphQlService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphQlService")
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

impl GraphQlService {
    pub fn new(config: ServerConfig, engine: Arc<dyn GraphQlEngine>) -> ServerResult<Self> {
        let dispatcher = Dispatcher::new(&config)?;
        let max_age = HeaderValue::from(config.cors_max_age_secs);
        Ok(Self {
            config,
            engine,
            dispatcher,
            max_age,
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Routes one request. Every response allows any origin.
    pub async fn handle<B>(&self, req: Request<B>) -> Response<ResponseBody>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let (parts, body) = req.into_parts();

        let mut response = if parts.uri.path() == self.config.path {
            match parts.method {
                Method::POST => self.execute(&parts.headers, body).await,
                Method::OPTIONS => self.preflight(),
                _ => {
                    let mut response = error_response(&ServerError::new(
                        ErrorCode::MethodNotAllowed,
                        format!("Method {} not allowed", parts.method),
                    ));
                    response
                        .headers_mut()
                        .insert(ALLOW, HeaderValue::from_static("POST, OPTIONS"));
                    response
                }
            }
        } else {
            error_response(&ServerError::new(
                ErrorCode::NotFound,
                format!("No route for {}", parts.uri.path()),
            ))
        };

        response
            .headers_mut()
            .insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        response
    }

    async fn execute<B>(&self, headers: &HeaderMap, body: B) -> Response<ResponseBody>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let limit = self.config.max_body_bytes;
        let body_bytes = match Limited::new(body, limit).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
                debug!(limit, "Rejected oversized request body");
                return error_response(&ServerError::new(
                    ErrorCode::PayloadTooLarge,
                    format!("Request body exceeds {limit} bytes"),
                ));
            }
            Err(e) => {
                return error_response(&ServerError::invalid_request(format!(
                    "Failed to read body: {e}"
                )));
            }
        };

        let request: GraphQlRequest = match serde_json::from_slice(&body_bytes) {
            Ok(req) => req,
            Err(e) => {
                return error_response(&ServerError::invalid_request(format!(
                    "Invalid JSON: {e}"
                )));
            }
        };

        debug!(
            operation = request.operation_name.as_deref().unwrap_or("<anonymous>"),
            "Executing query: {}",
            request.query.chars().take(100).collect::<String>()
        );

        let accepted: Vec<MediaType> = headers
            .get_all(ACCEPT)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(parse_accept)
            .collect();

        let ctx = ExecutionContext::from_headers(headers)
            .with_incremental_delivery(self.config.incremental_delivery);
        let outcome = self.engine.execute(request, ctx).await;

        self.dispatcher.dispatch(outcome, &accepted)
    }

    fn preflight(&self) -> Response<ResponseBody> {
        let mut response = Response::new(full(""));
        *response.status_mut() = StatusCode::NO_CONTENT;
        let headers = response.headers_mut();
        headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("*"));
        headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*"));
        headers.insert(ACCESS_CONTROL_MAX_AGE, self.max_age.clone());
        response
    }
}

/// Source of incoming connections.
#[async_trait]
pub(crate) trait Acceptor: Send {
    type Io: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    async fn accept(&mut self) -> io::Result<(Self::Io, SocketAddr)>;
}

#[async_trait]
impl Acceptor for TcpListener {
    type Io = TcpStream;

    async fn accept(&mut self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }
}

/// Accepts connections until `shutdown` resolves. Each connection runs on its
/// own task. A failed accept is logged and retried after a short pause.
pub(crate) async fn run_server<A, F>(mut listener: A, service: Arc<GraphQlService>, shutdown: F)
where
    A: Acceptor,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        let accepted = tokio::select! {
            accepted = listener.accept() => accepted,
            () = &mut shutdown => {
                info!("Shutting down");
                return;
            }
        };

        let (stream, remote) = match accepted {
            Ok(accepted) => accepted,
            Err(e) => {
                let err = ServerError::new(ErrorCode::Accept, format!("Failed to accept: {e}"));
                error!("{}", err);
                tokio::select! {
                    () = tokio::time::sleep(ACCEPT_BACKOFF) => continue,
                    () = &mut shutdown => {
                        info!("Shutting down");
                        return;
                    }
                }
            }
        };

        let io = TokioIo::new(stream);
        let service = Arc::clone(&service);

        tokio::spawn(async move {
            let handler = service_fn(move |req: Request<Incoming>| {
                let service = Arc::clone(&service);
                async move { Ok::<_, Infallible>(service.handle(req).await) }
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, handler).await {
                if err.is_incomplete_message() || err.is_closed() || err.is_canceled() {
                    debug!(%remote, "Connection closed early: {}", err);
                } else {
                    error!(%remote, "Connection error: {:?}", err);
                }
            }
        });
    }
}
