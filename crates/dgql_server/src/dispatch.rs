//! Turns execution outcomes into HTTP responses.

use bytes::Bytes;
use dgql_runtime::{
    codec, negotiate, Assembler, BoundaryToken, ExecutionOutcome, FrameError, Framer,
    IncrementalResult, MediaType, SUPPORTED_MEDIA_TYPES,
};
use futures::TryStreamExt;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::Frame;
use hyper::header::{HeaderName, HeaderValue, CONNECTION, CONTENT_TYPE, TRANSFER_ENCODING};
use hyper::{Response, StatusCode};
use serde::Serialize;
use tracing::{debug, error};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};

/// Response body: one buffer, or a stream of multipart chunks.
pub type ResponseBody = http_body_util::combinators::UnsyncBoxBody<Bytes, FrameError>;

/// Sent when a simple result cannot be serialized.
const ENCODE_FAILURE_BODY: &str = r#"{"errors":[{"message":"Internal server error"}]}"#;

pub(crate) fn full<T: Into<Bytes>>(chunk: T) -> ResponseBody {
    Full::new(chunk.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Chooses between a single JSON body and a multipart stream.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    assembler: Assembler,
    supported: Vec<MediaType>,
    multipart_content_type: HeaderValue,
    keep_alive: Option<HeaderValue>,
}

impl Dispatcher {
    /// Creates a dispatcher for the given configuration.
    pub fn new(config: &ServerConfig) -> ServerResult<Self> {
        let boundary = BoundaryToken::new(config.boundary.as_str())
            .map_err(|e| ServerError::config(format!("Invalid multipart boundary: {e}")))?;
        let multipart_content_type = HeaderValue::from_str(&boundary.content_type())
            .map_err(|e| ServerError::config(format!("Invalid multipart content type: {e}")))?;
        let keep_alive = if config.connection_headers {
            let value = HeaderValue::from_str(&format!("timeout={}", config.keep_alive_secs))
                .map_err(|e| ServerError::config(format!("Invalid keep-alive value: {e}")))?;
            Some(value)
        } else {
            None
        };

        Ok(Self {
            assembler: Assembler::new(Framer::new(boundary)),
            supported: SUPPORTED_MEDIA_TYPES.to_vec(),
            multipart_content_type,
            keep_alive,
        })
    }

    /// Media types a simple result may be sent as.
    pub fn supported(&self) -> &[MediaType] {
        &self.supported
    }

    /// Builds the response for an outcome.
    ///
    /// `accepted` is the client's `Accept` list in header order; it only
    /// matters for simple results.
    pub fn dispatch(&self, outcome: ExecutionOutcome, accepted: &[MediaType]) -> Response<ResponseBody> {
        debug!(
            incremental = outcome.is_incremental(),
            "Execution complete"
        );

        match outcome {
            ExecutionOutcome::Simple(result) => self.simple(&result, accepted),
            ExecutionOutcome::Incremental(result) => self.incremental(result),
        }
    }

    /// Sends `result` as one JSON body with a negotiated content type.
    ///
    /// If `result` cannot be serialized the response is a 500 with a fixed
    /// error document.
    pub fn simple<T: Serialize + ?Sized>(&self, result: &T, accepted: &[MediaType]) -> Response<ResponseBody> {
        let media_type = negotiate(accepted, &self.supported);

        match codec::encode(result) {
            Ok(body) => {
                let mut response = Response::new(full(body));
                let content_type = HeaderValue::from_str(media_type.as_str())
                    .unwrap_or(HeaderValue::from_static("application/json"));
                response.headers_mut().insert(CONTENT_TYPE, content_type);
                response
            }
            Err(e) => {
                error!("Failed to encode GraphQL result: {}", e);
                let mut response = Response::new(full(ENCODE_FAILURE_BODY));
                *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                response
                    .headers_mut()
                    .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                response
            }
        }
    }

    /// Streams an incremental result as `multipart/mixed`.
    ///
    /// A framing error mid-stream becomes a body error, which makes the
    /// connection close after the bytes already written.
    pub fn incremental(&self, result: IncrementalResult) -> Response<ResponseBody> {
        let chunks = self
            .assembler
            .assemble(result.initial, result.follow_ups)
            .map_ok(|chunk| Frame::data(chunk.into_bytes()));

        let mut response = Response::new(StreamBody::new(chunks).boxed_unsync());
        let headers = response.headers_mut();
        headers.insert(CONTENT_TYPE, self.multipart_content_type.clone());
        if let Some(keep_alive) = &self.keep_alive {
            headers.insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
            headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
            headers.insert(HeaderName::from_static("keep-alive"), keep_alive.clone());
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dgql_runtime::{parse_accept, Payload};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(&ServerConfig::new()).unwrap()
    }

    fn payload(value: serde_json::Value) -> Payload {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    async fn body_string(response: Response<ResponseBody>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_simple_result() {
        let result = payload(json!({"data": {"bookById": {"id": "book-1"}}}));
        let response = dispatcher().dispatch(
            ExecutionOutcome::Simple(result),
            &parse_accept("application/graphql-response+json"),
        );

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[CONTENT_TYPE],
            "application/graphql-response+json"
        );
        assert_eq!(
            body_string(response).await,
            r#"{"data":{"bookById":{"id":"book-1"}}}"#
        );
    }

    #[tokio::test]
    async fn test_simple_result_encode_failure() {
        let mut unserializable = BTreeMap::new();
        unserializable.insert((1, 2), "pair");

        let response = dispatcher().simple(&unserializable, &[]);

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_string(response).await, ENCODE_FAILURE_BODY);
    }

    #[tokio::test]
    async fn test_incremental_headers() {
        let result = IncrementalResult::from_payloads(
            payload(json!({"data": {}, "hasNext": true})),
            vec![payload(json!({"incremental": [], "hasNext": false}))],
        );
        let response = dispatcher().dispatch(ExecutionOutcome::Incremental(result), &[]);

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[CONTENT_TYPE], "multipart/mixed; boundary=\"-\"");
        assert_eq!(headers[TRANSFER_ENCODING], "chunked");
        assert_eq!(headers[CONNECTION], "keep-alive");
        assert_eq!(headers["keep-alive"], "timeout=5");
        assert!(body_string(response).await.ends_with("\r\n-----"));
    }

    #[tokio::test]
    async fn test_incremental_without_connection_headers() {
        let dispatcher = Dispatcher::new(&ServerConfig::new().no_connection_headers()).unwrap();
        let result = IncrementalResult::from_payloads(payload(json!({"hasNext": false})), Vec::new());
        let response = dispatcher.incremental(result);

        assert!(response.headers().get(TRANSFER_ENCODING).is_none());
        assert!(response.headers().get("keep-alive").is_none());
        assert!(response.headers().get(CONTENT_TYPE).is_some());
    }

    #[tokio::test]
    async fn test_incremental_frame_error_fails_body() {
        let result = IncrementalResult::from_payloads(payload(json!({"data": {}})), Vec::new());
        let response = dispatcher().incremental(result);

        assert!(response.into_body().collect().await.is_err());
    }

    #[test]
    fn test_invalid_boundary_config() {
        let err = Dispatcher::new(&ServerConfig::new().boundary("")).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidConfig);
    }
}
