//! End-to-end scenarios against the book catalogue.

use std::sync::Arc;

use book_server::{BookEngine, Latency};
use bytes::Bytes;
use dgql_server::{GraphQlService, ResponseBody, ServerConfig};
use http_body_util::{BodyExt, Full};
use hyper::header::{ACCEPT, CONTENT_TYPE};
use hyper::{Method, Request, Response, StatusCode};
use serde_json::{json, Value};

const PART_HEADER: &str = "\r\ncontent-type: application/json; charset=utf-8\r\n\r\n";

fn service(config: ServerConfig) -> GraphQlService {
    let engine = BookEngine::with_seed_data()
        .unwrap()
        .latency(Latency::none());
    GraphQlService::new(config, Arc::new(engine)).unwrap()
}

fn request(body: Value) -> Request<Full<Bytes>> {
    Request::builder()
        .method(Method::POST)
        .uri("/graphql")
        .header(CONTENT_TYPE, "application/json")
        .header(ACCEPT, "multipart/mixed, application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

async fn body_string(response: Response<ResponseBody>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Splits a complete multipart body into its JSON parts.
fn parts(body: &str) -> Vec<Value> {
    let inner = body
        .strip_prefix("---")
        .and_then(|b| b.strip_suffix("\r\n-----"))
        .unwrap_or_else(|| panic!("not a closed multipart body: {body:?}"));
    inner
        .split("\r\n---")
        .map(|part| {
            let json = part
                .strip_prefix(PART_HEADER)
                .unwrap_or_else(|| panic!("part without headers: {part:?}"));
            serde_json::from_str(json).unwrap()
        })
        .collect()
}

#[tokio::test]
async fn test_simple_book_query() {
    let response = service(ServerConfig::new())
        .handle(request(json!({
            "query": r#"query { bookById(id: "book-1") { id name pageCount author { firstName lastName } } }"#
        })))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(
        body,
        json!({
            "data": {
                "bookById": {
                    "id": "book-1",
                    "name": "Effective Java",
                    "pageCount": 416,
                    "author": {"firstName": "Joshua", "lastName": "Bloch"}
                }
            }
        })
    );
}

#[tokio::test]
async fn test_deferred_author() {
    let response = service(ServerConfig::new())
        .handle(request(json!({
            "query": "query BookDetails($id: ID) { bookById(id: $id) { id name ... @defer { author { firstName lastName } } } }",
            "variables": {"id": "book-2"},
            "operationName": "BookDetails"
        })))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[CONTENT_TYPE],
        "multipart/mixed; boundary=\"-\""
    );

    let parts = parts(&body_string(response).await);
    assert_eq!(
        parts,
        vec![
            json!({
                "data": {"bookById": {"id": "book-2", "name": "Hitchhiker's Guide to the Galaxy"}},
                "hasNext": true
            }),
            json!({
                "incremental": [{
                    "path": ["bookById", "author"],
                    "data": {"firstName": "Douglas", "lastName": "Adams"}
                }],
                "hasNext": false
            }),
        ]
    );
}

#[tokio::test]
async fn test_deferred_author_without_incremental_delivery() {
    let response = service(ServerConfig::new().no_incremental_delivery())
        .handle(request(json!({
            "query": r#"{ bookById(id: "book-2") { name ... @defer { author { lastName } } } }"#
        })))
        .await;

    assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(
        body,
        json!({
            "data": {
                "bookById": {
                    "name": "Hitchhiker's Guide to the Galaxy",
                    "author": {"lastName": "Adams"}
                }
            }
        })
    );
}

#[tokio::test]
async fn test_unknown_query_returns_errors() {
    let response = service(ServerConfig::new())
        .handle(request(json!({ "query": "{ books { name } }" })))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert!(body.get("data").is_none());
    assert_eq!(body["errors"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_graphql_response_media_type() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/graphql")
        .header(ACCEPT, "application/graphql-response+json")
        .body(Full::new(Bytes::from(
            json!({"query": r#"{ bookById(id: "book-3") { name } }"#}).to_string(),
        )))
        .unwrap();

    let response = service(ServerConfig::new()).handle(request).await;

    assert_eq!(
        response.headers()[CONTENT_TYPE],
        "application/graphql-response+json"
    );
    assert_eq!(
        body_string(response).await,
        r#"{"data":{"bookById":{"name":"Down Under"}}}"#
    );
}
