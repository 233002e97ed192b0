//! Integration tests for incremental response assembly.

use std::time::Duration;

use dgql_runtime::{
    multipart::PART_HEADERS, partial_result_channel, Assembler, Chunk, DeferPayloadBuilder,
    FrameError, InitialPayload, Payload, SubsequentPayload,
};
use futures::StreamExt;
use serde_json::json;

fn initial(book: &str) -> Payload {
    InitialPayload::new(json!({"bookById": {"id": book}}))
        .into_payload()
        .unwrap()
}

fn follow_up(index: usize, has_next: bool) -> Payload {
    SubsequentPayload::new(has_next)
        .with_item(
            DeferPayloadBuilder::new()
                .at_field("bookById")
                .data(json!({"index": index}))
                .build(),
        )
        .into_payload()
        .unwrap()
}

fn follow_ups(n: usize) -> Vec<Payload> {
    (0..n).map(|i| follow_up(i, i + 1 < n)).collect()
}

async fn assemble(initial: Payload, follow_ups: Vec<Payload>) -> Vec<Chunk> {
    Assembler::default()
        .assemble(initial, Box::pin(futures::stream::iter(follow_ups)))
        .map(|chunk| chunk.expect("framing should succeed"))
        .collect()
        .await
}

fn concat(chunks: &[Chunk]) -> String {
    let bytes: Vec<u8> = chunks.iter().flat_map(|c| c.as_bytes().to_vec()).collect();
    String::from_utf8(bytes).unwrap()
}

/// Splits a complete multipart body into its JSON parts.
fn parse_parts(body: &str) -> Vec<serde_json::Value> {
    let inner = body
        .strip_prefix("---")
        .and_then(|b| b.strip_suffix("--"))
        .expect("body must open with the delimiter and end with the close delimiter");
    let part_prefix = format!("\r\n{PART_HEADERS}\r\n\r\n");

    inner
        .split("\r\n---")
        .filter(|part| !part.is_empty())
        .map(|part| {
            let json = part
                .strip_prefix(part_prefix.as_str())
                .expect("part must start with its headers");
            serde_json::from_str(json).unwrap()
        })
        .collect()
}

/// N follow-ups produce N+1 parts followed by one termination marker.
#[tokio::test]
async fn test_part_count_for_follow_ups() {
    for n in 1..=4 {
        let chunks = assemble(initial("book-2"), follow_ups(n)).await;

        // opening delimiter + initial + n follow-ups
        assert_eq!(chunks.len(), n + 2);
        assert_eq!(chunks.iter().filter(|c| c.is_terminal()).count(), 1);
        assert!(chunks.last().unwrap().is_terminal());

        let body = concat(&chunks);
        assert_eq!(body.matches("-----").count(), 1);
        assert!(body.ends_with("\r\n-----"));
        assert_eq!(parse_parts(&body).len(), n + 1);
    }
}

/// Follow-up parts appear in the order the engine produced them.
#[tokio::test]
async fn test_parts_preserve_engine_order() {
    let chunks = assemble(initial("book-2"), follow_ups(5)).await;
    let parts = parse_parts(&concat(&chunks));

    let indexes: Vec<u64> = parts[1..]
        .iter()
        .map(|p| p["incremental"][0]["data"]["index"].as_u64().unwrap())
        .collect();
    assert_eq!(indexes, vec![0, 1, 2, 3, 4]);
}

/// Every part carries `hasNext`, true everywhere but the last part.
#[tokio::test]
async fn test_has_next_round_trip() {
    let chunks = assemble(initial("book-2"), follow_ups(3)).await;
    let parts = parse_parts(&concat(&chunks));

    let flags: Vec<bool> = parts
        .iter()
        .map(|p| p["hasNext"].as_bool().expect("hasNext must be a boolean"))
        .collect();
    assert_eq!(flags, vec![true, true, true, false]);
}

/// Exact wire bytes for a deferred author.
#[tokio::test]
async fn test_wire_format() {
    let deferred = SubsequentPayload::new(false)
        .with_item(
            DeferPayloadBuilder::new()
                .at_field("bookById")
                .at_field("author")
                .data(json!({"firstName": "Douglas"}))
                .build(),
        )
        .into_payload()
        .unwrap();
    let chunks = assemble(initial("book-2"), vec![deferred]).await;

    assert_eq!(
        concat(&chunks),
        concat!(
            "---",
            "\r\ncontent-type: application/json; charset=utf-8\r\n\r\n",
            r#"{"data":{"bookById":{"id":"book-2"}},"hasNext":true}"#,
            "\r\n---",
            "\r\ncontent-type: application/json; charset=utf-8\r\n\r\n",
            r#"{"incremental":[{"path":["bookById","author"],"data":{"firstName":"Douglas"}}],"hasNext":false}"#,
            "\r\n-----"
        )
    );
}

/// An incremental result without follow-ups is still a well-formed body.
#[tokio::test]
async fn test_zero_follow_ups() {
    let chunks = assemble(initial("book-3"), Vec::new()).await;

    // opening, initial, closing marker
    assert_eq!(chunks.len(), 3);
    let body = concat(&chunks);
    assert!(body.ends_with("\r\n-----"));
    assert_eq!(parse_parts(&body).len(), 1);
}

/// A follow-up without `hasNext` aborts the stream without termination.
#[tokio::test]
async fn test_missing_flag_aborts() {
    let mut broken = follow_up(0, true);
    broken.remove("hasNext");

    let results: Vec<_> = Assembler::default()
        .assemble(
            initial("book-2"),
            Box::pin(futures::stream::iter(vec![broken, follow_up(1, false)])),
        )
        .collect()
        .await;

    assert_eq!(results.len(), 3);
    assert!(matches!(results[2], Err(FrameError::MissingTerminalFlag)));
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().ok())
        .all(|c| !c.is_terminal()));
}

/// Dropping the body after the initial part cancels the producer.
#[tokio::test]
async fn test_disconnect_cancels_producer() {
    let (sender, partials) = partial_result_channel(1);
    let producer = tokio::spawn(async move {
        let mut sent = 0usize;
        loop {
            if sender.send(follow_up(sent, true)).await.is_err() {
                return sent;
            }
            sent += 1;
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    });

    let mut body = Assembler::default().assemble(initial("book-2"), partials);
    assert!(body.next().await.unwrap().is_ok()); // opening
    assert!(body.next().await.unwrap().is_ok()); // initial part
    drop(body);

    let sent = tokio::time::timeout(Duration::from_secs(1), producer)
        .await
        .expect("producer should stop once the body is dropped")
        .unwrap();
    assert!(sent <= 2, "producer ran ahead: {sent} payloads");
}
