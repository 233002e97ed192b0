//! Assembles an incremental result into an ordered stream of chunks.

use std::pin::Pin;

use futures::{Stream, StreamExt};
use tracing::{error, trace, warn};

use crate::error::FrameError;
use crate::multipart::{Chunk, Framer};
use crate::outcome::PartialResults;
use crate::Payload;

/// Lazily produced multipart body.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Chunk, FrameError>> + Send>>;

/// Turns an initial payload and its follow-ups into multipart chunks.
///
/// Chunks come out in input order. A follow-up is polled only when the
/// consumer asks for the next chunk, and dropping the chunk stream drops the
/// follow-up stream with it.
#[derive(Debug, Clone, Default)]
pub struct Assembler {
    framer: Framer,
}

impl Assembler {
    pub fn new(framer: Framer) -> Self {
        Self { framer }
    }

    pub fn framer(&self) -> &Framer {
        &self.framer
    }

    /// Produces the full body: opening delimiter, the initial part, one part
    /// per follow-up, ending with exactly one termination marker.
    ///
    /// The stream stops after the first terminal part. If the follow-ups run
    /// out before a terminal part, a closing marker is appended. A framing
    /// error is yielded once and ends the stream without a termination
    /// marker.
    pub fn assemble(&self, initial: Payload, follow_ups: PartialResults) -> ChunkStream {
        let framer = self.framer.clone();

        let stream = async_stream::stream! {
            let mut follow_ups = follow_ups;
            yield Ok(framer.opening());

            let mut parts = 0usize;
            let mut next = Some(initial);
            while let Some(payload) = next.take() {
                let chunk = match framer.frame(&payload) {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        error!(parts, "Aborting incremental response: {}", e);
                        yield Err(e);
                        return;
                    }
                };
                parts += 1;
                let terminal = chunk.is_terminal();
                trace!(parts, bytes = chunk.len(), terminal, "Framed part");
                yield Ok(chunk);

                if terminal {
                    return;
                }

                next = follow_ups.next().await;
                if next.is_none() {
                    warn!(
                        parts,
                        "Partial results ended without a 'hasNext: false' payload; closing the multipart body"
                    );
                    yield Ok(framer.closing());
                }
            }
        };

        Box::pin(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::partial_result_channel;
    use serde_json::json;

    fn payload(has_next: bool) -> Payload {
        let mut p = Payload::new();
        p.insert("hasNext".into(), json!(has_next));
        p
    }

    async fn collect(stream: ChunkStream) -> Vec<Result<Chunk, FrameError>> {
        stream.collect().await
    }

    #[tokio::test]
    async fn test_terminal_initial_skips_follow_ups() {
        let follow_ups = Box::pin(futures::stream::iter(vec![payload(false)]));
        let chunks = collect(Assembler::default().assemble(payload(false), follow_ups)).await;

        assert_eq!(chunks.len(), 2);
        assert!(chunks[1].as_ref().unwrap().is_terminal());
    }

    #[tokio::test]
    async fn test_stops_after_first_terminal_part() {
        let follow_ups = Box::pin(futures::stream::iter(vec![
            payload(false),
            payload(true),
            payload(false),
        ]));
        let chunks = collect(Assembler::default().assemble(payload(true), follow_ups)).await;

        // opening, initial, first follow-up
        assert_eq!(chunks.len(), 3);
        assert_eq!(
            chunks.iter().filter(|c| c.as_ref().unwrap().is_terminal()).count(),
            1
        );
    }

    #[tokio::test]
    async fn test_frame_error_ends_stream() {
        let follow_ups = Box::pin(futures::stream::iter(vec![Payload::new(), payload(false)]));
        let chunks = collect(Assembler::default().assemble(payload(true), follow_ups)).await;

        assert_eq!(chunks.len(), 3);
        assert!(matches!(chunks[2], Err(FrameError::MissingTerminalFlag)));
        assert!(chunks[..2].iter().all(|c| !c.as_ref().unwrap().is_terminal()));
    }

    #[tokio::test]
    async fn test_follow_ups_polled_lazily() {
        let (sender, follow_ups) = partial_result_channel(1);
        let mut chunks = Assembler::default().assemble(payload(true), follow_ups);

        assert!(chunks.next().await.unwrap().is_ok());
        assert!(chunks.next().await.unwrap().is_ok());

        sender.send(payload(false)).await.unwrap();
        let last = chunks.next().await.unwrap().unwrap();
        assert!(last.is_terminal());
        assert!(chunks.next().await.is_none());
        assert!(sender.is_closed());
    }
}
