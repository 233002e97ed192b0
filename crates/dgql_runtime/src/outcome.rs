//! Execution outcomes handed from the engine to the response layer.

use std::fmt;
use std::pin::Pin;

use futures::Stream;
use tokio::sync::mpsc;

use crate::Payload;

/// Lazy, finite sequence of follow-up payloads, in the order the engine
/// produced them.
pub type PartialResults = Pin<Box<dyn Stream<Item = Payload> + Send>>;

/// The result of executing one GraphQL operation.
pub enum ExecutionOutcome {
    /// A complete result, delivered as a single JSON body.
    Simple(Payload),
    /// An initial result followed by partial results over time.
    Incremental(IncrementalResult),
}

impl ExecutionOutcome {
    /// Returns true if this outcome must be streamed.
    pub fn is_incremental(&self) -> bool {
        matches!(self, Self::Incremental(_))
    }
}

impl fmt::Debug for ExecutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple(result) => f.debug_tuple("Simple").field(result).finish(),
            Self::Incremental(result) => f.debug_tuple("Incremental").field(result).finish(),
        }
    }
}

/// Initial payload plus the pending follow-ups.
pub struct IncrementalResult {
    pub initial: Payload,
    pub follow_ups: PartialResults,
}

impl IncrementalResult {
    pub fn new(initial: Payload, follow_ups: PartialResults) -> Self {
        Self {
            initial,
            follow_ups,
        }
    }

    /// Creates a result whose follow-ups are already known.
    pub fn from_payloads<I>(initial: Payload, follow_ups: I) -> Self
    where
        I: IntoIterator<Item = Payload>,
        I::IntoIter: Send + 'static,
    {
        Self::new(initial, Box::pin(futures::stream::iter(follow_ups)))
    }
}

impl fmt::Debug for IncrementalResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncrementalResult")
            .field("initial", &self.initial)
            .finish_non_exhaustive()
    }
}

/// Creates a bounded channel for producing follow-up payloads from another
/// task.
///
/// The receiving side is a [`PartialResults`] stream. Sends wait while the
/// buffer is full, so a producer never runs further ahead of the response
/// writer than `buffer` payloads. Once the stream is dropped (for example
/// because the client disconnected) every send fails with
/// [`SendError::Closed`].
pub fn partial_result_channel(buffer: usize) -> (PartialResultSender, PartialResults) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    let stream = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|payload| (payload, rx))
    });
    (PartialResultSender { sender: tx }, Box::pin(stream))
}

/// Producer side of [`partial_result_channel`].
#[derive(Debug, Clone)]
pub struct PartialResultSender {
    sender: mpsc::Sender<Payload>,
}

impl PartialResultSender {
    /// Sends the next follow-up payload.
    pub async fn send(&self, payload: Payload) -> Result<(), SendError> {
        self.sender.send(payload).await.map_err(|_| SendError::Closed)
    }

    /// Checks if the consumer has gone away.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Resolves once the consumer has gone away.
    pub async fn closed(&self) {
        self.sender.closed().await;
    }
}

/// Error when sending follow-up payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// The consumer has been dropped.
    Closed,
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::Closed => write!(f, "partial result consumer closed"),
        }
    }
}

impl std::error::Error for SendError {}
