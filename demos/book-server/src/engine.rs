//! Executes catalogue queries, deferring the author when asked to.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dgql_runtime::{
    partial_result_channel, DeferPayloadBuilder, ExecutionOutcome, IncrementalResult,
    InitialPayload, Payload, SubsequentPayload,
};
use dgql_server::{ExecutionContext, GraphQlEngine, GraphQlRequest};
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use crate::domain::*;
use crate::infrastructure::*;
use crate::query::{AuthorSelection, BookQuery, QueryParser};

/// Simulated resolver delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Latency {
    /// Delay for `book-1`.
    pub fast_book: Duration,
    /// Delay for every other book.
    pub book: Duration,
    pub author: Duration,
}

impl Default for Latency {
    fn default() -> Self {
        Self::simulated()
    }
}

impl Latency {
    pub const fn simulated() -> Self {
        Self {
            fast_book: Duration::from_millis(100),
            book: Duration::from_millis(800),
            author: Duration::from_millis(500),
        }
    }

    pub const fn none() -> Self {
        Self {
            fast_book: Duration::ZERO,
            book: Duration::ZERO,
            author: Duration::ZERO,
        }
    }

    /// Scales every delay by `factor`.
    pub fn scaled(self, factor: f64) -> Self {
        Self {
            fast_book: self.fast_book.mul_f64(factor),
            book: self.book.mul_f64(factor),
            author: self.author.mul_f64(factor),
        }
    }

    fn for_book(&self, id: &BookId) -> Duration {
        if id.0 == "book-1" {
            self.fast_book
        } else {
            self.book
        }
    }
}

async fn delay(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

/// GraphQL engine over the book and author repositories.
pub struct BookEngine {
    books: Arc<dyn BookRepository>,
    authors: Arc<dyn AuthorRepository>,
    parser: QueryParser,
    latency: Latency,
}

impl BookEngine {
    pub fn new(
        books: Arc<dyn BookRepository>,
        authors: Arc<dyn AuthorRepository>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            books,
            authors,
            parser: QueryParser::new()?,
            latency: Latency::default(),
        })
    }

    /// Engine over the built-in catalogue.
    pub fn with_seed_data() -> Result<Self, regex::Error> {
        Self::new(
            Arc::new(InMemoryBookRepository::with_seed_data()),
            Arc::new(InMemoryAuthorRepository::with_seed_data()),
        )
    }

    pub fn latency(mut self, latency: Latency) -> Self {
        self.latency = latency;
        self
    }

    async fn load_book(&self, id: &BookId) -> Option<Book> {
        delay(self.latency.for_book(id)).await;
        self.books.lookup(id).await
    }

    fn defer_author(
        &self,
        book: Book,
        book_data: Payload,
        selection: AuthorSelection,
    ) -> ExecutionOutcome {
        let initial = match InitialPayload::new(json!({ "bookById": book_data })).into_payload() {
            Ok(initial) => initial,
            Err(e) => return ExecutionOutcome::Simple(internal_error(&e)),
        };

        let (sender, follow_ups) = partial_result_channel(1);
        let authors = Arc::clone(&self.authors);
        let latency = self.latency.author;

        tokio::spawn(async move {
            let author = tokio::select! {
                () = sender.closed() => {
                    warn!(book = %book.id.0, "Client went away before the author was resolved");
                    return;
                }
                author = async {
                    delay(latency).await;
                    authors.lookup(&book.author_id).await
                } => author,
            };

            let mut item = DeferPayloadBuilder::new()
                .at_field("bookById")
                .at_field("author")
                .data(author_value(author.as_ref(), &selection.fields));
            if let Some(label) = selection.defer.and_then(|d| d.label) {
                item = item.label(label);
            }

            let payload = match SubsequentPayload::new(false)
                .with_item(item.build())
                .into_payload()
            {
                Ok(payload) => payload,
                Err(e) => {
                    error!("Failed to build deferred payload: {}", e);
                    return;
                }
            };

            debug!(book = %book.id.0, "Sending deferred author");
            if sender.send(payload).await.is_err() {
                warn!(book = %book.id.0, "Client went away before the author was sent");
            }
        });

        ExecutionOutcome::Incremental(IncrementalResult::new(initial, follow_ups))
    }

    async fn resolve(&self, query: BookQuery, ctx: &ExecutionContext) -> ExecutionOutcome {
        let Some(book) = self.load_book(&BookId::new(query.id.as_str())).await else {
            return ExecutionOutcome::Simple(data(json!({ "bookById": null })));
        };

        let mut book_data = book_value(&book, &query.fields);

        match query.author {
            Some(selection) if selection.is_deferred() && ctx.incremental_delivery() => {
                self.defer_author(book, book_data, selection)
            }
            Some(selection) => {
                delay(self.latency.author).await;
                let author = self.authors.lookup(&book.author_id).await;
                book_data.insert(
                    "author".to_string(),
                    author_value(author.as_ref(), &selection.fields),
                );
                ExecutionOutcome::Simple(data(json!({ "bookById": book_data })))
            }
            None => ExecutionOutcome::Simple(data(json!({ "bookById": book_data }))),
        }
    }
}

#[async_trait]
impl GraphQlEngine for BookEngine {
    async fn execute(&self, request: GraphQlRequest, ctx: ExecutionContext) -> ExecutionOutcome {
        match self
            .parser
            .parse(&request.query, request.variables.as_ref())
        {
            Ok(query) => self.resolve(query, &ctx).await,
            Err(e) => {
                debug!("Rejected query: {}", e);
                ExecutionOutcome::Simple(errors(&e))
            }
        }
    }
}

fn book_value(book: &Book, fields: &[String]) -> Payload {
    fields
        .iter()
        .map(|field| {
            let value = match field.as_str() {
                "id" => json!(book.id.0),
                "name" => json!(book.name),
                "pageCount" => json!(book.page_count),
                "__typename" => json!("Book"),
                _ => Value::Null,
            };
            (field.clone(), value)
        })
        .collect()
}

fn author_value(author: Option<&Author>, fields: &[String]) -> Value {
    let Some(author) = author else {
        return Value::Null;
    };
    let projected: Payload = fields
        .iter()
        .map(|field| {
            let value = match field.as_str() {
                "id" => json!(author.id.0),
                "firstName" => json!(author.first_name),
                "lastName" => json!(author.last_name),
                "__typename" => json!("Author"),
                _ => Value::Null,
            };
            (field.clone(), value)
        })
        .collect();
    Value::Object(projected)
}

fn data(data: Value) -> Payload {
    let mut result = Payload::new();
    result.insert("data".to_string(), data);
    result
}

fn errors(error: &DomainError) -> Payload {
    let mut result = Payload::new();
    result.insert(
        "errors".to_string(),
        json!([{ "message": error.to_string() }]),
    );
    result
}

fn internal_error(error: &dyn std::fmt::Display) -> Payload {
    error!("Failed to build initial payload: {}", error);
    let mut result = Payload::new();
    result.insert(
        "errors".to_string(),
        json!([{ "message": "Internal server error" }]),
    );
    result
}
