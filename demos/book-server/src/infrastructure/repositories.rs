//! Repository implementations - Data access layer.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::*;

// Repository Traits
#[async_trait]
pub trait BookRepository: Send + Sync {
    async fn lookup(&self, id: &BookId) -> Option<Book>;
}

#[async_trait]
pub trait AuthorRepository: Send + Sync {
    async fn lookup(&self, id: &AuthorId) -> Option<Author>;
}

// In-Memory Book Repository
#[derive(Debug, Default)]
pub struct InMemoryBookRepository {
    books: HashMap<BookId, Book>,
}

impl InMemoryBookRepository {
    pub fn new(books: impl IntoIterator<Item = Book>) -> Self {
        Self {
            books: books.into_iter().map(|b| (b.id.clone(), b)).collect(),
        }
    }

    pub fn with_seed_data() -> Self {
        Self::new([
            Book::new("book-1", "Effective Java", 416, "author-1"),
            Book::new("book-2", "Hitchhiker's Guide to the Galaxy", 208, "author-2"),
            Book::new("book-3", "Down Under", 436, "author-3"),
        ])
    }
}

#[async_trait]
impl BookRepository for InMemoryBookRepository {
    async fn lookup(&self, id: &BookId) -> Option<Book> {
        self.books.get(id).cloned()
    }
}

// In-Memory Author Repository
#[derive(Debug, Default)]
pub struct InMemoryAuthorRepository {
    authors: HashMap<AuthorId, Author>,
}

impl InMemoryAuthorRepository {
    pub fn new(authors: impl IntoIterator<Item = Author>) -> Self {
        Self {
            authors: authors.into_iter().map(|a| (a.id.clone(), a)).collect(),
        }
    }

    pub fn with_seed_data() -> Self {
        Self::new([
            Author::new("author-1", "Joshua", "Bloch"),
            Author::new("author-2", "Douglas", "Adams"),
            Author::new("author-3", "Bill", "Bryson"),
        ])
    }
}

#[async_trait]
impl AuthorRepository for InMemoryAuthorRepository {
    async fn lookup(&self, id: &AuthorId) -> Option<Author> {
        self.authors.get(id).cloned()
    }
}
