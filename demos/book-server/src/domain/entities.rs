//! Domain entities - Books and their authors.

// Value Objects
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BookId(pub String);

impl BookId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl AsRef<str> for BookId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AuthorId(pub String);

impl AuthorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl AsRef<str> for AuthorId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// Entities
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    pub id: BookId,
    pub name: String,
    pub page_count: u32,
    pub author_id: AuthorId,
}

impl Book {
    pub fn new(id: &str, name: &str, page_count: u32, author_id: &str) -> Self {
        Self {
            id: BookId::new(id),
            name: name.to_string(),
            page_count,
            author_id: AuthorId::new(author_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub id: AuthorId,
    pub first_name: String,
    pub last_name: String,
}

impl Author {
    pub fn new(id: &str, first_name: &str, last_name: &str) -> Self {
        Self {
            id: AuthorId::new(id),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        }
    }
}
