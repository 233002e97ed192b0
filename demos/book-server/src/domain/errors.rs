//! Domain errors - Queries the catalogue cannot answer.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Unsupported query: {0}")]
    UnsupportedQuery(String),

    #[error("Variable \"${0}\" was not provided")]
    MissingVariable(String),

    #[error("Variable \"${0}\" must be a string")]
    InvalidVariable(String),

    #[error("Cannot query field \"{field}\" on type \"{type_name}\"")]
    UnknownField { type_name: String, field: String },
}

impl DomainError {
    pub fn unknown_field(type_name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnknownField {
            type_name: type_name.into(),
            field: field.into(),
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
