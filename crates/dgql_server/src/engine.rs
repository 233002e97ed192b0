//! The GraphQL engine the server delegates execution to.

use async_trait::async_trait;
use dgql_runtime::ExecutionOutcome;
use serde::{Deserialize, Serialize};

use crate::context::ExecutionContext;

/// A GraphQL-over-HTTP request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQlRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(
        rename = "operationName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub operation_name: Option<String>,
}

impl GraphQlRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            variables: None,
            operation_name: None,
        }
    }

    pub fn variables(mut self, variables: serde_json::Map<String, serde_json::Value>) -> Self {
        self.variables = Some(variables);
        self
    }

    pub fn operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    /// Looks up a variable.
    pub fn variable(&self, name: &str) -> Option<&serde_json::Value> {
        self.variables.as_ref().and_then(|vars| vars.get(name))
    }
}

/// Parses, validates and executes GraphQL operations.
///
/// Query errors are not failures here: they come back as ordinary results
/// with `errors` populated. An engine may only return
/// [`ExecutionOutcome::Incremental`] when
/// [`ExecutionContext::incremental_delivery`] is set.
#[async_trait]
pub trait GraphQlEngine: Send + Sync {
    async fn execute(&self, request: GraphQlRequest, ctx: ExecutionContext) -> ExecutionOutcome;
}
