use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::response::graphql_error::GraphQLError;

/// The outcome of executing a plan: whatever data could be resolved and the
/// path-annotated errors for everything that could not.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub data: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphQLError>,
}

impl ExecutionResult {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors_with_code<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a GraphQLError> {
        self.errors
            .iter()
            .filter(move |error| error.code() == Some(code))
    }
}
