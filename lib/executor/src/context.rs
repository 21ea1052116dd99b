use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::{
    plan::PlanPosition,
    response::{graphql_error::GraphQLError, path::ResponsePath, tree::ResponseTree},
    variables::Variables,
};

/// Per-request state of one plan execution. Never shared between requests.
pub struct ExecutionContext {
    pub variables: Variables,
    pub response: ResponseTree,
    pub cancellation_token: CancellationToken,
}

impl ExecutionContext {
    pub fn new(variables: Variables, cancellation_token: CancellationToken) -> Self {
        ExecutionContext {
            variables,
            response: ResponseTree::new(),
            cancellation_token,
        }
    }

    pub fn attach_error(&self, position: &PlanPosition, path: &ResponsePath, error: GraphQLError) {
        self.response.attach_error(position, path, error);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    pub fn into_parts(self) -> (Value, Vec<GraphQLError>) {
        self.response.into_parts()
    }
}
