use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    executors::error::ServiceCallError, response::graphql_error::GraphQLError,
    variables::Variables,
};

/// The capability of sending one GraphQL operation to one service.
///
/// Retries, if any, belong to the implementation; the executor calls each
/// fetch exactly once.
#[async_trait]
pub trait ServiceCaller {
    async fn call<'a>(
        &self,
        request: ServiceRequest<'a>,
    ) -> Result<ServiceResponse, ServiceCallError>;

    fn to_boxed_arc<'a>(self) -> Arc<Box<dyn ServiceCaller + Send + Sync + 'a>>
    where
        Self: Sized + Send + Sync + 'a,
    {
        Arc::new(Box::new(self))
    }
}

pub type ServiceCallerType = dyn ServiceCaller + Send + Sync;

pub type ServiceCallerBoxedArc = Arc<Box<ServiceCallerType>>;

#[derive(Debug, Clone)]
pub struct ServiceRequest<'a> {
    pub service_name: &'a str,
    pub operation: &'a str,
    pub operation_name: Option<&'a str>,
    pub variables: Variables,
    pub representations: Option<Vec<Value>>,
}

impl ServiceRequest<'_> {
    /// The request variables as a service sees them, `representations` included.
    pub fn variables_with_representations(&self) -> Variables {
        let mut variables = self.variables.clone();
        if let Some(representations) = &self.representations {
            variables.insert(
                crate::utils::consts::REPRESENTATIONS_VARIABLE_NAME.to_string(),
                Value::Array(representations.clone()),
            );
        }
        variables
    }
}

/// GraphQL-over-HTTP request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLRequestBody<'a> {
    pub query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Variables::is_empty")]
    pub variables: Variables,
}

impl<'a> From<&ServiceRequest<'a>> for GraphQLRequestBody<'a> {
    fn from(request: &ServiceRequest<'a>) -> Self {
        GraphQLRequestBody {
            query: request.operation,
            operation_name: request.operation_name,
            variables: request.variables_with_representations(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub errors: Vec<GraphQLError>,
}
