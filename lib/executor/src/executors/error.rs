use std::time::Duration;

use crate::response::graphql_error::{
    GraphQLError, SUBGRAPH_MALFORMED_RESPONSE, SUBGRAPH_TIMEOUT, SUBGRAPH_UNAVAILABLE,
};

/// A call to a service failed as a whole, without producing any data.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ServiceCallError {
    #[error("Service \"{service}\" is unavailable: {reason}")]
    ServiceUnavailable { service: String, reason: String },
    #[error("Request to service \"{service}\" timed out after {}", humantime::format_duration(*.duration))]
    Timeout { service: String, duration: Duration },
    #[error("Service \"{service}\" returned a malformed response: {reason}")]
    Malformed { service: String, reason: String },
}

impl ServiceCallError {
    pub fn unavailable(service: &str, reason: impl ToString) -> Self {
        ServiceCallError::ServiceUnavailable {
            service: service.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn malformed(service: &str, reason: impl ToString) -> Self {
        ServiceCallError::Malformed {
            service: service.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn service_name(&self) -> &str {
        match self {
            ServiceCallError::ServiceUnavailable { service, .. }
            | ServiceCallError::Timeout { service, .. }
            | ServiceCallError::Malformed { service, .. } => service,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ServiceCallError::ServiceUnavailable { .. } => SUBGRAPH_UNAVAILABLE,
            ServiceCallError::Timeout { .. } => SUBGRAPH_TIMEOUT,
            ServiceCallError::Malformed { .. } => SUBGRAPH_MALFORMED_RESPONSE,
        }
    }
}

impl From<ServiceCallError> for GraphQLError {
    fn from(error: ServiceCallError) -> Self {
        let service_name = error.service_name().to_string();
        GraphQLError::from(error.to_string())
            .with_code(error.code())
            .with_service_name(&service_name)
    }
}
