use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use tracing::{debug, instrument};

use crate::executors::{
    common::{GraphQLRequestBody, ServiceCaller, ServiceRequest, ServiceResponse},
    error::ServiceCallError,
};

/// Calls a service with GraphQL-over-HTTP `POST` requests.
#[derive(Debug, Clone)]
pub struct HttpServiceCaller {
    pub endpoint: String,
    pub http_client: Client,
    pub timeout: Option<Duration>,
}

impl HttpServiceCaller {
    pub fn new(endpoint: impl Into<String>, http_client: Client, timeout: Option<Duration>) -> Self {
        Self {
            endpoint: endpoint.into(),
            http_client,
            timeout,
        }
    }

    async fn send(&self, request: &ServiceRequest<'_>) -> Result<ServiceResponse, ServiceCallError> {
        let service_name = request.service_name;
        let body = GraphQLRequestBody::from(request);

        let response = self
            .http_client
            .post(&self.endpoint)
            .header(header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceCallError::unavailable(service_name, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceCallError::unavailable(
                service_name,
                format!("{} responded with status {}", self.endpoint, status),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ServiceCallError::unavailable(service_name, e))?;

        serde_json::from_slice::<ServiceResponse>(&bytes)
            .map_err(|e| ServiceCallError::malformed(service_name, e))
    }
}

#[async_trait]
impl ServiceCaller for HttpServiceCaller {
    #[instrument(level = "debug", skip_all, fields(service = request.service_name, endpoint = %self.endpoint))]
    async fn call<'a>(
        &self,
        request: ServiceRequest<'a>,
    ) -> Result<ServiceResponse, ServiceCallError> {
        let Some(duration) = self.timeout else {
            return self.send(&request).await;
        };

        match tokio::time::timeout(duration, self.send(&request)).await {
            Ok(result) => result,
            Err(_) => {
                debug!("request timed out after {:?}", duration);
                Err(ServiceCallError::Timeout {
                    service: request.service_name.to_string(),
                    duration,
                })
            }
        }
    }
}
