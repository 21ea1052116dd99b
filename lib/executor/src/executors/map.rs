use std::collections::HashMap;

use crate::executors::{
    common::{ServiceCaller, ServiceCallerBoxedArc, ServiceRequest, ServiceResponse},
    error::ServiceCallError,
};

/// Routes each fetch to the caller registered for its service.
#[derive(Default)]
pub struct ServiceCallerMap {
    inner: HashMap<String, ServiceCallerBoxedArc>,
}

impl ServiceCallerMap {
    pub fn new() -> Self {
        ServiceCallerMap {
            inner: HashMap::new(),
        }
    }

    pub async fn call<'a>(
        &self,
        request: ServiceRequest<'a>,
    ) -> Result<ServiceResponse, ServiceCallError> {
        match self.inner.get(request.service_name) {
            Some(caller) => caller.call(request).await,
            None => Err(ServiceCallError::unavailable(
                request.service_name,
                "no caller is registered for this service",
            )),
        }
    }

    pub fn insert_boxed_arc(&mut self, service_name: String, boxed_arc: ServiceCallerBoxedArc) {
        self.inner.insert(service_name, boxed_arc);
    }

    pub fn insert<C>(&mut self, service_name: impl Into<String>, caller: C)
    where
        C: ServiceCaller + Send + Sync + 'static,
    {
        self.insert_boxed_arc(service_name.into(), caller.to_boxed_arc());
    }

    pub fn contains(&self, service_name: &str) -> bool {
        self.inner.contains_key(service_name)
    }
}
