use dashmap::DashMap;

/// Receives notifications about what a plan execution does.
pub trait ExecutionObserver: Send + Sync {
    /// Called right before a request is sent to `service_name`.
    fn on_service_call(&self, service_name: &str);
}

/// Counts outbound calls per service.
#[derive(Debug, Default)]
pub struct ServiceCallLog {
    calls: DashMap<String, usize>,
}

impl ServiceCallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self, service_name: &str) -> usize {
        self.calls
            .get(service_name)
            .map(|count| *count)
            .unwrap_or_default()
    }

    pub fn was_called(&self, service_name: &str) -> bool {
        self.call_count(service_name) > 0
    }

    /// Names of the called services, sorted.
    pub fn called_services(&self) -> Vec<String> {
        let mut names: Vec<String> = self.calls.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }
}

impl ExecutionObserver for ServiceCallLog {
    fn on_service_call(&self, service_name: &str) {
        *self.calls.entry(service_name.to_string()).or_insert(0) += 1;
    }
}
