use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::response::path::ResponsePath;

pub const CODE_EXTENSION: &str = "code";
pub const SERVICE_NAME_EXTENSION: &str = "serviceName";

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<GraphQLErrorLocation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<ResponsePath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Map<String, Value>>,
}

impl From<String> for GraphQLError {
    fn from(message: String) -> Self {
        GraphQLError {
            message,
            locations: None,
            path: None,
            extensions: None,
        }
    }
}

impl From<&str> for GraphQLError {
    fn from(message: &str) -> Self {
        message.to_string().into()
    }
}

impl GraphQLError {
    /// Root-level errors keep `path` unset, as GraphQL responses do.
    pub fn with_path(mut self, path: &ResponsePath) -> Self {
        self.path = if path.is_root() {
            None
        } else {
            Some(path.clone())
        };
        self
    }

    pub fn with_code(self, code: &str) -> Self {
        self.with_extension(CODE_EXTENSION, code.into())
    }

    pub fn with_service_name(self, service_name: &str) -> Self {
        self.with_extension(SERVICE_NAME_EXTENSION, service_name.into())
    }

    /// Only sets the extension when the service did not provide one already.
    pub fn with_default_extension(mut self, key: &str, value: Value) -> Self {
        let extensions = self.extensions.get_or_insert_with(Map::new);
        if !extensions.contains_key(key) {
            extensions.insert(key.to_string(), value);
        }
        self
    }

    fn with_extension(mut self, key: &str, value: Value) -> Self {
        self.extensions
            .get_or_insert_with(Map::new)
            .insert(key.to_string(), value);
        self
    }

    pub fn code(&self) -> Option<&str> {
        self.extension_str(CODE_EXTENSION)
    }

    pub fn service_name(&self) -> Option<&str> {
        self.extension_str(SERVICE_NAME_EXTENSION)
    }

    fn extension_str(&self, key: &str) -> Option<&str> {
        self.extensions
            .as_ref()
            .and_then(|extensions| extensions.get(key))
            .and_then(Value::as_str)
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct GraphQLErrorLocation {
    pub line: usize,
    pub column: usize,
}

pub const MISSING_VARIABLE: &str = "MISSING_VARIABLE";
pub const INVALID_CONDITION_VARIABLE: &str = "INVALID_CONDITION_VARIABLE";
pub const SUBGRAPH_UNAVAILABLE: &str = "SUBGRAPH_UNAVAILABLE";
pub const SUBGRAPH_TIMEOUT: &str = "SUBGRAPH_TIMEOUT";
pub const SUBGRAPH_MALFORMED_RESPONSE: &str = "SUBGRAPH_MALFORMED_RESPONSE";
pub const EXECUTION_CANCELLED: &str = "EXECUTION_CANCELLED";
pub const EXECUTION_TIMEOUT: &str = "EXECUTION_TIMEOUT";
