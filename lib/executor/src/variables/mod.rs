use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::{
    plan::VariableDefinition,
    response::graphql_error::{GraphQLError, MISSING_VARIABLE},
};

pub type Variables = HashMap<String, Value>;

/// A variable was needed but neither provided nor defaulted.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("Variable \"${name}\" was not provided and has no default value")]
pub struct MissingVariable {
    pub name: String,
}

impl MissingVariable {
    pub fn new(name: impl Into<String>) -> Self {
        MissingVariable { name: name.into() }
    }
}

impl From<MissingVariable> for GraphQLError {
    fn from(error: MissingVariable) -> Self {
        GraphQLError::from(error.to_string()).with_code(MISSING_VARIABLE)
    }
}

/// Applies the plan's variable definitions to the request variables.
///
/// Provided values are kept as they are, absent ones take their declared
/// default, absent nullable ones become `null`. An absent non-null variable
/// without a default stays absent, so only the nodes using it fail with
/// [`MissingVariable`]. Variables the plan does not declare are passed through.
pub fn coerce_variables(
    variable_definitions: &[VariableDefinition],
    variables: Option<Variables>,
) -> Variables {
    let mut coerced = variables.unwrap_or_default();

    for variable_definition in variable_definitions {
        if coerced.contains_key(&variable_definition.name) {
            continue;
        }
        let value = match &variable_definition.default_value {
            Some(default_value) => default_value.clone(),
            None if variable_definition.non_null => {
                debug!(name = %variable_definition.name, "non-null variable not provided");
                continue;
            }
            None => Value::Null,
        };
        debug!(name = %variable_definition.name, "variable not provided, using {}", value);
        coerced.insert(variable_definition.name.clone(), value);
    }

    coerced
}

/// Picks the variables a fetch forwards to its service.
pub fn variables_for_usages(
    variables: &Variables,
    variable_usages: &[String],
) -> Result<Variables, MissingVariable> {
    variable_usages
        .iter()
        .map(|name| match variables.get(name) {
            Some(value) => Ok((name.clone(), value.clone())),
            None => Err(MissingVariable::new(name)),
        })
        .collect()
}
