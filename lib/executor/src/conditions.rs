use serde_json::Value;

use crate::{
    plan::{ConditionKind, ConditionNode, ConditionValue, PlanNode},
    response::graphql_error::{GraphQLError, INVALID_CONDITION_VARIABLE},
    variables::{MissingVariable, Variables},
};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConditionError {
    #[error(transparent)]
    MissingVariable(#[from] MissingVariable),
    #[error("Variable \"${name}\" used by @{directive} must be a Boolean, found {found}")]
    InvalidConditionVariable {
        name: String,
        directive: &'static str,
        found: Value,
    },
}

impl From<ConditionError> for GraphQLError {
    fn from(error: ConditionError) -> Self {
        match error {
            ConditionError::MissingVariable(missing) => missing.into(),
            invalid @ ConditionError::InvalidConditionVariable { .. } => {
                GraphQLError::from(invalid.to_string()).with_code(INVALID_CONDITION_VARIABLE)
            }
        }
    }
}

/// Resolves the `if:` argument of the directive to a boolean.
fn resolve_if_argument(
    condition: &ConditionNode,
    variables: &Variables,
) -> Result<bool, ConditionError> {
    let name = match &condition.condition {
        ConditionValue::Literal(value) => return Ok(*value),
        ConditionValue::Variable(name) => name,
    };

    match variables.get(name) {
        Some(Value::Bool(value)) => Ok(*value),
        Some(Value::Null) | None => condition
            .default_value
            .ok_or_else(|| MissingVariable::new(name).into()),
        Some(other) => Err(ConditionError::InvalidConditionVariable {
            name: name.clone(),
            directive: condition.directive.as_str(),
            found: other.clone(),
        }),
    }
}

/// Whether the guarded fields are part of the response.
///
/// `@include` keeps them when its argument is `true`, `@skip` when it is `false`.
pub fn evaluate(condition: &ConditionNode, variables: &Variables) -> Result<bool, ConditionError> {
    let value = resolve_if_argument(condition, variables)?;
    Ok(match condition.directive {
        ConditionKind::Include => value,
        ConditionKind::Skip => !value,
    })
}

/// The branch to run, if any.
pub fn select_branch<'a>(
    condition: &'a ConditionNode,
    variables: &Variables,
) -> Result<Option<&'a PlanNode>, ConditionError> {
    let branch = if evaluate(condition, variables)? {
        &condition.if_clause
    } else {
        &condition.else_clause
    };
    Ok(branch.as_deref())
}
