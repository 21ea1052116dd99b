use serde_json::Value;
use tracing::{debug, instrument, trace, warn};

use crate::{
    context::ExecutionContext,
    execution::{error::PlanExecutionError, plan::Executor},
    executors::{
        common::{ServiceRequest, ServiceResponse},
        error::ServiceCallError,
    },
    plan::{FetchNode, FlattenNodePath, PlanPosition, SelectionSet},
    representations::build_representations,
    response::{
        error_normalization::{normalize_service_errors, unlocated_path},
        path::ResponsePath,
    },
    utils::consts::ENTITIES_FIELD_NAME,
    variables::{variables_for_usages, Variables},
};

enum DispatchOutcome {
    Response(ServiceResponse),
    Failed(ServiceCallError),
    Cancelled,
}

impl Executor<'_> {
    /// Fetches the data of `node` and merges it at `path`.
    ///
    /// Failures of the service end up as errors in the response tree and
    /// leave the subtree empty; only merge conflicts are returned.
    #[instrument(level = "debug", skip_all, fields(service = %node.service_name, path = %path, node = %position))]
    pub(crate) async fn execute_fetch(
        &self,
        ctx: &ExecutionContext,
        node: &FetchNode,
        path: &FlattenNodePath,
        position: &PlanPosition,
    ) -> Result<(), PlanExecutionError> {
        let variables = match variables_for_usages(&ctx.variables, &node.variable_usages) {
            Ok(variables) => variables,
            Err(missing) => {
                debug!("{}", missing);
                ctx.attach_error(position, &unlocated_path(path), missing.into());
                return Ok(());
            }
        };

        match &node.requires {
            Some(requires) => {
                self.execute_entity_fetch(ctx, node, path, position, requires, variables)
                    .await
            }
            None => {
                self.execute_root_fetch(ctx, node, path, position, variables)
                    .await
            }
        }
    }

    async fn execute_root_fetch(
        &self,
        ctx: &ExecutionContext,
        node: &FetchNode,
        path: &FlattenNodePath,
        position: &PlanPosition,
        variables: Variables,
    ) -> Result<(), PlanExecutionError> {
        let positions = if path.is_empty() {
            vec![ResponsePath::root()]
        } else {
            ctx.response.positions_at(path)
        };
        if positions.is_empty() {
            trace!("nothing to resolve at the fetch path, skipping");
            return Ok(());
        }

        let request = ServiceRequest {
            service_name: &node.service_name,
            operation: &node.operation,
            operation_name: node.operation_name.as_deref(),
            variables,
            representations: None,
        };

        let response = match self.dispatch(ctx, request).await {
            DispatchOutcome::Response(response) => response,
            DispatchOutcome::Failed(error) => {
                ctx.attach_error(position, &unlocated_path(path), error.into());
                return Ok(());
            }
            DispatchOutcome::Cancelled => return Ok(()),
        };

        ctx.response.extend_errors(
            position,
            normalize_service_errors(
                &node.service_name,
                path,
                &[],
                response.errors,
            ),
        );

        match response.data {
            Some(data) if !data.is_null() => {
                ctx.response
                    .merge_all(positions.into_iter().map(|at| (at, data.clone())))?;
            }
            _ => trace!("service returned no data"),
        }

        Ok(())
    }

    async fn execute_entity_fetch(
        &self,
        ctx: &ExecutionContext,
        node: &FetchNode,
        path: &FlattenNodePath,
        position: &PlanPosition,
        requires: &SelectionSet,
        variables: Variables,
    ) -> Result<(), PlanExecutionError> {
        let mut representations = build_representations(
            &ctx.response,
            path,
            requires,
            self.options.dedupe_representations,
        );
        if representations.is_empty() {
            trace!("no entities to resolve, skipping");
            return Ok(());
        }
        let expected = representations.len();
        debug!(representations = expected, "resolving entities");

        let request = ServiceRequest {
            service_name: &node.service_name,
            operation: &node.operation,
            operation_name: node.operation_name.as_deref(),
            variables,
            representations: Some(std::mem::take(&mut representations.representations)),
        };

        let response = match self.dispatch(ctx, request).await {
            DispatchOutcome::Response(response) => response,
            DispatchOutcome::Failed(error) => {
                ctx.attach_error(position, &unlocated_path(path), error.into());
                return Ok(());
            }
            DispatchOutcome::Cancelled => return Ok(()),
        };

        let ServiceResponse { data, errors } = response;
        let has_errors = !errors.is_empty();
        ctx.response.extend_errors(
            position,
            normalize_service_errors(
                &node.service_name,
                path,
                &representations.positions,
                errors,
            ),
        );

        match take_entities(&node.service_name, data, expected, has_errors) {
            Ok(Some(entities)) => {
                ctx.response
                    .merge_all(representations.into_writes(entities))?;
            }
            Ok(None) => trace!("service returned no entities"),
            Err(error) => {
                warn!("{}", error);
                ctx.attach_error(position, &unlocated_path(path), error.into());
            }
        }

        Ok(())
    }

    /// Sends one request, unless the execution was cancelled before or while
    /// waiting for it.
    async fn dispatch(&self, ctx: &ExecutionContext, request: ServiceRequest<'_>) -> DispatchOutcome {
        if ctx.is_cancelled() {
            return DispatchOutcome::Cancelled;
        }

        let service_name = request.service_name;
        if let Some(observer) = self.observer {
            observer.on_service_call(service_name);
        }

        tokio::select! {
            biased;
            _ = ctx.cancellation_token.cancelled() => {
                debug!(service = service_name, "abandoning request, execution was cancelled");
                DispatchOutcome::Cancelled
            }
            result = self.callers.call(request) => match result {
                Ok(response) => DispatchOutcome::Response(response),
                Err(error) => {
                    warn!("{}", error);
                    DispatchOutcome::Failed(error)
                }
            },
        }
    }
}

/// Extracts `data._entities`, which must hold one entry per representation.
///
/// A response without data is accepted only when it explains itself with errors.
fn take_entities(
    service_name: &str,
    data: Option<Value>,
    expected: usize,
    has_errors: bool,
) -> Result<Option<Vec<Value>>, ServiceCallError> {
    let data = match data {
        Some(Value::Null) | None if has_errors => return Ok(None),
        Some(Value::Null) | None => {
            return Err(ServiceCallError::malformed(
                service_name,
                "response contains neither data nor errors",
            ))
        }
        Some(data) => data,
    };

    match data {
        Value::Object(mut data) => match data.remove(ENTITIES_FIELD_NAME) {
            Some(Value::Array(entities)) if entities.len() == expected => Ok(Some(entities)),
            Some(Value::Array(entities)) => Err(ServiceCallError::malformed(
                service_name,
                format!(
                    "expected {} entities in \"{}\", received {}",
                    expected,
                    ENTITIES_FIELD_NAME,
                    entities.len()
                ),
            )),
            Some(Value::Null) if has_errors => Ok(None),
            _ => Err(ServiceCallError::malformed(
                service_name,
                format!("response has no \"{}\" list", ENTITIES_FIELD_NAME),
            )),
        },
        _ => Err(ServiceCallError::malformed(
            service_name,
            "response data is not an object",
        )),
    }
}
