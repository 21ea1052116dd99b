use std::time::Duration;

use futures::{future::BoxFuture, stream::FuturesUnordered, FutureExt, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace, warn};

use crate::{
    conditions::select_branch,
    context::ExecutionContext,
    execution::{error::PlanExecutionError, observer::ExecutionObserver},
    executors::map::ServiceCallerMap,
    plan::{
        ConditionNode, FlattenNode, FlattenNodePath, ParallelNode, PlanNode, PlanPosition,
        QueryPlan, SequenceNode,
    },
    response::{
        error_normalization::unlocated_path,
        graphql_error::{GraphQLError, EXECUTION_CANCELLED, EXECUTION_TIMEOUT},
        path::ResponsePath,
        result::ExecutionResult,
    },
    variables::{coerce_variables, Variables},
};

#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    /// Upper bound for the whole plan; `None` waits for every fetch.
    pub timeout: Option<Duration>,
    pub dedupe_representations: bool,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            dedupe_representations: true,
        }
    }
}

/// Executes `query_plan` and assembles the response.
///
/// Failed fetches degrade into path-scoped errors next to whatever data the
/// other fetches produced. Cancelling `cancellation_token`, or running past
/// `options.timeout`, abandons in-flight fetches and returns the data merged
/// so far with a single root error. Only inconsistent data coming out of the
/// plan is reported as `Err`.
#[instrument(level = "debug", skip_all)]
pub async fn execute_query_plan(
    query_plan: &QueryPlan,
    callers: &ServiceCallerMap,
    variables: Option<Variables>,
    options: &ExecutionOptions,
    observer: Option<&dyn ExecutionObserver>,
    cancellation_token: &CancellationToken,
) -> Result<ExecutionResult, PlanExecutionError> {
    let variables = coerce_variables(&query_plan.variable_definitions, variables);

    let Some(root) = &query_plan.node else {
        return Ok(ExecutionResult::default());
    };

    let ctx = ExecutionContext::new(variables, cancellation_token.child_token());
    let executor = Executor::new(callers, observer, options);
    let root_path = FlattenNodePath::default();
    let root_position = PlanPosition::root();

    let interruption = {
        let execution = executor.execute_node(&ctx, root, &root_path, &root_position);
        let deadline = async {
            match options.timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = ctx.cancellation_token.cancelled() => Some(GraphQLError::from("Execution was cancelled").with_code(EXECUTION_CANCELLED)),
            _ = deadline => Some(
                GraphQLError::from(format!(
                    "Execution timed out after {}",
                    humantime::format_duration(options.timeout.unwrap_or_default())
                ))
                .with_code(EXECUTION_TIMEOUT),
            ),
            result = execution => {
                result?;
                None
            }
        }
    };

    if let Some(error) = interruption {
        warn!("{}, returning partial data", error.message);
        ctx.cancellation_token.cancel();
        ctx.attach_error(&root_position, &ResponsePath::root(), error);
    }

    let (data, errors) = ctx.into_parts();
    Ok(ExecutionResult { data, errors })
}

pub struct Executor<'exec> {
    pub(crate) callers: &'exec ServiceCallerMap,
    pub(crate) observer: Option<&'exec dyn ExecutionObserver>,
    pub(crate) options: &'exec ExecutionOptions,
}

impl<'exec> Executor<'exec> {
    pub fn new(
        callers: &'exec ServiceCallerMap,
        observer: Option<&'exec dyn ExecutionObserver>,
        options: &'exec ExecutionOptions,
    ) -> Self {
        Executor {
            callers,
            observer,
            options,
        }
    }

    /// Runs `node`, found at `position` in the plan, whose fetches resolve
    /// data at `path` (the concatenation of every enclosing `Flatten` path).
    pub fn execute_node<'a>(
        &'a self,
        ctx: &'a ExecutionContext,
        node: &'a PlanNode,
        path: &'a FlattenNodePath,
        position: &'a PlanPosition,
    ) -> BoxFuture<'a, Result<(), PlanExecutionError>> {
        async move {
            match node {
                PlanNode::Fetch(fetch_node) => {
                    self.execute_fetch(ctx, fetch_node, path, position).await
                }
                PlanNode::Sequence(sequence_node) => {
                    self.execute_sequence(ctx, sequence_node, path, position)
                        .await
                }
                PlanNode::Parallel(parallel_node) => {
                    self.execute_parallel(ctx, parallel_node, path, position)
                        .await
                }
                PlanNode::Flatten(flatten_node) => {
                    self.execute_flatten(ctx, flatten_node, path, position)
                        .await
                }
                PlanNode::Condition(condition_node) => {
                    self.execute_condition(ctx, condition_node, path, position)
                        .await
                }
            }
        }
        .boxed()
    }

    #[instrument(level = "trace", skip_all, fields(children = node.nodes.len()))]
    async fn execute_sequence(
        &self,
        ctx: &ExecutionContext,
        node: &SequenceNode,
        path: &FlattenNodePath,
        position: &PlanPosition,
    ) -> Result<(), PlanExecutionError> {
        for (index, child) in node.nodes.iter().enumerate() {
            let child_position = position.child(index);
            self.execute_node(ctx, child, path, &child_position)
                .await?;
        }
        Ok(())
    }

    #[instrument(level = "trace", skip_all, fields(children = node.nodes.len()))]
    async fn execute_parallel(
        &self,
        ctx: &ExecutionContext,
        node: &ParallelNode,
        path: &FlattenNodePath,
        position: &PlanPosition,
    ) -> Result<(), PlanExecutionError> {
        let child_positions: Vec<PlanPosition> = (0..node.nodes.len())
            .map(|index| position.child(index))
            .collect();
        let mut jobs: FuturesUnordered<_> = node
            .nodes
            .iter()
            .zip(&child_positions)
            .map(|(child, child_position)| self.execute_node(ctx, child, path, child_position))
            .collect();

        // A failed fetch is already recorded as an error; only defects stop the siblings.
        while let Some(result) = jobs.next().await {
            result?;
        }
        Ok(())
    }

    #[instrument(level = "trace", skip_all, fields(path = %node.path))]
    async fn execute_flatten(
        &self,
        ctx: &ExecutionContext,
        node: &FlattenNode,
        path: &FlattenNodePath,
        position: &PlanPosition,
    ) -> Result<(), PlanExecutionError> {
        let nested_path = path.join(&node.path);
        let child_position = position.child(0);
        self.execute_node(ctx, &node.node, &nested_path, &child_position)
            .await
    }

    #[instrument(level = "trace", skip_all, fields(directive = node.directive.as_str()))]
    async fn execute_condition(
        &self,
        ctx: &ExecutionContext,
        node: &ConditionNode,
        path: &FlattenNodePath,
        position: &PlanPosition,
    ) -> Result<(), PlanExecutionError> {
        match select_branch(node, &ctx.variables) {
            Ok(Some(branch)) => {
                let branch_position = position.child(0);
                self.execute_node(ctx, branch, path, &branch_position)
                    .await
            }
            Ok(None) => {
                trace!("condition selected no branch");
                Ok(())
            }
            Err(error) => {
                debug!("{}", error);
                ctx.attach_error(position, &unlocated_path(path), error.into());
                Ok(())
            }
        }
    }
}
