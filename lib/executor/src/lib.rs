pub mod conditions;
pub mod context;
pub mod execution;
pub mod executors;
pub mod plan;
pub mod representations;
pub mod response;
pub mod utils;
pub mod variables;

#[cfg(test)]
mod tests;

pub use execution::{
    error::PlanExecutionError,
    observer::{ExecutionObserver, ServiceCallLog},
    plan::{execute_query_plan, ExecutionOptions},
};
pub use executors::{
    common::{ServiceCaller, ServiceRequest, ServiceResponse},
    error::ServiceCallError,
    http::HttpServiceCaller,
    map::ServiceCallerMap,
};
pub use plan::{PlanNode, QueryPlan};
pub use response::result::ExecutionResult;
