use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::{
    execute_query_plan,
    executors::{
        common::{ServiceCaller, ServiceRequest, ServiceResponse},
        error::ServiceCallError,
        map::ServiceCallerMap,
    },
    plan::QueryPlan,
    response::{
        graphql_error::{
            EXECUTION_CANCELLED, EXECUTION_TIMEOUT, MISSING_VARIABLE, SUBGRAPH_MALFORMED_RESPONSE,
            SUBGRAPH_UNAVAILABLE,
        },
        result::ExecutionResult,
    },
    variables::Variables,
    ExecutionOptions, PlanExecutionError, ServiceCallLog,
};

mod fixtures;

use self::async_graphql::LocalSubgraph;

/// Always answers with the same payload.
struct StaticService {
    response: Value,
    delay: Option<Duration>,
}

impl StaticService {
    fn new(response: Value) -> Self {
        StaticService {
            response,
            delay: None,
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl ServiceCaller for StaticService {
    async fn call<'a>(
        &self,
        request: ServiceRequest<'a>,
    ) -> Result<ServiceResponse, ServiceCallError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        serde_json::from_value(self.response.clone())
            .map_err(|e| ServiceCallError::malformed(request.service_name, e))
    }
}

struct UnavailableService;

#[async_trait]
impl ServiceCaller for UnavailableService {
    async fn call<'a>(
        &self,
        request: ServiceRequest<'a>,
    ) -> Result<ServiceResponse, ServiceCallError> {
        Err(ServiceCallError::unavailable(
            request.service_name,
            "connection refused",
        ))
    }
}

const ACCOUNTS_NAMES_OPERATION: &str =
    "query($representations:[_Any!]!){_entities(representations:$representations){...on User{name{first last}}}}";

fn local_subgraphs() -> ServiceCallerMap {
    let mut callers = ServiceCallerMap::new();
    callers.insert(
        "reviews",
        LocalSubgraph::new(fixtures::reviews::get_subgraph()),
    );
    callers.insert(
        "accounts",
        LocalSubgraph::new(fixtures::accounts::get_subgraph()),
    );
    callers
}

fn user_keys() -> Value {
    json!([{
        "kind": "InlineFragment",
        "typeCondition": "User",
        "selections": [
            {"kind": "Field", "name": "__typename"},
            {"kind": "Field", "name": "id"}
        ]
    }])
}

fn authors_fetch() -> Value {
    json!({
        "kind": "Flatten",
        "path": ["topReviews", "@", "author"],
        "node": {
            "kind": "Fetch",
            "serviceName": "accounts",
            "requires": user_keys(),
            "operation": ACCOUNTS_NAMES_OPERATION
        }
    })
}

fn reviews_fetch(operation: &str, variable_usages: &[&str]) -> Value {
    json!({
        "kind": "Fetch",
        "serviceName": "reviews",
        "variableUsages": variable_usages,
        "operation": operation
    })
}

/// `topReviews { body author @<directive>(if: <condition>) { name { first last } } }`
fn conditional_author_plan(directive: &str, condition: Value) -> QueryPlan {
    let (operation, usages): (String, Vec<&str>) = match &condition {
        Value::String(variable) => (
            format!(
                "query($condition:Boolean!){{topReviews{{body author@{}(if:$condition){{__typename id}}}}}}",
                directive
            ),
            vec![variable.as_str()],
        ),
        literal => (
            format!(
                "{{topReviews{{body author@{}(if:{}){{__typename id}}}}}}",
                directive, literal
            ),
            vec![],
        ),
    };

    serde_json::from_value(json!({
        "kind": "QueryPlan",
        "node": {
            "kind": "Sequence",
            "nodes": [
                reviews_fetch(&operation, &usages),
                {
                    "kind": "Condition",
                    "directive": directive,
                    "condition": condition,
                    "ifClause": authors_fetch()
                }
            ]
        },
        "variableDefinitions": [{"name": "condition", "nonNull": true}]
    }))
    .unwrap()
}

fn variables(value: Value) -> Option<Variables> {
    Some(serde_json::from_value(value).unwrap())
}

async fn run(
    plan: &QueryPlan,
    callers: &ServiceCallerMap,
    variables: Option<Variables>,
) -> (Result<ExecutionResult, PlanExecutionError>, ServiceCallLog) {
    run_with(
        plan,
        callers,
        variables,
        &ExecutionOptions::default(),
        &CancellationToken::new(),
    )
    .await
}

async fn run_with(
    plan: &QueryPlan,
    callers: &ServiceCallerMap,
    variables: Option<Variables>,
    options: &ExecutionOptions,
    cancellation_token: &CancellationToken,
) -> (Result<ExecutionResult, PlanExecutionError>, ServiceCallLog) {
    let log = ServiceCallLog::new();
    let result = execute_query_plan(
        plan,
        callers,
        variables,
        options,
        Some(&log),
        cancellation_token,
    )
    .await;
    (result, log)
}

fn bodies_only() -> Value {
    json!({
        "topReviews": [
            {"body": "Love it!"},
            {"body": "Too expensive."},
            {"body": "Could be better."},
            {"body": "Prefer something else."},
            {"body": "Wish I had read this before."}
        ]
    })
}

fn author_names(result: &ExecutionResult) -> Vec<Option<(String, String)>> {
    result.data["topReviews"]
        .as_array()
        .unwrap()
        .iter()
        .map(|review| {
            let name = &review["author"]["name"];
            Some((
                name["first"].as_str()?.to_string(),
                name["last"].as_str()?.to_string(),
            ))
        })
        .collect()
}

fn expected_author_names() -> Vec<Option<(String, String)>> {
    [
        ("Ada", "Lovelace"),
        ("Ada", "Lovelace"),
        ("Alan", "Turing"),
        ("Alan", "Turing"),
        ("Alan", "Turing"),
    ]
    .into_iter()
    .map(|(first, last)| Some((first.to_string(), last.to_string())))
    .collect()
}

#[tokio::test]
async fn skip_true_omits_author_and_never_calls_accounts() {
    let callers = local_subgraphs();
    let plan = conditional_author_plan("skip", json!(true));

    let (result, log) = run(&plan, &callers, variables(json!({"condition": true}))).await;
    let result = result.unwrap();

    assert_eq!(result.data, bodies_only());
    assert!(!result.has_errors());
    assert_eq!(log.call_count("reviews"), 1);
    assert_eq!(log.call_count("accounts"), 0);
}

#[tokio::test]
async fn skip_false_resolves_author_names_through_accounts() {
    let callers = local_subgraphs();
    let plan = conditional_author_plan("skip", json!(false));

    let (result, log) = run(&plan, &callers, variables(json!({"condition": false}))).await;
    let result = result.unwrap();

    assert!(!result.has_errors(), "{:?}", result.errors);
    assert_eq!(author_names(&result), expected_author_names());
    assert_eq!(log.call_count("accounts"), 1);
    assert_eq!(log.called_services(), vec!["accounts", "reviews"]);
}

#[tokio::test]
async fn variable_conditions_behave_like_literals() {
    let callers = local_subgraphs();

    for directive in ["skip", "include"] {
        for value in [true, false] {
            let literal = conditional_author_plan(directive, json!(value));
            let variable = conditional_author_plan(directive, json!("condition"));
            let provided = json!({"condition": value});

            let (from_literal, literal_log) =
                run(&literal, &callers, variables(provided.clone())).await;
            let (from_variable, variable_log) =
                run(&variable, &callers, variables(provided)).await;

            assert_eq!(from_literal.unwrap(), from_variable.unwrap());
            assert_eq!(
                literal_log.call_count("accounts"),
                variable_log.call_count("accounts")
            );
        }
    }
}

#[tokio::test]
async fn include_false_never_calls_accounts() {
    let callers = local_subgraphs();
    let plan = conditional_author_plan("include", json!("condition"));

    let (result, log) = run(&plan, &callers, variables(json!({"condition": false}))).await;

    assert_eq!(result.unwrap().data, bodies_only());
    assert!(!log.was_called("accounts"));
}

#[tokio::test]
async fn absent_non_null_variable_only_fails_the_nodes_using_it() {
    let callers = local_subgraphs();
    let plan: QueryPlan = serde_json::from_value(json!({
        "kind": "QueryPlan",
        "node": {
            "kind": "Sequence",
            "nodes": [
                reviews_fetch("{topReviews{body}}", &[]),
                {
                    "kind": "Condition",
                    "condition": "withAuthor",
                    "ifClause": authors_fetch()
                }
            ]
        },
        "variableDefinitions": [{"name": "withAuthor", "nonNull": true}]
    }))
    .unwrap();

    let (result, log) = run(&plan, &callers, None).await;
    let result = result.unwrap();

    assert_eq!(result.data, bodies_only());
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors_with_code(MISSING_VARIABLE).count(), 1);
    assert_eq!(log.called_services(), vec!["reviews"]);
}

#[tokio::test]
async fn fetch_using_an_absent_non_null_variable_fails_alone() {
    let mut callers = local_subgraphs();
    callers.insert(
        "products",
        StaticService::new(json!({"data": {"topProducts": [{"upc": "1"}]}})),
    );
    let plan: QueryPlan = serde_json::from_value(json!({
        "node": {
            "kind": "Parallel",
            "nodes": [
                reviews_fetch("query($first:Int!){topReviews(first:$first){body}}", &["first"]),
                {"kind": "Fetch", "serviceName": "products", "operation": "{topProducts{upc}}"}
            ]
        },
        "variableDefinitions": [{"name": "first", "nonNull": true}]
    }))
    .unwrap();

    let (result, log) = run(&plan, &callers, None).await;
    let result = result.unwrap();

    assert_eq!(result.data, json!({"topProducts": [{"upc": "1"}]}));
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].code(), Some(MISSING_VARIABLE));
    assert!(!log.was_called("reviews"));
}

#[tokio::test]
async fn undefined_condition_variable_only_fails_its_subtree() {
    let callers = local_subgraphs();
    let plan: QueryPlan = serde_json::from_value(json!({
        "node": {
            "kind": "Sequence",
            "nodes": [
                reviews_fetch("{topReviews{body}}", &[]),
                {
                    "kind": "Condition",
                    "condition": "withAuthor",
                    "ifClause": authors_fetch()
                }
            ]
        }
    }))
    .unwrap();

    let (result, log) = run(&plan, &callers, None).await;
    let result = result.unwrap();

    assert_eq!(result.data, bodies_only());
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].code(), Some(MISSING_VARIABLE));
    assert!(!log.was_called("accounts"));
}

#[tokio::test]
async fn flatten_over_an_empty_list_dispatches_nothing() {
    let mut callers = local_subgraphs();
    callers.insert(
        "reviews",
        StaticService::new(json!({"data": {"topReviews": []}})),
    );
    let plan = conditional_author_plan("include", json!(true));

    let (result, log) = run(&plan, &callers, variables(json!({"condition": true}))).await;
    let result = result.unwrap();

    assert_eq!(result.data, json!({"topReviews": []}));
    assert!(!result.has_errors());
    assert_eq!(log.call_count("accounts"), 0);
}

#[tokio::test]
async fn parallel_results_do_not_depend_on_completion_order() {
    let plan: QueryPlan = serde_json::from_value(json!({
        "node": {
            "kind": "Parallel",
            "nodes": [
                {"kind": "Fetch", "serviceName": "products", "operation": "{topProducts{upc}}"},
                {"kind": "Fetch", "serviceName": "reviews", "operation": "{topReviews{body}}"}
            ]
        }
    }))
    .unwrap();
    let products = json!({"data": {"topProducts": [{"upc": "1"}, {"upc": "2"}]}});
    let reviews = json!({"data": {"topReviews": [{"body": "Love it!"}]}});

    let mut products_first = ServiceCallerMap::new();
    products_first.insert("products", StaticService::new(products.clone()));
    products_first.insert(
        "reviews",
        StaticService::new(reviews.clone()).with_delay(Duration::from_millis(30)),
    );

    let mut reviews_first = ServiceCallerMap::new();
    reviews_first.insert(
        "products",
        StaticService::new(products).with_delay(Duration::from_millis(30)),
    );
    reviews_first.insert("reviews", StaticService::new(reviews));

    let (first, _) = run(&plan, &products_first, None).await;
    let (second, _) = run(&plan, &reviews_first, None).await;

    assert_eq!(first.unwrap(), second.unwrap());
}

#[tokio::test]
async fn parallel_errors_are_listed_in_plan_order() {
    let plan: QueryPlan = serde_json::from_value(json!({
        "node": {
            "kind": "Parallel",
            "nodes": [
                {"kind": "Fetch", "serviceName": "a", "operation": "{a}"},
                {"kind": "Fetch", "serviceName": "b", "operation": "{b}"}
            ]
        }
    }))
    .unwrap();
    let failure = |message: &str| json!({"data": null, "errors": [{"message": message}]});

    let mut a_last = ServiceCallerMap::new();
    a_last.insert(
        "a",
        StaticService::new(failure("a failed")).with_delay(Duration::from_millis(30)),
    );
    a_last.insert("b", StaticService::new(failure("b failed")));

    let mut b_last = ServiceCallerMap::new();
    b_last.insert("a", StaticService::new(failure("a failed")));
    b_last.insert(
        "b",
        StaticService::new(failure("b failed")).with_delay(Duration::from_millis(30)),
    );

    for callers in [a_last, b_last] {
        let (result, _) = run(&plan, &callers, None).await;
        let messages: Vec<String> = result
            .unwrap()
            .errors
            .into_iter()
            .map(|error| error.message)
            .collect();
        assert_eq!(messages, vec!["a failed", "b failed"]);
    }
}

#[tokio::test]
async fn failing_parallel_sibling_leaves_one_path_scoped_error() {
    let mut callers = local_subgraphs();
    callers.insert("inventory", UnavailableService);
    let plan: QueryPlan = serde_json::from_value(json!({
        "node": {
            "kind": "Sequence",
            "nodes": [
                reviews_fetch("{topReviews{__typename id body author{__typename id}}}", &[]),
                {
                    "kind": "Parallel",
                    "nodes": [
                        authors_fetch(),
                        {
                            "kind": "Flatten",
                            "path": ["topReviews", "@"],
                            "node": {
                                "kind": "Fetch",
                                "serviceName": "inventory",
                                "requires": [{
                                    "kind": "InlineFragment",
                                    "typeCondition": "Review",
                                    "selections": [
                                        {"kind": "Field", "name": "__typename"},
                                        {"kind": "Field", "name": "id"}
                                    ]
                                }],
                                "operation": "query($representations:[_Any!]!){_entities(representations:$representations){...on Review{inStock}}}"
                            }
                        }
                    ]
                }
            ]
        }
    }))
    .unwrap();

    let (result, log) = run(&plan, &callers, None).await;
    let result = result.unwrap();

    assert_eq!(author_names(&result), expected_author_names());
    assert_eq!(result.errors.len(), 1);
    let error = &result.errors[0];
    assert_eq!(error.code(), Some(SUBGRAPH_UNAVAILABLE));
    assert_eq!(error.service_name(), Some("inventory"));
    assert_eq!(
        error.path.as_ref().map(ToString::to_string),
        Some("topReviews".to_string())
    );
    assert_eq!(log.call_count("inventory"), 1);
}

#[tokio::test]
async fn entity_errors_point_at_the_failing_entity() {
    let mut callers = local_subgraphs();
    callers.insert(
        "reviews",
        StaticService::new(json!({"data": {"topReviews": [
            {"body": "Love it!", "author": {"__typename": "User", "id": "1"}},
            {"body": "Who wrote this?", "author": {"__typename": "User", "id": "3"}}
        ]}})),
    );
    callers.insert(
        "accounts",
        StaticService::new(json!({
            "data": {"_entities": [{"name": {"first": "Ada", "last": "Lovelace"}}, null]},
            "errors": [{"message": "User 3 not found", "path": ["_entities", 1]}]
        })),
    );
    let plan = conditional_author_plan("include", json!(true));

    let (result, _) = run(&plan, &callers, variables(json!({"condition": true}))).await;
    let result = result.unwrap();

    assert_eq!(
        result.data["topReviews"][0]["author"]["name"]["first"],
        json!("Ada")
    );
    assert_eq!(result.data["topReviews"][1]["author"].get("name"), None);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(
        result.errors[0].path.as_ref().map(ToString::to_string),
        Some("topReviews.1.author".to_string())
    );
    assert_eq!(result.errors[0].service_name(), Some("accounts"));
    assert_eq!(result.errors[0].code(), Some("DOWNSTREAM_SERVICE_ERROR"));
}

#[tokio::test]
async fn entity_count_mismatch_is_a_malformed_response() {
    let mut callers = local_subgraphs();
    callers.insert(
        "accounts",
        StaticService::new(json!({"data": {"_entities": [{"name": {"first": "Ada", "last": "Lovelace"}}]}})),
    );
    let plan = conditional_author_plan("include", json!(true));

    let (result, _) = run(&plan, &callers, variables(json!({"condition": true}))).await;
    let result = result.unwrap();

    assert!(author_names(&result).iter().all(Option::is_none));
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].code(), Some(SUBGRAPH_MALFORMED_RESPONSE));
    assert_eq!(
        result.errors[0].path.as_ref().map(ToString::to_string),
        Some("topReviews".to_string())
    );
}

#[tokio::test]
async fn conflicting_writes_abort_the_execution() {
    let mut callers = local_subgraphs();
    callers.insert(
        "reviews-copy",
        StaticService::new(json!({"data": {"topReviews": [
            {"body": "Hate it!"}, {}, {}, {}, {}
        ]}})),
    );
    let plan: QueryPlan = serde_json::from_value(json!({
        "node": {
            "kind": "Sequence",
            "nodes": [
                reviews_fetch("{topReviews{body}}", &[]),
                {"kind": "Fetch", "serviceName": "reviews-copy", "operation": "{topReviews{body}}"}
            ]
        }
    }))
    .unwrap();

    let (result, _) = run(&plan, &callers, None).await;

    let PlanExecutionError::MergeConflict(conflict) = result.unwrap_err();
    assert_eq!(conflict.path.to_string(), "topReviews.0.body");
}

#[tokio::test]
async fn cancellation_returns_partial_data_with_a_root_error() {
    let mut callers = local_subgraphs();
    callers.insert(
        "accounts",
        LocalSubgraph::new(fixtures::accounts::get_subgraph()).with_delay(Duration::from_secs(30)),
    );
    let plan = conditional_author_plan("include", json!(true));
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let (result, log) = run_with(
        &plan,
        &callers,
        variables(json!({"condition": true})),
        &ExecutionOptions::default(),
        &token,
    )
    .await;
    let result = result.unwrap();

    assert_eq!(result.data["topReviews"][0]["body"], json!("Love it!"));
    assert!(author_names(&result).iter().all(Option::is_none));
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].code(), Some(EXECUTION_CANCELLED));
    assert_eq!(result.errors[0].path, None);
    assert_eq!(log.call_count("accounts"), 1);
}

#[tokio::test]
async fn timeout_returns_partial_data_with_a_root_error() {
    let mut callers = local_subgraphs();
    callers.insert(
        "accounts",
        LocalSubgraph::new(fixtures::accounts::get_subgraph()).with_delay(Duration::from_secs(30)),
    );
    let plan = conditional_author_plan("include", json!(true));
    let options = ExecutionOptions {
        timeout: Some(Duration::from_millis(100)),
        ..ExecutionOptions::default()
    };

    let (result, _) = run_with(
        &plan,
        &callers,
        variables(json!({"condition": true})),
        &options,
        &CancellationToken::new(),
    )
    .await;
    let result = result.unwrap();

    assert_eq!(result.data["topReviews"][4]["body"], json!("Wish I had read this before."));
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].code(), Some(EXECUTION_TIMEOUT));
}

#[tokio::test]
async fn unknown_service_is_reported_as_unavailable() {
    let callers = ServiceCallerMap::new();
    let plan: QueryPlan = serde_json::from_value(json!({
        "node": {"kind": "Fetch", "serviceName": "reviews", "operation": "{topReviews{body}}"}
    }))
    .unwrap();

    let (result, log) = run(&plan, &callers, None).await;
    let result = result.unwrap();

    assert_eq!(result.data, Value::Null);
    assert_eq!(result.errors[0].code(), Some(SUBGRAPH_UNAVAILABLE));
    assert_eq!(log.call_count("reviews"), 1);
}
