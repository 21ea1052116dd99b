mod logger;

use std::{env, error::Error, process};

use federation_executor_config::{load_config, ExecutorConfig};
use federation_plan_executor::{
    execute_query_plan, variables::Variables, ExecutionOptions, HttpServiceCaller, QueryPlan,
    ServiceCallLog, ServiceCallerMap,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::logger::configure_logging;

const USAGE: &str = "Usage:
  plan-exec-cli print <plan.json>
  plan-exec-cli execute <plan.json> [variables.json] [--config <path>]";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let mut args: Vec<String> = env::args().skip(1).collect();
    let config_path = take_flag(&mut args, "--config");

    let (Some(command), Some(plan_path)) = (args.first(), args.get(1)) else {
        eprintln!("{}", USAGE);
        process::exit(1);
    };

    match command.as_str() {
        "print" => {
            let plan = read_plan(plan_path)?;
            println!("{}", plan);
        }
        "execute" => {
            let config = load_config(config_path)?;
            configure_logging(&config.log)?;

            let plan = read_plan(plan_path)?;
            let variables = args.get(2).map(|path| read_variables(path)).transpose()?;
            execute(&config, &plan, variables).await?;
        }
        _ => {
            eprintln!("Unknown command '{}'.\n{}", command, USAGE);
            process::exit(1);
        }
    }

    Ok(())
}

async fn execute(
    config: &ExecutorConfig,
    plan: &QueryPlan,
    variables: Option<Variables>,
) -> Result<(), Box<dyn Error>> {
    let http_client = reqwest::Client::builder().build()?;
    let mut callers = ServiceCallerMap::new();
    for (service_name, subgraph) in &config.subgraphs {
        debug!(service = %service_name, url = %subgraph.url, "registering subgraph");
        callers.insert(
            service_name.clone(),
            HttpServiceCaller::new(
                subgraph.url.clone(),
                http_client.clone(),
                Some(subgraph.timeout),
            ),
        );
    }

    let plan_services = plan.node.as_ref().map(|node| node.service_names());
    for service_name in plan_services.unwrap_or_default() {
        if !callers.contains(service_name) {
            warn!(service = %service_name, "plan uses a subgraph missing from the configuration");
        }
    }

    let options = ExecutionOptions {
        timeout: config.execution.timeout,
        dedupe_representations: config.execution.dedupe_representations,
    };
    let call_log = ServiceCallLog::new();
    let cancellation_token = CancellationToken::new();

    let ctrl_c_token = cancellation_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_token.cancel();
        }
    });

    let result = execute_query_plan(
        plan,
        &callers,
        variables,
        &options,
        Some(&call_log),
        &cancellation_token,
    )
    .await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    eprintln!("Called services: {}", call_log.called_services().join(", "));

    Ok(())
}

fn read_plan(path: &str) -> Result<QueryPlan, Box<dyn Error>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("Unable to read plan file '{}': {}", path, e))?;
    Ok(serde_json::from_str(&raw)?)
}

fn read_variables(path: &str) -> Result<Variables, Box<dyn Error>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("Unable to read variables file '{}': {}", path, e))?;
    Ok(serde_json::from_str(&raw)?)
}

/// Removes `name <value>` from `args` and returns the value.
fn take_flag(args: &mut Vec<String>, name: &str) -> Option<String> {
    let index = args.iter().position(|arg| arg == name)?;
    args.remove(index);
    (index < args.len()).then(|| args.remove(index))
}
