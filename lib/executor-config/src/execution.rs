use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ExecutionConfig {
    /// Upper bound for executing a whole plan, in a human readable format
    /// (e.g. `500ms`, `5s`). Once elapsed, in-flight fetches are abandoned and
    /// the data merged so far is returned with an `EXECUTION_TIMEOUT` error.
    ///
    /// Not set by default. Can also be set via the `EXECUTION_TIMEOUT` environment variable.
    #[serde(
        default,
        with = "humantime_serde",
        skip_serializing_if = "Option::is_none"
    )]
    #[schemars(with = "Option<String>")]
    pub timeout: Option<Duration>,

    /// Sends identical entity representations only once per fetch, and
    /// fans the resolved entity out to every position it was referenced from.
    #[serde(default = "default_dedupe_representations")]
    pub dedupe_representations: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            dedupe_representations: default_dedupe_representations(),
        }
    }
}

fn default_dedupe_representations() -> bool {
    true
}
