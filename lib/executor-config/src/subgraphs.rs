use std::{collections::BTreeMap, time::Duration};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Subgraphs by the service name plans refer to them with.
pub type SubgraphsConfig = BTreeMap<String, SubgraphConfig>;

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SubgraphConfig {
    /// The GraphQL endpoint of the subgraph.
    pub url: String,

    /// How long a single request to the subgraph may take (e.g. `30s`).
    /// A request running longer fails with `SUBGRAPH_TIMEOUT`.
    #[serde(
        default = "default_subgraph_timeout",
        deserialize_with = "humantime_serde::deserialize",
        serialize_with = "humantime_serde::serialize"
    )]
    #[schemars(with = "String")]
    pub timeout: Duration,
}

fn default_subgraph_timeout() -> Duration {
    Duration::from_secs(30)
}
