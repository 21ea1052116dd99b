mod env_overrides;
pub mod execution;
pub mod log;
pub mod subgraphs;

use std::convert::Infallible;
use std::path::PathBuf;

use config::{Config, File, FileFormat, FileSourceFile};
use envconfig::Envconfig;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub use crate::env_overrides::EnvVarOverridesError;
use crate::{
    env_overrides::EnvVarOverrides, execution::ExecutionConfig, log::LoggingConfig,
    subgraphs::SubgraphsConfig,
};

#[derive(Debug, Default, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ExecutorConfig {
    /// The logger configuration.
    ///
    /// By default only important messages, warnings and errors are printed (`info`).
    #[serde(default)]
    pub log: LoggingConfig,

    /// Configuration of plan execution.
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// The subgraphs plans are executed against, by service name.
    #[serde(default)]
    pub subgraphs: SubgraphsConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutorConfigError {
    #[error("Failed to load configuration: {0}")]
    ConfigLoadError(#[from] config::ConfigError),
    #[error("Failed to apply configuration overrides: {0}")]
    EnvVarOverridesError(#[from] EnvVarOverridesError),
    #[error("Failed to load the environment variables: {0}")]
    EnvVarLoadError(#[from] envconfig::Error),
    #[error("Failed to parse the configuration file path: {0}")]
    ConfigPathParseError(Infallible),
}

static DEFAULT_FILE_NAMES: &[&str] = &[
    "executor.config.yaml",
    "executor.config.yml",
    "executor.config.json",
];

/// Loads the configuration from `override_config_path`, or from the first
/// `executor.config.*` file of the working directory, and applies the
/// environment overrides on top.
pub fn load_config(
    override_config_path: Option<String>,
) -> Result<ExecutorConfig, ExecutorConfigError> {
    let env_overrides = EnvVarOverrides::init_from_env()?;
    let mut config = Config::builder();

    if let Some(path_str) = override_config_path {
        let path_buf = path_str
            .parse::<PathBuf>()
            .map_err(ExecutorConfigError::ConfigPathParseError)?;
        let as_file: File<FileSourceFile, _> = path_buf.into();

        config = config.add_source(as_file.required(true));
    } else {
        for name in DEFAULT_FILE_NAMES {
            config = config.add_source(File::with_name(name).required(false));
        }
    }

    config = env_overrides.apply_overrides(config)?;

    Ok(config.build()?.try_deserialize::<ExecutorConfig>()?)
}

pub fn parse_yaml_config(config_raw: &str) -> Result<ExecutorConfig, ExecutorConfigError> {
    Config::builder()
        .add_source(File::from_str(config_raw, FileFormat::Yaml))
        .build()?
        .try_deserialize::<ExecutorConfig>()
        .map_err(ExecutorConfigError::ConfigLoadError)
}
