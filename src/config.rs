use crate::engine::DEFAULT_STEP_LIMIT;
use crate::flow::FlowDefinition;
use anyhow::Error;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser, Debug)]
#[command(version)]
pub struct Cli {
    #[clap(long, default_value = "ivrflow.toml")]
    pub conf: Option<String>,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load the configuration and the flow file, report errors and exit.
    CheckConfig,
    /// Run one call through the flow, answering turns with the given digits.
    Simulate {
        /// Call id; a random one is used when omitted.
        #[clap(long)]
        call: Option<String>,
        /// Digits for each turn after the first, e.g. `1 1 3`.
        digits: Vec<String>,
    },
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub log_file: Option<String>,
    /// Path of the TOML flow file.
    pub flow: String,
    pub step_limit: usize,
    /// State a call moves to when a turn fails.
    pub fallback_state: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            log_file: None,
            flow: "config/ivr/gorillas.toml".to_string(),
            step_limit: DEFAULT_STEP_LIMIT,
            fallback_state: None,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self, Error> {
        let config: Config = toml::from_str(
            &std::fs::read_to_string(path).map_err(|e| anyhow::anyhow!("{}: {}", e, path))?,
        )?;
        config.validate().map_err(|e| anyhow::anyhow!("{}: {}", path, e))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.step_limit == 0 {
            return Err(anyhow::anyhow!("step_limit must be at least 1"));
        }
        Ok(())
    }

    /// Settings that refer to states must name states of `flow`.
    pub fn check_flow(&self, flow: &FlowDefinition) -> Result<(), Error> {
        if let Some(fallback) = &self.fallback_state {
            if flow.state(fallback).is_none() {
                return Err(anyhow::anyhow!(
                    "fallback_state '{}' is not a state of flow '{}'",
                    fallback,
                    flow.name()
                ));
            }
        }
        Ok(())
    }
}
