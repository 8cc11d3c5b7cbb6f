//! Flow file structures.
//!
//! Parsed from `config/ivr/{name}.toml` files. A file declares one complete
//! flow; states are listed in order and the first one is the initial state.
//!
//! # Example
//!
//! ```toml
//! [flow]
//! name = "gorillas"
//!
//! [flow.translations]
//! "ivr.goodbye" = "Goodbye, primate"
//!
//! [flow.callbacks]
//! "tired?" = false
//!
//! [[flow.states]]
//! name = "hello"
//! say = ["Twilio Gorillas. Wasssaaap!"]
//!
//! [[flow.states.keys]]
//! key = "1"
//! prompt = "If you are a jungle-dweller, press 1"
//! event = "primal"
//! go = "jungle_dweller"
//! ```

use super::builder::{Binding, FlowBuilder};
use super::{FlowDefinition, PromptFragment};
use crate::callbacks::StaticCallbacks;
use crate::error::DefinitionError;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// Top-level wrapper for the TOML file (`[flow]` table).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FlowFile {
    pub flow: FlowSpec,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FlowSpec {
    pub name: String,
    #[serde(default)]
    pub translations: HashMap<String, String>,
    /// Constant callback replies, e.g. for simulations.
    #[serde(default)]
    pub callbacks: HashMap<String, Value>,
    #[serde(default)]
    pub states: Vec<StateSpec>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StateSpec {
    pub name: String,
    #[serde(default)]
    pub say: Vec<PromptFragment>,
    #[serde(default)]
    pub keys: Vec<KeySpec>,
    #[serde(default)]
    pub decisions: Vec<DecisionSpec>,
}

/// A key binding. With `yes`/`no` the `event` names the decider.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KeySpec {
    pub key: String,
    pub event: String,
    /// Appended to the state's prompts.
    #[serde(default)]
    pub prompt: Option<PromptFragment>,
    #[serde(default)]
    pub go: Option<String>,
    #[serde(default)]
    pub yes: Option<String>,
    #[serde(default)]
    pub no: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
}

/// A decision evaluated when the state is entered.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DecisionSpec {
    pub decider: String,
    #[serde(default)]
    pub yes: Option<String>,
    #[serde(default)]
    pub no: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
}

impl KeySpec {
    fn binding(&self) -> Binding {
        Binding {
            go: self.go.clone(),
            yes: self.yes.clone(),
            no: self.no.clone(),
            action: self.action.clone(),
            press: None,
        }
    }
}

impl DecisionSpec {
    fn binding(&self) -> Binding {
        Binding {
            go: None,
            yes: self.yes.clone(),
            no: self.no.clone(),
            action: self.action.clone(),
            press: None,
        }
    }
}

impl FlowFile {
    /// Read and parse a flow file. The flow is validated before returning.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("{}: {}", e, path.display()))?;
        let file: FlowFile =
            toml::from_str(&content).map_err(|e| anyhow!("{}: {}", path.display(), e))?;
        file.definition()
            .map_err(|e| anyhow!("{}: {}", path.display(), e))?;
        Ok(file)
    }

    pub fn definition(&self) -> Result<FlowDefinition, DefinitionError> {
        let mut builder = FlowBuilder::new(self.flow.name.clone())
            .translations(self.flow.translations.clone());
        for state in &self.flow.states {
            builder = builder.state(state.name.clone(), |s| {
                if !state.say.is_empty() {
                    s.say(state.say.iter().cloned());
                }
                for key in &state.keys {
                    match &key.prompt {
                        Some(prompt) => s.prompt(&key.key, prompt.clone(), &key.event, key.binding()),
                        None => s.press(&key.key, &key.event, key.binding()),
                    };
                }
                for decision in &state.decisions {
                    s.decide(&decision.decider, decision.binding());
                }
            });
        }
        builder.build()
    }

    pub fn callbacks(&self) -> StaticCallbacks {
        StaticCallbacks::new(self.flow.callbacks.clone())
    }
}
