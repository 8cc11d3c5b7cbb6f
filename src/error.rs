//! Error taxonomy for flow definitions and response cycles.

use thiserror::Error;

/// Raised while building a [`FlowDefinition`](crate::flow::FlowDefinition).
/// Any of these aborts the build.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("flow '{0}' declares no states")]
    EmptyFlow(String),
    #[error("state '{0}' is declared more than once")]
    DuplicateState(String),
    #[error("state '{state}' binds key '{key}' more than once")]
    DuplicateKey { state: String, key: String },
    #[error("state '{state}': invalid key pattern '{pattern}': {reason}")]
    InvalidKeyPattern {
        state: String,
        pattern: String,
        reason: String,
    },
    #[error("state '{state}': decision '{decider}' needs at least one yes/no transition")]
    MissingOutcome { state: String, decider: String },
    #[error("state '{state}': event '{event}' has no target state")]
    MissingTarget { state: String, event: String },
    #[error("state '{state}': '{name}' references unknown state '{target}'")]
    UnknownTarget {
        state: String,
        name: String,
        target: String,
    },
}

/// A decider (or inline side effect) replied with something that is not
/// one of `true`, `false`, `"yes"`, `"no"` or null.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("can't decide '{decider}' in state '{state}': unrecognized outcome {outcome}")]
pub struct DecisionError {
    pub decider: String,
    pub state: String,
    pub outcome: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("no key bindings for state '{0}'")]
    NoKeyBindings(String),
    #[error("state '{0}' is not part of flow '{1}'")]
    UnknownState(String, String),
}

#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("callback '{0}' is not registered")]
    Unknown(String),
    #[error("callback '{name}' failed: {source}")]
    Failed {
        name: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("callback '{name}' returned {value}, expected {expected}")]
    UnexpectedReply {
        name: String,
        value: String,
        expected: &'static str,
    },
}

/// Everything a response cycle can fail with.
#[derive(Debug, Error)]
pub enum IvrError {
    #[error(transparent)]
    Definition(#[from] DefinitionError),
    #[error(transparent)]
    Decision(#[from] DecisionError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Callback(#[from] CallbackError),
    #[error("decision cascade exceeded step limit of {0}")]
    StepLimit(usize),
}

pub type Result<T, E = IvrError> = std::result::Result<T, E>;
