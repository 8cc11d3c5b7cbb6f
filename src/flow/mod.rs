//! Declarative call-flow definitions.
//!
//! A [`FlowDefinition`] is an ordered set of [`State`]s. Each state owns the
//! prompt fragments spoken on entry, the keys it accepts and the decisions it
//! evaluates on its own. Definitions are built once through
//! [`FlowBuilder`] (or a TOML flow file) and are immutable afterwards, so a
//! single definition can be shared by every concurrent call.
//!
//! ```text
//! hello ──1──▶ jungle_dweller ──1 (tired?)──yes──▶ alpha_rating ──.5──▶ goodbye
//!   │                                                     │
//!   └──9──────────────────────────────────────────────────┴──9──▶ jungle_dweller
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

mod builder;
pub mod flow_config;
pub mod keys;

pub use builder::{Binding, FlowBuilder, StateBuilder};
pub use keys::{DigitLimit, Digits, GatherSpec, KeyPattern};

/// One piece of what a state says.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PromptFragment {
    Text(String),
    /// Text produced at run time by the named callback.
    Dynamic { call: String },
}

impl PromptFragment {
    pub fn text(text: impl Into<String>) -> Self {
        PromptFragment::Text(text.into())
    }

    pub fn call(name: impl Into<String>) -> Self {
        PromptFragment::Dynamic { call: name.into() }
    }
}

impl From<&str> for PromptFragment {
    fn from(text: &str) -> Self {
        PromptFragment::text(text)
    }
}

impl From<String> for PromptFragment {
    fn from(text: String) -> Self {
        PromptFragment::Text(text)
    }
}

/// A named transition fired by a key press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub name: String,
    pub target: String,
    /// Explicit side effect. Without one, an action registered under the
    /// event's own name runs instead, if there is one.
    pub action: Option<String>,
}

impl Event {
    pub fn describe(&self) -> String {
        format!("{} to {}", self.name, self.target)
    }
}

/// A yes/no/indeterminate branch driven by a decider callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub decider: String,
    /// Runs before the decider; a reply other than null/false is used as
    /// the outcome.
    pub action: Option<String>,
    pub on_yes: Option<String>,
    pub on_no: Option<String>,
}

impl Decision {
    pub fn describe(&self) -> String {
        format!(
            "{} yes: {} no: {}",
            self.decider,
            self.on_yes.as_deref().unwrap_or(""),
            self.on_no.as_deref().unwrap_or("")
        )
    }

    /// Event name used for logging the chosen path, e.g. `tired?_yes`.
    pub fn event_name_for(&self, outcome: Outcome) -> String {
        format!("{}_{}", self.decider, outcome)
    }

    /// Target state for an outcome; `None` means no transition.
    pub fn target_for(&self, outcome: Outcome) -> Option<&str> {
        match outcome {
            Outcome::Yes => self.on_yes.as_deref(),
            Outcome::No => self.on_no.as_deref(),
            Outcome::Indeterminate => None,
        }
    }
}

/// Result of asking a decider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Yes,
    No,
    Indeterminate,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Yes => write!(f, "yes"),
            Outcome::No => write!(f, "no"),
            Outcome::Indeterminate => write!(f, "indeterminate"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Event(Event),
    Decision(Decision),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBinding {
    pub pattern: KeyPattern,
    pub transition: Transition,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct State {
    pub name: String,
    pub prompts: Vec<PromptFragment>,
    /// Key map in registration order; patterns are tried in this order.
    pub keys: Vec<KeyBinding>,
    pub decisions: Vec<Decision>,
}

impl State {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prompts: Vec::new(),
            keys: Vec::new(),
            decisions: Vec::new(),
        }
    }

    pub fn binding(&self, pattern: &KeyPattern) -> Option<&KeyBinding> {
        self.keys.iter().find(|b| &b.pattern == pattern)
    }

    /// States without prompts exist only to decide and fall through.
    pub fn is_silent(&self) -> bool {
        self.prompts.is_empty()
    }

    /// Every target this state can move to, with the event or decider that
    /// leads there.
    pub(crate) fn targets(&self) -> Vec<(String, &str)> {
        let mut targets = Vec::new();
        for binding in &self.keys {
            match &binding.transition {
                Transition::Event(ev) => targets.push((ev.name.clone(), ev.target.as_str())),
                Transition::Decision(d) => push_decision_targets(d, &mut targets),
            }
        }
        for decision in &self.decisions {
            push_decision_targets(decision, &mut targets);
        }
        targets
    }
}

fn push_decision_targets<'a>(d: &'a Decision, targets: &mut Vec<(String, &'a str)>) {
    for (outcome, target) in [(Outcome::Yes, &d.on_yes), (Outcome::No, &d.on_no)] {
        if let Some(target) = target {
            targets.push((d.event_name_for(outcome), target.as_str()));
        }
    }
}

/// An immutable call flow. The first declared state is where every new
/// session starts.
#[derive(Debug, Clone)]
pub struct FlowDefinition {
    name: String,
    states: Vec<State>,
    index: HashMap<String, usize>,
    translations: HashMap<String, String>,
}

impl FlowDefinition {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn initial_state(&self) -> &State {
        // build() rejects flows without states
        &self.states[0]
    }

    pub fn state(&self, name: &str) -> Option<&State> {
        self.index.get(name).map(|&i| &self.states[i])
    }

    pub fn states(&self) -> impl Iterator<Item = &State> {
        self.states.iter()
    }

    /// Literal prompts starting with `ivr.` are translation keys; unknown
    /// keys and plain text are spoken as written.
    pub fn translate<'a>(&'a self, text: &'a str) -> &'a str {
        if !text.starts_with(TRANSLATION_PREFIX) {
            return text;
        }
        self.translations
            .get(text)
            .map(|t| t.as_str())
            .unwrap_or(text)
    }
}

pub const TRANSLATION_PREFIX: &str = "ivr.";
