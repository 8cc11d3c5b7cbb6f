//! Registration API for call flows.
//!
//! # Example
//!
//! ```rust
//! use ivrflow::flow::{Binding, FlowBuilder};
//!
//! let flow = FlowBuilder::new("gorillas")
//!     .state("hello", |s| {
//!         s.say(["Twilio Gorillas. Wasssaaap!"])
//!             .prompt(1, "If you are a jungle-dweller, press 1", "primal", Binding::go("jungle_dweller"))
//!             .prompt(9, "To end this call, press 9", "end_call", Binding::go("goodbye"));
//!     })
//!     .state("jungle_dweller", |s| {
//!         s.say(["Press 1 to hear more"])
//!             .press(1, "tired?", Binding::yes("goodbye"));
//!     })
//!     .state("goodbye", |s| {
//!         s.say(["Goodbye"]);
//!     })
//!     .build()
//!     .expect("valid flow");
//! assert_eq!(flow.initial_state().name, "hello");
//! ```

use super::{Decision, Event, FlowDefinition, KeyBinding, KeyPattern, PromptFragment, State, Transition};
use crate::error::DefinitionError;
use std::collections::HashMap;
use std::fmt::Display;

/// Arguments of a key binding or decision.
///
/// A binding carrying `yes` or `no` is always a decision, even when `go` is
/// also present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Binding {
    pub go: Option<String>,
    pub yes: Option<String>,
    pub no: Option<String>,
    /// Side effect run before the transition (or before the decider).
    pub action: Option<String>,
    /// Ties a decision to a key instead of evaluating it on entry.
    pub press: Option<String>,
}

impl Binding {
    pub fn go(target: impl Into<String>) -> Self {
        Self {
            go: Some(target.into()),
            ..Default::default()
        }
    }

    pub fn yes(target: impl Into<String>) -> Self {
        Self {
            yes: Some(target.into()),
            ..Default::default()
        }
    }

    pub fn no(target: impl Into<String>) -> Self {
        Self {
            no: Some(target.into()),
            ..Default::default()
        }
    }

    pub fn and_yes(mut self, target: impl Into<String>) -> Self {
        self.yes = Some(target.into());
        self
    }

    pub fn and_no(mut self, target: impl Into<String>) -> Self {
        self.no = Some(target.into());
        self
    }

    pub fn with_action(mut self, name: impl Into<String>) -> Self {
        self.action = Some(name.into());
        self
    }

    pub fn on_key(mut self, key: impl Display) -> Self {
        self.press = Some(key.to_string());
        self
    }

    fn is_decision(&self) -> bool {
        self.yes.is_some() || self.no.is_some()
    }
}

/// Builds a [`FlowDefinition`]. Definition errors are collected while states
/// are declared and the first one is returned from [`build`](Self::build).
pub struct FlowBuilder {
    name: String,
    states: Vec<State>,
    translations: HashMap<String, String>,
    errors: Vec<DefinitionError>,
}

impl FlowBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            states: Vec::new(),
            translations: HashMap::new(),
            errors: Vec::new(),
        }
    }

    /// Declare a state. The first declared state is the initial one.
    pub fn state<F>(mut self, name: impl Into<String>, declare: F) -> Self
    where
        F: FnOnce(&mut StateBuilder),
    {
        let mut builder = StateBuilder::new(name.into());
        declare(&mut builder);
        if self.states.iter().any(|s| s.name == builder.state.name) {
            self.errors
                .push(DefinitionError::DuplicateState(builder.state.name.clone()));
        }
        self.errors.append(&mut builder.errors);
        self.states.push(builder.state);
        self
    }

    /// Text spoken instead of a literal prompt equal to `key`.
    pub fn translation(mut self, key: impl Into<String>, text: impl Into<String>) -> Self {
        self.translations.insert(key.into(), text.into());
        self
    }

    pub fn translations<I>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.translations.extend(entries);
        self
    }

    pub fn build(self) -> Result<FlowDefinition, DefinitionError> {
        if let Some(err) = self.errors.into_iter().next() {
            return Err(err);
        }
        if self.states.is_empty() {
            return Err(DefinitionError::EmptyFlow(self.name));
        }
        let index: HashMap<String, usize> = self
            .states
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.clone(), i))
            .collect();

        for state in &self.states {
            for (name, target) in state.targets() {
                if !index.contains_key(target) {
                    return Err(DefinitionError::UnknownTarget {
                        state: state.name.clone(),
                        name,
                        target: target.to_string(),
                    });
                }
            }
        }

        Ok(FlowDefinition {
            name: self.name,
            states: self.states,
            index,
            translations: self.translations,
        })
    }
}

/// Declares the prompts, keys and decisions of one state.
pub struct StateBuilder {
    state: State,
    errors: Vec<DefinitionError>,
}

impl StateBuilder {
    fn new(name: String) -> Self {
        Self {
            state: State::new(name),
            errors: Vec::new(),
        }
    }

    /// Set what the state says on entry. Replaces anything said or prompted
    /// before; later prompts are appended after it.
    pub fn say<I, P>(&mut self, fragments: I) -> &mut Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PromptFragment>,
    {
        self.state.prompts = fragments.into_iter().map(Into::into).collect();
        self
    }

    /// Append `text` to the prompts and bind `key` like [`press`](Self::press).
    pub fn prompt(
        &mut self,
        key: impl Display,
        text: impl Into<PromptFragment>,
        name: &str,
        binding: Binding,
    ) -> &mut Self {
        self.state.prompts.push(text.into());
        self.press(key, name, binding)
    }

    /// Bind a key to the event `name`, or to the decider `name` when the
    /// binding has a yes/no target.
    pub fn press(&mut self, key: impl Display, name: &str, binding: Binding) -> &mut Self {
        let key = key.to_string();
        if binding.is_decision() {
            return self.decide(name, binding.on_key(key));
        }
        let Some(target) = binding.go else {
            self.errors.push(DefinitionError::MissingTarget {
                state: self.state.name.clone(),
                event: name.to_string(),
            });
            return self;
        };
        let event = Event {
            name: name.to_string(),
            target,
            action: binding.action,
        };
        self.add_key(&key, Transition::Event(event));
        self
    }

    /// Same as [`press`](Self::press).
    pub fn bind(&mut self, key: impl Display, name: &str, binding: Binding) -> &mut Self {
        self.press(key, name, binding)
    }

    /// Declare a decision. Keyed decisions (`binding.press`) go to the key
    /// map, the rest are evaluated automatically when the state is entered.
    pub fn decide(&mut self, decider: &str, binding: Binding) -> &mut Self {
        if !binding.is_decision() {
            self.errors.push(DefinitionError::MissingOutcome {
                state: self.state.name.clone(),
                decider: decider.to_string(),
            });
            return self;
        }
        let decision = Decision {
            decider: decider.to_string(),
            action: binding.action,
            on_yes: binding.yes,
            on_no: binding.no,
        };
        match binding.press {
            Some(key) => self.add_key(&key, Transition::Decision(decision)),
            None => self.state.decisions.push(decision),
        }
        self
    }

    fn add_key(&mut self, key: &str, transition: Transition) {
        let pattern: KeyPattern = match key.parse() {
            Ok(pattern) => pattern,
            Err(reason) => {
                self.errors.push(DefinitionError::InvalidKeyPattern {
                    state: self.state.name.clone(),
                    pattern: key.to_string(),
                    reason,
                });
                return;
            }
        };
        if self.state.binding(&pattern).is_some() {
            self.errors.push(DefinitionError::DuplicateKey {
                state: self.state.name.clone(),
                key: pattern.to_string(),
            });
            return;
        }
        self.state.keys.push(KeyBinding {
            pattern,
            transition,
        });
    }
}
