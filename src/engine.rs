//! Session interpreter.
//!
//! Drives one [`Session`] through a shared [`FlowDefinition`]:
//!
//! ```text
//! digits ─▶ key lookup ─┬─ event ────┐
//!                       └─ decision ─┴─▶ state change ─▶ silent or unchanged?
//!                                                            │ yes
//!                                                            ▼
//!                                                  auto decisions (cascade)
//! ```
//!
//! The engine itself is immutable and cheap to clone; all per-call state
//! lives in the [`Session`]. A response cycle runs to completion without
//! suspending. Callers must not run two cycles on the same session at once.

use crate::callbacks::{digit_limit, flatten_text, is_unset, outcome_of, CallbackResolver};
use crate::error::{DecisionError, IvrError, Result, StateError};
use crate::flow::keys::COLLECTOR_KEY;
use crate::flow::{
    Decision, DigitLimit, Digits, Event, FlowDefinition, GatherSpec, KeyBinding, KeyPattern,
    PromptFragment, State, Transition,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Upper bound on decisions evaluated in a single cascade.
pub const DEFAULT_STEP_LIMIT: usize = 1024;

/// The mutable part of a call: where it is in the flow and the domain data
/// callbacks work on.
#[derive(Debug, Clone, PartialEq)]
pub struct Session<D> {
    call_guid: String,
    state: String,
    pub domain: D,
}

impl<D> Session<D> {
    pub fn call_guid(&self) -> &str {
        &self.call_guid
    }

    pub fn state(&self) -> &str {
        &self.state
    }
}

pub struct IvrEngine<D> {
    flow: Arc<FlowDefinition>,
    callbacks: Arc<dyn CallbackResolver<D>>,
    max_steps: usize,
}

impl<D> Clone for IvrEngine<D> {
    fn clone(&self) -> Self {
        Self {
            flow: self.flow.clone(),
            callbacks: self.callbacks.clone(),
            max_steps: self.max_steps,
        }
    }
}

impl<D> IvrEngine<D> {
    pub fn new(flow: Arc<FlowDefinition>, callbacks: Arc<dyn CallbackResolver<D>>) -> Self {
        Self {
            flow,
            callbacks,
            max_steps: DEFAULT_STEP_LIMIT,
        }
    }

    /// At least one decision is always allowed per cascade.
    pub fn with_step_limit(mut self, limit: usize) -> Self {
        self.max_steps = limit.max(1);
        self
    }

    pub fn flow(&self) -> &FlowDefinition {
        &self.flow
    }

    /// A new session in the flow's initial state. Run [`decide`](Self::decide)
    /// afterwards to let the initial state's decisions take effect.
    pub fn start(&self, call_guid: impl Into<String>, domain: D) -> Session<D> {
        let session = Session {
            call_guid: call_guid.into(),
            state: self.flow.initial_state().name.clone(),
            domain,
        };
        info!(flow = %self.flow.name(), call = %session.call_guid, state = %session.state, "session started");
        session
    }

    /// Rebuild a persisted session. Fails when `state` is not part of the flow.
    pub fn resume(&self, call_guid: impl Into<String>, state: &str, domain: D) -> Result<Session<D>> {
        let session = Session {
            call_guid: call_guid.into(),
            state: state.to_string(),
            domain,
        };
        self.current(&session)?;
        Ok(session)
    }

    /// Handle a key press. Never fails: any error in the cycle is logged and
    /// the session stays in the state it was in.
    ///
    /// Only the state is restored. Changes callbacks made to the domain
    /// object before the error stay in place.
    pub fn respond(&self, session: &mut Session<D>, digits: impl Into<Digits>) -> String {
        let digits = digits.into();
        let start = session.state.clone();
        match self.try_respond(session, digits.clone()) {
            Ok(state) => state,
            Err(e) => {
                warn!(
                    flow = %self.flow.name(),
                    call = %session.call_guid,
                    state = %start,
                    digits = %digits,
                    error = %e,
                    "response failed, staying in current state"
                );
                session.state = start.clone();
                start
            }
        }
    }

    /// Like [`respond`](Self::respond) but surfaces the error. The session
    /// may have moved before the error occurred, and domain changes made by
    /// callbacks up to that point are kept.
    pub fn try_respond(&self, session: &mut Session<D>, digits: impl Into<Digits>) -> Result<String> {
        let digits = digits.into();
        let state = self.current(session)?;
        if state.keys.is_empty() {
            return Err(StateError::NoKeyBindings(state.name.clone()).into());
        }

        let Some(binding) = self.resolve_key(state, &digits, &session.domain)? else {
            debug!(
                flow = %self.flow.name(),
                call = %session.call_guid,
                state = %state.name,
                digits = %digits,
                "no key binding matched"
            );
            return Ok(session.state.clone());
        };
        debug!(
            flow = %self.flow.name(),
            call = %session.call_guid,
            state = %state.name,
            digits = %digits,
            key = %binding.pattern,
            "key matched"
        );

        match &binding.transition {
            Transition::Event(event) => self.fire_event(session, event, Some(digits.as_str()))?,
            Transition::Decision(decision) => {
                self.evaluate(session, decision, Some(digits.as_str()))?;
            }
        }

        let entered = self.current(session)?;
        if entered.name == state.name || entered.is_silent() {
            return self.decide(session);
        }
        Ok(session.state.clone())
    }

    /// Evaluate the current state's automatic decisions in order until one
    /// moves the session. A silent state reached this way has its own
    /// decisions evaluated in turn.
    pub fn decide(&self, session: &mut Session<D>) -> Result<String> {
        let mut steps = 0;
        loop {
            let state = self.current(session)?;
            let mut moved = false;
            for decision in &state.decisions {
                steps += 1;
                if steps > self.max_steps {
                    return Err(IvrError::StepLimit(self.max_steps));
                }
                if self.evaluate(session, decision, None)?.is_some() {
                    moved = true;
                    break;
                }
            }
            if !moved || !self.current(session)?.is_silent() {
                return Ok(session.state.clone());
            }
        }
    }

    /// What the current state says, with dynamic fragments resolved.
    pub fn prompts_for(&self, session: &Session<D>) -> Result<Vec<String>> {
        let state = self.current(session)?;
        let mut prompts = Vec::with_capacity(state.prompts.len());
        for fragment in &state.prompts {
            match fragment {
                PromptFragment::Text(text) => prompts.push(self.flow.translate(text).to_string()),
                PromptFragment::Dynamic { call } => {
                    let reply = self.callbacks.text(call, &session.domain)?;
                    flatten_text(call, reply, &mut prompts)?;
                }
            }
        }
        Ok(prompts)
    }

    /// Every key the current state accepts. The flag is `true` when the key
    /// always leads to a transition and `false` when a decision decides;
    /// `false` keys are still valid input.
    pub fn accepted_keys_for(&self, session: &Session<D>) -> Result<HashMap<String, bool>> {
        let state = self.current(session)?;
        Ok(state
            .keys
            .iter()
            .map(|b| {
                let direct = matches!(b.transition, Transition::Event(_));
                (b.pattern.to_string(), direct)
            })
            .collect())
    }

    /// How the telephony layer should collect input for the current state.
    pub fn gather_for(&self, session: &Session<D>) -> Result<GatherSpec> {
        let state = self.current(session)?;
        let mut gather = GatherSpec::default();
        let mut max_digits = 0;
        for binding in &state.keys {
            match &binding.pattern {
                pattern if pattern.is_collecting() => gather.finish_on_key = Some(COLLECTOR_KEY),
                KeyPattern::Wildcard(limit) => {
                    max_digits = max_digits.max(self.limit_for(limit, &session.domain)?);
                }
                _ => max_digits = max_digits.max(1),
            }
        }
        if gather.finish_on_key.is_none() && max_digits > 0 {
            gather.num_digits = Some(max_digits);
        }
        Ok(gather)
    }

    fn current(&self, session: &Session<D>) -> Result<&State> {
        self.flow.state(&session.state).ok_or_else(|| {
            StateError::UnknownState(session.state.clone(), self.flow.name().to_string()).into()
        })
    }

    /// Exact keys first, then collectors and wildcards in registration order.
    fn resolve_key<'a>(&self, state: &'a State, digits: &Digits, domain: &D) -> Result<Option<&'a KeyBinding>> {
        if digits.is_empty() {
            return Ok(None);
        }
        if let Some(binding) = state
            .keys
            .iter()
            .find(|b| b.pattern.is_exact() && b.pattern.matches_exact(digits))
        {
            return Ok(Some(binding));
        }
        for binding in state.keys.iter().filter(|b| !b.pattern.is_exact()) {
            let limit = match &binding.pattern {
                KeyPattern::Wildcard(limit) => Some(self.limit_for(limit, domain)?),
                _ => None,
            };
            if binding.pattern.matches_run(digits, limit) {
                return Ok(Some(binding));
            }
        }
        Ok(None)
    }

    fn limit_for(&self, limit: &DigitLimit, domain: &D) -> Result<usize> {
        match limit {
            DigitLimit::Fixed(max) => Ok(*max),
            DigitLimit::Callback(name) => {
                let reply = self.callbacks.text(name, domain)?;
                Ok(digit_limit(name, &reply)?)
            }
        }
    }

    fn fire_event(&self, session: &mut Session<D>, event: &Event, digits: Option<&str>) -> Result<()> {
        let action = match &event.action {
            Some(action) => Some(action.as_str()),
            None if self.callbacks.has_action(&event.name) => Some(event.name.as_str()),
            None => None,
        };
        if let Some(action) = action {
            self.callbacks.call(action, &mut session.domain, digits)?;
        }
        debug!(
            flow = %self.flow.name(),
            call = %session.call_guid,
            from = %session.state,
            event = %event.describe(),
            "event fired"
        );
        session.state = event.target.clone();
        Ok(())
    }

    /// Returns the new state name when the decision moved the session.
    fn evaluate(&self, session: &mut Session<D>, decision: &Decision, digits: Option<&str>) -> Result<Option<String>> {
        let start = session.state.clone();
        let mut reply = Value::Null;
        if let Some(action) = &decision.action {
            reply = self.callbacks.call(action, &mut session.domain, digits)?;
        }
        if is_unset(&reply) {
            reply = self.callbacks.call(&decision.decider, &mut session.domain, digits)?;
        }

        let outcome = outcome_of(&reply).ok_or_else(|| DecisionError {
            decider: decision.decider.clone(),
            state: start.clone(),
            outcome: reply.to_string(),
        })?;

        let Some(target) = decision.target_for(outcome) else {
            debug!(
                flow = %self.flow.name(),
                call = %session.call_guid,
                state = %start,
                decision = %decision.describe(),
                %outcome,
                "decision made no transition"
            );
            return Ok(None);
        };
        debug!(
            flow = %self.flow.name(),
            call = %session.call_guid,
            from = %start,
            to = target,
            event = %decision.event_name_for(outcome),
            "decision transition"
        );
        session.state = target.to_string();
        Ok((session.state != start).then(|| session.state.clone()))
    }
}
