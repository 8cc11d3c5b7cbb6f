//! Named callbacks on the caller-supplied domain object.
//!
//! A flow only refers to behavior by name: deciders (`tired?`), side effects
//! (`collect_rating`), dynamic prompt text (`growl`) and dynamic key limits
//! (`num_ratings`). A [`CallbackResolver`] maps those names to code at run
//! time. Replies are loosely typed [`Value`]s so that a decider may answer
//! `true`, `"no"` or nothing at all.

use crate::error::CallbackError;
use crate::flow::Outcome;
use serde_json::Value;
use std::collections::HashMap;

pub type ActionFn<D> = Box<dyn Fn(&mut D, Option<&str>) -> anyhow::Result<Value> + Send + Sync>;
pub type TextFn<D> = Box<dyn Fn(&D) -> anyhow::Result<Value> + Send + Sync>;

pub trait CallbackResolver<D>: Send + Sync {
    /// Invoke a decider or side effect with the digits that triggered it.
    fn call(&self, name: &str, domain: &mut D, digits: Option<&str>) -> Result<Value, CallbackError>;

    /// Read-only query used for dynamic prompts and key limits.
    fn text(&self, name: &str, domain: &D) -> Result<Value, CallbackError>;

    fn has_action(&self, name: &str) -> bool;
}

/// Typed callback registry for a domain type `D`.
///
/// ```rust
/// use ivrflow::callbacks::{CallbackResolver, Callbacks};
/// use serde_json::json;
///
/// struct Caller { pin: String }
///
/// let callbacks = Callbacks::<Caller>::new()
///     .on_action("valid_pin?", |caller, digits| Ok(json!(digits == Some(caller.pin.as_str()))))
///     .on_text("greeting", |_| Ok(json!("Welcome back")));
///
/// let mut caller = Caller { pin: "1234".to_string() };
/// let reply = callbacks.call("valid_pin?", &mut caller, Some("1234")).unwrap();
/// assert_eq!(reply, json!(true));
/// ```
pub struct Callbacks<D> {
    actions: HashMap<String, ActionFn<D>>,
    texts: HashMap<String, TextFn<D>>,
}

impl<D> Default for Callbacks<D> {
    fn default() -> Self {
        Self {
            actions: HashMap::new(),
            texts: HashMap::new(),
        }
    }
}

impl<D> Callbacks<D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_action<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut D, Option<&str>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.actions.insert(name.into(), Box::new(f));
        self
    }

    pub fn on_text<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&D) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.texts.insert(name.into(), Box::new(f));
        self
    }
}

impl<D> CallbackResolver<D> for Callbacks<D> {
    fn call(&self, name: &str, domain: &mut D, digits: Option<&str>) -> Result<Value, CallbackError> {
        let f = self
            .actions
            .get(name)
            .ok_or_else(|| CallbackError::Unknown(name.to_string()))?;
        f(domain, digits).map_err(|source| CallbackError::Failed {
            name: name.to_string(),
            source,
        })
    }

    fn text(&self, name: &str, domain: &D) -> Result<Value, CallbackError> {
        let f = self
            .texts
            .get(name)
            .ok_or_else(|| CallbackError::Unknown(name.to_string()))?;
        f(domain).map_err(|source| CallbackError::Failed {
            name: name.to_string(),
            source,
        })
    }

    fn has_action(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }
}

/// Constant replies, typically declared in a flow file. Works for any domain
/// type since the domain object is never consulted.
#[derive(Debug, Clone, Default)]
pub struct StaticCallbacks {
    replies: HashMap<String, Value>,
}

impl StaticCallbacks {
    pub fn new(replies: HashMap<String, Value>) -> Self {
        Self { replies }
    }

    pub fn reply(mut self, name: impl Into<String>, value: Value) -> Self {
        self.replies.insert(name.into(), value);
        self
    }

    fn get(&self, name: &str) -> Result<Value, CallbackError> {
        self.replies
            .get(name)
            .cloned()
            .ok_or_else(|| CallbackError::Unknown(name.to_string()))
    }
}

impl<D> CallbackResolver<D> for StaticCallbacks {
    fn call(&self, name: &str, _domain: &mut D, _digits: Option<&str>) -> Result<Value, CallbackError> {
        self.get(name)
    }

    fn text(&self, name: &str, _domain: &D) -> Result<Value, CallbackError> {
        self.get(name)
    }

    fn has_action(&self, name: &str) -> bool {
        self.replies.contains_key(name)
    }
}

/// Map a decider reply onto an outcome. `None` for anything unrecognized.
pub fn outcome_of(reply: &Value) -> Option<Outcome> {
    match reply {
        Value::Bool(true) => Some(Outcome::Yes),
        Value::Bool(false) => Some(Outcome::No),
        Value::String(s) if s == "yes" => Some(Outcome::Yes),
        Value::String(s) if s == "no" => Some(Outcome::No),
        Value::Null => Some(Outcome::Indeterminate),
        _ => None,
    }
}

/// Null and `false` leave the decision to the decider.
pub(crate) fn is_unset(reply: &Value) -> bool {
    matches!(reply, Value::Null | Value::Bool(false))
}

/// Flatten a text reply into prompt lines.
pub(crate) fn flatten_text(name: &str, reply: Value, out: &mut Vec<String>) -> Result<(), CallbackError> {
    match reply {
        Value::Null => Ok(()),
        Value::String(s) => {
            out.push(s);
            Ok(())
        }
        Value::Number(n) => {
            out.push(n.to_string());
            Ok(())
        }
        Value::Array(items) => {
            for item in items {
                flatten_text(name, item, out)?;
            }
            Ok(())
        }
        other => Err(CallbackError::UnexpectedReply {
            name: name.to_string(),
            value: other.to_string(),
            expected: "text",
        }),
    }
}

pub(crate) fn digit_limit(name: &str, reply: &Value) -> Result<usize, CallbackError> {
    reply
        .as_u64()
        .map(|n| n as usize)
        .ok_or_else(|| CallbackError::UnexpectedReply {
            name: name.to_string(),
            value: reply.to_string(),
            expected: "a digit count",
        })
}
