//! Per-turn glue between the telephony webhook, the session store and the
//! engine.
//!
//! Every inbound request for a call is one turn:
//!
//! 1. find the call's record or create it in the initial state,
//! 2. a new call evaluates its entry decisions, a known call with digits
//!    responds to them,
//! 3. render the state the call ended up in and save the record.

use crate::engine::{IvrEngine, Session};
use crate::error::StateError;
use crate::flow::GatherSpec;
use crate::store::{SessionRecord, SessionStore};
use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// What the telephony layer needs to answer one turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallTurn {
    pub call_guid: String,
    pub state: String,
    pub prompts: Vec<String>,
    /// Every key the state accepts. `true` when the key always moves the
    /// call, `false` when a decision decides whether it does. Both are
    /// accepted input.
    pub accepted_keys: BTreeMap<String, bool>,
    pub gather: GatherSpec,
}

impl CallTurn {
    /// No keys accepted means the call is over after the prompts.
    pub fn is_final(&self) -> bool {
        self.accepted_keys.is_empty()
    }
}

pub struct CallHandler<D> {
    engine: IvrEngine<D>,
    store: Arc<dyn SessionStore>,
    fallback_state: Option<String>,
}

impl<D> CallHandler<D>
where
    D: Serialize + DeserializeOwned + Default + Send,
{
    pub fn new(engine: IvrEngine<D>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            engine,
            store,
            fallback_state: None,
        }
    }

    /// State a call is moved to when a turn fails, e.g. `sorry`. Must be a
    /// state of the engine's flow.
    pub fn with_fallback_state(mut self, state: impl Into<String>) -> Result<Self, StateError> {
        let state = state.into();
        let flow = self.engine.flow();
        if flow.state(&state).is_none() {
            return Err(StateError::UnknownState(state, flow.name().to_string()));
        }
        self.fallback_state = Some(state);
        Ok(self)
    }

    pub fn engine(&self) -> &IvrEngine<D> {
        &self.engine
    }

    pub async fn handle(&self, call_guid: &str, digits: Option<&str>) -> Result<CallTurn> {
        let existing = self.store.load(call_guid).await?;
        let mut session = match &existing {
            Some(record) => {
                let domain: D = serde_json::from_value(record.data.clone())?;
                self.engine.resume(call_guid, &record.state, domain)?
            }
            None => self.engine.start(call_guid, D::default()),
        };

        let turn = match self.advance(&mut session, existing.is_none(), digits) {
            Ok(turn) => turn,
            Err(e) => {
                let Some(fallback) = &self.fallback_state else {
                    return Err(e);
                };
                warn!(
                    call = %call_guid,
                    state = %session.state(),
                    fallback = %fallback,
                    error = %e,
                    "turn failed, moving call to fallback state"
                );
                session = self.engine.resume(call_guid, fallback, session.domain)?;
                self.render(&session)?
            }
        };

        let data = serde_json::to_value(&session.domain)?;
        let record = match existing {
            Some(mut record) => {
                record.update(session.state(), data);
                record
            }
            None => SessionRecord::new(call_guid, session.state(), data),
        };
        self.store.save(record).await?;
        info!(call = %call_guid, state = %turn.state, "turn handled");
        Ok(turn)
    }

    /// Forget a finished call.
    pub async fn hangup(&self, call_guid: &str) -> Result<()> {
        self.store.remove(call_guid).await
    }

    fn advance(&self, session: &mut Session<D>, is_new: bool, digits: Option<&str>) -> Result<CallTurn> {
        if is_new {
            self.engine.decide(session)?;
        } else if let Some(digits) = digits {
            self.engine.respond(session, digits);
        }
        self.render(session)
    }

    fn render(&self, session: &Session<D>) -> Result<CallTurn> {
        Ok(CallTurn {
            call_guid: session.call_guid().to_string(),
            state: session.state().to_string(),
            prompts: self.engine.prompts_for(session)?,
            accepted_keys: self.engine.accepted_keys_for(session)?.into_iter().collect(),
            gather: self.engine.gather_for(session)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::Callbacks;
    use crate::flow::{Binding, FlowBuilder};
    use crate::store::{InMemorySessionStore, MockSessionStore};
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    #[serde(default)]
    struct Caller {
        rating: Option<String>,
        growl_broken: bool,
    }

    fn engine() -> IvrEngine<Caller> {
        let flow = FlowBuilder::new("gorillas")
            .state("hello", |s| {
                s.say(["Wasssaaap!"])
                    .prompt(1, "Press 1 to rate", "rate", Binding::go("rating"))
                    .prompt(2, "Press 2 to hear a growl", "listen", Binding::go("growl"));
            })
            .state("rating", |s| {
                s.say(["Rate from 1 to 5"])
                    .press(".5", "collect_rating", Binding::go("goodbye"));
            })
            .state("growl", |s| {
                s.say([crate::flow::PromptFragment::call("growl")]);
            })
            .state("goodbye", |s| {
                s.say(["Goodbye"]);
            })
            .state("sorry", |s| {
                s.say(["Sorry, something went wrong"]);
            })
            .build()
            .expect("valid flow");
        let callbacks = Callbacks::new()
            .on_action("collect_rating", |caller: &mut Caller, digits| {
                caller.rating = digits.map(str::to_string);
                Ok(serde_json::Value::Null)
            })
            .on_action("listen", |caller: &mut Caller, _| {
                caller.growl_broken = true;
                Ok(serde_json::Value::Null)
            })
            .on_text("growl", |caller: &Caller| {
                if caller.growl_broken {
                    anyhow::bail!("recording unavailable");
                }
                Ok(json!("Grrr"))
            });
        IvrEngine::new(Arc::new(flow), Arc::new(callbacks))
    }

    #[tokio::test]
    async fn test_turns_follow_the_flow() {
        let store = Arc::new(InMemorySessionStore::new());
        let handler = CallHandler::new(engine(), store.clone());

        let turn = handler.handle("call-1", None).await.expect("first turn");
        assert_eq!(turn.state, "hello");
        assert_eq!(turn.prompts, vec!["Wasssaaap!", "Press 1 to rate", "Press 2 to hear a growl"]);
        assert_eq!(turn.gather.num_digits, Some(1));

        let turn = handler.handle("call-1", Some("1")).await.expect("second turn");
        assert_eq!(turn.state, "rating");
        assert_eq!(turn.gather.num_digits, Some(5));

        let turn = handler.handle("call-1", Some("4")).await.expect("third turn");
        assert_eq!(turn.state, "goodbye");
        assert!(turn.is_final());

        let record = store.load("call-1").await.expect("load").expect("record");
        assert_eq!(record.state, "goodbye");
        assert_eq!(record.data, json!({"rating": "4", "growl_broken": false}));

        handler.hangup("call-1").await.expect("hangup");
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_digits_on_first_turn_are_ignored() {
        let store = Arc::new(InMemorySessionStore::new());
        let handler = CallHandler::new(engine(), store);
        let turn = handler.handle("call-1", Some("1")).await.expect("first turn");
        assert_eq!(turn.state, "hello");
    }

    #[tokio::test]
    async fn test_failed_turn_moves_to_fallback_state() {
        let store = Arc::new(InMemorySessionStore::new());
        let handler = CallHandler::new(engine(), store.clone())
            .with_fallback_state("sorry")
            .expect("sorry is a flow state");
        handler.handle("call-1", None).await.expect("first turn");

        let turn = handler.handle("call-1", Some("2")).await.expect("fallback turn");
        assert_eq!(turn.state, "sorry");
        assert_eq!(turn.prompts, vec!["Sorry, something went wrong"]);

        let record = store.load("call-1").await.expect("load").expect("record");
        assert_eq!(record.state, "sorry");
    }

    #[test]
    fn test_unknown_fallback_state_is_rejected() {
        let store = Arc::new(InMemorySessionStore::new());
        let err = CallHandler::new(engine(), store)
            .with_fallback_state("sorry_typo")
            .err()
            .expect("sorry_typo is not a flow state");
        assert_eq!(
            err,
            StateError::UnknownState("sorry_typo".to_string(), "gorillas".to_string())
        );
    }

    #[tokio::test]
    async fn test_failed_turn_without_fallback_is_an_error() {
        let store = Arc::new(InMemorySessionStore::new());
        let handler = CallHandler::new(engine(), store.clone());
        handler.handle("call-1", None).await.expect("first turn");

        let err = handler
            .handle("call-1", Some("2"))
            .await
            .expect_err("growl prompt fails");
        assert!(err.to_string().contains("growl"));
        // the failed turn is not saved
        let record = store.load("call-1").await.expect("load").expect("record");
        assert_eq!(record.state, "hello");
    }

    #[tokio::test]
    async fn test_store_errors_propagate() {
        let mut store = MockSessionStore::new();
        store
            .expect_load()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("connection refused")));
        store.expect_save().never();

        let handler = CallHandler::new(engine(), Arc::new(store));
        let err = handler.handle("call-1", None).await.expect_err("store down");
        assert!(err.to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_unknown_stored_state_is_an_error() {
        let mut store = MockSessionStore::new();
        store.expect_load().returning(|guid| {
            Ok(Some(SessionRecord::new(guid, "jungle", json!({}))))
        });
        store.expect_save().never();

        let handler = CallHandler::new(engine(), Arc::new(store));
        let err = handler
            .handle("call-1", Some("1"))
            .await
            .expect_err("state is not part of the flow");
        assert!(err.to_string().contains("jungle"));
    }
}
