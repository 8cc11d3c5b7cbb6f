//! Property-based tests for the session interpreter.

use crate::callbacks::{Callbacks, StaticCallbacks};
use crate::engine::IvrEngine;
use crate::flow::{Binding, FlowBuilder, FlowDefinition};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;

const MAX_DECISIONS: usize = 8;

#[derive(Debug, Default)]
struct Recorder {
    replies: Vec<Value>,
    calls: Vec<usize>,
}

fn recorder_callbacks() -> Callbacks<Recorder> {
    let mut callbacks = Callbacks::new().on_action("pick", |rec: &mut Recorder, _| {
        rec.calls.push(usize::MAX);
        Ok(Value::Null)
    });
    for i in 0..MAX_DECISIONS {
        callbacks = callbacks.on_action(format!("d{}", i), move |rec: &mut Recorder, _| {
            rec.calls.push(i);
            Ok(rec.replies[i].clone())
        });
    }
    callbacks
}

fn menu_flow() -> FlowDefinition {
    FlowBuilder::new("menu")
        .state("menu", |s| {
            s.say(["Main menu"])
                .press(1, "pick", Binding::go("done"))
                .press("42#", "pick_sequence", Binding::go("done"))
                .decide("d0", Binding::yes("done"));
        })
        .state("done", |s| {
            s.say(["Done"]);
        })
        .build()
        .expect("valid flow")
}

fn chain_flow(n: usize) -> FlowDefinition {
    let mut builder = FlowBuilder::new("chain").state("start", |s| {
        s.say(["Deciding"]);
        for i in 0..n {
            s.decide(&format!("d{}", i), Binding::yes(format!("t{}", i)));
        }
    });
    for i in 0..n {
        builder = builder.state(format!("t{}", i), |s| {
            s.say(["Arrived"]);
        });
    }
    builder.build().expect("valid flow")
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_reply() -> impl Strategy<Value = Value> {
    prop_oneof![Just(json!(true)), Just(json!("no")), Just(json!(false)), Just(Value::Null),]
}

/// Digits the menu has no binding for.
fn arb_unmatched_digits() -> impl Strategy<Value = String> {
    prop_oneof!["[02-9*]", "[0-9]{2,6}".prop_filter("bound sequence", |d| d != "42"),]
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn unmatched_digits_change_nothing(digits in arb_unmatched_digits()) {
        let engine: IvrEngine<Recorder> = IvrEngine::new(Arc::new(menu_flow()), Arc::new(recorder_callbacks()));
        let mut session = engine.start("call-1", Recorder {
            replies: vec![json!(true)],
            calls: Vec::new(),
        });
        let state = engine.respond(&mut session, digits.as_str());
        prop_assert_eq!(state.as_str(), "menu");
        prop_assert_eq!(session.state(), "menu");
        prop_assert!(session.domain.calls.is_empty());
    }

    #[test]
    fn auto_decisions_stop_at_first_transition(
        replies in prop::collection::vec(arb_reply(), 1..MAX_DECISIONS)
    ) {
        let n = replies.len();
        let engine: IvrEngine<Recorder> = IvrEngine::new(Arc::new(chain_flow(n)), Arc::new(recorder_callbacks()));
        let mut session = engine.start("call-1", Recorder {
            replies: replies.clone(),
            calls: Vec::new(),
        });
        let state = engine.decide(&mut session).expect("decide");

        let first_yes = replies.iter().position(|r| r == &json!(true));
        match first_yes {
            Some(i) => {
                prop_assert_eq!(state, format!("t{}", i));
                prop_assert_eq!(session.domain.calls, (0..=i).collect::<Vec<_>>());
            }
            None => {
                prop_assert_eq!(state.as_str(), "start");
                prop_assert_eq!(session.domain.calls, (0..n).collect::<Vec<_>>());
            }
        }
    }

    #[test]
    fn respond_always_lands_in_a_flow_state(
        presses in prop::collection::vec("[0-9*#]{0,6}", 0..8)
    ) {
        let flow = Arc::new(menu_flow());
        let callbacks = StaticCallbacks::default().reply("d0", json!("no"));
        let engine: IvrEngine<()> = IvrEngine::new(flow.clone(), Arc::new(callbacks));
        let mut session = engine.start("call-1", ());
        for digits in presses {
            let state = engine.respond(&mut session, digits);
            prop_assert_eq!(state.as_str(), session.state());
            prop_assert!(flow.state(&state).is_some());
        }
    }
}
