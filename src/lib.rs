//! # ivrflow
//!
//! An interactive voice response engine. A call flow is declared once as a
//! set of states with prompts, accepted keys and yes/no decisions; every
//! inbound key press is then resolved by the [`IvrEngine`] into the next
//! state of the caller's [`Session`].
//!
//! ```rust
//! use ivrflow::callbacks::Callbacks;
//! use ivrflow::flow::{Binding, FlowBuilder};
//! use ivrflow::IvrEngine;
//! use std::sync::Arc;
//!
//! let flow = FlowBuilder::new("gorillas")
//!     .state("hello", |s| {
//!         s.prompt(1, "If you are a jungle-dweller, press 1", "primal", Binding::go("jungle_dweller"));
//!     })
//!     .state("jungle_dweller", |s| {
//!         s.say(["Please listen carefully to this recorded growl"]);
//!     })
//!     .build()
//!     .expect("valid flow");
//!
//! let engine = IvrEngine::new(Arc::new(flow), Arc::new(Callbacks::<()>::new()));
//! let mut session = engine.start("call-1", ());
//! assert_eq!(engine.respond(&mut session, "1"), "jungle_dweller");
//! ```

pub mod callbacks;
pub mod config;
pub mod engine;
pub mod error;
pub mod flow;
pub mod handler;
pub mod store;
pub mod version;

#[cfg(test)]
mod proptests;

pub use engine::{IvrEngine, Session};
pub use error::{CallbackError, DecisionError, DefinitionError, IvrError, StateError};
