//! Conversation module
//!
//! The canvass conversation engine is a pure function over plain values:
//! it never touches storage and never sends anything itself. Callers apply
//! the returned [`Change`] and execute the returned [`Directive`]s.

mod engine;
mod quick_poll;
mod script;
mod state;

pub use engine::{advance, classify, transition, Change, Choice, Directive, Reply, Signal, Step, Transition};
pub use quick_poll::{quick_reply, QuickPollReply};
pub use script::Script;
pub use state::{ConversationState, Outcome};
