//! Canvass conversation engine
//!
//! One inbound message moves a contact at most one step. The flow is:
//!
//! 1. stop phrases opt the contact out from any state
//! 2. closed contacts are ignored
//! 3. the text is classified into a [`Signal`] for the current state
//! 4. `(state, signal)` is looked up in the transition table

use serde::{Deserialize, Serialize};

use crate::contact::Contact;
use crate::conversation::{ConversationState, Outcome, Script};

/// Answer to the 1-4 stance question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Choice {
    One,
    Two,
    Three,
    Four,
}

impl Choice {
    /// Checked in this order; the first digit found in the text wins
    const ORDERED: [(char, Choice); 4] = [
        ('1', Choice::One),
        ('2', Choice::Two),
        ('3', Choice::Three),
        ('4', Choice::Four),
    ];

    fn find(lowered: &str) -> Option<Choice> {
        Self::ORDERED
            .into_iter()
            .find(|(digit, _)| lowered.contains(*digit))
            .map(|(_, choice)| choice)
    }
}

/// Inbound text, classified for the state it arrived in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// The state accepts any text
    Any,
    Choice(Choice),
    Affirmative,
    /// Nothing the state recognizes
    Other,
}

/// Reply keys, resolved to text through [`Script::text`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reply {
    Greeting,
    Reprompt,
    Supportive,
    Doubtful,
    Opposed,
    Unaware,
    LocalityThanks,
    HandoffConfirmed,
    HandoffDeclined,
    OptOutAck,
}

/// One row of the transition table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// `None` keeps the current state
    pub next: Option<ConversationState>,
    /// Outcome recorded by this step; `None` keeps the stored one
    pub outcome: Option<Outcome>,
    /// Store the inbound text as the contact's locality
    pub capture_locality: bool,
    pub reply: Reply,
    pub notify_agent: bool,
}

impl Transition {
    const fn to(next: ConversationState, reply: Reply) -> Self {
        Self {
            next: Some(next),
            outcome: None,
            capture_locality: false,
            reply,
            notify_agent: false,
        }
    }

    const fn recording(mut self, outcome: Outcome) -> Self {
        self.outcome = Some(outcome);
        self
    }
}

/// Side effect for the caller to execute after persisting the change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Directive {
    Send { text: String },
    NotifyAgent { reason: Option<Outcome> },
}

/// Contact mutation produced by one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    None,
    OptOut,
    Advance {
        state: ConversationState,
        outcome: Option<Outcome>,
        locality: Option<String>,
    },
}

/// Result of [`advance`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub change: Change,
    pub directives: Vec<Directive>,
}

impl Step {
    /// Message dropped without reply
    pub fn ignored() -> Self {
        Self {
            change: Change::None,
            directives: Vec::new(),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.change == Change::None && self.directives.is_empty()
    }

    /// First text sent back to the contact, if any
    pub fn reply(&self) -> Option<&str> {
        self.directives.iter().find_map(|directive| match directive {
            Directive::Send { text } => Some(text.as_str()),
            Directive::NotifyAgent { .. } => None,
        })
    }

    pub fn notifies_agent(&self) -> bool {
        self.directives
            .iter()
            .any(|directive| matches!(directive, Directive::NotifyAgent { .. }))
    }
}

/// Classify lower-cased text for `state`
pub fn classify(state: ConversationState, lowered: &str, script: &Script) -> Signal {
    match state {
        ConversationState::Start | ConversationState::AwaitingLocality => Signal::Any,
        ConversationState::AwaitingSentiment => {
            Choice::find(lowered).map_or(Signal::Other, Signal::Choice)
        }
        ConversationState::AwaitingHandoffConfirmation => {
            if script.is_affirmative(lowered) {
                Signal::Affirmative
            } else {
                Signal::Other
            }
        }
        ConversationState::Finished => Signal::Other,
    }
}

/// Transition table. `None` means the pair has no transition.
pub fn transition(state: ConversationState, signal: Signal) -> Option<Transition> {
    use ConversationState::*;

    let row = match (state, signal) {
        (Start, _) => Transition::to(AwaitingSentiment, Reply::Greeting),

        (AwaitingSentiment, Signal::Choice(Choice::One)) => {
            Transition::to(AwaitingLocality, Reply::Supportive).recording(Outcome::Supportive)
        }
        (AwaitingSentiment, Signal::Choice(Choice::Two)) => {
            Transition::to(AwaitingHandoffConfirmation, Reply::Doubtful)
                .recording(Outcome::Undecided)
        }
        (AwaitingSentiment, Signal::Choice(Choice::Three)) => {
            Transition::to(Finished, Reply::Opposed).recording(Outcome::Opposed)
        }
        (AwaitingSentiment, Signal::Choice(Choice::Four)) => {
            Transition::to(AwaitingLocality, Reply::Unaware).recording(Outcome::Undecided)
        }
        (AwaitingSentiment, _) => Transition {
            next: None,
            outcome: None,
            capture_locality: false,
            reply: Reply::Reprompt,
            notify_agent: false,
        },

        (AwaitingLocality, _) => Transition {
            capture_locality: true,
            ..Transition::to(Finished, Reply::LocalityThanks)
        },

        (AwaitingHandoffConfirmation, Signal::Affirmative) => Transition {
            notify_agent: true,
            ..Transition::to(Finished, Reply::HandoffConfirmed)
        },
        (AwaitingHandoffConfirmation, _) => Transition::to(Finished, Reply::HandoffDeclined),

        (Finished, _) => return None,
    };

    Some(row)
}

/// Advance `contact` by one inbound message. Never fails.
pub fn advance(contact: &Contact, inbound: &str, script: &Script) -> Step {
    let text = inbound.trim();
    let lowered = text.to_lowercase();

    if script.is_stop_request(&lowered) {
        return Step {
            change: Change::OptOut,
            directives: vec![Directive::Send {
                text: script.text(Reply::OptOutAck).to_string(),
            }],
        };
    }

    if contact.is_closed() {
        return Step::ignored();
    }

    let signal = classify(contact.state, &lowered, script);
    let Some(row) = transition(contact.state, signal) else {
        return Step::ignored();
    };

    let mut directives = Vec::with_capacity(2);
    if row.notify_agent {
        directives.push(Directive::NotifyAgent {
            reason: contact.outcome,
        });
    }
    directives.push(Directive::Send {
        text: script.text(row.reply).to_string(),
    });

    let change = match row.next {
        None => Change::None,
        Some(state) => Change::Advance {
            state,
            outcome: row.outcome.or(contact.outcome),
            locality: row.capture_locality.then(|| text.to_string()),
        },
    };

    Step { change, directives }
}
