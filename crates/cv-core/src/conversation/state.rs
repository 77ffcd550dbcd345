//! Conversation state and outcome types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Position of a contact in the canvass conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    /// New contact, nothing sent yet
    #[default]
    Start,
    /// Waiting for the 1-4 stance answer
    AwaitingSentiment,
    /// Waiting for the contact's neighbourhood
    AwaitingLocality,
    /// Waiting for a yes/no on talking to an advisor
    AwaitingHandoffConfirmation,
    /// Conversation over
    Finished,
}

impl ConversationState {
    /// Every state, in conversation order
    pub const ALL: [ConversationState; 5] = [
        ConversationState::Start,
        ConversationState::AwaitingSentiment,
        ConversationState::AwaitingLocality,
        ConversationState::AwaitingHandoffConfirmation,
        ConversationState::Finished,
    ];

    /// Storage name of the state
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::AwaitingSentiment => "awaiting_sentiment",
            Self::AwaitingLocality => "awaiting_locality",
            Self::AwaitingHandoffConfirmation => "awaiting_handoff_confirmation",
            Self::Finished => "finished",
        }
    }

    /// States entered after the outcome is known that still wait for one answer
    pub fn awaits_follow_up(self) -> bool {
        matches!(self, Self::AwaitingLocality | Self::AwaitingHandoffConfirmation)
    }

    /// Whether the state has no outgoing transitions
    pub fn is_terminal(self) -> bool {
        self == Self::Finished
    }
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversationState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| Error::Storage(format!("unknown conversation state: {}", s)))
    }
}

/// Final classification of a contact's stance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Supportive,
    Undecided,
    Opposed,
}

impl Outcome {
    pub const ALL: [Outcome; 3] = [Outcome::Supportive, Outcome::Undecided, Outcome::Opposed];

    /// Storage name of the outcome
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Supportive => "supportive",
            Self::Undecided => "undecided",
            Self::Opposed => "opposed",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|outcome| outcome.as_str() == s)
            .ok_or_else(|| Error::Storage(format!("unknown outcome: {}", s)))
    }
}
