//! Contact types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conversation::{ConversationState, Outcome};

/// A phone number taking part in the canvass conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    /// Channel address, digits only
    pub phone: String,
    pub state: ConversationState,
    pub outcome: Option<Outcome>,
    /// Never reset once set
    pub opt_out: bool,
    pub locality: Option<String>,
    pub first_seen_at: DateTime<Utc>,
}

impl Contact {
    /// Create a new contact in the start state
    pub fn new(phone: impl Into<String>) -> Self {
        Self {
            phone: phone.into(),
            state: ConversationState::Start,
            outcome: None,
            opt_out: false,
            locality: None,
            first_seen_at: Utc::now(),
        }
    }

    /// Whether inbound messages (other than stop phrases) should be dropped.
    ///
    /// A recorded outcome closes the conversation unless the current state
    /// is still waiting for its one follow-up answer.
    pub fn is_closed(&self) -> bool {
        self.opt_out
            || self.state.is_terminal()
            || (self.outcome.is_some() && !self.state.awaits_follow_up())
    }
}

/// One exchange in the interaction log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub id: i64,
    pub phone: String,
    /// `None` when the outbound send failed
    pub sent_text: Option<String>,
    pub received_text: String,
    pub created_at: DateTime<Utc>,
}
