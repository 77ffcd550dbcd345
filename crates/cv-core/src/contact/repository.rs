//! Persistence seam used by the message handlers

use async_trait::async_trait;

use crate::contact::{Contact, InteractionRecord};
use crate::conversation::{ConversationState, Outcome};
use crate::report::MetricsReport;
use crate::Result;

/// Contact and interaction-log persistence
#[async_trait]
pub trait ContactRepository: Send + Sync {
    /// Load a contact by phone number
    async fn get(&self, phone: &str) -> Result<Option<Contact>>;

    /// Load a contact, creating it in the start state if absent
    async fn get_or_create(&self, phone: &str) -> Result<Contact>;

    /// Persist a conversation step. A `None` locality keeps the stored one.
    async fn apply_transition(
        &self,
        phone: &str,
        state: ConversationState,
        outcome: Option<Outcome>,
        locality: Option<&str>,
    ) -> Result<()>;

    /// Record a first outcome without moving the conversation. `false` when
    /// the contact is unknown, opted out, or already has one.
    async fn set_outcome(&self, phone: &str, outcome: Outcome) -> Result<bool>;

    /// Set the opt-out flag; idempotent
    async fn mark_opt_out(&self, phone: &str) -> Result<()>;

    /// Append one exchange to the interaction log
    async fn append_interaction(
        &self,
        phone: &str,
        sent_text: Option<&str>,
        received_text: &str,
    ) -> Result<InteractionRecord>;

    /// Interaction log of one contact, oldest first
    async fn interactions(&self, phone: &str) -> Result<Vec<InteractionRecord>>;

    /// Aggregate counts for reporting
    async fn metrics(&self) -> Result<MetricsReport>;
}
