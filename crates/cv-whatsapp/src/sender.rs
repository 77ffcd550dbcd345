//! Outbound seams used by the conversation handler

use async_trait::async_trait;
use cv_core::Outcome;

/// Delivers a text to a contact.
///
/// Returns the text that was sent, or `None` when delivery failed. Failures
/// are logged by the implementation and never propagated.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_text(&self, to: &str, body: &str) -> Option<String>;
}

/// Hands a contact over to a human advisor
#[async_trait]
pub trait AgentNotifier: Send + Sync {
    async fn notify(&self, phone: &str, reason: Option<Outcome>);
}
