//! Conversation handler implementation

use std::sync::Arc;

use tracing::debug;

use cv_core::{advance, quick_reply, Change, ContactRepository, Directive, Script, Step};

use crate::error::Result;
use crate::locks::ContactLocks;
use crate::sender::{AgentNotifier, MessageSender};

/// Runs one inbound message through the engine and executes the result
pub struct ConversationHandler {
    repository: Arc<dyn ContactRepository>,
    sender: Arc<dyn MessageSender>,
    notifier: Arc<dyn AgentNotifier>,
    script: Arc<Script>,
    locks: ContactLocks,
}

impl ConversationHandler {
    /// Create a new conversation handler
    pub fn new(
        repository: Arc<dyn ContactRepository>,
        sender: Arc<dyn MessageSender>,
        notifier: Arc<dyn AgentNotifier>,
        script: Script,
    ) -> Self {
        Self {
            repository,
            sender,
            notifier,
            script: Arc::new(script),
            locks: ContactLocks::new(),
        }
    }

    pub fn repository(&self) -> &Arc<dyn ContactRepository> {
        &self.repository
    }

    /// Handle one text from `phone`.
    ///
    /// The contact's change is persisted before any directive runs, so a
    /// failed send never rolls back the conversation.
    pub async fn handle_message(&self, phone: &str, text: &str) -> Result<Step> {
        let _guard = self.locks.lock(phone).await;

        let contact = self.repository.get_or_create(phone).await?;
        let step = advance(&contact, text, &self.script);

        if step.is_noop() {
            debug!("No reply for {} in state {}", phone, contact.state);
            return Ok(step);
        }

        match &step.change {
            Change::None => {}
            Change::OptOut => self.repository.mark_opt_out(phone).await?,
            Change::Advance {
                state,
                outcome,
                locality,
            } => {
                debug!("Contact {}: {} -> {}", phone, contact.state, state);
                self.repository
                    .apply_transition(phone, *state, *outcome, locality.as_deref())
                    .await?;
            }
        }

        for directive in &step.directives {
            match directive {
                Directive::Send { text: reply } => {
                    let sent = self.sender.send_text(phone, reply).await;
                    self.repository
                        .append_interaction(phone, sent.as_deref(), text)
                        .await?;
                }
                Directive::NotifyAgent { reason } => {
                    self.notifier.notify(phone, *reason).await;
                }
            }
        }

        Ok(step)
    }

    /// Keyword poll: reply text for `text`, recording the first stance it
    /// names.
    ///
    /// Stop phrases opt the contact out. Opted-out contacts only get the
    /// acknowledgement back and nothing is written.
    pub async fn handle_quick_poll(&self, phone: &str, text: &str) -> Result<String> {
        let _guard = self.locks.lock(phone).await;

        let contact = self.repository.get_or_create(phone).await?;
        let opt_out_ack = self.script.opt_out_ack.as_str();

        if self.script.is_stop_request(&text.trim().to_lowercase()) {
            self.repository.mark_opt_out(phone).await?;
            self.repository
                .append_interaction(phone, Some(opt_out_ack), text)
                .await?;
            return Ok(opt_out_ack.to_string());
        }
        if contact.opt_out {
            debug!("Quick poll from opted-out contact {} ignored", phone);
            return Ok(opt_out_ack.to_string());
        }

        let reply = quick_reply(text);
        if let Some(stance) = reply.stance {
            if contact.is_closed() || contact.outcome.is_some() {
                debug!("Contact {} already has an outcome, {} not recorded", phone, stance);
            } else {
                self.repository.set_outcome(phone, stance).await?;
            }
        }
        self.repository
            .append_interaction(phone, Some(reply.text), text)
            .await?;

        Ok(reply.text.to_string())
    }
}
