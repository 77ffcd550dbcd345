//! Human advisor handoff

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use cv_core::Outcome;

use crate::sender::{AgentNotifier, MessageSender};

/// Logs every handoff and forwards it to the configured advisors
pub struct HandoffNotifier {
    sender: Arc<dyn MessageSender>,
    agent_numbers: Vec<String>,
}

impl HandoffNotifier {
    pub fn new(sender: Arc<dyn MessageSender>, agent_numbers: Vec<String>) -> Self {
        Self {
            sender,
            agent_numbers,
        }
    }

    fn message(phone: &str, reason: Option<Outcome>) -> String {
        match reason {
            Some(outcome) => format!(
                "Nuevo contacto para asesor: {} (postura: {})",
                phone, outcome
            ),
            None => format!("Nuevo contacto para asesor: {}", phone),
        }
    }
}

#[async_trait]
impl AgentNotifier for HandoffNotifier {
    async fn notify(&self, phone: &str, reason: Option<Outcome>) {
        info!(
            phone = %phone,
            reason = ?reason,
            "Handoff to human advisor requested"
        );

        if self.agent_numbers.is_empty() {
            return;
        }

        let text = Self::message(phone, reason);
        for agent in &self.agent_numbers {
            if self.sender.send_text(agent, &text).await.is_none() {
                warn!("Could not notify advisor {} about {}", agent, phone);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl MessageSender for RecordingSender {
        async fn send_text(&self, to: &str, body: &str) -> Option<String> {
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), body.to_string()));
            Some(body.to_string())
        }
    }

    #[tokio::test]
    async fn test_forwards_to_each_advisor() {
        let sender = Arc::new(RecordingSender::default());
        let notifier = HandoffNotifier::new(
            sender.clone(),
            vec!["573001111111".to_string(), "573002222222".to_string()],
        );

        notifier.notify("573001234567", Some(Outcome::Undecided)).await;

        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, "573001111111");
        assert_eq!(sent[1].0, "573002222222");
        assert!(sent[0].1.contains("573001234567"));
        assert!(sent[0].1.contains("undecided"));
    }

    #[tokio::test]
    async fn test_without_advisors_only_logs() {
        let sender = Arc::new(RecordingSender::default());
        let notifier = HandoffNotifier::new(sender.clone(), Vec::new());

        notifier.notify("573001234567", None).await;

        assert!(sender.sent.lock().unwrap().is_empty());
    }
}
