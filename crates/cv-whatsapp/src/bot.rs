//! WhatsApp bot wrapper

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use cv_core::{Config, ContactRepository};

use crate::cloud_api::CloudApiClient;
use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::handler::ConversationHandler;
use crate::notifier::HandoffNotifier;
use crate::webhook::{WebhookServer, WebhookState};

/// Wires the Cloud API client, conversation handler and webhook server
pub struct WhatsAppBot {
    state: Arc<WebhookState>,
    port: u16,
}

impl WhatsAppBot {
    /// Create a new WhatsApp bot
    pub fn new(config: &Config, repository: Arc<dyn ContactRepository>) -> Result<Self> {
        let client = Arc::new(CloudApiClient::new(&config.whatsapp)?);
        let notifier = Arc::new(HandoffNotifier::new(
            client.clone(),
            config.handoff.agent_numbers.clone(),
        ));
        let handler = Arc::new(ConversationHandler::new(
            repository,
            client.clone(),
            notifier,
            config.script.clone(),
        ));
        let dispatcher = Arc::new(Dispatcher::new(handler, config.dispatch.max_in_flight));

        let state = Arc::new(WebhookState {
            dispatcher,
            verify_token: config.whatsapp.verify_token.clone(),
            phone_number_id: client.phone_number_id().to_string(),
            metrics_key: config.server.metrics_key.clone(),
        });

        Ok(Self {
            state,
            port: config.server.port,
        })
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.state.dispatcher)
    }

    /// Serve webhooks until `shutdown` resolves, then finish in-flight messages
    pub async fn start<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = ([0, 0, 0, 0], self.port).into();
        let dispatcher = self.dispatcher();

        WebhookServer::new(addr, self.state).start(shutdown).await?;

        info!("Webhook server stopped, draining dispatcher");
        dispatcher.drain().await;

        let stats = dispatcher.stats();
        info!(
            "Dispatcher drained: {} completed, {} failed",
            stats.completed, stats.failed
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cv_core::ContactManager;

    #[test]
    fn test_requires_credentials() {
        let repo: Arc<dyn ContactRepository> = Arc::new(ContactManager::in_memory().unwrap());
        assert!(WhatsAppBot::new(&Config::default(), repo).is_err());
    }

    #[tokio::test]
    async fn test_builds_from_config() {
        let mut config = Config::default();
        config.whatsapp.access_token = "token".to_string();
        config.whatsapp.phone_number_id = "1098765432".to_string();
        config.dispatch.max_in_flight = 3;

        let repo: Arc<dyn ContactRepository> = Arc::new(ContactManager::in_memory().unwrap());
        let bot = WhatsAppBot::new(&config, repo).unwrap();

        assert_eq!(bot.state.phone_number_id, "1098765432");
        assert_eq!(bot.dispatcher().stats().submitted, 0);
    }
}
