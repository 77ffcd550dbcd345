//! WhatsApp Cloud API client
//!
//! Sends text messages through the Graph API messages endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, info};

use cv_core::WhatsAppConfig;

use crate::error::{Result, WhatsAppError};
use crate::sender::MessageSender;
use crate::types::SendTextRequest;

/// Graph API client bound to one business phone number
#[derive(Debug, Clone)]
pub struct CloudApiClient {
    client: Client,
    access_token: String,
    phone_number_id: String,
    messages_url: String,
}

#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    #[serde(default)]
    messages: Vec<MessageId>,
}

#[derive(Debug, Deserialize)]
struct MessageId {
    id: String,
}

impl CloudApiClient {
    /// Create a new client
    pub fn new(config: &WhatsAppConfig) -> Result<Self> {
        if config.access_token.is_empty() || config.phone_number_id.is_empty() {
            return Err(WhatsAppError::Config(
                "WhatsApp access token and phone number ID are required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.send_timeout_secs))
            .build()?;

        let messages_url = format!(
            "{}/{}/{}/messages",
            config.base_url.trim_end_matches('/'),
            config.api_version,
            config.phone_number_id
        );

        Ok(Self {
            client,
            access_token: config.access_token.clone(),
            phone_number_id: config.phone_number_id.clone(),
            messages_url,
        })
    }

    /// The bot's own phone number ID
    pub fn phone_number_id(&self) -> &str {
        &self.phone_number_id
    }

    /// Send a text message, returning the provider's message ID
    pub async fn send_message(&self, to: &str, body: &str) -> Result<String> {
        debug!("Sending WhatsApp message to {}", to);

        let response = self
            .client
            .post(&self.messages_url)
            .bearer_auth(&self.access_token)
            .json(&SendTextRequest::new(to, body))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(WhatsAppError::Api(format!("{}: {}", status, text)));
        }

        let result: SendMessageResponse = response.json().await?;
        let id = result
            .messages
            .into_iter()
            .next()
            .map(|m| m.id)
            .unwrap_or_default();

        info!("Message sent to {} ({})", to, id);
        Ok(id)
    }
}

#[async_trait]
impl MessageSender for CloudApiClient {
    async fn send_text(&self, to: &str, body: &str) -> Option<String> {
        match self.send_message(to, body).await {
            Ok(_) => Some(body.to_string()),
            Err(e) => {
                error!("Failed to send message to {}: {}", to, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str) -> WhatsAppConfig {
        WhatsAppConfig {
            access_token: "test-token".to_string(),
            phone_number_id: "1098765432".to_string(),
            base_url: base_url.to_string(),
            send_timeout_secs: 2,
            ..WhatsAppConfig::default()
        }
    }

    #[test]
    fn test_requires_credentials() {
        let mut cfg = config("http://localhost");
        cfg.access_token.clear();
        assert!(matches!(
            CloudApiClient::new(&cfg),
            Err(WhatsAppError::Config(_))
        ));
    }

    #[test]
    fn test_messages_url() {
        let client = CloudApiClient::new(&config("https://graph.example.com/")).unwrap();
        assert_eq!(
            client.messages_url,
            "https://graph.example.com/v20.0/1098765432/messages"
        );
        assert_eq!(client.phone_number_id(), "1098765432");
    }

    #[tokio::test]
    async fn test_send_text_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v20.0/1098765432/messages"))
            .and(header("authorization", "Bearer test-token"))
            .and(body_json(json!({
                "messaging_product": "whatsapp",
                "to": "573001234567",
                "type": "text",
                "text": { "body": "hola" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "messaging_product": "whatsapp",
                "contacts": [{ "input": "573001234567", "wa_id": "573001234567" }],
                "messages": [{ "id": "wamid.ABC" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = CloudApiClient::new(&config(&server.uri())).unwrap();

        assert_eq!(
            client.send_message("573001234567", "hola").await.unwrap(),
            "wamid.ABC"
        );
    }

    #[tokio::test]
    async fn test_send_text_returns_sent_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "messages": [{ "id": "x" }] })),
            )
            .mount(&server)
            .await;

        let client = CloudApiClient::new(&config(&server.uri())).unwrap();
        assert_eq!(
            client.send_text("573001234567", "gracias").await.as_deref(),
            Some("gracias")
        );
    }

    #[tokio::test]
    async fn test_api_error_is_swallowed_by_sender() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid token"))
            .mount(&server)
            .await;

        let client = CloudApiClient::new(&config(&server.uri())).unwrap();

        let err = client.send_message("573001234567", "hola").await.unwrap_err();
        assert!(matches!(err, WhatsAppError::Api(msg) if msg.contains("invalid token")));
        assert!(client.send_text("573001234567", "hola").await.is_none());
    }

    #[tokio::test]
    async fn test_timeout_yields_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "messages": [] }))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let mut cfg = config(&server.uri());
        cfg.send_timeout_secs = 1;
        let client = CloudApiClient::new(&cfg).unwrap();

        assert!(client.send_text("573001234567", "hola").await.is_none());
    }
}
