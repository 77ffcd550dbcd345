//! WhatsApp Cloud API payload types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, WhatsAppError};

const BUSINESS_ACCOUNT_OBJECT: &str = "whatsapp_business_account";
const MESSAGES_FIELD: &str = "messages";
const MIN_PHONE_DIGITS: usize = 10;

/// Webhook delivery body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Change {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub value: ChangeValue,
}

/// Messages stay raw so one malformed item does not reject its siblings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub messages: Vec<Value>,
}

/// One message as sent by the Cloud API
#[derive(Debug, Clone, Deserialize)]
pub struct RawMessage {
    pub from: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub text: Option<TextBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextBody {
    pub body: String,
}

/// Text message accepted for processing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub phone: String,
    pub text: String,
}

impl InboundMessage {
    pub fn new(phone: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            phone: phone.into(),
            text: text.into(),
        }
    }
}

impl WebhookPayload {
    /// Parse a delivery body
    pub fn parse(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(|e| WhatsAppError::InvalidPayload(e.to_string()))
    }

    /// Text messages worth handing to the conversation handler.
    /// `own_number` is the bot's phone number ID; its messages are dropped.
    pub fn text_messages(&self, own_number: &str) -> Vec<InboundMessage> {
        if self.object != BUSINESS_ACCOUNT_OBJECT {
            debug!("Ignoring webhook object: {}", self.object);
            return Vec::new();
        }

        self.entry
            .iter()
            .flat_map(|entry| entry.changes.iter())
            .filter(|change| change.field == MESSAGES_FIELD)
            .flat_map(|change| change.value.messages.iter())
            .filter_map(|raw| match accept_message(raw, own_number) {
                Ok(message) => message,
                Err(e) => {
                    debug!("Skipping message: {}", e);
                    None
                }
            })
            .collect()
    }
}

fn accept_message(raw: &Value, own_number: &str) -> Result<Option<InboundMessage>> {
    let message: RawMessage = serde_json::from_value(raw.clone())
        .map_err(|e| WhatsAppError::InvalidPayload(e.to_string()))?;

    if message.kind != "text" {
        return Ok(None);
    }
    if message.from == own_number {
        return Ok(None);
    }
    if !is_valid_phone(&message.from) {
        return Err(WhatsAppError::InvalidPayload(format!(
            "invalid sender: {}",
            message.from
        )));
    }

    let Some(text) = message.text else {
        return Err(WhatsAppError::InvalidPayload(
            "text message without body".to_string(),
        ));
    };
    if text.body.trim().is_empty() {
        return Ok(None);
    }

    Ok(Some(InboundMessage::new(message.from, text.body)))
}

/// All ASCII digits, at least ten of them
pub fn is_valid_phone(phone: &str) -> bool {
    phone.len() >= MIN_PHONE_DIGITS && phone.bytes().all(|b| b.is_ascii_digit())
}

/// Outbound text message body
#[derive(Debug, Clone, Serialize)]
pub struct SendTextRequest<'a> {
    pub messaging_product: &'static str,
    pub to: &'a str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: SendText<'a>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendText<'a> {
    pub body: &'a str,
}

impl<'a> SendTextRequest<'a> {
    pub fn new(to: &'a str, body: &'a str) -> Self {
        Self {
            messaging_product: "whatsapp",
            to,
            kind: "text",
            text: SendText { body },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const OWN: &str = "1098765432";

    fn delivery(messages: Value) -> Vec<u8> {
        json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "changes": [{
                    "field": "messages",
                    "value": { "messages": messages }
                }]
            }]
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn test_extracts_text_messages() {
        let body = delivery(json!([
            { "from": "573001234567", "type": "text", "text": { "body": "hola" } },
            { "from": "573009999999", "type": "text", "text": { "body": "1" } }
        ]));
        let payload = WebhookPayload::parse(&body).unwrap();

        let messages = payload.text_messages(OWN);
        assert_eq!(
            messages,
            vec![
                InboundMessage::new("573001234567", "hola"),
                InboundMessage::new("573009999999", "1"),
            ]
        );
    }

    #[test]
    fn test_filters_non_text_and_own_messages() {
        let body = delivery(json!([
            { "from": "573001234567", "type": "image", "image": { "id": "x" } },
            { "from": OWN, "type": "text", "text": { "body": "echo" } },
            { "from": "573001234567", "type": "text", "text": { "body": "   " } }
        ]));
        let payload = WebhookPayload::parse(&body).unwrap();

        assert!(payload.text_messages(OWN).is_empty());
    }

    #[test]
    fn test_malformed_message_does_not_drop_siblings() {
        let body = delivery(json!([
            { "type": "text", "text": { "body": "no sender" } },
            { "from": "12345", "type": "text", "text": { "body": "short" } },
            { "from": "57300abc4567", "type": "text", "text": { "body": "letters" } },
            { "from": "573001234567", "type": "text" },
            { "from": "573001234567", "type": "text", "text": { "body": "2" } }
        ]));
        let payload = WebhookPayload::parse(&body).unwrap();

        assert_eq!(
            payload.text_messages(OWN),
            vec![InboundMessage::new("573001234567", "2")]
        );
    }

    #[test]
    fn test_other_objects_and_fields_ignored() {
        let body = json!({
            "object": "page",
            "entry": [{ "changes": [{ "field": "messages", "value": { "messages": [
                { "from": "573001234567", "type": "text", "text": { "body": "hola" } }
            ] } }] }]
        })
        .to_string();
        let payload = WebhookPayload::parse(body.as_bytes()).unwrap();
        assert!(payload.text_messages(OWN).is_empty());

        let body = json!({
            "object": "whatsapp_business_account",
            "entry": [{ "changes": [{ "field": "statuses", "value": { "messages": [
                { "from": "573001234567", "type": "text", "text": { "body": "hola" } }
            ] } }] }]
        })
        .to_string();
        let payload = WebhookPayload::parse(body.as_bytes()).unwrap();
        assert!(payload.text_messages(OWN).is_empty());
    }

    #[test]
    fn test_missing_sections_default_to_empty() {
        let payload = WebhookPayload::parse(br#"{"object":"whatsapp_business_account"}"#).unwrap();
        assert!(payload.text_messages(OWN).is_empty());

        let payload = WebhookPayload::parse(
            br#"{"object":"whatsapp_business_account","entry":[{"changes":[{"field":"messages","value":{}}]}]}"#,
        )
        .unwrap();
        assert!(payload.text_messages(OWN).is_empty());
    }

    #[test]
    fn test_unparseable_body() {
        assert!(matches!(
            WebhookPayload::parse(b"not json"),
            Err(WhatsAppError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_is_valid_phone() {
        assert!(is_valid_phone("5730012345"));
        assert!(is_valid_phone("573001234567"));
        assert!(!is_valid_phone("123456789"));
        assert!(!is_valid_phone("+573001234567"));
        assert!(!is_valid_phone(""));
    }

    #[test]
    fn test_send_request_shape() {
        let value = serde_json::to_value(SendTextRequest::new("573001234567", "hola")).unwrap();
        assert_eq!(
            value,
            json!({
                "messaging_product": "whatsapp",
                "to": "573001234567",
                "type": "text",
                "text": { "body": "hola" }
            })
        );
    }
}
