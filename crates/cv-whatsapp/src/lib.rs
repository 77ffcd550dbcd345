//! cv-whatsapp: WhatsApp Cloud API integration for canvass-gateway
//!
//! Webhook ingress, outbound sends, per-contact serialization and the
//! bounded dispatcher that drives the conversation engine.

pub mod bot;
pub mod cloud_api;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod locks;
pub mod notifier;
pub mod sender;
pub mod types;
pub mod webhook;

pub use bot::WhatsAppBot;
pub use cloud_api::CloudApiClient;
pub use dispatcher::{DispatchStats, Dispatcher};
pub use error::{Result, WhatsAppError};
pub use handler::ConversationHandler;
pub use locks::ContactLocks;
pub use notifier::HandoffNotifier;
pub use sender::{AgentNotifier, MessageSender};
pub use types::{InboundMessage, WebhookPayload};
pub use webhook::{WebhookServer, WebhookState};
