//! cv-core: Canvass Gateway Core Library
//!
//! Conversation engine, contact persistence, reporting and configuration
//! shared by the WhatsApp gateway and the interactive console.

pub mod config;
pub mod contact;
pub mod conversation;
pub mod error;
pub mod report;

pub use config::{Config, DatabaseConfig, DispatchConfig, HandoffConfig, ServerConfig, WhatsAppConfig};
pub use contact::{Contact, ContactManager, ContactRepository, ContactStore, InteractionRecord};
pub use conversation::{
    advance, quick_reply, Change, ConversationState, Directive, Outcome, QuickPollReply, Script, Step,
};
pub use error::{Error, Result};
pub use report::MetricsReport;
