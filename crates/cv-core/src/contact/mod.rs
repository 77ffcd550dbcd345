//! Contact management module
//!
//! Provides contact persistence and the append-only interaction log.

mod manager;
mod repository;
mod store;
mod types;

pub use manager::ContactManager;
pub use repository::ContactRepository;
pub use store::ContactStore;
pub use types::{Contact, InteractionRecord};
