//! Shared handle over the SQLite contact store

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::contact::{Contact, ContactRepository, ContactStore, InteractionRecord};
use crate::conversation::{ConversationState, Outcome};
use crate::report::MetricsReport;
use crate::{Error, Result};

/// Thread-safe wrapper around [`ContactStore`]
#[derive(Clone)]
pub struct ContactManager {
    /// Persistent storage (wrapped in Mutex for thread safety)
    store: Arc<Mutex<ContactStore>>,
}

impl ContactManager {
    /// Open the store at `db_path`
    pub fn new(db_path: &str) -> Result<Self> {
        Ok(Self::from_store(ContactStore::new(db_path)?))
    }

    /// Create an in-memory manager (for testing)
    pub fn in_memory() -> Result<Self> {
        Ok(Self::from_store(ContactStore::in_memory()?))
    }

    pub fn from_store(store: ContactStore) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
        }
    }

    fn store(&self) -> Result<MutexGuard<'_, ContactStore>> {
        self.store
            .lock()
            .map_err(|_| Error::Storage("contact store lock poisoned".to_string()))
    }
}

#[async_trait]
impl ContactRepository for ContactManager {
    async fn get(&self, phone: &str) -> Result<Option<Contact>> {
        self.store()?.get(phone)
    }

    async fn get_or_create(&self, phone: &str) -> Result<Contact> {
        self.store()?.get_or_create(phone)
    }

    async fn apply_transition(
        &self,
        phone: &str,
        state: ConversationState,
        outcome: Option<Outcome>,
        locality: Option<&str>,
    ) -> Result<()> {
        self.store()?.apply_transition(phone, state, outcome, locality)
    }

    async fn set_outcome(&self, phone: &str, outcome: Outcome) -> Result<bool> {
        self.store()?.set_outcome(phone, outcome)
    }

    async fn mark_opt_out(&self, phone: &str) -> Result<()> {
        self.store()?.mark_opt_out(phone)
    }

    async fn append_interaction(
        &self,
        phone: &str,
        sent_text: Option<&str>,
        received_text: &str,
    ) -> Result<InteractionRecord> {
        self.store()?.append_interaction(phone, sent_text, received_text)
    }

    async fn interactions(&self, phone: &str) -> Result<Vec<InteractionRecord>> {
        self.store()?.interactions(phone)
    }

    async fn metrics(&self) -> Result<MetricsReport> {
        self.store()?.metrics()
    }
}
