//! Contact persistence using SQLite

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use crate::contact::{Contact, InteractionRecord};
use crate::conversation::{ConversationState, Outcome};
use crate::report::MetricsReport;
use crate::{Error, Result};

const CONTACT_COLUMNS: &str = "phone, state, outcome, opt_out, locality, first_seen_at";

/// SQLite-based contact store
pub struct ContactStore {
    conn: Connection,
}

impl ContactStore {
    /// Open (or create) the store at `db_path`
    pub fn new(db_path: &str) -> Result<Self> {
        debug!("Opening contact database at: {}", db_path);
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)?;
        let store = Self { conn };
        store.init_tables()?;
        info!("ContactStore initialized at {}", db_path);
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_tables()?;
        Ok(store)
    }

    /// Initialize database tables
    fn init_tables(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS contacts (
                phone TEXT PRIMARY KEY,
                state TEXT NOT NULL DEFAULT 'start',
                outcome TEXT,
                opt_out INTEGER NOT NULL DEFAULT 0,
                locality TEXT,
                first_seen_at TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS interactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                phone TEXT NOT NULL,
                sent_text TEXT,
                received_text TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_interactions_phone ON interactions(phone)",
            [],
        )?;

        Ok(())
    }

    /// Load a contact by phone number
    pub fn get(&self, phone: &str) -> Result<Option<Contact>> {
        let contact = self
            .conn
            .query_row(
                &format!("SELECT {} FROM contacts WHERE phone = ?1", CONTACT_COLUMNS),
                params![phone],
                contact_from_row,
            )
            .optional()?;
        Ok(contact)
    }

    /// Load a contact, creating it in the start state if absent
    pub fn get_or_create(&self, phone: &str) -> Result<Contact> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO contacts (phone, state, opt_out, first_seen_at)
             VALUES (?1, ?2, 0, ?3)",
            params![phone, ConversationState::Start.as_str(), Utc::now().to_rfc3339()],
        )?;
        if inserted > 0 {
            info!("New contact: {}", phone);
        }

        self.get(phone)?
            .ok_or_else(|| Error::Storage(format!("contact {} missing after insert", phone)))
    }

    /// Move a contact to `state`. A `None` locality keeps the stored one.
    pub fn apply_transition(
        &self,
        phone: &str,
        state: ConversationState,
        outcome: Option<Outcome>,
        locality: Option<&str>,
    ) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE contacts SET state = ?1, outcome = ?2, locality = COALESCE(?3, locality)
             WHERE phone = ?4",
            params![state.as_str(), outcome.map(Outcome::as_str), locality, phone],
        )?;
        if updated == 0 {
            return Err(Error::Storage(format!("contact not found: {}", phone)));
        }
        debug!("Contact {} -> {}", phone, state);
        Ok(())
    }

    /// Record a first outcome without touching the conversation state.
    ///
    /// Returns `false` when nothing was written: the contact is unknown,
    /// opted out, or already has an outcome.
    pub fn set_outcome(&self, phone: &str, outcome: Outcome) -> Result<bool> {
        let updated = self.conn.execute(
            "UPDATE contacts SET outcome = ?1
             WHERE phone = ?2 AND outcome IS NULL AND opt_out = 0",
            params![outcome.as_str(), phone],
        )?;
        Ok(updated > 0)
    }

    /// Opt a contact out. Unknown numbers are stored already opted out.
    pub fn mark_opt_out(&self, phone: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO contacts (phone, state, opt_out, first_seen_at) VALUES (?1, ?2, 1, ?3)
             ON CONFLICT(phone) DO UPDATE SET opt_out = 1",
            params![phone, ConversationState::Start.as_str(), Utc::now().to_rfc3339()],
        )?;
        info!("Contact {} opted out", phone);
        Ok(())
    }

    /// Append one exchange to the interaction log
    pub fn append_interaction(
        &self,
        phone: &str,
        sent_text: Option<&str>,
        received_text: &str,
    ) -> Result<InteractionRecord> {
        let created_at = Utc::now();
        self.conn.execute(
            "INSERT INTO interactions (phone, sent_text, received_text, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![phone, sent_text, received_text, created_at.to_rfc3339()],
        )?;

        Ok(InteractionRecord {
            id: self.conn.last_insert_rowid(),
            phone: phone.to_string(),
            sent_text: sent_text.map(str::to_string),
            received_text: received_text.to_string(),
            created_at,
        })
    }

    /// Interaction log of one contact, oldest first
    pub fn interactions(&self, phone: &str) -> Result<Vec<InteractionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, phone, sent_text, received_text, created_at FROM interactions
             WHERE phone = ?1 ORDER BY id ASC",
        )?;

        let rows = stmt.query_map(params![phone], |row| {
            let created_at: String = row.get(4)?;
            Ok(InteractionRecord {
                id: row.get(0)?,
                phone: row.get(1)?,
                sent_text: row.get(2)?,
                received_text: row.get(3)?,
                created_at: parse_timestamp(4, &created_at)?,
            })
        })?;

        let mut result = Vec::new();
        for record in rows {
            result.push(record?);
        }
        Ok(result)
    }

    /// Aggregate counts for reporting
    pub fn metrics(&self) -> Result<MetricsReport> {
        let count = |sql: &str| -> Result<u64> {
            let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n.max(0) as u64)
        };
        let count_outcome = |outcome: Outcome| -> Result<u64> {
            let n: i64 = self.conn.query_row(
                "SELECT COUNT(*) FROM contacts WHERE outcome = ?1",
                params![outcome.as_str()],
                |row| row.get(0),
            )?;
            Ok(n.max(0) as u64)
        };

        Ok(MetricsReport::from_counts(
            count("SELECT COUNT(*) FROM contacts")?,
            count("SELECT COUNT(*) FROM interactions")?,
            count_outcome(Outcome::Supportive)?,
            count_outcome(Outcome::Undecided)?,
            count_outcome(Outcome::Opposed)?,
            count("SELECT COUNT(*) FROM contacts WHERE opt_out = 1")?,
        ))
    }
}

fn contact_from_row(row: &Row<'_>) -> rusqlite::Result<Contact> {
    let state: String = row.get(1)?;
    let outcome: Option<String> = row.get(2)?;
    let first_seen_at: String = row.get(5)?;

    Ok(Contact {
        phone: row.get(0)?,
        state: parse_column(1, &state)?,
        outcome: outcome.map(|o| parse_column(2, &o)).transpose()?,
        opt_out: row.get(3)?,
        locality: row.get(4)?,
        first_seen_at: parse_timestamp(5, &first_seen_at)?,
    })
}

fn parse_column<T: FromStr<Err = Error>>(idx: usize, value: &str) -> rusqlite::Result<T> {
    value
        .parse()
        .map_err(|e: Error| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create() {
        let store = ContactStore::in_memory().unwrap();
        assert!(store.get("573001234567").unwrap().is_none());

        let created = store.get_or_create("573001234567").unwrap();
        assert_eq!(created.state, ConversationState::Start);
        assert!(!created.opt_out);

        let again = store.get_or_create("573001234567").unwrap();
        assert_eq!(again.first_seen_at, created.first_seen_at);
    }

    #[test]
    fn test_apply_transition() {
        let store = ContactStore::in_memory().unwrap();
        store.get_or_create("573001234567").unwrap();

        store
            .apply_transition(
                "573001234567",
                ConversationState::AwaitingLocality,
                Some(Outcome::Supportive),
                None,
            )
            .unwrap();
        store
            .apply_transition(
                "573001234567",
                ConversationState::Finished,
                Some(Outcome::Supportive),
                Some("Barrio Centro"),
            )
            .unwrap();

        let contact = store.get("573001234567").unwrap().unwrap();
        assert_eq!(contact.state, ConversationState::Finished);
        assert_eq!(contact.outcome, Some(Outcome::Supportive));
        assert_eq!(contact.locality.as_deref(), Some("Barrio Centro"));
    }

    #[test]
    fn test_transition_keeps_locality_when_none() {
        let store = ContactStore::in_memory().unwrap();
        store.get_or_create("573001234567").unwrap();
        store
            .apply_transition("573001234567", ConversationState::Finished, None, Some("Centro"))
            .unwrap();
        store
            .apply_transition("573001234567", ConversationState::Finished, None, None)
            .unwrap();

        let contact = store.get("573001234567").unwrap().unwrap();
        assert_eq!(contact.locality.as_deref(), Some("Centro"));
    }

    #[test]
    fn test_transition_unknown_contact_fails() {
        let store = ContactStore::in_memory().unwrap();
        let result = store.apply_transition("573009999999", ConversationState::Finished, None, None);
        assert!(matches!(result, Err(Error::Storage(_))));
    }

    #[test]
    fn test_mark_opt_out_is_idempotent() {
        let store = ContactStore::in_memory().unwrap();
        store.get_or_create("573001234567").unwrap();

        store.mark_opt_out("573001234567").unwrap();
        store.mark_opt_out("573001234567").unwrap();

        let contact = store.get("573001234567").unwrap().unwrap();
        assert!(contact.opt_out);
        assert_eq!(contact.state, ConversationState::Start);
    }

    #[test]
    fn test_mark_opt_out_creates_unknown_contact() {
        let store = ContactStore::in_memory().unwrap();
        store.mark_opt_out("573001234567").unwrap();

        let contact = store.get("573001234567").unwrap().unwrap();
        assert!(contact.opt_out);
    }

    #[test]
    fn test_interactions_are_appended_in_order() {
        let store = ContactStore::in_memory().unwrap();
        store.append_interaction("573001234567", Some("hola"), "buenas").unwrap();
        store.append_interaction("573001234567", None, "1").unwrap();
        store.append_interaction("573007654321", Some("otro"), "x").unwrap();

        let log = store.interactions("573001234567").unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].sent_text.as_deref(), Some("hola"));
        assert_eq!(log[1].sent_text, None);
        assert_eq!(log[1].received_text, "1");
        assert!(log[0].id < log[1].id);
    }

    #[test]
    fn test_metrics() {
        let store = ContactStore::in_memory().unwrap();
        assert_eq!(store.metrics().unwrap(), MetricsReport::default());

        for phone in ["5730000000001", "5730000000002", "5730000000003", "5730000000004"] {
            store.get_or_create(phone).unwrap();
        }
        assert!(store.set_outcome("5730000000001", Outcome::Supportive).unwrap());
        assert!(store.set_outcome("5730000000002", Outcome::Undecided).unwrap());
        assert!(store.set_outcome("5730000000003", Outcome::Opposed).unwrap());
        store.mark_opt_out("5730000000004").unwrap();
        store.append_interaction("5730000000001", Some("a"), "b").unwrap();

        let report = store.metrics().unwrap();
        assert_eq!(report.total, 4);
        assert_eq!(report.responses, 1);
        assert_eq!(report.supportive, 1);
        assert_eq!(report.undecided, 1);
        assert_eq!(report.opposed, 1);
        assert_eq!(report.opted_out, 1);
        assert_eq!(report.response_rate, 25.0);
    }

    #[test]
    fn test_set_outcome_only_records_first_stance() {
        let store = ContactStore::in_memory().unwrap();
        store.get_or_create("573001234567").unwrap();

        assert!(store.set_outcome("573001234567", Outcome::Supportive).unwrap());
        assert!(!store.set_outcome("573001234567", Outcome::Opposed).unwrap());

        let contact = store.get("573001234567").unwrap().unwrap();
        assert_eq!(contact.outcome, Some(Outcome::Supportive));
    }

    #[test]
    fn test_set_outcome_skips_opted_out_and_unknown() {
        let store = ContactStore::in_memory().unwrap();
        store.mark_opt_out("573001234567").unwrap();

        assert!(!store.set_outcome("573001234567", Outcome::Supportive).unwrap());
        assert!(!store.set_outcome("573009999999", Outcome::Supportive).unwrap());

        assert!(store.get("573001234567").unwrap().unwrap().outcome.is_none());
        assert!(store.get("573009999999").unwrap().is_none());
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("canvass.db");
        let path = path.to_str().unwrap();

        {
            let store = ContactStore::new(path).unwrap();
            store.get_or_create("573001234567").unwrap();
            store.mark_opt_out("573001234567").unwrap();
        }

        let store = ContactStore::new(path).unwrap();
        assert!(store.get("573001234567").unwrap().unwrap().opt_out);
    }
}
