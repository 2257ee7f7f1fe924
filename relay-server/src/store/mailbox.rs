//! redb-based storage layer for panel mailboxes
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `mailboxes` | `(mailbox_key, seq)` | `Record` | Mailbox contents |
//! | `revisions` | `mailbox_key` | `u64` | Per-key revision for compare-and-swap |
//! | `sequence_counter` | `()` | `u64` | Global append sequence |
//!
//! # Durability
//!
//! redb commits are persistent as soon as `commit()` returns, so a relay
//! restart never loses an acknowledged write. This matters on the small
//! on-premise boxes the relay runs on, which get powered off at closing
//! time without ceremony.
//!
//! # Read tolerance
//!
//! Writes are validated; reads are not. A value that no longer parses is
//! skipped with a warning instead of failing the whole mailbox, so one
//! bad record cannot take a panel down.

use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};
use shared::records::{Record, StoredRecord};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Table for mailbox contents: key = (mailbox_key, seq), value = JSON-serialized Record
const MAILBOXES_TABLE: TableDefinition<(&str, u64), &[u8]> = TableDefinition::new("mailboxes");

/// Table for per-key revisions: key = mailbox_key, value = revision counter
const REVISIONS_TABLE: TableDefinition<&str, u64> = TableDefinition::new("revisions");

/// Table for the global sequence counter: key = "seq", value = u64
const SEQUENCE_TABLE: TableDefinition<&str, u64> = TableDefinition::new("sequence_counter");

const SEQUENCE_KEY: &str = "seq";

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid mailbox key: {0}")]
    InvalidKey(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Revision conflict on '{key}': expected {expected}, actual {actual}")]
    RevisionConflict {
        key: String,
        expected: u64,
        actual: u64,
    },
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Mailbox storage backed by redb
#[derive(Clone)]
pub struct MailboxStore {
    db: Arc<Database>,
}

impl MailboxStore {
    /// Open or create the database at the given path
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::initialize(db)
    }

    /// Open an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::initialize(db)
    }

    fn initialize(db: Database) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(MAILBOXES_TABLE)?;
            let _ = write_txn.open_table(REVISIONS_TABLE)?;

            let mut seq_table = write_txn.open_table(SEQUENCE_TABLE)?;
            if seq_table.get(SEQUENCE_KEY)?.is_none() {
                seq_table.insert(SEQUENCE_KEY, 0u64)?;
            }
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Begin a write transaction
    pub fn begin_write(&self) -> StorageResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    fn check_key(key: &str) -> StorageResult<()> {
        if !shared::keys::is_valid_key(key) {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(())
    }

    fn check_record(record: &Record) -> StorageResult<()> {
        record.validate().map_err(StorageError::InvalidRecord)
    }

    // ========== Sequence Operations ==========

    /// Increment and return the global sequence number
    fn increment_sequence(&self, txn: &WriteTransaction) -> StorageResult<u64> {
        let mut table = txn.open_table(SEQUENCE_TABLE)?;
        let current = table
            .get(SEQUENCE_KEY)?
            .map(|guard| guard.value())
            .unwrap_or(0);
        let next = current + 1;
        table.insert(SEQUENCE_KEY, next)?;
        Ok(next)
    }

    /// Get current global sequence (read-only)
    pub fn current_sequence(&self) -> StorageResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SEQUENCE_TABLE)?;
        Ok(table
            .get(SEQUENCE_KEY)?
            .map(|guard| guard.value())
            .unwrap_or(0))
    }

    // ========== Revision Operations ==========

    /// Current revision of a mailbox (0 when never written)
    pub fn revision(&self, key: &str) -> StorageResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(REVISIONS_TABLE)?;
        Ok(table.get(key)?.map(|guard| guard.value()).unwrap_or(0))
    }

    fn bump_revision(&self, txn: &WriteTransaction, key: &str) -> StorageResult<u64> {
        let mut table = txn.open_table(REVISIONS_TABLE)?;
        let current = table.get(key)?.map(|guard| guard.value()).unwrap_or(0);
        let next = current + 1;
        table.insert(key, next)?;
        Ok(next)
    }

    fn revision_txn(&self, txn: &WriteTransaction, key: &str) -> StorageResult<u64> {
        let table = txn.open_table(REVISIONS_TABLE)?;
        Ok(table.get(key)?.map(|guard| guard.value()).unwrap_or(0))
    }

    // ========== Mailbox Operations ==========

    /// Read a whole mailbox in append order.
    ///
    /// Unknown keys read as empty. Values that fail to parse are skipped.
    pub fn read(&self, key: &str) -> StorageResult<Vec<StoredRecord>> {
        Self::check_key(key)?;
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(MAILBOXES_TABLE)?;

        let mut records = Vec::new();
        let range_start = (key, 0u64);
        let range_end = (key, u64::MAX);

        for result in table.range(range_start..=range_end)? {
            let (entry_key, value) = result?;
            let seq = entry_key.value().1;
            match serde_json::from_slice::<Record>(value.value()) {
                Ok(record) => records.push(StoredRecord { seq, record }),
                Err(e) => {
                    tracing::warn!(mailbox = %key, seq, error = %e, "skipping unreadable record");
                }
            }
        }

        Ok(records)
    }

    /// Read records appended after `since_seq`
    pub fn read_since(&self, key: &str, since_seq: u64) -> StorageResult<Vec<StoredRecord>> {
        Self::check_key(key)?;
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(MAILBOXES_TABLE)?;

        let mut records = Vec::new();
        let range_start = (key, since_seq.saturating_add(1));
        let range_end = (key, u64::MAX);

        for result in table.range(range_start..=range_end)? {
            let (entry_key, value) = result?;
            let seq = entry_key.value().1;
            match serde_json::from_slice::<Record>(value.value()) {
                Ok(record) => records.push(StoredRecord { seq, record }),
                Err(e) => {
                    tracing::warn!(mailbox = %key, seq, error = %e, "skipping unreadable record");
                }
            }
        }

        Ok(records)
    }

    /// Append one record, assigning it the next global sequence.
    ///
    /// The record is validated before anything is written.
    pub fn append(&self, key: &str, record: Record) -> StorageResult<StoredRecord> {
        Self::check_key(key)?;
        Self::check_record(&record)?;

        let txn = self.begin_write()?;
        let stored = {
            let seq = self.increment_sequence(&txn)?;
            let mut table = txn.open_table(MAILBOXES_TABLE)?;
            let value = serde_json::to_vec(&record)?;
            table.insert((key, seq), value.as_slice())?;
            drop(table);
            self.bump_revision(&txn, key)?;
            StoredRecord { seq, record }
        };
        txn.commit()?;
        Ok(stored)
    }

    /// Replace a mailbox's entire contents.
    ///
    /// When `expected_revision` is given the write only goes through if
    /// the mailbox is still at that revision; otherwise it fails with
    /// `RevisionConflict` and nothing changes. Every record gets a fresh
    /// sequence. Returns the new revision.
    pub fn replace(
        &self,
        key: &str,
        records: Vec<Record>,
        expected_revision: Option<u64>,
    ) -> StorageResult<u64> {
        Self::check_key(key)?;
        for record in &records {
            Self::check_record(record)?;
        }

        let txn = self.begin_write()?;
        let new_revision = {
            if let Some(expected) = expected_revision {
                let actual = self.revision_txn(&txn, key)?;
                if actual != expected {
                    return Err(StorageError::RevisionConflict {
                        key: key.to_string(),
                        expected,
                        actual,
                    });
                }
            }

            let mut table = txn.open_table(MAILBOXES_TABLE)?;
            let old_seqs = collect_seqs(&table, key)?;
            for seq in old_seqs {
                table.remove((key, seq))?;
            }
            drop(table);

            for record in &records {
                let seq = self.increment_sequence(&txn)?;
                let mut table = txn.open_table(MAILBOXES_TABLE)?;
                let value = serde_json::to_vec(record)?;
                table.insert((key, seq), value.as_slice())?;
            }

            self.bump_revision(&txn, key)?
        };
        txn.commit()?;
        Ok(new_revision)
    }

    /// Read-modify-write a mailbox inside one transaction.
    ///
    /// The closure sees the current contents and mutates them in place;
    /// sequences are preserved, so pollers do not re-receive records that
    /// were only modified. Concurrent callers serialize on the write
    /// transaction, which is what makes mark-as-read safe against racing
    /// panels. Returns the closure's value and the new revision.
    pub fn update<F, T>(&self, key: &str, f: F) -> StorageResult<(T, u64)>
    where
        F: FnOnce(&mut Vec<StoredRecord>) -> T,
    {
        Self::check_key(key)?;

        let txn = self.begin_write()?;
        let (result, new_revision) = {
            let mut table = txn.open_table(MAILBOXES_TABLE)?;

            let mut records = Vec::new();
            let range_start = (key, 0u64);
            let range_end = (key, u64::MAX);
            for entry in table.range(range_start..=range_end)? {
                let (entry_key, value) = entry?;
                let seq = entry_key.value().1;
                match serde_json::from_slice::<Record>(value.value()) {
                    Ok(record) => records.push(StoredRecord { seq, record }),
                    Err(e) => {
                        tracing::warn!(mailbox = %key, seq, error = %e, "skipping unreadable record");
                    }
                }
            }

            let old_seqs = collect_seqs(&table, key)?;
            let result = f(&mut records);

            for record in &records {
                Self::check_record(&record.record)?;
            }

            for seq in old_seqs {
                table.remove((key, seq))?;
            }
            for stored in &records {
                let value = serde_json::to_vec(&stored.record)?;
                table.insert((key, stored.seq), value.as_slice())?;
            }
            drop(table);

            let new_revision = self.bump_revision(&txn, key)?;
            (result, new_revision)
        };
        txn.commit()?;
        Ok((result, new_revision))
    }

    /// Drop the oldest records beyond `keep_newest`. Returns how many
    /// were removed.
    pub fn compact(&self, key: &str, keep_newest: usize) -> StorageResult<usize> {
        Self::check_key(key)?;

        let txn = self.begin_write()?;
        let removed = {
            let mut table = txn.open_table(MAILBOXES_TABLE)?;
            let seqs = collect_seqs(&table, key)?;

            if seqs.len() <= keep_newest {
                0
            } else {
                let excess = seqs.len() - keep_newest;
                for seq in seqs.into_iter().take(excess) {
                    table.remove((key, seq))?;
                }
                drop(table);
                self.bump_revision(&txn, key)?;
                excess
            }
        };
        txn.commit()?;
        Ok(removed)
    }

    /// All mailbox keys that have ever been written
    pub fn keys(&self) -> StorageResult<Vec<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(REVISIONS_TABLE)?;

        let mut keys = Vec::new();
        for result in table.iter()? {
            let (key, _value) = result?;
            keys.push(key.value().to_string());
        }
        Ok(keys)
    }

    // ========== Statistics ==========

    /// Get storage statistics
    pub fn stats(&self) -> StorageResult<StoreStats> {
        let read_txn = self.db.begin_read()?;

        let mailboxes_table = read_txn.open_table(MAILBOXES_TABLE)?;
        let revisions_table = read_txn.open_table(REVISIONS_TABLE)?;
        let seq_table = read_txn.open_table(SEQUENCE_TABLE)?;

        Ok(StoreStats {
            record_count: mailboxes_table.len()?,
            mailbox_count: revisions_table.len()?,
            current_sequence: seq_table
                .get(SEQUENCE_KEY)?
                .map(|guard| guard.value())
                .unwrap_or(0),
        })
    }
}

/// Collect the sequences present for one mailbox key.
///
/// Separate pass so the caller can remove entries without fighting the
/// iterator borrow.
fn collect_seqs<T>(table: &T, key: &str) -> StorageResult<Vec<u64>>
where
    T: ReadableTable<(&'static str, u64), &'static [u8]>,
{
    let mut seqs = Vec::new();
    let range_start = (key, 0u64);
    let range_end = (key, u64::MAX);
    for result in table.range(range_start..=range_end)? {
        let (entry_key, _value) = result?;
        seqs.push(entry_key.value().1);
    }
    Ok(seqs)
}

/// Storage statistics
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub record_count: u64,
    pub mailbox_count: u64,
    pub current_sequence: u64,
}
