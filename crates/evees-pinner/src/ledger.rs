//! Durable pin ledger backed by redb.
//!
//! `pins` maps every reference ever registered to its pinned flag (0 or 1).
//! `unpinned` holds exactly the references whose flag is 0, so a flush scans
//! only the outstanding work. Both tables change in the same write
//! transaction, which keeps them consistent across crashes.

use std::path::Path;

use redb::{backends::InMemoryBackend, Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::Serialize;
use tracing::{debug, info};

use crate::PinError;

const PINS_TABLE: TableDefinition<&str, u8> = TableDefinition::new("pins-1");
const UNPINNED_TABLE: TableDefinition<&str, u8> = TableDefinition::new("unpinned-1");

const UNPINNED: u8 = 0;
const PINNED: u8 = 1;

/// A single ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PinRecord {
    pub id: String,
    pub pinned: bool,
}

#[derive(Debug)]
pub struct PinLedger {
    db: Database,
}

impl PinLedger {
    /// Open or create a ledger file.
    pub fn persistent(path: impl AsRef<Path>) -> Result<Self, PinError> {
        let path = path.as_ref();
        info!(path = %path.display(), "Opening pin ledger");
        let db = Database::create(path)?;
        Self::open(db)
    }

    /// A ledger that lives only as long as the process.
    pub fn in_memory() -> Result<Self, PinError> {
        debug!("Using in-memory pin ledger");
        let db = Database::builder().create_with_backend(InMemoryBackend::new())?;
        Self::open(db)
    }

    fn open(db: Database) -> Result<Self, PinError> {
        let tx = db.begin_write()?;
        {
            let _pins = tx.open_table(PINS_TABLE)?;
            let _unpinned = tx.open_table(UNPINNED_TABLE)?;
        }
        tx.commit()?;
        Ok(Self { db })
    }

    /// Register a reference as unpinned unless it is already tracked.
    ///
    /// Returns `true` when a new row was written.
    pub fn insert_unpinned(&self, reference: &str) -> Result<bool, PinError> {
        if reference.is_empty() {
            return Err(PinError::InvalidReference("empty reference".to_string()));
        }
        let tx = self.db.begin_write()?;
        let inserted = {
            let mut pins = tx.open_table(PINS_TABLE)?;
            let tracked = pins.get(reference)?.is_some();
            if tracked {
                false
            } else {
                pins.insert(reference, UNPINNED)?;
                let mut unpinned = tx.open_table(UNPINNED_TABLE)?;
                unpinned.insert(reference, UNPINNED)?;
                true
            }
        };
        tx.commit()?;
        Ok(inserted)
    }

    /// Flip every listed reference that is currently unpinned to pinned.
    ///
    /// Untracked and already pinned references are left alone. Returns the
    /// number of rows that changed.
    pub fn mark_pinned(&self, references: &[String]) -> Result<usize, PinError> {
        let tx = self.db.begin_write()?;
        let mut changed = 0;
        {
            let mut pins = tx.open_table(PINS_TABLE)?;
            let mut unpinned = tx.open_table(UNPINNED_TABLE)?;
            for reference in references {
                let current = pins.get(reference.as_str())?.map(|row| row.value());
                if current == Some(UNPINNED) {
                    pins.insert(reference.as_str(), PINNED)?;
                    unpinned.remove(reference.as_str())?;
                    changed += 1;
                }
            }
        }
        tx.commit()?;
        Ok(changed)
    }

    /// All references still waiting to be pinned, in key order.
    pub fn unpinned(&self) -> Result<Vec<String>, PinError> {
        let tx = self.db.begin_read()?;
        let table = tx.open_table(UNPINNED_TABLE)?;
        let mut references = Vec::new();
        for row in table.iter()? {
            let (key, _) = row?;
            references.push(key.value().to_string());
        }
        Ok(references)
    }

    pub fn status(&self, reference: &str) -> Result<Option<PinRecord>, PinError> {
        let tx = self.db.begin_read()?;
        let table = tx.open_table(PINS_TABLE)?;
        let record = table.get(reference)?.map(|row| PinRecord {
            id: reference.to_string(),
            pinned: row.value() == PINNED,
        });
        Ok(record)
    }

    /// Number of tracked references, pinned or not.
    pub fn len(&self) -> Result<u64, PinError> {
        let tx = self.db.begin_read()?;
        let table = tx.open_table(PINS_TABLE)?;
        Ok(table.len()?)
    }

    pub fn is_empty(&self) -> Result<bool, PinError> {
        Ok(self.len()? == 0)
    }
}
