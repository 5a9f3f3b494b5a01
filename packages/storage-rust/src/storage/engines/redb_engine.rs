//! [`KvEngine`] implementation backed by an embedded [`redb`] database.
//!
//! Entries live in one ordered table keyed by their composite text key.
//! Counters live in a second table mapping a sequence name to the first
//! value that has not been leased yet.

use std::sync::Arc;

use redb::backends::InMemoryBackend;
use redb::{Database, ReadableTable, TableDefinition};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::storage::engine::{KeyValue, KvEngine, Sequence};

const ENTRIES: TableDefinition<&str, &[u8]> = TableDefinition::new("entries");
const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");

/// Embedded ordered storage, in memory or on disk.
///
/// Cheap to share: counters opened from it hold a handle to the same
/// database, which closes when the last handle is dropped.
pub struct RedbEngine {
    db: Arc<Database>,
}

impl RedbEngine {
    /// Opens (or creates) the database described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the tables cannot be
    /// created.
    pub fn open(config: &EngineConfig) -> Result<Self, EngineError> {
        let mut builder = Database::builder();
        if let Some(bytes) = config.cache_size_bytes {
            builder.set_cache_size(bytes);
        }

        let db = match &config.path {
            Some(path) => builder.create(path)?,
            None => builder.create_with_backend(InMemoryBackend::new())?,
        };

        // Read transactions fail on tables that were never created.
        let txn = db.begin_write()?;
        txn.open_table(ENTRIES)?;
        txn.open_table(SEQUENCES)?;
        txn.commit()?;

        match &config.path {
            Some(path) => info!("opened redb engine at {}", path.display()),
            None => info!("opened in-memory redb engine"),
        }

        Ok(Self { db: Arc::new(db) })
    }

    /// Opens an ephemeral in-memory engine.
    ///
    /// # Errors
    ///
    /// See [`open`](Self::open).
    pub fn in_memory() -> Result<Self, EngineError> {
        Self::open(&EngineConfig::in_memory())
    }
}

impl KvEngine for RedbEngine {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, EngineError> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(ENTRIES)?;
        let value = table.get(key)?.map(|guard| guard.value().to_vec());
        Ok(value)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), EngineError> {
        self.set_many(&[(key, value)])
    }

    fn set_many(&self, entries: &[(&str, &[u8])]) -> Result<(), EngineError> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(ENTRIES)?;
            for (key, value) in entries {
                table.insert(*key, *value)?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), EngineError> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(ENTRIES)?;
            table.remove(key)?;
        }
        txn.commit()?;
        Ok(())
    }

    fn scan_prefix(&self, prefix: &str) -> Result<Vec<KeyValue>, EngineError> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(ENTRIES)?;

        let mut items = Vec::new();
        for item in table.range(prefix..)? {
            let (key, value) = item?;
            let key = key.value();
            if !key.starts_with(prefix) {
                break;
            }
            items.push((key.to_string(), value.value().to_vec()));
        }
        Ok(items)
    }

    fn sequence(&self, name: &str, bandwidth: u64) -> Result<Box<dyn Sequence>, EngineError> {
        if bandwidth == 0 {
            return Err(EngineError::ZeroBandwidth {
                name: name.to_string(),
            });
        }

        Ok(Box::new(RedbSequence {
            db: Arc::clone(&self.db),
            name: name.to_string(),
            bandwidth,
            next: 0,
            leased: 0,
        }))
    }
}

/// Counter that leases `bandwidth` values at a time from the sequences table.
///
/// Values in `next..leased` are reserved for this holder. The stored value is
/// always the first value no holder has leased.
struct RedbSequence {
    db: Arc<Database>,
    name: String,
    bandwidth: u64,
    next: u64,
    leased: u64,
}

impl RedbSequence {
    fn lease(&mut self) -> Result<(), EngineError> {
        let txn = self.db.begin_write()?;
        let (start, leased) = {
            let mut table = txn.open_table(SEQUENCES)?;
            let start = table.get(self.name.as_str())?.map_or(0, |guard| guard.value());
            let leased =
                start
                    .checked_add(self.bandwidth)
                    .ok_or_else(|| EngineError::SequenceExhausted {
                        name: self.name.clone(),
                    })?;
            table.insert(self.name.as_str(), leased)?;
            (start, leased)
        };
        txn.commit()?;

        debug!(sequence = %self.name, start, leased, "leased sequence batch");

        self.next = start;
        self.leased = leased;
        Ok(())
    }
}

impl Sequence for RedbSequence {
    fn next(&mut self) -> Result<u64, EngineError> {
        if self.next >= self.leased {
            self.lease()?;
        }
        let value = self.next;
        self.next += 1;
        Ok(value)
    }

    fn release(&mut self) -> Result<(), EngineError> {
        if self.next >= self.leased {
            return Ok(());
        }

        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SEQUENCES)?;
            let stored = table.get(self.name.as_str())?.map(|guard| guard.value());
            // Another holder leased past us; handing our tail back would
            // rewind the counter into its batch.
            if stored == Some(self.leased) {
                table.insert(self.name.as_str(), self.next)?;
            }
        }
        txn.commit()?;

        debug!(sequence = %self.name, next = self.next, "released sequence");

        self.leased = self.next;
        Ok(())
    }
}
