//! Record store that orchestrates keys, sequences, codecs and the engine.
//!
//! [`Store`] is the entry point for saving and loading typed records. Each
//! record is spread over one engine entry per stored field, all sharing the
//! row id allocated for the record's (owner, table) pair.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;

use kvs_core::{
    blank_entries, from_entries, load_entry, parse_row_id, to_entries, Entry, OwnerId, Record,
};
use tracing::{debug, trace, warn};

use crate::config::{EngineConfig, StoreConfig, WriteMode};
use crate::error::{Result, StoreError};
use crate::storage::engine::KvEngine;
use crate::storage::engines::RedbEngine;
use crate::storage::sequence::SequenceAllocator;

/// Typed record storage over a [`KvEngine`].
///
/// Safe to share between threads. Row-id allocation is serialized internally;
/// writes to the same row from several threads are last-writer-wins.
pub struct Store {
    engine: Arc<dyn KvEngine>,
    sequences: SequenceAllocator,
    config: StoreConfig,
}

impl Store {
    /// Creates a store on top of an existing engine.
    #[must_use]
    pub fn new(engine: Arc<dyn KvEngine>, config: StoreConfig) -> Self {
        let sequences = SequenceAllocator::new(Arc::clone(&engine), config.sequence_bandwidth);
        Self {
            engine,
            sequences,
            config,
        }
    }

    /// Opens a [`RedbEngine`] and creates a store on it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Engine`] if the engine cannot be opened.
    pub fn open(engine_config: &EngineConfig, config: StoreConfig) -> Result<Self> {
        let engine = RedbEngine::open(engine_config)?;
        Ok(Self::new(Arc::new(engine), config))
    }

    /// Creates a store on a fresh in-memory engine with default settings.
    ///
    /// # Errors
    ///
    /// See [`open`](Self::open).
    pub fn in_memory() -> Result<Self> {
        Self::open(&EngineConfig::in_memory(), StoreConfig::default())
    }

    /// The engine this store writes to.
    #[must_use]
    pub fn engine(&self) -> &Arc<dyn KvEngine> {
        &self.engine
    }

    /// Saves `record` as a new row and writes the allocated row id back into it.
    ///
    /// # Errors
    ///
    /// Fails before writing anything if no row id can be allocated. A write
    /// failure in [`WriteMode::PerEntry`] can leave the row partially written.
    pub fn save<R: Record>(&self, owner: Option<&OwnerId>, record: &mut R) -> Result<u32> {
        let table = R::table_name();
        let row_id = self.sequences.next(table, owner)?;
        self.write(table, owner, row_id, record)?;
        record.set_row_id(row_id);

        debug!(table, owner = %OwnerId::resolve(owner), row_id, "saved record");
        Ok(row_id)
    }

    /// Overwrites the row `row_id` with `record`. The sequence is not touched.
    ///
    /// # Errors
    ///
    /// Same as [`save`](Self::save), minus allocation.
    pub fn update<R: Record>(
        &self,
        owner: Option<&OwnerId>,
        record: &mut R,
        row_id: u32,
    ) -> Result<()> {
        let table = R::table_name();
        self.write(table, owner, row_id, record)?;
        record.set_row_id(row_id);

        debug!(table, owner = %OwnerId::resolve(owner), row_id, "updated record");
        Ok(())
    }

    fn write<R: Record>(
        &self,
        table: &str,
        owner: Option<&OwnerId>,
        row_id: u32,
        record: &R,
    ) -> Result<()> {
        let entries = to_entries(table, owner, row_id, record, true)?;
        let keys: Vec<String> = entries.iter().map(Entry::key).collect();

        match self.config.write_mode {
            WriteMode::Atomic => {
                let batch: Vec<(&str, &[u8])> = keys
                    .iter()
                    .zip(&entries)
                    .map(|(key, entry)| (key.as_str(), entry.data.as_slice()))
                    .collect();
                self.engine.set_many(&batch)?;
            }
            WriteMode::PerEntry => {
                for (written, (key, entry)) in keys.iter().zip(&entries).enumerate() {
                    if let Err(err) = self.engine.set(key, &entry.data) {
                        if written > 0 {
                            warn!(
                                table,
                                row_id,
                                written,
                                total = entries.len(),
                                "record left partially written"
                            );
                        }
                        return Err(err.into());
                    }
                }
            }
        }
        Ok(())
    }

    /// Deletes every column of row `row_id` of `R`'s table.
    ///
    /// Each deletion is attempted independently; failures are logged.
    ///
    /// # Errors
    ///
    /// Returns the first deletion failure after all have been attempted.
    pub fn delete<R: Record>(&self, owner: Option<&OwnerId>, row_id: u32) -> Result<()> {
        let table = R::table_name();
        let mut first_error = None;

        for entry in blank_entries::<R>(table, owner, row_id) {
            let key = entry.key();
            if let Err(err) = self.engine.delete(&key) {
                warn!(%key, error = %err, "failed to delete entry");
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }

        debug!(table, owner = %OwnerId::resolve(owner), row_id, "deleted record");
        first_error.map_or(Ok(()), |err| Err(err.into()))
    }

    /// Loads row `row_id` into `dest`. `dest` is left untouched on failure.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] with the missing key if any column of
    /// the row is absent, or a codec error if a value does not decode.
    pub fn load<R: Record>(
        &self,
        dest: &mut R,
        owner: Option<&OwnerId>,
        row_id: u32,
    ) -> Result<()> {
        let table = R::table_name();
        let mut record = R::default();

        for mut entry in blank_entries::<R>(table, owner, row_id) {
            let key = entry.key();
            entry.data = self
                .engine
                .get(&key)?
                .ok_or(StoreError::NotFound { key })?;
            load_entry(&mut record, &entry)?;
        }

        record.set_row_id(row_id);
        *dest = record;

        debug!(table, owner = %OwnerId::resolve(owner), row_id, "loaded record");
        Ok(())
    }

    /// Loads every row of `R`'s table stored under `owner`.
    ///
    /// # Errors
    ///
    /// See [`load_all_with`](Self::load_all_with).
    pub fn load_all<R: Record>(&self, owner: Option<&OwnerId>) -> Result<Vec<R>> {
        self.load_all_with(owner, |_| true)
    }

    /// Loads the rows of `R`'s table under `owner` whose entries all satisfy
    /// `predicate`, in ascending row-id order.
    ///
    /// Every column is scanned by prefix and grouped by row id before any
    /// filtering, so a row is judged on all of its values at once. Rows that
    /// lack a column (left behind by a partial write) are skipped.
    ///
    /// # Errors
    ///
    /// Returns a codec error for malformed keys or undecodable values, or an
    /// engine error if a scan fails.
    pub fn load_all_with<R, F>(&self, owner: Option<&OwnerId>, predicate: F) -> Result<Vec<R>>
    where
        R: Record,
        F: Fn(&Entry) -> bool,
    {
        let table = R::table_name();
        let columns = blank_entries::<R>(table, owner, 0);
        let mut rows: BTreeMap<u32, Vec<Entry>> = BTreeMap::new();

        for column in &columns {
            let prefix = column.scan_prefix();
            let items = self.engine.scan_prefix(&prefix)?;
            trace!(%prefix, found = items.len(), "scanned column");

            for (key, data) in items {
                let row_id = parse_row_id(&prefix, &key)?;
                rows.entry(row_id).or_default().push(Entry {
                    row_id,
                    data,
                    ..column.clone()
                });
            }
        }

        let mut records = Vec::with_capacity(rows.len());
        for (row_id, entries) in rows {
            if entries.len() != columns.len() {
                warn!(
                    table,
                    row_id,
                    found = entries.len(),
                    expected = columns.len(),
                    "skipping incomplete row"
                );
                continue;
            }
            if !entries.iter().all(&predicate) {
                continue;
            }

            let mut record = R::default();
            from_entries(&mut record, &entries)?;
            record.set_row_id(row_id);
            records.push(record);
        }

        debug!(table, owner = %OwnerId::resolve(owner), loaded = records.len(), "loaded records");
        Ok(records)
    }

    /// Releases every cached sequence. Further saves fail with
    /// [`StoreError::Closed`].
    ///
    /// # Errors
    ///
    /// Returns the last sequence release failure.
    pub fn close(&self) -> Result<()> {
        self.sequences.close()
    }

    /// Writes every engine entry as a `key=<k>, value=<v>` line.
    ///
    /// # Errors
    ///
    /// Returns an engine error if the scan or the write fails.
    pub fn dump_to(&self, out: &mut dyn Write) -> Result<()> {
        Ok(self.engine.dump_to(out)?)
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if let Err(err) = self.sequences.close() {
            warn!(error = %err, "failed to release sequences on drop");
        }
    }
}
