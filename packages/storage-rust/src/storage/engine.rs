//! Ordered key-value engine contract.
//!
//! Defines [`KvEngine`], the innermost storage layer the record store is
//! built on, and [`Sequence`], the named monotonic counter it hands out.
//! Every call is synchronous and runs in its own engine transaction.

use std::io::Write;

use crate::error::EngineError;

/// A key with its stored value, as returned by prefix scans.
pub type KeyValue = (String, Vec<u8>);

/// Named monotonic counter leased from an engine.
///
/// Implementations may reserve identifiers in batches (the bandwidth) so
/// that most calls to [`next`](Sequence::next) do not touch the engine.
pub trait Sequence: Send {
    /// Returns the next value, leasing a new batch from the engine if needed.
    fn next(&mut self) -> Result<u64, EngineError>;

    /// Hands unused leased values back to the engine.
    fn release(&mut self) -> Result<(), EngineError>;
}

/// Ordered, transactional key-value storage.
///
/// Wrapped in `Arc<dyn KvEngine>` so one engine can back several stores.
pub trait KvEngine: Send + Sync + 'static {
    /// Retrieve a value by key, or `None` if absent.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, EngineError>;

    /// Insert or replace a value.
    fn set(&self, key: &str, value: &[u8]) -> Result<(), EngineError>;

    /// Insert or replace several values in one write transaction.
    fn set_many(&self, entries: &[(&str, &[u8])]) -> Result<(), EngineError>;

    /// Remove a key. Removing an absent key is not an error.
    fn delete(&self, key: &str) -> Result<(), EngineError>;

    /// All entries whose key starts with `prefix`, in ascending key order,
    /// read from a single read transaction.
    fn scan_prefix(&self, prefix: &str) -> Result<Vec<KeyValue>, EngineError>;

    /// Opens the named counter, leasing `bandwidth` values per round-trip.
    fn sequence(&self, name: &str, bandwidth: u64) -> Result<Box<dyn Sequence>, EngineError>;

    /// Writes every entry as a `key=<k>, value=<v>` line. Diagnostic only.
    fn dump_to(&self, out: &mut dyn Write) -> Result<(), EngineError> {
        for (key, value) in self.scan_prefix("")? {
            writeln!(out, "key={key}, value={}", String::from_utf8_lossy(&value))?;
        }
        Ok(())
    }
}
