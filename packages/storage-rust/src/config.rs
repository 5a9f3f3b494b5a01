//! Configuration for the storage engine and the record store.

use std::path::PathBuf;

use serde::Deserialize;

/// How the entries of one record are written to the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// All entries of a record in one write transaction.
    #[default]
    Atomic,
    /// One write transaction per entry. A failure part-way through leaves the
    /// record partially written; nothing is rolled back.
    PerEntry,
}

/// Engine configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Database file. `None` keeps everything in memory.
    pub path: Option<PathBuf>,
    /// Page cache size in bytes. `None` uses the engine default.
    pub cache_size_bytes: Option<usize>,
}

impl EngineConfig {
    /// Configuration for an ephemeral in-memory engine.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Configuration for an engine persisted at `path`.
    #[must_use]
    pub fn on_disk(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }
}

/// Record store configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Row ids each sequence leases from the engine per round-trip.
    pub sequence_bandwidth: u64,
    /// Transaction granularity for save and update.
    pub write_mode: WriteMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sequence_bandwidth: 100,
            write_mode: WriteMode::Atomic,
        }
    }
}
