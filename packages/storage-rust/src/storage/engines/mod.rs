//! [`KvEngine`](super::KvEngine) implementations.
//!
//! Currently includes [`RedbEngine`], an embedded ordered engine that runs
//! either in memory or on disk.

mod redb_engine;

pub use redb_engine::RedbEngine;
