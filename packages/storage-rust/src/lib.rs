//! Embedded record store: typed records persisted as per-column entries in an
//! ordered key-value engine, with per-owner row-id sequences and filter
//! queries.

pub mod config;
pub mod error;
pub mod query;
pub mod storage;
pub mod telemetry;

pub use config::{EngineConfig, StoreConfig, WriteMode};
pub use error::{EngineError, StoreError};
pub use query::{run, BoundQuery, Clause, Filter, Operand, Operator, Query};
pub use storage::{KvEngine, RedbEngine, Sequence, Store};
pub use telemetry::{init_logging, LogFormat};

pub use kvs_core;
