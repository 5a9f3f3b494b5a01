//! Layered storage for record tables.
//!
//! - **Layer 1** ([`KvEngine`]): ordered byte-oriented key-value storage with
//!   prefix scans and leased counters
//! - **Layer 2** ([`SequenceAllocator`]): per-(owner, table) row-id allocation
//!   over engine counters
//! - **Layer 3** ([`Store`]): record persistence, mapping each stored field of
//!   a row to one engine entry

pub mod engine;
pub mod engines;
pub mod sequence;
pub mod store;

pub use engine::{KeyValue, KvEngine, Sequence};
pub use engines::RedbEngine;
pub use sequence::{sequence_name, SequenceAllocator};
pub use store::Store;
