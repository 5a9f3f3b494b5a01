//! Row-id allocation scoped per (owner, table).
//!
//! [`SequenceAllocator`] lazily opens one engine counter per
//! `"{owner}.{table}"` name and caches it until [`close`](SequenceAllocator::close).
//! The cache sits behind a mutex, so concurrent saves through one store are
//! serialized at allocation time.

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::sync::Arc;

use kvs_core::OwnerId;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{EngineError, Result, StoreError};
use crate::storage::engine::{KvEngine, Sequence};

/// Name of the counter backing `table` under `owner`.
#[must_use]
pub fn sequence_name(table: &str, owner: Option<&OwnerId>) -> String {
    format!("{}.{table}", OwnerId::resolve(owner))
}

#[derive(Default)]
struct AllocatorState {
    open: BTreeMap<String, Box<dyn Sequence>>,
    closed: bool,
}

/// Issues monotonically increasing row ids, starting at 0 for every
/// (owner, table) pair.
pub struct SequenceAllocator {
    engine: Arc<dyn KvEngine>,
    bandwidth: u64,
    state: Mutex<AllocatorState>,
}

impl SequenceAllocator {
    /// Creates an allocator whose counters lease `bandwidth` ids at a time.
    #[must_use]
    pub fn new(engine: Arc<dyn KvEngine>, bandwidth: u64) -> Self {
        Self {
            engine,
            bandwidth,
            state: Mutex::new(AllocatorState::default()),
        }
    }

    /// Allocates the next row id for `table` under `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Closed`] after [`close`](Self::close), or
    /// [`StoreError::Sequence`] if the counter cannot be opened, cannot lease
    /// more ids, or has run past the `u32` row-id range.
    pub fn next(&self, table: &str, owner: Option<&OwnerId>) -> Result<u32> {
        let name = sequence_name(table, owner);
        let mut state = self.state.lock();
        if state.closed {
            return Err(StoreError::Closed);
        }

        let sequence = match state.open.entry(name.clone()) {
            btree_map::Entry::Occupied(slot) => slot.into_mut(),
            btree_map::Entry::Vacant(slot) => {
                let sequence = self
                    .engine
                    .sequence(&name, self.bandwidth)
                    .map_err(|source| StoreError::Sequence {
                        sequence: name.clone(),
                        source,
                    })?;
                debug!(sequence = %name, bandwidth = self.bandwidth, "opened sequence");
                slot.insert(sequence)
            }
        };

        let value = sequence.next().map_err(|source| StoreError::Sequence {
            sequence: name.clone(),
            source,
        })?;

        u32::try_from(value).map_err(|_| StoreError::Sequence {
            sequence: name.clone(),
            source: EngineError::SequenceExhausted { name },
        })
    }

    /// Number of counters currently cached.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.state.lock().open.len()
    }

    /// Releases every cached counter and refuses further allocations.
    ///
    /// Every release is attempted. Failures are logged; only the last one is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Release`] for the last counter that failed to
    /// release.
    pub fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.closed = true;

        let mut last_error = None;
        for (name, mut sequence) in std::mem::take(&mut state.open) {
            if let Err(source) = sequence.release() {
                warn!(sequence = %name, error = %source, "failed to release sequence");
                last_error = Some(StoreError::Release {
                    sequence: name,
                    source,
                });
            }
        }

        last_error.map_or(Ok(()), Err)
    }
}
