//! Process-wide shared/exclusive lock registry, keyed by block, with
//! wait-with-timeout and no deadlock detection.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use crate::{
    block::BlockId,
    errors::{DbResult, LockAbortSnafu},
};

/// `locks[block] == -1` means exclusive; `locks[block] == n > 0` means `n`
/// shared holders; an absent entry means unlocked. No holder identity is
/// recorded here — callers are trusted to request consistently, which is
/// exactly what [`crate::concurrency::ConcurrencyManager`] exists to
/// guarantee on a transaction's behalf.
pub struct LockTable {
    locks: Mutex<HashMap<BlockId, i32>>,
    condvar: Condvar,
    max_wait: Duration,
}

impl LockTable {
    pub fn new(max_wait: Duration) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            condvar: Condvar::new(),
            max_wait,
        }
    }

    /// Requests a shared lock on `block`, waiting out any exclusive holder.
    pub fn s_lock(&self, block: &BlockId) -> DbResult<()> {
        let deadline = Instant::now() + self.max_wait;
        let mut locks = self.locks.lock();

        while has_exclusive_lock(&locks, block) {
            let now = Instant::now();
            if now >= deadline {
                debug!(%block, "s_lock timed out");
                return LockAbortSnafu {
                    block: block.clone(),
                }
                .fail();
            }
            trace!(%block, "s_lock waiting on exclusive holder");
            self.condvar.wait_for(&mut locks, deadline - now);
        }

        let current = locks.get(block).copied().unwrap_or(0);
        locks.insert(block.clone(), current.max(0) + 1);
        Ok(())
    }

    /// Requests an exclusive lock on `block`.
    ///
    /// Precondition (enforced by `ConcurrencyManager`, not here): the
    /// caller already holds a shared lock on `block`, so the `> 1` check
    /// below is "are there *other* shared holders besides me".
    pub fn x_lock(&self, block: &BlockId) -> DbResult<()> {
        let deadline = Instant::now() + self.max_wait;
        let mut locks = self.locks.lock();

        while has_other_shared_holders(&locks, block) {
            let now = Instant::now();
            if now >= deadline {
                debug!(%block, "x_lock timed out");
                return LockAbortSnafu {
                    block: block.clone(),
                }
                .fail();
            }
            trace!(%block, "x_lock waiting on other shared holders");
            self.condvar.wait_for(&mut locks, deadline - now);
        }

        locks.insert(block.clone(), -1);
        Ok(())
    }

    /// Releases one holder's worth of lock on `block`: decrements a shared
    /// count, or clears an exclusive lock entirely.
    pub fn unlock(&self, block: &BlockId) {
        let mut locks = self.locks.lock();
        match locks.get(block).copied() {
            Some(value) if value > 1 => {
                locks.insert(block.clone(), value - 1);
            }
            Some(_) => {
                locks.remove(block);
                self.condvar.notify_all();
            }
            None => {}
        }
    }
}

fn has_exclusive_lock(locks: &HashMap<BlockId, i32>, block: &BlockId) -> bool {
    locks.get(block).copied() == Some(-1)
}

fn has_other_shared_holders(locks: &HashMap<BlockId, i32>, block: &BlockId) -> bool {
    locks.get(block).copied().unwrap_or(0) > 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_locks_stack() {
        let table = LockTable::new(Duration::from_millis(200));
        let block = BlockId::new("f", 0);
        table.s_lock(&block).unwrap();
        table.s_lock(&block).unwrap();
        table.unlock(&block);
        table.unlock(&block);
    }

    #[test]
    fn exclusive_after_sole_shared_succeeds() {
        let table = LockTable::new(Duration::from_millis(200));
        let block = BlockId::new("f", 0);
        table.s_lock(&block).unwrap();
        table.x_lock(&block).unwrap();
    }

    #[test]
    fn shared_lock_times_out_against_exclusive_holder() {
        let table = LockTable::new(Duration::from_millis(50));
        let block = BlockId::new("f", 0);
        table.s_lock(&block).unwrap();
        table.x_lock(&block).unwrap();

        let err = table.s_lock(&block).unwrap_err();
        assert!(matches!(err, crate::errors::DbError::LockAbort { .. }));
    }
}
