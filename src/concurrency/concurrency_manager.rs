//! Per-transaction view over the lock table enforcing two-phase locking.

use std::{collections::HashMap, sync::Arc};

use crate::{block::BlockId, errors::DbResult};

use super::lock_table::LockTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockKind {
    Shared,
    Exclusive,
}

/// Records the strongest lock one transaction holds on each block it has
/// touched, and releases every recorded lock together at commit/rollback.
///
/// Two-phase locking falls out structurally here: every acquisition
/// happens while the owning transaction is active, and `release` is only
/// ever called once, from `Transaction::commit`/`rollback`.
pub struct ConcurrencyManager {
    lock_table: Arc<LockTable>,
    held: HashMap<BlockId, LockKind>,
}

impl ConcurrencyManager {
    pub fn new(lock_table: Arc<LockTable>) -> Self {
        Self {
            lock_table,
            held: HashMap::new(),
        }
    }

    pub fn s_lock(&mut self, block: &BlockId) -> DbResult<()> {
        if !self.held.contains_key(block) {
            self.lock_table.s_lock(block)?;
            self.held.insert(block.clone(), LockKind::Shared);
        }
        Ok(())
    }

    pub fn x_lock(&mut self, block: &BlockId) -> DbResult<()> {
        if self.held.get(block) != Some(&LockKind::Exclusive) {
            self.s_lock(block)?;
            self.lock_table.x_lock(block)?;
            self.held.insert(block.clone(), LockKind::Exclusive);
        }
        Ok(())
    }

    /// Releases every lock this transaction holds. Idempotent: calling it
    /// with nothing held is a no-op, but `Transaction` only ever calls it
    /// once, at commit or rollback.
    pub fn release(&mut self) {
        for block in self.held.keys() {
            self.lock_table.unlock(block);
        }
        self.held.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn x_lock_implies_s_lock_was_taken_first() {
        let table = Arc::new(LockTable::new(Duration::from_millis(200)));
        let mut manager = ConcurrencyManager::new(Arc::clone(&table));
        let block = BlockId::new("f", 0);

        manager.x_lock(&block).unwrap();
        assert_eq!(manager.held.get(&block), Some(&LockKind::Exclusive));
    }

    #[test]
    fn release_clears_all_recorded_locks() {
        let table = Arc::new(LockTable::new(Duration::from_millis(200)));
        let mut manager = ConcurrencyManager::new(Arc::clone(&table));
        let block_a = BlockId::new("f", 0);
        let block_b = BlockId::new("f", 1);

        manager.s_lock(&block_a).unwrap();
        manager.x_lock(&block_b).unwrap();
        manager.release();
        assert!(manager.held.is_empty());

        // Locks are actually released on the shared table: a fresh
        // manager should be able to take an exclusive lock immediately.
        let mut other = ConcurrencyManager::new(Arc::clone(&table));
        other.x_lock(&block_a).unwrap();
        other.x_lock(&block_b).unwrap();
    }
}
