//! Per-transaction bookkeeping of which blocks are pinned and how many times.

use std::collections::HashMap;
use std::sync::Arc;

use crate::{block::BlockId, errors::DbResult};

use super::manager::{BufferId, BufferManager};

/// Tracks the blocks one transaction has pinned, so it can unpin everything
/// exactly once at commit/rollback regardless of how many times each block
/// was pinned along the way.
pub struct BufferList {
    buffer_manager: Arc<BufferManager>,
    buffers: HashMap<BlockId, BufferId>,
    pins: Vec<BlockId>,
}

impl BufferList {
    pub fn new(buffer_manager: Arc<BufferManager>) -> Self {
        Self {
            buffer_manager,
            buffers: HashMap::new(),
            pins: Vec::new(),
        }
    }

    pub fn get_buffer(&self, block: &BlockId) -> Option<BufferId> {
        self.buffers.get(block).copied()
    }

    pub fn pin(&mut self, block: &BlockId) -> DbResult<()> {
        let id = self.buffer_manager.pin(block)?;
        self.buffers.insert(block.clone(), id);
        self.pins.push(block.clone());
        Ok(())
    }

    pub fn unpin(&mut self, block: &BlockId) {
        if let Some(id) = self.buffers.get(block).copied() {
            self.buffer_manager.unpin(id);
            if let Some(pos) = self.pins.iter().position(|b| b == block) {
                self.pins.remove(pos);
            }
            if !self.pins.contains(block) {
                self.buffers.remove(block);
            }
        }
    }

    pub fn unpin_all(&mut self) {
        for block in self.pins.drain(..) {
            if let Some(id) = self.buffers.get(&block).copied() {
                self.buffer_manager.unpin(id);
            }
        }
        self.buffers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{file_manager::FileManager, log::LogManager};
    use std::time::Duration;
    use tempdir::TempDir;

    #[test]
    fn repeated_pins_require_matching_unpins() {
        let dir = TempDir::new("buffer-list-test").unwrap();
        let fm = Arc::new(FileManager::new(dir.path(), 400).unwrap());
        let lm = Arc::new(LogManager::new(Arc::clone(&fm), "test.log").unwrap());
        let bm = Arc::new(BufferManager::new(
            8,
            Arc::clone(&fm),
            lm,
            Duration::from_millis(200),
        ));
        let block = fm.append("f").unwrap();

        let mut list = BufferList::new(Arc::clone(&bm));
        list.pin(&block).unwrap();
        list.pin(&block).unwrap();
        assert!(list.get_buffer(&block).is_some());

        list.unpin(&block);
        // Still pinned once more.
        assert!(list.get_buffer(&block).is_some());

        list.unpin(&block);
        assert!(list.get_buffer(&block).is_none());
    }
}
