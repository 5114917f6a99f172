//! A single pool frame: a page paired with the block currently assigned to it.

use crate::{block::BlockId, errors::DbResult, file_manager::FileManager, log::LogManager, page::Page};

/// A frame in the buffer pool.
///
/// `modifying_tx == -1` means the frame is clean. `lsn == -1` means no log
/// record has been written yet for whatever mutation is pending against
/// this frame — which is also the sentinel undo passes so that restoring a
/// pre-image does not advance the frame's notion of "log coverage needed
/// before flush".
pub struct Buffer {
    page: Page,
    block: Option<BlockId>,
    pins: i32,
    modifying_tx: i32,
    lsn: i64,
}

impl Buffer {
    pub fn new(block_size: usize) -> Self {
        Self {
            page: Page::new(block_size),
            block: None,
            pins: 0,
            modifying_tx: -1,
            lsn: -1,
        }
    }

    pub fn block(&self) -> Option<&BlockId> {
        self.block.as_ref()
    }

    pub fn is_pinned(&self) -> bool {
        self.pins > 0
    }

    pub fn modifying_tx(&self) -> i32 {
        self.modifying_tx
    }

    pub fn get_int(&self, offset: usize) -> i32 {
        self.page.get_int(offset)
    }

    pub fn set_int(&mut self, offset: usize, value: i32) {
        self.page.set_int(offset, value);
    }

    pub fn get_string(&self, offset: usize) -> String {
        self.page.get_string(offset)
    }

    pub fn set_string(&mut self, offset: usize, value: &str) {
        self.page.set_string(offset, value);
    }

    /// Records that `txnum` last modified this buffer's page, producing the
    /// log record at `lsn`. Passing `lsn < 0` marks the buffer dirty
    /// without moving its recorded LSN forward — the contract the
    /// undo-without-logging path relies on.
    pub fn set_modified(&mut self, txnum: i32, lsn: i64) {
        self.modifying_tx = txnum;
        if lsn >= 0 {
            self.lsn = lsn;
        }
    }

    pub fn pin(&mut self) {
        self.pins += 1;
    }

    pub fn unpin(&mut self) {
        self.pins -= 1;
    }

    /// Flushes an old assignment if dirty, reads `block` into the page,
    /// and resets pin/modification state for the new assignment.
    pub fn assign_to_block(
        &mut self,
        block: BlockId,
        file_manager: &FileManager,
        log_manager: &LogManager,
    ) -> DbResult<()> {
        self.flush(file_manager, log_manager)?;
        file_manager.read(&block, &mut self.page)?;
        self.block = Some(block);
        self.pins = 0;
        Ok(())
    }

    /// Forces the log up to this buffer's LSN, then writes the page,
    /// satisfying write-ahead logging for whatever update is pending.
    pub fn flush(&mut self, file_manager: &FileManager, log_manager: &LogManager) -> DbResult<()> {
        if self.modifying_tx >= 0 {
            log_manager.flush(self.lsn)?;
            if let Some(block) = &self.block {
                file_manager.write(block, &self.page)?;
            }
            self.modifying_tx = -1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempdir::TempDir;

    fn harness() -> (TempDir, Arc<FileManager>, LogManager) {
        let dir = TempDir::new("buffer-test").unwrap();
        let fm = Arc::new(FileManager::new(dir.path(), 400).unwrap());
        let lm = LogManager::new(Arc::clone(&fm), "test.log").unwrap();
        (dir, fm, lm)
    }

    #[test]
    fn fresh_buffer_is_clean_and_unpinned() {
        let buffer = Buffer::new(400);
        assert!(!buffer.is_pinned());
        assert_eq!(buffer.modifying_tx(), -1);
        assert!(buffer.block().is_none());
    }

    #[test]
    fn flush_writes_through_and_clears_dirty_flag() {
        let (_dir, fm, lm) = harness();
        let block = fm.append("f").unwrap();

        let mut buffer = Buffer::new(400);
        buffer.assign_to_block(block.clone(), &fm, &lm).unwrap();
        buffer.set_int(80, 42);
        let lsn = lm.append(b"pretend-record").unwrap();
        buffer.set_modified(1, lsn);

        buffer.flush(&fm, &lm).unwrap();
        assert_eq!(buffer.modifying_tx(), -1);

        let mut page = Page::new(400);
        fm.read(&block, &mut page).unwrap();
        assert_eq!(page.get_int(80), 42);
    }

    #[test]
    fn undo_sentinel_lsn_does_not_move_lsn_forward() {
        let mut buffer = Buffer::new(400);
        buffer.set_modified(1, 10);
        buffer.set_modified(1, -1);
        // No public getter for lsn; verified indirectly via flush ordering
        // in the buffer_manager integration tests. This test only checks
        // that marking dirty with a negative LSN does not panic or clear
        // the modifying transaction.
        assert_eq!(buffer.modifying_tx(), 1);
    }
}
