//! Lazily walks log records newest-first, block by block.

use std::sync::Arc;

use snafu::ensure;

use crate::{
    block::BlockId,
    codec,
    errors::{DbResult, LogCorruptionSnafu},
    file_manager::FileManager,
    page::Page,
};

/// Produces log records in reverse insertion order: within a block from the
/// most recently written record back to the oldest, then moving to the
/// previous block.
///
/// Non-restartable: once exhausted (or once an error is returned) the
/// iterator should be discarded and a fresh one obtained from
/// [`crate::log::LogManager::iterator`].
pub struct LogIterator {
    file_manager: Arc<FileManager>,
    block: BlockId,
    page: Page,
    current_pos: usize,
    block_size: usize,
}

impl LogIterator {
    pub(super) fn new(file_manager: Arc<FileManager>, block: BlockId) -> DbResult<Self> {
        let block_size = file_manager.block_size();
        let mut iter = Self {
            file_manager,
            block,
            page: Page::new(block_size),
            current_pos: 0,
            block_size,
        };
        iter.move_to_block(iter.block.clone())?;
        Ok(iter)
    }

    fn move_to_block(&mut self, block: BlockId) -> DbResult<()> {
        self.file_manager.read(&block, &mut self.page)?;
        let boundary = self.page.get_int(0);
        ensure!(
            (codec::INT_BYTES as i32..=self.block_size as i32).contains(&boundary),
            LogCorruptionSnafu {
                reason: format!(
                    "block {block} has an out-of-range boundary header {boundary} (must be within [{}, {}])",
                    codec::INT_BYTES,
                    self.block_size
                ),
            }
        );
        self.current_pos = boundary as usize;
        self.block = block;
        Ok(())
    }

    fn has_next(&self) -> bool {
        self.current_pos < self.block_size || self.block.number() > 0
    }
}

impl Iterator for LogIterator {
    type Item = DbResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.has_next() {
            return None;
        }

        if self.current_pos == self.block_size {
            let previous = BlockId::new(self.block.file_name().to_string(), self.block.number() - 1);
            if let Err(e) = self.move_to_block(previous) {
                return Some(Err(e));
            }
        }

        // Read straight off the page's raw bytes through the checked codec
        // path, not `Page::get_bytes`: a corrupted on-disk length prefix
        // must surface as `LogCorruption`, not an out-of-bounds panic.
        let (record, next_pos) = match codec::try_decode_bytes(self.page.contents(), self.current_pos) {
            Ok(v) => v,
            Err(e) => return Some(Err(e)),
        };
        self.current_pos = next_pos;
        Some(Ok(record))
    }
}
