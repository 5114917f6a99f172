//! Pool of buffers shared process-wide: pin-with-timeout, first-fit
//! eviction among unpinned frames, flush-by-transaction.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use crate::{
    block::BlockId,
    errors::{BufferAbortSnafu, DbResult},
    file_manager::FileManager,
    log::LogManager,
};

use super::buffer::Buffer;

/// Opaque handle to a frame in the pool, returned by
/// [`BufferManager::pin`]. Valid only for the `BufferManager` it was
/// obtained from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferId(usize);

struct Pool {
    buffers: Vec<Buffer>,
    num_available: usize,
}

/// A fixed-size pool of buffer frames.
///
/// All mutable state — every frame plus the count of unpinned frames —
/// lives behind one mutex/condvar pair, so pin/unpin are fully serialized
/// with respect to each other, matching the spec's description of
/// `BufferManager` as a single synchronization domain.
pub struct BufferManager {
    file_manager: Arc<FileManager>,
    log_manager: Arc<LogManager>,
    pool: Mutex<Pool>,
    condvar: Condvar,
    max_wait: Duration,
}

impl BufferManager {
    pub fn new(
        num_buffers: usize,
        file_manager: Arc<FileManager>,
        log_manager: Arc<LogManager>,
        max_wait: Duration,
    ) -> Self {
        let block_size = file_manager.block_size();
        let buffers = (0..num_buffers).map(|_| Buffer::new(block_size)).collect();
        Self {
            file_manager,
            log_manager,
            pool: Mutex::new(Pool {
                buffers,
                num_available: num_buffers,
            }),
            condvar: Condvar::new(),
            max_wait,
        }
    }

    pub fn available(&self) -> usize {
        self.pool.lock().num_available
    }

    /// Pins a buffer to `block`, waiting up to `max_wait` for a frame to
    /// become free if the pool is fully pinned. Fails with `BufferAbort` on
    /// timeout.
    pub fn pin(&self, block: &BlockId) -> DbResult<BufferId> {
        let deadline = Instant::now() + self.max_wait;
        let mut pool = self.pool.lock();

        loop {
            if let Some(id) = self.try_to_pin(block, &mut pool)? {
                return Ok(id);
            }

            let now = Instant::now();
            if now >= deadline {
                debug!(?block, "buffer pin timed out");
                return BufferAbortSnafu.fail();
            }

            trace!(?block, "buffer pool full, waiting for a frame");
            self.condvar.wait_for(&mut pool, deadline - now);
        }
    }

    pub fn unpin(&self, id: BufferId) {
        let mut pool = self.pool.lock();
        let buffer = &mut pool.buffers[id.0];
        buffer.unpin();
        if !buffer.is_pinned() {
            pool.num_available += 1;
            self.condvar.notify_all();
        }
    }

    /// Flushes every buffer last modified by `tx_num`.
    pub fn flush_all(&self, tx_num: i32) -> DbResult<()> {
        let mut pool = self.pool.lock();
        for buffer in &mut pool.buffers {
            if buffer.modifying_tx() == tx_num {
                buffer.flush(&self.file_manager, &self.log_manager)?;
            }
        }
        Ok(())
    }

    pub fn block_of(&self, id: BufferId) -> BlockId {
        self.pool.lock().buffers[id.0]
            .block()
            .cloned()
            .expect("buffer must be assigned to a block while pinned")
    }

    pub fn get_int(&self, id: BufferId, offset: usize) -> i32 {
        self.pool.lock().buffers[id.0].get_int(offset)
    }

    pub fn set_int(&self, id: BufferId, offset: usize, value: i32) {
        self.pool.lock().buffers[id.0].set_int(offset, value);
    }

    pub fn get_string(&self, id: BufferId, offset: usize) -> String {
        self.pool.lock().buffers[id.0].get_string(offset)
    }

    pub fn set_string(&self, id: BufferId, offset: usize, value: &str) {
        self.pool.lock().buffers[id.0].set_string(offset, value);
    }

    pub fn set_modified(&self, id: BufferId, tx_num: i32, lsn: i64) {
        self.pool.lock().buffers[id.0].set_modified(tx_num, lsn);
    }

    fn try_to_pin(&self, block: &BlockId, pool: &mut Pool) -> DbResult<Option<BufferId>> {
        if let Some(index) = find_existing(pool, block) {
            let was_unpinned = !pool.buffers[index].is_pinned();
            pool.buffers[index].pin();
            if was_unpinned {
                pool.num_available -= 1;
            }
            return Ok(Some(BufferId(index)));
        }

        match find_unpinned(pool) {
            Some(index) => {
                pool.buffers[index].assign_to_block(
                    block.clone(),
                    &self.file_manager,
                    &self.log_manager,
                )?;
                pool.buffers[index].pin();
                pool.num_available -= 1;
                Ok(Some(BufferId(index)))
            }
            None => Ok(None),
        }
    }
}

fn find_existing(pool: &Pool, block: &BlockId) -> Option<usize> {
    pool.buffers
        .iter()
        .position(|b| b.block() == Some(block))
}

fn find_unpinned(pool: &Pool) -> Option<usize> {
    pool.buffers.iter().position(|b| !b.is_pinned())
}
