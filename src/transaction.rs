//! The façade transactions use: pins/unpins buffers, takes locks, logs
//! updates, and composes commit/rollback/recover.

use std::{
    cell::RefCell,
    sync::{
        atomic::{AtomicI32, Ordering},
        Arc,
    },
};

use tracing::instrument;

use crate::{
    block::BlockId,
    buffer::{BufferList, BufferManager},
    concurrency::{ConcurrencyManager, LockTable},
    errors::DbResult,
    file_manager::FileManager,
    log::LogManager,
    recovery::RecoveryManager,
};

static NEXT_TX_NUM: AtomicI32 = AtomicI32::new(1);

fn next_tx_number() -> i32 {
    NEXT_TX_NUM.fetch_add(1, Ordering::SeqCst)
}

/// One transaction's view of the database: the only interface clients use.
///
/// A `Transaction` is expected to run on a single thread for its entire
/// lifetime, so its pin bookkeeping and lock bookkeeping use `RefCell`
/// rather than a mutex — there is no concurrent access to guard against,
/// only the recovery manager calling back into `pin`/`unpin`/`restore_*`
/// during rollback.
pub struct Transaction {
    tx_num: i32,
    file_manager: Arc<FileManager>,
    buffer_manager: Arc<BufferManager>,
    concurrency_manager: RefCell<ConcurrencyManager>,
    buffer_list: RefCell<BufferList>,
    recovery_manager: RecoveryManager,
}

impl Transaction {
    pub fn new(
        file_manager: Arc<FileManager>,
        log_manager: Arc<LogManager>,
        buffer_manager: Arc<BufferManager>,
        lock_table: Arc<LockTable>,
    ) -> DbResult<Self> {
        let tx_num = next_tx_number();
        let recovery_manager =
            RecoveryManager::new(tx_num, Arc::clone(&log_manager), Arc::clone(&buffer_manager))?;

        Ok(Self {
            tx_num,
            buffer_list: RefCell::new(BufferList::new(Arc::clone(&buffer_manager))),
            concurrency_manager: RefCell::new(ConcurrencyManager::new(lock_table)),
            file_manager,
            buffer_manager,
            recovery_manager,
        })
    }

    pub fn tx_num(&self) -> i32 {
        self.tx_num
    }

    pub fn pin(&self, block: &BlockId) -> DbResult<()> {
        self.buffer_list.borrow_mut().pin(block)
    }

    pub fn unpin(&self, block: &BlockId) {
        self.buffer_list.borrow_mut().unpin(block)
    }

    pub fn get_int(&self, block: &BlockId, offset: usize) -> DbResult<i32> {
        self.concurrency_manager.borrow_mut().s_lock(block)?;
        let id = self.pinned_buffer(block);
        Ok(self.buffer_manager.get_int(id, offset))
    }

    pub fn get_string(&self, block: &BlockId, offset: usize) -> DbResult<String> {
        self.concurrency_manager.borrow_mut().s_lock(block)?;
        let id = self.pinned_buffer(block);
        Ok(self.buffer_manager.get_string(id, offset))
    }

    #[instrument(skip(self), fields(tx = self.tx_num))]
    pub fn set_int(&self, block: &BlockId, offset: usize, value: i32) -> DbResult<()> {
        self.concurrency_manager.borrow_mut().x_lock(block)?;
        let id = self.pinned_buffer(block);
        let old_value = self.buffer_manager.get_int(id, offset);
        let lsn = self.recovery_manager.set_int(id, offset, old_value)?;
        self.buffer_manager.set_int(id, offset, value);
        self.buffer_manager.set_modified(id, self.tx_num, lsn);
        Ok(())
    }

    #[instrument(skip(self), fields(tx = self.tx_num))]
    pub fn set_string(&self, block: &BlockId, offset: usize, value: &str) -> DbResult<()> {
        self.concurrency_manager.borrow_mut().x_lock(block)?;
        let id = self.pinned_buffer(block);
        let old_value = self.buffer_manager.get_string(id, offset);
        let lsn = self.recovery_manager.set_string(id, offset, &old_value)?;
        self.buffer_manager.set_string(id, offset, value);
        self.buffer_manager.set_modified(id, self.tx_num, lsn);
        Ok(())
    }

    pub fn size(&self, filename: &str) -> DbResult<u64> {
        let dummy = BlockId::end_of_file(filename);
        self.concurrency_manager.borrow_mut().x_lock(&dummy)?;
        self.file_manager.length(filename)
    }

    pub fn append(&self, filename: &str) -> DbResult<BlockId> {
        let dummy = BlockId::end_of_file(filename);
        self.concurrency_manager.borrow_mut().x_lock(&dummy)?;
        self.file_manager.append(filename)
    }

    pub fn block_size(&self) -> usize {
        self.file_manager.block_size()
    }

    pub fn available_buffers(&self) -> usize {
        self.buffer_manager.available()
    }

    #[instrument(skip(self), fields(tx = self.tx_num))]
    pub fn commit(&self) -> DbResult<()> {
        self.recovery_manager.commit()?;
        self.concurrency_manager.borrow_mut().release();
        self.buffer_list.borrow_mut().unpin_all();
        Ok(())
    }

    #[instrument(skip(self), fields(tx = self.tx_num))]
    pub fn rollback(&self) -> DbResult<()> {
        self.recovery_manager.rollback(self)?;
        self.concurrency_manager.borrow_mut().release();
        self.buffer_list.borrow_mut().unpin_all();
        Ok(())
    }

    /// Runs undo-only recovery on `self` and writes a terminal checkpoint.
    /// Meant to be called once at startup on a dedicated recovery
    /// transaction, never on a transaction a caller is also using for
    /// ordinary reads/writes.
    pub fn recover(&self) -> DbResult<()> {
        self.recovery_manager.recover(self)
    }

    /// Restores `old_value` at `offset` in `block` without writing a log
    /// record. Used only by [`crate::log::LogRecord::undo`].
    pub(crate) fn restore_int(&self, block: &BlockId, offset: usize, old_value: i32) -> DbResult<()> {
        self.pin(block)?;
        let id = self.pinned_buffer(block);
        self.buffer_manager.set_int(id, offset, old_value);
        self.buffer_manager.set_modified(id, self.tx_num, -1);
        self.unpin(block);
        Ok(())
    }

    /// String counterpart of [`Transaction::restore_int`].
    pub(crate) fn restore_string(
        &self,
        block: &BlockId,
        offset: usize,
        old_value: &str,
    ) -> DbResult<()> {
        self.pin(block)?;
        let id = self.pinned_buffer(block);
        self.buffer_manager.set_string(id, offset, old_value);
        self.buffer_manager.set_modified(id, self.tx_num, -1);
        self.unpin(block);
        Ok(())
    }

    fn pinned_buffer(&self, block: &BlockId) -> crate::buffer::BufferId {
        self.buffer_list
            .borrow()
            .get_buffer(block)
            .unwrap_or_else(|| panic!("block {block} must be pinned before it is read or written"))
    }
}
