//! Wires the four process-wide singletons together and drives the startup
//! recovery contract.

use std::{path::Path, sync::Arc};

use tracing::info;

use crate::{
    buffer::BufferManager,
    concurrency::LockTable,
    config::StorageEngineConfig,
    errors::DbResult,
    file_manager::FileManager,
    log::LogManager,
    transaction::Transaction,
};

/// The storage and transaction core for one database directory.
///
/// Constructing a `StorageEngine` performs the full startup contract:
/// open the file manager, open the log manager, build the buffer pool and
/// lock table, and — if the directory already existed — run undo-only
/// recovery under a dedicated recovery transaction before returning.
pub struct StorageEngine {
    file_manager: Arc<FileManager>,
    log_manager: Arc<LogManager>,
    buffer_manager: Arc<BufferManager>,
    lock_table: Arc<LockTable>,
}

impl StorageEngine {
    pub fn open(dir: impl AsRef<Path>, config: StorageEngineConfig) -> DbResult<Self> {
        let file_manager = Arc::new(FileManager::new(dir.as_ref(), config.block_size())?);
        let log_manager = Arc::new(LogManager::new(
            Arc::clone(&file_manager),
            config.log_file_name(),
        )?);
        let buffer_manager = Arc::new(BufferManager::new(
            config.buffer_pool_size(),
            Arc::clone(&file_manager),
            Arc::clone(&log_manager),
            config.max_wait(),
        ));
        let lock_table = Arc::new(LockTable::new(config.max_wait()));

        let engine = Self {
            file_manager,
            log_manager,
            buffer_manager,
            lock_table,
        };

        if !engine.file_manager.is_new() {
            info!("existing database directory found, running recovery");
            let recovery_tx = engine.new_transaction()?;
            recovery_tx.recover()?;
        } else {
            info!("initialized a new database directory");
        }

        Ok(engine)
    }

    pub fn new_transaction(&self) -> DbResult<Transaction> {
        Transaction::new(
            Arc::clone(&self.file_manager),
            Arc::clone(&self.log_manager),
            Arc::clone(&self.buffer_manager),
            Arc::clone(&self.lock_table),
        )
    }

    pub fn block_size(&self) -> usize {
        self.file_manager.block_size()
    }

    pub fn available_buffers(&self) -> usize {
        self.buffer_manager.available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn opening_a_fresh_directory_skips_recovery() {
        let dir = TempDir::new("engine-fresh-test").unwrap();
        let engine = StorageEngine::open(dir.path(), StorageEngineConfig::default()).unwrap();
        assert_eq!(engine.block_size(), 400);
        assert_eq!(engine.available_buffers(), 8);
    }

    #[test]
    fn reopening_an_existing_directory_runs_recovery_and_writes_checkpoint() {
        let dir = TempDir::new("engine-reopen-test").unwrap();
        {
            let engine = StorageEngine::open(dir.path(), StorageEngineConfig::default()).unwrap();
            let tx = engine.new_transaction().unwrap();
            let block = tx.append("f").unwrap();
            tx.pin(&block).unwrap();
            tx.set_int(&block, 80, 100).unwrap();
            tx.unpin(&block);
            tx.commit().unwrap();
        }

        let engine = StorageEngine::open(dir.path(), StorageEngineConfig::default()).unwrap();
        let tx = engine.new_transaction().unwrap();
        let block = crate::block::BlockId::new("f", 0);
        tx.pin(&block).unwrap();
        assert_eq!(tx.get_int(&block, 80).unwrap(), 100);
        tx.commit().unwrap();
    }
}
