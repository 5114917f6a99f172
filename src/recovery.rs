//! Per-transaction recovery manager: writes the START record, composes
//! commit/rollback with buffer flushing, and drives undo-only recovery.

use std::{collections::HashSet, sync::Arc};

use tracing::instrument;

use crate::{
    buffer::{BufferId, BufferManager},
    errors::DbResult,
    log::{LogManager, LogRecord, Lsn},
    transaction::Transaction,
};

/// Writes update log records as pre-images only, and drives rollback and
/// crash recovery by walking the log backward and undoing whatever is
/// still outstanding.
///
/// Because `commit` flushes every one of the transaction's dirty buffers
/// before appending (and flushing) the `COMMIT` record, recovery never
/// needs a redo pass: anything durable at commit time stays durable, and
/// anything not yet durable at crash time belongs to a transaction that
/// will be undone.
pub struct RecoveryManager {
    tx_num: i32,
    log_manager: Arc<LogManager>,
    buffer_manager: Arc<BufferManager>,
}

impl RecoveryManager {
    /// Creates a recovery manager for `tx_num` and immediately writes its
    /// START record.
    pub fn new(
        tx_num: i32,
        log_manager: Arc<LogManager>,
        buffer_manager: Arc<BufferManager>,
    ) -> DbResult<Self> {
        log_manager.append(&LogRecord::Start { tx_num }.serialize())?;
        Ok(Self {
            tx_num,
            log_manager,
            buffer_manager,
        })
    }

    #[instrument(skip(self), fields(tx = self.tx_num))]
    pub fn commit(&self) -> DbResult<()> {
        self.buffer_manager.flush_all(self.tx_num)?;
        let lsn = self
            .log_manager
            .append(&LogRecord::Commit { tx_num: self.tx_num }.serialize())?;
        self.log_manager.flush(lsn)
    }

    #[instrument(skip(self, tx), fields(tx = self.tx_num))]
    pub fn rollback(&self, tx: &Transaction) -> DbResult<()> {
        self.do_rollback(tx)?;
        self.buffer_manager.flush_all(self.tx_num)?;
        let lsn = self
            .log_manager
            .append(&LogRecord::Rollback { tx_num: self.tx_num }.serialize())?;
        self.log_manager.flush(lsn)
    }

    /// Undoes every uncommitted transaction found in the log, then writes
    /// a quiescent checkpoint. Called once at startup, under a dedicated
    /// recovery transaction.
    #[instrument(skip(self, tx), fields(tx = self.tx_num))]
    pub fn recover(&self, tx: &Transaction) -> DbResult<()> {
        self.do_recover(tx)?;
        self.buffer_manager.flush_all(self.tx_num)?;
        let lsn = self.log_manager.append(&LogRecord::Checkpoint.serialize())?;
        self.log_manager.flush(lsn)
    }

    /// Logs the pre-image of an int write and returns the LSN the caller
    /// must stamp onto the buffer.
    pub fn set_int(&self, buffer: BufferId, offset: usize, old_value: i32) -> DbResult<Lsn> {
        let block = self.buffer_manager.block_of(buffer);
        self.log_manager.append(
            &LogRecord::SetInt {
                tx_num: self.tx_num,
                block,
                offset,
                old_value,
            }
            .serialize(),
        )
    }

    /// Logs the pre-image of a string write and returns the LSN the caller
    /// must stamp onto the buffer.
    pub fn set_string(&self, buffer: BufferId, offset: usize, old_value: &str) -> DbResult<Lsn> {
        let block = self.buffer_manager.block_of(buffer);
        self.log_manager.append(
            &LogRecord::SetString {
                tx_num: self.tx_num,
                block,
                offset,
                old_value: old_value.to_string(),
            }
            .serialize(),
        )
    }

    fn do_rollback(&self, tx: &Transaction) -> DbResult<()> {
        for record in self.log_manager.iterator()? {
            let record = LogRecord::decode(&record?)?;
            if record.tx_number() != self.tx_num {
                continue;
            }
            if matches!(record, LogRecord::Start { .. }) {
                return Ok(());
            }
            record.undo(tx)?;
        }
        Ok(())
    }

    fn do_recover(&self, tx: &Transaction) -> DbResult<()> {
        let mut finished: HashSet<i32> = HashSet::new();

        for record in self.log_manager.iterator()? {
            let record = LogRecord::decode(&record?)?;
            match &record {
                LogRecord::Checkpoint => break,
                LogRecord::Commit { tx_num } | LogRecord::Rollback { tx_num } => {
                    finished.insert(*tx_num);
                }
                _ => {
                    if !finished.contains(&record.tx_number()) {
                        record.undo(tx)?;
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{buffer::BufferManager, config::MAX_WAIT, file_manager::FileManager};
    use std::sync::Arc;
    use tempdir::TempDir;

    fn harness() -> (TempDir, Arc<FileManager>, Arc<LogManager>, Arc<BufferManager>) {
        let dir = TempDir::new("recovery-test").unwrap();
        let fm = Arc::new(FileManager::new(dir.path(), 400).unwrap());
        let lm = Arc::new(LogManager::new(Arc::clone(&fm), "test.log").unwrap());
        let bm = Arc::new(BufferManager::new(8, Arc::clone(&fm), Arc::clone(&lm), MAX_WAIT));
        (dir, fm, lm, bm)
    }

    #[test]
    fn new_recovery_manager_writes_start_record() {
        let (_dir, _fm, lm, bm) = harness();
        RecoveryManager::new(1, Arc::clone(&lm), Arc::clone(&bm)).unwrap();

        let records: Vec<LogRecord> = lm
            .iterator()
            .unwrap()
            .map(|b| LogRecord::decode(&b.unwrap()).unwrap())
            .collect();
        assert_eq!(records, vec![LogRecord::Start { tx_num: 1 }]);
    }

    #[test]
    fn commit_writes_commit_record_after_start() {
        let (_dir, _fm, lm, bm) = harness();
        let recovery = RecoveryManager::new(1, Arc::clone(&lm), Arc::clone(&bm)).unwrap();
        recovery.commit().unwrap();

        let records: Vec<LogRecord> = lm
            .iterator()
            .unwrap()
            .map(|b| LogRecord::decode(&b.unwrap()).unwrap())
            .collect();
        assert_eq!(
            records,
            vec![LogRecord::Commit { tx_num: 1 }, LogRecord::Start { tx_num: 1 }]
        );
    }
}
