//! Error types for the storage and transaction core.

use std::io;

use snafu::Snafu;

use crate::block::BlockId;

/// Errors surfaced by the storage and transaction core.
///
/// Every variant here corresponds to one of the error kinds named in the
/// core's error handling design: buffer pool exhaustion, lock wait
/// timeouts, I/O failure, and log corruption. `ProgrammerError` conditions
/// (double commit, operating on an unpinned block, and so on) are not
/// represented as a variant here — they are asserted against directly,
/// since recovering from them gracefully is not part of the contract.
#[derive(Debug, Snafu)]
pub enum DbError {
    /// A read, write, or append against a data or log file failed.
    #[snafu(display("I/O failure against the database directory: {}", source))]
    Io { source: io::Error },

    /// No buffer became available within the buffer pool's wait timeout.
    #[snafu(display(
        "buffer pool exhausted: no frame became available within the wait timeout"
    ))]
    BufferAbort,

    /// A shared or exclusive lock request on `block` was not granted
    /// within the lock table's wait timeout.
    #[snafu(display("lock request on {} timed out", block))]
    LockAbort { block: BlockId },

    /// A log record could not be decoded: either its op code is unknown,
    /// or its declared length would read past the end of the block.
    #[snafu(display("log is corrupted: {}", reason))]
    LogCorruption { reason: String },
}

pub type DbResult<T> = Result<T, DbError>;
