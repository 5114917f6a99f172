//! The CHECKPOINT/START/COMMIT/ROLLBACK/SETINT/SETSTRING log record family.

use crate::{block::BlockId, codec, errors::DbResult, transaction::Transaction};

const OP_CHECKPOINT: i32 = 0;
const OP_START: i32 = 1;
const OP_COMMIT: i32 = 2;
const OP_ROLLBACK: i32 = 3;
const OP_SETINT: i32 = 4;
const OP_SETSTRING: i32 = 5;

/// A single write-ahead log record.
///
/// Update records (`SetInt`/`SetString`) store the value that was
/// overwritten, never the new value: recovery here is undo-only, so only
/// pre-images are ever needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    Checkpoint,
    Start {
        tx_num: i32,
    },
    Commit {
        tx_num: i32,
    },
    Rollback {
        tx_num: i32,
    },
    SetInt {
        tx_num: i32,
        block: BlockId,
        offset: usize,
        old_value: i32,
    },
    SetString {
        tx_num: i32,
        block: BlockId,
        offset: usize,
        old_value: String,
    },
}

impl LogRecord {
    /// The id of the transaction this record belongs to, or -1 for
    /// `Checkpoint`, which belongs to no transaction.
    pub fn tx_number(&self) -> i32 {
        match self {
            LogRecord::Checkpoint => -1,
            LogRecord::Start { tx_num }
            | LogRecord::Commit { tx_num }
            | LogRecord::Rollback { tx_num }
            | LogRecord::SetInt { tx_num, .. }
            | LogRecord::SetString { tx_num, .. } => *tx_num,
        }
    }

    /// Undoes this record's effect against `tx`, if it has one.
    ///
    /// Only `SetInt`/`SetString` do anything: they restore the pre-image
    /// without writing a further log record, which is what makes rollback
    /// of an undo idempotent-safe rather than self-perpetuating.
    pub fn undo(&self, tx: &Transaction) -> DbResult<()> {
        match self {
            LogRecord::SetInt {
                block,
                offset,
                old_value,
                ..
            } => tx.restore_int(block, *offset, *old_value),
            LogRecord::SetString {
                block,
                offset,
                old_value,
                ..
            } => tx.restore_string(block, *offset, old_value),
            _ => Ok(()),
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            LogRecord::Checkpoint => {
                codec::encode_i32(&mut buf, OP_CHECKPOINT);
            }
            LogRecord::Start { tx_num } => {
                codec::encode_i32(&mut buf, OP_START);
                codec::encode_i32(&mut buf, *tx_num);
            }
            LogRecord::Commit { tx_num } => {
                codec::encode_i32(&mut buf, OP_COMMIT);
                codec::encode_i32(&mut buf, *tx_num);
            }
            LogRecord::Rollback { tx_num } => {
                codec::encode_i32(&mut buf, OP_ROLLBACK);
                codec::encode_i32(&mut buf, *tx_num);
            }
            LogRecord::SetInt {
                tx_num,
                block,
                offset,
                old_value,
            } => {
                codec::encode_i32(&mut buf, OP_SETINT);
                codec::encode_i32(&mut buf, *tx_num);
                codec::encode_string(&mut buf, block.file_name());
                codec::encode_i32(&mut buf, block.number());
                codec::encode_i32(&mut buf, *offset as i32);
                codec::encode_i32(&mut buf, *old_value);
            }
            LogRecord::SetString {
                tx_num,
                block,
                offset,
                old_value,
            } => {
                codec::encode_i32(&mut buf, OP_SETSTRING);
                codec::encode_i32(&mut buf, *tx_num);
                codec::encode_string(&mut buf, block.file_name());
                codec::encode_i32(&mut buf, block.number());
                codec::encode_i32(&mut buf, *offset as i32);
                codec::encode_string(&mut buf, old_value);
            }
        }
        buf
    }

    /// Decodes the op code at offset 0 and constructs the matching variant.
    ///
    /// Every field read here comes straight off disk, so a corrupted length
    /// prefix or a truncated record must fail with `LogCorruption` rather
    /// than panic on an out-of-bounds slice — recovery has to stop and
    /// report, not crash the process (§7).
    pub fn decode(bytes: &[u8]) -> DbResult<LogRecord> {
        let op = codec::try_decode_i32(bytes, 0)?;
        match op {
            OP_CHECKPOINT => Ok(LogRecord::Checkpoint),
            OP_START => Ok(LogRecord::Start {
                tx_num: read_tx_num(bytes)?,
            }),
            OP_COMMIT => Ok(LogRecord::Commit {
                tx_num: read_tx_num(bytes)?,
            }),
            OP_ROLLBACK => Ok(LogRecord::Rollback {
                tx_num: read_tx_num(bytes)?,
            }),
            OP_SETINT => decode_set_int(bytes),
            OP_SETSTRING => decode_set_string(bytes),
            other => Err(crate::errors::DbError::LogCorruption {
                reason: format!("unknown log record op code {other}"),
            }),
        }
    }
}

fn read_tx_num(bytes: &[u8]) -> DbResult<i32> {
    codec::try_decode_i32(bytes, codec::INT_BYTES)
}

fn decode_set_int(bytes: &[u8]) -> DbResult<LogRecord> {
    let tx_num = read_tx_num(bytes)?;
    let tpos = codec::INT_BYTES;
    let fpos = tpos + codec::INT_BYTES;
    let (filename, bpos) = codec::try_decode_string(bytes, fpos)?;
    let block_num = codec::try_decode_i32(bytes, bpos)?;
    let opos = bpos + codec::INT_BYTES;
    let offset = codec::try_decode_i32(bytes, opos)?;
    let vpos = opos + codec::INT_BYTES;
    let old_value = codec::try_decode_i32(bytes, vpos)?;
    Ok(LogRecord::SetInt {
        tx_num,
        block: BlockId::new(filename, block_num),
        offset: offset as usize,
        old_value,
    })
}

fn decode_set_string(bytes: &[u8]) -> DbResult<LogRecord> {
    let tx_num = read_tx_num(bytes)?;
    let tpos = codec::INT_BYTES;
    let fpos = tpos + codec::INT_BYTES;
    let (filename, bpos) = codec::try_decode_string(bytes, fpos)?;
    let block_num = codec::try_decode_i32(bytes, bpos)?;
    let opos = bpos + codec::INT_BYTES;
    let offset = codec::try_decode_i32(bytes, opos)?;
    let vpos = opos + codec::INT_BYTES;
    let (old_value, _) = codec::try_decode_string(bytes, vpos)?;
    Ok(LogRecord::SetString {
        tx_num,
        block: BlockId::new(filename, block_num),
        offset: offset as usize,
        old_value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn checkpoint_round_trips() {
        let rec = LogRecord::Checkpoint;
        let bytes = rec.serialize();
        assert_eq!(LogRecord::decode(&bytes).unwrap(), rec);
        assert_eq!(rec.tx_number(), -1);
    }

    #[test]
    fn start_commit_rollback_round_trip() {
        for rec in [
            LogRecord::Start { tx_num: 7 },
            LogRecord::Commit { tx_num: 7 },
            LogRecord::Rollback { tx_num: 7 },
        ] {
            let bytes = rec.serialize();
            assert_eq!(LogRecord::decode(&bytes).unwrap(), rec);
            assert_eq!(rec.tx_number(), 7);
        }
    }

    #[test]
    fn set_int_round_trips() {
        let rec = LogRecord::SetInt {
            tx_num: 1,
            block: BlockId::new("table.tbl", 0),
            offset: 80,
            old_value: 0,
        };
        let bytes = rec.serialize();
        assert_eq!(LogRecord::decode(&bytes).unwrap(), rec);
    }

    #[test]
    fn set_string_round_trips() {
        let rec = LogRecord::SetString {
            tx_num: 1,
            block: BlockId::new("table.tbl", 0),
            offset: 20,
            old_value: String::new(),
        };
        let bytes = rec.serialize();
        assert_eq!(LogRecord::decode(&bytes).unwrap(), rec);
    }

    #[test]
    fn unknown_op_code_is_corruption() {
        let bytes = 99i32.to_be_bytes().to_vec();
        let err = LogRecord::decode(&bytes).unwrap_err();
        assert!(matches!(err, crate::errors::DbError::LogCorruption { .. }));
    }

    #[test]
    fn truncated_record_is_corruption_not_a_panic() {
        let bytes = OP_START.to_be_bytes().to_vec(); // missing the tx_num field
        let err = LogRecord::decode(&bytes).unwrap_err();
        assert!(matches!(err, crate::errors::DbError::LogCorruption { .. }));
    }

    #[test]
    fn set_string_with_a_length_prefix_past_the_end_is_corruption_not_a_panic() {
        let mut rec = LogRecord::SetString {
            tx_num: 1,
            block: BlockId::new("table.tbl", 0),
            offset: 20,
            old_value: String::new(),
        }
        .serialize();
        // Overwrite the filename's length prefix (right after op + tx_num)
        // with a value that runs past the end of the buffer.
        let fpos = 2 * codec::INT_BYTES;
        rec[fpos..fpos + codec::INT_BYTES].copy_from_slice(&9_999i32.to_be_bytes());

        let err = LogRecord::decode(&rec).unwrap_err();
        assert!(matches!(err, crate::errors::DbError::LogCorruption { .. }));
    }
}
