//! Storage engine configuration.

use std::time::Duration;

use snafu::Snafu;

/// Default block size, in bytes, used when a configuration does not
/// override it.
pub const DEFAULT_BLOCK_SIZE: usize = 400;

/// Default number of frames in the buffer pool.
pub const DEFAULT_BUFFER_POOL_SIZE: usize = 8;

/// Default name of the write-ahead log file within the database directory.
pub const DEFAULT_LOG_FILE_NAME: &str = "simpledb.log";

/// How long a caller will wait for a buffer frame or a lock before the
/// wait is abandoned and a `BufferAbort`/`LockAbort` is raised.
///
/// This single constant backs both the buffer pool's wait and the lock
/// table's wait: the spec gives both a 10 second bound and nothing
/// distinguishes them.
pub const MAX_WAIT: Duration = Duration::from_secs(10);

#[derive(Debug, Snafu)]
pub enum BuildError {
    #[snafu(display("parameter '{}' was invalid: {}", param_name, reason))]
    InvalidParameter {
        param_name: &'static str,
        reason: String,
    },
}

/// Configuration for a [`crate::engine::StorageEngine`].
#[derive(Debug, Clone)]
pub struct StorageEngineConfig {
    pub(crate) block_size: usize,
    pub(crate) buffer_pool_size: usize,
    pub(crate) log_file_name: String,
    pub(crate) max_wait: Duration,
}

impl Default for StorageEngineConfig {
    fn default() -> Self {
        StorageEngineConfigBuilder::new()
            .build()
            .expect("defaults are always valid")
    }
}

impl StorageEngineConfig {
    pub fn builder() -> StorageEngineConfigBuilder {
        StorageEngineConfigBuilder::new()
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn buffer_pool_size(&self) -> usize {
        self.buffer_pool_size
    }

    pub fn log_file_name(&self) -> &str {
        &self.log_file_name
    }

    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }
}

/// Builder for [`StorageEngineConfig`].
#[derive(Debug, Clone)]
pub struct StorageEngineConfigBuilder {
    block_size: Option<usize>,
    buffer_pool_size: Option<usize>,
    log_file_name: Option<String>,
    max_wait: Option<Duration>,
}

impl StorageEngineConfigBuilder {
    pub fn new() -> Self {
        Self {
            block_size: None,
            buffer_pool_size: None,
            log_file_name: None,
            max_wait: None,
        }
    }

    /// Sets the block size, in bytes, used for both data and log blocks.
    ///
    /// Defaults to 400.
    pub fn block_size(mut self, size: usize) -> Self {
        self.block_size = Some(size);
        self
    }

    /// Sets the number of frames in the buffer pool.
    ///
    /// Defaults to 8.
    pub fn buffer_pool_size(mut self, count: usize) -> Self {
        self.buffer_pool_size = Some(count);
        self
    }

    /// Sets the name of the write-ahead log file within the database
    /// directory.
    ///
    /// Defaults to `"simpledb.log"`.
    pub fn log_file_name(mut self, name: impl Into<String>) -> Self {
        self.log_file_name = Some(name.into());
        self
    }

    /// Sets how long callers wait for a buffer frame or a lock before
    /// aborting.
    ///
    /// Defaults to 10 seconds.
    pub fn max_wait(mut self, duration: Duration) -> Self {
        self.max_wait = Some(duration);
        self
    }

    pub fn build(self) -> Result<StorageEngineConfig, BuildError> {
        let block_size = self.block_size.unwrap_or(DEFAULT_BLOCK_SIZE);
        let buffer_pool_size = self.buffer_pool_size.unwrap_or(DEFAULT_BUFFER_POOL_SIZE);
        let log_file_name = self
            .log_file_name
            .unwrap_or_else(|| DEFAULT_LOG_FILE_NAME.to_string());
        let max_wait = self.max_wait.unwrap_or(MAX_WAIT);

        if block_size == 0 {
            return Err(BuildError::InvalidParameter {
                param_name: "block_size",
                reason: "cannot be zero".to_string(),
            });
        }

        // The log header alone needs 4 bytes of boundary, plus room for at
        // least one minimal record; anything smaller can never hold a
        // START/COMMIT/ROLLBACK record (8 bytes + 4-byte length prefix).
        if block_size < 16 {
            return Err(BuildError::InvalidParameter {
                param_name: "block_size",
                reason: "must be at least 16 bytes to hold a log header and one record"
                    .to_string(),
            });
        }

        if buffer_pool_size == 0 {
            return Err(BuildError::InvalidParameter {
                param_name: "buffer_pool_size",
                reason: "cannot be zero".to_string(),
            });
        }

        if log_file_name.is_empty() {
            return Err(BuildError::InvalidParameter {
                param_name: "log_file_name",
                reason: "cannot be empty".to_string(),
            });
        }

        Ok(StorageEngineConfig {
            block_size,
            buffer_pool_size,
            log_file_name,
            max_wait,
        })
    }
}

impl Default for StorageEngineConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = StorageEngineConfig::default();
        assert_eq!(config.block_size(), 400);
        assert_eq!(config.buffer_pool_size(), 8);
        assert_eq!(config.log_file_name(), "simpledb.log");
        assert_eq!(config.max_wait(), Duration::from_secs(10));
    }

    #[test]
    fn rejects_zero_block_size() {
        let result = StorageEngineConfig::builder().block_size(0).build();
        assert!(result.is_err());
    }

    #[test]
    fn rejects_zero_buffer_pool_size() {
        let result = StorageEngineConfig::builder().buffer_pool_size(0).build();
        assert!(result.is_err());
    }
}
