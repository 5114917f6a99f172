//! Process-wide lock table plus the per-transaction view over it that
//! enforces two-phase locking.

mod concurrency_manager;
mod lock_table;

pub use concurrency_manager::ConcurrencyManager;
pub use lock_table::LockTable;
