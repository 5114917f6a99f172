//! Storage and transaction core for a teaching relational database engine.
//!
//! This crate provides durable, recoverable, concurrent access to a
//! collection of fixed-size disk blocks through a buffered page cache, a
//! write-ahead log, and transactions implementing ACID semantics via
//! undo-only recovery and two-phase locking.
//!
//! SQL parsing, query planning, metadata catalogs, record files, and any
//! client/server surface live above this crate and are not its concern.

#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]

#[macro_use]
extern crate tracing;

pub mod block;
pub mod buffer;
mod codec;
pub mod concurrency;
pub mod config;
pub mod engine;
pub mod errors;
pub mod file_manager;
pub mod log;
pub mod page;
pub mod recovery;
pub mod transaction;

pub use block::BlockId;
pub use config::StorageEngineConfig;
pub use engine::StorageEngine;
pub use errors::{DbError, DbResult};
pub use page::Page;
pub use transaction::Transaction;
