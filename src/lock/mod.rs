//! Concurrency primitives
//!
//! The memory engine serializes appends and admits concurrent queries through
//! a FIFO-fair read/write lock.

mod fifo;

pub use fifo::{FairReadGuard, FairRwLock, FairWriteGuard, LockKind, LockStatus};
