//! In-memory engine

mod snapshot;
mod store;
mod stream;

pub use store::{MemoryEventStore, MemoryEventStoreConfig};
pub use stream::EventStream;
