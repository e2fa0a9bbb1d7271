//! Worker pool — supervision of running workers.
//!
//! - `context` — shared state: registry, shutdown flag, id allocator, events
//! - `manager` — spawn / info / kill / reset / shutdown
//! - `launcher` — throttled startup population

pub mod context;
pub mod launcher;
pub mod manager;

pub use context::{PoolContext, WorkerEvent};
pub use launcher::spawn_launcher;
pub use manager::WorkerPool;
