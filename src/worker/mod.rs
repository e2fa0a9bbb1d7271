//! Worker system — counter tasks and their shared state.
//!
//! Core components:
//! - `registry` — authoritative per-worker state (killed flag, counter)
//! - `state` — worker lifecycle (Starting → Running → Stopping → Terminated)
//! - `task` — the worker loop itself

pub mod registry;
pub mod state;
pub mod task;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use registry::{Registry, TickOutcome, WorkerInfo, WorkerRecord};
pub use state::{WorkerLifecycle, WorkerState};
pub use task::worker_loop;

/// Opaque worker identity, unique for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(u64);

impl WorkerId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for WorkerId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}
