//! Operator commands and their dispatch onto the pool.

use std::fmt;
use std::sync::Arc;

use crate::error::CommandError;
use crate::pool::WorkerPool;
use crate::worker::{WorkerId, WorkerInfo};

/// A parsed operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `info`
    Info,
    /// `new [seed]`
    Spawn { seed: Option<i64> },
    /// `kill <id>`
    Kill { id: WorkerId },
    /// `reset <id> [value]`
    Reset { id: WorkerId, value: i64 },
    /// `stop`
    Stop,
}

impl Command {
    /// Parse one input line. Returns `Ok(None)` for a blank line.
    ///
    /// A missing or non-numeric `new` seed and `reset` value fall back to a
    /// random seed and 0 respectively. Extra arguments are ignored.
    pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let mut tokens = line.split_whitespace();
        let Some(name) = tokens.next() else {
            return Ok(None);
        };

        let command = match name {
            "info" => Self::Info,
            "new" => Self::Spawn {
                seed: tokens.next().and_then(|s| s.parse().ok()),
            },
            "kill" => Self::Kill {
                id: parse_id(tokens.next())?,
            },
            "reset" => Self::Reset {
                id: parse_id(tokens.next())?,
                value: tokens.next().and_then(|s| s.parse().ok()).unwrap_or(0),
            },
            "stop" => Self::Stop,
            other => {
                return Err(CommandError::Unknown {
                    name: other.to_string(),
                });
            }
        };
        Ok(Some(command))
    }
}

fn parse_id(token: Option<&str>) -> Result<WorkerId, CommandError> {
    token
        .and_then(|s| s.parse().ok())
        .ok_or(CommandError::MissingWorkerId)
}

/// Result of a dispatched command, rendered for the operator via `Display`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Nothing to report (blank line, or kill/reset of an unknown id).
    Ack,
    Workers(Vec<WorkerInfo>),
    Spawned(WorkerId),
    Killed(WorkerId),
    ResetDone { id: WorkerId, value: i64 },
    Stopped,
    /// Malformed or unknown command; nothing was done.
    Rejected(CommandError),
    /// The pool refused or faulted.
    Failed(String),
}

impl Reply {
    /// Whether the input loop should stop after this reply.
    pub fn is_stop(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ack => Ok(()),
            Self::Workers(workers) if workers.is_empty() => write!(f, "No running workers."),
            Self::Workers(workers) => {
                let lines: Vec<String> = workers
                    .iter()
                    .map(|w| format!("Worker (id={}), value = {}", w.id, w.value))
                    .collect();
                write!(f, "{}", lines.join("\n"))
            }
            Self::Spawned(id) => write!(f, "Spawning worker (id={id})"),
            Self::Killed(id) => write!(f, "Worker (id={id}) was killed"),
            Self::ResetDone { id, value } => write!(f, "Worker (id={id}), new value is {value}"),
            Self::Stopped => write!(f, "All workers stopped."),
            Self::Rejected(e) => write!(f, "{e}"),
            Self::Failed(msg) => write!(f, "Error: {msg}"),
        }
    }
}

/// Maps operator commands onto the [`WorkerPool`].
///
/// Commands are meant to be dispatched one at a time from a single input
/// loop.
pub struct Dispatcher {
    pool: Arc<WorkerPool>,
}

impl Dispatcher {
    pub fn new(pool: Arc<WorkerPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// Parse and execute one input line.
    pub async fn dispatch(&self, line: &str) -> Reply {
        match Command::parse(line) {
            Ok(Some(command)) => self.execute(command).await,
            Ok(None) => Reply::Ack,
            Err(e) => {
                tracing::debug!(line, "Rejected command: {e}");
                Reply::Rejected(e)
            }
        }
    }

    pub async fn execute(&self, command: Command) -> Reply {
        match command {
            Command::Info => Reply::Workers(self.pool.info().await),
            Command::Spawn { seed } => match self.pool.spawn(seed).await {
                Ok(id) => Reply::Spawned(id),
                Err(e) => Reply::Failed(e.to_string()),
            },
            Command::Kill { id } => match self.pool.kill(id).await {
                Ok(true) => Reply::Killed(id),
                Ok(false) => Reply::Ack,
                Err(e) => Reply::Failed(e.to_string()),
            },
            Command::Reset { id, value } => {
                if self.pool.reset(id, value).await {
                    Reply::ResetDone { id, value }
                } else {
                    Reply::Ack
                }
            }
            Command::Stop => match self.pool.shutdown_all().await {
                Ok(()) => Reply::Stopped,
                Err(e) => {
                    // The pool is closed and empty either way.
                    tracing::error!("Shutdown finished with a fault: {e}");
                    Reply::Stopped
                }
            },
        }
    }
}
