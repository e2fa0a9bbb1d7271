//! Configuration types.

use std::time::Duration;

use clap::Parser;

use crate::error::ConfigError;

/// Startup options for the `pool-supervisor` binary.
///
/// Values come from CLI flags or environment variables. Counts are parsed
/// as signed integers so negative input is reported as a configuration
/// error rather than a parse failure.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "pool-supervisor",
    version,
    about = "Interactive supervisor for a pool of counter workers"
)]
pub struct CliArgs {
    /// Number of workers started at launch.
    ///
    /// Defaults to the available hardware parallelism.
    ///
    /// Environment variable: `POOL_THREADS`
    #[arg(long, env = "POOL_THREADS", allow_negative_numbers = true)]
    pub threads: Option<i64>,

    /// Delay between consecutive launches, in time units.
    ///
    /// Environment variable: `POOL_DELAY`
    #[arg(long, env = "POOL_DELAY", default_value_t = 1, allow_negative_numbers = true)]
    pub delay: i64,

    /// Length of one time unit (and one worker tick) in milliseconds.
    ///
    /// Environment variable: `POOL_TIME_UNIT_MS`
    #[arg(long, env = "POOL_TIME_UNIT_MS", default_value_t = 1000, allow_negative_numbers = true)]
    pub time_unit_ms: i64,
}

/// Validated, immutable pool configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Workers started by the launcher.
    pub initial_workers: usize,
    /// Pause between launcher spawns.
    pub launch_delay: Duration,
    /// One time unit; also the worker tick interval.
    pub time_unit: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            initial_workers: default_worker_count(),
            launch_delay: Duration::from_secs(1),
            time_unit: Duration::from_secs(1),
        }
    }
}

impl TryFrom<CliArgs> for PoolConfig {
    type Error = ConfigError;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let initial_workers = match args.threads {
            Some(n) => non_negative("threads", n)? as usize,
            None => default_worker_count(),
        };
        let delay = non_negative("delay", args.delay)?;
        let unit_ms = non_negative("time-unit-ms", args.time_unit_ms)?;
        if unit_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "time-unit-ms".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        let time_unit = Duration::from_millis(unit_ms);
        let launch_delay = time_unit
            .checked_mul(u32::try_from(delay).map_err(|_| too_large("delay"))?)
            .ok_or_else(|| too_large("delay"))?;

        Ok(Self {
            initial_workers,
            launch_delay,
            time_unit,
        })
    }
}

fn non_negative(key: &str, value: i64) -> Result<u64, ConfigError> {
    u64::try_from(value).map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: "Parameter value must be a non-negative integer".to_string(),
    })
}

fn too_large(key: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: "value is too large".to_string(),
    }
}

fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
