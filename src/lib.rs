//! Pool Supervisor — interactive worker-pool core.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod pool;
pub mod worker;
