use std::sync::Arc;

use clap::Parser;
use tokio::io::BufReader;

use pool_supervisor::cli;
use pool_supervisor::commands::Dispatcher;
use pool_supervisor::config::{CliArgs, PoolConfig};
use pool_supervisor::pool::{PoolContext, WorkerPool, spawn_launcher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout is reserved for operator output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = match PoolConfig::try_from(CliArgs::parse()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    eprintln!("Pool Supervisor v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Workers: {}", config.initial_workers);
    eprintln!("   Launch delay: {:?}", config.launch_delay);
    eprintln!("   Tick: {:?}", config.time_unit);
    eprintln!("   Commands: info | new [seed] | kill <id> | reset <id> [value] | stop\n");

    let ctx = Arc::new(PoolContext::new(config.time_unit));
    let pool = Arc::new(WorkerPool::new(Arc::clone(&ctx)));

    let launcher = spawn_launcher(
        Arc::clone(&pool),
        config.initial_workers,
        config.launch_delay,
    );

    let dispatcher = Dispatcher::new(Arc::clone(&pool));
    let stdin = BufReader::new(tokio::io::stdin());
    cli::run(&dispatcher, ctx.subscribe(), stdin, tokio::io::stdout()).await?;

    launcher.await?;

    tracing::info!("Pool supervisor exited cleanly");
    Ok(())
}
