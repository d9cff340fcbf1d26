//! Port agent - connects instruments to client software
//!
//! Usage:
//!   port-agent                          Run with ./port-agent.toml
//!   port-agent --config agent.toml -v   Run with another config, debug output
//!   port-agent --data-port 4001 --once  Poll once, print status and exit

use anyhow::Result;
use clap::Parser;
use port_agent::cli::Cli;
use port_agent::{config, logging, PortAgent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    let config = config::load(&cli.config)?;

    let mut agent = PortAgent::from_config(&config);
    cli.apply_overrides(agent.connection_mut());

    if cli.once {
        let status = agent.poll();
        println!("{}", status);
        return Ok(());
    }

    let interval = Duration::from_millis(config.agent.poll_interval_ms);
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(agent, interval));
    Ok(())
}

async fn run(agent: PortAgent, interval: Duration) {
    info!(
        "Starting port agent: {} connection, polling every {:?}",
        agent.connection().kind(),
        interval
    );

    // Setup shutdown handler
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        tokio::spawn(async move {
            let (mut sigterm, mut sigint) =
                match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                    (Ok(term), Ok(int)) => (term, int),
                    (Err(e), _) | (_, Err(e)) => {
                        warn!("Cannot install signal handlers: {}", e);
                        return;
                    }
                };

            tokio::select! {
                _ = sigterm.recv() => {},
                _ = sigint.recv() => {},
            }
            shutdown_clone.store(true, Ordering::SeqCst);
        });
    }

    #[cfg(windows)]
    {
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            shutdown_clone.store(true, Ordering::SeqCst);
        });
    }

    agent.run(interval, shutdown).await;
}
