//! `faxgw` binary: runs the gateway until SIGINT, SIGTERM or SIGHUP

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use faxgw::cli::Cli;
use faxgw::gateway_core::{Gateway, PassthroughFactory};
use faxgw::infra_common::logging::{log_welcome, setup_logging};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.logging_config()?)?;
    log_welcome("faxgw", faxgw::VERSION);

    let config = cli.gateway_config().context("invalid configuration")?;
    let gateway = Gateway::new(
        config,
        Arc::new(PassthroughFactory),
        tokio::runtime::Handle::current(),
    )
    .context("failed to start gateway")?;
    let shutdown = gateway.shutdown_handle();

    // the event loop blocks, and joins bridge tasks on teardown
    let mut event_loop = tokio::task::spawn_blocking(move || {
        let mut gateway = gateway;
        gateway.run()
    });

    tokio::select! {
        signal = wait_for_signal() => {
            info!("Received {}, shutting down", signal?);
            shutdown.trigger();
            event_loop.await??;
        }
        result = &mut event_loop => {
            result??;
        }
    }

    info!("faxgw exited");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() -> Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;

    Ok(tokio::select! {
        _ = interrupt.recv() => "SIGINT",
        _ = terminate.recv() => "SIGTERM",
        _ = hangup.recv() => "SIGHUP",
    })
}

#[cfg(not(unix))]
async fn wait_for_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("Ctrl-C")
}
