//! hostd - strawman host control-plane daemon.

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use hostd::config::{Args, Config};
use hostd::{Registry, RegistryService, Server, Shutdown, VERSION, daemon};
use tracing::{error, info};

fn main() -> ExitCode {
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("hostd failed: {e:#}");
            eprintln!("hostd: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let mut config = Config::from_args(args)?;

    // Forking has to happen before any runtime threads exist.
    if !config.foreground {
        config.absolutize()?;
        daemon::daemonize()?;
    }
    daemon::init_logging(&config)?;

    let _pid_file = daemon::write_pid_file(&config);

    info!(version = VERSION, listen = %config.listen, "hostd starting");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(serve(config));

    info!(ok = result.is_ok(), "hostd exiting");
    result
}

async fn serve(config: Config) -> Result<()> {
    let shutdown = Shutdown::new();
    daemon::spawn_signal_watcher(shutdown.clone())?;

    let registry = RegistryService::spawn(Registry::new(config.capacity));
    let server = Server::bind(&config.listen, registry, shutdown, config.serve_mode).await?;
    server.run().await?;

    Ok(())
}
