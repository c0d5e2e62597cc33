use std::{process::ExitCode, sync::Arc};

use clap::Parser;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use chain::EvmClient;
use cli::Args;
use config::{Config, RunConfig};
use constants::EXPECTED_CHAIN;
use credentials::{read_private_keys, short_identity, Credential};
use dispatcher::{DispatchSettings, Dispatcher};
use logger::init_default_logger;
use shutdown::Shutdown;

mod chain;
mod cli;
mod config;
mod constants;
mod credentials;
mod dispatcher;
mod error;
mod logger;
mod shutdown;
mod stats;
mod worker;

#[tokio::main]
async fn main() -> eyre::Result<ExitCode> {
    let args = Args::parse();
    let _guard = init_default_logger()?;

    let config = Config::read_or_default(&args.config).await;
    let run_config = RunConfig::merge(config, &args);

    let shutdown = Shutdown::listen();

    let client = Arc::new(EvmClient::connect_http(&run_config)?);
    let settings = DispatchSettings::new(
        run_config.max_threads,
        run_config.interval_secs,
        run_config.max_attempts,
    );
    let stop = shutdown.stop_token();
    let network_check =
        Dispatcher::connect(client, EXPECTED_CHAIN as u64, settings, shutdown.clone());
    let connected = tokio::select! {
        _ = stop.cancelled() => {
            tracing::info!("Stopped during the network check");
            return Ok(ExitCode::SUCCESS);
        }
        connected = network_check => connected,
    };
    let dispatcher = match connected {
        Ok(dispatcher) => dispatcher,
        Err(e) => {
            tracing::error!("Network check failed: {e}");
            return Ok(ExitCode::FAILURE);
        }
    };

    let credentials = match load_credentials(&args).await {
        Ok(credentials) if !credentials.is_empty() => credentials,
        Ok(_) => {
            tracing::error!("No valid private keys found");
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => {
            tracing::error!("{e}");
            return Ok(ExitCode::FAILURE);
        }
    };

    log_run_config(&run_config, credentials.len());

    if !args.yes && !confirm_start(&stop).await? {
        tracing::info!("Cancelled before start");
        return Ok(ExitCode::SUCCESS);
    }

    // Completed and interrupted runs both count as a clean exit.
    let outcome = dispatcher.run(credentials).await;
    tracing::debug!("Exiting with outcome {outcome:?}");

    Ok(ExitCode::SUCCESS)
}

async fn load_credentials(args: &Args) -> eyre::Result<Vec<Credential>> {
    if let Some(path) = &args.keys_file {
        return read_private_keys(path).await;
    }

    let raw = args.private_key.as_deref().unwrap_or_default();
    let credential =
        Credential::new(raw, 1).map_err(|e| eyre::eyre!("Private key rejected: {e}"))?;
    tracing::info!(
        "Private key is valid: {}",
        short_identity(&credential.identity())
    );

    Ok(vec![credential])
}

fn log_run_config(run_config: &RunConfig, wallets: usize) {
    tracing::info!("RPC: {}", run_config.rpc_url);
    tracing::info!("Contract: {}", run_config.contract_address);
    tracing::info!("Gas price: {} gwei", run_config.gas_price_gwei);
    tracing::info!("Gas limit: {}", run_config.gas_limit);
    tracing::info!("Wallets: {wallets}");
    tracing::info!("Max threads: {}", run_config.max_threads);
    tracing::info!("Interval: {}s", run_config.interval_secs);
    if let Some(attempts) = run_config.max_attempts {
        tracing::info!("Max attempts: {attempts} per wallet");
    }
}

/// Waits for Enter on stdin. Returns `false` if a stop signal arrives first.
async fn confirm_start(stop: &CancellationToken) -> eyre::Result<bool> {
    println!("\nPress Enter to start claiming, Ctrl+C to stop...");

    // A detached thread so a pending read never holds up runtime shutdown.
    let (tx, rx) = oneshot::channel();
    std::thread::spawn(move || {
        let mut line = String::new();
        let _ = tx.send(std::io::stdin().read_line(&mut line));
    });

    tokio::select! {
        _ = stop.cancelled() => Ok(false),
        read = rx => {
            read??;
            Ok(true)
        }
    }
}
