use std::{any::Any, panic::AssertUnwindSafe, sync::Arc, time::Duration};

use futures::FutureExt;
use tokio::{sync::Semaphore, task::JoinSet};
use tokio_util::sync::CancellationToken;

use crate::{
    chain::ChainClient,
    constants::STATS_PRINT_PERIOD,
    credentials::Credential,
    error::{StartupError, WorkerFault},
    shutdown::Shutdown,
    stats::{Stats, StatsSnapshot},
    worker::{Worker, WorkerExit},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSettings {
    pub max_threads: usize,
    pub interval_secs: u64,
    pub max_attempts: Option<u32>,
    pub stats_period: Duration,
}

impl DispatchSettings {
    pub fn new(max_threads: usize, interval_secs: u64, max_attempts: Option<u32>) -> Self {
        Self {
            max_threads,
            interval_secs,
            max_attempts,
            stats_period: STATS_PRINT_PERIOD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every worker hit its cap.
    Completed,
    /// A stop signal ended the run early.
    Interrupted,
}

type WorkerResult = Result<Option<WorkerExit>, WorkerFault>;

/// Runs one [`Worker`] per credential, at most `max_threads` at a time.
///
/// Only obtainable through [`Dispatcher::connect`], so no worker can start
/// against an unreachable or foreign network.
pub struct Dispatcher<C> {
    client: Arc<C>,
    stats: Arc<Stats>,
    settings: DispatchSettings,
    shutdown: Shutdown,
}

impl<C: ChainClient + 'static> Dispatcher<C> {
    pub async fn connect(
        client: Arc<C>,
        expected_chain_id: u64,
        settings: DispatchSettings,
        shutdown: Shutdown,
    ) -> Result<Self, StartupError> {
        tracing::info!("Connecting to the network...");
        let actual = client
            .chain_id()
            .await
            .map_err(StartupError::Unreachable)?;

        if actual != expected_chain_id {
            return Err(StartupError::WrongNetwork {
                expected: expected_chain_id,
                actual,
            });
        }
        tracing::info!("Connected to chain {actual}");

        Ok(Self {
            client,
            stats: Arc::new(Stats::new()),
            settings,
            shutdown,
        })
    }

    #[cfg(test)]
    pub fn stats(&self) -> Arc<Stats> {
        self.stats.clone()
    }

    pub async fn run(&self, credentials: Vec<Credential>) -> RunOutcome {
        let settings = self.settings;
        self.stats.set_total(credentials.len());

        tracing::info!("Starting batch claim for {} wallets", credentials.len());
        tracing::info!(
            "Max threads: {}, interval: {}s",
            settings.max_threads,
            settings.interval_secs
        );
        if let Some(cap) = settings.max_attempts {
            tracing::info!("Each wallet stops after {cap} attempts");
        }

        let stop = self.shutdown.stop_token();
        let force = self.shutdown.force_token();
        let printer_stop = stop.child_token();
        let printer = tokio::spawn(print_stats_periodically(
            self.stats.clone(),
            printer_stop.clone(),
            settings.stats_period,
        ));

        let permits = Arc::new(Semaphore::new(settings.max_threads.max(1)));
        let mut workers = JoinSet::new();

        for credential in credentials {
            let worker = Worker::new(
                self.client.clone(),
                credential,
                self.stats.clone(),
                stop.clone(),
                settings.interval_secs,
                settings.max_attempts,
            );
            workers.spawn(run_worker(worker, permits.clone(), stop.clone()));
        }

        let mut aborted = false;
        loop {
            let joined = tokio::select! {
                joined = workers.join_next() => joined,
                _ = force.cancelled(), if !aborted => {
                    aborted = true;
                    workers.abort_all();
                    continue;
                }
            };
            let Some(joined) = joined else {
                break;
            };

            match joined {
                Ok(Ok(_)) => {}
                Ok(Err(fault)) => tracing::error!("{fault}"),
                Err(e) if e.is_cancelled() => {}
                Err(e) => tracing::error!("Worker task failed to join: {e}"),
            }
        }

        printer_stop.cancel();
        if let Err(e) = printer.await {
            tracing::error!("Stats printer failed: {e}");
        }

        let outcome = if stop.is_cancelled() {
            RunOutcome::Interrupted
        } else {
            RunOutcome::Completed
        };

        tracing::info!("Batch claim finished ({outcome:?})");
        print_stats(&self.stats.snapshot());

        outcome
    }
}

/// Waits for a pool slot, then runs the worker. Workers still queued when the
/// stop token fires never start.
async fn run_worker<C: ChainClient + 'static>(
    worker: Worker<C>,
    permits: Arc<Semaphore>,
    stop: CancellationToken,
) -> WorkerResult {
    let label = worker.label();

    // Stop wins over a permit that frees up at the same moment.
    let _permit = tokio::select! {
        biased;
        _ = stop.cancelled() => return Ok(None),
        permit = permits.acquire_owned() => match permit {
            Ok(permit) => permit,
            Err(_) => return Ok(None),
        },
    };

    AssertUnwindSafe(worker.run())
        .catch_unwind()
        .await
        .map(Some)
        .map_err(|payload| WorkerFault {
            label,
            reason: panic_message(payload.as_ref()),
        })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

async fn print_stats_periodically(stats: Arc<Stats>, stop: CancellationToken, period: Duration) {
    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = tokio::time::sleep(period) => print_stats(&stats.snapshot()),
        }
    }
}

fn print_stats(snapshot: &StatsSnapshot) {
    tracing::info!("Claim stats | {snapshot}");
}
