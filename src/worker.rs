use std::{sync::Arc, time::Duration};

use alloy::primitives::{utils::format_ether, U256};
use tokio_util::sync::CancellationToken;

use crate::{
    chain::{ChainClient, ClaimReceipt},
    constants::{MIN_BALANCE_WEI, RECEIPT_TIMEOUT, SEPOLIA_EXPLORER_URL},
    credentials::{short_identity, Credential},
    error::ChainError,
    stats::{RunningGuard, Stats},
};

/// How a worker left its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Reached the per-wallet attempt cap.
    Capped { attempts: u32 },
    /// Observed the stop token.
    Stopped { attempts: u32 },
}

impl WorkerExit {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Capped { attempts } | Self::Stopped { attempts } => *attempts,
        }
    }
}

/// Claim loop for a single wallet.
pub struct Worker<C> {
    client: Arc<C>,
    credential: Credential,
    stats: Arc<Stats>,
    stop: CancellationToken,
    interval_secs: u64,
    max_attempts: Option<u32>,
}

impl<C: ChainClient> Worker<C> {
    pub fn new(
        client: Arc<C>,
        credential: Credential,
        stats: Arc<Stats>,
        stop: CancellationToken,
        interval_secs: u64,
        max_attempts: Option<u32>,
    ) -> Self {
        Self {
            client,
            credential,
            stats,
            stop,
            interval_secs,
            max_attempts,
        }
    }

    pub fn label(&self) -> String {
        self.credential.label()
    }

    pub async fn run(self) -> WorkerExit {
        let label = self.label();
        if self.stop.is_cancelled() {
            tracing::debug!("[{label}] Stop requested before start, skipping");
            return WorkerExit::Stopped { attempts: 0 };
        }

        let _running = RunningGuard::enter(self.stats.clone());
        let identity = self.credential.identity();

        tracing::info!("[{label}] Worker started for {}", short_identity(&identity));
        self.report_balance(&label).await;

        let mut attempts = 0;
        let exit = loop {
            if self.stop.is_cancelled() {
                break WorkerExit::Stopped { attempts };
            }

            attempts += 1;
            tracing::info!("[{label}] Claim attempt #{attempts}");

            let success = match self.attempt(&label).await {
                Ok(receipt) if receipt.success => {
                    tracing::info!(
                        "[{label}] Claim successful! Gas used: {}. {SEPOLIA_EXPLORER_URL}/tx/{}",
                        receipt.gas_used,
                        receipt.tx_hash
                    );
                    true
                }
                Ok(receipt) => {
                    tracing::error!(
                        "[{label}] Claim transaction reverted: {SEPOLIA_EXPLORER_URL}/tx/{}",
                        receipt.tx_hash
                    );
                    false
                }
                Err(e) => {
                    tracing::error!("[{label}] Claim failed: {e}");
                    false
                }
            };
            self.stats.record_attempt(success);

            if self.max_attempts.is_some_and(|cap| attempts >= cap) {
                tracing::info!("[{label}] Reached the maximum of {attempts} attempts");
                break WorkerExit::Capped { attempts };
            }

            if !self.pause().await {
                break WorkerExit::Stopped { attempts };
            }
        };

        tracing::info!("[{label}] Worker finished after {} attempts", exit.attempts());
        exit
    }

    async fn report_balance(&self, label: &str) {
        let balance = match self.client.balance(self.credential.identity()).await {
            Ok(balance) => balance,
            Err(e) => {
                tracing::error!("[{label}] Failed to query balance: {e}");
                U256::ZERO
            }
        };

        tracing::info!("[{label}] Balance: {} ETH", format_ether(balance));
        if balance < MIN_BALANCE_WEI {
            tracing::warn!("[{label}] Balance is low, gas may not be covered");
        }
    }

    async fn attempt(&self, label: &str) -> Result<ClaimReceipt, ChainError> {
        let nonce = self.client.nonce(self.credential.identity()).await?;
        let tx_hash = self.client.submit_claim(&self.credential, nonce).await?;
        tracing::info!("[{label}] Transaction sent: {tx_hash}");

        self.client.wait_for_receipt(tx_hash, RECEIPT_TIMEOUT).await
    }

    /// Sleeps the interval one second at a time. Returns `false` once the stop
    /// token is cancelled.
    async fn pause(&self) -> bool {
        for _ in 0..self.interval_secs {
            tokio::select! {
                _ = self.stop.cancelled() => return false,
                _ = tokio::time::sleep(Duration::from_secs(1)) => {}
            }
        }
        !self.stop.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        chain::mock::{MockChain, MockOutcome},
        credentials::tests::{credential, KEY_A},
    };

    fn worker(
        chain: &Arc<MockChain>,
        stats: &Arc<Stats>,
        stop: &CancellationToken,
        interval_secs: u64,
        max_attempts: Option<u32>,
    ) -> Worker<MockChain> {
        Worker::new(
            chain.clone(),
            credential(KEY_A, 1),
            stats.clone(),
            stop.clone(),
            interval_secs,
            max_attempts,
        )
    }

    #[tokio::test]
    async fn test_worker_stops_at_cap() {
        let chain = Arc::new(MockChain::new(MockOutcome::Success));
        let stats = Arc::new(Stats::new());
        let stop = CancellationToken::new();

        let exit = worker(&chain, &stats, &stop, 0, Some(3)).run().await;

        assert_eq!(exit, WorkerExit::Capped { attempts: 3 });
        assert_eq!(chain.submissions_for(credential(KEY_A, 1).identity()), 3);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.success_count, 3);
        assert_eq!(snapshot.fail_count, 0);
        assert_eq!(snapshot.running_count, 0);
    }

    #[tokio::test]
    async fn test_failures_are_counted_once_per_attempt() {
        for outcome in [
            MockOutcome::Reverted,
            MockOutcome::NoReceipt,
            MockOutcome::Fail(ChainError::NonceTooLow),
            MockOutcome::Fail(ChainError::InsufficientFunds),
        ] {
            let chain = Arc::new(MockChain::new(outcome));
            let stats = Arc::new(Stats::new());
            let stop = CancellationToken::new();

            let exit = worker(&chain, &stats, &stop, 0, Some(2)).run().await;

            assert_eq!(exit.attempts(), 2);
            let snapshot = stats.snapshot();
            assert_eq!(snapshot.success_count, 0);
            assert_eq!(snapshot.fail_count, 2);
        }
    }

    #[tokio::test]
    async fn test_stopped_worker_makes_no_attempt() {
        let chain = Arc::new(MockChain::new(MockOutcome::Success));
        let stats = Arc::new(Stats::new());
        let stop = CancellationToken::new();
        stop.cancel();

        let exit = worker(&chain, &stats, &stop, 0, None).run().await;

        assert_eq!(exit, WorkerExit::Stopped { attempts: 0 });
        assert_eq!(chain.balance_calls(), 0);
        assert_eq!(chain.total_submissions(), 0);
        assert_eq!(stats.snapshot().running_count, 0);
    }

    #[tokio::test]
    async fn test_stop_interrupts_the_wait() {
        let chain = Arc::new(MockChain::new(MockOutcome::Success));
        let stats = Arc::new(Stats::new());
        let stop = CancellationToken::new();

        let handle = tokio::spawn(worker(&chain, &stats, &stop, 3600, None).run());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(stats.snapshot().running_count, 1);

        stop.cancel();
        let exit = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("worker should observe the stop token within the timeout")
            .unwrap();

        assert_eq!(exit, WorkerExit::Stopped { attempts: 1 });
        assert_eq!(stats.snapshot().running_count, 0);
    }

    #[tokio::test]
    async fn test_low_balance_does_not_stop_worker() {
        let mut chain = MockChain::new(MockOutcome::Success);
        chain.balance = U256::ZERO;
        let chain = Arc::new(chain);
        let stats = Arc::new(Stats::new());
        let stop = CancellationToken::new();

        let exit = worker(&chain, &stats, &stop, 0, Some(1)).run().await;

        assert_eq!(exit, WorkerExit::Capped { attempts: 1 });
        assert_eq!(stats.snapshot().success_count, 1);
    }
}
