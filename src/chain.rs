use std::{marker::PhantomData, time::Duration};

use alloy::{
    network::{Ethereum, EthereumWallet, TransactionBuilder},
    primitives::{Address, Bytes, TxHash, U256},
    providers::{Provider, RootProvider},
    rpc::{client::ClientBuilder, types::TransactionRequest},
    sol,
    sol_types::SolCall,
    transports::{
        http::Http,
        layers::{RetryBackoffLayer, RetryBackoffService},
        Transport, TransportError,
    },
};
use alloy_chains::NamedChain;
use async_trait::async_trait;

use ClaimContract::mintCall;

use crate::{
    config::RunConfig,
    constants::{EXPECTED_CHAIN, RECEIPT_POLL_INTERVAL, RPC_REQUEST_TIMEOUT},
    credentials::Credential,
    error::ChainError,
};

sol! {
    contract ClaimContract {
        function mint(address to) external;
    }
}

/// Outcome of a mined claim transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimReceipt {
    pub tx_hash: TxHash,
    pub success: bool,
    pub gas_used: u128,
}

/// Everything a worker needs from the chain. Implementations decide how raw
/// node failures map onto [`ChainError`].
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn chain_id(&self) -> Result<u64, ChainError>;

    async fn balance(&self, identity: Address) -> Result<U256, ChainError>;

    async fn nonce(&self, identity: Address) -> Result<u64, ChainError>;

    /// Signs a claim call from `credential` with the given nonce and submits it.
    async fn submit_claim(&self, credential: &Credential, nonce: u64)
        -> Result<TxHash, ChainError>;

    /// Waits for the receipt of `tx_hash`, giving up with
    /// [`ChainError::Timeout`] once `timeout` has elapsed.
    async fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
        timeout: Duration,
    ) -> Result<ClaimReceipt, ChainError>;
}

/// `mint(address)` with the claimer's own address as the only argument.
pub fn claim_calldata(identity: Address) -> Bytes {
    mintCall { to: identity }.abi_encode().into()
}

/// Maps a node error message onto the failure kinds the worker reports.
pub fn classify_rpc_message(message: &str) -> ChainError {
    let lowered = message.to_lowercase();
    if lowered.contains("insufficient funds") {
        ChainError::InsufficientFunds
    } else if lowered.contains("nonce too low") {
        ChainError::NonceTooLow
    } else if lowered.contains("underpriced") {
        ChainError::Underpriced
    } else {
        ChainError::Other(message.to_string())
    }
}

impl From<TransportError> for ChainError {
    fn from(err: TransportError) -> Self {
        match err.as_error_resp() {
            Some(payload) => classify_rpc_message(&payload.message),
            None => ChainError::Other(err.to_string()),
        }
    }
}

pub type HttpTransport = RetryBackoffService<Http<reqwest::Client>>;

/// [`ChainClient`] backed by an alloy provider. Claims are legacy
/// transactions with a fixed gas price and gas limit.
pub struct EvmClient<P, T> {
    provider: P,
    contract: Address,
    chain_id: u64,
    gas_price_wei: u128,
    gas_limit: u64,
    _transport: PhantomData<T>,
}

impl EvmClient<RootProvider<HttpTransport>, HttpTransport> {
    /// HTTP provider with retry/backoff, mirroring how the RPC endpoints are
    /// set up for every claimer.
    pub fn connect_http(config: &RunConfig) -> eyre::Result<Self> {
        let retry_layer = RetryBackoffLayer::new(10, 2, 500);
        let http = reqwest::Client::builder()
            .timeout(RPC_REQUEST_TIMEOUT)
            .build()?;
        let url: reqwest::Url = config
            .rpc_url
            .parse()
            .map_err(|e| eyre::eyre!("Invalid RPC url {}: {e}", config.rpc_url))?;

        let client = ClientBuilder::default()
            .layer(retry_layer)
            .transport(Http::with_client(http, url), false);

        Ok(Self::new(RootProvider::new(client), config, EXPECTED_CHAIN))
    }
}

impl<P, T> EvmClient<P, T>
where
    P: Provider<T, Ethereum>,
    T: Transport + Clone,
{
    pub fn new(provider: P, config: &RunConfig, chain: NamedChain) -> Self {
        Self {
            provider,
            contract: config.contract_address,
            chain_id: chain as u64,
            gas_price_wei: config.gas_price_wei(),
            gas_limit: config.gas_limit,
            _transport: PhantomData,
        }
    }
}

#[async_trait]
impl<P, T> ChainClient for EvmClient<P, T>
where
    P: Provider<T, Ethereum>,
    T: Transport + Clone,
{
    async fn chain_id(&self) -> Result<u64, ChainError> {
        Ok(self.provider.get_chain_id().await?)
    }

    async fn balance(&self, identity: Address) -> Result<U256, ChainError> {
        Ok(self.provider.get_balance(identity).await?)
    }

    async fn nonce(&self, identity: Address) -> Result<u64, ChainError> {
        Ok(self.provider.get_transaction_count(identity).await?)
    }

    async fn submit_claim(
        &self,
        credential: &Credential,
        nonce: u64,
    ) -> Result<TxHash, ChainError> {
        let wallet = EthereumWallet::new(credential.signer().clone());

        let tx_request = TransactionRequest::default()
            .with_from(credential.identity())
            .with_to(self.contract)
            .with_input(claim_calldata(credential.identity()))
            .with_value(U256::ZERO)
            .with_nonce(nonce)
            .with_chain_id(self.chain_id)
            .with_gas_limit(self.gas_limit.into())
            .with_gas_price(self.gas_price_wei);

        let signed_transaction = tx_request
            .build(&wallet)
            .await
            .map_err(|e| ChainError::Other(format!("failed to sign transaction: {e}")))?;
        let pending_tx = self.provider.send_tx_envelope(signed_transaction).await?;

        Ok(*pending_tx.tx_hash())
    }

    async fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
        timeout: Duration,
    ) -> Result<ClaimReceipt, ChainError> {
        let poll = async {
            loop {
                if let Some(receipt) = self.provider.get_transaction_receipt(tx_hash).await? {
                    return Ok::<_, ChainError>(ClaimReceipt {
                        tx_hash,
                        success: receipt.status(),
                        gas_used: u128::from(receipt.gas_used),
                    });
                }
                tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
            }
        };

        tokio::time::timeout(timeout, poll)
            .await
            .map_err(|_| ChainError::Timeout(timeout))?
    }
}
