//! Signer-backed JSON-RPC client for the destination chain.
//!
//! Calls:
//! - `processBridgeDeposit(bytes32,address,uint256,uint256,address,address)` on the bridge
//! - `updateAnswer(int256)` on a mock price aggregator
//!
//! One async mutex covers submit and confirmation, so transactions from the
//! relayer key are sent strictly one after another. Both phases are bounded:
//! the send phase by the request timeout, the receipt wait by the
//! confirmation timeout.

use std::future::Future;
use std::time::Duration;

use alloy::contract::Error as ContractError;
use alloy::network::{Ethereum, EthereumWallet};
use alloy::primitives::{Address, I256, B256, U256};
use alloy::providers::{DynProvider, PendingTransactionBuilder, PendingTransactionError, Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use alloy::sol_types::decode_revert_reason;
use alloy::transports::TransportError;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

use qbridge_types::{BridgeError, Result, DEFAULT_RPC_TIMEOUT_MS};

use crate::{DestinationClient, SettlementRequest, SubmitError};

sol! {
    #[sol(rpc)]
    interface IDestinationBridge {
        function processBridgeDeposit(
            bytes32 depositId,
            address recipient,
            uint256 amount,
            uint256 sourceChainId,
            address sourceToken,
            address targetToken
        ) external;
    }

    #[sol(rpc)]
    interface IMockAggregator {
        function updateAnswer(int256 answer) external;
    }
}

/// Default time to wait for a submitted transaction to be mined.
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);

/// alloy-backed destination chain client.
pub struct EvmDestinationClient {
    bridge_address: Address,
    target_token: Address,
    signer_address: Address,
    provider: DynProvider,
    request_timeout: Duration,
    confirmation_timeout: Duration,
    submit_lock: Mutex<()>,
}

impl EvmDestinationClient {
    pub fn new(
        rpc_url: &str,
        bridge_address: Address,
        target_token: Address,
        signer: PrivateKeySigner,
        confirmation_timeout: Option<Duration>,
    ) -> Result<Self> {
        let url: Url = rpc_url
            .parse()
            .map_err(|e| BridgeError::Config(format!("destination rpc url: {e}")))?;
        let signer_address = signer.address();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(url)
            .erased();

        Ok(Self {
            bridge_address,
            target_token,
            signer_address,
            provider,
            request_timeout: Duration::from_millis(DEFAULT_RPC_TIMEOUT_MS),
            confirmation_timeout: confirmation_timeout.unwrap_or(DEFAULT_CONFIRMATION_TIMEOUT),
            submit_lock: Mutex::new(()),
        })
    }

    pub fn signer_address(&self) -> Address {
        self.signer_address
    }

    /// Bound the send phase: fee and nonce lookups, gas estimation and broadcast.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    async fn send_bounded(
        &self,
        send: impl Future<Output = std::result::Result<PendingTransactionBuilder<Ethereum>, ContractError>>,
    ) -> std::result::Result<PendingTransactionBuilder<Ethereum>, SubmitError> {
        match tokio::time::timeout(self.request_timeout, send).await {
            Ok(result) => result.map_err(classify_contract_error),
            Err(_) => Err(SubmitError::Transport(format!(
                "send timed out after {}ms",
                self.request_timeout.as_millis()
            ))),
        }
    }

    /// Wait for the receipt; a failed status is a revert.
    async fn confirm(&self, pending: PendingTransactionBuilder<Ethereum>) -> std::result::Result<B256, SubmitError> {
        let tx_hash = *pending.tx_hash();
        debug!(tx_hash = %tx_hash, "waiting for confirmation");

        let receipt = pending
            .with_timeout(Some(self.confirmation_timeout))
            .get_receipt()
            .await
            .map_err(classify_pending_error)?;

        if !receipt.status() {
            return Err(SubmitError::Reverted { tx_hash });
        }
        Ok(tx_hash)
    }
}

#[async_trait]
impl DestinationClient for EvmDestinationClient {
    async fn process_deposit(&self, request: &SettlementRequest) -> std::result::Result<B256, SubmitError> {
        let _guard = self.submit_lock.lock().await;

        let bridge = IDestinationBridge::new(self.bridge_address, &self.provider);
        let call = bridge.processBridgeDeposit(
            request.deposit_id.as_b256(),
            request.recipient,
            request.amount,
            U256::from(request.source_chain_id),
            request.source_token,
            self.target_token,
        );
        let pending = self.send_bounded(call.send()).await?;

        self.confirm(pending).await
    }

    async fn update_oracle_answer(&self, oracle: Address, answer: I256) -> std::result::Result<B256, SubmitError> {
        let _guard = self.submit_lock.lock().await;

        let aggregator = IMockAggregator::new(oracle, &self.provider);
        let call = aggregator.updateAnswer(answer);
        let pending = self.send_bounded(call.send()).await?;

        self.confirm(pending).await
    }
}

/// Map a node error message onto an idempotent-conflict kind, if it is one.
///
/// - `already processed`: bridge contract revert reason
/// - `tx already in mempool`: Cosmos-EVM mempool
/// - `already known`: geth-style mempool
pub fn classify_message(message: &str) -> Option<SubmitError> {
    let lower = message.to_ascii_lowercase();
    if lower.contains("already processed") {
        Some(SubmitError::AlreadyProcessed)
    } else if lower.contains("tx already in mempool") || lower.contains("already known") {
        Some(SubmitError::AlreadyPending)
    } else {
        None
    }
}

/// Classify a rejection that carries a node error message.
fn classify_rejection(message: String) -> SubmitError {
    classify_message(&message).unwrap_or(SubmitError::Rejected(message))
}

fn classify_transport_error(err: &TransportError) -> SubmitError {
    match err.as_error_resp() {
        Some(payload) => {
            let mut message = payload.message.to_string();
            if let Some(reason) = payload.as_revert_data().and_then(|data| decode_revert_reason(&data)) {
                message = format!("{message}: {reason}");
            }
            classify_rejection(message)
        }
        None => {
            let message = err.to_string();
            classify_message(&message).unwrap_or(SubmitError::Transport(message))
        }
    }
}

fn classify_contract_error(err: ContractError) -> SubmitError {
    match err {
        ContractError::TransportError(e) => classify_transport_error(&e),
        ContractError::PendingTransactionError(e) => classify_pending_error(e),
        other => classify_rejection(other.to_string()),
    }
}

/// Confirmation timeouts and watcher failures are transport failures.
fn classify_pending_error(err: PendingTransactionError) -> SubmitError {
    match err {
        PendingTransactionError::TransportError(e) => classify_transport_error(&e),
        other => SubmitError::Transport(other.to_string()),
    }
}
