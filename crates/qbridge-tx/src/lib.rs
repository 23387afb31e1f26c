//! Destination-chain settlement.
//!
//! - Build `processBridgeDeposit` requests from decoded deposits
//! - Submit through a `DestinationClient` and wait for confirmation
//! - Fold idempotent conflicts into success so the tracker never retries them

use alloy::primitives::{Address, I256, B256, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod destination_client;
pub mod settlement;

pub use destination_client::EvmDestinationClient;
pub use settlement::{DepositDisposition, SettlementService};

use qbridge_types::DepositId;

/// Why a destination-chain submission did not produce a fresh settlement.
///
/// Node error messages are classified into these kinds once, inside the
/// destination client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// An identical transaction is already in the mempool.
    #[error("transaction already pending")]
    AlreadyPending,

    /// The bridge contract has already processed this deposit.
    #[error("deposit already processed")]
    AlreadyProcessed,

    /// The transaction was mined but execution failed.
    #[error("transaction {tx_hash} reverted")]
    Reverted { tx_hash: B256 },

    /// The node refused the transaction (invalid, underfunded, reverted in simulation).
    #[error("transaction rejected: {0}")]
    Rejected(String),

    /// The node could not be reached or confirmation timed out.
    #[error("transport error: {0}")]
    Transport(String),
}

impl SubmitError {
    /// Whether the requested effect has already happened or is about to.
    pub fn is_idempotent_conflict(&self) -> bool {
        matches!(self, Self::AlreadyPending | Self::AlreadyProcessed)
    }
}

/// Arguments of one `processBridgeDeposit` call, minus the fixed target token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRequest {
    pub deposit_id: DepositId,
    pub recipient: Address,
    pub amount: U256,
    pub source_chain_id: u64,
    pub source_token: Address,
}

/// Result of settling one deposit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// A new settlement transaction was confirmed.
    Settled { tx_hash: B256 },
    /// A duplicate submission was already pending.
    AlreadyPending,
    /// The destination contract had already processed the deposit.
    AlreadyProcessed,
    Failed(SubmitError),
}

impl SettlementOutcome {
    /// Settled, AlreadyPending and AlreadyProcessed all complete the deposit.
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

impl From<Result<B256, SubmitError>> for SettlementOutcome {
    fn from(result: Result<B256, SubmitError>) -> Self {
        match result {
            Ok(tx_hash) => Self::Settled { tx_hash },
            Err(SubmitError::AlreadyPending) => Self::AlreadyPending,
            Err(SubmitError::AlreadyProcessed) => Self::AlreadyProcessed,
            Err(other) => Self::Failed(other),
        }
    }
}

/// Signer-backed connection to the destination chain.
///
/// Every method submits one transaction and returns its hash once it is
/// confirmed. Implementations serialise submissions from the shared signer.
#[async_trait]
pub trait DestinationClient: Send + Sync {
    async fn process_deposit(&self, request: &SettlementRequest) -> Result<B256, SubmitError>;
    async fn update_oracle_answer(&self, oracle: Address, answer: I256) -> Result<B256, SubmitError>;
}
