//! Settlement of admitted deposits.
//!
//! Flow: deposit event → deposit id → tracker admission → submit → confirm → tracker update

use std::sync::Arc;

use alloy::primitives::utils::format_units;
use alloy::primitives::{Address, U256};
use tracing::{info, warn};

use qbridge_crypto::deposit_id_for_event;
use qbridge_store::{Admission, RelayStore};
use qbridge_types::{ChainDescriptor, DepositId, RawDepositEvent, Result, BRIDGED_TOKEN_DECIMALS};

use crate::{DestinationClient, SettlementOutcome, SettlementRequest};

/// What happened to one observed deposit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepositDisposition {
    /// The tracker refused admission; nothing was submitted.
    Skipped(Admission),
    /// A settlement was attempted.
    Attempted(SettlementOutcome),
}

/// Owns the settlement tracker and the destination client.
pub struct SettlementService {
    store: Arc<dyn RelayStore>,
    client: Arc<dyn DestinationClient>,
}

/// Stablecoin amount with six decimals, for log lines.
pub fn format_amount(amount: U256) -> String {
    format_units(amount, BRIDGED_TOKEN_DECIMALS).unwrap_or_else(|_| amount.to_string())
}

impl SettlementService {
    pub fn new(store: Arc<dyn RelayStore>, client: Arc<dyn DestinationClient>) -> Self {
        Self { store, client }
    }

    /// Submit `processBridgeDeposit` and wait for it; conflicts fold into success.
    pub async fn settle(
        &self,
        deposit_id: DepositId,
        recipient: Address,
        amount: U256,
        source_chain_id: u64,
        source_token: Address,
    ) -> SettlementOutcome {
        let request = SettlementRequest {
            deposit_id,
            recipient,
            amount,
            source_chain_id,
            source_token,
        };
        self.client.process_deposit(&request).await.into()
    }

    /// Admit, settle and record one deposit.
    ///
    /// Only tracker errors are returned; a failed settlement is reported in
    /// the disposition and releases the deposit for a later retry.
    pub async fn handle_deposit(
        &self,
        chain: &ChainDescriptor,
        event: &RawDepositEvent,
    ) -> Result<DepositDisposition> {
        let deposit_id = deposit_id_for_event(event);

        let admission = self.store.admit(deposit_id).await?;
        if admission != Admission::Admitted {
            return Ok(DepositDisposition::Skipped(admission));
        }

        info!(
            chain = %chain.name,
            deposit_id = %deposit_id,
            sender = %event.sender,
            amount = %format_amount(event.amount),
            tx_hash = %event.transaction_hash,
            block = event.block_number,
            "new deposit detected"
        );

        let outcome = self
            .settle(
                deposit_id,
                event.sender,
                event.amount,
                event.source_chain_id,
                event.token,
            )
            .await;

        match &outcome {
            SettlementOutcome::Settled { tx_hash } => {
                self.store.mark_completed(deposit_id).await?;
                info!(deposit_id = %deposit_id, tx_hash = %tx_hash, "deposit settled on destination");
            }
            SettlementOutcome::AlreadyPending => {
                self.store.mark_completed(deposit_id).await?;
                info!(deposit_id = %deposit_id, "settlement already pending; treating as settled");
            }
            SettlementOutcome::AlreadyProcessed => {
                self.store.mark_completed(deposit_id).await?;
                info!(deposit_id = %deposit_id, "deposit already processed on destination");
            }
            SettlementOutcome::Failed(err) => {
                self.store.release(deposit_id).await?;
                warn!(deposit_id = %deposit_id, error = %err, "settlement failed");
            }
        }

        Ok(DepositDisposition::Attempted(outcome))
    }
}
