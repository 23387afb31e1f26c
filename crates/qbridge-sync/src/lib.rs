//! Event poller for incremental deposit discovery on the source chains.
//!
//! Each source chain keeps a `PollCursor` (last fully scanned block). A poll
//! cycle reads the chain head, clamps the scan window to the lookback limit,
//! fetches `Deposit` logs in that window and hands them one at a time to a
//! `DepositSink`. Blocks older than the lookback window are never scanned.

pub mod source_client;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use qbridge_store::RelayStore;
use qbridge_types::{BridgeError, ChainDescriptor, PollCursor, RawDepositEvent, Result, DEFAULT_RPC_TIMEOUT_MS};

pub use source_client::EvmSourceClient;

/// Maximum number of blocks scanned behind the head in one poll.
pub const DEFAULT_LOOKBACK_BLOCKS: u64 = 100;

/// Blocks scanned behind the head the first time a chain is polled.
pub const INITIAL_BACKFILL_BLOCKS: u64 = 10;

/// Poller configuration.
#[derive(Debug, Clone)]
pub struct PollConfig {
    pub lookback_blocks: u64,
    pub initial_backfill_blocks: u64,
    pub request_timeout_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            lookback_blocks: DEFAULT_LOOKBACK_BLOCKS,
            initial_backfill_blocks: INITIAL_BACKFILL_BLOCKS,
            request_timeout_ms: DEFAULT_RPC_TIMEOUT_MS,
        }
    }
}

/// Inclusive block window scanned by one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRange {
    pub from_block: u64,
    pub to_block: u64,
}

/// Read-only view of a source chain's bridge contract.
#[async_trait]
pub trait SourceClient: Send + Sync {
    async fn block_number(&self) -> Result<u64>;
    /// Decoded `Deposit` logs in `range`, in log order.
    async fn deposit_events(&self, range: BlockRange) -> Result<Vec<RawDepositEvent>>;
}

/// Consumer of discovered deposits.
///
/// `handle_deposit` returns once the deposit has been settled, skipped or
/// has failed; an `Err` is a per-event failure and never stops the cycle.
#[async_trait]
pub trait DepositSink: Send + Sync {
    async fn handle_deposit(&self, chain: &ChainDescriptor, event: RawDepositEvent) -> Result<()>;
}

/// Events found by one poll, before any of them is handled.
#[derive(Debug, Clone)]
pub struct PollBatch {
    pub range: BlockRange,
    pub events: Vec<RawDepositEvent>,
}

/// Summary of one completed poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// `None` when the head had not advanced past the cursor.
    pub range: Option<BlockRange>,
    pub handled: usize,
    pub failed: usize,
}

/// Compute the scan window for a chain.
///
/// `from = max(last_checked + 1, head - lookback)`; `None` when `from > head`.
/// Without a cursor, `last_checked` is taken as `head - initial_backfill`.
pub fn compute_range(
    last_checked: Option<u64>,
    current_block: u64,
    config: &PollConfig,
) -> Option<BlockRange> {
    let last_checked = last_checked
        .unwrap_or_else(|| current_block.saturating_sub(config.initial_backfill_blocks));
    let from_block = last_checked
        .saturating_add(1)
        .max(current_block.saturating_sub(config.lookback_blocks));

    if from_block > current_block {
        return None;
    }
    Some(BlockRange { from_block, to_block: current_block })
}

/// Polls a single source chain.
pub struct DepositPoller {
    chain: ChainDescriptor,
    client: Arc<dyn SourceClient>,
    store: Arc<dyn RelayStore>,
    config: PollConfig,
}

impl DepositPoller {
    pub fn new(
        chain: ChainDescriptor,
        client: Arc<dyn SourceClient>,
        store: Arc<dyn RelayStore>,
        config: PollConfig,
    ) -> Self {
        Self { chain, client, store, config }
    }

    pub fn chain(&self) -> &ChainDescriptor {
        &self.chain
    }

    async fn with_timeout<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        let limit = Duration::from_millis(self.config.request_timeout_ms);
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(BridgeError::rpc(
                &self.chain.name,
                format!("request timed out after {}ms", self.config.request_timeout_ms),
            )),
        }
    }

    /// Read the head and fetch the deposits in the next scan window.
    ///
    /// Does not touch the cursor.
    pub async fn poll(&self) -> Result<Option<PollBatch>> {
        let cursor = self.store.get_poll_cursor(self.chain.chain_id).await?;
        let current_block = self.with_timeout(self.client.block_number()).await?;

        let Some(range) = compute_range(
            cursor.map(|c| c.last_checked_block),
            current_block,
            &self.config,
        ) else {
            return Ok(None);
        };

        let events = self.with_timeout(self.client.deposit_events(range)).await?;
        Ok(Some(PollBatch { range, events }))
    }

    /// Poll once, hand every event to `sink` in order, then advance the cursor.
    ///
    /// A poll-level error leaves the cursor unchanged. Per-event failures are
    /// logged and the cursor still advances past them.
    pub async fn run_cycle(&self, sink: &dyn DepositSink) -> Result<CycleReport> {
        let Some(batch) = self.poll().await? else {
            return Ok(CycleReport::default());
        };

        debug!(
            chain = %self.chain.name,
            from_block = batch.range.from_block,
            to_block = batch.range.to_block,
            events = batch.events.len(),
            "scanned deposit logs"
        );

        let mut report = CycleReport { range: Some(batch.range), ..Default::default() };
        for event in batch.events {
            let tx_hash = event.transaction_hash;
            match sink.handle_deposit(&self.chain, event).await {
                Ok(()) => report.handled += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(chain = %self.chain.name, tx_hash = %tx_hash, error = %e, "deposit handling failed");
                }
            }
        }

        self.store
            .set_poll_cursor(&PollCursor {
                chain_id: self.chain.chain_id,
                last_checked_block: batch.range.to_block,
            })
            .await?;

        Ok(report)
    }
}
