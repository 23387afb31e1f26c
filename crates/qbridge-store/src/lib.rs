//! Relay state adapter trait and implementations.
//!
//! Defines the `RelayStore` trait that all state backends must implement:
//! per-chain poll cursors and the settlement admission tracker.
//! Provides a `MemoryStore` scoped to the process lifetime.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use qbridge_types::{DepositId, PollCursor, Result, SettlementRecord};

pub mod memory;

pub use memory::MemoryStore;

/// Result of asking the tracker to admit a deposit for settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Admission {
    /// The caller now owns the single in-flight settlement for this deposit.
    Admitted,
    /// Another submission for this deposit is still in flight.
    AlreadyInFlight,
    /// The deposit has been settled; it is never admitted again.
    AlreadyCompleted,
}

/// The core relay state trait.
///
/// All methods are async so a persistent backend can replace the in-memory one.
#[async_trait]
pub trait RelayStore: Send + Sync {
    // --- Poll Cursors ---
    async fn get_poll_cursor(&self, chain_id: u64) -> Result<Option<PollCursor>>;
    /// Store a cursor. A cursor behind the stored one is ignored.
    async fn set_poll_cursor(&self, cursor: &PollCursor) -> Result<()>;

    // --- Settlement Tracker ---
    /// Admit a deposit: Unseen → Processing. At most one caller wins per id.
    async fn admit(&self, deposit_id: DepositId) -> Result<Admission>;
    /// Processing (or Unseen) → Completed.
    async fn mark_completed(&self, deposit_id: DepositId) -> Result<()>;
    /// Processing → Unseen, so a later poll cycle may retry the deposit.
    async fn release(&self, deposit_id: DepositId) -> Result<()>;

    async fn get_settlement(&self, deposit_id: DepositId) -> Result<Option<SettlementRecord>>;
}
