//! In-memory relay store. All state is lost when the process exits.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::*;
use qbridge_types::{unix_now, BridgeError, Result, SettlementState};

/// In-memory relay store (process-lifetime cursors and settlement records).
pub struct MemoryStore {
    cursors: Mutex<HashMap<u64, PollCursor>>,
    settlements: Mutex<HashMap<DepositId, SettlementRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            cursors: Mutex::new(HashMap::new()),
            settlements: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| BridgeError::Other("memory store lock poisoned".into()))
}

#[async_trait]
impl RelayStore for MemoryStore {
    async fn get_poll_cursor(&self, chain_id: u64) -> Result<Option<PollCursor>> {
        let cursors = lock(&self.cursors)?;
        Ok(cursors.get(&chain_id).copied())
    }

    async fn set_poll_cursor(&self, cursor: &PollCursor) -> Result<()> {
        let mut cursors = lock(&self.cursors)?;
        let entry = cursors.entry(cursor.chain_id).or_insert(*cursor);
        if cursor.last_checked_block > entry.last_checked_block {
            entry.last_checked_block = cursor.last_checked_block;
        }
        Ok(())
    }

    async fn admit(&self, deposit_id: DepositId) -> Result<Admission> {
        let mut settlements = lock(&self.settlements)?;
        match settlements.get_mut(&deposit_id) {
            Some(record) => match record.state {
                SettlementState::Completed => Ok(Admission::AlreadyCompleted),
                SettlementState::Processing => Ok(Admission::AlreadyInFlight),
                SettlementState::Unseen => {
                    record.state = SettlementState::Processing;
                    Ok(Admission::Admitted)
                }
            },
            None => {
                settlements.insert(
                    deposit_id,
                    SettlementRecord {
                        deposit_id,
                        state: SettlementState::Processing,
                        created_at: unix_now(),
                    },
                );
                Ok(Admission::Admitted)
            }
        }
    }

    async fn mark_completed(&self, deposit_id: DepositId) -> Result<()> {
        let mut settlements = lock(&self.settlements)?;
        settlements
            .entry(deposit_id)
            .or_insert_with(|| SettlementRecord {
                deposit_id,
                state: SettlementState::Unseen,
                created_at: unix_now(),
            })
            .state = SettlementState::Completed;
        Ok(())
    }

    async fn release(&self, deposit_id: DepositId) -> Result<()> {
        let mut settlements = lock(&self.settlements)?;
        if let Some(record) = settlements.get_mut(&deposit_id) {
            if record.state == SettlementState::Processing {
                record.state = SettlementState::Unseen;
            }
        }
        Ok(())
    }

    async fn get_settlement(&self, deposit_id: DepositId) -> Result<Option<SettlementRecord>> {
        let settlements = lock(&self.settlements)?;
        Ok(settlements.get(&deposit_id).cloned())
    }
}
