//! Settlement pipeline: every chain task feeds one settlement worker.
//!
//! Jobs travel over a bounded channel and carry a reply slot, so a chain task
//! waits for each deposit before handing over the next one while all
//! destination submissions come from a single task.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use qbridge_sync::DepositSink;
use qbridge_tx::{DepositDisposition, SettlementOutcome, SettlementService};
use qbridge_types::{BridgeError, ChainDescriptor, RawDepositEvent, Result};

/// Default number of queued settlement jobs.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

struct SettlementJob {
    chain: ChainDescriptor,
    event: RawDepositEvent,
    reply: oneshot::Sender<Result<DepositDisposition>>,
}

/// Sending side of the pipeline, one clone per chain task.
#[derive(Clone)]
pub struct PipelineHandle {
    jobs: mpsc::Sender<SettlementJob>,
}

/// Receiving side; owns the settlement service.
pub struct SettlementWorker {
    service: SettlementService,
    jobs: mpsc::Receiver<SettlementJob>,
}

/// Create a connected handle and worker.
pub fn settlement_pipeline(service: SettlementService, capacity: usize) -> (PipelineHandle, SettlementWorker) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (PipelineHandle { jobs: tx }, SettlementWorker { service, jobs: rx })
}

impl SettlementWorker {
    /// Settle jobs in arrival order until every handle is dropped.
    pub async fn run(mut self) {
        while let Some(job) = self.jobs.recv().await {
            let result = self.service.handle_deposit(&job.chain, &job.event).await;
            if let Err(e) = &result {
                error!(chain = %job.chain.name, tx_hash = %job.event.transaction_hash, error = %e, "settlement tracker error");
            }
            // the chain task may have been cancelled
            let _ = job.reply.send(result);
        }
        debug!("settlement worker stopped");
    }
}

#[async_trait]
impl DepositSink for PipelineHandle {
    async fn handle_deposit(&self, chain: &ChainDescriptor, event: RawDepositEvent) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.jobs
            .send(SettlementJob { chain: chain.clone(), event, reply })
            .await
            .map_err(|_| BridgeError::Other("settlement worker stopped".into()))?;

        let disposition = response
            .await
            .map_err(|_| BridgeError::Other("settlement worker dropped the job".into()))??;

        match disposition {
            DepositDisposition::Skipped(admission) => {
                debug!(chain = %chain.name, ?admission, "deposit not admitted");
                Ok(())
            }
            DepositDisposition::Attempted(SettlementOutcome::Failed(err)) => {
                Err(BridgeError::Settlement(err.to_string()))
            }
            DepositDisposition::Attempted(_) => Ok(()),
        }
    }
}
