//! Process driver: wires clients, runs the startup pass and the timers.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use qbridge_oracle::{load_deployments, resolve_mappings, EvmOracleReader, OracleReader, PriceReconciler};
use qbridge_store::{MemoryStore, RelayStore};
use qbridge_sync::{DepositPoller, EvmSourceClient};
use qbridge_tx::{EvmDestinationClient, SettlementService};
use qbridge_types::{BridgeError, Result};

use crate::chains::price_feeds;
use crate::config::RelayerConfig;
use crate::pipeline::{settlement_pipeline, PipelineHandle, SettlementWorker, DEFAULT_QUEUE_CAPACITY};

/// Block-range errors some public endpoints return transiently; the next tick retries.
fn is_transient_range_error(err: &BridgeError) -> bool {
    matches!(err, BridgeError::Rpc { message, .. } if message.contains("could not coalesce"))
}

fn log_poll_failure(poller: &DepositPoller, err: &BridgeError) {
    if is_transient_range_error(err) {
        debug!(chain = %poller.chain().name, error = %err, "poll failed");
    } else {
        warn!(chain = %poller.chain().name, error = %err, "poll failed");
    }
}

/// One sequential poll of every chain, establishing the cursors.
async fn initial_pass(pollers: &[Arc<DepositPoller>], sink: &PipelineHandle) {
    for poller in pollers {
        if let Err(e) = poller.run_cycle(sink).await {
            log_poll_failure(poller, &e);
        }
    }
}

/// Fully wired relayer, ready to run.
pub struct Relayer {
    pollers: Vec<Arc<DepositPoller>>,
    pipeline: PipelineHandle,
    worker: SettlementWorker,
    reconciler: Option<Arc<PriceReconciler>>,
    poll_interval: Duration,
    price_interval: Duration,
}

impl Relayer {
    pub fn new(
        pollers: Vec<DepositPoller>,
        service: SettlementService,
        reconciler: Option<PriceReconciler>,
        poll_interval: Duration,
        price_interval: Duration,
    ) -> Self {
        let (pipeline, worker) = settlement_pipeline(service, DEFAULT_QUEUE_CAPACITY);
        Self {
            pollers: pollers.into_iter().map(Arc::new).collect(),
            pipeline,
            worker,
            reconciler: reconciler
                .filter(|r| !r.mappings().is_empty())
                .map(Arc::new),
            poll_interval,
            price_interval,
        }
    }

    /// Build the JSON-RPC clients and the in-memory store from configuration.
    pub fn from_config(config: RelayerConfig) -> Result<Self> {
        let store: Arc<dyn RelayStore> = Arc::new(MemoryStore::new());
        let rpc_timeout = Duration::from_millis(config.poll.request_timeout_ms);

        let destination = Arc::new(
            EvmDestinationClient::new(
                &config.destination.chain.rpc_url,
                config.destination.chain.bridge_address,
                config.destination.target_token,
                config.signer,
                Some(config.confirmation_timeout),
            )?
            .with_request_timeout(rpc_timeout),
        );
        info!(
            chain = %config.destination.chain.name,
            relayer = %destination.signer_address(),
            "destination configured"
        );

        let mut pollers = Vec::with_capacity(config.sources.len());
        for chain in &config.sources {
            let client = Arc::new(EvmSourceClient::new(chain)?);
            pollers.push(DepositPoller::new(chain.clone(), client, store.clone(), config.poll.clone()));
        }

        let reconciler = match load_deployments(&config.oracle_deployments)? {
            None => {
                info!(path = %config.oracle_deployments.display(), "no oracle deployment file; price sync disabled");
                None
            }
            Some(deployed) => {
                let mappings = resolve_mappings(&price_feeds(), &deployed);
                let mut sources: HashMap<u64, Arc<dyn OracleReader>> = HashMap::new();
                for chain in &config.sources {
                    let reader = EvmOracleReader::new(&chain.name, &chain.rpc_url)?.with_timeout(rpc_timeout);
                    sources.insert(chain.chain_id, Arc::new(reader));
                }
                let target = Arc::new(
                    EvmOracleReader::new(&config.destination.chain.name, &config.destination.chain.rpc_url)?
                        .with_timeout(rpc_timeout),
                );
                info!(assets = mappings.len(), "price sync configured");
                Some(PriceReconciler::new(mappings, sources, target, destination.clone()))
            }
        };

        let service = SettlementService::new(store, destination);
        Ok(Self::new(pollers, service, reconciler, config.poll_interval, config.price_interval))
    }

    /// Run until ctrl-c.
    pub async fn run(self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
        })
        .await
    }

    /// Run until `shutdown` resolves, then abort every task.
    ///
    /// In-flight submissions are abandoned; the destination chain stays authoritative.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let Relayer { pollers, pipeline, worker, reconciler, poll_interval, price_interval } = self;

        info!(chains = pollers.len(), "monitoring source chains");
        for poller in &pollers {
            info!(chain = %poller.chain().name, chain_id = poller.chain().chain_id, "source chain");
        }

        let mut tasks = JoinSet::new();
        tasks.spawn(worker.run());

        initial_pass(&pollers, &pipeline).await;

        for poller in pollers {
            let sink = pipeline.clone();
            tasks.spawn(async move {
                let mut ticker = tokio::time::interval(poll_interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                // the startup pass stands in for the first tick
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    if let Err(e) = poller.run_cycle(&sink).await {
                        log_poll_failure(&poller, &e);
                    }
                }
            });
        }
        drop(pipeline);

        if let Some(reconciler) = reconciler {
            tasks.spawn(async move {
                let mut ticker = tokio::time::interval(price_interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    let report = reconciler.reconcile().await;
                    info!(
                        assets = report.assets.len(),
                        updated = report.updated(),
                        failed = report.failed(),
                        "price sync pass complete"
                    );
                }
            });
        }

        info!("relayer running; press ctrl-c to stop");
        tokio::select! {
            _ = shutdown => {}
            Some(joined) = tasks.join_next() => {
                tasks.shutdown().await;
                return Err(match joined {
                    Err(e) => BridgeError::Other(format!("relayer task failed: {e}")),
                    Ok(()) => BridgeError::Other("relayer task exited".into()),
                });
            }
        }

        tasks.shutdown().await;
        info!("relayer stopped");
        Ok(())
    }
}
