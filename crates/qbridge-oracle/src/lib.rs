//! Price reconciliation between source-chain aggregators and the mock
//! aggregators deployed on the destination chain.
//!
//! A target oracle is written only when its recorded answer differs from
//! the source answer. Each asset is reconciled independently; a failure on
//! one never stops the others.

pub mod oracle_client;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use alloy::primitives::{Address, I256, B256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use qbridge_tx::DestinationClient;
use qbridge_types::{parse_address, AssetPriceMapping, BridgeError, PriceFeed, Result};

pub use oracle_client::EvmOracleReader;

/// Latest round reported by an aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRound {
    pub round_id: u128,
    pub answer: I256,
    pub updated_at: u64,
}

/// Read access to an aggregator on one chain.
#[async_trait]
pub trait OracleReader: Send + Sync {
    async fn latest_round(&self, oracle: Address) -> Result<PriceRound>;
}

/// Result of reconciling one asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetOutcome {
    Updated { tx_hash: B256, previous: I256, current: I256 },
    Unchanged,
    Skipped(String),
    Failed(String),
}

/// Per-asset entry of a reconcile report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetReport {
    pub symbol: String,
    pub outcome: AssetOutcome,
}

/// Result of one reconciliation pass, one entry per mapping in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub assets: Vec<AssetReport>,
}

impl ReconcileReport {
    /// Number of update transactions confirmed in this pass.
    pub fn updated(&self) -> usize {
        self.assets
            .iter()
            .filter(|a| matches!(a.outcome, AssetOutcome::Updated { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.assets
            .iter()
            .filter(|a| matches!(a.outcome, AssetOutcome::Failed(_)))
            .count()
    }
}

/// Whether the target oracle must be written. Exact comparison.
pub fn needs_update(source: I256, target: I256) -> bool {
    source != target
}

/// Parse a deployment file: a JSON object of `symbol → target oracle address`.
pub fn parse_deployments(json: &str) -> Result<HashMap<String, Address>> {
    let raw: HashMap<String, String> = serde_json::from_str(json)?;
    raw.into_iter()
        .map(|(symbol, address)| Ok((symbol, parse_address(&address)?)))
        .collect()
}

/// Load the deployment file. A missing file yields `Ok(None)`.
pub fn load_deployments(path: &Path) -> Result<Option<HashMap<String, Address>>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => parse_deployments(&contents).map(Some),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(BridgeError::Io(e)),
    }
}

/// Join the static feed table with the deployed target oracles.
///
/// Feeds without a deployed target are dropped. Feed order is kept.
pub fn resolve_mappings(
    feeds: &[PriceFeed],
    deployed: &HashMap<String, Address>,
) -> Vec<AssetPriceMapping> {
    feeds
        .iter()
        .filter_map(|feed| {
            let Some(target_oracle) = deployed.get(&feed.symbol) else {
                debug!(symbol = %feed.symbol, "no deployed target oracle; feed ignored");
                return None;
            };
            Some(AssetPriceMapping {
                symbol: feed.symbol.clone(),
                source_chain_id: feed.source_chain_id,
                source_oracle: feed.source_oracle,
                target_oracle: *target_oracle,
            })
        })
        .collect()
}

/// Pushes source prices to destination mock oracles.
pub struct PriceReconciler {
    mappings: Vec<AssetPriceMapping>,
    sources: HashMap<u64, Arc<dyn OracleReader>>,
    target: Arc<dyn OracleReader>,
    writer: Arc<dyn DestinationClient>,
}

impl PriceReconciler {
    /// `sources` holds one reader per source chain id.
    pub fn new(
        mappings: Vec<AssetPriceMapping>,
        sources: HashMap<u64, Arc<dyn OracleReader>>,
        target: Arc<dyn OracleReader>,
        writer: Arc<dyn DestinationClient>,
    ) -> Self {
        Self { mappings, sources, target, writer }
    }

    pub fn mappings(&self) -> &[AssetPriceMapping] {
        &self.mappings
    }

    /// Reconcile every mapping, one asset at a time.
    pub async fn reconcile(&self) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        for mapping in &self.mappings {
            let outcome = self.reconcile_asset(mapping).await;
            match &outcome {
                AssetOutcome::Updated { tx_hash, previous, current } => info!(
                    symbol = %mapping.symbol,
                    previous = %previous,
                    current = %current,
                    tx_hash = %tx_hash,
                    "price updated"
                ),
                AssetOutcome::Unchanged => debug!(symbol = %mapping.symbol, "price unchanged"),
                AssetOutcome::Skipped(reason) => debug!(symbol = %mapping.symbol, reason = %reason, "price skipped"),
                AssetOutcome::Failed(message) => warn!(symbol = %mapping.symbol, error = %message, "price update failed"),
            }
            report.assets.push(AssetReport {
                symbol: mapping.symbol.clone(),
                outcome,
            });
        }
        report
    }

    async fn reconcile_asset(&self, mapping: &AssetPriceMapping) -> AssetOutcome {
        if mapping.source_oracle == Address::ZERO {
            return AssetOutcome::Skipped("placeholder source oracle".into());
        }
        let Some(source) = self.sources.get(&mapping.source_chain_id) else {
            return AssetOutcome::Skipped(format!("unsupported source chain {}", mapping.source_chain_id));
        };

        let source_round = match source.latest_round(mapping.source_oracle).await {
            Ok(round) => round,
            Err(e) => return AssetOutcome::Failed(format!("source read: {e}")),
        };
        let target_round = match self.target.latest_round(mapping.target_oracle).await {
            Ok(round) => round,
            Err(e) => return AssetOutcome::Failed(format!("target read: {e}")),
        };

        if !needs_update(source_round.answer, target_round.answer) {
            return AssetOutcome::Unchanged;
        }

        match self
            .writer
            .update_oracle_answer(mapping.target_oracle, source_round.answer)
            .await
        {
            Ok(tx_hash) => AssetOutcome::Updated {
                tx_hash,
                previous: target_round.answer,
                current: source_round.answer,
            },
            // an identical update already sits in the mempool
            Err(e) if e.is_idempotent_conflict() => AssetOutcome::Skipped(format!("update: {e}")),
            Err(e) => AssetOutcome::Failed(format!("update: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qbridge_tx::{SettlementRequest, SubmitError};
    use std::sync::Mutex;

    /// Aggregators keyed by address; a missing address is a read failure.
    #[derive(Default)]
    struct MockAggregators {
        answers: Mutex<HashMap<Address, I256>>,
    }

    impl MockAggregators {
        fn set(&self, oracle: Address, answer: i64) {
            self.answers.lock().unwrap().insert(oracle, I256::try_from(answer).unwrap());
        }
    }

    #[async_trait]
    impl OracleReader for MockAggregators {
        async fn latest_round(&self, oracle: Address) -> Result<PriceRound> {
            let answer = self
                .answers
                .lock()
                .unwrap()
                .get(&oracle)
                .copied()
                .ok_or_else(|| BridgeError::rpc("mock", "execution reverted"))?;
            Ok(PriceRound { round_id: 1, answer, updated_at: 1_700_000_000 })
        }
    }

    /// Writes land in the shared target aggregator mock.
    struct RecordingWriter {
        target: Arc<MockAggregators>,
        writes: Mutex<Vec<(Address, I256)>>,
        fail_for: Option<(Address, SubmitError)>,
    }

    #[async_trait]
    impl DestinationClient for RecordingWriter {
        async fn process_deposit(&self, _request: &SettlementRequest) -> std::result::Result<B256, SubmitError> {
            unreachable!("reconciler never settles deposits")
        }

        async fn update_oracle_answer(&self, oracle: Address, answer: I256) -> std::result::Result<B256, SubmitError> {
            if let Some((failing, err)) = &self.fail_for {
                if *failing == oracle {
                    return Err(err.clone());
                }
            }
            self.writes.lock().unwrap().push((oracle, answer));
            self.target.answers.lock().unwrap().insert(oracle, answer);
            Ok(B256::repeat_byte(0x77))
        }
    }

    const SEPOLIA: u64 = 11155111;

    fn mapping(symbol: &str, source_byte: u8, target_byte: u8) -> AssetPriceMapping {
        AssetPriceMapping {
            symbol: symbol.into(),
            source_chain_id: SEPOLIA,
            source_oracle: Address::repeat_byte(source_byte),
            target_oracle: Address::repeat_byte(target_byte),
        }
    }

    fn setup(
        mappings: Vec<AssetPriceMapping>,
        fail_for: Option<(Address, SubmitError)>,
    ) -> (PriceReconciler, Arc<MockAggregators>, Arc<MockAggregators>, Arc<RecordingWriter>) {
        let source = Arc::new(MockAggregators::default());
        let target = Arc::new(MockAggregators::default());
        let writer = Arc::new(RecordingWriter {
            target: target.clone(),
            writes: Mutex::new(Vec::new()),
            fail_for,
        });
        let mut sources: HashMap<u64, Arc<dyn OracleReader>> = HashMap::new();
        sources.insert(SEPOLIA, source.clone());
        let reconciler = PriceReconciler::new(mappings, sources, target.clone(), writer.clone());
        (reconciler, source, target, writer)
    }

    #[tokio::test]
    async fn test_equal_price_issues_no_write() {
        let (reconciler, source, target, writer) = setup(vec![mapping("ETH", 0x01, 0x11)], None);
        source.set(Address::repeat_byte(0x01), 250_000_000_000);
        target.set(Address::repeat_byte(0x11), 250_000_000_000);

        let report = reconciler.reconcile().await;

        assert_eq!(report.assets[0].outcome, AssetOutcome::Unchanged);
        assert!(writer.writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_changed_price_updates_once() {
        let (reconciler, source, target, writer) = setup(vec![mapping("ETH", 0x01, 0x11)], None);
        source.set(Address::repeat_byte(0x01), 250_000_000_000);
        target.set(Address::repeat_byte(0x11), 240_000_000_000);

        let first = reconciler.reconcile().await;
        assert_eq!(
            first.assets[0].outcome,
            AssetOutcome::Updated {
                tx_hash: B256::repeat_byte(0x77),
                previous: I256::try_from(240_000_000_000i64).unwrap(),
                current: I256::try_from(250_000_000_000i64).unwrap(),
            }
        );

        // unchanged source price: no further writes
        let second = reconciler.reconcile().await;
        let third = reconciler.reconcile().await;
        assert_eq!(second.updated() + third.updated(), 0);
        assert_eq!(writer.writes.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_one_failing_asset_does_not_block_others() {
        let mappings = vec![
            mapping("BTC", 0x02, 0x12),
            mapping("ETH", 0x01, 0x11),
            mapping("LINK", 0x03, 0x13),
        ];
        let (reconciler, source, target, writer) = setup(
            mappings,
            Some((Address::repeat_byte(0x13), SubmitError::Rejected("insufficient funds".into()))),
        );
        // BTC source read fails: no source answer configured
        source.set(Address::repeat_byte(0x01), 300);
        source.set(Address::repeat_byte(0x03), 15);
        target.set(Address::repeat_byte(0x12), 1);
        target.set(Address::repeat_byte(0x11), 299);
        target.set(Address::repeat_byte(0x13), 14);

        let report = reconciler.reconcile().await;

        let symbols: Vec<&str> = report.assets.iter().map(|a| a.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BTC", "ETH", "LINK"]);
        assert!(matches!(report.assets[0].outcome, AssetOutcome::Failed(_)));
        assert!(matches!(report.assets[1].outcome, AssetOutcome::Updated { .. }));
        assert!(matches!(report.assets[2].outcome, AssetOutcome::Failed(_)));
        assert_eq!(report.updated(), 1);
        assert_eq!(report.failed(), 2);
        assert_eq!(
            *writer.writes.lock().unwrap(),
            vec![(Address::repeat_byte(0x11), I256::try_from(300i64).unwrap())]
        );
    }

    #[tokio::test]
    async fn test_pending_duplicate_update_is_not_a_failure() {
        let (reconciler, source, target, _writer) = setup(
            vec![mapping("ETH", 0x01, 0x11)],
            Some((Address::repeat_byte(0x11), SubmitError::AlreadyPending)),
        );
        source.set(Address::repeat_byte(0x01), 250_000_000_000);
        target.set(Address::repeat_byte(0x11), 240_000_000_000);

        let report = reconciler.reconcile().await;

        assert!(matches!(report.assets[0].outcome, AssetOutcome::Skipped(_)));
        assert_eq!((report.updated(), report.failed()), (0, 0));
    }

    #[tokio::test]
    async fn test_placeholder_and_unknown_chain_are_skipped() {
        let mut unknown = mapping("BNB", 0x04, 0x14);
        unknown.source_chain_id = 97;
        let placeholder = mapping("USDT", 0x00, 0x15);
        let (reconciler, _source, _target, writer) = setup(vec![placeholder, unknown], None);

        let report = reconciler.reconcile().await;

        assert!(report.assets.iter().all(|a| matches!(a.outcome, AssetOutcome::Skipped(_))));
        assert!(writer.writes.lock().unwrap().is_empty());
    }

    #[test]
    fn test_needs_update_is_exact() {
        let a = I256::try_from(100_000_000i64).unwrap();
        assert!(!needs_update(a, a));
        assert!(needs_update(a, a + I256::ONE));
    }

    #[test]
    fn test_parse_deployments_and_resolve() {
        let deployed = parse_deployments(
            r#"{"ETH": "0x1111111111111111111111111111111111111111", "BTC": "0x2222222222222222222222222222222222222222"}"#,
        )
        .unwrap();
        assert_eq!(deployed.len(), 2);

        let feeds = vec![
            PriceFeed { symbol: "BTC".into(), source_chain_id: SEPOLIA, source_oracle: Address::repeat_byte(0x02) },
            PriceFeed { symbol: "LINK".into(), source_chain_id: SEPOLIA, source_oracle: Address::repeat_byte(0x03) },
            PriceFeed { symbol: "ETH".into(), source_chain_id: SEPOLIA, source_oracle: Address::repeat_byte(0x01) },
        ];
        let mappings = resolve_mappings(&feeds, &deployed);

        let symbols: Vec<&str> = mappings.iter().map(|m| m.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BTC", "ETH"]);
        assert_eq!(mappings[1].target_oracle, Address::repeat_byte(0x11));

        assert!(matches!(
            parse_deployments(r#"{"ETH": "0x1234"}"#),
            Err(BridgeError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_missing_deployment_file_disables_prices() {
        let path = std::env::temp_dir().join("qbridge-no-such-deployments.json");
        assert!(load_deployments(&path).unwrap().is_none());
    }
}
