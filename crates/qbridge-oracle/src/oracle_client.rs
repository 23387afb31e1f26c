//! Read-only client for Chainlink-style price aggregators.

use std::time::Duration;

use alloy::primitives::Address;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::sol;
use async_trait::async_trait;
use url::Url;

use qbridge_types::{BridgeError, Result, DEFAULT_RPC_TIMEOUT_MS};

use crate::{OracleReader, PriceRound};

sol! {
    #[sol(rpc)]
    interface IAggregatorV3 {
        function latestRoundData()
            external
            view
            returns (
                uint80 roundId,
                int256 answer,
                uint256 startedAt,
                uint256 updatedAt,
                uint80 answeredInRound
            );
    }
}

/// alloy-backed aggregator reader for one chain.
pub struct EvmOracleReader {
    chain_name: String,
    provider: DynProvider,
    request_timeout: Duration,
}

impl EvmOracleReader {
    pub fn new(chain_name: &str, rpc_url: &str) -> Result<Self> {
        let url: Url = rpc_url
            .parse()
            .map_err(|e| BridgeError::Config(format!("{chain_name} rpc url: {e}")))?;

        Ok(Self {
            chain_name: chain_name.to_string(),
            provider: ProviderBuilder::new().connect_http(url).erased(),
            request_timeout: Duration::from_millis(DEFAULT_RPC_TIMEOUT_MS),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[async_trait]
impl OracleReader for EvmOracleReader {
    async fn latest_round(&self, oracle: Address) -> Result<PriceRound> {
        let aggregator = IAggregatorV3::new(oracle, &self.provider);
        let call = aggregator.latestRoundData();
        let round = tokio::time::timeout(self.request_timeout, call.call())
            .await
            .map_err(|_| {
                BridgeError::rpc(
                    &self.chain_name,
                    format!("latestRoundData timed out after {}ms", self.request_timeout.as_millis()),
                )
            })?
            .map_err(|e| BridgeError::rpc(&self.chain_name, e))?;

        Ok(PriceRound {
            round_id: round.roundId.saturating_to(),
            answer: round.answer,
            updated_at: round.updatedAt.saturating_to(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::sol_types::SolCall;

    #[tokio::test]
    async fn test_stalled_node_read_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let reader = EvmOracleReader::new("QIE Testnet", &url)
            .unwrap()
            .with_timeout(Duration::from_millis(200));
        let err = tokio::time::timeout(Duration::from_secs(10), reader.latest_round(Address::repeat_byte(0x11)))
            .await
            .expect("oracle read was not bounded")
            .unwrap_err();

        match err {
            BridgeError::Rpc { chain, message } => {
                assert_eq!(chain, "QIE Testnet");
                assert!(message.contains("timed out"), "{message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_latest_round_data_selector() {
        assert_eq!(IAggregatorV3::latestRoundDataCall::SIGNATURE, "latestRoundData()");
        assert_eq!(IAggregatorV3::latestRoundDataCall::SELECTOR, [0xfe, 0xaf, 0x96, 0x8c]);
    }
}
