//! JSON-RPC client for a source chain's bridge contract.
//!
//! Reads:
//! - `eth_blockNumber`
//! - `eth_getLogs` filtered on `Deposit(address,address,uint256,uint256)`

use alloy::primitives::Address;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::Log;
use alloy::sol;
use async_trait::async_trait;
use url::Url;

use qbridge_types::{BridgeError, ChainDescriptor, RawDepositEvent, Result};

use crate::{BlockRange, SourceClient};

sol! {
    #[sol(rpc)]
    interface ISourceBridge {
        event Deposit(
            address indexed sender,
            address indexed token,
            uint256 amount,
            uint256 destinationChainId
        );
    }
}

/// alloy-backed source chain client.
pub struct EvmSourceClient {
    chain_name: String,
    chain_id: u64,
    bridge_address: Address,
    provider: DynProvider,
}

impl EvmSourceClient {
    pub fn new(chain: &ChainDescriptor) -> Result<Self> {
        let url: Url = chain
            .rpc_url
            .parse()
            .map_err(|e| BridgeError::Config(format!("{} rpc url: {e}", chain.name)))?;
        let provider = ProviderBuilder::new().connect_http(url).erased();

        Ok(Self {
            chain_name: chain.name.clone(),
            chain_id: chain.chain_id,
            bridge_address: chain.bridge_address,
            provider,
        })
    }
}

#[async_trait]
impl SourceClient for EvmSourceClient {
    async fn block_number(&self) -> Result<u64> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| BridgeError::rpc(&self.chain_name, e))
    }

    async fn deposit_events(&self, range: BlockRange) -> Result<Vec<RawDepositEvent>> {
        let bridge = ISourceBridge::new(self.bridge_address, &self.provider);
        let logs = bridge
            .Deposit_filter()
            .from_block(range.from_block)
            .to_block(range.to_block)
            .query()
            .await
            .map_err(|e| BridgeError::rpc(&self.chain_name, e))?;

        logs.into_iter()
            .map(|(event, log)| self.decode_deposit(event, &log))
            .collect()
    }
}

impl EvmSourceClient {
    /// Pending logs carry neither a tx hash nor a block number and cannot be identified.
    fn decode_deposit(&self, event: ISourceBridge::Deposit, log: &Log) -> Result<RawDepositEvent> {
        let transaction_hash = log.transaction_hash.ok_or_else(|| {
            BridgeError::MalformedLog(format!("{}: deposit log without tx hash", self.chain_name))
        })?;
        let block_number = log.block_number.ok_or_else(|| {
            BridgeError::MalformedLog(format!("{}: deposit log without block number", self.chain_name))
        })?;

        Ok(RawDepositEvent {
            source_chain_id: self.chain_id,
            sender: event.sender,
            token: event.token,
            amount: event.amount,
            destination_chain_id: event.destinationChainId,
            transaction_hash,
            block_number,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{B256, U256};
    use alloy::sol_types::SolEvent;

    fn client() -> EvmSourceClient {
        EvmSourceClient::new(&ChainDescriptor {
            name: "Ethereum Sepolia".into(),
            rpc_url: "http://localhost:8545".into(),
            chain_id: 11155111,
            bridge_address: Address::repeat_byte(0xbb),
        })
        .unwrap()
    }

    fn deposit() -> ISourceBridge::Deposit {
        ISourceBridge::Deposit {
            sender: Address::repeat_byte(0xaa),
            token: Address::repeat_byte(0xcc),
            amount: U256::from(1_000_000u64),
            destinationChainId: U256::from(1983u64),
        }
    }

    #[test]
    fn test_deposit_event_signature() {
        assert_eq!(
            ISourceBridge::Deposit::SIGNATURE,
            "Deposit(address,address,uint256,uint256)"
        );
        assert_eq!(
            ISourceBridge::Deposit::SIGNATURE_HASH.to_string(),
            "0xdcbc1c05240f31ff3ad067ef1ee35ce4997762752e3a095284754544f4c709d7"
        );
    }

    #[test]
    fn test_new_rejects_bad_rpc_url() {
        let chain = ChainDescriptor {
            name: "Sepolia".into(),
            rpc_url: "not a url".into(),
            chain_id: 11155111,
            bridge_address: Address::ZERO,
        };
        assert!(matches!(EvmSourceClient::new(&chain), Err(BridgeError::Config(_))));
    }

    #[test]
    fn test_decode_mined_deposit_log() {
        let log = Log {
            transaction_hash: Some(B256::repeat_byte(0x71)),
            block_number: Some(100),
            ..Default::default()
        };
        let event = client().decode_deposit(deposit(), &log).unwrap();

        assert_eq!(event.source_chain_id, 11155111);
        assert_eq!(event.sender, Address::repeat_byte(0xaa));
        assert_eq!(event.token, Address::repeat_byte(0xcc));
        assert_eq!(event.amount, U256::from(1_000_000u64));
        assert_eq!(event.destination_chain_id, U256::from(1983u64));
        assert_eq!(event.transaction_hash, B256::repeat_byte(0x71));
        assert_eq!(event.block_number, 100);
    }

    #[test]
    fn test_pending_log_is_malformed() {
        let client = client();
        assert!(matches!(
            client.decode_deposit(deposit(), &Log::default()),
            Err(BridgeError::MalformedLog(_))
        ));

        let without_block = Log { transaction_hash: Some(B256::repeat_byte(0x71)), ..Default::default() };
        assert!(matches!(
            client.decode_deposit(deposit(), &without_block),
            Err(BridgeError::MalformedLog(_))
        ));
    }
}
