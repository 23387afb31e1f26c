//! Static chain registry: source chains, the QIE destination and price feeds.

use alloy::primitives::{address, Address};
use qbridge_types::PriceFeed;

/// A source chain and its public fallback RPC endpoint.
#[derive(Debug, Clone, Copy)]
pub struct SourceChainEntry {
    pub name: &'static str,
    pub chain_id: u64,
    pub bridge_address: Address,
    pub default_rpc: &'static str,
}

pub const ETHEREUM_SEPOLIA: SourceChainEntry = SourceChainEntry {
    name: "Ethereum Sepolia",
    chain_id: 11155111,
    bridge_address: address!("0x575E9bA2012eA2f3fcA384ADAd69677946568e25"),
    default_rpc: "https://eth-sepolia.g.alchemy.com/v2/demo",
};

pub const ARBITRUM_SEPOLIA: SourceChainEntry = SourceChainEntry {
    name: "Arbitrum Sepolia",
    chain_id: 421614,
    bridge_address: address!("0xe44BD1DD833C90c4995CBa3AFD7e1957b98804cF"),
    default_rpc: "https://arbitrum-sepolia.blockpi.network/v1/rpc/public",
};

pub const OPTIMISM_SEPOLIA: SourceChainEntry = SourceChainEntry {
    name: "Optimism Sepolia",
    chain_id: 11155420,
    bridge_address: address!("0xe44BD1DD833C90c4995CBa3AFD7e1957b98804cF"),
    default_rpc: "https://sepolia.optimism.io",
};

pub const BASE_SEPOLIA: SourceChainEntry = SourceChainEntry {
    name: "Base Sepolia",
    chain_id: 84532,
    bridge_address: address!("0x6658e6C719678CF555eF04294BF2e2A412A25a93"),
    default_rpc: "https://sepolia.base.org",
};

pub const SOURCE_CHAINS: [SourceChainEntry; 4] =
    [ETHEREUM_SEPOLIA, ARBITRUM_SEPOLIA, OPTIMISM_SEPOLIA, BASE_SEPOLIA];

pub const QIE_TESTNET_NAME: &str = "QIE Testnet";
pub const QIE_TESTNET_CHAIN_ID: u64 = 1983;
pub const QIE_DEFAULT_RPC: &str = "https://testnetqierpc1.digital";
pub const QIE_BRIDGE_ADDRESS: Address = address!("0x72815898398d372589883499E76D185004C8EB95");

/// Token credited on the destination for every deposit.
pub const QIE_MOCK_USDC: Address = address!("0x2d61343F52410F5C10f540A7BfBD29Af6d94e4Be");

/// Reference aggregators (Chainlink on Ethereum Sepolia, 8 decimals).
///
/// A zero source address marks a feed with no reference aggregator yet.
const PRICE_FEED_TABLE: [(&str, u64, Address); 5] = [
    ("ETH", 11155111, address!("0x694AA1769357215DE4FAC081bf1f309aDC325306")),
    ("BTC", 11155111, address!("0x1b44F3514812d835EB1BDB0acB33d3fA3351Ee43")),
    ("USDC", 11155111, address!("0xA2F78ab2355fe2f984D808B5CeE7FD0A93D5270E")),
    ("LINK", 11155111, address!("0xc59E3633BAAC79493d908e63626716e204A45EdF")),
    ("USDT", 11155111, Address::ZERO),
];

pub fn price_feeds() -> Vec<PriceFeed> {
    PRICE_FEED_TABLE
        .iter()
        .map(|&(symbol, source_chain_id, source_oracle)| PriceFeed {
            symbol: symbol.to_string(),
            source_chain_id,
            source_oracle,
        })
        .collect()
}
