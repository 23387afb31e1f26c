//! Shared data model for the QIE bridge relayer.
//!
//! - Chain descriptors for the source chains and the destination chain
//! - Decoded deposit events and their content-addressed identifiers
//! - Settlement lifecycle records and per-chain poll cursors
//! - Price feed mappings used by the oracle reconciler

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use alloy::primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 0x-prefixed hex string (e.g. "0x1234...").
pub type Hex = String;

/// Decimals of the bridged stablecoin on every supported chain.
pub const BRIDGED_TOKEN_DECIMALS: u8 = 6;

/// Upper bound on a single JSON-RPC request, in milliseconds.
pub const DEFAULT_RPC_TIMEOUT_MS: u64 = 20_000;

/// Bridge relayer error types.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("rpc error on {chain}: {message}")]
    Rpc { chain: String, message: String },

    #[error("malformed log: {0}")]
    MalformedLog(String),

    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("signing key not configured: set RELAYER_PRIVATE_KEY")]
    MissingSigningKey,

    #[error("invalid signing key: {0}")]
    InvalidSigningKey(String),

    #[error("settlement failed: {0}")]
    Settlement(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl BridgeError {
    /// Wrap a transport-level failure for the named chain.
    pub fn rpc(chain: &str, err: impl fmt::Display) -> Self {
        Self::Rpc {
            chain: chain.to_string(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Static description of one chain the relayer talks to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainDescriptor {
    pub name: String,
    pub rpc_url: String,
    pub chain_id: u64,
    pub bridge_address: Address,
}

/// A `Deposit` log decoded from a source-chain bridge contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDepositEvent {
    pub source_chain_id: u64,
    pub sender: Address,
    pub token: Address,
    pub amount: U256,
    pub destination_chain_id: U256,
    pub transaction_hash: B256,
    pub block_number: u64,
}

/// Content-addressed identifier of a deposit; the settlement idempotency key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DepositId(pub B256);

impl DepositId {
    pub fn as_b256(&self) -> B256 {
        self.0
    }
}

impl From<B256> for DepositId {
    fn from(value: B256) -> Self {
        Self(value)
    }
}

impl fmt::Display for DepositId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bytes_to_hex(self.0.as_slice()))
    }
}

/// Lifecycle state of a deposit inside one relayer process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementState {
    Unseen,
    Processing,
    Completed,
}

/// Volatile settlement record owned by the settlement tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRecord {
    pub deposit_id: DepositId,
    pub state: SettlementState,
    pub created_at: u64,
}

/// Last fully scanned block of one source chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollCursor {
    pub chain_id: u64,
    pub last_checked_block: u64,
}

/// Static price feed entry: where to read the reference price for a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceFeed {
    pub symbol: String,
    pub source_chain_id: u64,
    pub source_oracle: Address,
}

/// A price feed joined with the deployed destination oracle for its symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetPriceMapping {
    pub symbol: String,
    pub source_chain_id: u64,
    pub source_oracle: Address,
    pub target_oracle: Address,
}

/// Seconds since the unix epoch.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Parse a hex string to a byte vector; the 0x prefix is optional.
pub fn hex_to_bytes(hex_str: &str) -> Result<Vec<u8>> {
    let hex_str = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    hex::decode(hex_str).map_err(|e| BridgeError::InvalidHex(e.to_string()))
}

/// Convert bytes to a 0x-prefixed hex string.
pub fn bytes_to_hex(bytes: &[u8]) -> Hex {
    format!("0x{}", hex::encode(bytes))
}

/// Parse a checksummed or lowercase 0x address.
pub fn parse_address(s: &str) -> Result<Address> {
    s.trim()
        .parse::<Address>()
        .map_err(|e| BridgeError::InvalidAddress(format!("{s}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_roundtrip_accepts_missing_prefix() {
        assert_eq!(hex_to_bytes("0x0a0b").unwrap(), vec![0x0a, 0x0b]);
        assert_eq!(hex_to_bytes("0a0b").unwrap(), vec![0x0a, 0x0b]);
        assert_eq!(bytes_to_hex(&[0xde, 0xad]), "0xdead");
        assert!(matches!(hex_to_bytes("0xzz"), Err(BridgeError::InvalidHex(_))));
    }

    #[test]
    fn test_deposit_id_displays_as_prefixed_hex() {
        let id = DepositId(B256::repeat_byte(0xab));
        let shown = id.to_string();
        assert!(shown.starts_with("0xabab"));
        assert_eq!(shown.len(), 66);
    }

    #[test]
    fn test_parse_address() {
        let addr = parse_address("0x575E9bA2012eA2f3fcA384ADAd69677946568e25").unwrap();
        assert_eq!(
            addr,
            parse_address("0x575e9ba2012ea2f3fca384adad69677946568e25").unwrap()
        );
        assert!(matches!(parse_address("0x1234"), Err(BridgeError::InvalidAddress(_))));
    }
}
