//! Command line and environment configuration.

use std::path::PathBuf;
use std::time::Duration;

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use clap::Parser;
use url::Url;

use qbridge_crypto::load_signer;
use qbridge_sync::{PollConfig, DEFAULT_LOOKBACK_BLOCKS, INITIAL_BACKFILL_BLOCKS};
use qbridge_types::{BridgeError, ChainDescriptor, Result, DEFAULT_RPC_TIMEOUT_MS};

use crate::chains::{
    ARBITRUM_SEPOLIA, BASE_SEPOLIA, ETHEREUM_SEPOLIA, OPTIMISM_SEPOLIA, QIE_BRIDGE_ADDRESS,
    QIE_MOCK_USDC, QIE_TESTNET_CHAIN_ID, QIE_TESTNET_NAME,
};

/// Relays Sepolia-family bridge deposits to QIE and keeps QIE price oracles in sync.
#[derive(Parser)]
#[command(name = "qbridge-relayer", version)]
pub struct Args {
    /// Hex private key of the relayer account on QIE.
    #[arg(long, env = "RELAYER_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<String>,

    #[arg(long, env = "SEPOLIA_RPC_URL", default_value = ETHEREUM_SEPOLIA.default_rpc)]
    pub sepolia_rpc_url: String,

    #[arg(long, env = "ARB_SEPOLIA_RPC_URL", default_value = ARBITRUM_SEPOLIA.default_rpc)]
    pub arb_sepolia_rpc_url: String,

    #[arg(long, env = "OP_SEPOLIA_RPC_URL", default_value = OPTIMISM_SEPOLIA.default_rpc)]
    pub op_sepolia_rpc_url: String,

    #[arg(long, env = "BASE_SEPOLIA_RPC_URL", default_value = BASE_SEPOLIA.default_rpc)]
    pub base_sepolia_rpc_url: String,

    #[arg(long, env = "QIE_RPC_URL", default_value = crate::chains::QIE_DEFAULT_RPC)]
    pub qie_rpc_url: String,

    /// JSON file mapping asset symbol to deployed QIE mock oracle.
    ///
    /// When the file does not exist price reconciliation is disabled.
    #[arg(long, env = "ORACLE_DEPLOYMENTS", default_value = "deployed-oracles.json")]
    pub oracle_deployments: PathBuf,

    #[arg(long, env = "POLL_INTERVAL_MS", default_value_t = 1_000)]
    pub poll_interval_ms: u64,

    #[arg(long, env = "PRICE_INTERVAL_SECS", default_value_t = 60)]
    pub price_interval_secs: u64,

    /// Maximum blocks scanned behind the head per poll.
    #[arg(long, env = "LOOKBACK_BLOCKS", default_value_t = DEFAULT_LOOKBACK_BLOCKS)]
    pub lookback_blocks: u64,

    #[arg(long, env = "CONFIRMATION_TIMEOUT_SECS", default_value_t = 120)]
    pub confirmation_timeout_secs: u64,

    #[arg(long, env = "RPC_TIMEOUT_MS", default_value_t = DEFAULT_RPC_TIMEOUT_MS)]
    pub rpc_timeout_ms: u64,

    /// Enable debug logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Destination chain settings.
#[derive(Debug, Clone)]
pub struct DestinationConfig {
    pub chain: ChainDescriptor,
    pub target_token: Address,
}

/// Validated relayer configuration.
pub struct RelayerConfig {
    pub signer: PrivateKeySigner,
    pub sources: Vec<ChainDescriptor>,
    pub destination: DestinationConfig,
    pub oracle_deployments: PathBuf,
    pub poll: PollConfig,
    pub poll_interval: Duration,
    pub price_interval: Duration,
    pub confirmation_timeout: Duration,
}

fn checked_url(name: &str, raw: &str) -> Result<String> {
    Url::parse(raw).map_err(|e| BridgeError::Config(format!("{name} rpc url: {e}")))?;
    Ok(raw.to_string())
}

fn nonzero(name: &str, value: u64) -> Result<u64> {
    if value == 0 {
        return Err(BridgeError::Config(format!("{name} must be greater than zero")));
    }
    Ok(value)
}

impl RelayerConfig {
    /// Validate arguments. A missing or malformed signing key is fatal.
    pub fn from_args(args: Args) -> Result<Self> {
        let signer = load_signer(args.private_key.as_deref().unwrap_or_default())?;

        let source_urls = [
            (ETHEREUM_SEPOLIA, args.sepolia_rpc_url.as_str()),
            (ARBITRUM_SEPOLIA, args.arb_sepolia_rpc_url.as_str()),
            (OPTIMISM_SEPOLIA, args.op_sepolia_rpc_url.as_str()),
            (BASE_SEPOLIA, args.base_sepolia_rpc_url.as_str()),
        ];
        let sources = source_urls
            .into_iter()
            .map(|(entry, url)| {
                Ok(ChainDescriptor {
                    name: entry.name.to_string(),
                    rpc_url: checked_url(entry.name, url)?,
                    chain_id: entry.chain_id,
                    bridge_address: entry.bridge_address,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let destination = DestinationConfig {
            chain: ChainDescriptor {
                name: QIE_TESTNET_NAME.to_string(),
                rpc_url: checked_url(QIE_TESTNET_NAME, &args.qie_rpc_url)?,
                chain_id: QIE_TESTNET_CHAIN_ID,
                bridge_address: QIE_BRIDGE_ADDRESS,
            },
            target_token: QIE_MOCK_USDC,
        };

        Ok(Self {
            signer,
            sources,
            destination,
            oracle_deployments: args.oracle_deployments,
            poll: PollConfig {
                lookback_blocks: args.lookback_blocks,
                initial_backfill_blocks: INITIAL_BACKFILL_BLOCKS,
                request_timeout_ms: nonzero("rpc timeout", args.rpc_timeout_ms)?,
            },
            poll_interval: Duration::from_millis(nonzero("poll interval", args.poll_interval_ms)?),
            price_interval: Duration::from_secs(nonzero("price interval", args.price_interval_secs)?),
            confirmation_timeout: Duration::from_secs(nonzero(
                "confirmation timeout",
                args.confirmation_timeout_secs,
            )?),
        })
    }
}
