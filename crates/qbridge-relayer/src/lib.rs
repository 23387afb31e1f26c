//! QIE bridge relayer.
//!
//! - `chains`: static chain registry and price feed table
//! - `config`: command line / environment configuration
//! - `pipeline`: per-chain tasks feeding a single settlement worker
//! - `scheduler`: startup pass, poll and price timers, shutdown

pub mod chains;
pub mod config;
pub mod pipeline;
pub mod scheduler;

pub use config::{Args, RelayerConfig};
pub use scheduler::Relayer;
