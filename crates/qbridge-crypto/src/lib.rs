//! Hashing and key handling for the bridge relayer.
//!
//! - `deposit_id`: content-addressed deposit identifiers (settlement idempotency keys)
//! - `keys`: loading the relayer signing identity from its private key

pub mod deposit_id;
pub mod keys;

pub use deposit_id::{deposit_id, deposit_id_for_event};
pub use keys::load_signer;
