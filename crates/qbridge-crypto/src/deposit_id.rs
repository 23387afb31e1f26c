//! Keccak-256 deposit identifier.
//!
//! depositId = keccak256(abi.encode(uint256 sourceChainId, address sender, uint256 amount, bytes32 txHash))
//!
//! The token address and destination chain id are not part of the preimage,
//! so the destination bridge contract sees the same id the deployed relayer
//! has always produced.

use alloy::primitives::{Address, B256, U256};
use qbridge_types::{DepositId, RawDepositEvent};
use sha3::{Digest, Keccak256};

/// Length of the ABI head encoding of the four static preimage words.
const PREIMAGE_LEN: usize = 4 * 32;

/// ABI-encode the identifier preimage as four 32-byte words.
fn encode_preimage(
    source_chain_id: u64,
    sender: Address,
    amount: U256,
    transaction_hash: B256,
) -> [u8; PREIMAGE_LEN] {
    let mut out = [0u8; PREIMAGE_LEN];
    out[0..32].copy_from_slice(&U256::from(source_chain_id).to_be_bytes::<32>());
    // address is left-padded to a full word
    out[44..64].copy_from_slice(sender.as_slice());
    out[64..96].copy_from_slice(&amount.to_be_bytes::<32>());
    out[96..128].copy_from_slice(transaction_hash.as_slice());
    out
}

/// Compute the deposit identifier from its preimage fields.
pub fn deposit_id(
    source_chain_id: u64,
    sender: Address,
    amount: U256,
    transaction_hash: B256,
) -> DepositId {
    let preimage = encode_preimage(source_chain_id, sender, amount, transaction_hash);
    let digest: [u8; 32] = Keccak256::digest(preimage).into();
    DepositId(B256::from(digest))
}

/// Compute the deposit identifier of a decoded deposit event.
pub fn deposit_id_for_event(event: &RawDepositEvent) -> DepositId {
    deposit_id(
        event.source_chain_id,
        event.sender,
        event.amount,
        event.transaction_hash,
    )
}
