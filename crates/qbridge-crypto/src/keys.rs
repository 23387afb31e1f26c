//! Relayer signing identity.
//!
//! Flow: hex private key → 32-byte secp256k1 scalar → local signer

use alloy::signers::local::PrivateKeySigner;
use qbridge_types::{hex_to_bytes, BridgeError, Result};

/// Parse the relayer private key (0x prefix optional, surrounding whitespace ignored).
///
/// The key material is never included in the returned error.
pub fn load_signer(private_key: &str) -> Result<PrivateKeySigner> {
    let trimmed = private_key.trim();
    if trimmed.is_empty() {
        return Err(BridgeError::MissingSigningKey);
    }

    let bytes = hex_to_bytes(trimmed)
        .map_err(|_| BridgeError::InvalidSigningKey("key is not valid hex".into()))?;
    if bytes.len() != 32 {
        return Err(BridgeError::InvalidSigningKey(format!(
            "expected 32 bytes, got {}",
            bytes.len()
        )));
    }

    PrivateKeySigner::from_slice(&bytes)
        .map_err(|_| BridgeError::InvalidSigningKey("scalar out of range".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use qbridge_types::parse_address;

    // First default anvil/hardhat development account.
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_load_signer_derives_address() {
        let signer = load_signer(DEV_KEY).unwrap();
        assert_eq!(
            signer.address(),
            parse_address("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266").unwrap()
        );

        let unprefixed = load_signer(&format!("  {}\n", &DEV_KEY[2..])).unwrap();
        assert_eq!(unprefixed.address(), signer.address());
    }

    #[test]
    fn test_load_signer_rejects_bad_keys() {
        assert!(matches!(load_signer(""), Err(BridgeError::MissingSigningKey)));
        assert!(matches!(load_signer("0x1234"), Err(BridgeError::InvalidSigningKey(_))));
        assert!(matches!(load_signer("not-hex"), Err(BridgeError::InvalidSigningKey(_))));
        let zero = format!("0x{}", "00".repeat(32));
        assert!(matches!(load_signer(&zero), Err(BridgeError::InvalidSigningKey(_))));
    }
}
