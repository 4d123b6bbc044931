//! Deterministic addresses for member public keys
//!
//! `address = encode(version || pub || checksum)` where the checksum is the
//! first four bytes of `SHA-256(SHA-256(version || pub))`.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Length of the trailing checksum in bytes
pub const CHECKSUM_LEN: usize = 4;

/// Text encoding applied to the address payload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AddressEncoding {
    /// Lowercase hex
    #[default]
    Hex,
    /// Bitcoin-alphabet base58
    Base58,
}

fn checksum(payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    let digest = Sha256::digest(Sha256::digest(payload));
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&digest[..CHECKSUM_LEN]);
    out
}

/// Derive the address of `pub_key` under `version`
pub fn address(pub_key: &[u8], version: u8, encoding: AddressEncoding) -> String {
    let mut payload = Vec::with_capacity(1 + pub_key.len() + CHECKSUM_LEN);
    payload.push(version);
    payload.extend_from_slice(pub_key);
    let sum = checksum(&payload);
    payload.extend_from_slice(&sum);

    match encoding {
        AddressEncoding::Hex => hex::encode(payload),
        AddressEncoding::Base58 => bs58::encode(payload).into_string(),
    }
}

/// Check an address string against its embedded checksum
pub fn is_valid(address: &str, encoding: AddressEncoding) -> bool {
    let decoded = match encoding {
        AddressEncoding::Hex => hex::decode(address).ok(),
        AddressEncoding::Base58 => bs58::decode(address).into_vec().ok(),
    };
    match decoded {
        Some(bytes) if bytes.len() > CHECKSUM_LEN => {
            let (payload, sum) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
            checksum(payload) == sum
        }
        _ => false,
    }
}
