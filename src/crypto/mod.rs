//! Keccak-256 and CREATE2 address derivation.
//!
//! CREATE2 address (EIP-1014):
//! - init_code_hash = keccak256(creationBytecode || constructorArgs)
//! - address = keccak256(0xff || deployer || salt || init_code_hash)[12..32]  [85 bytes -> 20 bytes]

mod address;
pub mod create2;

pub use address::Address;
pub use create2::{create2_address, try_create2_address, InitCodeHash, Salt};
use tiny_keccak::{Hasher, Keccak};

/// Keccak-256 of arbitrary bytes (output 32 bytes).
pub fn keccak256(input: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(input);
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    out
}

/// Decodes hex with or without a leading `0x`.
pub(crate) fn decode_hex(s: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let s = s.trim();
    hex::decode(s.strip_prefix("0x").unwrap_or(s))
}

/// Copies `bytes` into a fixed-size array, rejecting any other length.
pub(crate) fn fixed<const N: usize>(bytes: &[u8]) -> crate::Result<[u8; N]> {
    bytes
        .try_into()
        .map_err(|_| crate::Error::InvalidInputLength {
            expected: N,
            actual: bytes.len(),
        })
}
