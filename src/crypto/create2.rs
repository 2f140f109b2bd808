//! CREATE2 address computation.
//!
//! Matches the EVM CREATE2 opcode (EIP-1014):
//!   address = keccak256(0xff || deployer || salt || keccak256(initCode))[12:32]

use std::fmt;
use std::str::FromStr;

use super::{decode_hex, fixed, keccak256, Address};

/// 32-byte CREATE2 salt.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Salt(pub [u8; 32]);

impl Salt {
    pub fn from_slice(bytes: &[u8]) -> crate::Result<Self> {
        fixed(bytes).map(Self)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Salt as hex (no 0x).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for Salt {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_slice(&decode_hex(s)?)
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Salt(0x{})", self.to_hex())
    }
}

impl fmt::Display for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

/// keccak256(creationBytecode || encodedConstructorArgs).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct InitCodeHash(pub [u8; 32]);

impl InitCodeHash {
    /// Hashes already-concatenated init code.
    pub fn of(init_code: &[u8]) -> Self {
        Self(keccak256(init_code))
    }

    /// Hashes creation bytecode followed by the ABI-encoded constructor arguments.
    pub fn from_parts(bytecode: &[u8], constructor_args: &[u8]) -> Self {
        Self::of(&init_code(bytecode, constructor_args))
    }

    pub fn from_slice(bytes: &[u8]) -> crate::Result<Self> {
        fixed(bytes).map(Self)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl FromStr for InitCodeHash {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_slice(&decode_hex(s)?)
    }
}

impl fmt::Debug for InitCodeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InitCodeHash(0x{})", hex::encode(self.0))
    }
}

impl fmt::Display for InitCodeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Concatenates creation bytecode and encoded constructor arguments.
pub fn init_code(bytecode: &[u8], constructor_args: &[u8]) -> Vec<u8> {
    let mut code = Vec::with_capacity(bytecode.len() + constructor_args.len());
    code.extend_from_slice(bytecode);
    code.extend_from_slice(constructor_args);
    code
}

/// Computes the CREATE2 address.
/// Preimage: 0xff (1) || deployer (20) || salt (32) || init_code_hash (32) = 85 bytes.
/// Address = keccak256(preimage)[12..32].
#[inline]
pub fn create2_address(deployer: &Address, salt: &Salt, init_code_hash: &InitCodeHash) -> Address {
    let mut preimage = [0u8; 85];
    preimage[0] = 0xff;
    preimage[1..21].copy_from_slice(deployer.as_bytes());
    preimage[21..53].copy_from_slice(&salt.0);
    preimage[53..85].copy_from_slice(&init_code_hash.0);

    let hash = keccak256(&preimage);
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&hash[12..32]);
    Address::from_bytes(addr)
}

/// [`create2_address`] over unchecked byte slices, for inputs that arrive untyped.
pub fn try_create2_address(
    deployer: &[u8],
    salt: &[u8],
    init_code_hash: &[u8],
) -> crate::Result<Address> {
    Ok(create2_address(
        &Address::from_slice(deployer)?,
        &Salt::from_slice(salt)?,
        &InitCodeHash::from_slice(init_code_hash)?,
    ))
}
