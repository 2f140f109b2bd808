//! Error taxonomy shared by the miner and the deployer.

use crate::crypto::Address;
use crate::deploy::ChainError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A fixed-length input (address, salt, hash) had the wrong byte length.
    #[error("Invalid input length: expected {expected} bytes, got {actual}")]
    InvalidInputLength { expected: usize, actual: usize },

    #[error("Invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// No matching salt within the configured budget.
    #[error("No matching salt found after {searched} iterations")]
    SearchExhausted { searched: u64 },

    #[error("Deployment failed: {0}")]
    DeploymentFailed(#[source] ChainError),

    #[error("Deployment transaction 0x{} reverted: {reason}", hex::encode(.tx_hash))]
    DeploymentReverted { tx_hash: [u8; 32], reason: String },

    /// The confirmation wait was abandoned; the transaction may still land.
    #[error("Timed out waiting for confirmation of 0x{}", hex::encode(.tx_hash))]
    ConfirmationTimeout { tx_hash: [u8; 32] },

    #[error("A contract is already deployed at {0}")]
    AlreadyDeployed(Address),

    #[error("No deployment factory code at {0}")]
    FactoryMissing(Address),

    /// Confirmed address differs from the locally predicted one. Never recoverable.
    #[error("Confirmed address {confirmed} does not match predicted address {predicted}")]
    AddressMismatchFatal {
        predicted: Address,
        confirmed: Address,
    },

    /// The transaction confirmed but nothing was created where predicted.
    #[error("Deployment confirmed but no code exists at predicted address {0}")]
    CodeMissing(Address),

    #[error("Artifact error: {0}")]
    Artifact(String),
}

impl Error {
    /// Returns true if the process must abort rather than report and continue.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::AddressMismatchFatal { .. } | Error::CodeMissing(_)
        )
    }
}
