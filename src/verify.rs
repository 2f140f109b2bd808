//! Source verification after a confirmed deployment.
//!
//! Explorers need time to index a new contract, so verification waits for a
//! settle delay first. A failed verification never undoes the deployment; it
//! is logged and reported as `false`.

use std::thread;
use std::time::Duration;

use crate::crypto::Address;
use crate::deploy::DeploymentRecord;

/// Delay between confirmation and submitting source for verification.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("Contract not yet indexed by the explorer")]
    NotIndexed,
    #[error("Verification rejected: {0}")]
    Rejected(String),
    #[error("Explorer request failed: {0}")]
    Request(String),
}

/// Submits deployed source for verification (e.g. against a block explorer).
pub trait SourceVerifier {
    fn verify(
        &self,
        address: &Address,
        contract_name: &str,
        constructor_args: &[u8],
    ) -> Result<(), VerifyError>;
}

/// Waits `settle`, then verifies `record`. Returns whether verification succeeded.
pub fn verify_after_settle(
    verifier: &dyn SourceVerifier,
    record: &DeploymentRecord,
    settle: Duration,
) -> bool {
    log::info!(
        "waiting {}s before verifying {} at {}",
        settle.as_secs(),
        record.contract_name,
        record.address
    );
    thread::sleep(settle);

    match verifier.verify(&record.address, &record.contract_name, &record.constructor_args) {
        Ok(()) => {
            log::info!("verified {} at {}", record.contract_name, record.address);
            true
        }
        Err(e) => {
            log::warn!(
                "verification of {} at {} failed: {}",
                record.contract_name,
                record.address,
                e
            );
            false
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::crypto::Salt;
    use crate::deploy::{TransactionReceipt, TxStatus};

    /// Records every verification request and answers with a fixed result.
    pub(crate) struct Recorder {
        pub(crate) calls: RefCell<Vec<(Address, String, Vec<u8>)>>,
        result: Result<(), VerifyError>,
    }

    impl Recorder {
        pub(crate) fn new(result: Result<(), VerifyError>) -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                result,
            }
        }
    }

    impl SourceVerifier for Recorder {
        fn verify(
            &self,
            address: &Address,
            contract_name: &str,
            constructor_args: &[u8],
        ) -> Result<(), VerifyError> {
            self.calls
                .borrow_mut()
                .push((*address, contract_name.to_string(), constructor_args.to_vec()));
            self.result.clone()
        }
    }

    fn record() -> DeploymentRecord {
        DeploymentRecord {
            contract_name: "Token".into(),
            salt: Salt::default(),
            constructor_args: vec![1, 2, 3],
            address: Address::from_bytes([0x92; 20]),
            receipt: TransactionReceipt {
                tx_hash: [0u8; 32],
                block_number: 1,
                gas_used: 53_000,
                status: TxStatus::Success,
                contract_address: Some(Address::from_bytes([0x92; 20])),
            },
        }
    }

    #[test]
    fn test_verifies_with_constructor_args() {
        let verifier = Recorder::new(Ok(()));
        assert!(verify_after_settle(&verifier, &record(), Duration::ZERO));
        let calls = verifier.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, Address::from_bytes([0x92; 20]));
        assert_eq!(calls[0].1, "Token");
        assert_eq!(calls[0].2, vec![1, 2, 3]);
    }

    #[test]
    fn test_failure_is_not_fatal() {
        let verifier = Recorder::new(Err(VerifyError::NotIndexed));
        assert!(!verify_after_settle(&verifier, &record(), Duration::ZERO));
    }
}
