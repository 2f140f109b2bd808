//! Deployment through a CREATE2 factory.
//!
//! The factory is called with `salt (32) || initCode` as calldata and creates
//! the contract with CREATE2. Submission is never retried: every attempt costs
//! gas, so resubmitting is left to the caller. Only the read-only checks that
//! run before submission are retried.

mod local;

use std::thread;
use std::time::Duration;

pub use local::{Fault, LocalChain, DETERMINISTIC_DEPLOYER_RUNTIME};

use crate::crypto::create2::init_code;
use crate::crypto::{create2_address, Address, InitCodeHash, Salt};
use crate::matcher::Pattern;
use crate::search::{self, SearchParams};
use crate::verify::{verify_after_settle, SourceVerifier, DEFAULT_SETTLE_DELAY};
use crate::{Error, Result};

/// Arachnid's deterministic deployment proxy, present on most EVM chains.
pub const DEFAULT_FACTORY: Address = Address::from_bytes([
    0x4e, 0x59, 0xb4, 0x48, 0x47, 0xb3, 0x79, 0x57, 0x85, 0x88, 0x92, 0x0c, 0xa7, 0x8f, 0xbf, 0x26,
    0xc0, 0xb4, 0x95, 0x6c,
]);

pub type TxHash = [u8; 32];

/// Failure reported by the chain client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    #[error("RPC error: {0}")]
    Rpc(String),
    #[error("Transaction rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub to: Address,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    Success,
    Reverted { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub gas_used: u64,
    pub status: TxStatus,
    /// Address created by the transaction, when the client can tell.
    pub contract_address: Option<Address>,
}

/// Transaction submission and confirmation primitives.
///
/// Only the deployer talks to the chain; the salt search never does.
pub trait ChainClient {
    /// Runtime code at `address` (empty if none).
    fn code_at(&self, address: &Address) -> Result<Vec<u8>, ChainError>;

    /// Signs and broadcasts a transaction.
    fn send_transaction(&self, tx: &TransactionRequest) -> Result<TxHash, ChainError>;

    /// Blocks until the transaction is mined. `Ok(None)` means the wait timed
    /// out; the transaction itself may still be mined later.
    fn wait_for_receipt(
        &self,
        tx_hash: &TxHash,
        timeout: Option<Duration>,
    ) -> Result<Option<TransactionReceipt>, ChainError>;
}

impl<C: ChainClient + ?Sized> ChainClient for &C {
    fn code_at(&self, address: &Address) -> Result<Vec<u8>, ChainError> {
        (**self).code_at(address)
    }
    fn send_transaction(&self, tx: &TransactionRequest) -> Result<TxHash, ChainError> {
        (**self).send_transaction(tx)
    }
    fn wait_for_receipt(
        &self,
        tx_hash: &TxHash,
        timeout: Option<Duration>,
    ) -> Result<Option<TransactionReceipt>, ChainError> {
        (**self).wait_for_receipt(tx_hash, timeout)
    }
}

/// Calldata for the factory: the salt followed by the init code.
pub fn factory_calldata(salt: &Salt, init_code: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(32 + init_code.len());
    data.extend_from_slice(salt.as_bytes());
    data.extend_from_slice(init_code);
    data
}

/// A confirmed deployment.
#[derive(Debug, Clone)]
pub struct DeploymentRecord {
    pub contract_name: String,
    pub salt: Salt,
    pub constructor_args: Vec<u8>,
    pub address: Address,
    pub receipt: TransactionReceipt,
}

/// Inputs for mining a vanity salt and deploying with it.
#[derive(Debug, Clone)]
pub struct VanityDeployment {
    pub contract_name: String,
    pub bytecode: Vec<u8>,
    pub constructor_args: Vec<u8>,
    pub vanity: String,
    pub case_sensitive: bool,
    pub starting_iteration: u64,
    pub max_iterations: Option<u64>,
    pub workers: usize,
}

#[derive(Debug, Clone)]
pub struct DeployerConfig {
    pub factory: Address,
    /// Abandon the confirmation wait after this long.
    pub confirmation_timeout: Option<Duration>,
    /// Extra attempts for the read-only checks before submission.
    pub precheck_retries: u32,
    pub retry_delay: Duration,
    /// Wait between confirmation and source verification.
    pub settle_delay: Duration,
}

impl Default for DeployerConfig {
    fn default() -> Self {
        Self {
            factory: DEFAULT_FACTORY,
            confirmation_timeout: None,
            precheck_retries: 2,
            retry_delay: Duration::from_secs(1),
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

pub struct Deployer<C> {
    client: C,
    config: DeployerConfig,
}

impl<C: ChainClient> Deployer<C> {
    pub fn new(client: C) -> Self {
        Self::with_config(client, DeployerConfig::default())
    }

    pub fn with_config(client: C, config: DeployerConfig) -> Self {
        Self { client, config }
    }

    pub fn factory(&self) -> &Address {
        &self.config.factory
    }

    /// Address the factory will create for this init code and salt.
    pub fn predict(&self, bytecode: &[u8], constructor_args: &[u8], salt: &Salt) -> Address {
        let hash = InitCodeHash::from_parts(bytecode, constructor_args);
        create2_address(&self.config.factory, salt, &hash)
    }

    /// Mines the lowest salt at or above `starting_iteration` giving the
    /// requested prefix, then deploys with it.
    pub fn generate_salt_and_deploy(&self, request: &VanityDeployment) -> Result<DeploymentRecord> {
        let hash = InitCodeHash::from_parts(&request.bytecode, &request.constructor_args);
        let mut params = SearchParams::new(
            self.config.factory,
            hash,
            Pattern::new(&request.vanity, request.case_sensitive),
        )
        .starting_at(request.starting_iteration);
        if let Some(budget) = request.max_iterations {
            params = params.with_budget(budget);
        }

        let found = search::search(&params, request.workers).into_result()?;
        self.deploy(
            &request.contract_name,
            &request.bytecode,
            &request.constructor_args,
            found.salt,
        )
    }

    /// [`generate_salt_and_deploy`](Self::generate_salt_and_deploy), then
    /// submits the source for verification once the deployment is confirmed.
    /// A failed verification is logged and the record is still returned.
    pub fn generate_salt_and_deploy_verified(
        &self,
        request: &VanityDeployment,
        verifier: &dyn SourceVerifier,
    ) -> Result<DeploymentRecord> {
        let record = self.generate_salt_and_deploy(request)?;
        verify_after_settle(verifier, &record, self.config.settle_delay);
        Ok(record)
    }

    /// Submits the deployment, waits for confirmation, and checks that the
    /// contract landed exactly at the predicted address.
    pub fn deploy(
        &self,
        contract_name: &str,
        bytecode: &[u8],
        constructor_args: &[u8],
        salt: Salt,
    ) -> Result<DeploymentRecord> {
        let factory = self.config.factory;
        let code = init_code(bytecode, constructor_args);
        let predicted = create2_address(&factory, &salt, &InitCodeHash::of(&code));

        if self.read_with_retry(|| self.client.code_at(&factory))?.is_empty() {
            return Err(Error::FactoryMissing(factory));
        }
        if !self.read_with_retry(|| self.client.code_at(&predicted))?.is_empty() {
            return Err(Error::AlreadyDeployed(predicted));
        }

        log::info!(
            "deploying {} via factory {} with salt {} (expected at {})",
            contract_name,
            factory,
            salt,
            predicted
        );
        let tx = TransactionRequest {
            to: factory,
            data: factory_calldata(&salt, &code),
        };
        let tx_hash = self
            .client
            .send_transaction(&tx)
            .map_err(Error::DeploymentFailed)?;
        log::info!("submitted transaction 0x{}", hex::encode(tx_hash));

        let receipt = self
            .client
            .wait_for_receipt(&tx_hash, self.config.confirmation_timeout)
            .map_err(Error::DeploymentFailed)?
            .ok_or(Error::ConfirmationTimeout { tx_hash })?;

        if let TxStatus::Reverted { reason } = &receipt.status {
            return Err(Error::DeploymentReverted {
                tx_hash,
                reason: reason.clone(),
            });
        }

        let address = match receipt.contract_address {
            Some(confirmed) if confirmed != predicted => {
                log::error!(
                    "{} confirmed at {} but {} was predicted",
                    contract_name,
                    confirmed,
                    predicted
                );
                return Err(Error::AddressMismatchFatal {
                    predicted,
                    confirmed,
                });
            }
            Some(confirmed) => confirmed,
            None => {
                let deployed = self
                    .client
                    .code_at(&predicted)
                    .map_err(Error::DeploymentFailed)?;
                if deployed.is_empty() {
                    log::error!("no code at predicted address {}", predicted);
                    return Err(Error::CodeMissing(predicted));
                }
                predicted
            }
        };

        log::info!(
            "{} deployed at {} in block {}",
            contract_name,
            address,
            receipt.block_number
        );
        Ok(DeploymentRecord {
            contract_name: contract_name.to_string(),
            salt,
            constructor_args: constructor_args.to_vec(),
            address,
            receipt,
        })
    }

    fn read_with_retry<T>(
        &self,
        mut read: impl FnMut() -> Result<T, ChainError>,
    ) -> Result<T> {
        let mut attempt = 0;
        loop {
            match read() {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.config.precheck_retries => {
                    attempt += 1;
                    log::warn!("pre-deployment check failed ({}), retry {}", e, attempt);
                    thread::sleep(self.config.retry_delay);
                }
                Err(e) => return Err(Error::DeploymentFailed(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::tests::Recorder;
    use crate::verify::VerifyError;

    const BYTECODE: &[u8] = &[0x60, 0x80, 0x60, 0x40, 0x52, 0x34, 0x80, 0x15];

    fn args() -> Vec<u8> {
        let mut args = vec![0u8; 64];
        args[12..32].copy_from_slice(&[0xf3; 20]);
        args[44..64].copy_from_slice(&[0xd4; 20]);
        args
    }

    fn deployer(chain: &LocalChain) -> Deployer<&LocalChain> {
        Deployer::with_config(
            chain,
            DeployerConfig {
                retry_delay: Duration::ZERO,
                settle_delay: Duration::ZERO,
                ..DeployerConfig::default()
            },
        )
    }

    fn request(vanity: &str, max_iterations: u64) -> VanityDeployment {
        VanityDeployment {
            contract_name: "Token".into(),
            bytecode: BYTECODE.to_vec(),
            constructor_args: args(),
            vanity: vanity.into(),
            case_sensitive: false,
            starting_iteration: 0,
            max_iterations: Some(max_iterations),
            workers: 2,
        }
    }

    #[test]
    fn test_default_factory() {
        assert_eq!(
            DEFAULT_FACTORY.to_checksum(),
            "0x4e59b44847b379578588920cA78FbF26c0B4956C"
        );
    }

    #[test]
    fn test_round_trip_with_mined_salt() {
        let chain = LocalChain::new();
        let d = deployer(&chain);
        let request = VanityDeployment {
            contract_name: "Token".into(),
            bytecode: BYTECODE.to_vec(),
            constructor_args: args(),
            vanity: "0x92".into(),
            case_sensitive: false,
            starting_iteration: 0,
            max_iterations: Some(100_000),
            workers: 4,
        };
        let record = d.generate_salt_and_deploy(&request).unwrap();

        let predicted = create2_address(
            &DEFAULT_FACTORY,
            &record.salt,
            &InitCodeHash::from_parts(BYTECODE, &args()),
        );
        assert_eq!(record.address, predicted);
        assert!(record.address.to_hex().starts_with("92"));
        assert_eq!(record.receipt.status, TxStatus::Success);
        assert_eq!(chain.code_at(&predicted).unwrap(), init_code(BYTECODE, &args()));
        assert_eq!(chain.submissions(), 1);
    }

    #[test]
    fn test_verifies_after_confirmed_deployment() {
        let chain = LocalChain::new();
        let verifier = Recorder::new(Ok(()));
        let record = deployer(&chain)
            .generate_salt_and_deploy_verified(&request("0x92", 100_000), &verifier)
            .unwrap();
        let calls = verifier.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], (record.address, "Token".to_string(), args()));
    }

    #[test]
    fn test_failed_verification_keeps_record() {
        let chain = LocalChain::new();
        let verifier = Recorder::new(Err(VerifyError::NotIndexed));
        let record = deployer(&chain)
            .generate_salt_and_deploy_verified(&request("0x92", 100_000), &verifier)
            .unwrap();
        assert!(record.address.to_hex().starts_with("92"));
        assert_eq!(verifier.calls.borrow().len(), 1);
    }

    #[test]
    fn test_failed_deployment_is_never_verified() {
        let chain = LocalChain::new();
        chain.inject(Fault::Revert("out of gas".into()));
        let verifier = Recorder::new(Ok(()));
        let err = deployer(&chain)
            .generate_salt_and_deploy_verified(&request("0x92", 100_000), &verifier)
            .unwrap_err();
        assert!(matches!(err, Error::DeploymentReverted { .. }));
        assert!(verifier.calls.borrow().is_empty());

        let err = deployer(&chain)
            .generate_salt_and_deploy_verified(&request("0x0123456789abcdef", 50), &verifier)
            .unwrap_err();
        assert!(matches!(err, Error::SearchExhausted { .. }));
        assert!(verifier.calls.borrow().is_empty());
    }

    #[test]
    fn test_default_settle_delay() {
        assert_eq!(DeployerConfig::default().settle_delay, DEFAULT_SETTLE_DELAY);
    }

    #[test]
    fn test_search_exhausted_never_submits() {
        let chain = LocalChain::new();
        let request = VanityDeployment {
            contract_name: "Token".into(),
            bytecode: BYTECODE.to_vec(),
            constructor_args: args(),
            vanity: "0x0123456789abcdef".into(),
            case_sensitive: false,
            starting_iteration: 0,
            max_iterations: Some(100),
            workers: 1,
        };
        let err = deployer(&chain).generate_salt_and_deploy(&request).unwrap_err();
        assert!(matches!(err, Error::SearchExhausted { searched: 100 }));
        assert_eq!(chain.submissions(), 0);
    }

    #[test]
    fn test_rpc_failure_is_not_retried() {
        let chain = LocalChain::new();
        chain.inject(Fault::Rpc("connection reset".into()));
        let err = deployer(&chain).deploy("Token", BYTECODE, &[], Salt::default()).unwrap_err();
        assert!(matches!(err, Error::DeploymentFailed(ChainError::Rpc(_))));
        assert_eq!(chain.submissions(), 1);
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_revert_carries_reason() {
        let chain = LocalChain::new();
        chain.inject(Fault::Revert("out of gas".into()));
        let err = deployer(&chain).deploy("Token", BYTECODE, &[], Salt::default()).unwrap_err();
        match err {
            Error::DeploymentReverted { reason, .. } => assert_eq!(reason, "out of gas"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_mismatch_is_fatal() {
        let chain = LocalChain::new();
        let elsewhere = Address::from_bytes([0x42; 20]);
        chain.inject(Fault::Misroute(elsewhere));
        let err = deployer(&chain).deploy("Token", BYTECODE, &[], Salt::default()).unwrap_err();
        assert!(err.is_fatal());
        match err {
            Error::AddressMismatchFatal { confirmed, .. } => assert_eq!(confirmed, elsewhere),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_custom_and_missing_factory() {
        let other = Address::from_bytes([0x99; 20]);
        let chain = LocalChain::new().with_factory(other);
        let d = Deployer::with_config(
            &chain,
            DeployerConfig {
                factory: other,
                retry_delay: Duration::ZERO,
                ..DeployerConfig::default()
            },
        );
        let record = d.deploy("Token", BYTECODE, &[], Salt::default()).unwrap();
        assert_eq!(record.address, d.predict(BYTECODE, &[], &Salt::default()));

        let chain = LocalChain::empty();
        let err = deployer(&chain).deploy("Token", BYTECODE, &[], Salt::default()).unwrap_err();
        assert!(matches!(err, Error::FactoryMissing(f) if f == DEFAULT_FACTORY));
    }

    #[test]
    fn test_already_deployed() {
        let chain = LocalChain::new();
        let d = deployer(&chain);
        d.deploy("Token", BYTECODE, &[], Salt::default()).unwrap();
        let err = d.deploy("Token", BYTECODE, &[], Salt::default()).unwrap_err();
        assert!(matches!(err, Error::AlreadyDeployed(_)));
        assert_eq!(chain.submissions(), 1);
    }

    #[test]
    fn test_confirmation_timeout() {
        let chain = LocalChain::new();
        chain.inject(Fault::Unconfirmed);
        let err = deployer(&chain).deploy("Token", BYTECODE, &[], Salt::default()).unwrap_err();
        assert!(matches!(err, Error::ConfirmationTimeout { .. }));
    }

    #[test]
    fn test_precheck_retries_transient_reads() {
        let chain = LocalChain::new();
        chain.inject(Fault::FlakyRead(2));
        let record = deployer(&chain).deploy("Token", BYTECODE, &[], Salt::default());
        assert!(record.is_ok());

        chain.inject(Fault::FlakyRead(3));
        let err = deployer(&chain)
            .deploy("Token", BYTECODE, &[], Salt([1u8; 32]))
            .unwrap_err();
        assert!(matches!(err, Error::DeploymentFailed(ChainError::Rpc(_))));
    }

    #[test]
    fn test_code_check_without_receipt_address() {
        let chain = LocalChain::new();
        chain.inject(Fault::OmitContractAddress);
        let record = deployer(&chain).deploy("Token", BYTECODE, &[], Salt::default()).unwrap();
        assert_eq!(record.receipt.contract_address, None);
        assert_eq!(record.address, deployer(&chain).predict(BYTECODE, &[], &Salt::default()));
    }
}
