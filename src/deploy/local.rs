//! In-memory chain with a CREATE2 deployment factory.
//!
//! Derives created addresses from the raw calldata on its own, without going
//! through the miner's hasher, so a deployment round trip cross-checks the
//! prediction. Faults can be queued to exercise the deployer's error paths.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tiny_keccak::{Hasher, Keccak};

use super::{
    ChainClient, ChainError, TransactionReceipt, TransactionRequest, TxHash, TxStatus,
    DEFAULT_FACTORY,
};
use crate::crypto::Address;

/// Runtime code of the deterministic deployment proxy.
pub const DETERMINISTIC_DEPLOYER_RUNTIME: &str = "7fffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffe03601600081602082378035828234f58015156039578182fd5b8082525050506014600cf3";

const CREATE2_GAS: u64 = 32_000;

/// A scripted failure applied to the next transaction (or reads).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// The next submission fails at the RPC layer.
    Rpc(String),
    /// The next transaction is mined but reverts.
    Revert(String),
    /// The next deployment lands at this address instead.
    Misroute(Address),
    /// The next transaction never confirms.
    Unconfirmed,
    /// The next receipt does not report the created address.
    OmitContractAddress,
    /// The next `n` code reads fail.
    FlakyRead(u32),
}

#[derive(Debug, Default)]
struct State {
    code: HashMap<Address, Vec<u8>>,
    receipts: HashMap<TxHash, TransactionReceipt>,
    faults: VecDeque<Fault>,
    flaky_reads: u32,
    block_number: u64,
    submissions: u64,
}

#[derive(Debug, Default)]
pub struct LocalChain {
    factories: Vec<Address>,
    state: Mutex<State>,
}

impl LocalChain {
    /// A chain with the deterministic deployment proxy at its usual address.
    pub fn new() -> Self {
        Self::empty().with_factory(DEFAULT_FACTORY)
    }

    /// A chain with no factory installed.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_factory(mut self, factory: Address) -> Self {
        let runtime = hex::decode(DETERMINISTIC_DEPLOYER_RUNTIME).unwrap_or_default();
        self.state().code.insert(factory, runtime);
        self.factories.push(factory);
        self
    }

    pub fn inject(&self, fault: Fault) {
        let mut state = self.state();
        match fault {
            Fault::FlakyRead(n) => state.flaky_reads += n,
            fault => state.faults.push_back(fault),
        }
    }

    /// Number of `send_transaction` calls, successful or not.
    pub fn submissions(&self) -> u64 {
        self.state().submissions
    }

    pub fn block_number(&self) -> u64 {
        self.state().block_number
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn keccak(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    out
}

impl ChainClient for LocalChain {
    fn code_at(&self, address: &Address) -> Result<Vec<u8>, ChainError> {
        let mut state = self.state();
        if state.flaky_reads > 0 {
            state.flaky_reads -= 1;
            return Err(ChainError::Rpc("eth_getCode: upstream unavailable".into()));
        }
        Ok(state.code.get(address).cloned().unwrap_or_default())
    }

    fn send_transaction(&self, tx: &TransactionRequest) -> Result<TxHash, ChainError> {
        let mut state = self.state();
        state.submissions += 1;
        let nonce = state.submissions;

        let fault = state.faults.pop_front();
        if let Some(Fault::Rpc(msg)) = &fault {
            return Err(ChainError::Rpc(msg.clone()));
        }
        if !self.factories.contains(&tx.to) {
            return Err(ChainError::Rejected(format!("{} is not a factory", tx.to)));
        }

        let tx_hash = keccak(&[
            &tx.to.as_bytes()[..],
            tx.data.as_slice(),
            &nonce.to_be_bytes()[..],
        ]);
        state.block_number += 1;
        let mut receipt = TransactionReceipt {
            tx_hash,
            block_number: state.block_number,
            gas_used: 21_000,
            status: TxStatus::Success,
            contract_address: None,
        };

        if tx.data.len() < 32 {
            receipt.status = TxStatus::Reverted {
                reason: "calldata shorter than a salt".into(),
            };
        } else if let Some(Fault::Revert(reason)) = &fault {
            receipt.status = TxStatus::Reverted {
                reason: reason.clone(),
            };
        } else {
            let (salt, init_code) = tx.data.split_at(32);
            let code_hash = keccak(&[init_code]);
            let hash = keccak(&[&[0xff][..], &tx.to.as_bytes()[..], salt, &code_hash[..]]);
            let mut created = [0u8; 20];
            created.copy_from_slice(&hash[12..]);
            let created = match &fault {
                Some(Fault::Misroute(elsewhere)) => *elsewhere,
                _ => Address::from_bytes(created),
            };

            if state.code.contains_key(&created) {
                receipt.status = TxStatus::Reverted {
                    reason: "create2 collision".into(),
                };
            } else {
                // No EVM here: the init code itself stands in for the runtime code.
                state.code.insert(created, init_code.to_vec());
                receipt.gas_used += CREATE2_GAS;
                if fault != Some(Fault::OmitContractAddress) {
                    receipt.contract_address = Some(created);
                }
            }
        }

        if fault != Some(Fault::Unconfirmed) {
            state.receipts.insert(tx_hash, receipt);
        }
        Ok(tx_hash)
    }

    fn wait_for_receipt(
        &self,
        tx_hash: &TxHash,
        _timeout: Option<Duration>,
    ) -> Result<Option<TransactionReceipt>, ChainError> {
        Ok(self.state().receipts.get(tx_hash).cloned())
    }
}
