//! # create2_vanity
//!
//! CREATE2 vanity salt miner and deterministic deployer. Searches salts in
//! iteration order until the address `keccak256(0xff || factory || salt ||
//! keccak256(initCode))[12..32]` starts with a desired prefix, then deploys
//! through the factory and checks the contract landed at the predicted address.
//!
//! ## Architecture
//!
//! - `crypto`: Keccak-256, addresses and CREATE2 derivation
//! - `salt`: Deterministic iteration -> salt sequence
//! - `matcher`: Prefix matching with optional case sensitivity
//! - `search` / `worker`: Sequential and sharded parallel search
//! - `deploy`: Factory deployment through a chain client
//! - `artifact`, `verify`: Bytecode source and post-deployment verification
//! - `config`: Runtime configuration

pub mod artifact;
pub mod config;
pub mod crypto;
pub mod deploy;
pub mod error;
pub mod matcher;
pub mod salt;
pub mod search;
pub mod verify;
pub mod worker;

pub use config::Config;
pub use crypto::{create2_address, Address, InitCodeHash, Salt};
pub use deploy::{ChainClient, Deployer, DeploymentRecord, VanityDeployment};
pub use error::{Error, Result};
pub use matcher::{MatchResult, Pattern};
pub use salt::SaltGenerator;
pub use search::{search, SearchOutcome, SearchParams, SearchResult};
pub use worker::WorkerPool;
