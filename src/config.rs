//! Runtime configuration for the CREATE2 vanity miner.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::artifact::{ArtifactSource, HexArtifactDir};
use crate::crypto::create2::init_code;
use crate::crypto::{decode_hex, Address, InitCodeHash};
use crate::matcher::Pattern;
use crate::search::SearchParams;

/// CREATE2 Vanity Salt Miner
///
/// Finds the lowest salt whose CREATE2 address, deployed through the given
/// factory, starts with the requested prefix.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Address prefix to search for (hex, optional 0x; empty matches immediately)
    #[arg(short, long)]
    pub prefix: String,

    /// Case sensitive matching against the EIP-55 checksummed address
    #[arg(short = 'c', long, default_value = "false")]
    pub case_sensitive: bool,

    /// Iteration to start from (resume a previous search)
    #[arg(short = 's', long, default_value = "0")]
    pub start: u64,

    /// Start from a random iteration instead of --start
    #[arg(long, default_value = "false", conflicts_with = "start")]
    pub random_start: bool,

    /// Give up after this many iterations (default: unlimited)
    #[arg(short = 'm', long)]
    pub max_iterations: Option<u64>,

    /// Give up after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// CREATE2 factory address (20 bytes, hex with or without 0x)
    #[arg(long, default_value = "0x4e59b44847b379578588920ca78fbf26c0b4956c")]
    pub deployer: String,

    /// keccak256(bytecode || constructorArgs), 32 bytes hex
    #[arg(long, conflicts_with_all = ["bytecode", "artifacts"])]
    pub init_code_hash: Option<String>,

    /// Creation bytecode (hex)
    #[arg(long, conflicts_with = "artifacts")]
    pub bytecode: Option<String>,

    /// Directory of <Contract>.bin files with creation bytecode
    #[arg(long, requires = "contract")]
    pub artifacts: Option<PathBuf>,

    /// Contract name to load from --artifacts
    #[arg(long)]
    pub contract: Option<String>,

    /// ABI-encoded constructor arguments (hex)
    #[arg(long, default_value = "")]
    pub constructor_args: String,

    /// Address placed in the first 20 bytes of every salt
    #[arg(long)]
    pub caller: Option<String>,

    /// Number of worker threads (default: number of CPU cores; 1 = sequential)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Progress report interval in seconds
    #[arg(short = 'r', long, default_value = "5")]
    pub report_interval: u64,
}

/// The deployment target: its init code when known, and always its hash.
#[derive(Debug, Clone)]
pub struct Target {
    pub init_code: Option<Vec<u8>>,
    pub init_code_hash: InitCodeHash,
}

impl Config {
    /// Returns the number of workers, defaulting to CPU count.
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let digits = self
            .prefix
            .strip_prefix("0x")
            .or_else(|| self.prefix.strip_prefix("0X"))
            .unwrap_or(&self.prefix);
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ConfigError::InvalidPattern(
                "Prefix must contain only hex characters (0-9, a-f)".into(),
            ));
        }
        if digits.len() > 40 {
            return Err(ConfigError::InvalidPattern(
                "Prefix cannot be longer than 40 characters (full address)".into(),
            ));
        }

        self.deployer_address()?;
        if let Some(caller) = &self.caller {
            parse_address("caller", caller)?;
        }
        parse_hex("constructor_args", &self.constructor_args)?;

        match (&self.init_code_hash, &self.bytecode, &self.artifacts) {
            (Some(hash), None, None) => {
                if !self.constructor_args.is_empty() {
                    return Err(ConfigError::InvalidConfig(
                        "constructor_args cannot be combined with init_code_hash".into(),
                    ));
                }
                parse_init_code_hash(hash)?;
            }
            (None, Some(bytecode), None) => {
                parse_hex("bytecode", bytecode)?;
            }
            (None, None, Some(_)) if self.contract.is_some() => {}
            _ => {
                return Err(ConfigError::InvalidConfig(
                    "one of init_code_hash, bytecode, or artifacts + contract is required".into(),
                ))
            }
        }

        if self.workers == Some(0) {
            return Err(ConfigError::InvalidConfig("workers must be at least 1".into()));
        }
        Ok(())
    }

    pub fn pattern(&self) -> Pattern {
        Pattern::new(&self.prefix, self.case_sensitive)
    }

    pub fn deployer_address(&self) -> Result<Address, ConfigError> {
        parse_address("deployer", &self.deployer)
    }

    /// Loads or hashes the init code from whichever source was given.
    pub fn target(&self) -> Result<Target, ConfigError> {
        if let Some(hash) = &self.init_code_hash {
            return Ok(Target {
                init_code: None,
                init_code_hash: parse_init_code_hash(hash)?,
            });
        }

        let bytecode = match (&self.bytecode, &self.artifacts, &self.contract) {
            (Some(hex), _, _) => parse_hex("bytecode", hex)?,
            (None, Some(dir), Some(name)) => HexArtifactDir::new(dir).creation_bytecode(name)?,
            _ => {
                return Err(ConfigError::InvalidConfig(
                    "no bytecode source configured".into(),
                ))
            }
        };
        let code = init_code(&bytecode, &parse_hex("constructor_args", &self.constructor_args)?);
        Ok(Target {
            init_code_hash: InitCodeHash::of(&code),
            init_code: Some(code),
        })
    }

    /// Search parameters starting at `start`.
    pub fn search_params(&self, target: &Target, start: u64) -> Result<SearchParams, ConfigError> {
        let mut params = SearchParams::new(
            self.deployer_address()?,
            target.init_code_hash,
            self.pattern(),
        )
        .starting_at(start);
        if let Some(budget) = self.max_iterations {
            params = params.with_budget(budget);
        }
        if let Some(secs) = self.timeout {
            params = params.with_timeout(Duration::from_secs(secs));
        }
        if let Some(caller) = &self.caller {
            params = params.with_caller(parse_address("caller", caller)?);
        }
        Ok(params)
    }
}

fn parse_hex(field: &str, value: &str) -> Result<Vec<u8>, ConfigError> {
    decode_hex(value)
        .map_err(|e| ConfigError::InvalidConfig(format!("{} is not valid hex: {}", field, e)))
}

fn parse_address(field: &str, value: &str) -> Result<Address, ConfigError> {
    value.parse().map_err(|_| {
        ConfigError::InvalidConfig(format!("{} must be 20 bytes (40 hex chars)", field))
    })
}

fn parse_init_code_hash(value: &str) -> Result<InitCodeHash, ConfigError> {
    value.parse().map_err(|_| {
        ConfigError::InvalidConfig("init_code_hash must be 32 bytes (64 hex chars)".into())
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Load(#[from] crate::Error),
}
