//! Creation bytecode lookup by contract name.

use std::fs;
use std::path::{Path, PathBuf};

use crate::crypto::decode_hex;
use crate::{Error, Result};

/// Supplies raw creation bytecode; constructor arguments arrive already encoded.
pub trait ArtifactSource {
    fn creation_bytecode(&self, contract_name: &str) -> Result<Vec<u8>>;
}

/// A directory of `<ContractName>.bin` files holding hex creation bytecode,
/// as emitted by `solc --bin`.
#[derive(Debug, Clone)]
pub struct HexArtifactDir {
    root: PathBuf,
}

impl HexArtifactDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, contract_name: &str) -> PathBuf {
        self.root.join(format!("{}.bin", contract_name))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ArtifactSource for HexArtifactDir {
    fn creation_bytecode(&self, contract_name: &str) -> Result<Vec<u8>> {
        if contract_name.is_empty() || contract_name.contains(['/', '\\', '.']) {
            return Err(Error::Artifact(format!(
                "invalid contract name {:?}",
                contract_name
            )));
        }
        let path = self.path_for(contract_name);
        let text = fs::read_to_string(&path)
            .map_err(|e| Error::Artifact(format!("{}: {}", path.display(), e)))?;
        let bytecode = decode_hex(&text)
            .map_err(|e| Error::Artifact(format!("{}: {}", path.display(), e)))?;
        if bytecode.is_empty() {
            return Err(Error::Artifact(format!("{}: empty bytecode", path.display())));
        }
        Ok(bytecode)
    }
}
