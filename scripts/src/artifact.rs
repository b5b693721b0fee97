use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use ethers::{
    abi::Abi,
    contract::{Contract, ContractFactory},
    providers::Middleware,
    types::{Address, Bytes},
};
use serde::Deserialize;

use crate::error::ArtifactError;

pub const DEFAULT_ARTIFACT: &str = "artifacts/contracts/Counter.sol/Counter.json";

/// A Hardhat build artifact. Only the fields the flows use are read.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    #[serde(skip)]
    path: PathBuf,
    #[serde(default)]
    pub contract_name: Option<String>,
    pub abi: Abi,
    #[serde(default)]
    pub bytecode: Option<Bytes>,
}

impl Artifact {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let path = path.as_ref().to_path_buf();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ArtifactError::NotFound { path })
            }
            Err(source) => return Err(ArtifactError::Read { path, source }),
        };

        let mut artifact: Artifact = match serde_json::from_str(&raw) {
            Ok(artifact) => artifact,
            Err(source) => return Err(ArtifactError::Malformed { path, source }),
        };
        log::debug!(
            "loaded artifact {} ({} functions)",
            path.display(),
            artifact.abi.functions().count()
        );
        artifact.path = path;

        Ok(artifact)
    }

    pub fn name(&self) -> &str {
        self.contract_name.as_deref().unwrap_or("contract")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn creation_code(&self) -> Result<Bytes, ArtifactError> {
        match &self.bytecode {
            Some(code) if !code.is_empty() => Ok(code.clone()),
            _ => Err(ArtifactError::MissingBytecode {
                path: self.path.clone(),
            }),
        }
    }

    pub fn factory<M: Middleware>(
        &self,
        client: Arc<M>,
    ) -> Result<ContractFactory<M>, ArtifactError> {
        Ok(ContractFactory::new(self.abi.clone(), self.creation_code()?, client))
    }

    /// Binds the interface to a deployed instance.
    pub fn contract<M: Middleware>(&self, address: Address, client: Arc<M>) -> Contract<M> {
        Contract::new(address, self.abi.clone(), client)
    }
}
