use std::path::PathBuf;

use ethers::types::H256;
use thiserror::Error;

use crate::config::Var;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing {0} (set it in the environment or in .env)")]
    Missing(Var),

    #[error("invalid {var}: {reason}")]
    Invalid { var: Var, reason: String },
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("could not find {}. Run `npx hardhat compile` first.", .path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed artifact {}: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("artifact {} has no creation bytecode (abstract contract or interface?)", .path.display())]
    MissingBytecode { path: PathBuf },
}

#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("transaction {0:?} reverted")]
    Reverted(H256),

    #[error("transaction {hash:?} not confirmed within {secs}s")]
    Timeout { hash: H256, secs: u64 },

    #[error("deployment {0:?} produced no contract address")]
    NoContractAddress(H256),

    #[error("no code found at deployed address {0:?}")]
    NoCode(ethers::types::Address),
}
