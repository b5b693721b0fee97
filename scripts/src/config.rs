use std::{fmt, str::FromStr};

use ethers::{
    types::{Address, H256},
    utils::to_checksum,
};

use crate::error::ConfigError;

/// Environment variables understood by the flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Var {
    RpcUrl,
    PrivateKey,
    ContractAddress,
    SampleAddress,
    SampleTx,
}

impl Var {
    pub const fn name(self) -> &'static str {
        match self {
            Var::RpcUrl => "RPC_URL",
            Var::PrivateKey => "PRIVATE_KEY",
            Var::ContractAddress => "CONTRACT_ADDRESS",
            Var::SampleAddress => "SAMPLE_ADDRESS",
            Var::SampleTx => "SAMPLE_TX",
        }
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Settings for a single run, read once at the start of a flow.
///
/// Values are kept as trimmed strings; the typed accessors parse them on
/// demand so a malformed value is reported with the variable that carried it.
#[derive(Clone, Default)]
pub struct Config {
    rpc_url: Option<String>,
    private_key: Option<String>,
    contract_address: Option<String>,
    sample_address: Option<String>,
    sample_tx: Option<String>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("rpc_url", &self.rpc_url)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("contract_address", &self.contract_address)
            .field("sample_address", &self.sample_address)
            .field("sample_tx", &self.sample_tx)
            .finish()
    }
}

impl Config {
    /// Reads the process environment.
    pub fn load(required: &[Var]) -> Result<Self, ConfigError> {
        Self::from_lookup(required, |name| std::env::var(name).ok())
    }

    /// Builds a config from an arbitrary lookup and checks that every
    /// `required` variable is present and non-empty.
    pub fn from_lookup<F>(required: &[Var], lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |var: Var| {
            lookup(var.name())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let config = Self {
            rpc_url: read(Var::RpcUrl),
            private_key: read(Var::PrivateKey),
            contract_address: read(Var::ContractAddress),
            sample_address: read(Var::SampleAddress),
            sample_tx: read(Var::SampleTx),
        };

        for var in required {
            config.require(*var)?;
        }
        log::debug!("loaded config: {:?}", config);

        Ok(config)
    }

    fn get(&self, var: Var) -> Option<&str> {
        match var {
            Var::RpcUrl => self.rpc_url.as_deref(),
            Var::PrivateKey => self.private_key.as_deref(),
            Var::ContractAddress => self.contract_address.as_deref(),
            Var::SampleAddress => self.sample_address.as_deref(),
            Var::SampleTx => self.sample_tx.as_deref(),
        }
    }

    fn require(&self, var: Var) -> Result<&str, ConfigError> {
        self.get(var).ok_or(ConfigError::Missing(var))
    }

    pub fn rpc_url(&self) -> Result<&str, ConfigError> {
        self.require(Var::RpcUrl)
    }

    pub fn private_key(&self) -> Result<&str, ConfigError> {
        self.require(Var::PrivateKey)
    }

    pub fn contract_address(&self) -> Result<Address, ConfigError> {
        parse_address(Var::ContractAddress, self.require(Var::ContractAddress)?)
    }

    pub fn sample_address(&self) -> Result<Address, ConfigError> {
        parse_address(Var::SampleAddress, self.require(Var::SampleAddress)?)
    }

    /// `None` when no sample transaction is configured.
    pub fn sample_tx(&self) -> Result<Option<H256>, ConfigError> {
        self.get(Var::SampleTx)
            .map(|raw| parse_hash(Var::SampleTx, raw))
            .transpose()
    }
}

/// Accepts all-lowercase, all-uppercase or correctly checksummed (EIP-55) hex.
pub fn parse_address(var: Var, raw: &str) -> Result<Address, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid { var, reason };

    let digits = raw
        .strip_prefix("0x")
        .ok_or_else(|| invalid(format!("{raw:?} is not 0x-prefixed")))?;
    if digits.len() != 40 {
        return Err(invalid(format!(
            "{raw:?} has {} hex digits, expected 40",
            digits.len()
        )));
    }
    let address = Address::from_str(digits).map_err(|e| invalid(e.to_string()))?;

    let mixed_case = digits.chars().any(|c| c.is_ascii_lowercase())
        && digits.chars().any(|c| c.is_ascii_uppercase());
    if mixed_case && to_checksum(&address, None) != raw {
        return Err(invalid(format!("{raw:?} has a bad checksum")));
    }

    Ok(address)
}

fn parse_hash(var: Var, raw: &str) -> Result<H256, ConfigError> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    if digits.len() != 64 {
        return Err(ConfigError::Invalid {
            var,
            reason: format!("{raw:?} is not a 32-byte hash"),
        });
    }
    H256::from_str(digits).map_err(|e| ConfigError::Invalid {
        var,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    const ADDRESS: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";
    const REQUIRED: [Var; 4] = [
        Var::RpcUrl,
        Var::PrivateKey,
        Var::ContractAddress,
        Var::SampleAddress,
    ];

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn full_env() -> Vec<(&'static str, &'static str)> {
        vec![
            ("RPC_URL", "http://localhost:8545"),
            (
                "PRIVATE_KEY",
                "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
            ),
            ("CONTRACT_ADDRESS", ADDRESS),
            ("SAMPLE_ADDRESS", ADDRESS),
        ]
    }

    #[test]
    fn every_missing_required_var_is_reported() {
        for missing in REQUIRED {
            let pairs: Vec<_> = full_env()
                .into_iter()
                .filter(|(k, _)| *k != missing.name())
                .collect();
            let err = Config::from_lookup(&REQUIRED, env(&pairs)).unwrap_err();
            match err {
                ConfigError::Missing(var) => assert_eq!(var, missing),
                other => panic!("unexpected error {other:?}"),
            }
        }
    }

    #[test]
    fn blank_value_counts_as_missing() {
        let err = Config::from_lookup(&[Var::RpcUrl], env(&[("RPC_URL", "   ")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(Var::RpcUrl)));
        assert_eq!(
            err.to_string(),
            "missing RPC_URL (set it in the environment or in .env)"
        );
    }

    #[test]
    fn optional_vars_may_be_absent() {
        let config = Config::from_lookup(&[Var::RpcUrl], env(&full_env())).unwrap();
        assert_eq!(config.sample_tx().unwrap(), None);
        assert_eq!(config.rpc_url().unwrap(), "http://localhost:8545");
    }

    #[test]
    fn values_are_trimmed() {
        let config =
            Config::from_lookup(&[Var::RpcUrl], env(&[("RPC_URL", " http://x:1 \n")])).unwrap();
        assert_eq!(config.rpc_url().unwrap(), "http://x:1");
    }

    #[test]
    fn sample_tx_is_parsed() {
        let hash = "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b";
        let config = Config::from_lookup(&[], env(&[("SAMPLE_TX", hash)])).unwrap();
        assert_eq!(
            config.sample_tx().unwrap(),
            Some(H256::from_str(&hash[2..]).unwrap())
        );

        let config = Config::from_lookup(&[], env(&[("SAMPLE_TX", "0x1234")])).unwrap();
        assert!(matches!(
            config.sample_tx(),
            Err(ConfigError::Invalid {
                var: Var::SampleTx,
                ..
            })
        ));
    }

    #[test]
    fn checksummed_address_is_accepted() {
        let address = parse_address(Var::ContractAddress, ADDRESS).unwrap();
        assert_eq!(to_checksum(&address, None), ADDRESS);

        let lower = ADDRESS.to_lowercase();
        assert_eq!(parse_address(Var::ContractAddress, &lower).unwrap(), address);
    }

    #[test]
    fn bad_checksum_is_rejected() {
        let bad = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAeD";
        let err = parse_address(Var::ContractAddress, bad).unwrap_err();
        assert!(err.to_string().contains("bad checksum"), "{err}");
    }

    #[test]
    fn malformed_address_is_rejected() {
        for raw in ["5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed", "0x1234", "0xzz"] {
            assert!(matches!(
                parse_address(Var::SampleAddress, raw),
                Err(ConfigError::Invalid {
                    var: Var::SampleAddress,
                    ..
                })
            ));
        }
    }

    #[test]
    fn private_key_is_redacted_in_debug() {
        let config = Config::from_lookup(&[], env(&full_env())).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("ac0974bec39a17e3"));
        assert!(debug.contains("<redacted>"));
    }
}
