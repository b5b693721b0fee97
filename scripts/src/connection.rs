use std::sync::Arc;

use anyhow::{Context, Result};
use ethers::{
    middleware::SignerMiddleware,
    providers::{Http, Middleware, Provider},
    signers::{LocalWallet, Signer},
    types::Address,
    utils::hex,
};

use crate::{config::Var, error::ConfigError};

pub type Client = SignerMiddleware<Provider<Http>, LocalWallet>;

/// A provider and the wallet that signs for it. Building one does not touch
/// the network.
pub struct Connection {
    provider: Provider<Http>,
    wallet: LocalWallet,
}

impl Connection {
    pub fn new(rpc: &str, sk: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            provider: provider(rpc)?,
            wallet: wallet(sk)?,
        })
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    /// Binds the wallet to the provider. Asks the node for its chain id,
    /// so this is the first request a signing flow makes.
    pub async fn signer(&self) -> Result<Arc<Client>> {
        let chain_id = self
            .provider
            .get_chainid()
            .await
            .context("failed to fetch chain id")?
            .as_u64();
        log::debug!("connected to chain {}", chain_id);

        Ok(Arc::new(SignerMiddleware::new(
            self.provider.clone(),
            self.wallet.clone().with_chain_id(chain_id),
        )))
    }
}

pub fn provider(rpc: &str) -> Result<Provider<Http>, ConfigError> {
    Provider::<Http>::try_from(rpc).map_err(|e| ConfigError::Invalid {
        var: Var::RpcUrl,
        reason: e.to_string(),
    })
}

pub fn wallet(sk: &str) -> Result<LocalWallet, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        var: Var::PrivateKey,
        reason,
    };
    // never echo the key itself
    let bytes = hex::decode(sk.strip_prefix("0x").unwrap_or(sk))
        .map_err(|_| invalid("not a hex string".to_string()))?;
    if bytes.len() != 32 {
        return Err(invalid(format!("expected 32 bytes, got {}", bytes.len())));
    }
    LocalWallet::from_bytes(&bytes).map_err(|_| invalid("not a valid secp256k1 key".to_string()))
}

/// Public address of a private key, derived offline.
pub fn wallet_address(sk: &str) -> Result<Address, ConfigError> {
    Ok(wallet(sk)?.address())
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    // first default anvil/hardhat account
    const SK: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const ADDRESS: &str = "f39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    #[test]
    fn address_is_derived_from_key() {
        let expected = Address::from_str(ADDRESS).unwrap();
        assert_eq!(wallet_address(SK).unwrap(), expected);
        assert_eq!(wallet_address(&SK[2..]).unwrap(), expected);
    }

    #[test]
    fn malformed_key_is_a_config_error() {
        for sk in ["0xnothex", "0x1234", ""] {
            match wallet(sk) {
                Err(ConfigError::Invalid { var, reason }) => {
                    assert_eq!(var, Var::PrivateKey);
                    assert!(!reason.contains(sk) || sk.is_empty());
                }
                other => panic!("unexpected {:?}", other.map(|w| w.address())),
            }
        }
    }

    #[test]
    fn zero_key_is_rejected() {
        let zero = format!("0x{}", "00".repeat(32));
        assert!(wallet(&zero).is_err());
    }

    #[test]
    fn malformed_url_is_a_config_error() {
        assert!(matches!(
            provider("not a url"),
            Err(ConfigError::Invalid {
                var: Var::RpcUrl,
                ..
            })
        ));
    }

    #[test]
    fn connection_is_built_offline() {
        // nothing listens on this port; construction must still succeed
        let conn = Connection::new("http://127.0.0.1:1", SK).unwrap();
        assert_eq!(conn.address(), Address::from_str(ADDRESS).unwrap());
    }
}
