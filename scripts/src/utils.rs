use std::time::Duration;

use anyhow::Result;
use ethers::{
    providers::Middleware,
    types::{transaction::eip2718::TypedTransaction, Address, TransactionReceipt, H256, U256, U64},
    utils::{format_ether, to_checksum},
};
use tokio::time::{sleep, Instant};

use crate::error::TransactionError;

/// A transaction the node has accepted but not necessarily mined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submission {
    pub tx_hash: H256,
}

/// A mined, successful transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub tx_hash: H256,
    pub block_number: U64,
    pub gas_used: Option<U256>,
    pub contract_address: Option<Address>,
}

impl Confirmation {
    /// `None` while the receipt is not yet part of a block.
    pub fn from_receipt(receipt: TransactionReceipt) -> Result<Option<Self>, TransactionError> {
        let Some(block_number) = receipt.block_number else {
            return Ok(None);
        };
        if receipt.status == Some(U64::zero()) {
            return Err(TransactionError::Reverted(receipt.transaction_hash));
        }
        Ok(Some(Self {
            tx_hash: receipt.transaction_hash,
            block_number,
            gas_used: receipt.gas_used,
            contract_address: receipt.contract_address,
        }))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            interval: Duration::from_secs(2),
        }
    }
}

/// Signs (through the middleware) and submits `tx`, returning as soon as the
/// node hands back a hash.
pub async fn send_transaction<M>(client: &M, tx: TypedTransaction) -> Result<Submission>
where
    M: Middleware,
    M::Error: 'static,
{
    let tx_hash = client.send_transaction(tx, None).await?.tx_hash();
    log::info!("transaction hash:{:?}", tx_hash);
    Ok(Submission { tx_hash })
}

/// Polls for the receipt of `submission` until it is mined or `policy.timeout`
/// elapses.
pub async fn wait_for_confirmation<M>(
    client: &M,
    submission: &Submission,
    policy: WaitPolicy,
) -> Result<Confirmation>
where
    M: Middleware,
    M::Error: 'static,
{
    let deadline = Instant::now() + policy.timeout;
    loop {
        let receipt = client.get_transaction_receipt(submission.tx_hash).await?;
        if let Some(receipt) = receipt {
            if let Some(confirmation) = Confirmation::from_receipt(receipt)? {
                log::info!(
                    "transaction {:?} mined in block {} (gas used {:?})",
                    confirmation.tx_hash,
                    confirmation.block_number,
                    confirmation.gas_used
                );
                return Ok(confirmation);
            }
        }

        if Instant::now() >= deadline {
            return Err(TransactionError::Timeout {
                hash: submission.tx_hash,
                secs: policy.timeout.as_secs(),
            }
            .into());
        }
        log::debug!("waiting for {:?}", submission.tx_hash);
        sleep(policy.interval).await;
    }
}

/// Human-readable ether amount without trailing zeros, e.g. `0.01`.
pub fn ether(wei: U256) -> String {
    let formatted = format_ether(wei);
    match formatted.split_once('.') {
        Some((whole, frac)) => {
            let frac = frac.trim_end_matches('0');
            if frac.is_empty() {
                whole.to_string()
            } else {
                format!("{whole}.{frac}")
            }
        }
        None => formatted,
    }
}

pub fn checksum(address: Address) -> String {
    to_checksum(&address, None)
}
