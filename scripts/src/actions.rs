use std::{io::Write, sync::Arc};

use anyhow::{anyhow, ensure, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use ethers::{
    abi::{Detokenize, Tokenize},
    contract::Contract,
    providers::Middleware,
    types::{Address, BlockNumber, H256, U256},
    utils::get_contract_address,
};

use crate::{
    artifact::Artifact,
    command_line::{DeployArgs, InteractArgs, SendArgs},
    config::Config,
    connection::{self, Connection},
    error::TransactionError,
    utils::{self, checksum, ether, Confirmation, Submission},
};

pub fn show_address(config: &Config) -> Result<()> {
    let address = connection::wallet_address(config.private_key()?)?;
    println!("Your wallet address is: {}", checksum(address));
    Ok(())
}

pub async fn deploy(config: &Config, args: &DeployArgs) -> Result<Address> {
    let mut out = std::io::stdout();
    let connection = Connection::new(config.rpc_url()?, config.private_key()?)?;
    writeln!(out, "Deploying with wallet: {}", checksum(connection.address()))?;

    let artifact = Artifact::load(&args.artifact)?;
    // a bytecode-less artifact must fail before the first request
    artifact.creation_code()?;
    writeln!(
        out,
        "Loaded {} from {}",
        artifact.name(),
        artifact.path().display()
    )?;

    let client = connection.signer().await?;
    deploy_from(client, connection.address(), &artifact, args, &mut out).await
}

/// Deploys `artifact` from `sender` and checks the contract landed at the
/// address its nonce predicts.
pub async fn deploy_from<M, W>(
    client: Arc<M>,
    sender: Address,
    artifact: &Artifact,
    args: &DeployArgs,
    out: &mut W,
) -> Result<Address>
where
    M: Middleware + 'static,
    W: Write,
{
    let nonce = client
        .get_transaction_count(sender, Some(BlockNumber::Pending.into()))
        .await
        .context("failed to fetch deployer nonce")?;
    let expected = get_contract_address(sender, nonce);

    let mut deployer = artifact
        .factory(client.clone())?
        .deploy(args.initial_value)
        .context("constructor arguments do not match the artifact")?;
    if args.send.legacy {
        deployer = deployer.legacy();
    }
    deployer.tx.set_from(sender);
    deployer.tx.set_nonce(nonce);
    args.send.apply_gas(&mut deployer.tx);

    writeln!(out, "Deploying {} contract...", artifact.name())?;
    let submission = utils::send_transaction(&*client, deployer.tx.clone())
        .await
        .context("deployment transaction was rejected")?;
    writeln!(out, "Deployment tx hash: {:?}", submission.tx_hash)?;

    writeln!(out, "Waiting for deployment confirmation...")?;
    let confirmation =
        utils::wait_for_confirmation(&*client, &submission, args.send.policy()).await?;
    let address = confirmation
        .contract_address
        .ok_or(TransactionError::NoContractAddress(submission.tx_hash))?;
    ensure!(
        address == expected,
        "contract landed at {} but nonce {} predicts {}",
        checksum(address),
        nonce,
        checksum(expected)
    );

    let code = client
        .get_code(address, None)
        .await
        .context("failed to fetch deployed code")?;
    if code.is_empty() {
        return Err(TransactionError::NoCode(address).into());
    }

    writeln!(
        out,
        "Contract deployed at: {} (block {})",
        checksum(address),
        confirmation.block_number
    )?;
    Ok(address)
}

pub async fn read_call<M, D, T>(contract: &Contract<M>, method: &str, args: T) -> Result<D>
where
    M: Middleware + 'static,
    D: Detokenize,
    T: Tokenize,
{
    contract
        .method::<_, D>(method, args)?
        .call()
        .await
        .with_context(|| format!("call to {method} failed"))
}

/// First half of a write call: returns once the node has accepted the
/// transaction. Pair with [`utils::wait_for_confirmation`].
pub async fn submit_call<M, T>(
    contract: &Contract<M>,
    method: &str,
    args: T,
    value: Option<U256>,
    send: &SendArgs,
) -> Result<Submission>
where
    M: Middleware + 'static,
    T: Tokenize,
{
    let mut call = contract.method::<_, ()>(method, args)?;
    if let Some(value) = value {
        call = call.value(value);
    }
    if send.legacy {
        call = call.legacy();
    }
    send.apply_gas(&mut call.tx);

    utils::send_transaction(&*contract.client(), call.tx)
        .await
        .with_context(|| format!("transaction to {method} was rejected"))
}

/// Submits then waits, printing the hash before the block.
async fn write_call<M, T, W>(
    contract: &Contract<M>,
    method: &str,
    args: T,
    value: Option<U256>,
    send: &SendArgs,
    out: &mut W,
) -> Result<Confirmation>
where
    M: Middleware + 'static,
    T: Tokenize,
    W: Write,
{
    let submission = submit_call(contract, method, args, value, send).await?;
    writeln!(out, "Sent {} tx hash: {:?}", method, submission.tx_hash)?;

    let confirmation =
        utils::wait_for_confirmation(&*contract.client(), &submission, send.policy()).await?;
    writeln!(out, "Tx confirmed in block {}", confirmation.block_number)?;
    Ok(confirmation)
}

pub async fn interact(config: &Config, args: &InteractArgs) -> Result<()> {
    let mut out = std::io::stdout();
    let connection = Connection::new(config.rpc_url()?, config.private_key()?)?;
    let address = config.contract_address()?;
    let artifact = Artifact::load(&args.artifact)?;
    writeln!(
        out,
        "Using wallet {} with {} at {}",
        checksum(connection.address()),
        artifact.name(),
        checksum(address)
    )?;

    let client = connection.signer().await?;
    let counter = artifact.contract(address, client);
    drive_counter(&counter, args, &mut out).await
}

/// Read, pay-and-increment, read back, then decrement.
pub async fn drive_counter<M, W>(
    counter: &Contract<M>,
    args: &InteractArgs,
    out: &mut W,
) -> Result<()>
where
    M: Middleware + 'static,
    W: Write,
{
    let current: U256 = read_call(counter, "count", ()).await?;
    writeln!(out, "Current count: {}", current)?;

    write_call(
        counter,
        "incrementWithPayment",
        (),
        Some(args.payment),
        &args.send,
        out,
    )
    .await?;
    let count: U256 = read_call(counter, "count", ()).await?;
    writeln!(out, "New count: {}", count)?;

    let total: U256 = read_call(counter, "getTotalReceived", ()).await?;
    writeln!(out, "Total received: {} wei ({} ETH)", total, ether(total))?;

    write_call(counter, "decrement", args.decrement_by, None, &args.send, out).await?;
    let count: U256 = read_call(counter, "count", ()).await?;
    writeln!(out, "Count after decrement: {}", count)?;

    Ok(())
}

pub async fn read_chain(config: &Config) -> Result<()> {
    let provider = connection::provider(config.rpc_url()?)?;
    let sample = config.sample_address()?;
    let sample_tx = config.sample_tx()?;

    query_chain(&provider, sample, sample_tx, &mut std::io::stdout()).await
}

/// Balance of `sample`, the latest block and, if given, one transaction.
pub async fn query_chain<M, W>(
    provider: &M,
    sample: Address,
    sample_tx: Option<H256>,
    out: &mut W,
) -> Result<()>
where
    M: Middleware,
    M::Error: 'static,
    W: Write,
{
    let balance = provider
        .get_balance(sample, None)
        .await
        .with_context(|| format!("failed to fetch balance of {}", checksum(sample)))?;
    writeln!(out, "Balance (wei): {}", balance)?;
    writeln!(out, "Balance (ETH): {}", ether(balance))?;

    let block = provider
        .get_block(BlockNumber::Latest)
        .await
        .context("failed to fetch latest block")?
        .ok_or_else(|| anyhow!("node returned no latest block"))?;
    let number = block
        .number
        .ok_or_else(|| anyhow!("latest block has no number"))?;
    writeln!(out, "Latest block number: {}", number)?;
    let timestamp = u64::try_from(block.timestamp)
        .ok()
        .and_then(|secs| i64::try_from(secs).ok())
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .ok_or_else(|| anyhow!("block timestamp {} out of range", block.timestamp))?;
    writeln!(
        out,
        "Timestamp: {}",
        timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    )?;

    match sample_tx {
        Some(hash) => {
            let tx = provider
                .get_transaction(hash)
                .await
                .with_context(|| format!("failed to fetch transaction {:?}", hash))?;
            match tx {
                Some(tx) => writeln!(out, "Transaction: {}", serde_json::to_string_pretty(&tx)?)?,
                None => writeln!(out, "Transaction {:?} not found", hash)?,
            }
        }
        None => writeln!(out, "No SAMPLE_TX configured, skipping tx fetch")?,
    }

    Ok(())
}
