use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use ethers::{
    types::{transaction::eip2718::TypedTransaction, U256},
    utils::parse_ether,
};

use crate::{
    actions,
    artifact::DEFAULT_ARTIFACT,
    config::{Config, Var},
    utils::WaitPolicy,
};

/// Deploy and drive the Counter contract over JSON-RPC.
///
/// Endpoint and keys come from the environment (or a `.env` file):
/// RPC_URL, PRIVATE_KEY, CONTRACT_ADDRESS, SAMPLE_ADDRESS, SAMPLE_TX.
#[derive(Debug, Parser)]
#[clap(name = "counter", version)]
pub struct CommandLine {
    /// Read variables from this file instead of ./.env
    #[clap(long, global = true)]
    env_file: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the address derived from PRIVATE_KEY
    ShowAddress,
    /// Deploy a new Counter instance
    Deploy(DeployArgs),
    /// Read and update the Counter at CONTRACT_ADDRESS
    Interact(InteractArgs),
    /// Query balance, latest block and an optional transaction
    ReadChain,
}

#[derive(Debug, Args)]
pub struct DeployArgs {
    #[clap(long, default_value = DEFAULT_ARTIFACT)]
    pub artifact: PathBuf,

    /// Constructor argument
    #[clap(long, default_value = "0", value_parser = parse_u256)]
    pub initial_value: U256,

    #[clap(flatten)]
    pub send: SendArgs,
}

#[derive(Debug, Args)]
pub struct InteractArgs {
    #[clap(long, default_value = DEFAULT_ARTIFACT)]
    pub artifact: PathBuf,

    /// Ether sent with incrementWithPayment
    #[clap(long, default_value = "0.01", value_parser = parse_amount)]
    pub payment: U256,

    #[clap(long, default_value = "1", value_parser = parse_u256)]
    pub decrement_by: U256,

    #[clap(flatten)]
    pub send: SendArgs,
}

#[derive(Debug, Args)]
pub struct SendArgs {
    /// Seconds to wait for a transaction to be mined
    #[clap(long, default_value_t = 120)]
    pub timeout: u64,

    /// Milliseconds between receipt polls
    #[clap(long, default_value_t = 2000)]
    pub poll_interval: u64,

    /// Send pre-EIP-1559 transactions
    #[clap(long)]
    pub legacy: bool,

    /// Gas limit instead of the node's estimate
    #[clap(long, value_parser = parse_u256)]
    pub gas_limit: Option<U256>,

    /// Gas price in wei instead of the node's suggestion
    #[clap(long, value_parser = parse_u256)]
    pub gas_price: Option<U256>,
}

impl SendArgs {
    pub fn policy(&self) -> WaitPolicy {
        WaitPolicy {
            timeout: Duration::from_secs(self.timeout),
            interval: Duration::from_millis(self.poll_interval),
        }
    }

    pub fn apply_gas(&self, tx: &mut TypedTransaction) {
        if let Some(gas) = self.gas_limit {
            tx.set_gas(gas);
        }
        if let Some(price) = self.gas_price {
            tx.set_gas_price(price);
        }
    }
}

fn parse_u256(s: &str) -> Result<U256, String> {
    U256::from_dec_str(s).map_err(|e| format!("{s:?} is not a decimal integer: {e}"))
}

fn parse_amount(s: &str) -> Result<U256, String> {
    parse_ether(s).map_err(|e| format!("{s:?} is not an ether amount: {e}"))
}

impl Command {
    /// Variables that must be set before the command starts.
    pub fn required(&self) -> &'static [Var] {
        match self {
            Command::ShowAddress => &[Var::PrivateKey],
            Command::Deploy(_) => &[Var::RpcUrl, Var::PrivateKey],
            Command::Interact(_) => &[Var::RpcUrl, Var::PrivateKey, Var::ContractAddress],
            Command::ReadChain => &[Var::RpcUrl, Var::SampleAddress],
        }
    }

    pub async fn run(&self, config: &Config) -> Result<()> {
        match self {
            Command::ShowAddress => actions::show_address(config),
            Command::Deploy(args) => actions::deploy(config, args).await.map(|_| ()),
            Command::Interact(args) => actions::interact(config, args).await,
            Command::ReadChain => actions::read_chain(config).await,
        }
    }
}

impl CommandLine {
    pub async fn execute(self) -> Result<()> {
        match &self.env_file {
            Some(path) => {
                dotenvy::from_path(path)
                    .with_context(|| format!("failed to load {}", path.display()))?;
            }
            None => match dotenvy::from_path(".env") {
                Ok(()) => {}
                Err(e) if e.not_found() => log::debug!("no .env in working directory"),
                Err(e) => return Err(e).context("failed to load .env"),
            },
        }

        let config = Config::load(self.command.required())?;
        self.command.run(&config).await
    }
}
