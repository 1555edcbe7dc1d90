//! # CLI Interface
//!
//! Defines the command-line argument structure for `courier-cli` using
//! `clap` derive. Three subcommands: `deliver`, `receive` and `stream-id`.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use proof_courier::config::{
    DEFAULT_BACKOFF_RESET_WAIT, DEFAULT_INITIAL_BACKOFF, DEFAULT_MAX_BACKOFF,
    DEFAULT_MAX_PROOF_CHAIN_LENGTH, DEFAULT_NUM_TRIES, DEFAULT_RECEIVER_ACK_TIMEOUT,
};
use proof_courier::BackoffConfig;

/// Deliver and retrieve asset transfer proofs through a courier service.
#[derive(Parser, Debug)]
#[command(
    name = "courier-cli",
    about = "Deliver and retrieve asset transfer proofs through a courier service",
    version,
    propagate_version = true
)]
pub struct CourierCli {
    /// Log output format.
    #[arg(long, global = true, env = "COURIER_LOG_FORMAT", value_enum, default_value_t = LogFormatArg::Pretty)]
    pub log_format: LogFormatArg,

    /// Default log filter when `RUST_LOG` is not set.
    #[arg(long, global = true, env = "COURIER_LOG_LEVEL", default_value = "proof_courier=info,courier_cli=info")]
    pub log_level: String,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Json,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Deliver a proof file to its recipient.
    Deliver(DeliverArgs),
    /// Retrieve a proof file and write it to disk.
    Receive(ReceiveArgs),
    /// Print the mailbox stream ids derived from a script key.
    StreamId(StreamIdArgs),
}

/// Options shared by every command that talks to a courier service.
#[derive(Args, Debug, Clone)]
pub struct CourierArgs {
    /// Courier service address, e.g. `hashmail://mailbox.example.com:443` or
    /// `universerpc://universe.example.com:10029`.
    #[arg(long, env = "COURIER_ADDR")]
    pub courier_addr: String,

    /// Directory holding the transfer attempt log.
    ///
    /// Created on first use.
    #[arg(long, short = 'd', env = "COURIER_DATA_DIR", default_value = ".proof-courier")]
    pub data_dir: PathBuf,

    /// Attempts per backoff procedure.
    #[arg(long, env = "COURIER_NUM_TRIES", default_value_t = DEFAULT_NUM_TRIES)]
    pub num_tries: u32,

    /// Wait after the first failed attempt, in seconds.
    #[arg(long, env = "COURIER_INITIAL_BACKOFF_SECS", default_value_t = DEFAULT_INITIAL_BACKOFF.as_secs())]
    pub initial_backoff_secs: u64,

    /// Upper bound for the doubling wait, in seconds.
    #[arg(long, env = "COURIER_MAX_BACKOFF_SECS", default_value_t = DEFAULT_MAX_BACKOFF.as_secs())]
    pub max_backoff_secs: u64,

    /// Cool-down window after a previous attempt on the same proof, in
    /// seconds.
    #[arg(long, env = "COURIER_BACKOFF_RESET_WAIT_SECS", default_value_t = DEFAULT_BACKOFF_RESET_WAIT.as_secs())]
    pub backoff_reset_wait_secs: u64,

    /// Start immediately even if the same proof was attempted recently.
    #[arg(long, env = "COURIER_SKIP_INITIAL_DELAY")]
    pub skip_initial_delay: bool,

    /// How long a mailbox delivery waits for the receiver's ACK, in seconds.
    #[arg(long, env = "COURIER_ACK_TIMEOUT_SECS", default_value_t = DEFAULT_RECEIVER_ACK_TIMEOUT.as_secs())]
    pub ack_timeout_secs: u64,

    /// Maximum links walked when rebuilding a proof file from a registry.
    #[arg(long, env = "COURIER_MAX_CHAIN_LENGTH", default_value_t = DEFAULT_MAX_PROOF_CHAIN_LENGTH)]
    pub max_chain_length: usize,
}

impl CourierArgs {
    pub fn backoff_config(&self) -> BackoffConfig {
        BackoffConfig {
            skip_initial_delay: self.skip_initial_delay,
            backoff_reset_wait: Duration::from_secs(self.backoff_reset_wait_secs),
            num_tries: self.num_tries,
            initial_backoff: Duration::from_secs(self.initial_backoff_secs),
            max_backoff: Duration::from_secs(self.max_backoff_secs),
        }
    }
}

/// Arguments for the `deliver` subcommand.
#[derive(Args, Debug)]
pub struct DeliverArgs {
    #[command(flatten)]
    pub courier: CourierArgs,

    /// Encoded proof file to deliver. Its last proof names the recipient.
    #[arg(long, short = 'p')]
    pub proof_file: PathBuf,
}

/// Arguments for the `receive` subcommand.
#[derive(Args, Debug)]
pub struct ReceiveArgs {
    #[command(flatten)]
    pub courier: CourierArgs,

    /// Hex asset id of the expected proof.
    #[arg(long)]
    pub asset_id: String,

    /// Hex group key, for grouped assets.
    #[arg(long)]
    pub group_key: Option<String>,

    /// Hex script key the asset was sent to.
    #[arg(long)]
    pub script_key: String,

    /// Output holding the asset, as `txid:index`.
    #[arg(long)]
    pub outpoint: String,

    /// Expected amount. Only used in log lines.
    #[arg(long, default_value_t = 0)]
    pub amount: u64,

    /// Where to write the received proof file.
    #[arg(long, short = 'o')]
    pub out: PathBuf,
}

/// Arguments for the `stream-id` subcommand.
#[derive(Args, Debug)]
pub struct StreamIdArgs {
    /// Hex script key of the recipient.
    #[arg(long)]
    pub script_key: String,
}
