// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Proof Courier CLI
//!
//! Entry point for the `courier-cli` binary. Parses CLI arguments,
//! initializes logging, opens the transfer attempt log and runs one courier
//! operation to completion.
//!
//! The binary supports three subcommands:
//!
//! - `deliver`   — push a proof file to its recipient
//! - `receive`   — fetch a proof file and write it to disk
//! - `stream-id` — print the mailbox stream ids for a script key
//!
//! Ctrl+C (or SIGTERM) cancels the operation in flight, including any
//! backoff wait.

mod cli;
mod logging;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use proof_courier::courier::{derive_receiver_stream_id, derive_sender_stream_id};
use proof_courier::proof::{parse_public_key, AssetId, OutPoint};
use proof_courier::{
    AnnotatedProof, Courier, CourierAddr, CourierConfig, CourierEvent, EventReceiver, Locator,
    ProofCourier, ProofFile, Recipient, Subscribers, TransferLogDb,
};

use cli::{CourierArgs, CourierCli, Commands, DeliverArgs, ReceiveArgs, StreamIdArgs};
use logging::LogFormat;

/// Subdirectory of `--data-dir` holding the sled transfer log.
const TRANSFER_LOG_DIR: &str = "transfer-log";

/// Inbox size for the CLI's own event subscriber.
const EVENT_BUFFER: usize = 16;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CourierCli::parse();
    logging::init_logging(&cli.log_level, LogFormat::from(cli.log_format));

    match cli.command {
        Commands::Deliver(args) => deliver(args).await,
        Commands::Receive(args) => receive(args).await,
        Commands::StreamId(args) => print_stream_ids(args),
    }
}

async fn deliver(args: DeliverArgs) -> Result<()> {
    let raw = std::fs::read(&args.proof_file)
        .with_context(|| format!("failed to read {}", args.proof_file.display()))?;
    let file = ProofFile::decode(&raw).context("proof file is not decodable")?;
    let last = file.last_proof().context("proof file has no links")?;

    let locator = last.locator();
    let recipient = Recipient {
        script_key: last.asset.script_key,
        asset_id: last.asset.id,
        amount: last.asset.amount,
    };
    let proof = AnnotatedProof { locator, blob: raw };

    let courier = connect(&args.courier, recipient).await?;
    let cancel = cancel_on_shutdown();

    info!(
        courier = %courier.courier_type(),
        proofs = file.num_proofs(),
        locator = %proof.locator.hash_hex(),
        "delivering proof file"
    );
    courier
        .deliver_proof(&cancel, &proof)
        .await
        .context("proof delivery failed")?;

    info!("proof delivered");
    Ok(())
}

async fn receive(args: ReceiveArgs) -> Result<()> {
    let asset_id = AssetId::from_hex(&args.asset_id).context("invalid --asset-id")?;
    let group_key = args
        .group_key
        .as_deref()
        .map(parse_public_key)
        .transpose()
        .context("invalid --group-key")?;
    let script_key = parse_public_key(&args.script_key).context("invalid --script-key")?;
    let outpoint: OutPoint = args.outpoint.parse().context("invalid --outpoint")?;

    let locator = Locator {
        asset_id: Some(asset_id),
        group_key,
        script_key,
        outpoint: Some(outpoint),
    };
    let recipient = Recipient {
        script_key,
        asset_id,
        amount: args.amount,
    };

    let courier = connect(&args.courier, recipient).await?;
    let cancel = cancel_on_shutdown();

    info!(
        courier = %courier.courier_type(),
        locator = %locator.hash_hex(),
        "receiving proof file"
    );
    let proof = courier
        .receive_proof(&cancel, locator)
        .await
        .context("proof retrieval failed")?;

    write_output(&args.out, &proof.blob)?;
    info!(out = %args.out.display(), bytes = proof.blob.len(), "proof file written");
    println!("{}", args.out.display());
    Ok(())
}

fn print_stream_ids(args: StreamIdArgs) -> Result<()> {
    let script_key = parse_public_key(&args.script_key).context("invalid --script-key")?;
    let recipient = Recipient {
        script_key,
        asset_id: AssetId([0u8; 32]),
        amount: 0,
    };

    println!("sender:   {}", derive_sender_stream_id(&recipient));
    println!("receiver: {}", derive_receiver_stream_id(&recipient));
    Ok(())
}

/// Opens the transfer log, builds the courier for `--courier-addr` and
/// attaches a subscriber that logs every backoff wait.
async fn connect(args: &CourierArgs, recipient: Recipient) -> Result<Courier> {
    std::fs::create_dir_all(&args.data_dir)
        .with_context(|| format!("failed to create {}", args.data_dir.display()))?;
    let log_path = args.data_dir.join(TRANSFER_LOG_DIR);
    let transfer_log = TransferLogDb::open(&log_path)
        .with_context(|| format!("failed to open transfer log at {}", log_path.display()))?;

    let mut cfg = CourierConfig::with_transfer_log(Arc::new(transfer_log));
    cfg.backoff = Some(args.backoff_config());
    cfg.receiver_ack_timeout = std::time::Duration::from_secs(args.ack_timeout_secs);
    cfg.max_chain_length = args.max_chain_length;

    let addr = CourierAddr::parse(&args.courier_addr)
        .with_context(|| format!("invalid courier address {:?}", args.courier_addr))?;
    let courier = addr
        .new_courier(&cfg, recipient)
        .context("failed to connect to courier service")?;

    let (receiver, rx) = EventReceiver::new(0, EVENT_BUFFER);
    let mut subscribers = Subscribers::new();
    subscribers.insert(receiver.id, receiver);
    courier.set_subscribers(subscribers).await;
    tokio::spawn(log_events(rx));

    Ok(courier)
}

async fn log_events(mut rx: mpsc::Receiver<CourierEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            CourierEvent::BackoffWait(e) => info!(
                direction = e.transfer_direction.as_str(),
                attempt = e.tries_counter,
                backoff_secs = e.backoff.as_secs_f64(),
                "waiting before next attempt"
            ),
        }
    }
}

fn write_output(path: &Path, blob: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, blob).with_context(|| format!("failed to write {}", path.display()))
}

/// Returns a token that is cancelled on the first shutdown signal.
fn cancel_on_shutdown() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received, cancelling");
        token.cancel();
    });
    cancel
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
