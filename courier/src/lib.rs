// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Proof Courier — Core Library
//!
//! Moves asset transfer proofs between a sender and a receiver who never
//! talk to each other directly. A third-party service sits in between: a
//! store-and-forward mailbox, or a registry that stores proofs by key. The
//! hard part isn't the proof format. It's getting bytes across a service
//! that may be down, slow, or rate limiting you, without hammering it and
//! without losing track of what was tried.
//!
//! ## Architecture
//!
//! - **courier** — The courier contract, both transports, the backoff
//!   engine, stream ids and progress events.
//! - **mailbox** — Store-and-forward mailbox abstraction plus HTTP and
//!   in-memory implementations.
//! - **registry** — Keyed proof registry abstraction plus HTTP and in-memory
//!   implementations.
//! - **proof** — The slice of the proof model couriers need: locators,
//!   recipients, links and files.
//! - **storage** — The transfer attempt log (sled).
//! - **config** — Defaults and configuration structs.
//!
//! ## Quick Tour
//!
//! ```no_run
//! # async fn tour() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use proof_courier::{CourierAddr, CourierConfig, ProofCourier, TransferLogDb};
//! # let recipient: proof_courier::Recipient = unimplemented!();
//! # let proof: proof_courier::AnnotatedProof = unimplemented!();
//!
//! let log = Arc::new(TransferLogDb::open("/var/lib/courier/transfers")?);
//! let cfg = CourierConfig::with_transfer_log(log);
//!
//! let addr = CourierAddr::parse("universerpc://universe.example.com:10029")?;
//! let courier = addr.new_courier(&cfg, recipient)?;
//!
//! let cancel = tokio_util::sync::CancellationToken::new();
//! courier.deliver_proof(&cancel, &proof).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod courier;
pub mod mailbox;
pub mod proof;
pub mod registry;
pub mod storage;

mod transport;

pub use config::{BackoffConfig, CourierConfig};
pub use courier::{
    BackoffWaitEvent, Courier, CourierAddr, CourierError, CourierEvent, CourierType,
    EventReceiver, MailboxCourier, ProofCourier, RegistryCourier, StreamId, Subscribers,
};
pub use mailbox::{HttpMailbox, MailboxError, MemoryMailbox, ProofMailbox};
pub use proof::{AnnotatedProof, Locator, Proof, ProofError, ProofFile, Recipient};
pub use registry::{HttpRegistry, MemoryRegistry, ProofRegistry, RegistryError, RegistryKey};
pub use storage::{TransferDirection, TransferLog, TransferLogDb};
