//! # Couriers
//!
//! A courier moves proof bytes between a sender and a receiver that have no
//! direct channel, through a third-party service picked by the courier
//! address.
//!
//! ## Architecture
//!
//! ```text
//!               CourierAddr::new_courier
//!                        │
//!          ┌─────────────┴──────────────┐
//!          ▼                            ▼
//!   MailboxCourier               RegistryCourier
//!   (hashmail://)                (universerpc://)
//!          │                            │
//!          ├──── BackoffHandler ────────┤──► TransferLog
//!          │          │                 │
//!          │          └──► EventSink ───┼──► subscribers
//!          ▼                            ▼
//!     ProofMailbox                 ProofRegistry
//! ```
//!
//! Every network attempt goes through the [`BackoffHandler`], which logs it,
//! retries it and reports waits to the courier's [`EventSink`].

pub mod address;
pub mod backoff;
pub mod error;
pub mod events;
pub mod hashmail;
pub mod stream_id;
pub mod universe;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::proof::{AnnotatedProof, Locator, Recipient};

pub use address::{CourierAddr, CourierType};
pub use backoff::{time_since_last_transfer_attempt, BackoffHandler};
pub use error::{CourierError, MailboxStep};
pub use events::{BackoffWaitEvent, CourierEvent, EventReceiver, EventSink, Subscribers};
pub use hashmail::MailboxCourier;
pub use stream_id::{derive_receiver_stream_id, derive_sender_stream_id, StreamId};
pub use universe::RegistryCourier;

/// Delivers and retrieves proofs over one transport.
#[async_trait]
pub trait ProofCourier: Send + Sync {
    /// Deliver a proof to the recipient the courier was created for.
    async fn deliver_proof(
        &self,
        cancel: &CancellationToken,
        proof: &AnnotatedProof,
    ) -> Result<(), CourierError>;

    /// Retrieve the proof identified by `locator`.
    async fn receive_proof(
        &self,
        cancel: &CancellationToken,
        locator: Locator,
    ) -> Result<AnnotatedProof, CourierError>;

    /// Replace the set of event subscribers.
    async fn set_subscribers(&self, subscribers: Subscribers);
}

/// A courier handle, one variant per transport.
pub enum Courier {
    Mailbox(MailboxCourier),
    Registry(RegistryCourier),
}

impl Courier {
    pub fn courier_type(&self) -> CourierType {
        match self {
            Self::Mailbox(_) => CourierType::HashMail,
            Self::Registry(_) => CourierType::UniverseRpc,
        }
    }

    pub fn recipient(&self) -> &Recipient {
        match self {
            Self::Mailbox(c) => c.recipient(),
            Self::Registry(c) => c.recipient(),
        }
    }
}

#[async_trait]
impl ProofCourier for Courier {
    async fn deliver_proof(
        &self,
        cancel: &CancellationToken,
        proof: &AnnotatedProof,
    ) -> Result<(), CourierError> {
        match self {
            Self::Mailbox(c) => c.deliver_proof(cancel, proof).await,
            Self::Registry(c) => c.deliver_proof(cancel, proof).await,
        }
    }

    async fn receive_proof(
        &self,
        cancel: &CancellationToken,
        locator: Locator,
    ) -> Result<AnnotatedProof, CourierError> {
        match self {
            Self::Mailbox(c) => c.receive_proof(cancel, locator).await,
            Self::Registry(c) => c.receive_proof(cancel, locator).await,
        }
    }

    async fn set_subscribers(&self, subscribers: Subscribers) {
        match self {
            Self::Mailbox(c) => c.set_subscribers(subscribers).await,
            Self::Registry(c) => c.set_subscribers(subscribers).await,
        }
    }
}
