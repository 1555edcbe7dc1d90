//! # Proof Mailboxes
//!
//! A mailbox is a store-and-forward channel keyed by a [`StreamId`]. The
//! mailbox courier uses one stream per direction: the proof goes out on the
//! sender stream, the ACK comes back on the receiver stream.
//!
//! ```text
//!   Sender                    Mailbox service                  Receiver
//!     │  init(sid_s), init(sid_r)    │                              │
//!     │─────────────────────────────>│        init(sid_s)           │
//!     │  write(sid_s, proof)         │<─────────────────────────────│
//!     │─────────────────────────────>│  read(sid_s) ──> proof       │
//!     │                              │─────────────────────────────>│
//!     │                              │  init(sid_r), write(sid_r, "ack")
//!     │  read(sid_r) ──> "ack"       │<─────────────────────────────│
//!     │<─────────────────────────────│                              │
//!     │  cleanup(sid_s), cleanup(sid_r)                             │
//! ```
//!
//! Every operation moves exactly one message. Reads block until a message
//! arrives; callers bound them with cancellation or a timeout.

pub mod http;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::ACK_MESSAGE;
use crate::courier::StreamId;
use crate::proof::Blob;

pub use http::HttpMailbox;
pub use memory::MemoryMailbox;

/// Raw mailbox transport errors.
#[derive(Debug, Error)]
pub enum MailboxError {
    /// A mailbox for the stream already exists. [`ProofMailbox::init`]
    /// swallows this.
    #[error("mailbox already exists")]
    AlreadyExists,

    #[error("no mailbox for stream {0}")]
    NotFound(String),

    #[error("mailbox transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("mailbox service returned {status}: {message}")]
    Service { status: u16, message: String },

    #[error("expected ack, got {} ({:?})", hex::encode(.0), String::from_utf8_lossy(.0))]
    UnexpectedAck(Vec<u8>),

    #[error("mailbox stream closed before a message arrived")]
    StreamClosed,

    #[error("invalid mailbox address: {0}")]
    InvalidAddress(String),

    #[error("mailbox operation cancelled")]
    Cancelled,
}

/// Abstract store-and-forward mailbox for proofs.
#[async_trait]
pub trait ProofMailbox: Send + Sync {
    /// Create the mailbox for `sid`. Succeeds if it already exists.
    async fn init(&self, cancel: &CancellationToken, sid: &StreamId) -> Result<(), MailboxError>;

    /// Send one message carrying `proof` on `sid`.
    async fn write_proof(
        &self,
        cancel: &CancellationToken,
        sid: &StreamId,
        proof: &[u8],
    ) -> Result<(), MailboxError>;

    /// Block until one message arrives on `sid` and return it.
    async fn read_proof(&self, cancel: &CancellationToken, sid: &StreamId)
        -> Result<Blob, MailboxError>;

    /// Tear down the mailbox for `sid`. Not idempotent.
    async fn clean_up(&self, cancel: &CancellationToken, sid: &StreamId)
        -> Result<(), MailboxError>;

    /// Tell the sender the proof arrived.
    async fn ack_proof(&self, cancel: &CancellationToken, sid: &StreamId) -> Result<(), MailboxError> {
        self.write_proof(cancel, sid, ACK_MESSAGE).await
    }

    /// Wait for the receiver's ACK. Any payload other than the ACK sentinel
    /// is an error.
    async fn recv_ack(&self, cancel: &CancellationToken, sid: &StreamId) -> Result<(), MailboxError> {
        let msg = self.read_proof(cancel, sid).await?;
        check_ack(msg)
    }
}

fn check_ack(msg: Blob) -> Result<(), MailboxError> {
    if msg == ACK_MESSAGE {
        Ok(())
    } else {
        Err(MailboxError::UnexpectedAck(msg))
    }
}
