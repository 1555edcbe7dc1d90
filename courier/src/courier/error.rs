//! Courier error taxonomy.
//!
//! Raw transport errors ([`MailboxError`], [`RegistryError`]) are wrapped
//! once with the phase they happened in, then once more by the backoff
//! engine when it gives up. Callers match on the outer variant; the chain
//! of `source()`s carries the rest.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::mailbox::MailboxError;
use crate::proof::ProofError;
use crate::registry::RegistryError;
use crate::storage::DbError;

/// The mailbox handshake step an error happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxStep {
    InitSender,
    InitReceiver,
    WriteProof,
    ReadProof,
    SendAck,
    RecvAck,
    CleanUpSender,
    CleanUpReceiver,
}

impl fmt::Display for MailboxStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InitSender => "unable to init sender stream",
            Self::InitReceiver => "unable to init receiver stream",
            Self::WriteProof => "unable to send proof to asset transfer receiver",
            Self::ReadProof => "unable to read proof from sender stream",
            Self::SendAck => "unable to send ack",
            Self::RecvAck => "unable to receive ACK from receiver",
            Self::CleanUpSender => "unable to clean up sender mailbox",
            Self::CleanUpReceiver => "unable to clean up receiver mailbox",
        };
        f.write_str(s)
    }
}

/// Errors returned by couriers and the backoff engine.
#[derive(Debug, Error)]
pub enum CourierError {
    // -- configuration ------------------------------------------------------
    #[error("backoff config not specified")]
    MissingBackoffConfig,

    #[error("invalid backoff config: {0}")]
    InvalidBackoffConfig(String),

    #[error("invalid courier address: {0}")]
    InvalidAddress(String),

    #[error("port must be specified for {scheme} courier address")]
    MissingPort { scheme: String },

    #[error("unknown courier address protocol (consider updating): {0}")]
    UnknownScheme(String),

    #[error("unable to connect to {courier} courier service: {reason}")]
    Connect { courier: &'static str, reason: String },

    // -- retry engine -------------------------------------------------------
    #[error("transfer log error")]
    TransferLog(#[from] DbError),

    #[error("proof transfer cancelled")]
    Cancelled,

    #[error("proof transfer backoff procedure failed; count retries attempted: {attempts}")]
    BackoffExhausted {
        attempts: u32,
        #[source]
        last: Box<CourierError>,
    },

    // -- transports ---------------------------------------------------------
    #[error("{step}")]
    Mailbox {
        step: MailboxStep,
        #[source]
        source: MailboxError,
    },

    #[error("timed out after {0:?} waiting for receiver ACK")]
    AckTimeout(Duration),

    #[error("registry error on proof link {link_index}")]
    Registry {
        link_index: usize,
        #[source]
        source: RegistryError,
    },

    // -- chain reconstruction -----------------------------------------------
    #[error("malformed proof chain at depth {depth}: {reason}")]
    MalformedChain { depth: usize, reason: String },

    #[error("proof chain exceeds {max} links without reaching a genesis proof")]
    ChainTooLong { max: usize },

    #[error("locator is missing {0}")]
    MissingLocatorField(&'static str),

    #[error(transparent)]
    Proof(#[from] ProofError),
}

impl CourierError {
    /// Wraps a raw mailbox error with the step it happened in. Cancellation
    /// is lifted out so it stays recognisable.
    pub(crate) fn mailbox(step: MailboxStep, source: MailboxError) -> Self {
        match source {
            MailboxError::Cancelled => Self::Cancelled,
            source => Self::Mailbox { step, source },
        }
    }

    pub(crate) fn registry(link_index: usize, source: RegistryError) -> Self {
        match source {
            RegistryError::Cancelled => Self::Cancelled,
            source => Self::Registry { link_index, source },
        }
    }

    /// True if the transfer stopped because the caller cancelled it, as
    /// opposed to running out of attempts.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Mailbox { source, .. } => matches!(source, MailboxError::Cancelled),
            Self::Registry { source, .. } => matches!(source, RegistryError::Cancelled),
            _ => false,
        }
    }

    /// True for errors the backoff engine must not retry.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::MissingBackoffConfig
                | Self::InvalidBackoffConfig(_)
                | Self::InvalidAddress(_)
                | Self::MissingPort { .. }
                | Self::UnknownScheme(_)
        )
    }
}
