//! # Transfer Attempt Log
//!
//! The backoff engine needs a memory of past attempts that outlives a single
//! courier instance: two deliveries sharing the same proof lineage must not
//! both hit the courier service at full speed. This module defines that
//! memory as a trait and ships a sled-backed implementation.
//!
//! ```text
//! storage/
//! ├── mod.rs — TransferDirection, TransferLog trait
//! └── db.rs  — TransferLogDb (sled)
//! ```
//!
//! Implementations must tolerate concurrent appends and reads from many
//! couriers at once; callers add no locking of their own.

pub mod db;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::proof::Locator;

pub use db::{DbError, DbResult, TransferLogDb};

/// Which way a proof transfer attempt went, relative to the courier
/// service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferDirection {
    /// Delivering a proof to the counterparty.
    Send,
    /// Retrieving a proof from the counterparty.
    Receive,
}

impl TransferDirection {
    /// Stable single-byte tag used in storage keys.
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Send => 0x01,
            Self::Receive => 0x02,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Send => "send",
            Self::Receive => "receive",
        }
    }
}

impl fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only log of proof transfer attempts.
#[async_trait]
pub trait TransferLog: Send + Sync {
    /// Record that an attempt is about to be made, at the current time.
    async fn log_proof_transfer_attempt(
        &self,
        locator: &Locator,
        direction: TransferDirection,
    ) -> DbResult<()>;

    /// Every logged attempt timestamp for the locator and direction. No
    /// ordering is guaranteed.
    async fn query_proof_transfer_log(
        &self,
        locator: &Locator,
        direction: TransferDirection,
    ) -> DbResult<Vec<DateTime<Utc>>>;
}
