//! # TransferLogDb — Persistent Transfer Attempt Log
//!
//! Every proof delivery or retrieval attempt is recorded here *before* it
//! hits the network. The backoff engine reads the log back to decide how long
//! to hold off before hammering a courier service again, so it has to
//! survive restarts. A node that crashes in a retry loop and comes straight
//! back must still respect the cool-down.
//!
//! ## Tree Layout
//!
//! | Tree                | Key                                                  | Value |
//! |---------------------|------------------------------------------------------|-------|
//! | `transfer_attempts` | `locator_hash` (32B) ‖ `dir` (1B) ‖ `micros` (8B BE) ‖ `seq` (8B BE) | empty |
//!
//! Timestamps are big-endian so a prefix scan returns attempts oldest
//! first. The trailing sequence number comes from sled's monotonic id
//! generator and keeps two attempts logged within the same microsecond from
//! overwriting each other.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sled::{Db, Tree};

use super::{TransferDirection, TransferLog};
use crate::proof::Locator;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur while reading or writing the transfer log.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("corrupt transfer log entry: {0}")]
    Corrupt(String),

    #[error("transfer log backend error: {0}")]
    Backend(String),
}

pub type DbResult<T> = Result<T, DbError>;

const TREE_TRANSFER_ATTEMPTS: &str = "transfer_attempts";

const PREFIX_LEN: usize = 33;
const KEY_LEN: usize = PREFIX_LEN + 8 + 8;

// ---------------------------------------------------------------------------
// TransferLogDb
// ---------------------------------------------------------------------------

/// sled-backed [`TransferLog`].
///
/// sled trees support concurrent reads and writes without external locking,
/// so one `TransferLogDb` can be shared by every courier in the process via
/// `Arc`.
#[derive(Debug, Clone)]
pub struct TransferLogDb {
    db: Db,
    attempts: Tree,
}

impl TransferLogDb {
    /// Open or create a transfer log at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a temporary log that is removed when dropped.
    pub fn open_temporary() -> DbResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> DbResult<Self> {
        let attempts = db.open_tree(TREE_TRANSFER_ATTEMPTS)?;
        Ok(Self { db, attempts })
    }

    /// Record an attempt at an explicit point in time.
    ///
    /// [`TransferLog::log_proof_transfer_attempt`] uses the current time;
    /// this variant exists for imports and tests.
    pub fn log_attempt_at(
        &self,
        locator: &Locator,
        direction: TransferDirection,
        at: DateTime<Utc>,
    ) -> DbResult<()> {
        let seq = self.db.generate_id()?;

        let mut key = Vec::with_capacity(KEY_LEN);
        key.extend_from_slice(&attempt_prefix(locator, direction));
        key.extend_from_slice(&at.timestamp_micros().to_be_bytes());
        key.extend_from_slice(&seq.to_be_bytes());

        self.attempts.insert(key, &[] as &[u8])?;
        Ok(())
    }

    /// All logged attempt timestamps for a locator and direction, oldest
    /// first.
    pub fn attempts(
        &self,
        locator: &Locator,
        direction: TransferDirection,
    ) -> DbResult<Vec<DateTime<Utc>>> {
        let prefix = attempt_prefix(locator, direction);

        let mut timestamps = Vec::new();
        for entry in self.attempts.scan_prefix(prefix) {
            let (key, _) = entry?;
            timestamps.push(decode_timestamp(&key)?);
        }

        Ok(timestamps)
    }

    /// Total number of attempts recorded, across all locators.
    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> DbResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

#[async_trait]
impl TransferLog for TransferLogDb {
    async fn log_proof_transfer_attempt(
        &self,
        locator: &Locator,
        direction: TransferDirection,
    ) -> DbResult<()> {
        self.log_attempt_at(locator, direction, Utc::now())
    }

    async fn query_proof_transfer_log(
        &self,
        locator: &Locator,
        direction: TransferDirection,
    ) -> DbResult<Vec<DateTime<Utc>>> {
        self.attempts(locator, direction)
    }
}

fn attempt_prefix(locator: &Locator, direction: TransferDirection) -> [u8; PREFIX_LEN] {
    let mut prefix = [0u8; PREFIX_LEN];
    prefix[..32].copy_from_slice(&locator.hash());
    prefix[32] = direction.as_byte();
    prefix
}

fn decode_timestamp(key: &[u8]) -> DbResult<DateTime<Utc>> {
    if key.len() != KEY_LEN {
        return Err(DbError::Corrupt(format!(
            "expected {} byte key, got {}",
            KEY_LEN,
            key.len()
        )));
    }

    let micros_bytes: [u8; 8] = key[PREFIX_LEN..PREFIX_LEN + 8]
        .try_into()
        .map_err(|_| DbError::Corrupt("invalid timestamp bytes".to_string()))?;
    let micros = i64::from_be_bytes(micros_bytes);

    Utc.timestamp_micros(micros)
        .single()
        .ok_or_else(|| DbError::Corrupt(format!("timestamp out of range: {}", micros)))
}
