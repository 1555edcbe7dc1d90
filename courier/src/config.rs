//! # Courier Configuration & Constants
//!
//! Every tunable of the proof courier lives here: backoff policy defaults,
//! timeouts, wire constants, and the configuration structs handed to couriers
//! at construction time.
//!
//! The defaults are tuned for long-lived, unattended transfers. A receiver
//! might be offline for hours; a sender should keep trying without turning
//! into a denial-of-service against the courier service.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::courier::CourierError;
use crate::storage::TransferLog;

// ---------------------------------------------------------------------------
// Address Schemes
// ---------------------------------------------------------------------------

/// Scheme of a store-and-forward mailbox courier address.
pub const HASHMAIL_SCHEME: &str = "hashmail";

/// Scheme of a proof registry (universe RPC) courier address.
pub const UNIVERSE_RPC_SCHEME: &str = "universerpc";

// ---------------------------------------------------------------------------
// Wire Constants
// ---------------------------------------------------------------------------

/// Length of a mailbox stream id in bytes (SHA-512 output).
pub const STREAM_ID_LENGTH: usize = 64;

/// Payload a receiver writes back to confirm it got the proof.
pub const ACK_MESSAGE: &[u8] = b"ack";

// ---------------------------------------------------------------------------
// Backoff Defaults
// ---------------------------------------------------------------------------

/// Attempts per backoff procedure before giving up.
pub const DEFAULT_NUM_TRIES: u32 = 2_000;

/// First wait after a failed attempt. Doubles on every further failure.
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(30);

/// Ceiling for the doubling backoff.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(5 * 60);

/// Cool-down window: a new procedure for a locator that was attempted less
/// than this long ago waits out the remainder first.
pub const DEFAULT_BACKOFF_RESET_WAIT: Duration = Duration::from_secs(10 * 60);

// ---------------------------------------------------------------------------
// Courier Defaults
// ---------------------------------------------------------------------------

/// How long a mailbox sender waits for the receiver's ACK per attempt.
/// Receivers poll on their own schedule; six hours covers a wallet that
/// only comes online a few times a day.
pub const DEFAULT_RECEIVER_ACK_TIMEOUT: Duration = Duration::from_secs(6 * 60 * 60);

/// Upper bound on links walked while rebuilding a proof file from a
/// registry. Real chains are far shorter; hitting this means the remote data
/// never reaches an issuance proof.
pub const DEFAULT_MAX_PROOF_CHAIN_LENGTH: usize = 10_000;

/// Delay between polls when a mailbox read returns "no message yet".
pub const MAILBOX_POLL_INTERVAL: Duration = Duration::from_millis(500);

// ---------------------------------------------------------------------------
// BackoffConfig
// ---------------------------------------------------------------------------

/// Retry policy for a proof transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffConfig {
    /// Skip the transfer-log based initial delay.
    pub skip_initial_delay: bool,
    /// Cool-down window used to compute the initial delay.
    pub backoff_reset_wait: Duration,
    /// Attempts before the procedure gives up.
    pub num_tries: u32,
    /// Wait after the first failure.
    pub initial_backoff: Duration,
    /// Cap for the doubling wait.
    pub max_backoff: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            skip_initial_delay: false,
            backoff_reset_wait: DEFAULT_BACKOFF_RESET_WAIT,
            num_tries: DEFAULT_NUM_TRIES,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }
}

impl BackoffConfig {
    /// Reject policies the engine cannot run.
    pub fn validate(&self) -> Result<(), CourierError> {
        if self.num_tries == 0 {
            return Err(CourierError::InvalidBackoffConfig(
                "num_tries must be at least 1".to_string(),
            ));
        }
        if self.initial_backoff > self.max_backoff {
            return Err(CourierError::InvalidBackoffConfig(format!(
                "initial_backoff ({:?}) exceeds max_backoff ({:?})",
                self.initial_backoff, self.max_backoff
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CourierConfig
// ---------------------------------------------------------------------------

/// Parameters shared by every courier type.
#[derive(Clone)]
pub struct CourierConfig {
    /// Retry policy. `None` is a configuration error, reported the first
    /// time a transfer is attempted.
    pub backoff: Option<BackoffConfig>,
    /// Maximum wait for the receiver's ACK on each mailbox delivery attempt.
    pub receiver_ack_timeout: Duration,
    /// Maximum links walked when rebuilding a proof file.
    pub max_chain_length: usize,
    /// Where transfer attempts are recorded.
    pub transfer_log: Arc<dyn TransferLog>,
}

impl CourierConfig {
    /// Configuration with every default and the given transfer log.
    pub fn with_transfer_log(transfer_log: Arc<dyn TransferLog>) -> Self {
        Self {
            backoff: Some(BackoffConfig::default()),
            receiver_ack_timeout: DEFAULT_RECEIVER_ACK_TIMEOUT,
            max_chain_length: DEFAULT_MAX_PROOF_CHAIN_LENGTH,
            transfer_log,
        }
    }
}

impl fmt::Debug for CourierConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CourierConfig")
            .field("backoff", &self.backoff)
            .field("receiver_ack_timeout", &self.receiver_ack_timeout)
            .field("max_chain_length", &self.max_chain_length)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_backoff_is_valid() {
        BackoffConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_tries_rejected() {
        let cfg = BackoffConfig {
            num_tries: 0,
            ..BackoffConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(CourierError::InvalidBackoffConfig(_))
        ));
    }

    #[test]
    fn inverted_backoff_bounds_rejected() {
        let cfg = BackoffConfig {
            initial_backoff: Duration::from_secs(10),
            max_backoff: Duration::from_secs(1),
            ..BackoffConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn timing_constants_sanity() {
        assert!(DEFAULT_INITIAL_BACKOFF <= DEFAULT_MAX_BACKOFF);
        assert!(DEFAULT_MAX_BACKOFF < DEFAULT_BACKOFF_RESET_WAIT);
        assert!(DEFAULT_MAX_PROOF_CHAIN_LENGTH > 0);
    }

    #[test]
    fn schemes_are_distinct() {
        assert_ne!(HASHMAIL_SCHEME, UNIVERSE_RPC_SCHEME);
        assert_eq!(ACK_MESSAGE, b"ack");
    }
}
