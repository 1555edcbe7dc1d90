//! # Backoff Engine
//!
//! Runs one proof transfer under a capped exponential backoff policy.
//!
//! ```text
//!   ┌──────────────────────────────┐
//!   │ initial delay (unless skip)  │  wait out what's left of the
//!   └──────────────┬───────────────┘  cool-down since the last attempt
//!                  ▼
//!   ┌──────────────────────────────┐
//!   │ log attempt ─► transfer()    │──── ok ───► done
//!   └──────────────┬───────────────┘
//!                  │ err
//!                  ▼
//!   publish BackoffWaitEvent, sleep(backoff), backoff = min(2·backoff, max)
//!                  │
//!                  └──► next attempt, up to num_tries
//! ```
//!
//! The wait also follows the final failure: an exhausted `exec` returns
//! only after its last backoff has elapsed.
//!
//! Every attempt is written to the transfer log before it is made. If the
//! log write fails, the attempt is not made and the whole call fails, so
//! the log never under-counts what actually hit the network.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::CourierError;
use super::events::{BackoffWaitEvent, CourierEvent, EventSink};
use crate::config::BackoffConfig;
use crate::proof::Locator;
use crate::storage::{TransferDirection, TransferLog};

/// Retry executor shared by every courier type.
#[derive(Clone)]
pub struct BackoffHandler {
    cfg: Option<BackoffConfig>,
    transfer_log: Arc<dyn TransferLog>,
}

impl BackoffHandler {
    pub fn new(cfg: Option<BackoffConfig>, transfer_log: Arc<dyn TransferLog>) -> Self {
        Self { cfg, transfer_log }
    }

    pub fn config(&self) -> Option<&BackoffConfig> {
        self.cfg.as_ref()
    }

    /// Run `transfer` until it succeeds, the attempts run out, or `cancel`
    /// fires.
    ///
    /// Errors the transfer reports as cancellation end the procedure at
    /// once. Configuration and log errors are never retried.
    pub async fn exec<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        locator: &Locator,
        direction: TransferDirection,
        mut transfer: F,
        events: &EventSink,
    ) -> Result<T, CourierError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CourierError>>,
    {
        let cfg = self.cfg.as_ref().ok_or(CourierError::MissingBackoffConfig)?;
        cfg.validate()?;

        if !cfg.skip_initial_delay {
            self.initial_delay(cancel, cfg, locator, direction).await?;
        }

        let locator_hash = locator.hash_hex();
        let mut backoff = cfg.initial_backoff;
        let mut last_err = None;

        for attempt in 1..=cfg.num_tries {
            self.transfer_log
                .log_proof_transfer_attempt(locator, direction)
                .await?;

            let err = match transfer().await {
                Ok(out) => return Ok(out),
                Err(err) => err,
            };

            if err.is_cancelled() || cancel.is_cancelled() {
                return Err(CourierError::Cancelled);
            }
            if err.is_config_error() {
                return Err(err);
            }

            warn!(
                locator_hash = %locator_hash,
                direction = %direction,
                attempt,
                error = %err,
                "proof transfer attempt failed"
            );
            last_err = Some(err);

            if backoff.is_zero() {
                continue;
            }

            events
                .publish(CourierEvent::BackoffWait(BackoffWaitEvent::new(
                    backoff,
                    u64::from(attempt),
                    direction,
                )))
                .await;

            debug!(locator_hash = %locator_hash, ?backoff, "waiting before next proof transfer attempt");
            wait(cancel, backoff).await?;

            backoff = backoff.saturating_mul(2).min(cfg.max_backoff);
        }

        Err(CourierError::BackoffExhausted {
            attempts: cfg.num_tries,
            last: Box::new(last_err.unwrap_or(CourierError::Cancelled)),
        })
    }

    /// Hold off until `backoff_reset_wait` has passed since the most recent
    /// logged attempt for this locator and direction.
    async fn initial_delay(
        &self,
        cancel: &CancellationToken,
        cfg: &BackoffConfig,
        locator: &Locator,
        direction: TransferDirection,
    ) -> Result<(), CourierError> {
        let attempts = self
            .transfer_log
            .query_proof_transfer_log(locator, direction)
            .await?;
        if attempts.is_empty() {
            return Ok(());
        }

        let elapsed = time_since_last_transfer_attempt(&attempts, Utc::now());
        let Some(remaining) = cfg.backoff_reset_wait.checked_sub(elapsed) else {
            return Ok(());
        };
        if remaining.is_zero() {
            return Ok(());
        }

        info!(
            locator_hash = %locator.hash_hex(),
            direction = %direction,
            ?elapsed,
            ?remaining,
            "recent proof transfer attempt found, delaying"
        );
        wait(cancel, remaining).await
    }
}

/// Time since the latest of `attempts`. The log is not assumed to be in
/// order. A timestamp in the future counts as "just now".
pub fn time_since_last_transfer_attempt(attempts: &[DateTime<Utc>], now: DateTime<Utc>) -> Duration {
    attempts
        .iter()
        .max()
        .and_then(|latest| (now - *latest).to_std().ok())
        .unwrap_or(Duration::ZERO)
}

/// Sleep for `duration` unless `cancel` fires first.
pub(crate) async fn wait(cancel: &CancellationToken, duration: Duration) -> Result<(), CourierError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CourierError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}
