//! # Courier Events
//!
//! Couriers report progress to whoever is listening: today that is one
//! event kind, emitted each time the backoff engine is about to sleep.
//!
//! Fan-out is synchronous. [`EventSink::publish`] holds the subscriber lock
//! and awaits every subscriber's bounded channel in turn, so a subscriber
//! that stops draining its inbox stalls the retry loop of the courier it
//! listens to. Give subscribers a buffer and read it promptly.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Mutex};
use tracing::warn;

use crate::storage::TransferDirection;

/// Emitted right before the backoff engine waits between attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffWaitEvent {
    /// When the wait started.
    pub timestamp: DateTime<Utc>,
    /// How long the engine is about to wait.
    pub backoff: Duration,
    /// 1-based number of the attempt that just failed.
    pub tries_counter: u64,
    pub transfer_direction: TransferDirection,
}

impl BackoffWaitEvent {
    pub fn new(backoff: Duration, tries_counter: u64, transfer_direction: TransferDirection) -> Self {
        Self {
            timestamp: Utc::now(),
            backoff,
            tries_counter,
            transfer_direction,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Everything a courier can report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CourierEvent {
    BackoffWait(BackoffWaitEvent),
}

impl CourierEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::BackoffWait(e) => e.timestamp(),
        }
    }
}

/// A registered listener.
#[derive(Debug, Clone)]
pub struct EventReceiver {
    pub id: u64,
    sender: mpsc::Sender<CourierEvent>,
}

impl EventReceiver {
    /// Creates a receiver with an inbox of `buffer` events and returns the
    /// read half alongside it.
    pub fn new(id: u64, buffer: usize) -> (Self, mpsc::Receiver<CourierEvent>) {
        let (sender, rx) = mpsc::channel(buffer.max(1));
        (Self { id, sender }, rx)
    }
}

/// Subscribers keyed by id.
pub type Subscribers = HashMap<u64, EventReceiver>;

/// Per-courier fan-out point for [`CourierEvent`]s.
#[derive(Debug, Default)]
pub struct EventSink {
    subscribers: Mutex<Subscribers>,
}

impl EventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole subscriber set.
    pub async fn set_subscribers(&self, subscribers: Subscribers) {
        *self.subscribers.lock().await = subscribers;
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.lock().await.len()
    }

    /// Delivers `event` to every subscriber, waiting for inbox space.
    pub async fn publish(&self, event: CourierEvent) {
        let subscribers = self.subscribers.lock().await;
        for (id, receiver) in subscribers.iter() {
            if receiver.sender.send(event.clone()).await.is_err() {
                warn!(subscriber_id = id, "courier event subscriber has gone away");
            }
        }
    }
}
