//! In-process mailbox.
//!
//! Each stream is an unbounded queue. Sender and receiver couriers sharing
//! one `MemoryMailbox` behave like two parties using a remote mailbox
//! service, minus the network.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{MailboxError, ProofMailbox};
use crate::courier::StreamId;
use crate::proof::Blob;
use crate::transport::until_cancelled;

struct Stream {
    tx: mpsc::UnboundedSender<Blob>,
    rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Blob>>>,
}

/// Mailbox backed by in-memory queues.
#[derive(Default)]
pub struct MemoryMailbox {
    streams: Mutex<HashMap<StreamId, Stream>>,
}

impl MemoryMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mailbox, failing with [`MailboxError::AlreadyExists`] if
    /// one is already there.
    pub fn create(&self, sid: &StreamId) -> Result<(), MailboxError> {
        let mut streams = self.streams.lock();
        if streams.contains_key(sid) {
            return Err(MailboxError::AlreadyExists);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        streams.insert(
            *sid,
            Stream {
                tx,
                rx: Arc::new(tokio::sync::Mutex::new(rx)),
            },
        );
        Ok(())
    }

    pub fn contains(&self, sid: &StreamId) -> bool {
        self.streams.lock().contains_key(sid)
    }

    /// Number of live mailboxes.
    pub fn len(&self) -> usize {
        self.streams.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.lock().is_empty()
    }
}

#[async_trait]
impl ProofMailbox for MemoryMailbox {
    async fn init(&self, _cancel: &CancellationToken, sid: &StreamId) -> Result<(), MailboxError> {
        match self.create(sid) {
            Ok(()) | Err(MailboxError::AlreadyExists) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn write_proof(
        &self,
        _cancel: &CancellationToken,
        sid: &StreamId,
        proof: &[u8],
    ) -> Result<(), MailboxError> {
        let streams = self.streams.lock();
        let stream = streams
            .get(sid)
            .ok_or_else(|| MailboxError::NotFound(sid.to_hex()))?;
        stream
            .tx
            .send(proof.to_vec())
            .map_err(|_| MailboxError::StreamClosed)
    }

    async fn read_proof(
        &self,
        cancel: &CancellationToken,
        sid: &StreamId,
    ) -> Result<Blob, MailboxError> {
        let rx = {
            let streams = self.streams.lock();
            let stream = streams
                .get(sid)
                .ok_or_else(|| MailboxError::NotFound(sid.to_hex()))?;
            Arc::clone(&stream.rx)
        };

        let recv = async move { rx.lock().await.recv().await };
        match until_cancelled(cancel, recv).await {
            None => Err(MailboxError::Cancelled),
            Some(None) => Err(MailboxError::StreamClosed),
            Some(Some(msg)) => Ok(msg),
        }
    }

    async fn clean_up(
        &self,
        _cancel: &CancellationToken,
        sid: &StreamId,
    ) -> Result<(), MailboxError> {
        self.streams
            .lock()
            .remove(sid)
            .map(|_| ())
            .ok_or_else(|| MailboxError::NotFound(sid.to_hex()))
    }
}
