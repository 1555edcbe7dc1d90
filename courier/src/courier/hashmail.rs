//! Mailbox courier.
//!
//! Delivery pushes the proof into the recipient's sender stream and blocks
//! for the ACK on the receiver stream. The whole handshake is one backoff
//! attempt: if any step fails, the next attempt starts over from `init`.
//! Receiving is a single blocking read with no retry loop; the caller's
//! cancellation token decides how long to wait.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::backoff::BackoffHandler;
use super::error::{CourierError, MailboxStep};
use super::events::{EventSink, Subscribers};
use super::stream_id::{derive_receiver_stream_id, derive_sender_stream_id};
use super::ProofCourier;
use crate::config::CourierConfig;
use crate::mailbox::ProofMailbox;
use crate::proof::{AnnotatedProof, Locator, Recipient};
use crate::storage::TransferDirection;

/// Courier over a [`ProofMailbox`].
pub struct MailboxCourier {
    recipient: Recipient,
    mailbox: Arc<dyn ProofMailbox>,
    backoff: BackoffHandler,
    receiver_ack_timeout: Duration,
    events: EventSink,
}

impl MailboxCourier {
    pub fn new(cfg: &CourierConfig, recipient: Recipient, mailbox: Arc<dyn ProofMailbox>) -> Self {
        Self {
            recipient,
            mailbox,
            backoff: BackoffHandler::new(cfg.backoff.clone(), Arc::clone(&cfg.transfer_log)),
            receiver_ack_timeout: cfg.receiver_ack_timeout,
            events: EventSink::new(),
        }
    }

    pub fn recipient(&self) -> &Recipient {
        &self.recipient
    }
}

#[async_trait]
impl ProofCourier for MailboxCourier {
    async fn deliver_proof(
        &self,
        cancel: &CancellationToken,
        proof: &AnnotatedProof,
    ) -> Result<(), CourierError> {
        info!(
            asset_id = %self.recipient.asset_id,
            amount = self.recipient.amount,
            locator_hash = %proof.locator.hash_hex(),
            "attempting to deliver receiver proof"
        );

        let sender_sid = derive_sender_stream_id(&self.recipient);
        let receiver_sid = derive_receiver_stream_id(&self.recipient);
        let mailbox = self.mailbox.as_ref();
        let blob = proof.blob.as_slice();
        let ack_timeout = self.receiver_ack_timeout;

        let handshake = || async move {
            info!(stream_id = %sender_sid, "creating sender mailbox");
            mailbox
                .init(cancel, &sender_sid)
                .await
                .map_err(|e| CourierError::mailbox(MailboxStep::InitSender, e))?;

            info!(stream_id = %receiver_sid, "creating receiver mailbox");
            mailbox
                .init(cancel, &receiver_sid)
                .await
                .map_err(|e| CourierError::mailbox(MailboxStep::InitReceiver, e))?;

            info!(stream_id = %sender_sid, "sending receiver proof");
            mailbox
                .write_proof(cancel, &sender_sid, blob)
                .await
                .map_err(|e| CourierError::mailbox(MailboxStep::WriteProof, e))?;

            info!(stream_id = %receiver_sid, timeout = ?ack_timeout, "waiting for receiver ACK");
            tokio::time::timeout(ack_timeout, mailbox.recv_ack(cancel, &receiver_sid))
                .await
                .map_err(|_| CourierError::AckTimeout(ack_timeout))?
                .map_err(|e| CourierError::mailbox(MailboxStep::RecvAck, e))
        };

        self.backoff
            .exec(
                cancel,
                &proof.locator,
                TransferDirection::Send,
                handshake,
                &self.events,
            )
            .await?;

        info!("received ACK from receiver, cleaning up mailboxes");
        self.mailbox
            .clean_up(cancel, &sender_sid)
            .await
            .map_err(|e| CourierError::mailbox(MailboxStep::CleanUpSender, e))?;
        self.mailbox
            .clean_up(cancel, &receiver_sid)
            .await
            .map_err(|e| CourierError::mailbox(MailboxStep::CleanUpReceiver, e))?;

        Ok(())
    }

    async fn receive_proof(
        &self,
        cancel: &CancellationToken,
        locator: Locator,
    ) -> Result<AnnotatedProof, CourierError> {
        let sender_sid = derive_sender_stream_id(&self.recipient);
        self.mailbox
            .init(cancel, &sender_sid)
            .await
            .map_err(|e| CourierError::mailbox(MailboxStep::InitSender, e))?;

        info!(stream_id = %sender_sid, "attempting to receive proof");
        let blob = self
            .mailbox
            .read_proof(cancel, &sender_sid)
            .await
            .map_err(|e| CourierError::mailbox(MailboxStep::ReadProof, e))?;

        let receiver_sid = derive_receiver_stream_id(&self.recipient);
        info!(stream_id = %receiver_sid, "sending ACK to sender");
        self.mailbox
            .init(cancel, &receiver_sid)
            .await
            .map_err(|e| CourierError::mailbox(MailboxStep::InitReceiver, e))?;
        self.mailbox
            .ack_proof(cancel, &receiver_sid)
            .await
            .map_err(|e| CourierError::mailbox(MailboxStep::SendAck, e))?;

        Ok(AnnotatedProof { locator, blob })
    }

    async fn set_subscribers(&self, subscribers: Subscribers) {
        self.events.set_subscribers(subscribers).await;
    }
}
