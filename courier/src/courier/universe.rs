//! # Registry Courier
//!
//! Delivers a proof file by inserting each of its links into a proof
//! registry, and receives one by walking the links back from the newest.
//!
//! ## Chain Reconstruction
//!
//! ```text
//!   locator(n) ──query──► link n ──prev id──► locator(n-1) ──query──► ...
//!                                                     ... ──► link 0 (genesis)
//!
//!   collected: [n, n-1, ..., 0]  ──reverse──►  file: [0, 1, ..., n]
//! ```
//!
//! Each link names the output it spent through its asset's primary previous
//! witness. The walk follows those references until it reaches an issuance
//! proof, then rebuilds the file in canonical order. The walk is bounded by
//! `max_chain_length`; data that never reaches a genesis proof fails with
//! [`CourierError::ChainTooLong`] instead of looping.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::backoff::BackoffHandler;
use super::error::CourierError;
use super::events::{EventSink, Subscribers};
use super::ProofCourier;
use crate::config::CourierConfig;
use crate::proof::{public_key_from_slice, AnnotatedProof, Locator, Proof, ProofFile, Recipient};
use crate::registry::{ProofRegistry, RegistryKey};
use crate::storage::TransferDirection;

/// Courier over a [`ProofRegistry`].
pub struct RegistryCourier {
    recipient: Recipient,
    registry: Arc<dyn ProofRegistry>,
    /// Per-link delivery. Each link is throttled by its own backoff, so the
    /// transfer-log initial delay is always skipped here.
    send_backoff: BackoffHandler,
    receive_backoff: BackoffHandler,
    max_chain_length: usize,
    events: EventSink,
}

impl RegistryCourier {
    pub fn new(cfg: &CourierConfig, recipient: Recipient, registry: Arc<dyn ProofRegistry>) -> Self {
        let send_cfg = cfg.backoff.clone().map(|mut b| {
            b.skip_initial_delay = true;
            b
        });

        Self {
            recipient,
            registry,
            send_backoff: BackoffHandler::new(send_cfg, Arc::clone(&cfg.transfer_log)),
            receive_backoff: BackoffHandler::new(cfg.backoff.clone(), Arc::clone(&cfg.transfer_log)),
            max_chain_length: cfg.max_chain_length,
            events: EventSink::new(),
        }
    }

    pub fn recipient(&self) -> &Recipient {
        &self.recipient
    }

    async fn fetch_link(
        &self,
        cancel: &CancellationToken,
        locator: &Locator,
        depth: usize,
    ) -> Result<Proof, CourierError> {
        let key = RegistryKey::from_locator(locator)?;
        let key = &key;
        let registry = self.registry.as_ref();

        let blob = self
            .receive_backoff
            .exec(
                cancel,
                locator,
                TransferDirection::Receive,
                || async move {
                    registry
                        .query_proof(cancel, key)
                        .await
                        .map_err(|e| CourierError::registry(depth, e))
                },
                &self.events,
            )
            .await?;

        Proof::decode(&blob).map_err(|e| CourierError::MalformedChain {
            depth,
            reason: format!("unable to decode proof link: {}", e),
        })
    }
}

/// Locator of the link `proof` spent from. The group key never changes
/// along a chain, so it is carried over from `current`.
fn previous_locator(proof: &Proof, current: &Locator, depth: usize) -> Result<Locator, CourierError> {
    let prev = proof
        .asset
        .primary_prev_id()
        .map_err(|e| CourierError::MalformedChain {
            depth,
            reason: e.to_string(),
        })?;
    let script_key =
        public_key_from_slice(&prev.script_key).map_err(|e| CourierError::MalformedChain {
            depth,
            reason: format!("failed to parse previous script key: {}", e),
        })?;

    Ok(Locator {
        asset_id: Some(prev.id),
        group_key: current.group_key,
        script_key,
        outpoint: Some(prev.outpoint),
    })
}

#[async_trait]
impl ProofCourier for RegistryCourier {
    async fn deliver_proof(
        &self,
        cancel: &CancellationToken,
        proof: &AnnotatedProof,
    ) -> Result<(), CourierError> {
        let file = ProofFile::decode(&proof.blob)?;

        info!(
            num_proofs = file.num_proofs(),
            asset_id = %self.recipient.asset_id,
            amount = self.recipient.amount,
            "delivering proof file to registry"
        );

        let registry = self.registry.as_ref();
        for (index, link) in file.proofs().iter().enumerate() {
            let key = RegistryKey::for_proof(link);
            let encoded = link.encode()?;
            let locator = link.locator();

            let key = &key;
            let encoded = encoded.as_slice();
            self.send_backoff
                .exec(
                    cancel,
                    &locator,
                    TransferDirection::Send,
                    || async move {
                        registry
                            .insert_proof(cancel, key, encoded)
                            .await
                            .map_err(|e| CourierError::registry(index, e))
                    },
                    &self.events,
                )
                .await?;

            debug!(index, key = %key, "proof link delivered");
        }

        Ok(())
    }

    async fn receive_proof(
        &self,
        cancel: &CancellationToken,
        locator: Locator,
    ) -> Result<AnnotatedProof, CourierError> {
        let mut rev_proofs: Vec<Proof> = Vec::new();
        let mut current = locator.clone();

        loop {
            if rev_proofs.len() >= self.max_chain_length {
                return Err(CourierError::ChainTooLong {
                    max: self.max_chain_length,
                });
            }

            let depth = rev_proofs.len();
            let link = self.fetch_link(cancel, &current, depth).await?;
            debug!(depth, locator_hash = %current.hash_hex(), "retrieved proof link");

            if link.asset.is_genesis_asset() {
                rev_proofs.push(link);
                break;
            }

            current = previous_locator(&link, &current, depth)?;
            rev_proofs.push(link);
        }

        info!(num_proofs = rev_proofs.len(), "reconstructed proof file from registry");

        let mut file = ProofFile::new();
        for (depth, link) in rev_proofs.into_iter().rev().enumerate() {
            file.append_proof(link).map_err(|e| CourierError::MalformedChain {
                depth,
                reason: format!("error appending proof to proof file: {}", e),
            })?;
        }

        Ok(AnnotatedProof {
            locator,
            blob: file.encode()?,
        })
    }

    async fn set_subscribers(&self, subscribers: Subscribers) {
        self.events.set_subscribers(subscribers).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proof::{Asset, AssetId, OutPoint, PrevId};
    use ed25519_dalek::SigningKey;

    fn key(seed: u8) -> ed25519_dalek::VerifyingKey {
        SigningKey::from_bytes(&[seed; 32]).verifying_key()
    }

    fn genesis() -> Proof {
        Proof::new(
            Asset {
                id: AssetId([1; 32]),
                group_key: None,
                script_key: key(1),
                amount: 100,
                prev_witnesses: Vec::new(),
            },
            OutPoint::new([10; 32], 0),
            b"genesis".to_vec(),
        )
    }

    fn spend(prev: &Proof, seed: u8) -> Proof {
        Proof::new(
            Asset {
                id: prev.asset.id,
                group_key: prev.asset.group_key,
                script_key: key(seed),
                amount: prev.asset.amount,
                prev_witnesses: vec![PrevId::spending(prev)],
            },
            OutPoint::new([seed; 32], 1),
            vec![seed],
        )
    }

    #[test]
    fn previous_locator_follows_primary_witness() {
        let g = genesis();
        let next = spend(&g, 2);
        let current = next.locator();

        let prev = previous_locator(&next, &current, 0).unwrap();
        assert_eq!(prev, g.locator());
    }

    #[test]
    fn previous_locator_rejects_bad_key_material() {
        let g = genesis();
        let mut next = spend(&g, 2);
        next.asset.prev_witnesses[0].script_key = vec![0u8; 31];

        let err = previous_locator(&next, &next.locator(), 3).unwrap_err();
        assert!(matches!(err, CourierError::MalformedChain { depth: 3, .. }));
    }

    #[test]
    fn previous_locator_keeps_group_key() {
        let g = genesis();
        let next = spend(&g, 2);
        let mut current = next.locator();
        current.group_key = Some(key(9));

        let prev = previous_locator(&next, &current, 0).unwrap();
        assert_eq!(prev.group_key, Some(key(9)));
    }
}
