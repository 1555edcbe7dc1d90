//! End-to-end courier tests over the in-memory transports.
//!
//! Each test builds its own proof chain, transfer log and transport, then
//! drives a sender and a receiver courier against them the way two wallets
//! would. No shared state between tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ed25519_dalek::{SigningKey, VerifyingKey};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use proof_courier::courier::{derive_receiver_stream_id, derive_sender_stream_id};
use proof_courier::proof::{Asset, AssetId, OutPoint, PrevId};
use proof_courier::{
    AnnotatedProof, BackoffConfig, Courier, CourierConfig, CourierError, CourierEvent,
    EventReceiver, MailboxCourier, MemoryMailbox, MemoryRegistry, Proof, ProofCourier, ProofFile,
    ProofRegistry, Recipient, RegistryCourier, RegistryError, RegistryKey, Subscribers,
    TransferDirection, TransferLog, TransferLogDb,
};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn key(seed: u8) -> VerifyingKey {
    SigningKey::from_bytes(&[seed; 32]).verifying_key()
}

fn genesis(group_key: Option<VerifyingKey>) -> Proof {
    Proof::new(
        Asset {
            id: AssetId([0x42; 32]),
            group_key,
            script_key: key(1),
            amount: 1_000,
            prev_witnesses: Vec::new(),
        },
        OutPoint::new([1; 32], 0),
        b"issuance".to_vec(),
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
        OutPoint::new([seed; 32], u32::from(seed)),
        format!("transfer #{}", seed).into_bytes(),
    )
}

/// A valid file of `links` proofs, genesis first.
fn chain(links: u8, group_key: Option<VerifyingKey>) -> ProofFile {
    let mut file = ProofFile::new();
    let mut last = genesis(group_key);
    file.append_proof(last.clone()).unwrap();
    for seed in 2..=links {
        let next = spend(&last, seed);
        file.append_proof(next.clone()).unwrap();
        last = next;
    }
    file
}

fn recipient_of(file: &ProofFile) -> Recipient {
    let last = file.last_proof().unwrap();
    Recipient {
        script_key: last.asset.script_key,
        asset_id: last.asset.id,
        amount: last.asset.amount,
    }
}

fn config(num_tries: u32, backoff: Duration) -> CourierConfig {
    let mut cfg = CourierConfig::with_transfer_log(Arc::new(TransferLogDb::open_temporary().unwrap()));
    cfg.backoff = Some(BackoffConfig {
        skip_initial_delay: false,
        backoff_reset_wait: Duration::from_secs(600),
        num_tries,
        initial_backoff: backoff,
        max_backoff: backoff * 4,
    });
    cfg
}

fn annotated(file: &ProofFile) -> AnnotatedProof {
    AnnotatedProof {
        locator: file.last_proof().unwrap().locator(),
        blob: file.encode().unwrap(),
    }
}

// ---------------------------------------------------------------------------
// Mailbox Courier
// ---------------------------------------------------------------------------

#[tokio::test]
async fn mailbox_courier_round_trip() {
    let file = chain(3, None);
    let recipient = recipient_of(&file);
    let mailbox = Arc::new(MemoryMailbox::new());
    let cfg = config(3, Duration::from_millis(10));

    let sender = Courier::Mailbox(MailboxCourier::new(&cfg, recipient.clone(), mailbox.clone()));
    let receiver = Courier::Mailbox(MailboxCourier::new(&cfg, recipient.clone(), mailbox.clone()));
    let cancel = CancellationToken::new();

    let proof = annotated(&file);
    let receiving = receiver.receive_proof(&cancel, proof.locator.clone());
    let delivering = sender.deliver_proof(&cancel, &proof);
    let (received, delivered) = tokio::join!(receiving, delivering);

    delivered.unwrap();
    let received = received.unwrap();
    assert_eq!(received, proof);
    assert_eq!(ProofFile::decode(&received.blob).unwrap(), file);

    assert!(!mailbox.contains(&derive_sender_stream_id(&recipient)));
    assert!(!mailbox.contains(&derive_receiver_stream_id(&recipient)));
}

#[tokio::test]
async fn mailbox_delivery_logs_one_attempt() {
    let file = chain(1, None);
    let recipient = recipient_of(&file);
    let mailbox = Arc::new(MemoryMailbox::new());
    let log = Arc::new(TransferLogDb::open_temporary().unwrap());
    let mut cfg = config(3, Duration::from_millis(10));
    cfg.transfer_log = log.clone();

    let sender = MailboxCourier::new(&cfg, recipient.clone(), mailbox.clone());
    let receiver = MailboxCourier::new(&cfg, recipient, mailbox);
    let cancel = CancellationToken::new();
    let proof = annotated(&file);

    let (delivered, received) = tokio::join!(
        sender.deliver_proof(&cancel, &proof),
        receiver.receive_proof(&cancel, proof.locator.clone()),
    );
    delivered.unwrap();
    received.unwrap();

    let sends = log
        .query_proof_transfer_log(&proof.locator, TransferDirection::Send)
        .await
        .unwrap();
    assert_eq!(sends.len(), 1);
    let receives = log
        .query_proof_transfer_log(&proof.locator, TransferDirection::Receive)
        .await
        .unwrap();
    assert!(receives.is_empty(), "mailbox receive is not retried or logged");
}

// ---------------------------------------------------------------------------
// Registry Courier
// ---------------------------------------------------------------------------

#[tokio::test]
async fn registry_reconstructs_chain_in_canonical_order() {
    for links in [1u8, 2, 6] {
        let file = chain(links, None);
        let recipient = recipient_of(&file);
        let registry = Arc::new(MemoryRegistry::new());
        let cfg = config(2, Duration::ZERO);

        let sender = RegistryCourier::new(&cfg, recipient.clone(), registry.clone());
        let receiver = RegistryCourier::new(&cfg, recipient, registry.clone());
        let cancel = CancellationToken::new();

        let proof = annotated(&file);
        sender.deliver_proof(&cancel, &proof).await.unwrap();
        assert_eq!(registry.len(), usize::from(links));

        let received = receiver
            .receive_proof(&cancel, proof.locator.clone())
            .await
            .unwrap();
        assert_eq!(received.locator, proof.locator);

        let rebuilt = ProofFile::decode(&received.blob).unwrap();
        assert_eq!(rebuilt.num_proofs(), usize::from(links));
        assert_eq!(rebuilt.proofs(), file.proofs());
    }
}

#[tokio::test]
async fn registry_chain_with_group_key() {
    let file = chain(4, Some(key(77)));
    let recipient = recipient_of(&file);
    let registry = Arc::new(MemoryRegistry::new());
    let cfg = config(2, Duration::ZERO);
    let courier = Courier::Registry(RegistryCourier::new(&cfg, recipient, registry.clone()));
    let cancel = CancellationToken::new();

    let proof = annotated(&file);
    courier.deliver_proof(&cancel, &proof).await.unwrap();

    let received = courier
        .receive_proof(&cancel, proof.locator.clone())
        .await
        .unwrap();
    assert_eq!(ProofFile::decode(&received.blob).unwrap(), file);
}

#[tokio::test]
async fn missing_link_exhausts_retries() {
    let file = chain(3, None);
    let registry = Arc::new(MemoryRegistry::new());
    let cfg = config(3, Duration::ZERO);
    let courier = RegistryCourier::new(&cfg, recipient_of(&file), registry.clone());
    let cancel = CancellationToken::new();

    courier.deliver_proof(&cancel, &annotated(&file)).await.unwrap();
    // Knock out the middle link.
    registry.remove(&RegistryKey::for_proof(file.proof_at(1).unwrap()));

    let err = courier
        .receive_proof(&cancel, annotated(&file).locator)
        .await
        .unwrap_err();

    match err {
        CourierError::BackoffExhausted { attempts, last } => {
            assert_eq!(attempts, 3);
            assert!(matches!(
                *last,
                CourierError::Registry {
                    link_index: 1,
                    source: RegistryError::NotFound(_)
                }
            ));
        }
        other => panic!("expected exhaustion, got {other}"),
    }
}

#[tokio::test]
async fn malformed_predecessor_key_aborts_reconstruction() {
    let file = chain(3, None);
    let registry = Arc::new(MemoryRegistry::new());
    let cfg = config(1, Duration::ZERO);
    let courier = RegistryCourier::new(&cfg, recipient_of(&file), registry.clone());
    let cancel = CancellationToken::new();

    courier.deliver_proof(&cancel, &annotated(&file)).await.unwrap();

    let mut broken = file.last_proof().unwrap().clone();
    broken.asset.prev_witnesses[0].script_key = vec![0xde, 0xad];
    registry.put_raw(&RegistryKey::for_proof(&broken), broken.encode().unwrap());

    let err = courier
        .receive_proof(&cancel, broken.locator())
        .await
        .unwrap_err();
    assert!(matches!(err, CourierError::MalformedChain { depth: 0, .. }));
}

#[tokio::test]
async fn undecodable_link_aborts_reconstruction() {
    let file = chain(2, None);
    let registry = Arc::new(MemoryRegistry::new());
    let cfg = config(1, Duration::ZERO);
    let courier = RegistryCourier::new(&cfg, recipient_of(&file), registry.clone());
    let cancel = CancellationToken::new();

    courier.deliver_proof(&cancel, &annotated(&file)).await.unwrap();
    registry.put_raw(
        &RegistryKey::for_proof(file.proof_at(0).unwrap()),
        b"definitely not a proof".to_vec(),
    );

    let err = courier
        .receive_proof(&cancel, annotated(&file).locator)
        .await
        .unwrap_err();
    assert!(matches!(err, CourierError::MalformedChain { depth: 1, .. }));
}

#[tokio::test]
async fn chain_longer_than_limit_is_rejected() {
    let file = chain(5, None);
    let registry = Arc::new(MemoryRegistry::new());
    let mut cfg = config(1, Duration::ZERO);
    cfg.max_chain_length = 3;
    let courier = RegistryCourier::new(&cfg, recipient_of(&file), registry);
    let cancel = CancellationToken::new();

    courier.deliver_proof(&cancel, &annotated(&file)).await.unwrap();
    let err = courier
        .receive_proof(&cancel, annotated(&file).locator)
        .await
        .unwrap_err();
    assert!(matches!(err, CourierError::ChainTooLong { max: 3 }));
}

#[tokio::test]
async fn self_referencing_link_does_not_loop_forever() {
    let g = genesis(None);
    let mut looped = spend(&g, 2);
    // Point the link at its own output.
    looped.asset.prev_witnesses[0] = PrevId::spending(&looped);

    let registry = Arc::new(MemoryRegistry::new());
    registry.put_raw(&RegistryKey::for_proof(&looped), looped.encode().unwrap());

    let mut cfg = config(1, Duration::ZERO);
    cfg.max_chain_length = 50;
    if let Some(backoff) = cfg.backoff.as_mut() {
        backoff.skip_initial_delay = true;
    }
    let recipient = Recipient {
        script_key: looped.asset.script_key,
        asset_id: looped.asset.id,
        amount: looped.asset.amount,
    };
    let courier = RegistryCourier::new(&cfg, recipient, registry);

    let err = courier
        .receive_proof(&CancellationToken::new(), looped.locator())
        .await
        .unwrap_err();
    assert!(matches!(err, CourierError::ChainTooLong { max: 50 }));
}

#[tokio::test]
async fn invalid_proof_file_is_rejected_before_any_insert() {
    let registry = Arc::new(MemoryRegistry::new());
    let cfg = config(1, Duration::ZERO);
    let courier = RegistryCourier::new(&cfg, recipient_of(&chain(1, None)), registry.clone());

    let proof = AnnotatedProof {
        locator: genesis(None).locator(),
        blob: b"garbage".to_vec(),
    };
    let err = courier
        .deliver_proof(&CancellationToken::new(), &proof)
        .await
        .unwrap_err();
    assert!(matches!(err, CourierError::Proof(_)));
    assert!(registry.is_empty());
}

// ---------------------------------------------------------------------------
// Backoff Behaviour Through Couriers
// ---------------------------------------------------------------------------

/// Registry whose first `failures` inserts fail.
/// Fails the first `failures` inserts, and every insert of `rejected`.
struct FlakyRegistry {
    inner: MemoryRegistry,
    failures: u32,
    rejected: Option<RegistryKey>,
    calls: AtomicU32,
}

impl FlakyRegistry {
    fn new(failures: u32, rejected: Option<RegistryKey>) -> Self {
        Self {
            inner: MemoryRegistry::new(),
            failures,
            rejected,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl ProofRegistry for FlakyRegistry {
    async fn insert_proof(
        &self,
        cancel: &CancellationToken,
        key: &RegistryKey,
        proof: &[u8],
    ) -> Result<(), RegistryError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures || self.rejected.as_ref() == Some(key) {
            return Err(RegistryError::Service {
                status: 503,
                message: "try again later".into(),
            });
        }
        self.inner.insert_proof(cancel, key, proof).await
    }

    async fn query_proof(
        &self,
        cancel: &CancellationToken,
        key: &RegistryKey,
    ) -> Result<Vec<u8>, RegistryError> {
        self.inner.query_proof(cancel, key).await
    }
}

#[tokio::test(start_paused = true)]
async fn retries_are_reported_to_subscribers() {
    let file = chain(2, None);
    let registry = Arc::new(FlakyRegistry::new(3, None));
    let cfg = config(10, Duration::from_secs(1));
    let courier = RegistryCourier::new(&cfg, recipient_of(&file), registry.clone());

    let (receiver, mut events) = EventReceiver::new(7, 16);
    let mut subscribers = Subscribers::new();
    subscribers.insert(7, receiver);
    courier.set_subscribers(subscribers).await;

    courier
        .deliver_proof(&CancellationToken::new(), &annotated(&file))
        .await
        .unwrap();
    assert_eq!(registry.inner.len(), 2);

    let mut waits = Vec::new();
    while let Ok(CourierEvent::BackoffWait(e)) = events.try_recv() {
        assert_eq!(e.transfer_direction, TransferDirection::Send);
        waits.push((e.tries_counter, e.backoff.as_secs()));
    }
    assert_eq!(waits, vec![(1, 1), (2, 2), (3, 4)]);
}

#[tokio::test]
async fn failed_link_aborts_delivery_without_rollback() {
    let file = chain(3, None);
    let middle = RegistryKey::for_proof(file.proof_at(1).unwrap());
    let registry = Arc::new(FlakyRegistry::new(0, Some(middle.clone())));
    let cfg = config(1, Duration::ZERO);
    let courier = RegistryCourier::new(&cfg, recipient_of(&file), registry.clone());

    let err = courier
        .deliver_proof(&CancellationToken::new(), &annotated(&file))
        .await
        .unwrap_err();
    match err {
        CourierError::BackoffExhausted { attempts, last } => {
            assert_eq!(attempts, 1);
            assert!(matches!(
                *last,
                CourierError::Registry {
                    link_index: 1,
                    source: RegistryError::Service { status: 503, .. },
                }
            ));
        }
        other => panic!("unexpected error: {other}"),
    }

    assert!(registry
        .inner
        .contains(&RegistryKey::for_proof(file.proof_at(0).unwrap())));
    assert!(!registry.inner.contains(&middle));
    assert!(!registry
        .inner
        .contains(&RegistryKey::for_proof(file.proof_at(2).unwrap())));
    assert_eq!(registry.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn registry_delivery_skips_initial_delay() {
    let file = chain(3, None);
    let registry = Arc::new(MemoryRegistry::new());
    // Shared log with a ten-minute cool-down: a second delivery of the same
    // lineage would wait if the initial delay applied.
    let cfg = config(1, Duration::ZERO);
    let courier = RegistryCourier::new(&cfg, recipient_of(&file), registry);
    let cancel = CancellationToken::new();

    courier.deliver_proof(&cancel, &annotated(&file)).await.unwrap();
    let start = Instant::now();
    courier.deliver_proof(&cancel, &annotated(&file)).await.unwrap();
    assert_eq!(start.elapsed(), Duration::ZERO);

    assert!(!cfg.backoff.as_ref().unwrap().skip_initial_delay);
}

#[tokio::test(start_paused = true)]
async fn registry_receive_honours_initial_delay() {
    let file = chain(1, None);
    let registry = Arc::new(MemoryRegistry::new());
    let cfg = config(1, Duration::ZERO);
    let courier = RegistryCourier::new(&cfg, recipient_of(&file), registry);
    let cancel = CancellationToken::new();
    let locator = annotated(&file).locator;

    courier.deliver_proof(&cancel, &annotated(&file)).await.unwrap();
    courier.receive_proof(&cancel, locator.clone()).await.unwrap();

    let start = Instant::now();
    courier.receive_proof(&cancel, locator).await.unwrap();
    let waited = start.elapsed();
    assert!(waited > Duration::from_secs(590), "waited {:?}", waited);
    assert!(waited <= Duration::from_secs(600), "waited {:?}", waited);
}

#[tokio::test(start_paused = true)]
async fn cancellation_is_distinct_from_exhaustion() {
    let file = chain(2, None);
    let registry = Arc::new(MemoryRegistry::new());
    let cfg = config(100, Duration::from_secs(30));
    let courier = RegistryCourier::new(&cfg, recipient_of(&file), registry);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(45)).await;
        trigger.cancel();
    });

    // Nothing was delivered, so every query fails until the token fires.
    let err = courier
        .receive_proof(&cancel, annotated(&file).locator)
        .await
        .unwrap_err();
    assert!(err.is_cancelled(), "got {err}");
}
