//! Mailbox stream ids.
//!
//! Both sides of a mailbox transfer derive the same pair of ids from the
//! recipient's script key alone, so nothing has to be exchanged out of band:
//!
//! ```text
//! sender id   = SHA-512(script_key)
//! receiver id = sender id with the lowest bit of byte 63 flipped
//! ```
//!
//! The sender writes the proof on the sender id and listens for the ACK on
//! the receiver id; the receiver does the opposite.

use std::fmt;

use sha2::{Digest, Sha512};

use crate::config::STREAM_ID_LENGTH;
use crate::proof::Recipient;

/// 64-byte mailbox session identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId([u8; STREAM_ID_LENGTH]);

impl StreamId {
    pub fn from_bytes(bytes: [u8; STREAM_ID_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Parse from 128 hex characters.
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let array: [u8; STREAM_ID_LENGTH] = bytes.try_into().ok()?;
        Some(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8; STREAM_ID_LENGTH] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// The id for the opposite direction. Applying it twice is the identity.
    pub fn flip_direction(&self) -> Self {
        let mut flipped = self.0;
        flipped[STREAM_ID_LENGTH - 1] ^= 0x01;
        Self(flipped)
    }
}

impl fmt::Debug for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StreamId({})", self.to_hex())
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Stream the sender writes the proof to.
pub fn derive_sender_stream_id(recipient: &Recipient) -> StreamId {
    let digest = Sha512::digest(recipient.script_key.as_bytes());
    let mut sid = [0u8; STREAM_ID_LENGTH];
    sid.copy_from_slice(&digest);
    StreamId(sid)
}

/// Stream the receiver writes its ACK to.
pub fn derive_receiver_stream_id(recipient: &Recipient) -> StreamId {
    derive_sender_stream_id(recipient).flip_direction()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proof::AssetId;
    use ed25519_dalek::SigningKey;

    fn recipient(seed: u8) -> Recipient {
        Recipient {
            script_key: SigningKey::from_bytes(&[seed; 32]).verifying_key(),
            asset_id: AssetId([0; 32]),
            amount: 1,
        }
    }

    #[test]
    fn sender_id_is_sha512_of_script_key() {
        let r = recipient(1);
        let expected = Sha512::digest(r.script_key.as_bytes());
        assert_eq!(&derive_sender_stream_id(&r).as_bytes()[..], &expected[..]);
    }

    #[test]
    fn derivation_is_deterministic() {
        assert_eq!(
            derive_sender_stream_id(&recipient(2)),
            derive_sender_stream_id(&recipient(2))
        );
    }

    #[test]
    fn directions_differ_only_in_last_bit() {
        let r = recipient(3);
        let sender = derive_sender_stream_id(&r);
        let receiver = derive_receiver_stream_id(&r);

        assert_ne!(sender, receiver);
        assert_eq!(sender.as_bytes()[..63], receiver.as_bytes()[..63]);
        assert_eq!(sender.as_bytes()[63] ^ receiver.as_bytes()[63], 0x01);
    }

    #[test]
    fn flip_is_an_involution() {
        let r = recipient(4);
        assert_eq!(
            derive_receiver_stream_id(&r).flip_direction(),
            derive_sender_stream_id(&r)
        );
    }

    #[test]
    fn distinct_recipients_never_share_ids() {
        let a = recipient(5);
        let b = recipient(6);

        assert_ne!(derive_sender_stream_id(&a), derive_sender_stream_id(&b));
        assert_ne!(derive_receiver_stream_id(&a), derive_receiver_stream_id(&b));
        assert_ne!(derive_sender_stream_id(&a), derive_receiver_stream_id(&b));
    }

    #[test]
    fn amount_and_asset_do_not_affect_ids() {
        let a = recipient(7);
        let mut b = a.clone();
        b.amount = 999;
        b.asset_id = AssetId([0xff; 32]);
        assert_eq!(derive_sender_stream_id(&a), derive_sender_stream_id(&b));
    }

    #[test]
    fn hex_round_trip() {
        let sid = derive_sender_stream_id(&recipient(8));
        assert_eq!(sid.to_hex().len(), 128);
        assert_eq!(StreamId::from_hex(&sid.to_hex()), Some(sid));
        assert_eq!(StreamId::from_hex("00"), None);
    }
}
