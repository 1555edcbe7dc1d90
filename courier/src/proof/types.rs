//! # Proof Identity Types
//!
//! The small vocabulary every courier speaks: which asset, which output,
//! which owner key. None of these types know anything about proof contents.
//! They only answer "which proof are we talking about?" and "who is it for?".

use std::fmt;
use std::str::FromStr;

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::ProofError;

/// Length of an asset identifier in bytes.
pub const ASSET_ID_LENGTH: usize = 32;

/// Length of a transaction id in bytes.
pub const TXID_LENGTH: usize = 32;

/// Raw proof bytes: a single encoded proof or an encoded proof file,
/// depending on the transport.
pub type Blob = Vec<u8>;

// ---------------------------------------------------------------------------
// AssetId
// ---------------------------------------------------------------------------

/// 32-byte identifier of an asset, fixed at issuance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId(pub [u8; ASSET_ID_LENGTH]);

impl AssetId {
    /// Parse an asset id from 64 hex characters.
    pub fn from_hex(s: &str) -> Result<Self, ProofError> {
        let bytes = hex::decode(s).map_err(|e| ProofError::InvalidHex(e.to_string()))?;
        let array: [u8; ASSET_ID_LENGTH] = bytes.try_into().map_err(|b: Vec<u8>| {
            ProofError::InvalidHex(format!(
                "asset id must be {} bytes, got {}",
                ASSET_ID_LENGTH,
                b.len()
            ))
        })?;
        Ok(Self(array))
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8; ASSET_ID_LENGTH] {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

// ---------------------------------------------------------------------------
// OutPoint
// ---------------------------------------------------------------------------

/// A reference to a specific transaction output: `txid:index`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    /// Transaction id.
    pub txid: [u8; TXID_LENGTH],
    /// Output index within the transaction.
    pub index: u32,
}

impl OutPoint {
    pub fn new(txid: [u8; TXID_LENGTH], index: u32) -> Self {
        Self { txid, index }
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", hex::encode(self.txid), self.index)
    }
}

impl FromStr for OutPoint {
    type Err = ProofError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (txid_hex, index) = s
            .split_once(':')
            .ok_or_else(|| ProofError::InvalidOutPoint(format!("missing ':' in {:?}", s)))?;

        let txid_bytes =
            hex::decode(txid_hex).map_err(|e| ProofError::InvalidOutPoint(e.to_string()))?;
        let txid: [u8; TXID_LENGTH] = txid_bytes.try_into().map_err(|b: Vec<u8>| {
            ProofError::InvalidOutPoint(format!("txid must be {} bytes, got {}", TXID_LENGTH, b.len()))
        })?;
        let index = index
            .parse::<u32>()
            .map_err(|e| ProofError::InvalidOutPoint(format!("bad output index: {}", e)))?;

        Ok(Self { txid, index })
    }
}

/// Parse a 32-byte hex-encoded public key.
pub fn parse_public_key(s: &str) -> Result<VerifyingKey, ProofError> {
    let bytes = hex::decode(s).map_err(|e| ProofError::InvalidHex(e.to_string()))?;
    public_key_from_slice(&bytes)
}

/// Parse a public key from its 32-byte compressed serialization.
pub fn public_key_from_slice(bytes: &[u8]) -> Result<VerifyingKey, ProofError> {
    let array: [u8; 32] = bytes
        .try_into()
        .map_err(|_| ProofError::InvalidKey(format!("expected 32 bytes, got {}", bytes.len())))?;
    VerifyingKey::from_bytes(&array).map_err(|e| ProofError::InvalidKey(e.to_string()))
}

// ---------------------------------------------------------------------------
// Locator
// ---------------------------------------------------------------------------

/// Identifies one proof within an asset's lineage.
///
/// The registry courier walks a chain backward by building a fresh locator
/// for each predecessor; a locator is never mutated in place once handed
/// to a transfer log or courier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    /// Asset the proof is for.
    pub asset_id: Option<AssetId>,
    /// Group key, for assets that belong to a group.
    pub group_key: Option<VerifyingKey>,
    /// Script (owner) key of the asset output.
    pub script_key: VerifyingKey,
    /// The output holding the asset.
    pub outpoint: Option<OutPoint>,
}

impl Locator {
    /// SHA-256 over a canonical serialization of the locator.
    ///
    /// Optional fields are prefixed with a presence byte so that, e.g., a
    /// missing group key can never collide with a present one.
    pub fn hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();

        match &self.asset_id {
            Some(id) => {
                hasher.update([1u8]);
                hasher.update(id.0);
            }
            None => hasher.update([0u8]),
        }
        match &self.group_key {
            Some(key) => {
                hasher.update([1u8]);
                hasher.update(key.as_bytes());
            }
            None => hasher.update([0u8]),
        }
        hasher.update(self.script_key.as_bytes());
        match &self.outpoint {
            Some(op) => {
                hasher.update([1u8]);
                hasher.update(op.txid);
                hasher.update(op.index.to_be_bytes());
            }
            None => hasher.update([0u8]),
        }

        hasher.finalize().into()
    }

    /// Hex form of [`Locator::hash`], for log fields.
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash())
    }
}

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

/// The party a proof is being delivered to.
///
/// Only the script key identifies the recipient: every address-based
/// receive uses a fresh script key, so it is unique per transfer. The asset
/// id and amount are carried for log lines.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recipient {
    /// Owner key of the received asset. Stream ids are derived from it.
    pub script_key: VerifyingKey,
    /// Asset being transferred.
    pub asset_id: AssetId,
    /// Amount being transferred.
    pub amount: u64,
}

// ---------------------------------------------------------------------------
// AnnotatedProof
// ---------------------------------------------------------------------------

/// A proof payload together with the locator it answers to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnnotatedProof {
    pub locator: Locator,
    pub blob: Blob,
}
