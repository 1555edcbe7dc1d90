//! # Proofs and Proof Files
//!
//! A proof file is the full lineage of an asset output: the issuance
//! (genesis) proof first, then one transition proof per transfer, with the
//! most recent link last. Each link records the previous output it spent
//! through its asset's previous witnesses, which is what lets a receiver
//! rebuild the whole file from just the last link's locator.
//!
//! ## Encoding
//!
//! ```text
//! ┌────────────┬─────────┬───────────────────────┐
//! │ magic (4B) │ ver (1B)│ bincode body          │
//! └────────────┴─────────┴───────────────────────┘
//! ```
//!
//! Single proofs and proof files use different magics so that handing one
//! where the other is expected fails loudly instead of mis-decoding.

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};

use super::types::{AssetId, Locator, OutPoint};
use super::ProofError;

/// Magic prefix of an encoded single proof.
pub const PROOF_MAGIC: [u8; 4] = *b"CPRF";

/// Magic prefix of an encoded proof file.
pub const FILE_MAGIC: [u8; 4] = *b"CPFL";

/// Current encoding version for both proofs and files.
pub const ENCODING_VERSION: u8 = 1;

const HEADER_LEN: usize = 5;

// ---------------------------------------------------------------------------
// Asset
// ---------------------------------------------------------------------------

/// Reference to the output an asset was spent from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrevId {
    /// Asset id of the spent asset.
    pub id: AssetId,
    /// The spent output.
    pub outpoint: OutPoint,
    /// Serialized script key of the spent asset. Stored raw; parsed only
    /// when a chain walk needs it.
    pub script_key: Vec<u8>,
}

impl PrevId {
    /// Builds the reference to the output proven by `proof`.
    pub fn spending(proof: &Proof) -> Self {
        Self {
            id: proof.asset.id,
            outpoint: proof.outpoint,
            script_key: proof.asset.script_key.as_bytes().to_vec(),
        }
    }
}

/// The asset state a proof attests to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub group_key: Option<VerifyingKey>,
    pub script_key: VerifyingKey,
    pub amount: u64,
    /// Inputs this asset was created from. Empty for an issuance.
    pub prev_witnesses: Vec<PrevId>,
}

impl Asset {
    /// True for the issuance-time asset, which has no predecessor.
    pub fn is_genesis_asset(&self) -> bool {
        self.prev_witnesses.is_empty()
    }

    /// The first (principal) input of a transfer.
    pub fn primary_prev_id(&self) -> Result<&PrevId, ProofError> {
        self.prev_witnesses
            .first()
            .ok_or(ProofError::MissingPrevWitness)
    }
}

// ---------------------------------------------------------------------------
// Proof
// ---------------------------------------------------------------------------

/// A single link in an asset's proof chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    pub asset: Asset,
    /// Output holding the asset after this link.
    pub outpoint: OutPoint,
    /// Opaque attestation data (inclusion proofs, anchor transaction...).
    pub payload: Vec<u8>,
}

impl Proof {
    pub fn new(asset: Asset, outpoint: OutPoint, payload: Vec<u8>) -> Self {
        Self {
            asset,
            outpoint,
            payload,
        }
    }

    /// The locator under which this link is published.
    pub fn locator(&self) -> Locator {
        Locator {
            asset_id: Some(self.asset.id),
            group_key: self.asset.group_key,
            script_key: self.asset.script_key,
            outpoint: Some(self.outpoint),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, ProofError> {
        encode_with_header(PROOF_MAGIC, self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProofError> {
        decode_with_header(PROOF_MAGIC, bytes)
    }
}

// ---------------------------------------------------------------------------
// ProofFile
// ---------------------------------------------------------------------------

/// An ordered proof chain, genesis first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofFile {
    proofs: Vec<Proof>,
}

impl ProofFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a file from links already in canonical order.
    pub fn from_proofs(proofs: Vec<Proof>) -> Self {
        Self { proofs }
    }

    /// Appends a link after the current last one.
    ///
    /// The first link must be a genesis proof and every later link must
    /// spend the output of the link before it.
    pub fn append_proof(&mut self, proof: Proof) -> Result<(), ProofError> {
        match self.proofs.last() {
            None if !proof.asset.is_genesis_asset() => Err(ProofError::NotGenesis),
            None => {
                self.proofs.push(proof);
                Ok(())
            }
            Some(last) => {
                let prev = proof.asset.primary_prev_id()?;
                if prev.outpoint != last.outpoint || prev.id != last.asset.id {
                    return Err(ProofError::BrokenLink {
                        index: self.proofs.len(),
                    });
                }
                self.proofs.push(proof);
                Ok(())
            }
        }
    }

    pub fn num_proofs(&self) -> usize {
        self.proofs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proofs.is_empty()
    }

    pub fn proof_at(&self, index: usize) -> Result<&Proof, ProofError> {
        self.proofs.get(index).ok_or(ProofError::IndexOutOfRange {
            index,
            len: self.proofs.len(),
        })
    }

    /// The most recent link.
    pub fn last_proof(&self) -> Result<&Proof, ProofError> {
        self.proofs.last().ok_or(ProofError::EmptyFile)
    }

    pub fn proofs(&self) -> &[Proof] {
        &self.proofs
    }

    pub fn encode(&self) -> Result<Vec<u8>, ProofError> {
        encode_with_header(FILE_MAGIC, self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProofError> {
        decode_with_header(FILE_MAGIC, bytes)
    }
}

fn encode_with_header<T: Serialize>(magic: [u8; 4], value: &T) -> Result<Vec<u8>, ProofError> {
    let body = bincode::serialize(value).map_err(|e| ProofError::Serialization(e.to_string()))?;
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(&magic);
    out.push(ENCODING_VERSION);
    out.extend_from_slice(&body);
    Ok(out)
}

fn decode_with_header<T: for<'de> Deserialize<'de>>(
    magic: [u8; 4],
    bytes: &[u8],
) -> Result<T, ProofError> {
    if bytes.len() < HEADER_LEN {
        return Err(ProofError::Truncated(bytes.len()));
    }
    if bytes[..4] != magic {
        return Err(ProofError::InvalidMagic {
            expected: magic,
            got: [bytes[0], bytes[1], bytes[2], bytes[3]],
        });
    }
    if bytes[4] != ENCODING_VERSION {
        return Err(ProofError::UnsupportedVersion(bytes[4]));
    }
    bincode::deserialize(&bytes[HEADER_LEN..]).map_err(|e| ProofError::Serialization(e.to_string()))
}
