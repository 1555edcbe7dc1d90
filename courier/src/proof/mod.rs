//! # Proof Model
//!
//! Just enough of the proof format for couriers to do their job: identify a
//! proof ([`Locator`]), identify its recipient ([`Recipient`]), split a proof
//! file into links and stitch links back into a file. Proof verification
//! happens elsewhere. Couriers move bytes; they don't judge them.

pub mod file;
pub mod types;

use thiserror::Error;

pub use file::{Asset, PrevId, Proof, ProofFile};
pub use types::{
    parse_public_key, public_key_from_slice, AnnotatedProof, AssetId, Blob, Locator, OutPoint,
    Recipient,
};

/// Errors from the proof model and its encoding.
#[derive(Debug, Error)]
pub enum ProofError {
    #[error("input truncated: {0} bytes is shorter than the header")]
    Truncated(usize),

    #[error("invalid magic: expected {expected:?}, got {got:?}")]
    InvalidMagic { expected: [u8; 4], got: [u8; 4] },

    #[error("unsupported encoding version: {0}")]
    UnsupportedVersion(u8),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("invalid outpoint: {0}")]
    InvalidOutPoint(String),

    #[error("invalid public key: {0}")]
    InvalidKey(String),

    #[error("proof index {index} out of range (file has {len} proofs)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("proof file is empty")]
    EmptyFile,

    #[error("first proof in a file must be a genesis proof")]
    NotGenesis,

    #[error("proof {index} does not spend the output of the proof before it")]
    BrokenLink { index: usize },

    #[error("transition proof has no previous witness")]
    MissingPrevWitness,
}
