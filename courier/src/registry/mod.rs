//! # Proof Registry
//!
//! A registry stores individual proof links under a two-level key: the
//! *universe* the asset belongs to (its group key if it has one, its asset
//! id otherwise) and the *leaf* inside it (the output holding the asset plus
//! its script key).
//!
//! ```text
//!   universe id ── Group(group_key) | Asset(asset_id)
//!        │
//!        └── leaf key ── outpoint ‖ script_key ──► encoded proof link
//! ```
//!
//! The registry courier inserts every link of a proof file on delivery and
//! walks the links back from the newest one on receipt.

pub mod http;
pub mod memory;

use async_trait::async_trait;
use ed25519_dalek::VerifyingKey;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::courier::CourierError;
use crate::proof::{AssetId, Blob, Locator, OutPoint, Proof};

pub use http::HttpRegistry;
pub use memory::MemoryRegistry;

/// Raw registry transport errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no proof found for key {0}")]
    NotFound(String),

    #[error("registry transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("registry service returned {status}: {message}")]
    Service { status: u16, message: String },

    #[error("invalid registry response: {0}")]
    InvalidResponse(String),

    #[error("invalid registry address: {0}")]
    InvalidAddress(String),

    #[error("registry operation cancelled")]
    Cancelled,
}

// ---------------------------------------------------------------------------
// RegistryKey
// ---------------------------------------------------------------------------

/// Which universe an asset lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniverseId {
    Asset(AssetId),
    Group(VerifyingKey),
}

impl UniverseId {
    fn tag(&self) -> u8 {
        match self {
            Self::Asset(_) => 0x00,
            Self::Group(_) => 0x01,
        }
    }

    fn bytes(&self) -> &[u8; 32] {
        match self {
            Self::Asset(id) => id.as_bytes(),
            Self::Group(key) => key.as_bytes(),
        }
    }
}

/// Address of one proof link in a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryKey {
    pub asset_id: AssetId,
    pub group_key: Option<VerifyingKey>,
    pub outpoint: OutPoint,
    pub script_key: VerifyingKey,
}

impl RegistryKey {
    /// Key for the link a locator points at. Asset id and outpoint must be
    /// set.
    pub fn from_locator(locator: &Locator) -> Result<Self, CourierError> {
        Ok(Self {
            asset_id: locator
                .asset_id
                .ok_or(CourierError::MissingLocatorField("asset id"))?,
            group_key: locator.group_key,
            outpoint: locator
                .outpoint
                .ok_or(CourierError::MissingLocatorField("outpoint"))?,
            script_key: locator.script_key,
        })
    }

    /// Key under which `proof` is published.
    pub fn for_proof(proof: &Proof) -> Self {
        Self {
            asset_id: proof.asset.id,
            group_key: proof.asset.group_key,
            outpoint: proof.outpoint,
            script_key: proof.asset.script_key,
        }
    }

    pub fn universe_id(&self) -> UniverseId {
        match self.group_key {
            Some(key) => UniverseId::Group(key),
            None => UniverseId::Asset(self.asset_id),
        }
    }

    /// Stable byte form: universe tag and id, then the leaf key.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let universe = self.universe_id();
        let mut out = Vec::with_capacity(1 + 32 + 32 + 4 + 32);
        out.push(universe.tag());
        out.extend_from_slice(universe.bytes());
        out.extend_from_slice(&self.outpoint.txid);
        out.extend_from_slice(&self.outpoint.index.to_be_bytes());
        out.extend_from_slice(self.script_key.as_bytes());
        out
    }
}

impl std::fmt::Display for RegistryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.universe_id() {
            UniverseId::Asset(id) => write!(f, "asset/{}", id)?,
            UniverseId::Group(key) => write!(f, "group/{}", hex::encode(key.as_bytes()))?,
        }
        write!(
            f,
            "/{}/{}",
            self.outpoint,
            hex::encode(self.script_key.as_bytes())
        )
    }
}

// ---------------------------------------------------------------------------
// ProofRegistry
// ---------------------------------------------------------------------------

/// Keyed store of individual proof links.
#[async_trait]
pub trait ProofRegistry: Send + Sync {
    /// Store one encoded proof link under `key`.
    async fn insert_proof(
        &self,
        cancel: &CancellationToken,
        key: &RegistryKey,
        proof: &[u8],
    ) -> Result<(), RegistryError>;

    /// Fetch the encoded proof link stored under `key`.
    async fn query_proof(
        &self,
        cancel: &CancellationToken,
        key: &RegistryKey,
    ) -> Result<Blob, RegistryError>;
}
