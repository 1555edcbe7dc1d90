//! In-process proof registry.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use super::{ProofRegistry, RegistryError, RegistryKey};
use crate::proof::Blob;

/// Registry backed by a map keyed on [`RegistryKey::canonical_bytes`].
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    proofs: RwLock<HashMap<Vec<u8>, Blob>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.proofs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.proofs.read().is_empty()
    }

    pub fn contains(&self, key: &RegistryKey) -> bool {
        self.proofs.read().contains_key(&key.canonical_bytes())
    }

    /// Drop the link stored under `key`.
    pub fn remove(&self, key: &RegistryKey) -> Option<Blob> {
        self.proofs.write().remove(&key.canonical_bytes())
    }

    /// Store raw bytes under `key` without going through the trait.
    pub fn put_raw(&self, key: &RegistryKey, blob: Blob) {
        self.proofs.write().insert(key.canonical_bytes(), blob);
    }
}

#[async_trait]
impl ProofRegistry for MemoryRegistry {
    async fn insert_proof(
        &self,
        cancel: &CancellationToken,
        key: &RegistryKey,
        proof: &[u8],
    ) -> Result<(), RegistryError> {
        if cancel.is_cancelled() {
            return Err(RegistryError::Cancelled);
        }
        self.put_raw(key, proof.to_vec());
        Ok(())
    }

    async fn query_proof(
        &self,
        cancel: &CancellationToken,
        key: &RegistryKey,
    ) -> Result<Blob, RegistryError> {
        if cancel.is_cancelled() {
            return Err(RegistryError::Cancelled);
        }
        self.proofs
            .read()
            .get(&key.canonical_bytes())
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(key.to_string()))
    }
}
