//! HTTPS client for a remote proof registry (universe) service.
//!
//! Both calls are JSON `POST`s. Keys and proofs travel hex-encoded:
//!
//! ```text
//! POST /v1/proofs        { "key": {..}, "proof": "<hex>" }   -> 2xx
//! POST /v1/proofs/query  { "key": {..} }                     -> { "proof": "<hex>" } | 404
//! ```

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::{ProofRegistry, RegistryError, RegistryKey};
use crate::config::UNIVERSE_RPC_SCHEME;
use crate::proof::Blob;
use crate::transport::{insecure_tls_client, service_base_url, until_cancelled};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
struct WireKey {
    asset_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    group_key: Option<String>,
    outpoint: String,
    script_key: String,
}

impl From<&RegistryKey> for WireKey {
    fn from(key: &RegistryKey) -> Self {
        Self {
            asset_id: key.asset_id.to_string(),
            group_key: key.group_key.map(|k| hex::encode(k.as_bytes())),
            outpoint: key.outpoint.to_string(),
            script_key: hex::encode(key.script_key.as_bytes()),
        }
    }
}

#[derive(Serialize)]
struct InsertProofRequest {
    key: WireKey,
    proof: String,
}

#[derive(Serialize)]
struct QueryProofRequest {
    key: WireKey,
}

#[derive(Deserialize)]
struct QueryProofResponse {
    proof: String,
}

/// [`ProofRegistry`] over a registry service's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpRegistry {
    base_url: Url,
    client: Client,
}

impl HttpRegistry {
    /// Connect to the service behind a `universerpc://host:port` address.
    pub fn connect(addr: &Url) -> Result<Self, RegistryError> {
        if addr.scheme() != UNIVERSE_RPC_SCHEME {
            return Err(RegistryError::InvalidAddress(format!(
                "expected {} scheme, got {}",
                UNIVERSE_RPC_SCHEME,
                addr.scheme()
            )));
        }
        let base_url = service_base_url(addr).map_err(RegistryError::InvalidAddress)?;
        let client = insecure_tls_client()?;
        Ok(Self { base_url, client })
    }

    pub fn with_base_url(base_url: Url, client: Client) -> Self {
        Self { base_url, client }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn post<B: Serialize + Sync>(
        &self,
        cancel: &CancellationToken,
        path: &str,
        body: &B,
    ) -> Result<Response, RegistryError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| RegistryError::InvalidAddress(e.to_string()))?;
        until_cancelled(cancel, self.client.post(url).json(body).send())
            .await
            .ok_or(RegistryError::Cancelled)?
            .map_err(RegistryError::from)
    }
}

async fn service_error(key: &RegistryKey, response: Response) -> RegistryError {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return RegistryError::NotFound(key.to_string());
    }
    let message = response.text().await.unwrap_or_default();
    RegistryError::Service {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl ProofRegistry for HttpRegistry {
    async fn insert_proof(
        &self,
        cancel: &CancellationToken,
        key: &RegistryKey,
        proof: &[u8],
    ) -> Result<(), RegistryError> {
        let body = InsertProofRequest {
            key: WireKey::from(key),
            proof: hex::encode(proof),
        };
        let response = self.post(cancel, "v1/proofs", &body).await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(service_error(key, response).await)
        }
    }

    async fn query_proof(
        &self,
        cancel: &CancellationToken,
        key: &RegistryKey,
    ) -> Result<Blob, RegistryError> {
        let body = QueryProofRequest {
            key: WireKey::from(key),
        };
        let response = self.post(cancel, "v1/proofs/query", &body).await?;

        if !response.status().is_success() {
            return Err(service_error(key, response).await);
        }

        let parsed: QueryProofResponse = until_cancelled(cancel, response.json())
            .await
            .ok_or(RegistryError::Cancelled)??;
        hex::decode(&parsed.proof).map_err(|e| RegistryError::InvalidResponse(e.to_string()))
    }
}
