//! HTTPS client for a remote mailbox service.
//!
//! | Operation    | Request                          | Notes                          |
//! |--------------|----------------------------------|--------------------------------|
//! | `init`       | `POST /v1/mailbox`               | `409 Conflict` = already there |
//! | `write_proof`| `POST /v1/mailbox/{sid}/send`    | raw body                       |
//! | `read_proof` | `GET /v1/mailbox/{sid}/recv`     | `204` = nothing yet, poll again|
//! | `clean_up`   | `DELETE /v1/mailbox/{sid}`       |                                |

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::trace;
use url::Url;

use super::{MailboxError, ProofMailbox};
use crate::config::{HASHMAIL_SCHEME, MAILBOX_POLL_INTERVAL};
use crate::courier::StreamId;
use crate::proof::Blob;
use crate::transport::{insecure_tls_client, service_base_url, until_cancelled};

#[derive(Serialize)]
struct CreateMailboxRequest {
    stream_id: String,
}

/// [`ProofMailbox`] over a mailbox service's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpMailbox {
    base_url: Url,
    client: Client,
}

impl HttpMailbox {
    /// Connect to the service behind a `hashmail://host:port` address.
    pub fn connect(addr: &Url) -> Result<Self, MailboxError> {
        if addr.scheme() != HASHMAIL_SCHEME {
            return Err(MailboxError::InvalidAddress(format!(
                "expected {} scheme, got {}",
                HASHMAIL_SCHEME,
                addr.scheme()
            )));
        }
        let base_url = service_base_url(addr).map_err(MailboxError::InvalidAddress)?;
        let client = insecure_tls_client()?;
        Ok(Self { base_url, client })
    }

    /// Use an explicit base URL and client.
    pub fn with_base_url(base_url: Url, client: Client) -> Self {
        Self { base_url, client }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, MailboxError> {
        self.base_url
            .join(path)
            .map_err(|e| MailboxError::InvalidAddress(e.to_string()))
    }

    async fn send(
        &self,
        cancel: &CancellationToken,
        request: reqwest::RequestBuilder,
    ) -> Result<Response, MailboxError> {
        until_cancelled(cancel, request.send())
            .await
            .ok_or(MailboxError::Cancelled)?
            .map_err(MailboxError::from)
    }
}

async fn service_error(sid: &StreamId, response: Response) -> MailboxError {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return MailboxError::NotFound(sid.to_hex());
    }
    let message = response.text().await.unwrap_or_default();
    MailboxError::Service {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl ProofMailbox for HttpMailbox {
    async fn init(&self, cancel: &CancellationToken, sid: &StreamId) -> Result<(), MailboxError> {
        let url = self.endpoint("v1/mailbox")?;
        let body = CreateMailboxRequest {
            stream_id: sid.to_hex(),
        };
        let response = self.send(cancel, self.client.post(url).json(&body)).await?;

        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::CONFLICT => {
                trace!(stream_id = %sid, "mailbox already exists");
                Ok(())
            }
            _ => Err(service_error(sid, response).await),
        }
    }

    async fn write_proof(
        &self,
        cancel: &CancellationToken,
        sid: &StreamId,
        proof: &[u8],
    ) -> Result<(), MailboxError> {
        let url = self.endpoint(&format!("v1/mailbox/{}/send", sid.to_hex()))?;
        let request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(proof.to_vec());
        let response = self.send(cancel, request).await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(service_error(sid, response).await)
        }
    }

    async fn read_proof(
        &self,
        cancel: &CancellationToken,
        sid: &StreamId,
    ) -> Result<Blob, MailboxError> {
        let url = self.endpoint(&format!("v1/mailbox/{}/recv", sid.to_hex()))?;

        loop {
            let response = self.send(cancel, self.client.get(url.clone())).await?;

            match response.status() {
                StatusCode::NO_CONTENT => {
                    until_cancelled(cancel, tokio::time::sleep(MAILBOX_POLL_INTERVAL))
                        .await
                        .ok_or(MailboxError::Cancelled)?;
                }
                s if s.is_success() => {
                    let body = until_cancelled(cancel, response.bytes())
                        .await
                        .ok_or(MailboxError::Cancelled)??;
                    return Ok(body.to_vec());
                }
                _ => return Err(service_error(sid, response).await),
            }
        }
    }

    async fn clean_up(
        &self,
        cancel: &CancellationToken,
        sid: &StreamId,
    ) -> Result<(), MailboxError> {
        let url = self.endpoint(&format!("v1/mailbox/{}", sid.to_hex()))?;
        let response = self.send(cancel, self.client.delete(url)).await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(service_error(sid, response).await)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_requires_hashmail_scheme() {
        let addr = Url::parse("universerpc://localhost:10029").unwrap();
        assert!(matches!(
            HttpMailbox::connect(&addr),
            Err(MailboxError::InvalidAddress(_))
        ));
    }

    #[test]
    fn connect_targets_https_service() {
        let addr = Url::parse("hashmail://mailbox.example.com:443").unwrap();
        let mailbox = HttpMailbox::connect(&addr).unwrap();
        assert_eq!(mailbox.base_url().scheme(), "https");
        assert_eq!(mailbox.base_url().host_str(), Some("mailbox.example.com"));
    }

    #[test]
    fn endpoints_are_relative_to_base() {
        let mailbox = HttpMailbox::with_base_url(
            Url::parse("http://127.0.0.1:8080/").unwrap(),
            Client::new(),
        );
        let url = mailbox.endpoint("v1/mailbox/ab/send").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/v1/mailbox/ab/send");
    }
}
