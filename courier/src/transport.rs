//! # Courier Service Transport
//!
//! Shared plumbing for talking to remote courier services over HTTPS.
//!
//! Certificate verification is disabled for these connections. Trust in a
//! delivered proof comes from the proof content, which the receiver
//! verifies, never from the identity of the courier service.

use std::future::Future;

use reqwest::Client;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Builds the HTTPS client used for courier services.
pub(crate) fn insecure_tls_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .danger_accept_invalid_certs(true)
        .build()
}

/// Maps a courier address (`hashmail://host:port`, `universerpc://host:port`)
/// to the HTTPS base URL of the service behind it.
pub(crate) fn service_base_url(courier_addr: &Url) -> Result<Url, String> {
    let host = courier_addr
        .host_str()
        .ok_or_else(|| format!("courier address {} has no host", courier_addr))?;
    let port = courier_addr
        .port()
        .ok_or_else(|| format!("courier address {} has no port", courier_addr))?;

    Url::parse(&format!("https://{}:{}/", host, port)).map_err(|e| e.to_string())
}

/// Runs `fut` to completion unless `cancel` fires first, in which case the
/// future is dropped and `None` is returned.
pub(crate) async fn until_cancelled<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        out = fut => Some(out),
    }
}
