//! Courier addresses.
//!
//! A courier address is a URL whose scheme picks the transport:
//!
//! | Scheme        | Courier            | Service                  |
//! |---------------|--------------------|--------------------------|
//! | `hashmail`    | [`MailboxCourier`] | store-and-forward mailbox|
//! | `universerpc` | [`RegistryCourier`]| keyed proof registry     |
//!
//! Both require an explicit port.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use url::Url;

use super::error::CourierError;
use super::hashmail::MailboxCourier;
use super::universe::RegistryCourier;
use super::Courier;
use crate::config::{CourierConfig, HASHMAIL_SCHEME, UNIVERSE_RPC_SCHEME};
use crate::mailbox::HttpMailbox;
use crate::proof::Recipient;
use crate::registry::HttpRegistry;

/// Transport selected by an address scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourierType {
    HashMail,
    UniverseRpc,
}

impl CourierType {
    pub fn scheme(self) -> &'static str {
        match self {
            Self::HashMail => HASHMAIL_SCHEME,
            Self::UniverseRpc => UNIVERSE_RPC_SCHEME,
        }
    }
}

impl fmt::Display for CourierType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

/// A validated courier address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CourierAddr {
    HashMail(Url),
    UniverseRpc(Url),
}

impl CourierAddr {
    /// Parse and validate an address string.
    pub fn parse(addr: &str) -> Result<Self, CourierError> {
        let url = Url::parse(addr).map_err(|e| {
            CourierError::InvalidAddress(format!("invalid proof courier URI address: {}", e))
        })?;
        Self::from_url(url)
    }

    /// Validate an already parsed URL.
    pub fn from_url(url: Url) -> Result<Self, CourierError> {
        let courier_type = match url.scheme() {
            HASHMAIL_SCHEME => CourierType::HashMail,
            UNIVERSE_RPC_SCHEME => CourierType::UniverseRpc,
            other => return Err(CourierError::UnknownScheme(other.to_string())),
        };

        if url.host_str().map_or(true, str::is_empty) {
            return Err(CourierError::InvalidAddress(format!(
                "{} courier address has no host",
                courier_type
            )));
        }
        if url.port().is_none() {
            return Err(CourierError::MissingPort {
                scheme: courier_type.to_string(),
            });
        }

        Ok(match courier_type {
            CourierType::HashMail => Self::HashMail(url),
            CourierType::UniverseRpc => Self::UniverseRpc(url),
        })
    }

    pub fn url(&self) -> &Url {
        match self {
            Self::HashMail(url) | Self::UniverseRpc(url) => url,
        }
    }

    pub fn courier_type(&self) -> CourierType {
        match self {
            Self::HashMail(_) => CourierType::HashMail,
            Self::UniverseRpc(_) => CourierType::UniverseRpc,
        }
    }

    /// Connect to the service behind this address and return a courier
    /// handle bound to `recipient`.
    pub fn new_courier(
        &self,
        cfg: &CourierConfig,
        recipient: Recipient,
    ) -> Result<Courier, CourierError> {
        match self {
            Self::HashMail(url) => {
                let mailbox = HttpMailbox::connect(url).map_err(|e| CourierError::Connect {
                    courier: HASHMAIL_SCHEME,
                    reason: e.to_string(),
                })?;
                Ok(Courier::Mailbox(MailboxCourier::new(
                    cfg,
                    recipient,
                    Arc::new(mailbox),
                )))
            }
            Self::UniverseRpc(url) => {
                let registry = HttpRegistry::connect(url).map_err(|e| CourierError::Connect {
                    courier: UNIVERSE_RPC_SCHEME,
                    reason: e.to_string(),
                })?;
                Ok(Courier::Registry(RegistryCourier::new(
                    cfg,
                    recipient,
                    Arc::new(registry),
                )))
            }
        }
    }
}

impl FromStr for CourierAddr {
    type Err = CourierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CourierAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proof::AssetId;
    use crate::storage::TransferLogDb;
    use ed25519_dalek::SigningKey;

    #[test]
    fn parses_both_schemes() {
        let hm = CourierAddr::parse("hashmail://mailbox.example.com:443").unwrap();
        assert_eq!(hm.courier_type(), CourierType::HashMail);

        let uni = CourierAddr::parse("universerpc://universe.example.com:10029").unwrap();
        assert_eq!(uni.courier_type(), CourierType::UniverseRpc);
        assert_eq!(uni.url().port(), Some(10029));
    }

    #[test]
    fn port_is_required() {
        for addr in ["hashmail://mailbox.example.com", "universerpc://universe.example.com"] {
            assert!(matches!(
                CourierAddr::parse(addr),
                Err(CourierError::MissingPort { .. })
            ));
        }
    }

    #[test]
    fn unknown_scheme_asks_for_update() {
        let err = CourierAddr::parse("carrierpigeon://coop.example.com:1").unwrap_err();
        assert!(matches!(err, CourierError::UnknownScheme(ref s) if s == "carrierpigeon"));
        assert!(err.to_string().contains("consider updating"));
    }

    #[test]
    fn garbage_is_invalid() {
        assert!(matches!(
            CourierAddr::parse("not a url"),
            Err(CourierError::InvalidAddress(_))
        ));
    }

    #[test]
    fn from_str_matches_parse() {
        let addr: CourierAddr = "hashmail://127.0.0.1:8443".parse().unwrap();
        assert_eq!(addr.to_string(), "hashmail://127.0.0.1:8443");
    }

    #[test]
    fn new_courier_follows_scheme() {
        let cfg = CourierConfig::with_transfer_log(Arc::new(TransferLogDb::open_temporary().unwrap()));
        let recipient = Recipient {
            script_key: SigningKey::from_bytes(&[1; 32]).verifying_key(),
            asset_id: AssetId([0; 32]),
            amount: 10,
        };

        let hm = CourierAddr::parse("hashmail://127.0.0.1:8443").unwrap();
        assert!(matches!(
            hm.new_courier(&cfg, recipient.clone()).unwrap(),
            Courier::Mailbox(_)
        ));

        let uni = CourierAddr::parse("universerpc://127.0.0.1:10029").unwrap();
        assert!(matches!(
            uni.new_courier(&cfg, recipient).unwrap(),
            Courier::Registry(_)
        ));
    }
}
