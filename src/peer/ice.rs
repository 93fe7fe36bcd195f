//! Connectivity-assist configuration: public discovery servers plus one
//! optional password-authenticated relay.

use crate::error::GatewayError;
use crate::utils::add_ice_url_scheme;
use std::fmt;
use webrtc::ice_transport::ice_server::RTCIceServer;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub const DEFAULT_DISCOVERY_SERVER: &str = "stun:stun.l.google.com:19302";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CredentialKind {
    #[default]
    Password,
}

/// Relay server settings. Credentials are wiped when the value is dropped.
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct RelayServer {
    pub address: String,
    pub username: String,
    pub credential: String,
    #[zeroize(skip)]
    pub credential_kind: CredentialKind,
}

impl RelayServer {
    pub fn new(
        address: impl Into<String>,
        username: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            username: username.into(),
            credential: credential.into(),
            credential_kind: CredentialKind::Password,
        }
    }

    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty() && !self.credential.is_empty()
    }
}

impl fmt::Debug for RelayServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayServer")
            .field("address", &self.address)
            .field("username", &self.username)
            .field("credential", &"<redacted>")
            .field("credential_kind", &self.credential_kind)
            .finish()
    }
}

/// Immutable snapshot shared by every session created from it.
#[derive(Debug, Clone, Default)]
pub struct TransportConfig {
    pub discovery_servers: Vec<String>,
    pub relay: Option<RelayServer>,
    degradations: Vec<String>,
}

impl TransportConfig {
    /// Assembles the configuration. Never fails: empty discovery entries are
    /// kept (they are simply unreachable) and a relay without an address is
    /// dropped, leaving discovery-only connectivity. Each such fallback is
    /// recorded in [`TransportConfig::degradations`].
    pub fn build<I, S>(discovery: I, relay: RelayServer) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let discovery_servers = discovery
            .into_iter()
            .map(|addr| add_ice_url_scheme(addr.as_ref(), "stun:"))
            .collect();

        let mut degradations = Vec::new();
        let relay = if relay.address.is_empty() {
            degradations
                .push("no relay server configured, connectivity is discovery-only".to_owned());
            None
        } else {
            if !relay.has_credentials() {
                degradations.push(format!(
                    "relay server {} has empty credentials, allocation will likely be refused",
                    relay.address
                ));
            }
            let mut relay = relay;
            relay.address = add_ice_url_scheme(&relay.address, "turn:");
            Some(relay)
        };

        Self {
            discovery_servers,
            relay,
            degradations,
        }
    }

    /// Non-fatal configuration problems found by [`TransportConfig::build`].
    pub fn degradations(&self) -> Vec<GatewayError> {
        self.degradations
            .iter()
            .map(|reason| GatewayError::Config(reason.clone()))
            .collect()
    }

    pub fn is_discovery_only(&self) -> bool {
        self.relay.is_none()
    }

    /// Server list in the shape the connectivity layer expects
    pub fn ice_servers(&self) -> Vec<RTCIceServer> {
        let mut servers = Vec::with_capacity(2);
        let discovery: Vec<String> = self
            .discovery_servers
            .iter()
            .filter(|url| !url.is_empty())
            .cloned()
            .collect();
        if !discovery.is_empty() {
            servers.push(RTCIceServer {
                urls: discovery,
                username: String::new(),
                credential: String::new(),
            });
        }
        if let Some(relay) = &self.relay {
            servers.push(RTCIceServer {
                urls: vec![relay.address.clone()],
                username: relay.username.clone(),
                credential: relay.credential.clone(),
            });
        }
        servers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_relay_yields_discovery_only() {
        let config = TransportConfig::build([DEFAULT_DISCOVERY_SERVER], RelayServer::default());
        assert!(config.is_discovery_only());
        let servers = config.ice_servers();
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].urls, vec![DEFAULT_DISCOVERY_SERVER.to_owned()]);

        let degradations = config.degradations();
        assert_eq!(degradations.len(), 1);
        assert!(matches!(
            &degradations[0],
            GatewayError::Config(reason) if reason.contains("discovery-only")
        ));
    }

    #[test]
    fn relay_without_credentials_is_kept() {
        let config = TransportConfig::build(
            Vec::<String>::new(),
            RelayServer::new("relay.example.org:3478", "", ""),
        );
        let relay = config.relay.as_ref().expect("relay kept");
        assert_eq!(relay.address, "turn:relay.example.org:3478");
        assert!(!relay.has_credentials());
        assert!(matches!(
            config.degradations().as_slice(),
            [GatewayError::Config(reason)] if reason.contains("empty credentials")
        ));

        let servers = config.ice_servers();
        assert_eq!(servers.len(), 1);
        assert!(servers[0].username.is_empty());
    }

    #[test]
    fn discovery_addresses_get_a_scheme() {
        let config = TransportConfig::build(["stun.example.org:3478", ""], RelayServer::default());
        assert_eq!(
            config.discovery_servers,
            vec!["stun:stun.example.org:3478".to_owned(), String::new()]
        );
        assert_eq!(config.ice_servers()[0].urls.len(), 1);
    }

    #[test]
    fn relay_credentials_are_passed_through() {
        let config = TransportConfig::build(
            [DEFAULT_DISCOVERY_SERVER],
            RelayServer::new("turn:relay.example.org", "user", "secret"),
        );
        let servers = config.ice_servers();
        assert_eq!(servers.len(), 2);
        assert_eq!(servers[1].username, "user");
        assert_eq!(servers[1].credential, "secret");
        assert!(!format!("{:?}", config).contains("secret"));
        assert!(config.degradations().is_empty());
    }
}
