use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, DEFAULT_PEER_HOST, DEFAULT_PEER_PORT};

/// `host:port` of the peer's chaincode listener.
///
/// Either half may be omitted: `"peer0"` and `":9999"` fall back to the
/// default port and host respectively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeerAddress {
    pub host: String,
    pub port: u16,
}

impl Default for PeerAddress {
    fn default() -> Self {
        Self {
            host: DEFAULT_PEER_HOST.to_string(),
            port: DEFAULT_PEER_PORT,
        }
    }
}

impl FromStr for PeerAddress {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ConfigError::InvalidPeerAddress {
            address: s.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = s.trim();
        let (host, port) = match trimmed.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (trimmed, None),
        };
        if host.contains(':') {
            return Err(invalid("expected host:port"));
        }

        let port = match port {
            None | Some("") => DEFAULT_PEER_PORT,
            Some(port) => port.parse().map_err(|_| invalid("port is not a number"))?,
        };
        if port == 0 {
            return Err(invalid("port must be non-zero"));
        }

        Ok(Self {
            host: if host.is_empty() {
                DEFAULT_PEER_HOST.to_string()
            } else {
                host.to_string()
            },
            port,
        })
    }
}

impl TryFrom<String> for PeerAddress {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PeerAddress> for String {
    fn from(address: PeerAddress) -> Self {
        address.to_string()
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_and_port() {
        let address: PeerAddress = "peer0.org1:7052".parse().unwrap();
        assert_eq!(address.host, "peer0.org1");
        assert_eq!(address.port, 7052);
        assert_eq!(address.to_string(), "peer0.org1:7052");
    }

    #[test]
    fn missing_parts_use_defaults() {
        assert_eq!("peer0".parse::<PeerAddress>().unwrap().port, DEFAULT_PEER_PORT);
        assert_eq!(":9999".parse::<PeerAddress>().unwrap().host, DEFAULT_PEER_HOST);
        assert_eq!("".parse::<PeerAddress>().unwrap(), PeerAddress::default());
    }

    #[test]
    fn rejects_bad_ports() {
        assert!("peer0:http".parse::<PeerAddress>().is_err());
        assert!("peer0:0".parse::<PeerAddress>().is_err());
        assert!("a:b:1".parse::<PeerAddress>().is_err());
    }
}
