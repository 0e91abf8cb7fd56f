use std::fmt;
use std::str::FromStr;

/// Lifecycle of the single peer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Registration sent, waiting for the peer's acknowledgement
    Created,

    /// Registered, waiting for the peer to declare readiness
    Established,

    /// Accepting transactions
    Ready,
}

impl ConnectionState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Created => "created",
            ConnectionState::Established => "established",
            ConnectionState::Ready => "ready",
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ConnectionState::Ready)
    }

    /// Still in the registration handshake
    pub fn is_registering(&self) -> bool {
        matches!(self, ConnectionState::Created | ConnectionState::Established)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(ConnectionState::Created),
            "established" => Ok(ConnectionState::Established),
            "ready" => Ok(ConnectionState::Ready),
            _ => Err(format!("Unknown connection state: {}", s)),
        }
    }
}
