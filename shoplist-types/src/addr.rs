//! Network address of a physical storage node.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// `address:port` pair identifying a physical node.
///
/// The node's ring identity is exactly `"{address}:{port}"`, so two
/// addresses are the same node iff both parts match.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeAddr {
    pub address: String,
    pub port: String,
}

impl NodeAddr {
    /// Creates a node address from its parts.
    pub fn new(address: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            port: port.into(),
        }
    }

    /// Returns the ring identity of this node (`address:port`).
    #[must_use]
    pub fn id(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    /// Returns true if either part is empty.
    #[must_use]
    pub fn is_incomplete(&self) -> bool {
        self.address.is_empty() || self.port.is_empty()
    }

    /// Base URL for HTTP requests to this node.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.address, self.port)
    }
}

impl fmt::Display for NodeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

impl FromStr for NodeAddr {
    type Err = crate::Error;

    /// Parses `host:port`, splitting on the last colon.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (address, port) = s
            .rsplit_once(':')
            .ok_or_else(|| crate::Error::InvalidAddress(s.to_string()))?;
        if address.is_empty() || port.is_empty() || port.parse::<u16>().is_err() {
            return Err(crate::Error::InvalidAddress(s.to_string()));
        }
        Ok(Self::new(address, port))
    }
}
