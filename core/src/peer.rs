// Peer and session identifiers
//
// Both are opaque strings handed to us by the fabric. A peer address may carry
// a resource suffix ("alice@example.org/desk"); the bare part before the slash
// identifies the account.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Addressable endpoint on the signaling fabric
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Address without the resource suffix
    pub fn bare(&self) -> &str {
        self.0.split('/').next().unwrap_or(&self.0)
    }

    /// Short form used in log lines: `[bare]`
    pub fn prefix(&self) -> String {
        format!("[{}]", self.bare())
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PeerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifier of one collaboration session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random session id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_strips_resource() {
        let peer = PeerId::new("alice@example.org/desk");
        assert_eq!(peer.bare(), "alice@example.org");
        assert_eq!(peer.prefix(), "[alice@example.org]");
    }

    #[test]
    fn test_bare_without_resource() {
        let peer = PeerId::new("bob@example.org");
        assert_eq!(peer.bare(), "bob@example.org");
        assert_eq!(peer.to_string(), "bob@example.org");
    }

    #[test]
    fn test_generated_session_ids_differ() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
        assert!(!a.is_empty());
    }
}
