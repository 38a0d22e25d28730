use dashmap::DashSet;
use thiserror::Error;

/// Errors that can occur when registering peers
#[derive(Debug, Error)]
pub enum PeerError {
    #[error("Invalid peer address: {0}")]
    InvalidAddress(String),
}

/// Set of peer node addresses known to this node
///
/// Addresses are stored as `host:port` authorities, without scheme or path.
#[derive(Debug, Default)]
pub struct PeerSet {
    peers: DashSet<String>,
}

impl PeerSet {
    /// Creates an empty peer set
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a peer
    ///
    /// # Arguments
    ///
    /// * `address` - Either `http://host:port/...` or a bare `host:port`
    ///
    /// # Returns
    ///
    /// true if the peer was not already known
    pub fn register(&self, address: &str) -> Result<bool, PeerError> {
        let authority = parse_authority(address)?;
        Ok(self.peers.insert(authority))
    }

    /// Gets all peers, sorted
    pub fn list(&self) -> Vec<String> {
        let mut peers: Vec<String> = self.peers.iter().map(|peer| peer.key().clone()).collect();
        peers.sort();
        peers
    }

    /// Gets the number of known peers
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Checks if no peers are known
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

fn parse_authority(address: &str) -> Result<String, PeerError> {
    let trimmed = address.trim();
    let without_scheme = match trimmed.split_once("://") {
        Some((_, rest)) => rest,
        None => trimmed,
    };
    let authority = without_scheme.split('/').next().unwrap_or_default();

    if authority.is_empty() || authority.contains(char::is_whitespace) {
        return Err(PeerError::InvalidAddress(address.to_string()));
    }

    Ok(authority.to_string())
}
