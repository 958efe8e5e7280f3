//! Peer registry
//!
//! Maps stable node ids to peers. Node id 0 is always the bootstrap node;
//! ids are assigned by the bootstrap in increasing order at registration
//! time and never reused. Iteration order (ascending node id, structural in
//! the `BTreeMap`) is part of the consensus contract: validator selection
//! walks it identically on every node.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::PublicKey;
use crate::{Error, Result};

/// A registered peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    /// The peer's public key
    pub public_key: PublicKey,

    /// The peer's network address (base URL)
    pub address: String,
}

/// Node-id to peer mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registry {
    peers: BTreeMap<u64, Peer>,
    next_id: u64,
    expected_total: usize,
}

impl Registry {
    /// Create an empty registry for a network of `expected_total` nodes
    pub fn new(expected_total: usize) -> Self {
        Self {
            peers: BTreeMap::new(),
            next_id: 0,
            expected_total,
        }
    }

    /// Register a peer, assigning the next sequential node id
    ///
    /// The first registration is the bootstrap node itself (id 0).
    pub fn register(&mut self, public_key: PublicKey, address: String) -> Result<u64> {
        if self.find_by_key(&public_key).is_some() {
            return Err(Error::DuplicatePeer(public_key.to_string()));
        }

        let id = self.next_id;
        self.peers.insert(id, Peer {
            public_key,
            address,
        });
        self.next_id += 1;
        Ok(id)
    }

    /// Whether the registry holds the expected total of peers
    pub fn is_complete(&self) -> bool {
        self.peers.len() >= self.expected_total
    }

    /// Number of registered peers
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Whether no peer has registered yet
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Peer by node id
    pub fn get(&self, id: u64) -> Option<&Peer> {
        self.peers.get(&id)
    }

    /// Node id for a public key
    pub fn find_by_key(&self, key: &PublicKey) -> Option<u64> {
        self.peers
            .iter()
            .find(|(_, peer)| &peer.public_key == key)
            .map(|(id, _)| *id)
    }

    /// Peers in ascending node-id order, the consensus-ordered view
    /// consumed by validator selection
    pub fn ordered_peers(&self) -> impl Iterator<Item = (u64, &Peer)> {
        self.peers.iter().map(|(id, peer)| (*id, peer))
    }

    /// Full snapshot for propagation to peers
    pub fn snapshot(&self) -> BTreeMap<u64, Peer> {
        self.peers.clone()
    }

    /// Merge a propagated snapshot, keeping assigned ids
    pub fn merge(&mut self, snapshot: BTreeMap<u64, Peer>) {
        for (id, peer) in snapshot {
            self.peers.insert(id, peer);
        }
        self.next_id = self
            .peers
            .keys()
            .last()
            .map(|max| max + 1)
            .unwrap_or(0);
    }

    /// Addresses of every peer except the given key (broadcast targets)
    pub fn addresses_except(&self, key: &PublicKey) -> Vec<String> {
        self.peers
            .values()
            .filter(|peer| &peer.public_key != key)
            .map(|peer| peer.address.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    fn key(seed: u8) -> PublicKey {
        KeyPair::from_seed(&[seed; 32]).public_key()
    }

    #[test]
    fn test_sequential_ids_from_zero() {
        let mut registry = Registry::new(3);
        assert_eq!(
            registry.register(key(1), "http://a:8000".into()).unwrap(),
            0
        );
        assert_eq!(
            registry.register(key(2), "http://b:8000".into()).unwrap(),
            1
        );
        assert_eq!(
            registry.register(key(3), "http://c:8000".into()).unwrap(),
            2
        );
        assert!(registry.is_complete());
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let mut registry = Registry::new(3);
        registry.register(key(1), "http://a:8000".into()).unwrap();
        assert!(matches!(
            registry.register(key(1), "http://elsewhere:9000".into()),
            Err(Error::DuplicatePeer(_))
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_ordered_peers_ascending() {
        let mut registry = Registry::new(3);
        registry.register(key(3), "http://a:8000".into()).unwrap();
        registry.register(key(1), "http://b:8000".into()).unwrap();
        registry.register(key(2), "http://c:8000".into()).unwrap();

        let ids: Vec<u64> = registry.ordered_peers().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_merge_keeps_ids_and_next_id() {
        let mut registry = Registry::new(3);
        let mut other = Registry::new(3);
        other.register(key(1), "http://a:8000".into()).unwrap();
        other.register(key(2), "http://b:8000".into()).unwrap();

        registry.merge(other.snapshot());
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.find_by_key(&key(2)), Some(1));

        // A later registration continues from the merged ids
        assert_eq!(
            registry.register(key(3), "http://c:8000".into()).unwrap(),
            2
        );
    }

    #[test]
    fn test_addresses_except_skips_own() {
        let mut registry = Registry::new(2);
        registry.register(key(1), "http://a:8000".into()).unwrap();
        registry.register(key(2), "http://b:8000".into()).unwrap();

        let targets = registry.addresses_except(&key(1));
        assert_eq!(targets, vec!["http://b:8000".to_string()]);
    }
}
