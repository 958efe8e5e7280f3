//! Core types for the chain
//!
//! All types are designed for:
//! - Deterministic hashing (fields fed to SHA-256 in a fixed order)
//! - Lossless wire round-trips (JSON with base64/hex binary fields)
//! - Exact arithmetic (Decimal for amounts)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::crypto::{self, KeyPair};
use crate::{Error, Result};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

/// SHA-256 digest, lowercase hex on the wire
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(into = "String", try_from = "String")]
pub struct Hash256([u8; 32]);

impl Hash256 {
    /// Reserved all-zero digest, used as the genesis block's parent
    pub const fn zero() -> Self {
        Self([0u8; 32])
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<Hash256> for String {
    fn from(hash: Hash256) -> Self {
        hex::encode(hash.0)
    }
}

impl TryFrom<String> for Hash256 {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        let bytes = hex::decode(&value).map_err(|e| format!("invalid hash hex: {}", e))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| "hash must be 32 bytes".to_string())?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Ed25519 public key, base64 on the wire
///
/// `Ord` matters: peer iteration order is part of the consensus contract.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(into = "String", try_from = "String")]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<PublicKey> for String {
    fn from(key: PublicKey) -> Self {
        BASE64.encode(key.0)
    }
}

impl TryFrom<String> for PublicKey {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        let bytes = BASE64
            .decode(&value)
            .map_err(|e| format!("invalid public key base64: {}", e))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| "public key must be 32 bytes".to_string())?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", BASE64.encode(self.0))
    }
}

/// Ed25519 signature (64 bytes), base64 on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Signature([u8; 64]);

impl Signature {
    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

impl From<Signature> for String {
    fn from(sig: Signature) -> Self {
        BASE64.encode(sig.0)
    }
}

impl TryFrom<String> for Signature {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        let bytes = BASE64
            .decode(&value)
            .map_err(|e| format!("invalid signature base64: {}", e))?;
        let bytes: [u8; 64] = bytes
            .try_into()
            .map_err(|_| "signature must be 64 bytes".to_string())?;
        Ok(Self(bytes))
    }
}

/// A transaction endpoint: either a participant key or the `"0"` network
/// sentinel (genesis sender, stake sink receiver)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Party {
    /// The reserved network identity
    Network,
    /// A participant public key
    Key(PublicKey),
}

impl Party {
    /// The participant key, if any
    pub fn key(&self) -> Option<&PublicKey> {
        match self {
            Party::Network => None,
            Party::Key(key) => Some(key),
        }
    }

    /// Whether this is the network sentinel
    pub fn is_network(&self) -> bool {
        matches!(self, Party::Network)
    }

    /// Canonical byte form used in identity hashing
    fn canonical_bytes(&self) -> Vec<u8> {
        match self {
            Party::Network => b"0".to_vec(),
            Party::Key(key) => key.as_bytes().to_vec(),
        }
    }
}

impl From<Party> for String {
    fn from(party: Party) -> Self {
        match party {
            Party::Network => "0".to_string(),
            Party::Key(key) => String::from(key),
        }
    }
}

impl TryFrom<String> for Party {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        if value == "0" {
            return Ok(Party::Network);
        }
        PublicKey::try_from(value).map(Party::Key)
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Party::Network => write!(f, "0"),
            Party::Key(key) => write!(f, "{}", key),
        }
    }
}

/// Transaction kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    /// Coin transfer (carries the 3% network fee)
    Coin,
    /// Text message (costs its character count)
    Message,
    /// Stake deposit to the network sink
    Stake,
    /// Genesis credit from the network
    Genesis,
    /// Bootstrap credit to a newly registered node
    Welcome,
}

impl TxKind {
    /// Stable tag used in canonical hashing
    pub fn tag(&self) -> &'static str {
        match self {
            TxKind::Coin => "coin",
            TxKind::Message => "message",
            TxKind::Stake => "stake",
            TxKind::Genesis => "genesis",
            TxKind::Welcome => "welcome",
        }
    }
}

/// Length-prefixed field update, so variable-length fields cannot collide
fn update_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}

/// An immutable value transfer, message, stake deposit, or bootstrap credit
///
/// The identity hash is computed once at construction and never recomputed
/// from mutated fields; the signature covers the identity hash only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Sender (network sentinel for genesis)
    pub sender: Party,

    /// Receiver (network sentinel for stake deposits)
    pub receiver: Party,

    /// Transaction kind
    pub kind: TxKind,

    /// Amount (exact decimal, non-negative)
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,

    /// Message text (used by the `message` kind; its length is its cost)
    pub message: String,

    /// Monotonic per-sender counter for replay protection
    pub nonce: u64,

    /// Identity hash over (sender, receiver, amount, message, nonce)
    pub id: Hash256,

    /// Signature over the identity hash, empty for system-originated kinds
    pub signature: Option<Signature>,
}

impl Transaction {
    /// Create an unsigned transaction, computing its identity hash
    pub fn new(
        sender: Party,
        receiver: Party,
        kind: TxKind,
        amount: Decimal,
        message: impl Into<String>,
        nonce: u64,
    ) -> Self {
        let message = message.into();
        let id = Self::identity_hash(&sender, &receiver, amount, &message, nonce);

        Self {
            sender,
            receiver,
            kind,
            amount,
            message,
            nonce,
            id,
            signature: None,
        }
    }

    /// Digest over (sender, receiver, amount, message, nonce), fixed order
    fn identity_hash(
        sender: &Party,
        receiver: &Party,
        amount: Decimal,
        message: &str,
        nonce: u64,
    ) -> Hash256 {
        let mut hasher = Sha256::new();
        update_field(&mut hasher, &sender.canonical_bytes());
        update_field(&mut hasher, &receiver.canonical_bytes());
        update_field(&mut hasher, amount.normalize().to_string().as_bytes());
        update_field(&mut hasher, message.as_bytes());
        hasher.update(nonce.to_be_bytes());
        Hash256::from_bytes(hasher.finalize().into())
    }

    /// Full canonical byte form (identity hash + kind + signature), used by
    /// block hashing
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(32 + 8 + 64);
        bytes.extend_from_slice(self.id.as_bytes());
        bytes.extend_from_slice(self.kind.tag().as_bytes());
        if let Some(signature) = &self.signature {
            bytes.extend_from_slice(signature.as_bytes());
        }
        bytes
    }

    /// Sign with the sender's private key
    ///
    /// Fails when the key does not correspond to the sender; system
    /// transactions (network sender) carry no signature at all.
    pub fn sign(&mut self, keypair: &KeyPair) -> Result<()> {
        match self.sender {
            Party::Key(sender) if sender == keypair.public_key() => {
                self.signature = Some(keypair.sign(self.id.as_bytes()));
                Ok(())
            }
            Party::Key(_) => Err(Error::Signature(
                "signing key does not match the sender".to_string(),
            )),
            Party::Network => Err(Error::Signature(
                "system transactions are not signed".to_string(),
            )),
        }
    }

    /// Whether this transaction skips signature verification
    ///
    /// Genesis and welcome credits are system-originated; a stake deposit
    /// with nonce <= 1 is the registration-time baseline deposit.
    pub fn is_bootstrap_exempt(&self) -> bool {
        match self.kind {
            TxKind::Genesis | TxKind::Welcome => true,
            TxKind::Stake => self.nonce <= 1,
            _ => false,
        }
    }

    /// Verify the signature against the sender's public key
    pub fn verify(&self) -> bool {
        if self.is_bootstrap_exempt() {
            return true;
        }
        let (Party::Key(sender), Some(signature)) = (&self.sender, &self.signature) else {
            return false;
        };
        crypto::verify_signature(self.id.as_bytes(), signature, sender)
    }
}

/// An immutable (once sealed) container of transactions, hash-linked to its
/// predecessor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// 0-based height
    pub index: u64,

    /// Seal timestamp (excluded from the content hash)
    pub timestamp: DateTime<Utc>,

    /// Ordered transactions, at most `capacity` of them
    pub transactions: Vec<Transaction>,

    /// Public key of the minting validator
    pub validator: PublicKey,

    /// Content hash of the predecessor (zero sentinel for genesis)
    pub previous_hash: Hash256,

    /// Content hash over (index, transactions, validator, previous_hash)
    pub current_hash: Hash256,

    /// Per-block transaction capacity (excluded from the content hash)
    pub capacity: usize,
}

impl Block {
    /// Seal a new block
    ///
    /// A transaction set larger than `capacity` is a caller error, not a
    /// silent truncation.
    pub fn seal(
        index: u64,
        transactions: Vec<Transaction>,
        validator: PublicKey,
        previous_hash: Hash256,
        capacity: usize,
    ) -> Result<Self> {
        if transactions.len() > capacity {
            return Err(Error::Capacity {
                got: transactions.len(),
                capacity,
            });
        }

        let mut block = Self {
            index,
            timestamp: Utc::now(),
            transactions,
            validator,
            previous_hash,
            current_hash: Hash256::zero(),
            capacity,
        };
        block.current_hash = block.compute_hash();
        Ok(block)
    }

    /// Recompute the content hash
    ///
    /// Timestamp and capacity are excluded so re-serialization is
    /// deterministic regardless of wall-clock or config echoing.
    pub fn compute_hash(&self) -> Hash256 {
        let mut hasher = Sha256::new();
        hasher.update(self.index.to_be_bytes());
        for tx in &self.transactions {
            update_field(&mut hasher, &tx.canonical_bytes());
        }
        hasher.update(self.validator.as_bytes());
        hasher.update(self.previous_hash.as_bytes());
        Hash256::from_bytes(hasher.finalize().into())
    }
}
