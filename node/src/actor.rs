//! Actor-based concurrency for the node
//!
//! This module implements the single-writer pattern using Tokio actors:
//! one task owns the ledger, the registry, and the wallet key, and every
//! mutation (pool append, mint drain, block append, chain replace) is a
//! single message-handling step. The mint check runs synchronously inside
//! the same step as the transaction that filled the pool, so "check pool
//! size, drain, seal" can never interleave with another append.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │              HTTP handlers (actix-web)                │
//! │        /register /transactions /blocks /sync          │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       │ NodeHandle (Clone)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              NodeActor (single task)                  │
//! │   Ledger (chain + pool) · Registry · KeyPair          │
//! │   validate → pool → mint-check, one message at a time │
//! └─────────────────────┬────────────────────────────────┘
//!                       │ minted blocks returned to caller
//!                       ▼
//!              broadcast outside the critical section
//! ```

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::{mpsc, oneshot};

use chain_core::{
    accounts, selection,
    types::{Block, Party, PublicKey, Transaction, TxKind},
    KeyPair, Ledger, Peer, Registry,
};

use crate::{config::NodeConfig, metrics::Metrics, Error, Result};

/// Coins credited to every newly registered node
pub const WELCOME_CREDIT: Decimal = dec!(1000);

/// Result of accepting a transaction
#[derive(Debug, Clone)]
pub struct TxOutcome {
    /// The pooled transaction (signed, in canonical form)
    pub transaction: Transaction,

    /// The block this node sealed, if the pool reached capacity and the
    /// draw elected this node
    pub minted: Option<Block>,
}

/// Result of registering a peer on the bootstrap node
#[derive(Debug, Clone)]
pub struct RegistrationOutcome {
    /// Assigned node id
    pub node_id: u64,

    /// Chain snapshot after the welcome credit
    pub chain: Vec<Block>,

    /// Pool snapshot after the welcome credit
    pub pool: Vec<Transaction>,

    /// Registry snapshot including the newcomer
    pub peers: BTreeMap<u64, Peer>,

    /// Whether the registry just reached the expected network size
    pub registry_complete: bool,

    /// The welcome transaction, for broadcast to the other peers
    pub welcome: Transaction,

    /// The block sealed by the welcome credit, if any
    pub minted: Option<Block>,

    /// Broadcast targets: every peer except this node and the newcomer
    pub targets: Vec<String>,
}

/// Point-in-time view of the node, for health reporting
#[derive(Debug, Clone)]
pub struct NodeStatus {
    /// This node's public key
    pub public_key: PublicKey,

    /// This node's id, once registered
    pub node_id: Option<u64>,

    /// Chain length
    pub height: usize,

    /// Pending pool size
    pub pool: usize,

    /// Registered peer count
    pub peers: usize,
}

/// Message sent to the node actor
pub enum NodeMessage {
    /// Accept a transaction from the wire
    SubmitTransaction {
        /// The wire transaction
        tx: Transaction,
        /// Response channel
        response: oneshot::Sender<Result<TxOutcome>>,
    },

    /// Create, sign, and accept a transaction from this node's wallet
    CreateTransaction {
        /// Receiver (network sentinel for stake deposits)
        receiver: Party,
        /// Transaction kind
        kind: TxKind,
        /// Amount
        amount: Decimal,
        /// Message text
        message: String,
        /// Response channel
        response: oneshot::Sender<Result<TxOutcome>>,
    },

    /// Accept a sealed block from a peer
    SubmitBlock {
        /// The wire block
        block: Block,
        /// Response channel
        response: oneshot::Sender<Result<()>>,
    },

    /// Register a peer (bootstrap only)
    RegisterPeer {
        /// The peer's public key
        public_key: PublicKey,
        /// The peer's advertised address
        address: String,
        /// Response channel
        response: oneshot::Sender<Result<RegistrationOutcome>>,
    },

    /// Merge a propagated registry snapshot
    MergePeers {
        /// Peer snapshot
        peers: BTreeMap<u64, Peer>,
        /// Response channel
        response: oneshot::Sender<Result<()>>,
    },

    /// Adopt a candidate chain if valid and strictly longer
    Sync {
        /// Candidate chain
        chain: Vec<Block>,
        /// Candidate pool
        pool: Vec<Transaction>,
        /// Response channel
        response: oneshot::Sender<Result<bool>>,
    },

    /// Snapshot the chain and pool
    ChainSnapshot {
        /// Response channel
        response: oneshot::Sender<(Vec<Block>, Vec<Transaction>)>,
    },

    /// Snapshot the registry
    Peers {
        /// Response channel
        response: oneshot::Sender<BTreeMap<u64, Peer>>,
    },

    /// Broadcast targets: every registered address except this node's
    Targets {
        /// Response channel
        response: oneshot::Sender<Vec<String>>,
    },

    /// Health snapshot
    Status {
        /// Response channel
        response: oneshot::Sender<NodeStatus>,
    },

    /// Shutdown the actor
    Shutdown,
}

impl std::fmt::Debug for NodeMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NodeMessage::SubmitTransaction { .. } => "SubmitTransaction",
            NodeMessage::CreateTransaction { .. } => "CreateTransaction",
            NodeMessage::SubmitBlock { .. } => "SubmitBlock",
            NodeMessage::RegisterPeer { .. } => "RegisterPeer",
            NodeMessage::MergePeers { .. } => "MergePeers",
            NodeMessage::Sync { .. } => "Sync",
            NodeMessage::ChainSnapshot { .. } => "ChainSnapshot",
            NodeMessage::Peers { .. } => "Peers",
            NodeMessage::Targets { .. } => "Targets",
            NodeMessage::Status { .. } => "Status",
            NodeMessage::Shutdown => "Shutdown",
        };
        f.write_str(name)
    }
}

/// Actor that owns the node's mutable chain state
pub struct NodeActor {
    ledger: Ledger,
    registry: Registry,
    keypair: KeyPair,
    config: NodeConfig,
    metrics: Metrics,
    mailbox: mpsc::Receiver<NodeMessage>,
}

impl std::fmt::Debug for NodeActor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeActor")
            .field("height", &self.ledger.height())
            .field("pool", &self.ledger.pool().len())
            .field("peers", &self.registry.len())
            .finish()
    }
}

impl NodeActor {
    /// Create a new actor
    pub fn new(
        ledger: Ledger,
        registry: Registry,
        keypair: KeyPair,
        config: NodeConfig,
        metrics: Metrics,
        mailbox: mpsc::Receiver<NodeMessage>,
    ) -> Self {
        Self {
            ledger,
            registry,
            keypair,
            config,
            metrics,
            mailbox,
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                NodeMessage::Shutdown => break,
                msg => self.handle_message(msg),
            }
        }
    }

    /// Handle a single message
    fn handle_message(&mut self, msg: NodeMessage) {
        match msg {
            NodeMessage::SubmitTransaction { tx, response } => {
                let _ = response.send(self.accept_transaction(tx));
            }

            NodeMessage::CreateTransaction {
                receiver,
                kind,
                amount,
                message,
                response,
            } => {
                let _ = response.send(self.create_transaction(receiver, kind, amount, message));
            }

            NodeMessage::SubmitBlock { block, response } => {
                let _ = response.send(self.accept_block(block));
            }

            NodeMessage::RegisterPeer {
                public_key,
                address,
                response,
            } => {
                let _ = response.send(self.register_peer(public_key, address));
            }

            NodeMessage::MergePeers { peers, response } => {
                self.registry.merge(peers);
                tracing::info!(peers = self.registry.len(), "peer registry updated");
                let _ = response.send(Ok(()));
            }

            NodeMessage::Sync {
                chain,
                pool,
                response,
            } => {
                let adopted = self.ledger.adopt(chain, pool);
                if adopted {
                    self.metrics.chain_height.set(self.ledger.height() as i64);
                }
                let _ = response.send(Ok(adopted));
            }

            NodeMessage::ChainSnapshot { response } => {
                let _ = response.send((
                    self.ledger.chain().to_vec(),
                    self.ledger.pool().to_vec(),
                ));
            }

            NodeMessage::Peers { response } => {
                let _ = response.send(self.registry.snapshot());
            }

            NodeMessage::Targets { response } => {
                let _ = response.send(
                    self.registry.addresses_except(&self.keypair.public_key()),
                );
            }

            NodeMessage::Status { response } => {
                let _ = response.send(NodeStatus {
                    public_key: self.keypair.public_key(),
                    node_id: self.registry.find_by_key(&self.keypair.public_key()),
                    height: self.ledger.height(),
                    pool: self.ledger.pool().len(),
                    peers: self.registry.len(),
                });
            }

            NodeMessage::Shutdown => {
                // Handled in the main loop
            }
        }
    }

    /// Stakes of all registered peers in ascending node-id order
    fn stake_table(&self) -> Vec<(PublicKey, Decimal)> {
        self.registry
            .ordered_peers()
            .map(|(_, peer)| {
                (
                    peer.public_key,
                    accounts::stake_of(self.ledger.chain(), self.ledger.pool(), &peer.public_key),
                )
            })
            .collect()
    }

    /// Seal the next block iff the pool is full and the draw elects this
    /// node for the current tip
    fn mint_check(&mut self) -> Result<Option<Block>> {
        if self.ledger.pool().len() < self.ledger.capacity() {
            return Ok(None);
        }
        let Some(tip) = self.ledger.tip() else {
            return Ok(None);
        };
        let seed = tip.current_hash;

        let table = self.stake_table();
        let Some(validator) = selection::select_validator(&seed, &table) else {
            tracing::warn!("pool is full but total stake is zero, nobody can mint");
            return Ok(None);
        };
        if validator != self.keypair.public_key() {
            tracing::debug!(validator = %validator, "another peer seals the next block");
            return Ok(None);
        }

        let minted = self.ledger.try_mint(validator)?;
        if let Some(block) = &minted {
            self.metrics.blocks_minted.inc();
            self.metrics.chain_height.set(self.ledger.height() as i64);
            tracing::info!(
                index = block.index,
                transactions = block.transactions.len(),
                "minted block"
            );
        }
        Ok(minted)
    }

    /// Validate, pool, and mint-check in one critical section
    fn accept_transaction(&mut self, tx: Transaction) -> Result<TxOutcome> {
        if self.ledger.contains(&tx.id) {
            self.metrics.transactions_rejected.inc();
            return Err(chain_core::Error::DuplicateTransaction(tx.id.to_string()).into());
        }
        if let Err(err) =
            accounts::validate_transaction(self.ledger.chain(), self.ledger.pool(), &tx)
        {
            self.metrics.transactions_rejected.inc();
            tracing::debug!(id = %tx.id, error = %err, "rejected transaction");
            return Err(err.into());
        }

        self.ledger.add_transaction_to_pool(tx.clone());
        self.metrics.transactions_accepted.inc();
        tracing::debug!(id = %tx.id, kind = ?tx.kind, "pooled transaction");

        let minted = self.mint_check()?;
        Ok(TxOutcome {
            transaction: tx,
            minted,
        })
    }

    /// Sign a wallet transaction with the next nonce and accept it
    fn create_transaction(
        &mut self,
        receiver: Party,
        kind: TxKind,
        amount: Decimal,
        message: String,
    ) -> Result<TxOutcome> {
        let sender = self.keypair.public_key();
        let nonce = accounts::next_nonce(self.ledger.chain(), self.ledger.pool(), &sender);
        let mut tx = Transaction::new(Party::Key(sender), receiver, kind, amount, message, nonce);
        tx.sign(&self.keypair)?;
        self.accept_transaction(tx)
    }

    /// Validate a peer's block, re-deriving the validator, and append it
    fn accept_block(&mut self, block: Block) -> Result<()> {
        if block.transactions.len() > self.ledger.capacity() {
            return Err(chain_core::Error::Capacity {
                got: block.transactions.len(),
                capacity: self.ledger.capacity(),
            }
            .into());
        }

        // Every node re-runs the same draw; a block whose claimed validator
        // differs is rejected outright
        let table = self.stake_table();
        let expected = selection::select_validator(&block.previous_hash, &table);
        if expected != Some(block.validator) {
            self.metrics.transactions_rejected.inc();
            return Err(chain_core::Error::SelectionMismatch.into());
        }

        for tx in &block.transactions {
            if !tx.verify() {
                return Err(chain_core::Error::Signature(format!(
                    "block {} carries transaction {} with a bad signature",
                    block.index, tx.id
                ))
                .into());
            }
        }

        let index = block.index;
        self.ledger.append_block(block)?;
        self.metrics.blocks_received.inc();
        self.metrics.chain_height.set(self.ledger.height() as i64);
        tracing::info!(index, "appended peer block");
        Ok(())
    }

    /// Register a peer and pool its welcome credit (bootstrap only)
    fn register_peer(
        &mut self,
        public_key: PublicKey,
        address: String,
    ) -> Result<RegistrationOutcome> {
        if !self.config.bootstrap {
            return Err(Error::Registration(
                "only the bootstrap node accepts registrations".to_string(),
            ));
        }

        let node_id = self.registry.register(public_key, address)?;
        tracing::info!(node_id, key = %public_key, "registered peer");

        let sender = self.keypair.public_key();
        let nonce = accounts::next_nonce(self.ledger.chain(), self.ledger.pool(), &sender);
        let mut welcome = Transaction::new(
            Party::Key(sender),
            Party::Key(public_key),
            TxKind::Welcome,
            WELCOME_CREDIT,
            "",
            nonce,
        );
        welcome.sign(&self.keypair)?;
        let outcome = self.accept_transaction(welcome.clone())?;

        let targets: Vec<String> = self
            .registry
            .ordered_peers()
            .filter(|(_, peer)| {
                peer.public_key != sender && peer.public_key != public_key
            })
            .map(|(_, peer)| peer.address.clone())
            .collect();

        Ok(RegistrationOutcome {
            node_id,
            chain: self.ledger.chain().to_vec(),
            pool: self.ledger.pool().to_vec(),
            peers: self.registry.snapshot(),
            registry_complete: self.registry.is_complete(),
            welcome,
            minted: outcome.minted,
            targets,
        })
    }
}

/// Handle for sending messages to the actor
#[derive(Debug, Clone)]
pub struct NodeHandle {
    sender: mpsc::Sender<NodeMessage>,
}

impl NodeHandle {
    fn closed<T>() -> Result<T> {
        Err(Error::Concurrency("Actor mailbox closed".to_string()))
    }

    async fn request<T>(
        &self,
        msg: NodeMessage,
        rx: oneshot::Receiver<T>,
    ) -> Result<T> {
        if self.sender.send(msg).await.is_err() {
            return Self::closed();
        }
        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))
    }

    /// Accept a transaction from the wire
    pub async fn submit_transaction(&self, tx: Transaction) -> Result<TxOutcome> {
        let (tx_resp, rx) = oneshot::channel();
        self.request(
            NodeMessage::SubmitTransaction {
                tx,
                response: tx_resp,
            },
            rx,
        )
        .await?
    }

    /// Create, sign, and accept a wallet transaction
    pub async fn create_transaction(
        &self,
        receiver: Party,
        kind: TxKind,
        amount: Decimal,
        message: String,
    ) -> Result<TxOutcome> {
        let (tx_resp, rx) = oneshot::channel();
        self.request(
            NodeMessage::CreateTransaction {
                receiver,
                kind,
                amount,
                message,
                response: tx_resp,
            },
            rx,
        )
        .await?
    }

    /// Accept a sealed block from a peer
    pub async fn submit_block(&self, block: Block) -> Result<()> {
        let (tx_resp, rx) = oneshot::channel();
        self.request(
            NodeMessage::SubmitBlock {
                block,
                response: tx_resp,
            },
            rx,
        )
        .await?
    }

    /// Register a peer (bootstrap only)
    pub async fn register_peer(
        &self,
        public_key: PublicKey,
        address: String,
    ) -> Result<RegistrationOutcome> {
        let (tx_resp, rx) = oneshot::channel();
        self.request(
            NodeMessage::RegisterPeer {
                public_key,
                address,
                response: tx_resp,
            },
            rx,
        )
        .await?
    }

    /// Merge a propagated registry snapshot
    pub async fn merge_peers(&self, peers: BTreeMap<u64, Peer>) -> Result<()> {
        let (tx_resp, rx) = oneshot::channel();
        self.request(
            NodeMessage::MergePeers {
                peers,
                response: tx_resp,
            },
            rx,
        )
        .await?
    }

    /// Adopt a candidate chain if valid and strictly longer
    pub async fn sync(&self, chain: Vec<Block>, pool: Vec<Transaction>) -> Result<bool> {
        let (tx_resp, rx) = oneshot::channel();
        self.request(
            NodeMessage::Sync {
                chain,
                pool,
                response: tx_resp,
            },
            rx,
        )
        .await?
    }

    /// Snapshot the chain and pool
    pub async fn chain_snapshot(&self) -> Result<(Vec<Block>, Vec<Transaction>)> {
        let (tx_resp, rx) = oneshot::channel();
        self.request(NodeMessage::ChainSnapshot { response: tx_resp }, rx)
            .await
    }

    /// Snapshot the registry
    pub async fn peers(&self) -> Result<BTreeMap<u64, Peer>> {
        let (tx_resp, rx) = oneshot::channel();
        self.request(NodeMessage::Peers { response: tx_resp }, rx)
            .await
    }

    /// Broadcast targets: every registered address except this node's
    pub async fn targets(&self) -> Result<Vec<String>> {
        let (tx_resp, rx) = oneshot::channel();
        self.request(NodeMessage::Targets { response: tx_resp }, rx)
            .await
    }

    /// Health snapshot
    pub async fn status(&self) -> Result<NodeStatus> {
        let (tx_resp, rx) = oneshot::channel();
        self.request(NodeMessage::Status { response: tx_resp }, rx)
            .await
    }

    /// Shutdown the actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(NodeMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))
    }
}

/// Spawn the node actor
pub fn spawn_node_actor(
    ledger: Ledger,
    registry: Registry,
    keypair: KeyPair,
    config: NodeConfig,
    metrics: Metrics,
) -> NodeHandle {
    let (tx, rx) = mpsc::channel(1000); // Bounded channel for backpressure
    let actor = NodeActor::new(ledger, registry, keypair, config, metrics, rx);

    tokio::spawn(async move {
        actor.run().await;
    });

    NodeHandle { sender: tx }
}
