//! HTTP surface of the node
//!
//! Routes mirror the protocol operations: peer registration (bootstrap
//! only), transaction ingestion, block ingestion, chain queries, and chain
//! sync. Handlers forward to the single-writer actor and do all peer
//! broadcasting on their own side of the reply, outside the ledger's
//! critical section.

use std::collections::BTreeMap;

use actix_web::{web, HttpResponse, Responder};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use chain_core::types::{Block, Party, PublicKey, Transaction, TxKind};
use chain_core::Peer;

use crate::{actor::NodeHandle, gossip::Broadcaster, metrics::Metrics, Error};

/// Shared handler state
#[derive(Debug, Clone)]
pub struct AppState {
    /// Handle to the node actor
    pub handle: NodeHandle,

    /// Peer broadcast client
    pub broadcaster: Broadcaster,

    /// Metrics collector
    pub metrics: Metrics,
}

/// Registration request from a joining node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    /// The joining node's public key
    pub public_key: PublicKey,

    /// The joining node's advertised address
    pub address: String,
}

/// Registration response: the assigned id plus full state snapshots
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    /// Assigned node id
    pub node_id: u64,

    /// Chain snapshot
    pub chain: Vec<Block>,

    /// Pool snapshot
    pub pool: Vec<Transaction>,

    /// Registry snapshot
    pub peers: BTreeMap<u64, Peer>,
}

/// Local transaction origination request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRequest {
    /// Receiving peer's node id
    pub receiver_id: u64,

    /// Transaction kind (`coin` or `message`)
    pub kind: TxKind,

    /// Amount (ignored for messages, which cost their length)
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,

    /// Message text
    #[serde(default)]
    pub message: String,
}

/// Stake deposit request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakeRequest {
    /// New stake amount
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
}

/// Chain sync request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRequest {
    /// Candidate chain
    pub chain: Vec<Block>,

    /// Candidate pool
    pub pool: Vec<Transaction>,
}

#[derive(Debug, Serialize)]
struct AcceptedResponse {
    accepted: bool,
}

#[derive(Debug, Serialize)]
struct RejectedResponse {
    accepted: bool,
    error: String,
}

#[derive(Debug, Serialize)]
struct ChainResponse {
    chain: Vec<Block>,
    length: usize,
}

#[derive(Debug, Serialize)]
struct AdoptedResponse {
    adopted: bool,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    service: String,
    version: String,
    node_id: Option<u64>,
    height: usize,
    peers: usize,
}

fn rejected(err: Error) -> HttpResponse {
    let body = RejectedResponse {
        accepted: false,
        error: err.to_string(),
    };
    match err {
        Error::Chain(_) => HttpResponse::BadRequest().json(body),
        Error::Registration(_) => HttpResponse::Forbidden().json(body),
        _ => HttpResponse::InternalServerError().json(body),
    }
}

/// POST /register (bootstrap only)
async fn register(
    state: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> impl Responder {
    let request = body.into_inner();
    match state
        .handle
        .register_peer(request.public_key, request.address)
        .await
    {
        Ok(outcome) => {
            // The other peers hear about the welcome credit and any block
            // it sealed; the newcomer already holds both in its snapshot
            state
                .broadcaster
                .broadcast_transaction(&outcome.targets, &outcome.welcome);
            if let Some(block) = &outcome.minted {
                state.broadcaster.broadcast_block(&outcome.targets, block);
            }
            if outcome.registry_complete {
                state
                    .broadcaster
                    .broadcast_peers(&outcome.targets, &outcome.peers);
            }

            HttpResponse::Ok().json(RegisterResponse {
                node_id: outcome.node_id,
                chain: outcome.chain,
                pool: outcome.pool,
                peers: outcome.peers,
            })
        }
        Err(err) => rejected(err),
    }
}

/// POST /transactions: accept a wire transaction, mint when the pool fills
async fn submit_transaction(
    state: web::Data<AppState>,
    body: web::Json<Transaction>,
) -> impl Responder {
    match state.handle.submit_transaction(body.into_inner()).await {
        Ok(outcome) => {
            if let Some(block) = &outcome.minted {
                broadcast_minted(&state, block).await;
            }
            HttpResponse::Ok().json(AcceptedResponse { accepted: true })
        }
        Err(err) => rejected(err),
    }
}

/// POST /transactions/create: originate a transaction from this wallet
async fn create_transaction(
    state: web::Data<AppState>,
    body: web::Json<CreateRequest>,
) -> impl Responder {
    let request = body.into_inner();

    let peers = match state.handle.peers().await {
        Ok(peers) => peers,
        Err(err) => return rejected(err),
    };
    let Some(receiver) = peers.get(&request.receiver_id) else {
        return rejected(Error::Chain(chain_core::Error::UnknownPeer(format!(
            "node id {}",
            request.receiver_id
        ))));
    };

    match state
        .handle
        .create_transaction(
            Party::Key(receiver.public_key),
            request.kind,
            request.amount,
            request.message,
        )
        .await
    {
        Ok(outcome) => {
            fan_out(&state, &outcome.transaction, outcome.minted.as_ref()).await;
            HttpResponse::Ok().json(AcceptedResponse { accepted: true })
        }
        Err(err) => rejected(err),
    }
}

/// POST /stake: deposit stake to the network sink
async fn stake(state: web::Data<AppState>, body: web::Json<StakeRequest>) -> impl Responder {
    match state
        .handle
        .create_transaction(
            Party::Network,
            TxKind::Stake,
            body.into_inner().amount,
            String::new(),
        )
        .await
    {
        Ok(outcome) => {
            fan_out(&state, &outcome.transaction, outcome.minted.as_ref()).await;
            HttpResponse::Ok().json(AcceptedResponse { accepted: true })
        }
        Err(err) => rejected(err),
    }
}

/// POST /blocks: accept a peer's sealed block
async fn submit_block(state: web::Data<AppState>, body: web::Json<Block>) -> impl Responder {
    match state.handle.submit_block(body.into_inner()).await {
        Ok(()) => HttpResponse::Ok().json(AcceptedResponse { accepted: true }),
        Err(err) => rejected(err),
    }
}

/// GET /chain: full chain snapshot
async fn chain(state: web::Data<AppState>) -> impl Responder {
    match state.handle.chain_snapshot().await {
        Ok((chain, _)) => {
            let length = chain.len();
            HttpResponse::Ok().json(ChainResponse { chain, length })
        }
        Err(err) => rejected(err),
    }
}

/// POST /sync: offer a candidate chain for adoption
async fn sync(state: web::Data<AppState>, body: web::Json<SyncRequest>) -> impl Responder {
    let request = body.into_inner();
    match state.handle.sync(request.chain, request.pool).await {
        Ok(adopted) => HttpResponse::Ok().json(AdoptedResponse { adopted }),
        Err(err) => rejected(err),
    }
}

/// POST /peers: merge a propagated registry snapshot
async fn peers(
    state: web::Data<AppState>,
    body: web::Json<BTreeMap<u64, Peer>>,
) -> impl Responder {
    match state.handle.merge_peers(body.into_inner()).await {
        Ok(()) => HttpResponse::Ok().json(AcceptedResponse { accepted: true }),
        Err(err) => rejected(err),
    }
}

/// GET /health
async fn health(state: web::Data<AppState>) -> impl Responder {
    match state.handle.status().await {
        Ok(status) => HttpResponse::Ok().json(HealthResponse {
            status: "healthy".to_string(),
            service: "chain-node".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            node_id: status.node_id,
            height: status.height,
            peers: status.peers,
        }),
        Err(err) => rejected(err),
    }
}

/// GET /metrics: Prometheus text encoding
async fn metrics(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(state.metrics.encode_text())
}

/// Push an originated transaction (and any block it minted) to the peers
async fn fan_out(state: &web::Data<AppState>, tx: &Transaction, minted: Option<&Block>) {
    let targets = match state.handle.targets().await {
        Ok(targets) => targets,
        Err(err) => {
            tracing::warn!(error = %err, "could not resolve broadcast targets");
            return;
        }
    };
    state.broadcaster.broadcast_transaction(&targets, tx);
    if let Some(block) = minted {
        state.broadcaster.broadcast_block(&targets, block);
    }
}

/// Push a freshly minted block to the peers
async fn broadcast_minted(state: &web::Data<AppState>, block: &Block) {
    match state.handle.targets().await {
        Ok(targets) => state.broadcaster.broadcast_block(&targets, block),
        Err(err) => tracing::warn!(error = %err, "could not resolve broadcast targets"),
    }
}

/// Wire up all routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/register", web::post().to(register))
        .route("/transactions", web::post().to(submit_transaction))
        .route("/transactions/create", web::post().to(create_transaction))
        .route("/stake", web::post().to(stake))
        .route("/blocks", web::post().to(submit_block))
        .route("/chain", web::get().to(chain))
        .route("/sync", web::post().to(sync))
        .route("/peers", web::post().to(peers))
        .route("/health", web::get().to(health))
        .route("/metrics", web::get().to(metrics));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::spawn_node_actor;
    use crate::config::NodeConfig;
    use crate::node::bootstrap_state;
    use actix_web::{test, App};
    use chain_core::KeyPair;
    use std::time::Duration;

    fn test_state() -> AppState {
        let config = NodeConfig {
            bootstrap: true,
            total_nodes: 2,
            ..NodeConfig::default()
        };
        let keypair = KeyPair::from_seed(&[1u8; 32]);
        let (ledger, registry) = bootstrap_state(&config, &keypair).unwrap();
        let metrics = Metrics::new().unwrap();
        let handle = spawn_node_actor(ledger, registry, keypair, config, metrics.clone());
        let broadcaster =
            Broadcaster::new(Duration::from_millis(100), metrics.clone()).unwrap();
        AppState {
            handle,
            broadcaster,
            metrics,
        }
    }

    #[actix_web::test]
    async fn test_health_route() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state()))
                .configure(configure_routes),
        )
        .await;

        let request = test::TestRequest::get().uri("/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["height"], 1);
        assert_eq!(body["node_id"], 0);
    }

    #[actix_web::test]
    async fn test_chain_route() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state()))
                .configure(configure_routes),
        )
        .await;

        let request = test::TestRequest::get().uri("/chain").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(body["length"], 1);
        assert_eq!(body["chain"][0]["index"], 0);
    }

    #[actix_web::test]
    async fn test_register_route_assigns_id_and_snapshots() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state()))
                .configure(configure_routes),
        )
        .await;

        let newcomer = KeyPair::from_seed(&[7u8; 32]);
        let request = test::TestRequest::post()
            .uri("/register")
            .set_json(RegisterRequest {
                public_key: newcomer.public_key(),
                address: "http://peer:8001".to_string(),
            })
            .to_request();
        let body: RegisterResponse = test::call_and_read_body_json(&app, request).await;

        assert_eq!(body.node_id, 1);
        assert_eq!(body.chain.len(), 1);
        // Stake deposit plus the welcome credit
        assert_eq!(body.pool.len(), 2);
        assert_eq!(body.peers.len(), 2);
    }

    #[actix_web::test]
    async fn test_submit_transaction_rejects_garbage() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state()))
                .configure(configure_routes),
        )
        .await;

        // Unsigned coin transaction fails validation with 400
        let stranger = KeyPair::from_seed(&[8u8; 32]);
        let tx = Transaction::new(
            Party::Key(stranger.public_key()),
            Party::Network,
            TxKind::Coin,
            rust_decimal_macros::dec!(5),
            "",
            2,
        );
        let request = test::TestRequest::post()
            .uri("/transactions")
            .set_json(tx)
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), actix_web::http::StatusCode::BAD_REQUEST);
    }
}
