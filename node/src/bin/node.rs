//! StakeMesh node binary
//!
//! Boots a peer process: loads configuration, builds the initial state
//! (genesis for the bootstrap node, registration for everyone else), spawns
//! the single-writer actor, and serves the HTTP surface.

use std::time::Duration;

use actix_web::{web, App, HttpServer};
use anyhow::Context;
use tracing::info;

use chain_core::KeyPair;
use chain_node::{
    node, rest, rest::AppState, spawn_node_actor, Broadcaster, Metrics, NodeConfig,
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = match std::env::var("NODE_CONFIG") {
        Ok(path) => NodeConfig::from_file(&path).context("loading config file")?,
        Err(_) => NodeConfig::from_env().context("loading config from environment")?,
    };

    let keypair = KeyPair::generate();
    let public_key = keypair.public_key();
    info!(
        address = %config.api_url(),
        bootstrap = config.bootstrap,
        key = %public_key,
        "starting node"
    );

    let metrics = Metrics::new().context("building metrics registry")?;
    let (ledger, registry) = if config.bootstrap {
        node::bootstrap_state(&config, &keypair).context("building genesis state")?
    } else {
        node::empty_state(&config)
    };
    let handle = spawn_node_actor(ledger, registry, keypair, config.clone(), metrics.clone());

    if !config.bootstrap {
        let node_id = node::register_with_bootstrap(&handle, &config, public_key)
            .await
            .context("registering with the bootstrap node")?;
        info!(node_id, "registered with bootstrap node");
    }

    let broadcaster = Broadcaster::new(
        Duration::from_millis(config.broadcast_timeout_ms),
        metrics.clone(),
    )
    .context("building broadcast client")?;

    let state = web::Data::new(AppState {
        handle,
        broadcaster,
        metrics,
    });

    let bind = (config.host.clone(), config.port);
    info!(host = %bind.0, port = bind.1, "serving HTTP");
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(rest::configure_routes)
    })
    .bind(bind)?
    .run()
    .await?;

    Ok(())
}
