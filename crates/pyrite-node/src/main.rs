//! pyrite-node — the Pyrite full-node binary.
//!
//! Startup sequence:
//!   1. Load the JSON config and the node's key vault
//!   2. Open (or clear) the block database and bring up `Core`
//!      (genesis + persisted-chain replay + miner threads)
//!   3. Start the gossip network and bridge its events into `Core`
//!   4. Serve the public API (WebSocket + HTTP call adapter)

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};

use pyrite_chain::AdditionResult;
use pyrite_node::{Config, Core, CoreFacade, KeyVault};
use pyrite_p2p::{InboundEvent, Network, OutboundCommand, P2pConfig};
use pyrite_storage::{Database, OpenMode};

#[derive(Parser, Debug)]
#[command(name = "pyrite-node", version, about = "Pyrite full node")]
struct Args {
    /// Path to the node config file (JSON).
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,pyrite=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    info!(config = %args.config.display(), "pyrite node starting");

    let config = Config::load(&args.config).context("loading config")?;
    let vault = KeyVault::open(&config.keys_dir).context("opening key vault")?;

    // ── Core ──────────────────────────────────────────────────────────────────
    let mode = if config.database.clean {
        OpenMode::Clear
    } else {
        OpenMode::Default
    };
    let database = Database::open(&config.database.path, mode).context("opening database")?;
    let core = Core::new(
        *vault.address(),
        database,
        config.miner.threads,
        config.miner.enabled,
    )
    .context("bringing up node core")?;

    // ── Gossip network ────────────────────────────────────────────────────────
    let p2p_config = P2pConfig {
        listen_addr: config.net.listen_address,
        public_port: config
            .net
            .public_port
            .unwrap_or_else(|| config.net.listen_address.port()),
        peers: config.net.peers.clone(),
        connect_timeout: Duration::from_secs(5),
    };
    let top_hash = {
        let core = Arc::clone(&core);
        Arc::new(move || *core.top_block().hash())
    };
    let (network, mut handle) = Network::new(*vault.address(), p2p_config, top_hash);

    // Locally observed transactions and blocks go out to every peer.
    {
        let outbound = handle.outbound_tx.clone();
        core.subscribe_pending_transaction(move |tx| {
            let _ = outbound.try_send(OutboundCommand::BroadcastTransaction(tx.clone()));
        });
    }
    {
        let outbound = handle.outbound_tx.clone();
        core.subscribe_block_added(move |block| {
            let _ = outbound.try_send(OutboundCommand::BroadcastBlock(block.clone()));
        });
    }

    // Inbound gossip feeds the core; per-peer problems never stop the node.
    {
        let core = Arc::clone(&core);
        let outbound = handle.outbound_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = handle.inbound_rx.recv().await {
                match event {
                    InboundEvent::Transaction(tx) => {
                        core.add_pending_transaction(tx);
                    }
                    InboundEvent::Block(block) => match core.try_add_block(&block) {
                        Ok(AdditionResult::Added) => {}
                        Ok(other) => warn!(?other, hash = %block.hash(), "gossiped block rejected"),
                        Err(e) => {
                            error!(error = %e, "fatal error applying gossiped block");
                            std::process::exit(1);
                        }
                    },
                    InboundEvent::BlockRequest { hash, peer } => {
                        let command = match core.find_block(&hash) {
                            Some(block) => OutboundCommand::SendBlock { peer, block },
                            None => OutboundCommand::SendBlockNotFound { peer, hash },
                        };
                        let _ = outbound.send(command).await;
                    }
                }
            }
        });
    }
    tokio::spawn(async move {
        if let Err(e) = network.run().await {
            error!(error = %e, "gossip service stopped");
        }
    });

    // ── Public API ────────────────────────────────────────────────────────────
    let facade = Arc::new(CoreFacade::new(Arc::clone(&core)));
    let api_address = config.api_address;
    tokio::spawn(async move {
        if let Err(e) = pyrite_rpc::serve(facade, api_address).await {
            error!(error = %e, "public API stopped");
        }
    });

    info!("node ready");
    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("node shutdown");
    Ok(())
}
