// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # nova-node
//!
//! A thin binary around `nova_protocol::network::swarm::Swarm`: parses
//! arguments, loads or generates an identity, wires in the demo chain from
//! `chain`, and runs the swarm until a shutdown signal arrives.

mod chain;
mod cli;
mod logging;

use anyhow::{Context, Result};
use chain::DemoChain;
use clap::Parser;
use cli::{Commands, InitArgs, RunArgs};
use logging::LogFormat;
use nova_protocol::identity::keypair::{NovaKeypair, NovaPublicKey};
use nova_protocol::network::{Peer, Swarm};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;

const BLOCK_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::NovaNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Init(args) => init_node(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// run — start the swarm
// ---------------------------------------------------------------------------

async fn run_node(args: RunArgs) -> Result<()> {
    logging::init_logging("nova_node=info,nova_protocol=info", LogFormat::from_str_lossy(&args.log_format));

    let data_dir = cli::resolve_data_dir(&args.data_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

    let identity = match &args.identity_key {
        Some(hex_key) => {
            NovaKeypair::from_hex(hex_key).map_err(|e| anyhow::anyhow!("invalid identity key: {}", e))?
        }
        None => load_or_generate_identity(&data_dir)?,
    };
    tracing::info!(public_key = %identity.public_key().to_hex(), "identity loaded");

    let swarm = Arc::new(Swarm::<chain::DemoBlock, chain::DemoTx>::new(
        identity,
        args.listen.clone(),
        Duration::from_millis(args.dial_timeout_ms),
    ));

    let bootstrap_peers = args
        .peer
        .iter()
        .map(|spec| parse_peer(spec))
        .collect::<Result<Vec<Peer>>>()?;
    if !bootstrap_peers.is_empty() {
        swarm.add_peers_async(bootstrap_peers, None).await;
    }

    let chain = Arc::new(DemoChain::new());
    let cancel = CancellationToken::new();

    let block_producer = {
        let chain = chain.clone();
        let swarm = swarm.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(BLOCK_INTERVAL);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let block = chain.produce_block().await;
                        tracing::debug!(height = block.index(), "block produced");
                        swarm.broadcast_blocks(std::slice::from_ref(&block)).await;
                    }
                    _ = cancel.cancelled() => break,
                }
            }
        })
    };

    tracing::info!(
        listen = %args.listen,
        public_key = %swarm.local_peer().public_key().to_hex(),
        peers = bootstrap_peers_len(&swarm).await,
        "starting swarm"
    );

    let shutdown = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            wait_for_shutdown_signal().await;
            cancel.cancel();
        })
    };

    swarm.start_async(chain, cancel.clone()).await?;

    let _ = shutdown.await;
    block_producer.abort();
    swarm.stop_async().await?;
    tracing::info!("nova-node stopped");
    Ok(())
}

async fn bootstrap_peers_len(swarm: &Swarm<chain::DemoBlock, chain::DemoTx>) -> usize {
    swarm.count().await
}

/// Parses a bootstrap peer given as `<hex-pubkey>@<url>`. The swarm has no
/// discovery mechanism of its own — a fresh node always needs at least one
/// peer's identity out of band before it can dial anything.
fn parse_peer(spec: &str) -> Result<Peer> {
    let (pubkey_hex, url) = spec
        .split_once('@')
        .ok_or_else(|| anyhow::anyhow!("peer spec '{}' must be '<hex-pubkey>@<url>'", spec))?;
    let public_key = NovaPublicKey::from_hex(pubkey_hex)
        .map_err(|e| anyhow::anyhow!("invalid public key in peer spec '{}': {}", spec, e))?;
    Ok(Peer::new(public_key, vec![url.to_string()]))
}

// ---------------------------------------------------------------------------
// init — generate and persist an identity key
// ---------------------------------------------------------------------------

fn init_node(args: InitArgs) -> Result<()> {
    logging::init_logging("nova_node=info", LogFormat::Pretty);

    let data_dir = cli::resolve_data_dir(&args.data_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

    let key_path = identity_key_path(&data_dir);
    if key_path.exists() && !args.force {
        anyhow::bail!(
            "identity key already exists at {}. Use --force to overwrite.",
            key_path.display()
        );
    }

    let identity = NovaKeypair::generate();
    write_identity_key(&key_path, &identity)?;

    println!();
    println!("Node initialized.");
    println!();
    println!("  Data directory : {}", data_dir.display());
    println!("  Identity key   : {}", key_path.display());
    println!("  Public key     : {}", identity.public_key().to_hex());
    println!();
    println!("Run `nova-node run -d {}` to start the node.", data_dir.display());

    Ok(())
}

// ---------------------------------------------------------------------------
// version
// ---------------------------------------------------------------------------

fn print_version() {
    println!("nova-node {}", env!("CARGO_PKG_VERSION"));
    println!("wire protocol {}", nova_protocol::config::WIRE_PROTOCOL_VERSION);
}

// ---------------------------------------------------------------------------
// Identity persistence
// ---------------------------------------------------------------------------

fn identity_key_path(data_dir: &Path) -> PathBuf {
    data_dir.join("identity.key")
}

/// Loads the identity key from `{data_dir}/identity.key`, generating and
/// saving a new one if the file does not exist. Hex-encoded, owner-only
/// permissions on Unix.
fn load_or_generate_identity(data_dir: &Path) -> Result<NovaKeypair> {
    let key_path = identity_key_path(data_dir);

    if key_path.exists() {
        let hex_str = std::fs::read_to_string(&key_path)
            .with_context(|| format!("failed to read identity key from {}", key_path.display()))?;
        let identity = NovaKeypair::from_hex(hex_str.trim())
            .map_err(|e| anyhow::anyhow!("invalid identity key: {}", e))?;
        Ok(identity)
    } else {
        let identity = NovaKeypair::generate();
        write_identity_key(&key_path, &identity)?;
        Ok(identity)
    }
}

fn write_identity_key(key_path: &Path, identity: &NovaKeypair) -> Result<()> {
    let hex = hex::encode(identity.secret_key_bytes());
    std::fs::write(key_path, &hex)
        .with_context(|| format!("failed to write identity key to {}", key_path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(key_path, std::fs::Permissions::from_mode(0o600))?;
    }

    tracing::info!(
        public_key = %identity.public_key().to_hex(),
        key_path = %key_path.display(),
        "identity key written"
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Shutdown signal
// ---------------------------------------------------------------------------

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_peer_accepts_pubkey_at_url() {
        let kp = NovaKeypair::generate();
        let spec = format!("{}@tcp://127.0.0.1:9740", kp.public_key().to_hex());
        let peer = parse_peer(&spec).unwrap();
        assert_eq!(peer.public_key(), &kp.public_key());
        assert_eq!(peer.primary_url(), "tcp://127.0.0.1:9740");
    }

    #[test]
    fn parse_peer_rejects_missing_at_separator() {
        assert!(parse_peer("not-a-valid-spec").is_err());
    }

    #[test]
    fn parse_peer_rejects_bad_hex() {
        assert!(parse_peer("zz@tcp://127.0.0.1:9740").is_err());
    }

    #[test]
    fn identity_key_round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let identity = NovaKeypair::generate();
        let path = identity_key_path(dir.path());
        write_identity_key(&path, &identity).unwrap();

        let loaded = load_or_generate_identity(dir.path()).unwrap();
        assert_eq!(loaded.public_key(), identity.public_key());
    }

    #[test]
    fn load_or_generate_creates_new_key_when_absent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let first = load_or_generate_identity(dir.path()).unwrap();
        let second = load_or_generate_identity(dir.path()).unwrap();
        assert_eq!(first.public_key(), second.public_key());
    }
}
