//! # CLI Interface
//!
//! Defines the command-line argument structure for `nova-node` using
//! `clap` derive. Supports three subcommands: `run`, `init`, and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// NOVA swarm node.
///
/// Runs the membership-gossip and chain-catch-up swarm described by
/// `nova_protocol::network`. This binary supplies the external
/// `Block`/`Transaction`/`Chain` it syncs — here, an in-memory demo chain.
#[derive(Parser, Debug)]
#[command(
    name = "nova-node",
    about = "NOVA Protocol swarm node",
    version,
    propagate_version = true
)]
pub struct NovaNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the NOVA node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the swarm node.
    Run(RunArgs),
    /// Generate a fresh identity keypair and write it to a key file.
    Init(InitArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// URL this node's server endpoint listens on.
    #[arg(long, short = 'l', env = "NOVA_LISTEN", default_value = "tcp://0.0.0.0:9740")]
    pub listen: String,

    /// Path to the data directory where the identity key lives.
    ///
    /// Created on first run if it does not exist.
    #[arg(long, short = 'd', env = "NOVA_DATA_DIR", default_value = "~/.nova")]
    pub data_dir: PathBuf,

    /// Known peer URLs to add (and dial) at startup. May be repeated or
    /// given as a comma-separated list.
    #[arg(long, value_delimiter = ',')]
    pub peer: Vec<String>,

    /// Timeout when dialing a peer's URL list.
    #[arg(long, env = "NOVA_DIAL_TIMEOUT_MS", default_value_t = 15_000)]
    pub dial_timeout_ms: u64,

    /// Hex-encoded Ed25519 identity key.
    ///
    /// If not provided, the node reads the key from the data directory,
    /// generating one if none exists. **Never pass this flag in
    /// production** — use a key file instead.
    #[arg(long, env = "NOVA_IDENTITY_KEY")]
    pub identity_key: Option<String>,

    /// Log output format: "pretty" or "json".
    #[arg(long, env = "NOVA_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

/// Arguments for the `init` subcommand.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Path to the data directory to initialize.
    #[arg(long, short = 'd', env = "NOVA_DATA_DIR", default_value = "~/.nova")]
    pub data_dir: PathBuf,

    /// Overwrite an existing identity key, if one is already present.
    #[arg(long)]
    pub force: bool,
}

/// Expands a leading `~/` in a path to the user's home directory. Falls
/// back to the path unchanged if `HOME` isn't set — callers still get a
/// path, just not a portable one.
pub fn resolve_data_dir(path: &std::path::Path) -> PathBuf {
    let Some(rest) = path.to_str().and_then(|s| s.strip_prefix("~/")) else {
        return path.to_path_buf();
    };
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(rest),
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        NovaNodeCli::command().debug_assert();
    }

    #[test]
    fn tilde_expands_against_home() {
        std::env::set_var("HOME", "/home/nova-test-user");
        let resolved = resolve_data_dir(std::path::Path::new("~/.nova"));
        assert_eq!(resolved, PathBuf::from("/home/nova-test-user/.nova"));
    }

    #[test]
    fn absolute_path_is_unchanged() {
        let resolved = resolve_data_dir(std::path::Path::new("/var/lib/nova"));
        assert_eq!(resolved, PathBuf::from("/var/lib/nova"));
    }
}
