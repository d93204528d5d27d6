//! CLI binary entry point for an evees node.
//!
//! Usage:
//!   evees-node [OPTIONS] <COMMAND>
//!
//! Commands:
//!   hash <JSON>            Print the CID of an object
//!   put <JSON>             Store an object on every backend
//!   get <CID>...           Resolve objects across all backends
//!   run                    Run the pin flush loop until Ctrl-C
//!   pin-status <REF>       Show the pin record of a reference
//!   cid-to-words <CID>     Pack a CID into two 32-byte words
//!   words-to-cid <HI> <LO> Unpack two 32-byte words into a CID

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use evees_cid::{cid_to_fixed_width, fixed_width_to_cid, Value};
use evees_node::config::NodeConfig;
use evees_node::node::EveesNode;

/// Evees node - content-addressed entity storage with remote pinning.
#[derive(Parser, Debug)]
#[command(name = "evees-node")]
#[command(about = "Content-addressed evees entity store")]
#[command(version)]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// IPFS API host (enables the IPFS backend).
    #[arg(long, value_name = "HOST")]
    ipfs_host: Option<String>,

    /// Pinning service base URL (enables pinning).
    #[arg(long, value_name = "URL")]
    pinner_url: Option<String>,

    /// Increase logging verbosity (can be repeated: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the CID of a JSON object without storing it.
    Hash { json: String },
    /// Store a JSON object on every backend and print its CID.
    Put { json: String },
    /// Resolve CIDs across all backends and print the entities found.
    Get {
        #[arg(required = true)]
        cids: Vec<String>,
    },
    /// Run the pin flush loop until Ctrl-C.
    Run,
    /// Show the pin record of a hash or database address.
    PinStatus { reference: String },
    /// Pack a CID into two 0x-prefixed 32-byte words.
    CidToWords { cid: String },
    /// Unpack two 32-byte words into a CID.
    WordsToCid { hi: String, lo: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration.
    let mut config = NodeConfig::load(cli.config.as_deref())?;

    // Apply CLI overrides.
    if let Some(host) = cli.ipfs_host {
        config.ipfs.host = host;
        config.ipfs.enabled = true;
    }
    if let Some(url) = cli.pinner_url {
        config.pinner.url = Some(url);
    }

    init_logging(&config, cli.verbose);

    match cli.command {
        Command::Hash { json } => {
            let object = parse_object(&json)?;
            let node = EveesNode::new(config)?;
            println!("{}", node.hash(&object)?);
        }
        Command::Put { json } => {
            let object = parse_object(&json)?;
            let node = EveesNode::new(config)?;
            let id = node.create(&object).await?;
            if let Some(outcome) = node.flush_pins().await? {
                tracing::debug!(?outcome, "Flushed pins after put");
            }
            println!("{}", id);
        }
        Command::Get { cids } => {
            let node = EveesNode::new(config)?;
            let entities = node.get(&cids).await?;
            for cid in cids.iter().filter(|c| !entities.iter().any(|e| &e.id == *c)) {
                tracing::warn!(cid = %cid, "Not found on any backend");
            }
            println!("{}", serde_json::to_string_pretty(&entities)?);
        }
        Command::Run => {
            let node = EveesNode::new(config)?;
            tracing::info!(
                interval_ms = node.config().pinner.flush_interval_ms,
                "Starting evees node"
            );
            node.run().await?;
        }
        Command::PinStatus { reference } => {
            let node = EveesNode::new(config)?;
            match node.pin_status(&reference).await? {
                Some(record) => println!(
                    "{} {}",
                    record.id,
                    if record.pinned { "pinned" } else { "unpinned" }
                ),
                None => println!("{} untracked", reference),
            }
        }
        Command::CidToWords { cid } => {
            let [hi, lo] = cid_to_fixed_width(&cid)?;
            println!("{}\n{}", hi, lo);
        }
        Command::WordsToCid { hi, lo } => {
            println!("{}", fixed_width_to_cid(&hi, &lo)?);
        }
    }

    Ok(())
}

fn parse_object(json: &str) -> anyhow::Result<Value> {
    Value::from_json_str(json).context("Argument is not valid JSON")
}

fn init_logging(config: &NodeConfig, verbose: u8) {
    // Adjust log level based on verbosity.
    let log_level = match verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    // Logs go to stderr; stdout carries command output.
    if config.logging.json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }
}
