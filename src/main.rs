//! selfwake CLI
//!
//! Usage:
//!   selfwake genesis agent --names curiosity,precision,persistence --relate 0-1 --relate 1-2:0.5
//!   selfwake declare agent --seed <hex> --index 1 --value 0.8 --content "precision first"
//!   selfwake evolve agent --seed <hex> --experience 0.2,0,-0.1 --dt 0.1 --steps 10
//!   selfwake wake agent --seed <hex> [--reanchor]
//!   selfwake pivotal agent --seed <hex> --text "first failure" --impact 700
//!   selfwake proof agent --seed <hex> [--hex]
//!   selfwake close agent
//!   selfwake serve --seed <hex> --addr 127.0.0.1:3000

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use sha2::{Digest, Sha256};

use selfwake::core::api::StatusResponse;
use selfwake::core::{
    load_identity, run_server, save_identity, ActiveSelf, AppState, FileStore, MemoryStore, SnapshotStore, WakeContext,
    WakeReconstructor,
};
use selfwake::types::{Parameters, Relationship, StoredIdentity, Vocabulary};
use selfwake::{IdentityError, StoreError, WakeConfig, WakeError, VERSION};

#[derive(Parser, Debug)]
#[command(
    name = "selfwake",
    version = VERSION,
    about = "Persistent identity for stateless agents",
    long_about = "selfwake keeps an agent's identity as the equilibrium of a small\n\
                  dynamical system, anchors every explicit self-declaration in a\n\
                  signed hash chain, and verifies both when the agent wakes."
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Snapshot directory
    #[arg(long, default_value = "./identities", global = true)]
    store: PathBuf,

    /// Wake configuration (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Disable colors in output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new identity
    Genesis(GenesisArgs),
    /// Sign and apply a declaration
    Declare(DeclareArgs),
    /// Integrate experience
    Evolve(EvolveArgs),
    /// Verify and report an identity
    Wake(WakeArgs),
    /// Record a pivotal experience hash
    Pivotal(PivotalArgs),
    /// Print the continuity proof
    Proof(ProofArgs),
    /// Delete an identity's snapshot
    Close(CloseArgs),
    /// Run the HTTP API (in-memory store)
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
struct KeyArgs {
    /// Ed25519 secret seed, 64 hex chars
    #[arg(long, value_parser = parse_bytes32)]
    seed: [u8; 32],
}

#[derive(Args, Debug)]
struct GenesisArgs {
    id: String,
    /// Dimension names, comma separated
    #[arg(long, value_delimiter = ',', required = true)]
    names: Vec<String>,
    /// Relationship `i-j` or `i-j:weight`, repeatable
    #[arg(long = "relate", value_parser = parse_relationship)]
    relationships: Vec<Relationship>,
    /// Initial weights, comma separated (default all 0.5)
    #[arg(long, value_delimiter = ',')]
    initial: Option<Vec<f64>>,
    /// Override homeostasis λ
    #[arg(long)]
    homeostasis: Option<f64>,
}

#[derive(Args, Debug)]
struct DeclareArgs {
    id: String,
    #[command(flatten)]
    key: KeyArgs,
    #[arg(long)]
    index: usize,
    #[arg(long)]
    value: f64,
    #[arg(long, default_value = "")]
    content: String,
}

#[derive(Args, Debug)]
struct EvolveArgs {
    id: String,
    #[command(flatten)]
    key: KeyArgs,
    /// Experience vector, comma separated
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
    experience: Vec<f64>,
    #[arg(long, default_value_t = 0.1)]
    dt: f64,
    #[arg(long, default_value_t = 1)]
    steps: usize,
}

#[derive(Args, Debug)]
struct WakeArgs {
    id: String,
    #[command(flatten)]
    key: KeyArgs,
    /// Skip the continuity check and reset the trajectory
    #[arg(long)]
    reanchor: bool,
}

#[derive(Args, Debug)]
struct PivotalArgs {
    id: String,
    #[command(flatten)]
    key: KeyArgs,
    /// Experience hash, 64 hex chars
    #[arg(long, value_parser = parse_bytes32, required_unless_present = "text")]
    hash: Option<[u8; 32]>,
    /// Experience text, hashed with SHA-256 and not stored
    #[arg(long, conflicts_with = "hash")]
    text: Option<String>,
    #[arg(long)]
    impact: u64,
}

#[derive(Args, Debug)]
struct CloseArgs {
    id: String,
}

#[derive(Args, Debug)]
struct ProofArgs {
    id: String,
    #[command(flatten)]
    key: KeyArgs,
    /// Print the 158-byte record as hex
    #[arg(long)]
    hex: bool,
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[command(flatten)]
    key: KeyArgs,
    /// Server address
    #[arg(long, default_value = "127.0.0.1:3000")]
    addr: String,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Wake(#[from] WakeError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("output error: {0}")]
    Output(#[from] serde_json::Error),
    #[error("server error: {0}")]
    Server(String),
}

impl CliError {
    fn code(&self) -> &'static str {
        match self {
            Self::Identity(e) => e.code(),
            Self::Wake(e) => e.code(),
            Self::Store(e) => e.code(),
            Self::Output(_) => "R700_CLI_OUTPUT",
            Self::Server(_) => "R701_CLI_SERVER",
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    setup_logging(cli.verbose);
    if cli.no_color {
        colored::control::set_override(false);
    }

    if let Err(e) = run(cli).await {
        eprintln!("{} {}: {}", "✗".red().bold(), e.code(), e);
        std::process::exit(1);
    }
}

/// Setup logging based on verbosity level
fn setup_logging(verbosity: u8) {
    use tracing_subscriber::EnvFilter;

    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = match &cli.config {
        Some(path) => WakeConfig::from_json_file(path)?,
        None => WakeConfig::default(),
    };
    let store = FileStore::new(&cli.store);
    let reconstructor = WakeReconstructor::new(config.clone());

    match &cli.command {
        Command::Genesis(args) => {
            let vocabulary = Vocabulary::define(args.names.clone(), args.relationships.clone())?;
            let mut params = Parameters::default_for(vocabulary.len());
            if let Some(lambda) = args.homeostasis {
                params = params.with_homeostasis(lambda);
            }
            let stored = StoredIdentity::genesis(vocabulary, params, args.initial.clone())?;
            save_identity(&store, &args.id, &stored)?;
            print_success(&format!("identity '{}' created", args.id), cli.json);
        }

        Command::Declare(args) => {
            let mut active = wake(&store, &reconstructor, &args.id, &args.key, false)?;
            let hash = hex::encode(active.declare(args.index, args.value, &args.content)?.hash());
            persist(&store, &args.id, &mut active)?;
            if !cli.json {
                println!("{} {}", "declaration".bold(), hash.dimmed());
            }
            print_status(&args.id, &active, cli.json)?;
        }

        Command::Evolve(args) => {
            let mut active = wake(&store, &reconstructor, &args.id, &args.key, false)?;
            let clamped = active.evolve_for(&args.experience, args.dt, args.steps)?;
            persist(&store, &args.id, &mut active)?;
            if clamped > 0 && !cli.json {
                println!("{} {} coordinates clamped to [0, 1]", "⚠".yellow(), clamped);
            }
            print_status(&args.id, &active, cli.json)?;
        }

        Command::Wake(args) => {
            let mut active = wake(&store, &reconstructor, &args.id, &args.key, args.reanchor)?;
            if args.reanchor {
                persist(&store, &args.id, &mut active)?;
            }
            print_status(&args.id, &active, cli.json)?;
        }

        Command::Pivotal(args) => {
            let hash: [u8; 32] = match args.hash {
                Some(hash) => hash,
                None => Sha256::digest(args.text.as_deref().unwrap_or_default().as_bytes()).into(),
            };
            let mut active = wake(&store, &reconstructor, &args.id, &args.key, false)?;
            active.record_pivotal(hash, args.impact)?;
            persist(&store, &args.id, &mut active)?;
            if !cli.json {
                println!("{} {}", "pivotal".bold(), hex::encode(hash).dimmed());
            }
            print_status(&args.id, &active, cli.json)?;
        }

        Command::Close(args) => {
            if !store.delete(&args.id)? {
                return Err(StoreError::NotFound(args.id.clone()).into());
            }
            tracing::warn!(id = %args.id, "identity closed");
            print_success(&format!("identity '{}' closed", args.id), cli.json);
        }

        Command::Proof(args) => {
            let active = wake(&store, &reconstructor, &args.id, &args.key, false)?;
            let proof = active.proof()?;
            if args.hex {
                println!("{}", proof.to_hex());
            } else {
                println!("{}", serde_json::to_string_pretty(&proof)?);
            }
        }

        Command::Serve(args) => {
            let state = Arc::new(AppState::new(
                Arc::new(MemoryStore::new()),
                WakeContext::ed25519(&args.key.seed),
                config,
            ));
            if !cli.json {
                println!("{} selfwake API v{} on {}", "●".green(), VERSION, args.addr);
            }
            run_server(&args.addr, state)
                .await
                .map_err(|e| CliError::Server(e.to_string()))?;
        }
    }

    Ok(())
}

fn wake(
    store: &FileStore,
    reconstructor: &WakeReconstructor,
    id: &str,
    key: &KeyArgs,
    reanchor: bool,
) -> Result<ActiveSelf, CliError> {
    let stored = load_identity(store, id)?;
    let context = WakeContext::ed25519(&key.seed);
    let active = if reanchor {
        reconstructor.reanchor(&stored, &context)?
    } else {
        reconstructor.wake(&stored, &context)?
    };
    Ok(active)
}

fn persist(store: &FileStore, id: &str, active: &mut ActiveSelf) -> Result<(), CliError> {
    let snapshot = active.snapshot()?;
    let version = save_identity(store, id, &snapshot)?;
    active.mark_saved(version);
    Ok(())
}

fn print_success(msg: &str, json: bool) {
    if json {
        println!("{}", serde_json::json!({ "ok": true, "message": msg }));
    } else {
        println!("{} {}", "✓".green().bold(), msg);
    }
}

fn print_status(id: &str, active: &ActiveSelf, json: bool) -> Result<(), CliError> {
    let status = StatusResponse::of(id, active);
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{} {} (v{})", "identity".bold(), status.id, status.version);
    for (i, name) in status.dimensions.iter().enumerate() {
        println!("  {:<16} w={:.4}  m={:.4}", name, status.w[i], status.m[i]);
    }
    println!(
        "  coherence={:.4}  continuity={:.4}  energy={:.5}  declarations={}  pivotal={}",
        status.coherence, status.continuity_score, status.energy, status.declarations, status.pivotal
    );
    for warning in &status.warnings {
        println!("  {} {}", "⚠".yellow(), warning);
    }
    Ok(())
}

/// 64 hex chars → 32 bytes
fn parse_bytes32(s: &str) -> Result<[u8; 32], String> {
    let bytes = hex::decode(s.trim()).map_err(|e| format!("invalid hex: {e}"))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| format!("expected 32 bytes, got {}", b.len()))
}

/// `i-j` or `i-j:weight`
fn parse_relationship(s: &str) -> Result<Relationship, String> {
    let (edge, weight) = match s.split_once(':') {
        Some((edge, w)) => (edge, Some(w)),
        None => (s, None),
    };
    let (from, to) = edge
        .split_once('-')
        .ok_or_else(|| format!("expected i-j[:w], got '{s}'"))?;
    let from: usize = from.trim().parse().map_err(|_| format!("bad index '{from}'"))?;
    let to: usize = to.trim().parse().map_err(|_| format!("bad index '{to}'"))?;
    match weight {
        Some(w) => {
            let w: f64 = w.trim().parse().map_err(|_| format!("bad weight '{w}'"))?;
            Ok(Relationship::weighted(from, to, w))
        }
        None => Ok(Relationship::new(from, to)),
    }
}

// =============================================================================
// TESTS
// =============================================================================
