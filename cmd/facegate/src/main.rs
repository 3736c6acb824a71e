//! facegate - enroll and identify faces from precomputed embeddings.

mod config;
mod file_store;
mod input;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use facegate_facematch::{FaceRegistry, IdentityId, Profile};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::file_store::FileStore;

/// Enroll and identify faces from precomputed embeddings.
#[derive(Parser, Debug)]
#[command(name = "facegate")]
#[command(about = "Enroll and identify faces from precomputed embeddings")]
struct Cli {
    /// Config file (.yaml, .yml or .json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// JSON-lines store file (overrides the config)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Enroll an identity with its face embedding
    Enroll(EnrollArgs),
    /// Identify the closest enrolled face
    Identify {
        /// JSON array file with the probe embedding ("-" for stdin)
        #[arg(short, long)]
        embedding: PathBuf,
    },
    /// List enrolled identities
    List,
    /// Remove an enrolled identity
    Remove {
        #[arg(long)]
        id: String,
    },
    /// Print the effective threshold policy
    Policy,
}

#[derive(Args, Debug)]
struct EnrollArgs {
    #[arg(long)]
    id: String,
    #[arg(long)]
    given_name: String,
    #[arg(long)]
    family_name: String,
    #[arg(long)]
    national_id: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    photo_url: Option<String>,
    /// JSON array file with the embedding ("-" for stdin)
    #[arg(short, long)]
    embedding: PathBuf,
}

#[derive(Serialize)]
struct PolicyView<'a> {
    dim: usize,
    accept_threshold: f64,
    metric: facegate_facematch::Metric,
    version: &'a str,
    rationale: &'a str,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load(cli.config.as_deref())?;
    let store = FileStore::open(cfg.store_path(cli.store.as_deref()));
    tracing::debug!(store = %store.path().display(), "opened store");
    let reg = FaceRegistry::new(cfg.registry, Arc::new(store));

    match cli.command {
        Commands::Enroll(args) => {
            let embedding = input::read_embedding(&args.embedding)?;
            let profile = Profile {
                given_name: args.given_name,
                family_name: args.family_name,
                national_id: args.national_id,
                email: args.email,
                phone: args.phone,
                photo_url: args.photo_url,
            };
            let enrollee = reg.enroll(IdentityId::new(args.id), profile, embedding)?;
            print_json(&enrollee)
        }
        Commands::Identify { embedding } => {
            let query = input::read_embedding(&embedding)?;
            let found = reg.identify(&query)?;
            print_json(&found)
        }
        Commands::List => print_json(&reg.enrollees()?),
        Commands::Remove { id } => {
            reg.remove(&IdentityId::new(id))?;
            Ok(())
        }
        Commands::Policy => {
            let policy = reg.policy();
            print_json(&PolicyView {
                dim: reg.dim(),
                accept_threshold: policy.accept_threshold(),
                metric: policy.metric(),
                version: policy.version(),
                rationale: policy.rationale(),
            })
        }
    }
}
