use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "relay",
    version,
    about = "Relocate compiler caches for serverless execution and run handlers locally"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Rewrite cache references from the build root to the execution root and move artifacts
    Relocate(RelocateArgs),
    /// Write a function manifest for one or more entrypoints
    Manifest(ManifestArgs),
    /// Start a dev server command and wait for it to report its port
    Dev(DevArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct RelocateArgs {
    /// Compiler cache directory
    #[arg(long, env = "RELAY_CACHE_DIR")]
    pub cache_dir: PathBuf,

    /// Absolute root the cache was built under
    #[arg(long)]
    pub from: PathBuf,

    /// Absolute root the cache will execute under
    #[arg(long, default_value = "/var/task")]
    pub to: PathBuf,

    /// Write discovered source files (JSON array) here instead of stdout
    #[arg(long)]
    pub sources_out: Option<PathBuf>,

    /// Also write manifests for these entrypoints
    #[command(flatten)]
    pub manifest: ManifestOptions,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ManifestArgs {
    #[command(flatten)]
    pub manifest: ManifestOptions,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct ManifestOptions {
    /// Entrypoint relative to the project root (repeatable)
    #[arg(long = "entrypoint")]
    pub entrypoints: Vec<String>,

    /// Directory manifests are written to
    #[arg(long, default_value = ".relay/output")]
    pub out_dir: PathBuf,

    /// Runtime identifier
    #[arg(long, default_value = "provided.al2")]
    pub runtime: String,

    /// Memory in MB
    #[arg(long)]
    pub memory: Option<u32>,

    /// Maximum duration in seconds
    #[arg(long)]
    pub max_duration: Option<u32>,

    /// Deployment region (repeatable)
    #[arg(long = "region")]
    pub regions: Vec<String>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct DevArgs {
    /// Give up if no port is reported within this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Dev server command and arguments
    #[arg(trailing_var_arg = true, required = true)]
    pub command: Vec<String>,
}
