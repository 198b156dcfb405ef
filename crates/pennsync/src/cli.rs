//! Clap derive structures for the `pennsync` CLI.
//!
//! Defines the command tree, global flags, and shared types. Also compiled
//! by build.rs for man page generation, so it must only depend on clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// pennsync -- diff-driven dataset sync for the Pennsieve platform
#[derive(Debug, Parser)]
#[command(
    name = "pennsync",
    version,
    about = "Synchronize local research datasets with the Pennsieve data platform",
    long_about = "Maps remote datasets into a local workspace, diffs them with the \
        Pennsieve agent, and pushes only newly added files through a single upload \
        manifest per dataset.\n\n\
        The `pennsieve` agent must be installed and running for map, diff and push.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config profile to use
    #[arg(long, short = 'p', env = "PENNSYNC_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Platform API host (overrides profile)
    #[arg(long, env = "PENNSIEVE_API_HOST", global = true)]
    pub api_host: Option<String>,

    /// API key (overrides profile)
    #[arg(long, env = "PENNSIEVE_API_KEY", global = true, hide_env_values = true)]
    pub api_key: Option<String>,

    /// API secret (prefer the keyring or PENNSIEVE_API_SECRET)
    #[arg(
        long,
        env = "PENNSIEVE_API_SECRET",
        global = true,
        hide = true,
        hide_env_values = true
    )]
    pub api_secret: Option<String>,

    /// Directory holding mapped datasets under `output/`
    #[arg(long, env = "PENNSYNC_BASE_DIR", global = true)]
    pub base_dir: Option<PathBuf>,

    /// Pennsieve agent executable
    #[arg(long, env = "PENNSYNC_TOOL", global = true)]
    pub tool: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "PENNSYNC_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "PENNSYNC_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List remote datasets
    #[command(alias = "ds")]
    Datasets(DatasetsArgs),

    /// Map remote datasets into the local workspace
    Map(MapArgs),

    /// Show local changes of mapped datasets
    Diff(DiffArgs),

    /// Upload newly added files of mapped datasets
    Push(PushArgs),

    /// Download placeholder files under a mapped path
    Pull(PullArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Datasets ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DatasetsArgs {
    #[command(subcommand)]
    pub command: DatasetsCommand,
}

#[derive(Debug, Subcommand)]
pub enum DatasetsCommand {
    /// List datasets, sorted by name
    #[command(alias = "ls")]
    List {
        /// Case-insensitive name substring (e.g. `PennEPI`, `EPS`)
        #[arg(long, short = 'f')]
        filter: Option<String>,
    },
}

// ── Map / Diff / Push ────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct MapArgs {
    /// Dataset name, or a comma-separated list of names
    #[arg(long = "dataset", short = 'n')]
    pub dataset: Option<String>,

    /// Only datasets whose name contains this substring (when no names are given)
    #[arg(long, short = 'f', conflicts_with = "dataset")]
    pub filter: Option<String>,

    /// Remove an existing local directory before mapping
    #[arg(long, short = 'R')]
    pub remove_existing: bool,
}

#[derive(Debug, Args)]
pub struct DiffArgs {
    /// Dataset name, or a comma-separated list of names
    #[arg(long = "dataset", short = 'n', required = true)]
    pub dataset: String,
}

#[derive(Debug, Args)]
pub struct PushArgs {
    /// Dataset name, or a comma-separated list of names
    #[arg(long = "dataset", short = 'n', required = true)]
    pub dataset: String,

    /// Diff and report what would be uploaded, without creating a manifest
    #[arg(long)]
    pub dry_run: bool,
}

// ── Pull ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PullArgs {
    /// File or directory inside a mapped dataset
    pub path: PathBuf,

    /// Download attempts per file
    #[arg(long, default_value = "4", value_parser = clap::value_parser!(u32).range(1..))]
    pub attempts: u32,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Interactive configuration wizard
    Init,

    /// Show the current configuration (secrets redacted)
    Show,

    /// Print the config file path
    Path,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name
        name: String,
    },

    /// Store the API secret of the active profile in the system keyring
    SetSecret,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
