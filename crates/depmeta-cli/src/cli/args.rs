use clap::{Args, Parser, Subcommand};
use semver::{Version, VersionReq};
use std::path::PathBuf;

use depmeta_retrieval::DEFAULT_CONCURRENCY;

#[derive(Parser)]
#[command(
    name = "depmeta",
    version,
    about = "Discover, verify and describe upstream nginx releases"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the metadata record for one version
    Synthesize(SynthesizeArgs),
    /// Synthesize metadata for every new upstream version
    Retrieve(RetrieveArgs),
    /// Render nginx.conf from its deployment template
    RenderConfig(RenderConfigArgs),
    Version,
}

#[derive(Args, Debug)]
pub struct SynthesizeArgs {
    /// Upstream version, e.g. 1.25.3
    pub version: Option<Version>,

    /// Trust these armored keys instead of fetching the configured key URLs
    #[arg(long = "key-file")]
    pub key_files: Vec<PathBuf>,
}

#[derive(Args, Debug)]
pub struct RetrieveArgs {
    /// Existing metadata file; its versions are not synthesized again and its
    /// entries are kept ahead of the new ones in the output
    #[arg(long)]
    pub known: Option<PathBuf>,

    /// Only versions matching this requirement (e.g. ">=1.24")
    #[arg(long)]
    pub constraint: Option<VersionReq>,

    /// Only the newest N candidate versions
    #[arg(long)]
    pub newest: Option<usize>,

    /// Maximum syntheses in flight
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Target platforms; each record is emitted once per target
    #[arg(long = "target", default_values = ["bionic", "jammy"])]
    pub targets: Vec<String>,

    /// Write the JSON array here instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Trust these armored keys instead of fetching the configured key URLs
    #[arg(long = "key-file")]
    pub key_files: Vec<PathBuf>,
}

#[derive(Args, Debug)]
pub struct RenderConfigArgs {
    /// Template with $(( ... )) actions
    #[arg(long)]
    pub template: PathBuf,

    /// Rendered file (created or truncated)
    #[arg(long)]
    pub destination: PathBuf,

    /// Server root, absolute or relative to the application root
    #[arg(long, env = "BP_WEB_SERVER_ROOT", default_value = "")]
    pub web_server_root: String,

    /// Route unknown paths to / for single-page applications
    #[arg(
        long,
        env = "BP_WEB_SERVER_ENABLE_PUSH_STATE",
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    pub push_state: bool,
}
