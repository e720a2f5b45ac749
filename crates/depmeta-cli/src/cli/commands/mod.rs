use super::args::*;
use crate::exit_codes::SUCCESS;

pub mod render_config;
pub mod retrieve;
pub mod synthesize;

use clap::CommandFactory;
use depmeta_retrieval::{HttpClient, PinnedKeys, RetrievalConfig, Synthesizer};
use std::path::PathBuf;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    let Some(cmd) = cli.cmd else {
        Cli::command().print_help()?;
        return Ok(SUCCESS);
    };

    match cmd {
        Command::Synthesize(args) => synthesize::run(args).await,
        Command::Retrieve(args) => retrieve::run(args).await,
        Command::RenderConfig(args) => render_config::run(args),
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(SUCCESS)
        }
    }
}

/// Synthesizer from the environment, optionally pinned to local key files.
fn build_synthesizer(
    config: &RetrievalConfig,
    http: HttpClient,
    key_files: &[PathBuf],
) -> anyhow::Result<Synthesizer> {
    let synthesizer = Synthesizer::new(http, config);
    if key_files.is_empty() {
        return Ok(synthesizer);
    }
    let keys = PinnedKeys::from_files(key_files)?;
    Ok(synthesizer.with_key_source(keys))
}
