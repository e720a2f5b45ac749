use anyhow::Context;
use clap::CommandFactory;
use depmeta_retrieval::{HttpClient, RetrievalConfig};

use super::build_synthesizer;
use crate::cli::args::{Cli, SynthesizeArgs};
use crate::exit_codes::SUCCESS;

pub async fn run(args: SynthesizeArgs) -> anyhow::Result<i32> {
    let Some(version) = args.version else {
        let mut cmd = Cli::command();
        if let Some(sub) = cmd.find_subcommand_mut("synthesize") {
            sub.print_help()?;
        }
        return Ok(SUCCESS);
    };

    let config = RetrievalConfig::from_env();
    let http = HttpClient::new(&config).context("failed to create http client")?;
    let synthesizer = build_synthesizer(&config, http, &args.key_files)?;

    match synthesizer.synthesize(&version).await {
        Ok(record) => {
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(SUCCESS)
        }
        Err(e) => {
            eprintln!("error: {e}");
            Ok(e.exit_code())
        }
    }
}
