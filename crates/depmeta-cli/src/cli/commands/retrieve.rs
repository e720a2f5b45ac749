use anyhow::Context;
use depmeta_retrieval::{
    known_versions, load_known_entries, write_output, HttpClient, Pipeline, PipelineOptions,
    PipelineReport, RetrievalConfig, VersionCatalog,
};

use super::build_synthesizer;
use crate::cli::args::RetrieveArgs;
use crate::exit_codes::{SUCCESS, VERIFICATION_FAILED, VERSIONS_FAILED};

pub async fn run(args: RetrieveArgs) -> anyhow::Result<i32> {
    if args.concurrency == 0 {
        anyhow::bail!("--concurrency must be at least 1");
    }

    let known_entries = match &args.known {
        Some(path) => load_known_entries(path)?,
        None => Vec::new(),
    };
    let options = PipelineOptions {
        known_versions: known_versions(&known_entries),
        constraint: args.constraint,
        newest: args.newest,
        concurrency: args.concurrency,
    };

    let config = RetrievalConfig::from_env();
    let http = HttpClient::new(&config).context("failed to create http client")?;
    let synthesizer = build_synthesizer(&config, http.clone(), &args.key_files)?;
    let pipeline = Pipeline::new(VersionCatalog::new(http, &config), synthesizer);

    let report = pipeline.run(&options).await?;
    let added = report.targeted(&args.targets);

    // Known entries are carried over so --known and --output may name the same file.
    let mut entries = known_entries;
    for entry in &added {
        entries.push(serde_json::to_value(entry)?);
    }

    match &args.output {
        Some(path) => {
            write_output(path, &entries)?;
            eprintln!(
                "wrote {} new entries for {} versions to {}",
                added.len(),
                report.records.len(),
                path.display()
            );
        }
        None => println!("{}", serde_json::to_string_pretty(&entries)?),
    }

    for failure in &report.failures {
        eprintln!("error: {failure}");
    }
    Ok(exit_code(&report))
}

fn exit_code(report: &PipelineReport) -> i32 {
    if report.is_clean() {
        SUCCESS
    } else if report.failures.iter().any(|f| f.is_verification_failure()) {
        VERIFICATION_FAILED
    } else {
        VERSIONS_FAILED
    }
}
