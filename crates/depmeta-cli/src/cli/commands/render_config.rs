use depmeta_config::{BuildEnvironment, ConfigGenerator};

use crate::cli::args::RenderConfigArgs;
use crate::exit_codes::SUCCESS;

pub fn run(args: RenderConfigArgs) -> anyhow::Result<i32> {
    let env = BuildEnvironment {
        web_server_root: args.web_server_root,
        web_server_push_state_enabled: args.push_state,
    };

    ConfigGenerator::new().generate(&args.template, &args.destination, &env)?;
    tracing::info!(destination = %args.destination.display(), "rendered nginx.conf");
    Ok(SUCCESS)
}
