//! remo binary entry point.

use std::sync::Arc;

use remo::api::{self, AppState};
use remo::cli::{self, Args};
use remo::security::hash_secret;
use remo::{logging, Config, DryRunActions, RemoError, TracingAuditSink};
use tracing::info;

#[tokio::main]
async fn main() -> remo::Result<()> {
    let args = cli::parse_args().map_err(|e| RemoError::Cli(e.to_string()))?;

    if args.help {
        cli::print_help();
        return Ok(());
    }
    if args.version {
        cli::print_version();
        return Ok(());
    }
    if let Some(ref secret) = args.hash_password {
        println!("{}", hash_secret(secret)?);
        return Ok(());
    }

    run(&args).await
}

async fn run(args: &Args) -> remo::Result<()> {
    let config = Config::load(args)?;

    if let Err(e) = logging::init_with(config.log_filter()) {
        eprintln!("logging already initialized: {}", e);
    }

    info!("remo v{}", env!("CARGO_PKG_VERSION"));
    config.validate()?;
    let server_config = config.to_server_config()?;

    let state = AppState::from_config(&config, Arc::new(DryRunActions), Arc::new(TracingAuditSink))?;
    info!(
        device = %config.device.name,
        user_id = config.bot.user_id,
        "Access control initialized"
    );
    info!("Webhook endpoint ready at /webhook/<secret>");

    api::serve(server_config, state).await
}
