mod migration;
mod storage;
mod utils;


use clap::{CommandFactory, Parser};

use migration::TracingObserver;
use utils::{CliArgs, MigrationConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args = CliArgs::parse();

    // Initialize logging
    utils::init_logging(args.log_format);

    // Missing keys are usage errors, reported before any client exists
    let config = match MigrationConfig::from_env(args) {
        Ok(config) => config,
        Err(e) => CliArgs::command()
            .error(clap::error::ErrorKind::MissingRequiredArgument, e)
            .exit(),
    };

    tracing::info!(
        src_account = %config.src_account,
        dst_account = %config.dst_account,
        table = %config.table,
        batch_size = config.batch_size,
        "Starting table migration"
    );

    let result = migration::migrate_table(&config, &TracingObserver).await?;

    if config.fail_on_errors && result.has_errors() {
        tracing::error!(errors = result.errors, "Migration finished with errors");
        std::process::exit(1);
    }

    Ok(())
}
