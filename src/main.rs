use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;
use voucher_sync::args::{Args, Command};
use voucher_sync::{commands, Config, Mode, Result};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().home().path();

    // When VOUCHER_SYNC_IN_TEST_MODE is set and non-empty the seeded in-memory remote is used
    // instead of sevDesk.
    let mode = Mode::from_env();

    let _: () = match args.command() {
        Command::Init(init_args) => commands::init(home, init_args.api_key_file())
            .await?
            .print(),

        Command::Refresh => commands::refresh(Config::load(home).await?, mode)
            .await?
            .print(),

        Command::Plan(plan_args) => {
            let config = Config::load(home).await?;
            commands::plan(
                config,
                mode,
                plan_args.voucher_type(),
                plan_args.all_statuses(),
                plan_args.no_refresh(),
            )
            .await?
            .print()
        }

        Command::Submit(submit_args) => {
            let config = Config::load(home).await?;
            commands::submit(
                config,
                mode,
                submit_args.voucher_type(),
                submit_args.yes(),
                submit_args.no_refresh(),
            )
            .await?
            .print()
        }

        Command::Types => commands::types(Config::load(home).await?)
            .await?
            .print(),
    };
    Ok(())
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => EnvFilter::from_default_env(),
        None => {
            // Only the library and this binary log at `level` unless RUST_LOG says otherwise.
            EnvFilter::new(format!(
                "{}={},{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                level,
                env!("CARGO_BIN_NAME"),
                level
            ))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
