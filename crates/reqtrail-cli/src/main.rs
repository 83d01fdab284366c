//! reqtrail CLI - main entry point

use clap::Parser;
use reqtrail_cli::{commands, config, Cli, Commands};
use reqtrail_core::logging::{init_logging, LogConfig, LogLevel, LogOutput, ENV_PREFIX};
use std::process;
use tracing::{error, warn};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_config = if std::env::vars().any(|(k, _)| k.starts_with(ENV_PREFIX)) {
        LogConfig::from_env().unwrap_or_default()
    } else {
        LogConfig::builder()
            .level(if cli.verbose { LogLevel::Debug } else { LogLevel::Warn })
            .output(LogOutput::Console)
            .log_file_prefix("reqtrail-cli")
            .build()
    };

    // The CLI works without logging
    let guard = init_logging(&log_config).ok();

    let code = match execute_command(&cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {}", e);
            e.exit_code()
        },
    };

    drop(guard);
    process::exit(code);
}

/// Execute the CLI command, returning the process exit code
async fn execute_command(cli: &Cli) -> reqtrail_cli::Result<i32> {
    let database = config::resolve_database(cli.database.as_deref());

    match &cli.command {
        Commands::Init => commands::init::run(&database?).await.map(|_| 0),

        Commands::Exec {
            no_env,
            program,
            args,
        } => {
            // The program runs even when there is nowhere to record it
            let database = database
                .map_err(|e| warn!(error = %e, "No audit database, running without recording"))
                .ok();
            commands::exec::run(database.as_deref(), program, args, !*no_env).await
        },

        Commands::List { limit } => commands::list::run(&database?, *limit).await.map(|_| 0),

        Commands::Show { id, json } => {
            commands::show::run(&database?, *id, *json).await.map(|_| 0)
        },
    }
}
