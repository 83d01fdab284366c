//! Reqtrail CLI library
//!
//! Command-line access to a reqtrail audit database:
//!
//! - **Setup**: create the database (`reqtrail init`)
//! - **Recording**: run a program under audit (`reqtrail exec -- cmd args`)
//! - **Inspection**: list recent entries and show one in full
//!   (`reqtrail list`, `reqtrail show`)

pub mod commands;
pub mod config;
pub mod error;

pub use error::{CliError, Result};

use clap::{Parser, Subcommand};
use reqtrail_core::store::DEFAULT_LIST_LIMIT;
use std::path::PathBuf;

/// reqtrail - per-request audit recorder
#[derive(Parser, Debug)]
#[command(name = "reqtrail")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Audit database path (defaults to the platform data directory)
    #[arg(long, env = "REQTRAIL_DATABASE", global = true)]
    pub database: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the audit database if it does not exist
    Init,

    /// Run a program and record the invocation as an audit entry
    Exec {
        /// Do not capture environment variables
        #[arg(long)]
        no_env: bool,

        /// Program to run
        program: String,

        /// Arguments passed to the program
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// List recent entries, newest first
    List {
        /// Maximum number of entries
        #[arg(short, long, default_value_t = DEFAULT_LIST_LIMIT)]
        limit: usize,
    },

    /// Show one entry with its captured data and events
    Show {
        /// Entry id
        id: i64,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_exec_keeps_program_flags() {
        let cli = Cli::try_parse_from(["reqtrail", "exec", "--", "ls", "-la", "/tmp"]).unwrap();
        match cli.command {
            Commands::Exec {
                program,
                args,
                no_env,
            } => {
                assert_eq!(program, "ls");
                assert_eq!(args, vec!["-la", "/tmp"]);
                assert!(!no_env);
            },
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_list_default_limit() {
        let cli = Cli::try_parse_from(["reqtrail", "list"]).unwrap();
        assert!(matches!(cli.command, Commands::List { limit: 20 }));
    }
}
