//! Command-line interface for smartlias.
//!
//! This module provides the CLI structure for the `smartlias` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{AdminCommand, ConfigCommand, ResidentsCommand, ServeCommand};

/// smartlias - Barangay resident services
///
/// Serves the resident records, PIN login, announcements and document
/// request API, and offers a few maintenance commands for staff.
#[derive(Debug, Parser)]
#[command(name = "smartlias")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP API
    Serve(ServeCommand),

    /// View or check configuration
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Manage staff accounts
    #[command(subcommand)]
    Admin(AdminCommand),

    /// Inspect resident records
    #[command(subcommand)]
    Residents(ResidentsCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn cli(verbose: u8, quiet: bool) -> Cli {
        Cli {
            config: None,
            verbose,
            quiet,
            command: Command::Serve(ServeCommand { bind: None }),
        }
    }

    #[test]
    fn test_cli_name() {
        assert_eq!(Cli::command().get_name(), "smartlias");
    }

    #[test]
    fn test_verbosity_levels() {
        use crate::logging::Verbosity;
        assert_eq!(cli(0, true).verbosity(), Verbosity::Quiet);
        assert_eq!(cli(3, true).verbosity(), Verbosity::Quiet);
        assert_eq!(cli(0, false).verbosity(), Verbosity::Normal);
        assert_eq!(cli(1, false).verbosity(), Verbosity::Verbose);
        assert_eq!(cli(2, false).verbosity(), Verbosity::Trace);
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_serve_with_bind() {
        let cli = Cli::try_parse_from(["smartlias", "serve", "--bind", "0.0.0.0:9000"]).unwrap();
        match cli.command {
            Command::Serve(cmd) => assert_eq!(cmd.bind.as_deref(), Some("0.0.0.0:9000")),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_admin_create() {
        let cli = Cli::try_parse_from([
            "smartlias",
            "admin",
            "create",
            "--first-name",
            "Maria",
            "--last-name",
            "Santos",
            "--pin",
            "482913",
        ])
        .unwrap();
        match cli.command {
            Command::Admin(AdminCommand::Create {
                first_name, pin, ..
            }) => {
                assert_eq!(first_name, "Maria");
                assert_eq!(pin, "482913");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_residents_list_defaults() {
        let cli = Cli::try_parse_from(["smartlias", "residents", "list"]).unwrap();
        match cli.command {
            Command::Residents(ResidentsCommand::List {
                search,
                limit,
                json,
            }) => {
                assert!(search.is_none());
                assert_eq!(limit, 50);
                assert!(!json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "smartlias",
            "config",
            "show",
            "-c",
            "/custom/config.toml",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
        assert_eq!(cli.verbose, 1);
    }

    #[test]
    fn test_parse_with_quiet() {
        let cli = Cli::try_parse_from(["smartlias", "-q", "residents", "stats"]).unwrap();
        assert!(cli.quiet);
    }
}
