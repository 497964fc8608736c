//! ReallyStop CLI - Terminate orphaned build and debug helper processes
//!
//! A command-line tool for killing leftover MSBuild-style processes,
//! cleaning stale build output and managing the persisted selection.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use reallystop_core::ConfigStore;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::FilterArgs;

/// Exit code when the command could not run, e.g. on a malformed config.
const EXIT_ERROR: u8 = 2;

#[derive(Parser)]
#[command(name = "reallystop")]
#[command(author, version, about = "Terminate orphaned build and debug helper processes")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Kill matching processes (exit code 0 killed, 1 none found, 2 error or failed run)
    Kill {
        #[command(flatten)]
        filter: FilterArgs,

        /// Also delete bin/obj directories below DIR
        #[arg(long, value_name = "DIR")]
        force_clean: Option<PathBuf>,
    },

    /// Show the processes a kill would target
    #[command(alias = "ls")]
    List {
        #[command(flatten)]
        filter: FilterArgs,

        /// Group matches by process name
        #[arg(short, long)]
        grouped: bool,
    },

    /// Delete bin/obj build output directories below DIR
    Clean {
        /// Root directory to clean
        dir: PathBuf,
    },

    /// Manage persisted settings
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current settings
    Show,
    /// Replace the process name list
    SetNames {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Replace the allowed port list
    SetPorts { ports: Vec<String> },
    /// Update restriction and cleanup flags
    SetFlags {
        /// Only processes owned by the current user
        #[arg(long)]
        user: Option<bool>,
        /// Only child processes of the caller (read by IDE hosts, not this CLI)
        #[arg(long)]
        children: Option<bool>,
        /// Restrict by the allowed port list
        #[arg(long)]
        ports: Option<bool>,
        /// Clean bin/obj after a default kill
        #[arg(long)]
        force_clean: Option<bool>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    ExitCode::from(exit_status(run(cli).await))
}

async fn run(cli: Cli) -> anyhow::Result<u8> {
    match cli.command {
        Some(Commands::Kill {
            filter,
            force_clean,
        }) => {
            let store = ConfigStore::new()?;
            return commands::kill::run(&store, &filter, force_clean, cli.json).await;
        }
        Some(Commands::List { filter, grouped }) => {
            let store = ConfigStore::new()?;
            commands::list::run(&store, &filter, grouped, cli.json).await?;
        }
        Some(Commands::Clean { dir }) => {
            commands::clean::run(dir, cli.json).await?;
        }
        Some(Commands::Config { action }) => {
            let store = ConfigStore::new()?;
            match action.unwrap_or(ConfigAction::Show) {
                ConfigAction::Show => commands::config::show(&store, cli.json).await?,
                ConfigAction::SetNames { names } => {
                    commands::config::set_names(&store, names).await?
                }
                ConfigAction::SetPorts { ports } => {
                    commands::config::set_ports(&store, ports).await?
                }
                ConfigAction::SetFlags {
                    user,
                    children,
                    ports,
                    force_clean,
                } => commands::config::set_flags(&store, user, children, ports, force_clean).await?,
            }
        }
        None => {
            // Default: one-shot kill with the persisted settings
            let store = ConfigStore::new()?;
            return commands::kill::run_with_settings(&store, cli.json).await;
        }
    }

    Ok(0)
}

/// Process exit code for a command result.
///
/// Failures to run at all share code 2 with a failed kill, keeping 1 for
/// "nothing matched".
fn exit_status(result: anyhow::Result<u8>) -> u8 {
    match result {
        Ok(code) => code,
        Err(e) => {
            debug!(error = ?e, "Command failed");
            eprintln!("Error: {e:#}");
            EXIT_ERROR
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn broken_store(dir: &tempfile::TempDir) -> ConfigStore {
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{bad").unwrap();
        ConfigStore::with_path(path)
    }

    #[tokio::test]
    async fn test_kill_with_broken_config_exits_with_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = broken_store(&dir);
        let args = FilterArgs {
            names: vec!["no_such_proc_xyz".into()],
            ..FilterArgs::default()
        };

        let result = commands::kill::run(&store, &args, None, true).await;
        assert!(result.is_err());
        assert_eq!(exit_status(result), EXIT_ERROR);
    }

    #[tokio::test]
    async fn test_default_kill_with_broken_config_exits_with_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = broken_store(&dir);

        let result = commands::kill::run_with_settings(&store, true).await;
        assert_eq!(exit_status(result), EXIT_ERROR);
    }

    #[tokio::test]
    async fn test_kill_without_config_and_no_match_exits_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::with_path(dir.path().join("config.json"));
        let args = FilterArgs {
            names: vec!["no_such_proc_xyz".into()],
            ..FilterArgs::default()
        };

        let result = commands::kill::run(&store, &args, None, true).await;
        assert_eq!(exit_status(result), 1);
    }

    #[test]
    fn test_exit_status_passes_outcome_codes_through() {
        assert_eq!(exit_status(Ok(0)), 0);
        assert_eq!(exit_status(Ok(1)), 1);
        assert_eq!(exit_status(Err(anyhow::anyhow!("no home directory"))), EXIT_ERROR);
    }

    #[test]
    fn test_kill_rejects_children_flag_and_conflicting_switches() {
        assert!(Cli::try_parse_from(["reallystop", "kill", "--children"]).is_err());
        assert!(Cli::try_parse_from(["reallystop", "kill", "--user", "--all-users"]).is_err());
        assert!(Cli::try_parse_from(["reallystop", "kill", "-p", "3000", "--any-port"]).is_err());

        let cli = Cli::try_parse_from(["reallystop", "kill", "--all-users", "--any-port"]).unwrap();
        match cli.command {
            Some(Commands::Kill { filter, .. }) => {
                assert!(filter.all_users);
                assert!(filter.any_port);
            }
            _ => panic!("expected kill"),
        }
    }
}
