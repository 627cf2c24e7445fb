use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use crate::commands::{self, CommandReport};
use crate::error::ExitCode;
use crate::sync::config::RunOverrides;

#[derive(Debug, Parser)]
#[command(
    name = "wake-focus-sync",
    version,
    about = "Reconcile the Beeminder wake-and-focus goal with Focusmate sessions"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Reconcile the goal and apply the resulting operations.
    Sync {
        #[command(flatten)]
        window: WindowArgs,
        /// Log operations without calling the API.
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        json: bool,
    },
    /// Print the operations a sync would apply, without applying them.
    Plan {
        #[command(flatten)]
        window: WindowArgs,
        #[arg(long)]
        json: bool,
    },
    /// Show resolved paths, configuration and the last run.
    Status {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Args)]
struct WindowArgs {
    /// Delete datapoints on days without a qualifying session.
    #[arg(long)]
    strict_purge: bool,
    /// Reconcile from the earliest known datapoint instead of a fixed window.
    #[arg(long, conflicts_with = "history_days")]
    full_history: bool,
    /// Number of days ending today to reconcile.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    history_days: Option<u32>,
}

impl WindowArgs {
    fn overrides(&self, dry_run: bool) -> RunOverrides {
        RunOverrides {
            dry_run: dry_run.then_some(true),
            strict_purge: self.strict_purge.then_some(true),
            full_history: if self.full_history {
                Some(true)
            } else {
                self.history_days.map(|_| false)
            },
            history_days: self.history_days,
        }
    }
}

// Only sync mutates the goal; issues elsewhere are setup problems.
fn failure_code(command: &Command) -> ExitCode {
    match command {
        Command::Sync { .. } => ExitCode::OperationsFailed,
        Command::Plan { .. } | Command::Status { .. } => ExitCode::SetupFailed,
    }
}

fn emit(report: &CommandReport, json: bool, on_issues: ExitCode) -> Result<ExitCode> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", report.render_text());
    }
    Ok(if report.ok { ExitCode::Ok } else { on_issues })
}

pub fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let on_issues = failure_code(&cli.command);
    match cli.command {
        Command::Sync {
            window,
            dry_run,
            json,
        } => {
            let opts = commands::sync::SyncOptions {
                overrides: window.overrides(dry_run),
            };
            emit(&commands::sync::run(&opts)?, json, on_issues)
        }
        Command::Plan { window, json } => {
            let opts = commands::plan::PlanOptions {
                overrides: window.overrides(false),
            };
            emit(&commands::plan::run(&opts)?, json, on_issues)
        }
        Command::Status { json } => emit(&commands::status::run()?, json, on_issues),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn unset_flags_leave_configuration_alone() {
        let cli = Cli::try_parse_from(["wake-focus-sync", "sync"]).expect("parse");
        let Command::Sync {
            window, dry_run, ..
        } = cli.command
        else {
            panic!("expected sync");
        };
        let o = window.overrides(dry_run);
        assert_eq!(o.dry_run, None);
        assert_eq!(o.strict_purge, None);
        assert_eq!(o.full_history, None);
        assert_eq!(o.history_days, None);
    }

    #[test]
    fn history_days_switches_off_full_history() {
        let cli = Cli::try_parse_from([
            "wake-focus-sync",
            "plan",
            "--history-days",
            "14",
            "--strict-purge",
        ])
        .expect("parse");
        let Command::Plan { window, .. } = cli.command else {
            panic!("expected plan");
        };
        let o = window.overrides(false);
        assert_eq!(o.full_history, Some(false));
        assert_eq!(o.history_days, Some(14));
        assert_eq!(o.strict_purge, Some(true));
    }

    #[test]
    fn only_sync_issues_map_to_failed_operations() {
        let parse = |args: &[&str]| {
            let mut argv = vec!["wake-focus-sync"];
            argv.extend_from_slice(args);
            Cli::try_parse_from(argv).expect("parse").command
        };
        assert_eq!(failure_code(&parse(&["sync"])), ExitCode::OperationsFailed);
        assert_eq!(failure_code(&parse(&["status"])), ExitCode::SetupFailed);
        assert_eq!(failure_code(&parse(&["plan", "--json"])), ExitCode::SetupFailed);
    }

    #[test]
    fn zero_history_days_is_rejected() {
        assert!(Cli::try_parse_from(["wake-focus-sync", "sync", "--history-days", "0"]).is_err());
        assert!(
            Cli::try_parse_from([
                "wake-focus-sync",
                "sync",
                "--full-history",
                "--history-days",
                "3"
            ])
            .is_err()
        );
    }
}
