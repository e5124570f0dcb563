//! CLI Command Definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::domain::ExecutionMode;

/// Whale Watcher - follow Solana accounts and trade on what they do
#[derive(Parser, Debug)]
#[command(
    name = "whale-watcher",
    version = env!("CARGO_PKG_VERSION"),
    about = "Watch Solana accounts, classify their activity and trade on it",
    long_about = "Polls a set of tracked Solana accounts, turns new transactions into \
                  alerts, and runs configured strategies against a paper ledger or, \
                  when explicitly enabled, the operator wallet."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/watcher.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start watching accounts
    Run(RunCmd),

    /// Show the paper portfolio
    Status,

    /// List recent paper trades
    Trades(TradesCmd),

    /// Reset the paper portfolio
    Reset(ResetCmd),

    /// List tracked accounts and their cursors
    Accounts,
}

/// Start the watcher loop
#[derive(Parser, Debug)]
pub struct RunCmd {
    /// Trade against the paper ledger (default)
    #[arg(short, long, conflicts_with = "live")]
    pub paper: bool,

    /// Enable live trading from the configured wallet (requires --i-accept-losses)
    #[arg(long)]
    pub live: bool,

    /// Acknowledge risk of financial loss (required for --live)
    #[arg(long)]
    pub i_accept_losses: bool,
}

impl RunCmd {
    /// Live only when both flags are given
    pub fn mode(&self) -> ExecutionMode {
        if self.live && self.i_accept_losses {
            ExecutionMode::Real
        } else {
            ExecutionMode::Paper
        }
    }
}

/// List recent trades
#[derive(Parser, Debug)]
pub struct TradesCmd {
    /// Number of trades to show, newest last
    #[arg(short, long, default_value = "20")]
    pub limit: usize,
}

/// Reset the paper portfolio
#[derive(Parser, Debug)]
pub struct ResetCmd {
    /// New starting cash balance in SOL
    #[arg(long, value_name = "SOL")]
    pub balance: f64,

    /// Confirm without prompting
    #[arg(short = 'y', long)]
    pub yes: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliApp {
        CliApp::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_run_defaults_to_paper() {
        let app = parse(&["whale-watcher", "run"]);
        assert_eq!(app.config, PathBuf::from("config/watcher.toml"));
        match app.command {
            Command::Run(cmd) => assert_eq!(cmd.mode(), ExecutionMode::Paper),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_live_requires_acknowledgement() {
        let app = parse(&["whale-watcher", "run", "--live"]);
        let Command::Run(cmd) = app.command else { panic!("expected run") };
        assert_eq!(cmd.mode(), ExecutionMode::Paper);

        let app = parse(&["whale-watcher", "run", "--live", "--i-accept-losses"]);
        let Command::Run(cmd) = app.command else { panic!("expected run") };
        assert_eq!(cmd.mode(), ExecutionMode::Real);
    }

    #[test]
    fn test_paper_and_live_conflict() {
        assert!(CliApp::try_parse_from(["whale-watcher", "run", "--paper", "--live"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let app = parse(&["whale-watcher", "status", "-c", "other.toml", "--debug"]);
        assert!(matches!(app.command, Command::Status));
        assert_eq!(app.config, PathBuf::from("other.toml"));
        assert!(app.debug);
    }

    #[test]
    fn test_reset_and_trades_args() {
        let app = parse(&["whale-watcher", "reset", "--balance", "2.5", "--yes"]);
        let Command::Reset(cmd) = app.command else { panic!("expected reset") };
        assert_eq!(cmd.balance, 2.5);
        assert!(cmd.yes);

        let app = parse(&["whale-watcher", "trades", "--limit", "5"]);
        let Command::Trades(cmd) = app.command else { panic!("expected trades") };
        assert_eq!(cmd.limit, 5);

        assert!(CliApp::try_parse_from(["whale-watcher", "reset"]).is_err());
    }
}
