//! Whale Watcher - Solana account watcher and alert-driven trader

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Mutex;
use tracing_subscriber::{fmt, EnvFilter};

use whale_watcher::adapters::cli::{CliApp, Command, ResetCmd, RunCmd, TradesCmd};
use whale_watcher::adapters::jupiter::{JupiterClient, JupiterConfig, JupiterPriceClient};
use whale_watcher::adapters::solana::{SolanaClient, WalletExecutor, WalletManager};
use whale_watcher::application::{
    EventBus, ExecutorSet, ModeSwitch, Monitor, PaperExecutor, RealExecutor, StrategyEngine,
    Watcher,
};
use whale_watcher::config::{load_config, Config};
use whale_watcher::ports::PriceLookup;
use whale_watcher::domain::{
    abbreviate, AlertClassifier, ExecutionMode, JsonFileStore, MonitorState, PaperPortfolio,
    PortfolioSnapshot, SnapshotStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (secrets go here, not in the config file)
    dotenvy::dotenv().ok();

    let app = CliApp::parse();
    let config = load_config(&app.config)
        .with_context(|| format!("Failed to load configuration from {}", app.config.display()))?;
    init_logging(app.verbose, app.debug, &config.logging.level);

    match app.command {
        Command::Run(cmd) => run_command(cmd, config).await,
        Command::Status => status_command(config),
        Command::Trades(cmd) => trades_command(cmd, config),
        Command::Reset(cmd) => reset_command(cmd, config),
        Command::Accounts => accounts_command(config),
    }
}

fn init_logging(verbose: bool, debug: bool, configured: &str) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(configured))
    };

    fmt().with_env_filter(filter).with_target(false).init();
}

fn portfolio_store(config: &Config) -> Arc<dyn SnapshotStore<PortfolioSnapshot>> {
    Arc::new(JsonFileStore::new(config.paper.portfolio_path()))
}

fn open_portfolio(config: &Config) -> Result<PaperPortfolio> {
    PaperPortfolio::load_or_default(portfolio_store(config), config.paper.starting_balance)
        .with_context(|| {
            format!(
                "Failed to open paper portfolio at {}",
                config.paper.portfolio_path().display()
            )
        })
}

async fn run_command(cmd: RunCmd, config: Config) -> Result<()> {
    if cmd.live && !cmd.i_accept_losses {
        bail!("--live requires --i-accept-losses");
    }
    let mode = cmd.mode();
    tracing::info!("Starting whale watcher in {} mode", mode);

    std::fs::create_dir_all(config.paper.data_dir()).with_context(|| {
        format!("Failed to create data directory {}", config.paper.data_dir().display())
    })?;

    let events = EventBus::default();
    let solana = SolanaClient::new(config.solana.get_rpc_url());

    // Monitor
    let state_store: Arc<dyn SnapshotStore<MonitorState>> =
        Arc::new(JsonFileStore::new(config.paper.monitor_state_path()));
    let monitor = Monitor::new(
        Arc::new(solana.clone()),
        AlertClassifier::new(config.classifier.clone()),
    )
    .with_config(config.monitor.to_monitor_config())
    .with_accounts(config.accounts.clone())
    .with_events(events.clone())
    .with_store(state_store)
    .context("Failed to restore monitor state")?;

    // Executors
    let mut portfolio = open_portfolio(&config)?;
    portfolio.set_enabled(mode == ExecutionMode::Paper)?;
    let price_timeout = Duration::from_millis(config.paper.price_timeout_ms);
    let prices: Arc<dyn PriceLookup> = Arc::new(
        JupiterPriceClient::new(price_timeout).context("Failed to create price client")?,
    );
    let paper = PaperExecutor::new(Arc::new(Mutex::new(portfolio)))
        .with_price_lookup(prices.clone())
        .with_price_timeout(price_timeout)
        .with_default_price(config.paper.default_price);
    let mut executors = ExecutorSet::new(Arc::new(paper));

    if mode == ExecutionMode::Real {
        let keypair_path = config.solana.get_keypair_path();
        let wallet = load_wallet_with_context(&keypair_path)?;
        let jupiter = JupiterClient::with_config(JupiterConfig {
            api_base_url: config.jupiter.api_url.clone(),
            api_key: config.jupiter.get_api_key(),
            ..JupiterConfig::default()
        })
        .context("Failed to create Jupiter client")?;

        let mut wallet_executor = WalletExecutor::new(solana.clone(), Arc::new(wallet), jupiter)
            .with_slippage_bps(config.jupiter.slippage_bps);
        if let Some(fee) = config.jupiter.priority_fee_lamports {
            wallet_executor = wallet_executor.with_priority_fee(fee);
        }
        tracing::warn!(
            "LIVE TRADING from wallet {} - real funds at risk",
            wallet_executor.wallet_address()
        );
        executors = executors.with_real(Arc::new(RealExecutor::new(Arc::new(wallet_executor))));
    }

    // Strategies
    let mut engine = StrategyEngine::new(config.guardrails.clone(), executors, ModeSwitch::new(mode))
        .with_events(events.clone())
        .with_price_lookup(prices, price_timeout);
    for strategy in config.build_strategies()? {
        engine.register(strategy);
    }

    if config.accounts.is_empty() {
        tracing::warn!("No accounts configured - nothing to watch");
    }

    // Notification feed
    let mut trades = events.subscribe_trades();
    tokio::spawn(async move {
        loop {
            match trades.recv().await {
                Ok(report) => println!("{}", report),
                Err(RecvError::Lagged(n)) => tracing::warn!("Trade feed skipped {} report(s)", n),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let watcher = Watcher::new(monitor, engine);

    // Setup Ctrl+C handler
    let handle = watcher.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutdown signal received");
        handle.stop().await;
    });

    watcher.run().await;

    let status = watcher.status().await;
    tracing::info!(
        "Watcher stopped after {} cycle(s): {} alert(s), {} executed, {} failed, {} rejected",
        status.cycles,
        status.alerts,
        status.executed,
        status.failed,
        status.rejected
    );
    Ok(())
}

fn status_command(config: Config) -> Result<()> {
    let portfolio = open_portfolio(&config)?;
    let ledger = portfolio.ledger();
    let stats = ledger.stats();

    println!();
    println!("======================================");
    println!("    Paper Portfolio");
    println!("======================================");
    println!();
    println!("  Last run mode:   {}", if portfolio.is_enabled() { "paper" } else { "live" });
    println!("  Cash:            {:.6} SOL", ledger.cash());
    println!("  Starting:        {:.6} SOL", stats.starting_balance);
    println!("  Trades:          {}", stats.total_trades);
    println!("  Wins / Losses:   {} / {} ({:.1}%)", stats.wins, stats.losses, stats.win_rate());
    println!("  Realized P&L:    {:+.6} SOL", stats.total_realized_pnl);
    println!("  Volume:          {:.6} SOL", stats.total_volume);

    if !ledger.positions().is_empty() {
        println!();
        println!("  Positions:");
        for position in ledger.positions().values() {
            println!(
                "    {:<12} {:>18.6} units @ {:.9} SOL (basis {:.6} SOL)",
                position.symbol.as_deref().unwrap_or_else(|| abbreviate(&position.asset_id, 12)),
                position.amount,
                position.avg_cost,
                position.total_cost_basis
            );
        }
    }
    println!();
    Ok(())
}

fn trades_command(cmd: TradesCmd, config: Config) -> Result<()> {
    let portfolio = open_portfolio(&config)?;
    let history = portfolio.ledger().history();

    if history.is_empty() {
        println!("No paper trades yet.");
        return Ok(());
    }

    let start = history.len().saturating_sub(cmd.limit);
    for trade in &history[start..] {
        let pnl = trade
            .realized_pnl
            .map(|p| format!(" pnl {:+.6}", p))
            .unwrap_or_default();
        println!(
            "#{:<5} {} {} {:<4} {:.6} units for {:.6} SOL @ {:.9}{}",
            trade.id,
            trade.timestamp.format("%Y-%m-%d %H:%M:%S"),
            trade.side,
            trade.symbol.as_deref().unwrap_or(&trade.asset_id),
            trade.asset_amount,
            trade.cash_amount,
            trade.price,
            pnl
        );
    }
    Ok(())
}

fn reset_command(cmd: ResetCmd, config: Config) -> Result<()> {
    let mut portfolio = open_portfolio(&config)?;

    if !cmd.yes {
        println!(
            "This clears {} trade(s) and {} position(s) and sets cash to {} SOL.",
            portfolio.ledger().history().len(),
            portfolio.ledger().positions().len(),
            cmd.balance
        );
        print!("Type 'RESET' to confirm (or use --yes to skip this prompt): ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        if input.trim() != "RESET" {
            println!("Aborted. Portfolio unchanged.");
            return Ok(());
        }
    }

    portfolio
        .reset(cmd.balance)
        .context("Failed to reset paper portfolio")?;
    println!("Paper portfolio reset to {} SOL.", cmd.balance);
    Ok(())
}

fn accounts_command(config: Config) -> Result<()> {
    let store: JsonFileStore<MonitorState> = JsonFileStore::new(config.paper.monitor_state_path());
    let state = store.load()?.unwrap_or_default();

    if config.accounts.is_empty() {
        println!("No accounts configured.");
        return Ok(());
    }

    for account in &config.accounts {
        print!("{:<24} {}", account.label(), account.address);
        match state.account(&account.address) {
            Some(cursor) => {
                let balance = cursor
                    .last_balance
                    .map(|b| format!("{:.4} SOL", b))
                    .unwrap_or_else(|| "-".to_string());
                let slot = cursor
                    .cursor
                    .as_ref()
                    .map(|c| c.slot.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!("  balance {}  slot {}  seen {}", balance, slot, cursor.seen.len());
            }
            None => println!("  (not polled yet)"),
        }
    }
    Ok(())
}

/// Load wallet with helpful error messages
fn load_wallet_with_context(keypair_path: &str) -> Result<WalletManager> {
    let path = Path::new(keypair_path);

    if !path.exists() {
        bail!(
            "Wallet file not found: {}\n\n\
             A wallet is required for live trading.\n\n\
             To create a new wallet, run:\n  \
             solana-keygen new --outfile {}\n\n\
             Or update 'keypair_path' in your config / SOLANA_KEYPAIR_PATH",
            keypair_path,
            keypair_path
        );
    }

    WalletManager::from_file(keypair_path).map_err(|e| {
        anyhow::anyhow!(
            "Failed to load wallet from '{}': {}\n\n\
             Expected format: JSON array of bytes (e.g., [1,2,3,...])",
            keypair_path,
            e
        )
    })
}
