//! Backscope CLI: log in, list and inspect backtests without the TUI.
//!
//! Commands:
//! - `login`: exchange credentials for an API token and print it
//! - `list`: print backtest summaries grouped by strategy
//! - `show`: print a backtest's parameters and one page of a table

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use backscope_core::api::{BacktestApi, Credentials, HttpApi};
use backscope_core::chart::overview_pairs;
use backscope_core::config::AppConfig;
use backscope_core::model::{BacktestId, BacktestRecord};
use backscope_core::pagination::Paginator;
use backscope_core::session::Session;
use backscope_core::summary::GroupedSummaries;

#[derive(Parser)]
#[command(name = "backscope", about = "Backscope CLI: browse backtest results")]
struct Cli {
    /// Config file. Defaults to the user config dir.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// API base URL, overriding the config file.
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// API token, overriding the config file.
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and print the API token.
    Login {
        #[arg(long)]
        username: String,

        #[arg(long)]
        password: String,
    },
    /// List backtests grouped by strategy.
    List {
        /// Only show this strategy.
        #[arg(long)]
        strategy: Option<String>,
    },
    /// Show one backtest.
    Show {
        /// Backtest id.
        id: BacktestId,

        /// Table to print.
        #[arg(long, value_enum, default_value_t = TableArg::Overview)]
        table: TableArg,

        /// 1-indexed page of the table.
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum TableArg {
    Overview,
    Trades,
    Signals,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "backscope=info,backscope_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let api = HttpApi::new(&config.api.base_url, config.api.timeout())?;
    debug!(base_url = api.base_url(), "api client ready");

    match cli.command {
        Commands::Login { username, password } => run_login(&api, username, password),
        Commands::List { strategy } => {
            let mut session = authenticated(&config)?;
            run_list(&mut session, &api, strategy.as_deref())
        }
        Commands::Show { id, table, page } => {
            let mut session = authenticated(&config)?;
            run_show(&mut session, &api, id, table, page, config.session.page_size)
        }
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => AppConfig::default_path().unwrap_or_else(|| PathBuf::from("backscope.toml")),
    };
    let mut config =
        AppConfig::load(&path).with_context(|| format!("loading {}", path.display()))?;
    if let Some(url) = &cli.api_url {
        config.api.base_url = url.clone();
    }
    if let Some(token) = &cli.token {
        config.auth.token = Some(token.clone());
    }
    config.validate()?;
    Ok(config)
}

fn authenticated(config: &AppConfig) -> Result<Session> {
    let Some(token) = config.token() else {
        bail!("no API token: run `backscope login` and pass --token or set BACKSCOPE_TOKEN");
    };
    let mut session = Session::new(config.session.reselect);
    session.authenticate(token);
    Ok(session)
}

fn run_login(api: &dyn BacktestApi, username: String, password: String) -> Result<()> {
    let token = api.login(&Credentials::new(username, password))?;
    println!("{}", token.as_str());
    Ok(())
}

fn run_list(session: &mut Session, api: &dyn BacktestApi, strategy: Option<&str>) -> Result<()> {
    let grouped = session.grouped_blocking(api)?;
    if let Some(name) = strategy {
        if grouped.get(name).is_none() {
            bail!("no backtests for strategy {name:?}");
        }
    }
    print_grouped(grouped, strategy);
    Ok(())
}

fn print_grouped(grouped: &GroupedSummaries, only: Option<&str>) {
    if grouped.is_empty() {
        println!("No backtests found.");
        return;
    }
    for group in grouped.iter() {
        if only.is_some_and(|name| name != group.name) {
            continue;
        }
        println!("{} ({})", group.name, group.summaries.len());
        println!(
            "  {:>6}  {:<20} {:<24} {:>14}  {:<10}  {:<10}",
            "ID", "CREATED", "SYMBOLS", "CAPITAL", "START", "END"
        );
        for s in &group.summaries {
            println!(
                "  {:>6}  {:<20} {:<24} {:>14.2}  {:<10}  {:<10}",
                s.id.to_string(),
                s.created_at,
                s.tickers.join(" | "),
                s.capital,
                s.start_date,
                s.end_date
            );
        }
        println!();
    }
}

fn run_show(
    session: &mut Session,
    api: &dyn BacktestApi,
    id: BacktestId,
    table: TableArg,
    page: usize,
    page_size: usize,
) -> Result<()> {
    let record = session.open_blocking(api, id)?;
    let p = &record.parameters;
    println!(
        "{} #{}  SYMBOLS {}  CAPITAL {:.2}  START {}  END {}",
        p.strategy_name,
        record.id,
        p.tickers.join(" | "),
        p.capital,
        p.test_start,
        p.test_end
    );
    if record.is_empty() {
        println!("No data available for this backtest.");
        return Ok(());
    }

    match table {
        TableArg::Overview => print_overview(&record, page, page_size),
        TableArg::Trades => print_trades(&record, page, page_size),
        TableArg::Signals => print_signals(&record, page, page_size),
    }
}

/// Paginator positioned on `page`, or an error if the page does not exist.
fn pager_at(len: usize, page: usize, page_size: usize) -> Result<Paginator> {
    let mut pager = Paginator::for_len(len, page_size);
    if page == 0 || page > pager.total_pages() {
        bail!("page {page} out of range 1..={}", pager.total_pages());
    }
    for _ in 1..page {
        pager.next();
    }
    Ok(pager)
}

fn print_footer(pager: &Paginator) {
    println!(
        "Page {} of {} ({} rows)",
        pager.current_page(),
        pager.total_pages(),
        pager.len()
    );
}

fn print_overview(record: &BacktestRecord, page: usize, page_size: usize) -> Result<()> {
    let pairs = overview_pairs(&record.static_stats);
    if pairs.is_empty() {
        println!("No overview data available.");
        return Ok(());
    }
    let pager = pager_at(pairs.len(), page, page_size)?;
    for pair in pager.current_items(&pairs) {
        println!(
            "{:<24} {:>16}    {:<24} {:>16}",
            pair.left_label, pair.left_value, pair.right_label, pair.right_value
        );
    }
    print_footer(&pager);
    Ok(())
}

fn print_trades(record: &BacktestRecord, page: usize, page_size: usize) -> Result<()> {
    if record.trades.is_empty() {
        println!("No trades data available.");
        return Ok(());
    }
    let pager = pager_at(record.trades.len(), page, page_size)?;
    println!(
        "{:<19} {:>6} {:>4} {:<8} {:>10} {:>12} {:>14}  {}",
        "TIMESTAMP", "TRADE", "LEG", "TICKER", "QTY", "PRICE", "COST", "ACTION"
    );
    for t in pager.current_items(&record.trades) {
        println!(
            "{:<19} {:>6} {:>4} {:<8} {:>10.2} {:>12.2} {:>14.2}  {}",
            t.timestamp.to_string(),
            t.trade_id,
            t.leg_id,
            t.ticker,
            t.quantity,
            t.price,
            t.cost,
            t.action
        );
    }
    print_footer(&pager);
    Ok(())
}

/// Pages over signal events; the timestamp is printed on each event's first row.
fn print_signals(record: &BacktestRecord, page: usize, page_size: usize) -> Result<()> {
    if record.signal_data.is_empty() {
        println!("No signals data available.");
        return Ok(());
    }
    let pager = pager_at(record.signal_data.len(), page, page_size)?;
    println!(
        "{:<19} {:<8} {:<8} {:>4} {:>11}",
        "TIMESTAMP", "TICKER", "ACTION", "LEG", "ALLOCATION"
    );
    for event in pager.current_items(&record.signal_data) {
        for (i, ins) in event.trade_instructions.iter().enumerate() {
            let time = if i == 0 {
                event.timestamp.to_string()
            } else {
                String::new()
            };
            println!(
                "{:<19} {:<8} {:<8} {:>4} {:>10.2}%",
                time, ins.ticker, ins.action, ins.leg_id, ins.allocation_percent
            );
        }
    }
    print_footer(&pager);
    Ok(())
}
