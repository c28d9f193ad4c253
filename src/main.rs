use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Ok, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use pair_balancing::metrics::{self, MetricsConfig, MetricsResult};
use pair_balancing::optimizer::CancelToken;
use pair_balancing::simulator::{self, buy_and_hold};
use pair_balancing::{
    report, AnalysisConfig, Asset, GridReport, HistoryWindow, Objective, PriceSeries, RebalanceRule,
    StrategyConfig, YahooProvider,
};

/// SPY/GLD rebalancing backtests and parameter sweeps.
#[derive(Parser)]
#[command(name = "pair_balancing")]
#[command(version)]
#[command(about = "Backtest and grid-search two-asset SPY/GLD rebalancing strategies")]
struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// TOML analysis configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// History window ending 2025-12-31 (1yr, 2yr, 5yr, 10yr, 15yr, 20yr)
    #[arg(short, long)]
    window: Option<HistoryWindow>,

    /// Initial capital
    #[arg(long)]
    capital: Option<f64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Backtest one strategy against buy-and-hold SPY and GLD
    Run {
        /// Target SPY weight in [0, 1]
        #[arg(long, default_value = "0.5")]
        weight: f64,

        /// Rebalance when the SPY weight drifts by more than this
        #[arg(long, conflicts_with = "period")]
        threshold: Option<f64>,

        /// Rebalance every N trading days
        #[arg(long)]
        period: Option<u32>,

        /// Show metrics as percent differences against the strategy
        #[arg(long)]
        relative: bool,
    },

    /// Grid search over target weight and rebalance rule
    Search {
        /// Ranking objective
        #[arg(short, long, value_enum)]
        objective: Option<ObjectiveArg>,

        /// Number of ranked rows to print
        #[arg(short, long)]
        top: Option<usize>,

        /// Evaluate cells on a single thread
        #[arg(long)]
        sequential: bool,

        /// Write the objective heatmap as CSV
        #[arg(long)]
        heatmap: Option<PathBuf>,

        /// Write heatmap cells as percent differences against a strategy
        #[arg(long, requires = "heatmap")]
        relative: bool,

        /// Baseline target SPY weight for --relative (default 0.5)
        #[arg(long, requires = "relative")]
        weight: Option<f64>,

        /// Baseline threshold for --relative
        #[arg(long, requires = "relative", conflicts_with = "period")]
        threshold: Option<f64>,

        /// Baseline calendar period for --relative
        #[arg(long, requires = "relative")]
        period: Option<u32>,
    },

    /// Print the default configuration as TOML
    Config,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ObjectiveArg {
    Sharpe,
    Cagr,
    Drawdown,
}

impl From<ObjectiveArg> for Objective {
    fn from(arg: ObjectiveArg) -> Self {
        match arg {
            ObjectiveArg::Sharpe => Objective::Sharpe,
            ObjectiveArg::Cagr => Objective::Cagr,
            ObjectiveArg::Drawdown => Objective::MaxDrawdown,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = match &cli.config {
        Some(path) => AnalysisConfig::from_file(path)?,
        None => AnalysisConfig::default(),
    };
    if let Some(window) = cli.window {
        config.data.window = window;
    }
    if let Some(capital) = cli.capital {
        config.backtest.initial_capital = capital;
    }
    config.validate()?;

    match cli.command {
        Commands::Run {
            weight,
            threshold,
            period,
            relative,
        } => {
            let strategy = strategy_from_args(weight, threshold, period)?;
            let prices = load_prices(&config).await?;
            run_single(&config, &prices, &strategy, relative)?;
        }
        Commands::Search {
            objective,
            top,
            sequential,
            heatmap,
            relative,
            weight,
            threshold,
            period,
        } => {
            if let Some(objective) = objective {
                config.grid.objective = objective.into();
            }
            if let Some(top) = top {
                config.grid.top = top;
            }
            if sequential {
                config.grid.parallel = false;
            }
            let strategy = if relative {
                Some(strategy_from_args(weight.unwrap_or(0.5), threshold, period)?)
            } else {
                None
            };
            let prices = load_prices(&config).await?;
            let baseline = match &strategy {
                Some(strategy) => Some(strategy_metrics(&config, &prices, strategy)?),
                None => None,
            };
            let report = run_search(&config, prices).await?;
            print_search(&config, &report)?;
            if let Some(path) = heatmap {
                if let Some(strategy) = &strategy {
                    info!("Heatmap relative to {}", strategy);
                }
                let map = report.heatmap(config.grid.objective, baseline.as_ref());
                std::fs::write(&path, map.to_csv())?;
                info!("Heatmap written to {}", path.display());
            }
        }
        Commands::Config => {
            print!("{}", AnalysisConfig::default().to_toml_string()?);
        }
    }
    Ok(())
}

fn strategy_from_args(weight: f64, threshold: Option<f64>, period: Option<u32>) -> Result<StrategyConfig> {
    let rule = match (threshold, period) {
        (_, Some(period)) => RebalanceRule::calendar(period)?,
        (Some(tolerance), None) => RebalanceRule::threshold(tolerance)?,
        (None, None) => RebalanceRule::threshold(0.05)?,
    };
    Ok(StrategyConfig::new(weight, rule)?)
}

async fn load_prices(config: &AnalysisConfig) -> Result<PriceSeries> {
    let provider = YahooProvider::new();
    let prices = provider.fetch_pair(config.data.window).await?;
    if config.data.normalize {
        Ok(prices.normalized())
    } else {
        Ok(prices)
    }
}

fn run_single(config: &AnalysisConfig, prices: &PriceSeries, strategy: &StrategyConfig, relative: bool) -> Result<()> {
    let capital = config.backtest.initial_capital;
    let metrics_config = config.backtest.metrics_config();

    let run = simulator::run(prices, strategy, capital)?;
    let strategy_metrics = metrics::compute_with(&run.curve, &metrics_config)?;
    let spy_metrics = baseline(prices, Asset::Spy, capital, &metrics_config)?;
    let gld_metrics = baseline(prices, Asset::Gld, capital, &metrics_config)?;

    println!("Strategy: {}", strategy);
    println!(
        "Window: {} ({} to {}, {} trading days)",
        config.data.window,
        prices.first().date,
        prices.last().date,
        prices.len()
    );
    println!("Rebalances: {}", run.rebalance_count());
    if let Some(last) = run.curve.last() {
        println!("Final value: {:.2}", last.value);
    }
    println!();

    print_metrics_header();
    print_metrics_row("Your Strategy", &strategy_metrics);
    if relative {
        print_metrics_row("SPY (% vs yours)", &spy_metrics.relative_to(&strategy_metrics));
        print_metrics_row("GLD (% vs yours)", &gld_metrics.relative_to(&strategy_metrics));
    } else {
        print_metrics_row("SPY", &spy_metrics);
        print_metrics_row("GLD", &gld_metrics);
    }

    let frame = report::equity_frame(prices, &run)?;
    println!("\n{}", frame.tail(Some(5)));
    Ok(())
}

fn strategy_metrics(config: &AnalysisConfig, prices: &PriceSeries, strategy: &StrategyConfig) -> Result<MetricsResult> {
    let curve = simulator::simulate(prices, strategy, config.backtest.initial_capital)?;
    Ok(metrics::compute_with(&curve, &config.backtest.metrics_config())?)
}

fn baseline(prices: &PriceSeries, asset: Asset, capital: f64, config: &MetricsConfig) -> Result<MetricsResult> {
    let curve = buy_and_hold(prices, asset, capital)?;
    Ok(metrics::compute_with(&curve, config)?)
}

async fn run_search(config: &AnalysisConfig, prices: PriceSeries) -> Result<GridReport> {
    let token = CancelToken::new();
    let search = config
        .grid_search()
        .cancel_token(token.clone())
        .on_progress(Arc::new(|done, total| {
            if done % 5000 == 0 || done == total {
                debug!("{}/{} cells evaluated", done, total);
            }
        }));
    let weights = config.grid.weight_grid();
    let rules = config.grid.rule_grid()?;
    let capital = config.backtest.initial_capital;
    info!(
        "Sweeping {} weights x {} rules over {} days",
        weights.len(),
        rules.len(),
        prices.len()
    );

    let start_time = std::time::Instant::now();
    let mut handle = tokio::task::spawn_blocking(move || search.run(&prices, &weights, &rules, capital));
    let report = tokio::select! {
        joined = &mut handle => joined??,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, keeping cells evaluated so far");
            token.cancel();
            handle.await??
        }
    };
    info!("Grid search finished in {:?}", start_time.elapsed());
    Ok(report)
}

fn print_search(config: &AnalysisConfig, report: &GridReport) -> Result<()> {
    println!(
        "Evaluated {} of {} cells ({} degenerate skipped{})",
        report.results().len(),
        report.total_cells(),
        report.skipped(),
        if report.cancelled() { ", cancelled" } else { "" }
    );
    println!("Ranked by {}", report.objective().display_name());
    println!();

    let presets = [
        ("Max Sharpe", Objective::Sharpe),
        ("Max CAGR", Objective::Cagr),
        ("Min Drawdown", Objective::MaxDrawdown),
    ];
    for (label, objective) in presets {
        if let Some(best) = report.best_by(objective) {
            println!("{:<14} {}", label, best.config);
        }
    }
    println!();

    let frame = report::grid_frame(report)?;
    println!("{}", frame.head(Some(config.grid.top)));
    Ok(())
}

fn print_metrics_header() {
    println!(
        "{:<18} {:>10} {:>10} {:>10} {:>12} {:>13} {:>10}",
        "", "Sharpe", "CAGR", "Max DD", "Weekly DD", "Monthly DD", "Vol"
    );
}

fn print_metrics_row(label: &str, m: &MetricsResult) {
    println!(
        "{:<18} {:>10.3} {:>10.4} {:>10.4} {:>12.4} {:>13.4} {:>10.4}",
        label, m.sharpe_ratio, m.cagr, m.max_drawdown, m.max_weekly_drawdown, m.max_monthly_drawdown, m.volatility
    );
}
