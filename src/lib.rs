//! Backtesting and grid search for two-asset SPY/GLD rebalancing portfolios.
//!
//! A strategy holds a fixed SPY/GLD split and trades back to it either every
//! N trading days or whenever the SPY weight drifts past a tolerance. The
//! crate simulates such strategies over daily closes, scores the resulting
//! equity curves and sweeps the parameter grid to find good settings.
//!
//! ```
//! use chrono::NaiveDate;
//! use pair_balancing::{metrics, simulator, PricePoint, PriceSeries, RebalanceRule, StrategyConfig};
//!
//! let day = |d| NaiveDate::from_ymd_opt(2025, 1, d).unwrap();
//! let prices = PriceSeries::new(vec![
//!     PricePoint::new(day(2), 100.0, 100.0),
//!     PricePoint::new(day(3), 110.0, 95.0),
//!     PricePoint::new(day(6), 105.0, 100.0),
//! ])
//! .unwrap();
//!
//! let config = StrategyConfig::new(0.5, RebalanceRule::Calendar { period: 1 }).unwrap();
//! let curve = simulator::simulate(&prices, &config, 1000.0).unwrap();
//! let result = metrics::compute(&curve, 252).unwrap();
//! assert!(result.max_drawdown <= 0.0);
//! ```
//!
//! # Modules
//!
//! - [`types`]: price pairs and equity curves
//! - [`strategy`]: target weights and rebalance rules
//! - [`portfolio`]: holdings as the simulation steps through time
//! - [`simulator`]: the day-by-day backtest
//! - [`metrics`]: Sharpe ratio, CAGR and drawdowns
//! - [`optimizer`]: grid search and heatmaps
//! - [`report`]: polars DataFrames for presentation
//! - [`provider`]: Yahoo Finance price history
//! - [`config`]: TOML analysis configuration

pub mod config;
pub mod error;
pub mod metrics;
pub mod optimizer;
pub mod portfolio;
pub mod provider;
pub mod report;
pub mod simulator;
pub mod strategy;
pub mod types;

pub use config::AnalysisConfig;
pub use error::{BalanceError, Result};
pub use metrics::{MetricsConfig, MetricsResult};
pub use optimizer::{optimize, CancelToken, GridReport, GridResult, GridSearch, Heatmap, Objective};
pub use portfolio::PortfolioState;
pub use provider::{HistoryWindow, YahooProvider};
pub use simulator::{simulate, SimulationRun};
pub use strategy::{RebalanceRule, StrategyConfig};
pub use types::{Asset, EquityCurve, EquityPoint, PricePoint, PriceSeries};
