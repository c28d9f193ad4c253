//! DataFrame views of simulation and grid-search output for presentation.

use polars::prelude::*;

use crate::error::{BalanceError, Result};
use crate::optimizer::GridReport;
use crate::simulator::SimulationRun;
use crate::types::{Asset, PriceSeries};

/// One row per trading day: prices, leg values, total value and trades.
///
/// `prices` must be the series `run` was simulated over.
pub fn equity_frame(prices: &PriceSeries, run: &SimulationRun) -> Result<DataFrame> {
    if prices.len() != run.curve.len() || prices.len() != run.holdings.len() {
        return Err(BalanceError::InvalidPrices(format!(
            "{} price rows for a run of {} days",
            prices.len(),
            run.curve.len()
        )));
    }
    let dates: Vec<String> = prices.iter().map(|p| p.date.to_string()).collect();
    let spy_prices: Vec<f64> = prices.iter().map(|p| p.spy).collect();
    let gld_prices: Vec<f64> = prices.iter().map(|p| p.gld).collect();
    let spy_values: Vec<f64> = run
        .holdings
        .iter()
        .zip(prices.iter())
        .map(|(state, point)| state.position_value(Asset::Spy, point))
        .collect();
    let gld_values: Vec<f64> = run
        .holdings
        .iter()
        .zip(prices.iter())
        .map(|(state, point)| state.position_value(Asset::Gld, point))
        .collect();
    let totals: Vec<f64> = run.curve.values().collect();

    let mut trades = vec![0.0; prices.len()];
    for event in &run.rebalances {
        trades[event.day_index] = event.spy_sold;
    }

    Ok(df!(
        "date" => dates,
        "SPY" => spy_prices,
        "GLD" => gld_prices,
        "SPY_value" => spy_values,
        "GLD_value" => gld_values,
        "total_value" => totals,
        "rebalance" => trades
    )?)
}

/// Ranked grid results, best first.
pub fn grid_frame(report: &GridReport) -> Result<DataFrame> {
    let results = report.results();
    let weights: Vec<f64> = results.iter().map(|r| r.config.target_weight_spy()).collect();
    let kinds: Vec<&str> = results.iter().map(|r| r.config.rule().kind()).collect();
    let params: Vec<f64> = results.iter().map(|r| r.config.rule().parameter()).collect();
    let sharpe: Vec<f64> = results.iter().map(|r| r.metrics.sharpe_ratio).collect();
    let cagr: Vec<f64> = results.iter().map(|r| r.metrics.cagr).collect();
    let max_dd: Vec<f64> = results.iter().map(|r| r.metrics.max_drawdown).collect();
    let weekly_dd: Vec<f64> = results.iter().map(|r| r.metrics.max_weekly_drawdown).collect();
    let monthly_dd: Vec<f64> = results.iter().map(|r| r.metrics.max_monthly_drawdown).collect();
    let volatility: Vec<f64> = results.iter().map(|r| r.metrics.volatility).collect();
    let rebalances: Vec<u64> = results.iter().map(|r| r.rebalances as u64).collect();

    Ok(df!(
        "target_weight_spy" => weights,
        "rule" => kinds,
        "rule_value" => params,
        "sharpe" => sharpe,
        "cagr" => cagr,
        "max_drawdown" => max_dd,
        "max_weekly_drawdown" => weekly_dd,
        "max_monthly_drawdown" => monthly_dd,
        "volatility" => volatility,
        "num_rebalances" => rebalances
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::{calendar_grid, optimize};
    use crate::simulator;
    use crate::strategy::{RebalanceRule, StrategyConfig};
    use crate::types::tests::series;

    #[test]
    fn test_equity_frame_shape() {
        let prices = series(&[100.0, 110.0, 105.0], &[100.0, 95.0, 100.0]);
        let config = StrategyConfig::new(0.5, RebalanceRule::Calendar { period: 2 }).unwrap();
        let run = simulator::run(&prices, &config, 1000.0).unwrap();
        let df = equity_frame(&prices, &run).unwrap();

        assert_eq!(df.shape(), (3, 7));
        let rebalance = df.column("rebalance").unwrap().f64().unwrap();
        assert_eq!(rebalance.get(0), Some(0.0));
        assert_eq!(rebalance.get(1), Some(0.0));
        assert_ne!(rebalance.get(2), Some(0.0));
    }

    #[test]
    fn test_equity_frame_rejects_mismatched_prices() {
        let prices = series(&[100.0, 110.0, 105.0, 120.0], &[100.0, 95.0, 100.0, 90.0]);
        let config = StrategyConfig::new(0.5, RebalanceRule::Calendar { period: 1 }).unwrap();
        let run = simulator::run(&prices, &config, 1000.0).unwrap();
        assert!(run.rebalances.iter().any(|e| e.day_index == 3));

        let shorter = series(&[100.0, 110.0], &[100.0, 95.0]);
        let err = equity_frame(&shorter, &run).unwrap_err();
        assert!(matches!(err, BalanceError::InvalidPrices(_)));
    }

    #[test]
    fn test_grid_frame_rows_follow_ranking() {
        let prices = series(&[100.0, 104.0, 99.0, 107.0], &[100.0, 98.0, 103.0, 101.0]);
        let report = optimize(&prices, &[0.0, 0.5, 1.0], &calendar_grid(&[1]), 1000.0).unwrap();
        let df = grid_frame(&report).unwrap();

        assert_eq!(df.height(), 3);
        let weights = df.column("target_weight_spy").unwrap().f64().unwrap();
        assert_eq!(weights.get(0), Some(report.results()[0].config.target_weight_spy()));
    }
}
