//! Day-by-day simulation of a fixed-ratio rebalancing policy.
//!
//! The simulator is a pure function of its inputs: it holds no state between
//! calls, performs no I/O and never logs.

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{BalanceError, Result};
use crate::portfolio::PortfolioState;
use crate::strategy::{RebalanceRule, StrategyConfig};
use crate::types::{Asset, EquityCurve, EquityPoint, PricePoint, PriceSeries};

/// Trades smaller than this fraction of portfolio value are rounding, not rebalances.
const NEGLIGIBLE_TRADE: f64 = 1e-12;

/// A rebalance that moved value between the legs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RebalanceEvent {
    pub date: NaiveDate,
    pub day_index: usize,
    /// Dollar value of SPY sold, negative when SPY was bought.
    pub spy_sold: f64,
}

/// Everything a single simulation produces.
#[derive(Debug, Clone)]
pub struct SimulationRun {
    pub curve: EquityCurve,
    /// Post-rebalance holdings, one per trading day.
    pub holdings: Vec<PortfolioState>,
    /// Days where the rule fired and value actually changed legs.
    pub rebalances: Vec<RebalanceEvent>,
}

impl SimulationRun {
    pub fn rebalance_count(&self) -> usize {
        self.rebalances.len()
    }
}

/// Simulate `config` over `prices` and return the equity curve.
pub fn simulate(prices: &PriceSeries, config: &StrategyConfig, initial_capital: f64) -> Result<EquityCurve> {
    run(prices, config, initial_capital).map(|run| run.curve)
}

/// Simulate `config` over `prices`, keeping the holdings trace and rebalances.
pub fn run(prices: &PriceSeries, config: &StrategyConfig, initial_capital: f64) -> Result<SimulationRun> {
    validate_capital(initial_capital)?;

    let target = config.target_weight_spy();
    let rule = config.rule();
    let first = prices.first();

    let mut state = PortfolioState::allocate(first, initial_capital, target);
    let mut points = Vec::with_capacity(prices.len());
    let mut holdings = Vec::with_capacity(prices.len());
    let mut rebalances = Vec::new();

    points.push(EquityPoint {
        date: first.date,
        value: initial_capital,
    });
    holdings.push(state);

    for (day_index, point) in prices.iter().enumerate().skip(1) {
        state.mark(point);
        let value = checked_value(&state, point)?;

        if rule.should_rebalance(day_index, state.weight_spy(point), target) {
            let spy_sold = state.rebalance(point, target);
            if spy_sold.abs() > value * NEGLIGIBLE_TRADE {
                rebalances.push(RebalanceEvent {
                    date: point.date,
                    day_index,
                    spy_sold,
                });
            }
        }

        points.push(EquityPoint {
            date: point.date,
            value,
        });
        holdings.push(state);
    }

    Ok(SimulationRun {
        curve: EquityCurve::new(points),
        holdings,
        rebalances,
    })
}

/// Equity curve of putting all capital in one asset and never trading.
pub fn buy_and_hold(prices: &PriceSeries, asset: Asset, initial_capital: f64) -> Result<EquityCurve> {
    let weight_spy = match asset {
        Asset::Spy => 1.0,
        Asset::Gld => 0.0,
    };
    // A single-asset portfolio never drifts, so no rule ever trades.
    let config = StrategyConfig::new(weight_spy, RebalanceRule::Threshold { tolerance: 1.0 })?;
    simulate(prices, &config, initial_capital)
}

fn validate_capital(initial_capital: f64) -> Result<()> {
    if initial_capital.is_finite() && initial_capital > 0.0 {
        Ok(())
    } else {
        Err(BalanceError::InvalidConfig(format!(
            "initial capital must be positive and finite, got {}",
            initial_capital
        )))
    }
}

fn checked_value(state: &PortfolioState, point: &PricePoint) -> Result<f64> {
    let value = state.total_value(point);
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(BalanceError::DegenerateState {
            date: point.date,
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tests::series;

    fn config(weight: f64, rule: RebalanceRule) -> StrategyConfig {
        StrategyConfig::new(weight, rule).unwrap()
    }

    #[test]
    fn test_three_day_daily_rebalance() {
        let prices = series(&[100.0, 110.0, 105.0], &[100.0, 95.0, 100.0]);
        let run = run(&prices, &config(0.5, RebalanceRule::Calendar { period: 1 }), 1000.0).unwrap();

        assert_eq!(run.holdings[0].shares(Asset::Spy), 5.0);
        assert_eq!(run.holdings[0].shares(Asset::Gld), 5.0);

        let values: Vec<f64> = run.curve.values().collect();
        assert_eq!(values[0], 1000.0);
        assert!((values[1] - 1025.0).abs() < 1e-9);

        let spy_shares = 512.5 / 110.0;
        let gld_shares = 512.5 / 95.0;
        assert!((run.holdings[1].shares(Asset::Spy) - spy_shares).abs() < 1e-12);
        assert!((run.holdings[1].shares(Asset::Gld) - gld_shares).abs() < 1e-12);

        let expected_day2 = spy_shares * 105.0 + gld_shares * 100.0;
        assert!((values[2] - expected_day2).abs() < 1e-9);
        assert_eq!(run.rebalance_count(), 2);
    }

    #[test]
    fn test_single_day_series() {
        let prices = series(&[100.0], &[50.0]);
        let run = run(&prices, &config(0.3, RebalanceRule::Calendar { period: 1 }), 500.0).unwrap();
        assert_eq!(run.curve.len(), 1);
        assert_eq!(run.curve.first().unwrap().value, 500.0);
        assert!(run.rebalances.is_empty());
    }

    #[test]
    fn test_calendar_period_skips_days() {
        let prices = series(&[100.0, 120.0, 90.0, 110.0, 100.0], &[100.0; 5]);
        let run = run(&prices, &config(0.5, RebalanceRule::Calendar { period: 2 }), 1000.0).unwrap();
        let days: Vec<usize> = run.rebalances.iter().map(|e| e.day_index).collect();
        assert_eq!(days, vec![2, 4]);
    }

    #[test]
    fn test_threshold_only_trades_on_drift() {
        // Day 1 pushes SPY weight to 0.6, day 2 back to 0.5 after the trade.
        let prices = series(&[100.0, 150.0, 150.0, 151.0], &[100.0, 100.0, 100.0, 100.0]);
        let run = run(&prices, &config(0.5, RebalanceRule::Threshold { tolerance: 0.05 }), 1000.0).unwrap();
        assert_eq!(run.rebalance_count(), 1);
        assert_eq!(run.rebalances[0].day_index, 1);
        assert!((run.rebalances[0].spy_sold - 125.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_op_rebalances_are_not_recorded() {
        let prices = series(&[100.0, 120.0, 90.0, 110.0], &[100.0, 95.0, 105.0, 98.0]);
        for weight in [0.0, 1.0] {
            let run = run(&prices, &config(weight, RebalanceRule::Calendar { period: 1 }), 1000.0).unwrap();
            assert_eq!(run.rebalance_count(), 0, "weight {}", weight);
        }

        // Unchanged prices leave nothing to trade even when the calendar fires.
        let flat = series(&[100.0; 4], &[50.0; 4]);
        let run = run(&flat, &config(0.3, RebalanceRule::Calendar { period: 1 }), 1000.0).unwrap();
        assert_eq!(run.rebalance_count(), 0);
    }

    #[test]
    fn test_rebalance_keeps_value_continuous() {
        let prices = series(&[100.0, 130.0, 80.0, 95.0], &[100.0, 90.0, 120.0, 110.0]);
        let run = run(&prices, &config(0.4, RebalanceRule::Calendar { period: 1 }), 1000.0).unwrap();
        for (state, point) in run.holdings.iter().zip(prices.iter()).skip(1) {
            let curve_value = run
                .curve
                .points()
                .iter()
                .find(|p| p.date == point.date)
                .unwrap()
                .value;
            assert!((state.total_value(point) - curve_value).abs() < 1e-9);
            assert!((state.weight_spy(point) - 0.4).abs() < 1e-12);
        }
    }

    #[test]
    fn test_rejects_bad_capital() {
        let prices = series(&[100.0, 101.0], &[50.0, 51.0]);
        let cfg = config(0.5, RebalanceRule::Calendar { period: 1 });
        assert!(matches!(simulate(&prices, &cfg, 0.0), Err(BalanceError::InvalidConfig(_))));
        assert!(simulate(&prices, &cfg, -10.0).is_err());
        assert!(simulate(&prices, &cfg, f64::NAN).is_err());
    }

    #[test]
    fn test_overflowing_value_is_degenerate() {
        let prices = series(&[1.0, f64::MAX], &[1.0, f64::MAX]);
        let cfg = config(0.5, RebalanceRule::Calendar { period: 1 });
        let err = simulate(&prices, &cfg, 10.0).unwrap_err();
        assert!(matches!(err, BalanceError::DegenerateState { .. }));
    }

    #[test]
    fn test_buy_and_hold_tracks_asset() {
        let prices = series(&[100.0, 110.0, 121.0], &[50.0, 40.0, 60.0]);
        let spy = buy_and_hold(&prices, Asset::Spy, 1000.0).unwrap();
        let gld = buy_and_hold(&prices, Asset::Gld, 1000.0).unwrap();

        let spy_values: Vec<f64> = spy.values().collect();
        let gld_values: Vec<f64> = gld.values().collect();
        assert!((spy_values[2] - 1210.0).abs() < 1e-9);
        assert!((gld_values[1] - 800.0).abs() < 1e-9);
        assert!((gld_values[2] - 1200.0).abs() < 1e-9);
    }
}
