//! Risk and return metrics computed from an equity curve.
//!
//! Every function here is pure: the same curve always yields bit-identical
//! results.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{BalanceError, Result};
use crate::types::{EquityCurve, EquityPoint};

pub const TRADING_DAYS_PER_YEAR: u32 = 252;

/// Daily return dispersion at or below this is treated as zero volatility.
const DISPERSION_FLOOR: f64 = 1e-12;

/// Annualization and risk-free settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub periods_per_year: u32,
    /// Annual risk-free rate subtracted from returns before the Sharpe ratio.
    pub risk_free_rate: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            periods_per_year: TRADING_DAYS_PER_YEAR,
            risk_free_rate: 0.0,
        }
    }
}

impl MetricsConfig {
    pub fn with_periods(periods_per_year: u32) -> Self {
        Self {
            periods_per_year,
            ..Default::default()
        }
    }
}

/// Performance summary of one equity curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsResult {
    /// Annualized Sharpe ratio, NaN when undefined.
    pub sharpe_ratio: f64,
    pub cagr: f64,
    /// Deepest peak-to-trough decline, in [-1, 0].
    pub max_drawdown: f64,
    pub max_weekly_drawdown: f64,
    pub max_monthly_drawdown: f64,
    /// Annualized standard deviation of daily returns.
    pub volatility: f64,
}

impl MetricsResult {
    /// Percent difference of every metric against `baseline`.
    ///
    /// Where the baseline metric is zero the plain difference is used.
    pub fn relative_to(&self, baseline: &MetricsResult) -> MetricsResult {
        MetricsResult {
            sharpe_ratio: relative(self.sharpe_ratio, baseline.sharpe_ratio),
            cagr: relative(self.cagr, baseline.cagr),
            max_drawdown: relative(self.max_drawdown, baseline.max_drawdown),
            max_weekly_drawdown: relative(self.max_weekly_drawdown, baseline.max_weekly_drawdown),
            max_monthly_drawdown: relative(self.max_monthly_drawdown, baseline.max_monthly_drawdown),
            volatility: relative(self.volatility, baseline.volatility),
        }
    }
}

pub fn relative(value: f64, baseline: f64) -> f64 {
    if baseline == 0.0 {
        value - baseline
    } else {
        (value - baseline) / baseline.abs() * 100.0
    }
}

/// Compute all metrics with a zero risk-free rate.
pub fn compute(curve: &EquityCurve, periods_per_year: u32) -> Result<MetricsResult> {
    compute_with(curve, &MetricsConfig::with_periods(periods_per_year))
}

pub fn compute_with(curve: &EquityCurve, config: &MetricsConfig) -> Result<MetricsResult> {
    let returns = curve.returns();
    Ok(MetricsResult {
        sharpe_ratio: sharpe_from_returns(&returns, config),
        cagr: cagr(curve, config.periods_per_year)?,
        max_drawdown: max_drawdown(curve.values()),
        max_weekly_drawdown: max_drawdown(resample_last(curve, week_key)),
        max_monthly_drawdown: max_drawdown(resample_last(curve, month_key)),
        volatility: volatility_from_returns(&returns, config.periods_per_year),
    })
}

/// Annualized Sharpe ratio of the curve's daily returns.
///
/// NaN when fewer than two returns exist or their dispersion is zero.
pub fn sharpe_ratio(curve: &EquityCurve, config: &MetricsConfig) -> f64 {
    sharpe_from_returns(&curve.returns(), config)
}

/// Compound annual growth rate; needs at least two points.
pub fn cagr(curve: &EquityCurve, periods_per_year: u32) -> Result<f64> {
    let (first, last) = match (curve.first(), curve.last()) {
        (Some(first), Some(last)) if curve.len() >= 2 => (first.value, last.value),
        _ => {
            return Err(BalanceError::InsufficientData {
                required: 2,
                actual: curve.len(),
            })
        }
    };
    let periods = (curve.len() - 1) as f64;
    Ok((last / first).powf(periods_per_year as f64 / periods) - 1.0)
}

/// Most negative `(v - peak) / peak` over the values, 0 if they never decline.
pub fn max_drawdown(values: impl IntoIterator<Item = f64>) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd: f64 = 0.0;
    for value in values {
        peak = peak.max(value);
        if peak > 0.0 {
            max_dd = max_dd.min((value - peak) / peak);
        }
    }
    max_dd
}

fn sharpe_from_returns(returns: &[f64], config: &MetricsConfig) -> f64 {
    if returns.len() < 2 {
        return f64::NAN;
    }
    let per_period_rf = config.risk_free_rate / config.periods_per_year as f64;
    let excess: Vec<f64> = returns.iter().map(|r| r - per_period_rf).collect();

    let (mean, std) = mean_and_std(&excess);
    // A constant daily return leaves only rounding noise in the dispersion.
    if std <= DISPERSION_FLOOR {
        return f64::NAN;
    }
    mean / std * (config.periods_per_year as f64).sqrt()
}

fn volatility_from_returns(returns: &[f64], periods_per_year: u32) -> f64 {
    if returns.len() < 2 {
        return f64::NAN;
    }
    let (_, std) = mean_and_std(returns);
    std * (periods_per_year as f64).sqrt()
}

/// Mean and sample standard deviation (n - 1 denominator).
fn mean_and_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, variance.sqrt())
}

fn week_key(date: NaiveDate) -> (i32, u32) {
    let week = date.iso_week();
    (week.year(), week.week())
}

fn month_key(date: NaiveDate) -> (i32, u32) {
    (date.year(), date.month())
}

/// Last value of each bucket, in date order.
fn resample_last(curve: &EquityCurve, key: fn(NaiveDate) -> (i32, u32)) -> Vec<f64> {
    let mut buckets: Vec<((i32, u32), f64)> = Vec::new();
    for &EquityPoint { date, value } in curve.points() {
        let k = key(date);
        match buckets.last_mut() {
            Some((last_key, last_value)) if *last_key == k => *last_value = value,
            _ => buckets.push((k, value)),
        }
    }
    buckets.into_iter().map(|(_, value)| value).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tests::day;

    fn curve(values: &[f64]) -> EquityCurve {
        EquityCurve::new(
            values
                .iter()
                .enumerate()
                .map(|(i, &value)| EquityPoint {
                    date: day(i as i64),
                    value,
                })
                .collect(),
        )
    }

    #[test]
    fn test_max_drawdown_basic() {
        let dd = max_drawdown([100.0, 120.0, 90.0, 130.0, 117.0]);
        assert!((dd + 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_max_drawdown_monotonic_is_zero() {
        assert_eq!(max_drawdown([1.0, 2.0, 3.0]), 0.0);
        assert_eq!(max_drawdown(Vec::<f64>::new()), 0.0);
    }

    #[test]
    fn test_cagr_doubles_over_one_year() {
        let mut values = vec![100.0; 253];
        values[252] = 200.0;
        let g = cagr(&curve(&values), 252).unwrap();
        assert!((g - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_cagr_needs_two_points() {
        let err = cagr(&curve(&[100.0]), 252).unwrap_err();
        assert!(matches!(
            err,
            BalanceError::InsufficientData {
                required: 2,
                actual: 1
            }
        ));
        assert!(compute(&curve(&[100.0]), 252).is_err());
    }

    #[test]
    fn test_sharpe_nan_for_constant_growth() {
        let c = curve(&[1.0, 2.0, 4.0, 8.0, 16.0]);
        assert!(sharpe_ratio(&c, &MetricsConfig::default()).is_nan());

        let flat = curve(&[100.0, 100.0, 100.0]);
        assert!(sharpe_ratio(&flat, &MetricsConfig::default()).is_nan());
    }

    #[test]
    fn test_sharpe_nan_for_inexact_constant_growth() {
        for factor in [0.99, 0.995, 1.003, 1.007, 1.02, 0.97] {
            let mut values = Vec::with_capacity(300);
            let mut value = 100.0;
            for _ in 0..300 {
                values.push(value);
                value *= factor;
            }
            let sharpe = sharpe_ratio(&curve(&values), &MetricsConfig::default());
            assert!(sharpe.is_nan(), "factor {} gave sharpe {}", factor, sharpe);
        }
    }

    #[test]
    fn test_sharpe_nan_for_short_curves() {
        assert!(sharpe_ratio(&curve(&[100.0]), &MetricsConfig::default()).is_nan());
        assert!(sharpe_ratio(&curve(&[100.0, 101.0]), &MetricsConfig::default()).is_nan());
    }

    #[test]
    fn test_sharpe_matches_manual() {
        let c = curve(&[100.0, 110.0, 99.0, 108.9]);
        let r = [0.1, -0.1, 0.1];
        let mean = r.iter().sum::<f64>() / 3.0;
        let var = r.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / 2.0;
        let expected = mean / var.sqrt() * 252f64.sqrt();
        let got = sharpe_ratio(&c, &MetricsConfig::default());
        assert!((got - expected).abs() < 1e-9);
    }

    #[test]
    fn test_risk_free_rate_lowers_sharpe() {
        let c = curve(&[100.0, 102.0, 101.0, 104.0, 103.0]);
        let base = sharpe_ratio(&c, &MetricsConfig::default());
        let with_rf = sharpe_ratio(
            &c,
            &MetricsConfig {
                risk_free_rate: 0.05,
                ..Default::default()
            },
        );
        assert!(with_rf < base);
    }

    #[test]
    fn test_compute_is_idempotent() {
        let c = curve(&[100.0, 103.0, 97.0, 101.0, 99.5, 104.2]);
        let a = compute(&c, 252).unwrap();
        let b = compute(&c, 252).unwrap();
        assert_eq!(a.sharpe_ratio.to_bits(), b.sharpe_ratio.to_bits());
        assert_eq!(a.cagr.to_bits(), b.cagr.to_bits());
        assert_eq!(a.max_drawdown.to_bits(), b.max_drawdown.to_bits());
    }

    #[test]
    fn test_weekly_drawdown_uses_week_closes() {
        // 2024-01-01 is a Monday: days 0..=6 form one ISO week.
        let mut values = vec![100.0; 14];
        values[3] = 50.0; // intra-week dip, hidden by weekly resampling
        values[6] = 100.0;
        values[13] = 90.0;
        let c = curve(&values);
        let m = compute(&c, 252).unwrap();
        assert!((m.max_drawdown + 0.5).abs() < 1e-12);
        assert!((m.max_weekly_drawdown + 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_monthly_buckets() {
        let c = EquityCurve::new(vec![
            EquityPoint { date: day(0), value: 100.0 },
            EquityPoint { date: day(30), value: 80.0 },
            EquityPoint { date: day(31), value: 120.0 },
            EquityPoint { date: day(59), value: 60.0 },
        ]);
        // January closes at 80, February at 60.
        let monthly = resample_last(&c, month_key);
        assert_eq!(monthly, vec![80.0, 60.0]);
    }

    #[test]
    fn test_relative_metrics() {
        assert_eq!(relative(1.5, 1.0), 50.0);
        assert!((relative(-0.3, -0.2) + 50.0).abs() < 1e-9);
        assert_eq!(relative(0.2, 0.0), 0.2);
    }
}
