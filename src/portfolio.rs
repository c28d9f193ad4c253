use chrono::NaiveDate;
use serde::Serialize;

use crate::types::{Asset, PricePoint};

/// Share holdings of the two-asset portfolio at the close of one day.
///
/// The portfolio is always fully invested, so cash stays at zero. Only the
/// simulator moves shares around; callers see finished snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PortfolioState {
    date: NaiveDate,
    shares_spy: f64,
    shares_gld: f64,
}

impl PortfolioState {
    /// Split `capital` between the legs at `point`'s prices.
    pub(crate) fn allocate(point: &PricePoint, capital: f64, weight_spy: f64) -> Self {
        let (shares_spy, shares_gld) = target_shares(point, capital, weight_spy);
        Self {
            date: point.date,
            shares_spy,
            shares_gld,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn shares(&self, asset: Asset) -> f64 {
        match asset {
            Asset::Spy => self.shares_spy,
            Asset::Gld => self.shares_gld,
        }
    }

    pub fn cash(&self) -> f64 {
        0.0
    }

    pub fn position_value(&self, asset: Asset, point: &PricePoint) -> f64 {
        self.shares(asset) * point.price(asset)
    }

    pub fn total_value(&self, point: &PricePoint) -> f64 {
        [Asset::Spy, Asset::Gld]
            .iter()
            .fold(self.cash(), |acc, &asset| acc + self.position_value(asset, point))
    }

    /// SPY share of total value. Zero for an empty portfolio.
    pub fn weight_spy(&self, point: &PricePoint) -> f64 {
        let total = self.total_value(point);
        if total > 0.0 {
            self.position_value(Asset::Spy, point) / total
        } else {
            0.0
        }
    }

    /// Advance to `point`'s date. Holdings drift with prices, nothing trades.
    pub(crate) fn mark(&mut self, point: &PricePoint) {
        self.date = point.date;
    }

    /// Trade back to `weight_spy` at `point`'s prices.
    ///
    /// Returns the dollar value of SPY sold; negative when SPY was bought.
    pub(crate) fn rebalance(&mut self, point: &PricePoint, weight_spy: f64) -> f64 {
        let total = self.total_value(point);
        let before = self.position_value(Asset::Spy, point);
        let (shares_spy, shares_gld) = target_shares(point, total, weight_spy);
        self.shares_spy = shares_spy;
        self.shares_gld = shares_gld;
        before - self.position_value(Asset::Spy, point)
    }
}

fn target_shares(point: &PricePoint, capital: f64, weight_spy: f64) -> (f64, f64) {
    (
        capital * weight_spy / point.spy,
        capital * (1.0 - weight_spy) / point.gld,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tests::day;

    #[test]
    fn test_allocate_splits_capital() {
        let point = PricePoint::new(day(0), 100.0, 50.0);
        let state = PortfolioState::allocate(&point, 1000.0, 0.6);
        assert_eq!(state.shares(Asset::Spy), 6.0);
        assert_eq!(state.shares(Asset::Gld), 8.0);
        assert_eq!(state.total_value(&point), 1000.0);
        assert!((state.weight_spy(&point) - 0.6).abs() < 1e-12);
        assert_eq!(state.cash(), 0.0);
    }

    #[test]
    fn test_drift_changes_weight() {
        let start = PricePoint::new(day(0), 100.0, 100.0);
        let mut state = PortfolioState::allocate(&start, 1000.0, 0.5);
        let next = PricePoint::new(day(1), 150.0, 100.0);
        state.mark(&next);

        assert_eq!(state.date(), day(1));
        assert_eq!(state.total_value(&next), 1250.0);
        assert!((state.weight_spy(&next) - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_rebalance_preserves_value() {
        let start = PricePoint::new(day(0), 100.0, 100.0);
        let mut state = PortfolioState::allocate(&start, 1000.0, 0.5);
        let next = PricePoint::new(day(1), 150.0, 100.0);
        state.mark(&next);

        let sold = state.rebalance(&next, 0.5);
        assert!((sold - 125.0).abs() < 1e-9);
        assert!((state.total_value(&next) - 1250.0).abs() < 1e-9);
        assert!((state.weight_spy(&next) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_all_gld_has_zero_spy_weight() {
        let point = PricePoint::new(day(0), 100.0, 50.0);
        let state = PortfolioState::allocate(&point, 1000.0, 0.0);
        assert_eq!(state.shares(Asset::Spy), 0.0);
        assert_eq!(state.weight_spy(&point), 0.0);
    }
}
