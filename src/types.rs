//! Core data types: aligned price pairs and equity curves.

use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{BalanceError, Result};

pub const SPY: &str = "SPY";
pub const GLD: &str = "GLD";

/// One leg of the two-asset portfolio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Asset {
    Spy,
    Gld,
}

impl Asset {
    pub fn ticker(&self) -> &'static str {
        match self {
            Asset::Spy => SPY,
            Asset::Gld => GLD,
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ticker())
    }
}

/// Closing prices of both legs on a single trading day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub spy: f64,
    pub gld: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, spy: f64, gld: f64) -> Self {
        Self { date, spy, gld }
    }

    pub fn price(&self, asset: Asset) -> f64 {
        match asset {
            Asset::Spy => self.spy,
            Asset::Gld => self.gld,
        }
    }
}

/// Date-ordered, validated SPY/GLD price pairs.
///
/// A `PriceSeries` is never empty, its dates are strictly increasing and
/// every price is positive and finite. It cannot be mutated after
/// construction.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(points: Vec<PricePoint>) -> Result<Self> {
        if points.is_empty() {
            return Err(BalanceError::InsufficientData {
                required: 1,
                actual: 0,
            });
        }

        for point in &points {
            for asset in [Asset::Spy, Asset::Gld] {
                let price = point.price(asset);
                if !price.is_finite() || price <= 0.0 {
                    return Err(BalanceError::InvalidPrices(format!(
                        "{} price {} on {} must be positive and finite",
                        asset, price, point.date
                    )));
                }
            }
        }

        if let Some(pair) = points.windows(2).find(|w| w[1].date <= w[0].date) {
            return Err(BalanceError::InvalidPrices(format!(
                "dates must be strictly increasing: {} followed by {}",
                pair[0].date, pair[1].date
            )));
        }

        Ok(Self { points })
    }

    /// Inner-join two independently dated close series on their dates.
    ///
    /// Dates present in only one series are dropped. The inputs do not need
    /// to be sorted, but neither may contain the same date twice.
    pub fn align(spy: &[(NaiveDate, f64)], gld: &[(NaiveDate, f64)]) -> Result<Self> {
        let gld_by_date: HashMap<NaiveDate, f64> = gld.iter().copied().collect();
        if gld_by_date.len() != gld.len() {
            return Err(BalanceError::InvalidPrices(format!(
                "duplicate dates in {} series",
                GLD
            )));
        }

        let mut points: Vec<PricePoint> = spy
            .iter()
            .filter_map(|&(date, spy_close)| {
                gld_by_date
                    .get(&date)
                    .map(|&gld_close| PricePoint::new(date, spy_close, gld_close))
            })
            .collect();
        points.sort_by_key(|p| p.date);

        Self::new(points)
    }

    /// Rescale both legs so each starts at 1.0.
    pub fn normalized(&self) -> Self {
        let first = self.points[0];
        let points = self
            .points
            .iter()
            .map(|p| PricePoint::new(p.date, p.spy / first.spy, p.gld / first.gld))
            .collect();
        Self { points }
    }

    /// Inclusive date sub-range.
    pub fn window(&self, start: NaiveDate, end: NaiveDate) -> Result<Self> {
        let points: Vec<PricePoint> = self
            .points
            .iter()
            .filter(|p| p.date >= start && p.date <= end)
            .copied()
            .collect();
        Self::new(points)
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> &PricePoint {
        &self.points[0]
    }

    pub fn last(&self) -> &PricePoint {
        &self.points[self.points.len() - 1]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PricePoint> {
        self.points.iter()
    }
}

/// Portfolio value at the close of one trading day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Day-by-day portfolio value, one point per input price point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityCurve {
    points: Vec<EquityPoint>,
}

impl EquityCurve {
    pub fn new(points: Vec<EquityPoint>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[EquityPoint] {
        &self.points
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.value)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&EquityPoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&EquityPoint> {
        self.points.last()
    }

    /// Simple daily returns, `v[t] / v[t-1] - 1`.
    pub fn returns(&self) -> Vec<f64> {
        self.points
            .windows(2)
            .map(|w| w[1].value / w[0].value - 1.0)
            .collect()
    }
}
