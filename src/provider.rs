//! Daily close history from Yahoo Finance.
//!
//! This is the only module that talks to the network. It hands the engine a
//! validated [`PriceSeries`] and is never called by the simulator or the
//! optimizer themselves.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use yahoo_finance_api::YahooConnector;

use crate::error::{BalanceError, Result};
use crate::types::{PriceSeries, GLD, SPY};

/// Last trading year covered by every analysis window.
pub const FINAL_YEAR: i32 = 2025;

/// Look-back period ending on 2025-12-31.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HistoryWindow {
    #[serde(rename = "1yr")]
    OneYear,
    #[serde(rename = "2yr")]
    TwoYears,
    #[serde(rename = "5yr")]
    FiveYears,
    #[default]
    #[serde(rename = "10yr")]
    TenYears,
    #[serde(rename = "15yr")]
    FifteenYears,
    #[serde(rename = "20yr")]
    TwentyYears,
}

impl HistoryWindow {
    pub const ALL: [HistoryWindow; 6] = [
        HistoryWindow::OneYear,
        HistoryWindow::TwoYears,
        HistoryWindow::FiveYears,
        HistoryWindow::TenYears,
        HistoryWindow::FifteenYears,
        HistoryWindow::TwentyYears,
    ];

    pub fn years(&self) -> i32 {
        match self {
            HistoryWindow::OneYear => 1,
            HistoryWindow::TwoYears => 2,
            HistoryWindow::FiveYears => 5,
            HistoryWindow::TenYears => 10,
            HistoryWindow::FifteenYears => 15,
            HistoryWindow::TwentyYears => 20,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HistoryWindow::OneYear => "1yr",
            HistoryWindow::TwoYears => "2yr",
            HistoryWindow::FiveYears => "5yr",
            HistoryWindow::TenYears => "10yr",
            HistoryWindow::FifteenYears => "15yr",
            HistoryWindow::TwentyYears => "20yr",
        }
    }

    /// First calendar day of the window.
    pub fn start(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(FINAL_YEAR - self.years() + 1, 1, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Last calendar day of every window, 2025-12-31.
    pub fn end(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(FINAL_YEAR, 12, 31).unwrap_or(NaiveDate::MAX)
    }
}

impl fmt::Display for HistoryWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for HistoryWindow {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        HistoryWindow::ALL
            .iter()
            .find(|w| w.label() == s)
            .copied()
            .ok_or_else(|| {
                let labels: Vec<&str> = HistoryWindow::ALL.iter().map(|w| w.label()).collect();
                format!("unknown window '{}', expected one of {}", s, labels.join(", "))
            })
    }
}

pub struct YahooProvider {
    client: YahooConnector,
}

impl std::fmt::Debug for YahooProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "YahooProvider")
    }
}

impl Default for YahooProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl YahooProvider {
    pub fn new() -> Self {
        Self {
            client: YahooConnector::new(),
        }
    }

    /// Adjusted daily closes of `ticker` inside `window`, oldest first.
    pub async fn daily_closes(&self, ticker: &str, window: HistoryWindow) -> Result<Vec<(NaiveDate, f64)>> {
        let response = self.client.get_quote_range(ticker, "1d", "max").await?;
        let quotes = response.quotes()?;
        debug!("{}: received {} quotes", ticker, quotes.len());

        let (start, end) = (window.start(), window.end());
        let mut closes = Vec::with_capacity(quotes.len());
        for quote in quotes {
            let date = quote_date(quote.timestamp)?;
            if date >= start && date <= end {
                closes.push((date, quote.adjclose));
            }
        }
        closes.sort_by_key(|&(date, _)| date);
        closes.dedup_by_key(|&mut (date, _)| date);
        Ok(closes)
    }

    /// SPY and GLD closes for `window`, fetched concurrently and joined on date.
    pub async fn fetch_pair(&self, window: HistoryWindow) -> Result<PriceSeries> {
        info!("Fetching {} and {} history for {}", SPY, GLD, window);
        let (spy, gld) = futures::try_join!(
            self.daily_closes(SPY, window),
            self.daily_closes(GLD, window)
        )?;
        let series = PriceSeries::align(&spy, &gld)?;
        info!(
            "Loaded {} aligned trading days ({} to {})",
            series.len(),
            series.first().date,
            series.last().date
        );
        Ok(series)
    }
}

fn quote_date<T>(timestamp: T) -> Result<NaiveDate>
where
    i64: TryFrom<T>,
    T: Copy + fmt::Display,
{
    let secs = i64::try_from(timestamp)
        .map_err(|_| BalanceError::InvalidPrices(format!("quote timestamp {} out of range", timestamp)))?;
    Utc.timestamp_opt(secs, 0)
        .single()
        .map(|dt| dt.date_naive())
        .ok_or_else(|| BalanceError::InvalidPrices(format!("invalid quote timestamp {}", secs)))
}
