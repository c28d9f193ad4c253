//! Configuration file support for analyses.
//!
//! Allows loading the analysis window, capital and grid definition from a
//! TOML file so sweeps are reproducible.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{BalanceError, Result};
use crate::metrics::{MetricsConfig, TRADING_DAYS_PER_YEAR};
use crate::optimizer::{calendar_grid, linspace, threshold_grid, GridSearch, Objective};
use crate::provider::HistoryWindow;
use crate::strategy::RebalanceRule;

/// Complete analysis configuration loaded from a file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub data: DataSettings,
    #[serde(default)]
    pub backtest: BacktestSettings,
    #[serde(default)]
    pub grid: GridSettings,
}

/// Price data settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSettings {
    /// Look-back window ending 2025-12-31.
    #[serde(default)]
    pub window: HistoryWindow,
    /// Rescale both legs to start at 1.0.
    #[serde(default = "default_true")]
    pub normalize: bool,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            window: HistoryWindow::default(),
            normalize: true,
        }
    }
}

/// Simulation and metric settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSettings {
    #[serde(default = "default_capital")]
    pub initial_capital: f64,
    #[serde(default = "default_periods")]
    pub periods_per_year: u32,
    /// Annual risk-free rate used by the Sharpe ratio.
    #[serde(default)]
    pub risk_free_rate: f64,
}

impl Default for BacktestSettings {
    fn default() -> Self {
        Self {
            initial_capital: default_capital(),
            periods_per_year: default_periods(),
            risk_free_rate: 0.0,
        }
    }
}

impl BacktestSettings {
    pub fn metrics_config(&self) -> MetricsConfig {
        MetricsConfig {
            periods_per_year: self.periods_per_year,
            risk_free_rate: self.risk_free_rate,
        }
    }
}

/// Which rule family the grid sweeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Calendar,
    #[default]
    Threshold,
}

/// Grid definition: linear weight and rule-parameter ranges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSettings {
    #[serde(default)]
    pub weight_start: f64,
    #[serde(default = "default_weight_end")]
    pub weight_end: f64,
    #[serde(default = "default_steps")]
    pub weight_steps: usize,
    #[serde(default)]
    pub rule: RuleKind,
    #[serde(default = "default_rule_start")]
    pub rule_start: f64,
    #[serde(default = "default_rule_end")]
    pub rule_end: f64,
    #[serde(default = "default_steps")]
    pub rule_steps: usize,
    #[serde(default)]
    pub objective: Objective,
    #[serde(default = "default_true")]
    pub parallel: bool,
    /// Number of ranked rows to report.
    #[serde(default = "default_top")]
    pub top: usize,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            weight_start: 0.0,
            weight_end: default_weight_end(),
            weight_steps: default_steps(),
            rule: RuleKind::default(),
            rule_start: default_rule_start(),
            rule_end: default_rule_end(),
            rule_steps: default_steps(),
            objective: Objective::default(),
            parallel: true,
            top: default_top(),
        }
    }
}

impl GridSettings {
    pub fn weight_grid(&self) -> Vec<f64> {
        linspace(self.weight_start, self.weight_end, self.weight_steps)
    }

    /// Rule grid; calendar periods are rounded to whole days and deduplicated.
    pub fn rule_grid(&self) -> Result<Vec<RebalanceRule>> {
        let values = linspace(self.rule_start, self.rule_end, self.rule_steps);
        match self.rule {
            RuleKind::Threshold => Ok(threshold_grid(&values)),
            RuleKind::Calendar => {
                let mut periods = Vec::with_capacity(values.len());
                for value in values {
                    let rounded = value.round();
                    if !(rounded >= 1.0 && rounded <= u32::MAX as f64) {
                        return Err(BalanceError::InvalidConfig(format!(
                            "calendar period {} is not a positive day count",
                            value
                        )));
                    }
                    periods.push(rounded as u32);
                }
                periods.dedup();
                Ok(calendar_grid(&periods))
            }
        }
    }
}

impl AnalysisConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AnalysisConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        let capital = self.backtest.initial_capital;
        if !(capital.is_finite() && capital > 0.0) {
            return Err(BalanceError::InvalidConfig(format!(
                "initial_capital must be positive, got {}",
                capital
            )));
        }
        if self.backtest.periods_per_year == 0 {
            return Err(BalanceError::InvalidConfig(
                "periods_per_year must be positive".to_string(),
            ));
        }
        if !self.backtest.risk_free_rate.is_finite() {
            return Err(BalanceError::InvalidConfig(
                "risk_free_rate must be finite".to_string(),
            ));
        }
        if self.grid.weight_steps == 0 || self.grid.rule_steps == 0 {
            return Err(BalanceError::InvalidConfig(
                "grid step counts must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Sweep runner matching these settings.
    pub fn grid_search(&self) -> GridSearch {
        GridSearch::new()
            .objective(self.grid.objective)
            .metrics_config(self.backtest.metrics_config())
            .parallel(self.grid.parallel)
    }
}

fn default_true() -> bool {
    true
}

fn default_capital() -> f64 {
    10_000.0
}

fn default_periods() -> u32 {
    TRADING_DAYS_PER_YEAR
}

fn default_weight_end() -> f64 {
    1.0
}

fn default_rule_start() -> f64 {
    0.01
}

fn default_rule_end() -> f64 {
    0.11
}

fn default_steps() -> usize {
    201
}

fn default_top() -> usize {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = AnalysisConfig::from_toml_str("").unwrap();
        assert_eq!(config, AnalysisConfig::default());
        assert_eq!(config.data.window, HistoryWindow::TenYears);
        assert_eq!(config.backtest.initial_capital, 10_000.0);
        assert_eq!(config.grid.weight_grid().len(), 201);
        assert_eq!(config.grid.rule_grid().unwrap().len(), 201);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [data]
            window = "5yr"
            normalize = false

            [backtest]
            initial_capital = 1000.0
            risk_free_rate = 0.02

            [grid]
            weight_steps = 11
            rule = "calendar"
            rule_start = 5.0
            rule_end = 60.0
            rule_steps = 12
            objective = "max_drawdown"
            parallel = false
        "#;
        let config = AnalysisConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.data.window, HistoryWindow::FiveYears);
        assert!(!config.data.normalize);
        assert_eq!(config.backtest.periods_per_year, 252);
        assert_eq!(config.grid.objective, Objective::MaxDrawdown);

        let rules = config.grid.rule_grid().unwrap();
        assert_eq!(rules.len(), 12);
        assert_eq!(rules[0], RebalanceRule::Calendar { period: 5 });
        assert_eq!(rules[11], RebalanceRule::Calendar { period: 60 });
    }

    #[test]
    fn test_calendar_periods_deduplicated() {
        let grid = GridSettings {
            rule: RuleKind::Calendar,
            rule_start: 1.0,
            rule_end: 2.0,
            rule_steps: 5,
            ..Default::default()
        };
        let rules = grid.rule_grid().unwrap();
        assert_eq!(
            rules,
            vec![
                RebalanceRule::Calendar { period: 1 },
                RebalanceRule::Calendar { period: 2 }
            ]
        );
    }

    #[test]
    fn test_calendar_zero_period_rejected() {
        let grid = GridSettings {
            rule: RuleKind::Calendar,
            rule_start: 0.0,
            rule_end: 3.0,
            rule_steps: 4,
            ..Default::default()
        };
        assert!(grid.rule_grid().is_err());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(AnalysisConfig::from_toml_str("[backtest]\ninitial_capital = -5.0").is_err());
        assert!(AnalysisConfig::from_toml_str("[backtest]\nperiods_per_year = 0").is_err());
        assert!(AnalysisConfig::from_toml_str("[grid]\nweight_steps = 0").is_err());
        assert!(matches!(
            AnalysisConfig::from_toml_str("[data]\nwindow = \"7yr\""),
            Err(BalanceError::Config(_))
        ));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = AnalysisConfig::default();
        let text = config.to_toml_string().unwrap();
        assert_eq!(AnalysisConfig::from_toml_str(&text).unwrap(), config);
    }
}
