//! Fixed-ratio rebalancing strategies.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BalanceError, Result};

/// When a portfolio is traded back to its target allocation.
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RebalanceRule {
    /// Rebalance every `period` trading days.
    Calendar { period: u32 },
    /// Rebalance once the SPY weight drifts more than `tolerance` from target.
    Threshold { tolerance: f64 },
}

impl RebalanceRule {
    pub fn calendar(period: u32) -> Result<Self> {
        let rule = RebalanceRule::Calendar { period };
        rule.validate()?;
        Ok(rule)
    }

    pub fn threshold(tolerance: f64) -> Result<Self> {
        let rule = RebalanceRule::Threshold { tolerance };
        rule.validate()?;
        Ok(rule)
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            RebalanceRule::Calendar { period } if period == 0 => Err(
                BalanceError::InvalidConfig("calendar period must be positive".to_string()),
            ),
            RebalanceRule::Threshold { tolerance } if !(tolerance.is_finite() && tolerance > 0.0) => {
                Err(BalanceError::InvalidConfig(format!(
                    "threshold tolerance must be positive and finite, got {}",
                    tolerance
                )))
            }
            _ => Ok(()),
        }
    }

    /// Whether the trigger fires on `day_index` given the current SPY weight.
    ///
    /// Day 0 is the initial allocation and is not evaluated by the simulator.
    pub fn should_rebalance(&self, day_index: usize, current_weight: f64, target_weight: f64) -> bool {
        match *self {
            RebalanceRule::Calendar { period } => day_index % period as usize == 0,
            RebalanceRule::Threshold { tolerance } => (current_weight - target_weight).abs() > tolerance,
        }
    }

    /// Scalar parameter of the rule, used as the heatmap axis value.
    pub fn parameter(&self) -> f64 {
        match *self {
            RebalanceRule::Calendar { period } => period as f64,
            RebalanceRule::Threshold { tolerance } => tolerance,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RebalanceRule::Calendar { .. } => "calendar",
            RebalanceRule::Threshold { .. } => "threshold",
        }
    }
}

impl fmt::Debug for RebalanceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RebalanceRule::Calendar { period } => write!(f, "Calendar({})", period),
            RebalanceRule::Threshold { tolerance } => write!(f, "Threshold({})", tolerance),
        }
    }
}

impl fmt::Display for RebalanceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RebalanceRule::Calendar { period } => write!(f, "every {} days", period),
            RebalanceRule::Threshold { tolerance } => write!(f, "drift > {:.4}", tolerance),
        }
    }
}

/// Target allocation plus rebalance trigger. Always valid once built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StrategyConfig {
    target_weight_spy: f64,
    rule: RebalanceRule,
}

impl StrategyConfig {
    pub fn new(target_weight_spy: f64, rule: RebalanceRule) -> Result<Self> {
        if !target_weight_spy.is_finite() || !(0.0..=1.0).contains(&target_weight_spy) {
            return Err(BalanceError::InvalidConfig(format!(
                "target SPY weight must lie in [0, 1], got {}",
                target_weight_spy
            )));
        }
        rule.validate()?;
        Ok(Self {
            target_weight_spy,
            rule,
        })
    }

    pub fn builder() -> StrategyConfigBuilder {
        StrategyConfigBuilder::new()
    }

    pub fn target_weight_spy(&self) -> f64 {
        self.target_weight_spy
    }

    pub fn target_weight_gld(&self) -> f64 {
        1.0 - self.target_weight_spy
    }

    pub fn rule(&self) -> RebalanceRule {
        self.rule
    }
}

impl fmt::Display for StrategyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.1}% SPY / {:.1}% GLD, rebalance {}",
            self.target_weight_spy * 100.0,
            self.target_weight_gld() * 100.0,
            self.rule
        )
    }
}

pub struct StrategyConfigBuilder {
    target_weight_spy: f64,
    rule: RebalanceRule,
}

impl Default for StrategyConfigBuilder {
    fn default() -> Self {
        Self {
            target_weight_spy: DEFAULT_TARGET_WEIGHT,
            rule: RebalanceRule::Threshold {
                tolerance: DEFAULT_TOLERANCE,
            },
        }
    }
}

impl StrategyConfigBuilder {
    pub fn new() -> StrategyConfigBuilder {
        StrategyConfigBuilder::default()
    }

    pub fn target_weight_spy(mut self, weight: f64) -> Self {
        self.target_weight_spy = weight;
        self
    }

    pub fn rule(mut self, rule: RebalanceRule) -> Self {
        self.rule = rule;
        self
    }

    pub fn calendar(self, period: u32) -> Self {
        self.rule(RebalanceRule::Calendar { period })
    }

    pub fn threshold(self, tolerance: f64) -> Self {
        self.rule(RebalanceRule::Threshold { tolerance })
    }

    pub fn build(self) -> Result<StrategyConfig> {
        StrategyConfig::new(self.target_weight_spy, self.rule)
    }
}

const DEFAULT_TARGET_WEIGHT: f64 = 0.5;
const DEFAULT_TOLERANCE: f64 = 0.05;
