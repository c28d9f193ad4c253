//! Grid search over target weight × rebalance rule.
//!
//! The Cartesian product is walked with weights in the outer loop and rules
//! in the inner loop. Every cell is simulated and scored independently, so
//! cells may run on rayon's pool; results are gathered in grid order either
//! way, which keeps the ranking identical between sequential and parallel
//! runs, ties included.

use std::cmp::Ordering;
use std::fmt::{self, Write as _};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{BalanceError, Result};
use crate::metrics::{self, MetricsConfig, MetricsResult};
use crate::simulator;
use crate::strategy::{RebalanceRule, StrategyConfig};
use crate::types::PriceSeries;

const DEFAULT_STEPS: usize = 201;

/// Metric used to rank grid cells. Higher is always better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    #[default]
    Sharpe,
    Cagr,
    /// Drawdowns are non-positive, so the shallowest one ranks first.
    MaxDrawdown,
}

impl Objective {
    pub fn score(&self, metrics: &MetricsResult) -> f64 {
        match self {
            Objective::Sharpe => metrics.sharpe_ratio,
            Objective::Cagr => metrics.cagr,
            Objective::MaxDrawdown => metrics.max_drawdown,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Objective::Sharpe => "Sharpe Ratio",
            Objective::Cagr => "CAGR",
            Objective::MaxDrawdown => "Max Drawdown",
        }
    }
}

/// Shared flag for stopping a sweep between cells.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, AtomicOrdering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(AtomicOrdering::SeqCst)
    }
}

/// Position of a cell in the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct GridCell {
    pub weight_index: usize,
    pub rule_index: usize,
}

/// Outcome of one grid cell.
#[derive(Debug, Clone, Serialize)]
pub struct GridResult {
    pub cell: GridCell,
    pub config: StrategyConfig,
    pub metrics: MetricsResult,
    pub rebalances: usize,
}

enum CellOutcome {
    Scored(GridResult),
    Degenerate,
    NotRun,
}

/// Ranked results of a sweep plus bookkeeping about cells that were dropped.
#[derive(Debug, Clone)]
pub struct GridReport {
    objective: Objective,
    weights: Vec<f64>,
    rules: Vec<RebalanceRule>,
    results: Vec<GridResult>,
    skipped: usize,
    cancelled: bool,
}

impl GridReport {
    /// Results ranked by the sweep objective, best first.
    pub fn results(&self) -> &[GridResult] {
        &self.results
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn rules(&self) -> &[RebalanceRule] {
        &self.rules
    }

    /// Cells dropped because the simulated portfolio collapsed.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Whether the sweep was stopped before every cell ran.
    pub fn cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn total_cells(&self) -> usize {
        self.weights.len() * self.rules.len()
    }

    /// Cells that never ran because of cancellation.
    pub fn not_run(&self) -> usize {
        self.total_cells() - self.results.len() - self.skipped
    }

    pub fn best(&self) -> Option<&GridResult> {
        self.results.first()
    }

    /// Best cell under `objective`; ties go to the earliest cell in grid order.
    pub fn best_by(&self, objective: Objective) -> Option<&GridResult> {
        self.results
            .iter()
            .filter(|r| !objective.score(&r.metrics).is_nan())
            .min_by(|a, b| {
                compare_desc(objective.score(&a.metrics), objective.score(&b.metrics))
                    .then_with(|| a.cell.cmp(&b.cell))
            })
    }

    /// Pivot `objective` into a weights × rules matrix.
    ///
    /// Cells without a result hold NaN. With a baseline the values become
    /// percent differences against it.
    pub fn heatmap(&self, objective: Objective, baseline: Option<&MetricsResult>) -> Heatmap {
        let mut values = vec![vec![f64::NAN; self.rules.len()]; self.weights.len()];
        for result in &self.results {
            let score = objective.score(&result.metrics);
            values[result.cell.weight_index][result.cell.rule_index] = match baseline {
                Some(base) => metrics::relative(score, objective.score(base)),
                None => score,
            };
        }
        Heatmap {
            objective,
            relative: baseline.is_some(),
            weights: self.weights.clone(),
            rule_values: self.rules.iter().map(|r| r.parameter()).collect(),
            values,
        }
    }
}

/// Matrix of one metric across the grid, rows are weights and columns rules.
#[derive(Debug, Clone, Serialize)]
pub struct Heatmap {
    pub objective: Objective,
    pub relative: bool,
    pub weights: Vec<f64>,
    pub rule_values: Vec<f64>,
    pub values: Vec<Vec<f64>>,
}

impl Heatmap {
    pub fn get(&self, weight_index: usize, rule_index: usize) -> Option<f64> {
        self.values.get(weight_index)?.get(rule_index).copied()
    }

    pub fn to_csv(&self) -> String {
        let mut csv = String::from("target_weight_spy");
        for rule_value in &self.rule_values {
            let _ = write!(csv, ",{}", rule_value);
        }
        csv.push('\n');
        for (weight, row) in self.weights.iter().zip(&self.values) {
            let _ = write!(csv, "{}", weight);
            for value in row {
                let _ = write!(csv, ",{:.6}", value);
            }
            csv.push('\n');
        }
        csv
    }
}

/// Callback receiving `(cells finished, total cells)` after each evaluated cell.
pub type ProgressFn = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Configurable sweep runner.
#[derive(Clone, Default)]
pub struct GridSearch {
    objective: Objective,
    metrics: MetricsConfig,
    parallel: bool,
    cancel: Option<CancelToken>,
    progress: Option<ProgressFn>,
}

impl fmt::Debug for GridSearch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GridSearch")
            .field("objective", &self.objective)
            .field("metrics", &self.metrics)
            .field("parallel", &self.parallel)
            .field("cancel", &self.cancel)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl GridSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn objective(mut self, objective: Objective) -> Self {
        self.objective = objective;
        self
    }

    pub fn metrics_config(mut self, metrics: MetricsConfig) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Report progress; cells skipped by cancellation are not counted.
    pub fn on_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn run(
        &self,
        prices: &PriceSeries,
        weight_grid: &[f64],
        rule_grid: &[RebalanceRule],
        initial_capital: f64,
    ) -> Result<GridReport> {
        if weight_grid.is_empty() {
            return Err(BalanceError::EmptyGrid("target weights"));
        }
        if rule_grid.is_empty() {
            return Err(BalanceError::EmptyGrid("rebalance rules"));
        }
        if prices.len() < 2 {
            return Err(BalanceError::InsufficientData {
                required: 2,
                actual: prices.len(),
            });
        }
        if !(initial_capital.is_finite() && initial_capital > 0.0) {
            return Err(BalanceError::InvalidConfig(format!(
                "initial capital must be positive and finite, got {}",
                initial_capital
            )));
        }

        let mut cells = Vec::with_capacity(weight_grid.len() * rule_grid.len());
        for (weight_index, &weight) in weight_grid.iter().enumerate() {
            for (rule_index, &rule) in rule_grid.iter().enumerate() {
                let cell = GridCell {
                    weight_index,
                    rule_index,
                };
                cells.push((cell, StrategyConfig::new(weight, rule)?));
            }
        }

        let total = cells.len();
        let finished = AtomicUsize::new(0);
        let evaluate = |&(cell, config): &(GridCell, StrategyConfig)| {
            let outcome = self.evaluate_cell(prices, cell, config, initial_capital);
            let ran = matches!(outcome, Ok(CellOutcome::Scored(_) | CellOutcome::Degenerate));
            if let (Some(progress), true) = (&self.progress, ran) {
                progress(finished.fetch_add(1, AtomicOrdering::SeqCst) + 1, total);
            }
            outcome
        };
        let outcomes: Vec<Result<CellOutcome>> = if self.parallel {
            cells.par_iter().map(evaluate).collect()
        } else {
            cells.iter().map(evaluate).collect()
        };

        let mut results = Vec::with_capacity(outcomes.len());
        let mut skipped = 0;
        let mut cancelled = false;
        for outcome in outcomes {
            match outcome? {
                CellOutcome::Scored(result) => results.push(result),
                CellOutcome::Degenerate => skipped += 1,
                CellOutcome::NotRun => cancelled = true,
            }
        }

        let objective = self.objective;
        // Stable sort keeps grid order among equal scores.
        results.sort_by(|a, b| compare_desc(objective.score(&a.metrics), objective.score(&b.metrics)));

        Ok(GridReport {
            objective,
            weights: weight_grid.to_vec(),
            rules: rule_grid.to_vec(),
            results,
            skipped,
            cancelled,
        })
    }

    fn evaluate_cell(
        &self,
        prices: &PriceSeries,
        cell: GridCell,
        config: StrategyConfig,
        initial_capital: f64,
    ) -> Result<CellOutcome> {
        if self.cancel.as_ref().is_some_and(|token| token.is_cancelled()) {
            return Ok(CellOutcome::NotRun);
        }
        let run = match simulator::run(prices, &config, initial_capital) {
            Ok(run) => run,
            Err(BalanceError::DegenerateState { .. }) => return Ok(CellOutcome::Degenerate),
            Err(e) => return Err(e),
        };
        let metrics = metrics::compute_with(&run.curve, &self.metrics)?;
        Ok(CellOutcome::Scored(GridResult {
            cell,
            config,
            metrics,
            rebalances: run.rebalance_count(),
        }))
    }
}

/// Sweep with the default settings: Sharpe-ranked, sequential.
pub fn optimize(
    prices: &PriceSeries,
    weight_grid: &[f64],
    rule_grid: &[RebalanceRule],
    initial_capital: f64,
) -> Result<GridReport> {
    GridSearch::new().run(prices, weight_grid, rule_grid, initial_capital)
}

/// Descending order with NaN sorted last.
fn compare_desc(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

/// `steps` evenly spaced values from `start` to `end`, both inclusive.
pub fn linspace(start: f64, end: f64, steps: usize) -> Vec<f64> {
    match steps {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let last = (steps - 1) as f64;
            let mut values: Vec<f64> = (0..steps)
                .map(|i| start + (end - start) * (i as f64 / last))
                .collect();
            values[steps - 1] = end;
            values
        }
    }
}

pub fn default_weight_grid() -> Vec<f64> {
    linspace(0.0, 1.0, DEFAULT_STEPS)
}

pub fn default_rule_grid() -> Vec<RebalanceRule> {
    threshold_grid(&linspace(0.01, 0.11, DEFAULT_STEPS))
}

pub fn threshold_grid(tolerances: &[f64]) -> Vec<RebalanceRule> {
    tolerances
        .iter()
        .map(|&tolerance| RebalanceRule::Threshold { tolerance })
        .collect()
}

pub fn calendar_grid(periods: &[u32]) -> Vec<RebalanceRule> {
    periods
        .iter()
        .map(|&period| RebalanceRule::Calendar { period })
        .collect()
}
