use serde::{Deserialize, Serialize};

use crate::models::FeeModel;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;
pub const DEFAULT_DRIFT_TOLERANCE: f64 = 2.0;
/// Allowed deviation of a weight total from 100, in percentage points.
pub const DEFAULT_WEIGHT_SUM_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RiskConfig {
    /// Return periods per year used for annualization (252 for daily)
    pub periods_per_year: f64,
    /// Annual risk-free rate as a fraction
    pub risk_free_rate: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            periods_per_year: TRADING_DAYS_PER_YEAR,
            risk_free_rate: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RebalanceConfig {
    /// Allowed |drift| in percentage points before a trade is suggested
    pub drift_tolerance: f64,
    /// How far current and target weight totals may stray from 100
    pub weight_sum_tolerance: f64,
    pub fee_model: FeeModel,
}

impl Default for RebalanceConfig {
    fn default() -> Self {
        Self {
            drift_tolerance: DEFAULT_DRIFT_TOLERANCE,
            weight_sum_tolerance: DEFAULT_WEIGHT_SUM_TOLERANCE,
            fee_model: FeeModel::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MonteCarloConfig {
    pub initial_capital: f64,
    pub horizon_days: usize,
    pub num_simulations: usize,
    /// Base seed; path `i` uses `seed + i`
    pub seed: u64,
    /// Number of full paths returned for charting
    pub sample_paths: usize,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
            horizon_days: 252,
            num_simulations: 1000,
            seed: 42,
            sample_paths: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OptimizerConfig {
    pub periods_per_year: f64,
    /// Annual risk-free rate as a fraction
    pub risk_free_rate: f64,
    /// Per-asset weight bounds as fractions of the portfolio
    pub min_weight: f64,
    pub max_weight: f64,
    /// Portfolios sampled from the min-volatility to the max-Sharpe return
    pub frontier_points: usize,
    pub max_iterations: usize,
    /// Descent stops once a step moves the weights less than this
    pub tolerance: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            periods_per_year: TRADING_DAYS_PER_YEAR,
            risk_free_rate: 0.0,
            min_weight: 0.0,
            max_weight: 1.0,
            frontier_points: 20,
            max_iterations: 10_000,
            tolerance: 1e-10,
        }
    }
}
