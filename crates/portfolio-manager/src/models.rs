use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A position as seen by the rebalancer. Weights are percentages (0-100).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub symbol: String,
    pub quantity: f64,
    pub current_weight: f64,
    pub target_weight: f64,
}

/// A weighted per-period return series for one holding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingReturns {
    pub symbol: String,
    /// Percent of the portfolio (0-100)
    pub weight: f64,
    pub returns: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskMetricsBundle {
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    /// Annualized, as a fraction
    pub volatility: f64,
    pub beta: f64,
    pub alpha: f64,
    /// Positive fraction (0.15 = 15% peak-to-trough)
    pub max_drawdown: f64,
    pub var_95: f64,
    pub var_99: f64,
    pub cvar_95: f64,
    pub cvar_99: f64,
    pub downside_deviation: f64,
    /// 0-100, higher is more diversified
    pub diversification_score: f64,
    pub herfindahl_index: f64,
    pub annualized_return: f64,
    pub total_return: f64,
    pub observations: usize,
    pub benchmark_available: bool,
    pub insufficient_data: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeAction {
    Buy,
    Sell,
    Hold,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub symbol: String,
    pub action: TradeAction,
    pub current_weight: f64,
    pub target_weight: f64,
    /// current - target, in percentage points
    pub drift: f64,
    /// Trade value in portfolio currency; 0 for `Hold`
    pub notional: f64,
    /// Units to trade at the implied price, when the holding has a quantity
    pub estimated_quantity: Option<f64>,
}

impl Suggestion {
    pub fn is_actionable(&self) -> bool {
        self.action != TradeAction::Hold
    }
}

/// How the rebalancer resolves target weights.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", content = "targets", rename_all = "camelCase")]
pub enum TargetPolicy {
    /// 100 / n for every holding
    EqualWeight,
    /// Each holding's own `target_weight`
    #[default]
    Holdings,
    /// Explicit map; symbols not listed fall back to the holding's target
    Custom(HashMap<String, f64>),
}

/// Per-trade cost parameters. Nothing venue-specific is assumed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeModel {
    pub flat_fee_per_trade: Decimal,
    /// Percent of traded notional (0.05 = 5 bps)
    pub slippage_percent: Decimal,
}

impl Default for FeeModel {
    fn default() -> Self {
        Self {
            flat_fee_per_trade: Decimal::ZERO,
            slippage_percent: Decimal::new(5, 2),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionCost {
    pub trade_count: usize,
    pub commissions: Decimal,
    pub slippage: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebalancePlan {
    pub total_portfolio_value: f64,
    pub suggestions: Vec<Suggestion>,
    pub total_notional: f64,
    /// Total notional as a percent of portfolio value
    pub turnover_percent: f64,
    pub cost: TransactionCost,
}

impl RebalancePlan {
    pub fn trades(&self) -> impl Iterator<Item = &Suggestion> {
        self.suggestions.iter().filter(|s| s.is_actionable())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonteCarloStatistics {
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub percentile_5: f64,
    pub percentile_25: f64,
    pub percentile_75: f64,
    pub percentile_95: f64,
    /// Share of paths ending above the initial capital
    pub probability_positive: f64,
}

/// The simulated path whose final value lies nearest a reported percentile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PercentilePath {
    pub percentile: u8,
    /// Path number; it is reproducible from `seed + path_index`
    pub path_index: usize,
    pub final_value: f64,
    pub path: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonteCarloResult {
    pub statistics: MonteCarloStatistics,
    /// Full value paths (initial capital first) for the first paths simulated
    pub sample_paths: Vec<Vec<f64>>,
    /// One path each for p5, p25, p50, p75 and p95
    pub percentile_paths: Vec<PercentilePath>,
    pub initial_capital: f64,
    pub horizon_days: usize,
    pub num_simulations: usize,
    /// Set when the covariance was not positive-definite and only its
    /// diagonal was used
    pub used_diagonal_fallback: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetWeight {
    pub symbol: String,
    /// Fraction of the portfolio, 0..=1
    pub weight: f64,
}

/// One candidate allocation with its annualized return and risk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioPoint {
    pub weights: Vec<AssetWeight>,
    pub expected_return: f64,
    pub volatility: f64,
    pub sharpe: f64,
}

impl PortfolioPoint {
    pub fn weight_of(&self, symbol: &str) -> Option<f64> {
        self.weights
            .iter()
            .find(|w| w.symbol == symbol)
            .map(|w| w.weight)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationResult {
    pub max_sharpe: PortfolioPoint,
    pub min_volatility: PortfolioPoint,
    /// Ordered by target return, starting at the min-volatility portfolio
    pub efficient_frontier: Vec<PortfolioPoint>,
    pub observations: usize,
    /// False when any descent hit the iteration cap or stalled
    pub converged: bool,
}
