use std::collections::HashMap;

use analysis_core::AnalysisError;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;

use crate::config::{RebalanceConfig, DEFAULT_WEIGHT_SUM_TOLERANCE};
use crate::models::*;

// Absorbs binary rounding of decimal inputs such as 3 x 33.33
const WEIGHT_SUM_EPSILON: f64 = 1e-9;

fn check_weight_sum(label: &str, sum: f64, tolerance: f64) -> Result<(), AnalysisError> {
    if (sum - 100.0).abs() > tolerance + WEIGHT_SUM_EPSILON {
        return Err(AnalysisError::invalid(format!(
            "{} weights sum to {:.4}, expected 100 +/- {}",
            label, sum, tolerance
        )));
    }
    Ok(())
}

impl TargetPolicy {
    /// Target weight per symbol for the given holdings.
    pub fn resolve(&self, holdings: &[Holding]) -> HashMap<String, f64> {
        match self {
            TargetPolicy::EqualWeight => {
                if holdings.is_empty() {
                    return HashMap::new();
                }
                let w = 100.0 / holdings.len() as f64;
                holdings.iter().map(|h| (h.symbol.clone(), w)).collect()
            }
            TargetPolicy::Holdings => holdings
                .iter()
                .map(|h| (h.symbol.clone(), h.target_weight))
                .collect(),
            TargetPolicy::Custom(map) => map.clone(),
        }
    }
}

/// Drift-based trade suggestions, one per holding in input order, checked
/// against the default weight-sum tolerance.
///
/// `drift = current - target`; beyond `+tolerance` the holding is sold down,
/// below `-tolerance` it is bought up, otherwise it is kept as `Hold` with
/// zero notional. A symbol missing from `targets` uses its own
/// `target_weight`.
pub fn rebalance_suggestions(
    holdings: &[Holding],
    targets: &HashMap<String, f64>,
    drift_tolerance: f64,
    total_portfolio_value: f64,
) -> Result<Vec<Suggestion>, AnalysisError> {
    rebalance_suggestions_within(
        holdings,
        targets,
        drift_tolerance,
        total_portfolio_value,
        DEFAULT_WEIGHT_SUM_TOLERANCE,
    )
}

/// [`rebalance_suggestions`] with an explicit weight-sum tolerance. Both the
/// current weights and the resolved targets must total 100 within it.
pub fn rebalance_suggestions_within(
    holdings: &[Holding],
    targets: &HashMap<String, f64>,
    drift_tolerance: f64,
    total_portfolio_value: f64,
    weight_sum_tolerance: f64,
) -> Result<Vec<Suggestion>, AnalysisError> {
    if !(drift_tolerance >= 0.0) {
        return Err(AnalysisError::invalid("drift tolerance must be non-negative"));
    }
    if !(weight_sum_tolerance >= 0.0) {
        return Err(AnalysisError::invalid("weight sum tolerance must be non-negative"));
    }
    if !(total_portfolio_value >= 0.0) || !total_portfolio_value.is_finite() {
        return Err(AnalysisError::invalid("portfolio value must be non-negative"));
    }
    if holdings.is_empty() {
        return Ok(Vec::new());
    }

    let current_sum: f64 = holdings.iter().map(|h| h.current_weight).sum();
    check_weight_sum("current", current_sum, weight_sum_tolerance)?;

    let resolved: Vec<f64> = holdings
        .iter()
        .map(|h| targets.get(&h.symbol).copied().unwrap_or(h.target_weight))
        .collect();
    check_weight_sum("target", resolved.iter().sum(), weight_sum_tolerance)?;

    let suggestions = holdings
        .iter()
        .zip(resolved)
        .map(|(h, target)| {
            let drift = h.current_weight - target;
            let action = if drift > drift_tolerance {
                TradeAction::Sell
            } else if drift < -drift_tolerance {
                TradeAction::Buy
            } else {
                TradeAction::Hold
            };
            let notional = if action == TradeAction::Hold {
                0.0
            } else {
                drift.abs() * total_portfolio_value / 100.0
            };

            let position_value = h.current_weight / 100.0 * total_portfolio_value;
            let estimated_quantity = (h.quantity > 0.0 && position_value > 0.0)
                .then(|| notional / (position_value / h.quantity));

            Suggestion {
                symbol: h.symbol.clone(),
                action,
                current_weight: h.current_weight,
                target_weight: target,
                drift,
                notional,
                estimated_quantity,
            }
        })
        .collect();

    Ok(suggestions)
}

/// Flat fee per trade plus slippage as a percentage of total notional.
pub fn estimate_transaction_cost(
    trade_count: usize,
    notional: Decimal,
    fee_model: &FeeModel,
) -> TransactionCost {
    let commissions = fee_model.flat_fee_per_trade * Decimal::from(trade_count);
    let slippage = notional.abs() * fee_model.slippage_percent / Decimal::ONE_HUNDRED;
    TransactionCost {
        trade_count,
        commissions,
        slippage,
        total: commissions + slippage,
    }
}

pub struct RebalanceCalculator;

impl RebalanceCalculator {
    /// Suggestions plus turnover and cost for a target policy.
    pub fn plan(
        holdings: &[Holding],
        policy: &TargetPolicy,
        total_portfolio_value: f64,
        config: &RebalanceConfig,
    ) -> Result<RebalancePlan, AnalysisError> {
        let targets = policy.resolve(holdings);
        let suggestions = rebalance_suggestions_within(
            holdings,
            &targets,
            config.drift_tolerance,
            total_portfolio_value,
            config.weight_sum_tolerance,
        )?;

        let trade_count = suggestions.iter().filter(|s| s.is_actionable()).count();
        let total_notional: f64 = suggestions.iter().map(|s| s.notional).sum();
        let turnover_percent = if total_portfolio_value > 0.0 {
            total_notional / total_portfolio_value * 100.0
        } else {
            0.0
        };
        let cost = estimate_transaction_cost(
            trade_count,
            Decimal::from_f64(total_notional).unwrap_or(Decimal::ZERO),
            &config.fee_model,
        );

        tracing::debug!(
            "Rebalance plan: {} holdings, {} trades, turnover {:.2}%",
            holdings.len(),
            trade_count,
            turnover_percent
        );

        Ok(RebalancePlan {
            total_portfolio_value,
            suggestions,
            total_notional,
            turnover_percent,
            cost,
        })
    }
}
