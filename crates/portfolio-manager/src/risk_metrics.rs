use analysis_core::AnalysisError;

use crate::config::RiskConfig;
use crate::models::*;
use crate::shared_math;

/// Tolerance on Σweights before the normalization warning fires.
const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

pub struct RiskCalculator;

impl RiskCalculator {
    /// Compute portfolio-level risk metrics from weighted holding returns.
    ///
    /// The portfolio series is the weight-normalized sum of the holdings'
    /// series. Fewer than two observations yields a zeroed bundle with
    /// `insufficient_data` set.
    pub fn compute(
        holdings: &[HoldingReturns],
        benchmark: Option<&[f64]>,
        config: &RiskConfig,
    ) -> Result<RiskMetricsBundle, AnalysisError> {
        if holdings.is_empty() {
            return Ok(Self::insufficient(0, 0.0, 0.0, benchmark.is_some()));
        }
        if !(config.periods_per_year > 0.0) {
            return Err(AnalysisError::invalid("periods_per_year must be positive"));
        }

        let n = holdings[0].returns.len();
        if let Some(h) = holdings.iter().find(|h| h.returns.len() != n) {
            return Err(AnalysisError::invalid(format!(
                "return series for {} has {} observations, expected {}",
                h.symbol,
                h.returns.len(),
                n
            )));
        }
        if let Some(b) = benchmark {
            if b.len() != n {
                return Err(AnalysisError::invalid(format!(
                    "benchmark has {} observations, portfolio has {}",
                    b.len(),
                    n
                )));
            }
        }

        let weights = normalized_weights(holdings);
        let hhi = shared_math::herfindahl_index(&weights);
        let diversification = shared_math::diversification_score(&weights);

        if n < 2 {
            return Ok(Self::insufficient(n, hhi, diversification, benchmark.is_some()));
        }

        let series: Vec<&[f64]> = holdings.iter().map(|h| h.returns.as_slice()).collect();
        let returns = shared_math::weighted_returns(&series, &weights);

        let ppy = config.periods_per_year;
        let rf = config.risk_free_rate;
        let annualized_return = shared_math::annualized_return(&returns, ppy);

        let (beta, alpha) = match benchmark {
            Some(bench) => {
                let beta = shared_math::beta(&returns, bench).unwrap_or(1.0);
                let bench_return = shared_math::annualized_return(bench, ppy);
                (beta, annualized_return - (rf + beta * (bench_return - rf)))
            }
            None => (1.0, 0.0),
        };

        let curve = shared_math::equity_curve(&returns);

        let bundle = RiskMetricsBundle {
            sharpe_ratio: shared_math::sharpe_ratio(&returns, rf, ppy),
            sortino_ratio: shared_math::sortino_ratio(&returns, rf, ppy),
            volatility: shared_math::annualized_volatility(&returns, ppy),
            beta,
            alpha,
            max_drawdown: shared_math::max_drawdown(&curve),
            var_95: shared_math::var_historical(&returns, 0.95),
            var_99: shared_math::var_historical(&returns, 0.99),
            cvar_95: shared_math::cvar_historical(&returns, 0.95),
            cvar_99: shared_math::cvar_historical(&returns, 0.99),
            downside_deviation: shared_math::downside_deviation(&returns, ppy),
            diversification_score: diversification,
            herfindahl_index: hhi,
            annualized_return,
            total_return: shared_math::total_return(&returns),
            observations: n,
            benchmark_available: benchmark.is_some(),
            insufficient_data: false,
        };

        tracing::debug!(
            "Risk metrics: {} holdings, {} observations, sharpe={:.3}, vol={:.4}",
            holdings.len(),
            n,
            bundle.sharpe_ratio,
            bundle.volatility
        );
        Ok(bundle)
    }

    fn insufficient(
        observations: usize,
        herfindahl_index: f64,
        diversification_score: f64,
        benchmark_available: bool,
    ) -> RiskMetricsBundle {
        RiskMetricsBundle {
            beta: 1.0,
            herfindahl_index,
            diversification_score,
            observations,
            benchmark_available,
            insufficient_data: true,
            ..Default::default()
        }
    }
}

/// Holding weights as fractions summing to 1. A non-positive total falls back
/// to equal weights.
pub(crate) fn normalized_weights(holdings: &[HoldingReturns]) -> Vec<f64> {
    let total: f64 = holdings.iter().map(|h| h.weight).sum();
    if !(total > 0.0) {
        tracing::warn!("Holding weights sum to {}, using equal weights", total);
        let w = 1.0 / holdings.len() as f64;
        return vec![w; holdings.len()];
    }
    if (total - 100.0).abs() > WEIGHT_SUM_TOLERANCE {
        tracing::warn!("Holding weights sum to {:.4}, normalizing to 100", total);
    }
    holdings.iter().map(|h| h.weight / total).collect()
}
