use analysis_core::AnalysisError;
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use statrs::statistics::Statistics;

use crate::config::OptimizerConfig;
use crate::models::{AssetWeight, HoldingReturns, OptimizationResult, PortfolioPoint};

const BISECTION_STEPS: usize = 100;
const MIN_STEP: f64 = 1e-15;
const VOLATILITY_EPSILON: f64 = 1e-12;
const BOUNDS_EPSILON: f64 = 1e-12;
/// Projected-gradient size below which a stalled descent counts as stationary.
const STALL_GRADIENT: f64 = 1e-6;
/// Weight of the return-target penalty relative to the variance scale.
const FRONTIER_PENALTY: f64 = 1e3;

/// Long-only mean-variance optimization over the holdings' return series.
///
/// Finds the maximum-Sharpe and minimum-volatility allocations subject to
/// `min_weight <= w_i <= max_weight` and `Σw = 1`, then traces the frontier
/// between their returns. Moments are annualized with `periods_per_year`;
/// the holdings' own weights are ignored.
pub fn optimize(
    holdings: &[HoldingReturns],
    config: &OptimizerConfig,
) -> Result<OptimizationResult, AnalysisError> {
    if holdings.is_empty() {
        return Err(AnalysisError::invalid("optimizer needs at least one holding"));
    }
    if !(config.periods_per_year > 0.0) {
        return Err(AnalysisError::invalid("periods_per_year must be positive"));
    }
    if config.max_iterations == 0 {
        return Err(AnalysisError::invalid("max_iterations must be positive"));
    }
    if !(config.tolerance > 0.0) {
        return Err(AnalysisError::invalid("tolerance must be positive"));
    }
    let observations = holdings[0].returns.len();
    if let Some(h) = holdings.iter().find(|h| h.returns.len() != observations) {
        return Err(AnalysisError::invalid(format!(
            "return series for {} has {} observations, expected {}",
            h.symbol,
            h.returns.len(),
            observations
        )));
    }
    if observations < 2 {
        return Err(AnalysisError::invalid(
            "optimizer needs at least two return observations",
        ));
    }
    let bounds = WeightBounds::new(config.min_weight, config.max_weight, holdings.len())?;

    let problem = Problem::from_holdings(holdings, config);
    let n = holdings.len();
    let equal = DVector::from_element(n, 1.0 / n as f64);
    let start = global_min_variance(&problem.covariance).unwrap_or_else(|| equal.clone());

    let min_vol = projected_descent(
        |w| problem.variance(w),
        |w| problem.variance_gradient(w),
        &bounds,
        &start,
        config,
    );
    let max_sharpe = projected_descent(
        |w| problem.negative_sharpe(w),
        |w| problem.negative_sharpe_gradient(w),
        &bounds,
        &equal,
        config,
    );

    let low = problem.expected_return(&min_vol.weights);
    let high = problem.expected_return(&max_sharpe.weights);
    let points = config.frontier_points;
    let penalty = problem.frontier_penalty();

    let frontier: Vec<Descent> = (0..points)
        .into_par_iter()
        .map(|i| {
            let target = if points == 1 {
                low
            } else {
                low + (high - low) * i as f64 / (points - 1) as f64
            };
            projected_descent(
                |w| {
                    let miss = problem.expected_return(w) - target;
                    problem.variance(w) + penalty * miss * miss
                },
                |w| {
                    let miss = problem.expected_return(w) - target;
                    problem.variance_gradient(w) + &problem.means * (2.0 * penalty * miss)
                },
                &bounds,
                &min_vol.weights,
                config,
            )
        })
        .collect();

    let converged = min_vol.converged && max_sharpe.converged && frontier.iter().all(|d| d.converged);
    if !converged {
        tracing::warn!(
            "Portfolio optimizer stopped before converging (cap {} iterations)",
            config.max_iterations
        );
    }

    let result = OptimizationResult {
        max_sharpe: problem.point(holdings, &max_sharpe.weights),
        min_volatility: problem.point(holdings, &min_vol.weights),
        efficient_frontier: frontier
            .iter()
            .map(|d| problem.point(holdings, &d.weights))
            .collect(),
        observations,
        converged,
    };
    tracing::debug!(
        "Optimized {} assets: max Sharpe {:.3} at vol {:.4}, min vol {:.4}, {} frontier points",
        n,
        result.max_sharpe.sharpe,
        result.max_sharpe.volatility,
        result.min_volatility.volatility,
        result.efficient_frontier.len()
    );
    Ok(result)
}

/// Unconstrained minimum-variance weights `Σ⁻¹1 / 1ᵀΣ⁻¹1`, if `Σ` is invertible.
pub fn global_min_variance(covariance: &DMatrix<f64>) -> Option<DVector<f64>> {
    let ones = DVector::from_element(covariance.nrows(), 1.0);
    let raw = covariance.clone().try_inverse()? * &ones;
    let total = raw.sum();
    if total.abs() < VOLATILITY_EPSILON || !total.is_finite() {
        return None;
    }
    Some(raw / total)
}

/// Annualized means and sample covariance of the holdings' returns.
struct Problem {
    means: DVector<f64>,
    covariance: DMatrix<f64>,
    risk_free_rate: f64,
}

impl Problem {
    fn from_holdings(holdings: &[HoldingReturns], config: &OptimizerConfig) -> Self {
        let n = holdings.len();
        let ppy = config.periods_per_year;
        let means =
            DVector::from_iterator(n, holdings.iter().map(|h| h.returns.as_slice().mean() * ppy));
        let covariance = DMatrix::from_fn(n, n, |i, j| {
            holdings[i].returns.as_slice().covariance(holdings[j].returns.as_slice()) * ppy
        });
        Self {
            means,
            covariance,
            risk_free_rate: config.risk_free_rate,
        }
    }

    fn expected_return(&self, w: &DVector<f64>) -> f64 {
        self.means.dot(w)
    }

    fn variance(&self, w: &DVector<f64>) -> f64 {
        w.dot(&(&self.covariance * w))
    }

    fn variance_gradient(&self, w: &DVector<f64>) -> DVector<f64> {
        (&self.covariance * w) * 2.0
    }

    fn volatility(&self, w: &DVector<f64>) -> f64 {
        self.variance(w).max(0.0).sqrt()
    }

    fn negative_sharpe(&self, w: &DVector<f64>) -> f64 {
        let vol = self.volatility(w);
        if vol < VOLATILITY_EPSILON {
            return 0.0;
        }
        -(self.expected_return(w) - self.risk_free_rate) / vol
    }

    fn negative_sharpe_gradient(&self, w: &DVector<f64>) -> DVector<f64> {
        let vol = self.volatility(w);
        if vol < VOLATILITY_EPSILON {
            return DVector::zeros(w.len());
        }
        let excess = self.expected_return(w) - self.risk_free_rate;
        let sigma_w = &self.covariance * w;
        sigma_w * (excess / vol.powi(3)) - &self.means / vol
    }

    /// Scales the return miss so it weighs against variance regardless of
    /// the units of the inputs.
    fn frontier_penalty(&self) -> f64 {
        let n = self.means.len() as f64;
        let variance_scale = self.covariance.trace() / n;
        let return_scale = self.means.amax();
        if return_scale < VOLATILITY_EPSILON {
            return 0.0;
        }
        FRONTIER_PENALTY * variance_scale / (return_scale * return_scale)
    }

    fn point(&self, holdings: &[HoldingReturns], w: &DVector<f64>) -> PortfolioPoint {
        let expected_return = self.expected_return(w);
        let volatility = self.volatility(w);
        let sharpe = if volatility < VOLATILITY_EPSILON {
            0.0
        } else {
            (expected_return - self.risk_free_rate) / volatility
        };
        PortfolioPoint {
            weights: holdings
                .iter()
                .zip(w.iter())
                .map(|(h, &weight)| AssetWeight {
                    symbol: h.symbol.clone(),
                    weight,
                })
                .collect(),
            expected_return,
            volatility,
            sharpe,
        }
    }
}

/// Per-asset box bounds with the weights summing to one.
#[derive(Debug, Clone, Copy)]
struct WeightBounds {
    lower: f64,
    upper: f64,
}

impl WeightBounds {
    fn new(lower: f64, upper: f64, n: usize) -> Result<Self, AnalysisError> {
        if !(0.0 <= lower && lower <= upper && upper <= 1.0) {
            return Err(AnalysisError::invalid(format!(
                "weight bounds must satisfy 0 <= min ({}) <= max ({}) <= 1",
                lower, upper
            )));
        }
        let n = n as f64;
        if n * lower > 1.0 + BOUNDS_EPSILON || n * upper < 1.0 - BOUNDS_EPSILON {
            return Err(AnalysisError::invalid(format!(
                "no allocation of {} assets sums to 1 within [{}, {}]",
                n, lower, upper
            )));
        }
        Ok(Self { lower, upper })
    }

    /// Euclidean projection onto `{ Σw = 1, lower <= w_i <= upper }`.
    fn project(&self, v: &DVector<f64>) -> DVector<f64> {
        let shifted = |tau: f64| v.map(|x| (x - tau).clamp(self.lower, self.upper));
        let min = v.iter().copied().fold(f64::INFINITY, f64::min);
        let max = v.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        // Σ clamp(v - tau) falls from n * upper to n * lower over this range
        let mut lo = min - self.upper;
        let mut hi = max - self.lower;
        for _ in 0..BISECTION_STEPS {
            let mid = 0.5 * (lo + hi);
            if shifted(mid).sum() > 1.0 {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        shifted(0.5 * (lo + hi))
    }
}

struct Descent {
    weights: DVector<f64>,
    converged: bool,
}

/// Projected gradient descent with backtracking; the trial step doubles
/// after every accepted move.
fn projected_descent<F, G>(
    objective: F,
    gradient: G,
    bounds: &WeightBounds,
    start: &DVector<f64>,
    config: &OptimizerConfig,
) -> Descent
where
    F: Fn(&DVector<f64>) -> f64,
    G: Fn(&DVector<f64>) -> DVector<f64>,
{
    let mut weights = bounds.project(start);
    let mut value = objective(&weights);
    let mut step = 1.0;

    for _ in 0..config.max_iterations {
        let grad = gradient(&weights);
        let mut accepted = None;
        while step >= MIN_STEP {
            let candidate = bounds.project(&(&weights - &grad * step));
            let delta = &candidate - &weights;
            let candidate_value = objective(&candidate);
            if candidate_value <= value + grad.dot(&delta) + delta.norm_squared() / (2.0 * step) {
                accepted = Some((candidate, delta.norm(), candidate_value));
                break;
            }
            step *= 0.5;
        }

        let Some((candidate, moved, candidate_value)) = accepted else {
            // No representable step improves the objective
            let stationarity = (bounds.project(&(&weights - &grad)) - &weights).norm();
            return Descent {
                weights,
                converged: stationarity < STALL_GRADIENT,
            };
        };
        weights = candidate;
        value = candidate_value;
        if moved < config.tolerance {
            return Descent {
                weights,
                converged: true,
            };
        }
        step *= 2.0;
    }

    Descent {
        weights,
        converged: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn series(symbol: &str, returns: &[f64]) -> HoldingReturns {
        HoldingReturns {
            symbol: symbol.to_string(),
            weight: 0.0,
            returns: returns.to_vec(),
        }
    }

    /// Zero sample covariance; daily variance of A is four times B's and its
    /// mean is twice B's.
    fn uncorrelated_pair() -> Vec<HoldingReturns> {
        vec![
            series("A", &[0.011, -0.009, 0.011, -0.009]),
            series("B", &[0.0055, 0.0055, -0.0045, -0.0045]),
        ]
    }

    fn three_assets() -> Vec<HoldingReturns> {
        vec![
            series("A", &[0.01, -0.01, 0.02, -0.015, 0.005]),
            series("B", &[-0.005, 0.01, 0.0, 0.012, -0.01]),
            series("C", &[0.003, 0.004, -0.006, -0.002, 0.008]),
        ]
    }

    fn small_config() -> OptimizerConfig {
        OptimizerConfig {
            frontier_points: 5,
            ..Default::default()
        }
    }

    #[test]
    fn test_uncorrelated_pair_matches_closed_form() {
        let r = optimize(&uncorrelated_pair(), &small_config()).unwrap();
        assert!(r.converged);
        assert_eq!(r.observations, 4);

        // Min variance: w_A = var_B / (var_A + var_B) = 0.2
        assert_abs_diff_eq!(r.min_volatility.weight_of("A").unwrap(), 0.2, epsilon = 1e-6);
        assert_abs_diff_eq!(r.min_volatility.weight_of("B").unwrap(), 0.8, epsilon = 1e-6);
        assert_abs_diff_eq!(r.min_volatility.expected_return, 0.1512, epsilon = 1e-9);
        assert_abs_diff_eq!(r.min_volatility.volatility, 0.00672_f64.sqrt(), epsilon = 1e-9);

        // Tangency: w ∝ mu_i / var_i -> 1/3, 2/3
        assert_abs_diff_eq!(r.max_sharpe.weight_of("A").unwrap(), 1.0 / 3.0, epsilon = 1e-6);
        assert_abs_diff_eq!(r.max_sharpe.weight_of("B").unwrap(), 2.0 / 3.0, epsilon = 1e-6);
        assert!(r.max_sharpe.sharpe >= r.min_volatility.sharpe);
        assert!(r.efficient_frontier.iter().all(|p| p.sharpe <= r.max_sharpe.sharpe + 1e-9));
    }

    #[test]
    fn test_weight_cap_binds() {
        let config = OptimizerConfig {
            max_weight: 0.6,
            ..small_config()
        };
        let r = optimize(&uncorrelated_pair(), &config).unwrap();
        // Both unconstrained optima put more than 60% in B
        assert_abs_diff_eq!(r.min_volatility.weight_of("B").unwrap(), 0.6, epsilon = 1e-9);
        assert_abs_diff_eq!(r.max_sharpe.weight_of("B").unwrap(), 0.6, epsilon = 1e-9);
        assert_abs_diff_eq!(r.max_sharpe.weight_of("A").unwrap(), 0.4, epsilon = 1e-9);
    }

    #[test]
    fn test_interior_min_variance_matches_inverse() {
        let holdings = three_assets();
        let config = small_config();
        let problem = Problem::from_holdings(&holdings, &config);
        let closed = global_min_variance(&problem.covariance).unwrap();
        assert!(closed.iter().all(|w| *w > 0.0));

        let r = optimize(&holdings, &config).unwrap();
        for (asset, expected) in r.min_volatility.weights.iter().zip(closed.iter()) {
            assert_abs_diff_eq!(asset.weight, *expected, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_frontier_shape() {
        let r = optimize(&uncorrelated_pair(), &small_config()).unwrap();
        let frontier = &r.efficient_frontier;
        assert_eq!(frontier.len(), 5);
        assert_abs_diff_eq!(
            frontier[0].volatility,
            r.min_volatility.volatility,
            epsilon = 1e-9
        );
        for p in frontier {
            let total: f64 = p.weights.iter().map(|w| w.weight).sum();
            assert_abs_diff_eq!(total, 1.0, epsilon = 1e-9);
            assert!(p.weights.iter().all(|w| (-1e-12..=1.0 + 1e-12).contains(&w.weight)));
            assert!(p.volatility >= r.min_volatility.volatility - 1e-12);
        }
        assert!(frontier
            .windows(2)
            .all(|w| w[0].expected_return <= w[1].expected_return + 1e-9));
        // The far end reaches close to the tangency return
        assert_abs_diff_eq!(
            frontier[4].expected_return,
            r.max_sharpe.expected_return,
            epsilon = 1e-3
        );
    }

    #[test]
    fn test_single_asset_and_empty_frontier() {
        let config = OptimizerConfig {
            frontier_points: 0,
            ..Default::default()
        };
        let r = optimize(&[series("SPY", &[0.01, -0.005, 0.007])], &config).unwrap();
        assert_abs_diff_eq!(r.max_sharpe.weight_of("SPY").unwrap(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(r.min_volatility.weight_of("SPY").unwrap(), 1.0, epsilon = 1e-12);
        assert!(r.efficient_frontier.is_empty());
    }

    #[test]
    fn test_constant_returns_have_zero_sharpe() {
        let flat = vec![series("A", &[0.001; 5]), series("B", &[0.002; 5])];
        let r = optimize(&flat, &small_config()).unwrap();
        assert_eq!(r.max_sharpe.sharpe, 0.0);
        assert_abs_diff_eq!(r.min_volatility.volatility, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_invalid_inputs() {
        let config = small_config();
        assert!(matches!(optimize(&[], &config), Err(AnalysisError::InvalidInput(_))));

        let mut uneven = uncorrelated_pair();
        uneven[1].returns.pop();
        assert!(optimize(&uneven, &config).is_err());
        assert!(optimize(&[series("A", &[0.01])], &config).is_err());

        for bad in [
            OptimizerConfig { min_weight: 0.6, ..small_config() },
            OptimizerConfig { max_weight: 0.4, ..small_config() },
            OptimizerConfig { min_weight: 0.5, max_weight: 0.3, ..small_config() },
            OptimizerConfig { max_weight: 1.5, ..small_config() },
            OptimizerConfig { max_iterations: 0, ..small_config() },
            OptimizerConfig { periods_per_year: 0.0, ..small_config() },
        ] {
            assert!(optimize(&uncorrelated_pair(), &bad).is_err());
        }
    }

    #[test]
    fn test_projection_onto_capped_simplex() {
        let bounds = WeightBounds::new(0.0, 0.5, 3).unwrap();
        let p = bounds.project(&DVector::from_vec(vec![0.9, 0.4, -0.3]));
        assert_abs_diff_eq!(p.sum(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p[0], 0.5, epsilon = 1e-12);
        assert!(p.iter().all(|w| (0.0..=0.5).contains(w)));

        let feasible = DVector::from_vec(vec![0.2, 0.3, 0.5]);
        let same = bounds.project(&feasible);
        assert_abs_diff_eq!((same - feasible).norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_config_defaults_from_json() {
        let config: OptimizerConfig = serde_json::from_str(r#"{ "maxWeight": 0.4 }"#).unwrap();
        assert_eq!(config.max_weight, 0.4);
        assert_eq!(config.min_weight, 0.0);
        assert_eq!(config.frontier_points, 20);
    }
}
