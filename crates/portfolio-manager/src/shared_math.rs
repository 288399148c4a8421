//! Stateless return-series math shared by the risk, rebalancing and Monte
//! Carlo calculators. Inputs are per-period returns as fractions.

use statrs::statistics::Statistics;

/// Below this a variance is treated as zero.
const VARIANCE_EPSILON: f64 = 1e-15;

/// Rounding noise left in the std of a constant series.
const STD_EPSILON: f64 = 1e-12;

/// Absorbs representation error in `(1 - c) * n` (e.g. `0.1 * 10 = 0.99..`).
const INDEX_EPSILON: f64 = 1e-9;

/// Weighted sum of aligned return series. `weights` are fractions summing to 1.
pub fn weighted_returns(series: &[&[f64]], weights: &[f64]) -> Vec<f64> {
    let len = series.first().map(|s| s.len()).unwrap_or(0);
    (0..len)
        .map(|t| {
            series
                .iter()
                .zip(weights.iter())
                .map(|(s, w)| s[t] * w)
                .sum()
        })
        .collect()
}

/// Sample standard deviation scaled by `sqrt(periods_per_year)`; 0 below two points.
pub fn annualized_volatility(returns: &[f64], periods_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let sd = returns.std_dev();
    if sd.is_finite() && sd > STD_EPSILON {
        sd * periods_per_year.sqrt()
    } else {
        0.0
    }
}

pub fn annualized_return(returns: &[f64], periods_per_year: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    returns.mean() * periods_per_year
}

/// Compounded return over the whole series.
pub fn total_return(returns: &[f64]) -> f64 {
    returns.iter().map(|r| 1.0 + r).product::<f64>() - 1.0
}

/// `(annualized mean - rf) / volatility`, 0 when volatility is 0.
pub fn sharpe_ratio(returns: &[f64], rf_annual: f64, periods_per_year: f64) -> f64 {
    let vol = annualized_volatility(returns, periods_per_year);
    if vol == 0.0 {
        return 0.0;
    }
    (annualized_return(returns, periods_per_year) - rf_annual) / vol
}

/// Sample std of the negative returns, annualized. 0 with fewer than two losses.
pub fn downside_deviation(returns: &[f64], periods_per_year: f64) -> f64 {
    let losses: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    annualized_volatility(&losses, periods_per_year)
}

pub fn sortino_ratio(returns: &[f64], rf_annual: f64, periods_per_year: f64) -> f64 {
    let downside = downside_deviation(returns, periods_per_year);
    if downside == 0.0 {
        return 0.0;
    }
    (annualized_return(returns, periods_per_year) - rf_annual) / downside
}

/// Cumulative value curve starting at 1.0.
pub fn equity_curve(returns: &[f64]) -> Vec<f64> {
    let mut curve = Vec::with_capacity(returns.len() + 1);
    let mut value = 1.0;
    curve.push(value);
    for r in returns {
        value *= 1.0 + r;
        curve.push(value);
    }
    curve
}

/// Largest peak-to-trough decline of a value series, as a positive fraction.
pub fn max_drawdown(values: &[f64]) -> f64 {
    let Some(&first) = values.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;
    for &v in values {
        if v > peak {
            peak = v;
        }
        if peak > 0.0 {
            let dd = (peak - v) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

fn sorted_ascending(returns: &[f64]) -> Vec<f64> {
    let mut sorted = returns.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    sorted
}

fn tail_index(n: usize, confidence: f64) -> usize {
    let idx = ((1.0 - confidence) * n as f64 + INDEX_EPSILON).floor() as usize;
    idx.min(n.saturating_sub(1))
}

/// Historical VaR: the return at index `floor((1 - c) * n)` of the ascending
/// sort, reported as a positive loss. A tail quantile that is a gain gives 0.
pub fn var_historical(returns: &[f64], confidence: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let sorted = sorted_ascending(returns);
    let q = sorted[tail_index(sorted.len(), confidence)];
    (-q).max(0.0)
}

/// Historical CVaR: mean of every return at or below the VaR index, as a
/// positive loss.
pub fn cvar_historical(returns: &[f64], confidence: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let sorted = sorted_ascending(returns);
    let tail = &sorted[..=tail_index(sorted.len(), confidence)];
    let mean = tail.iter().sum::<f64>() / tail.len() as f64;
    (-mean).max(0.0)
}

/// Sample covariance over sample benchmark variance; `None` when the
/// benchmark has no variance.
pub fn beta(returns: &[f64], benchmark: &[f64]) -> Option<f64> {
    let n = returns.len().min(benchmark.len());
    if n < 2 {
        return None;
    }
    let (y, x) = (&returns[..n], &benchmark[..n]);
    let var = x.variance();
    if !var.is_finite() || var < VARIANCE_EPSILON {
        return None;
    }
    let cov = y.covariance(x);
    cov.is_finite().then(|| cov / var)
}

/// Herfindahl index from weights on the 0-1 scale. Higher = more concentrated.
pub fn herfindahl_index(weights: &[f64]) -> f64 {
    weights.iter().map(|w| w * w).sum()
}

/// `(1 - HHI) * 100`; 0 for one holding, `100 (1 - 1/n)` for n equal weights.
pub fn diversification_score(weights: &[f64]) -> f64 {
    if weights.is_empty() {
        return 0.0;
    }
    ((1.0 - herfindahl_index(weights)) * 100.0).clamp(0.0, 100.0)
}

/// Linear-interpolated percentile (`p` in 0-100) of an ascending slice.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_weighted_returns() {
        let a = [0.01, 0.02];
        let b = [0.03, -0.02];
        let combined = weighted_returns(&[&a, &b], &[0.5, 0.5]);
        assert_abs_diff_eq!(combined[0], 0.02, epsilon = 1e-12);
        assert_abs_diff_eq!(combined[1], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sharpe_ratio() {
        let returns = vec![0.01, 0.02, -0.01, 0.015, 0.005, -0.005, 0.01, 0.02, -0.01, 0.015];
        let sharpe = sharpe_ratio(&returns, 0.0, 252.0);
        let expected = returns.clone().mean() * 252.0 / (returns.clone().std_dev() * 252.0_f64.sqrt());
        assert_abs_diff_eq!(sharpe, expected, epsilon = 1e-12);
        assert!(sharpe > 0.0);
    }

    #[test]
    fn test_constant_series_has_zero_sharpe() {
        let returns = vec![0.001; 20];
        assert_eq!(sharpe_ratio(&returns, 0.0, 252.0), 0.0);
        assert_eq!(annualized_volatility(&returns, 252.0), 0.0);
    }

    #[test]
    fn test_max_drawdown() {
        let values = vec![100.0, 110.0, 105.0, 95.0, 100.0, 115.0, 108.0];
        // Peak 110, trough 95
        assert_abs_diff_eq!(max_drawdown(&values), 15.0 / 110.0, epsilon = 1e-12);
        assert_eq!(max_drawdown(&[]), 0.0);
    }

    #[test]
    fn test_drawdown_counts_from_initial_value() {
        // First period is already a loss from the 1.0 start
        let curve = equity_curve(&[-0.1, 0.05]);
        assert_abs_diff_eq!(max_drawdown(&curve), 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_var_and_cvar() {
        let returns = vec![-0.05, -0.03, -0.01, 0.0, 0.01, 0.02, 0.03, 0.04, 0.05, 0.06];
        // idx floor(0.05 * 10) = 0 -> -0.05
        assert_abs_diff_eq!(var_historical(&returns, 0.95), 0.05, epsilon = 1e-12);
        // idx floor(0.1 * 10) = 1 -> -0.03, tail mean -0.04
        assert_abs_diff_eq!(var_historical(&returns, 0.90), 0.03, epsilon = 1e-12);
        assert_abs_diff_eq!(cvar_historical(&returns, 0.90), 0.04, epsilon = 1e-12);
        assert!(var_historical(&returns, 0.99) >= var_historical(&returns, 0.95));
    }

    #[test]
    fn test_var_of_all_gains_is_zero() {
        let returns = vec![0.01, 0.02, 0.03];
        assert_eq!(var_historical(&returns, 0.95), 0.0);
        assert_eq!(cvar_historical(&returns, 0.95), 0.0);
    }

    #[test]
    fn test_beta() {
        let bench = vec![0.01, -0.02, 0.015, 0.005, -0.01];
        let doubled: Vec<f64> = bench.iter().map(|r| r * 2.0).collect();
        assert_abs_diff_eq!(beta(&doubled, &bench).unwrap(), 2.0, epsilon = 1e-9);
        assert!(beta(&doubled, &[0.01; 5]).is_none());
    }

    #[test]
    fn test_downside_deviation() {
        assert_eq!(downside_deviation(&[0.01, -0.02, 0.03], 252.0), 0.0);
        let dd = downside_deviation(&[0.01, -0.02, 0.03, -0.04], 252.0);
        // std of [-0.02, -0.04] = 0.0141421..
        assert_abs_diff_eq!(dd, 0.02_f64.sqrt() / 10.0 * 252.0_f64.sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn test_herfindahl_and_diversification() {
        let weights = vec![0.25, 0.25, 0.25, 0.25];
        assert_abs_diff_eq!(herfindahl_index(&weights), 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(diversification_score(&weights), 75.0, epsilon = 1e-9);
        assert_abs_diff_eq!(diversification_score(&[1.0]), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_percentile_sorted() {
        let sorted = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_abs_diff_eq!(percentile_sorted(&sorted, 50.0), 3.0);
        assert_abs_diff_eq!(percentile_sorted(&sorted, 25.0), 2.0);
        assert_abs_diff_eq!(percentile_sorted(&sorted, 5.0), 1.2, epsilon = 1e-12);
        assert_eq!(percentile_sorted(&[], 50.0), 0.0);
    }
}
