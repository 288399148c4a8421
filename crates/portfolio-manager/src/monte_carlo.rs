use analysis_core::AnalysisError;
use nalgebra::{Cholesky, DMatrix, DVector};
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use statrs::distribution::Normal;
use statrs::statistics::Statistics;

use crate::config::MonteCarloConfig;
use crate::models::{HoldingReturns, MonteCarloResult, MonteCarloStatistics, PercentilePath};
use crate::risk_metrics::normalized_weights;
use crate::shared_math::percentile_sorted;

/// Project portfolio value forward with correlated normal asset returns.
///
/// Asset returns are drawn as `mean + L z` where `L` is the lower Cholesky
/// factor of the sample covariance and `z` is standard normal. Path `i` is
/// seeded with `config.seed + i`, so output does not depend on how rayon
/// schedules the paths.
pub fn simulate(
    holdings: &[HoldingReturns],
    config: &MonteCarloConfig,
) -> Result<MonteCarloResult, AnalysisError> {
    if config.num_simulations == 0 {
        return Err(AnalysisError::invalid("num_simulations must be positive"));
    }
    if config.horizon_days == 0 {
        return Err(AnalysisError::invalid("horizon_days must be positive"));
    }
    if !(config.initial_capital > 0.0) || !config.initial_capital.is_finite() {
        return Err(AnalysisError::invalid("initial_capital must be positive"));
    }
    if holdings.is_empty() {
        return Err(AnalysisError::invalid("Monte Carlo needs at least one holding"));
    }
    let observations = holdings[0].returns.len();
    if holdings.iter().any(|h| h.returns.len() != observations) {
        return Err(AnalysisError::invalid("holding return series differ in length"));
    }
    if observations < 2 {
        return Err(AnalysisError::invalid(
            "Monte Carlo needs at least two return observations",
        ));
    }

    let n_assets = holdings.len();
    let weights = DVector::from_vec(normalized_weights(holdings));
    let means = DVector::from_iterator(n_assets, holdings.iter().map(|h| h.returns.as_slice().mean()));
    let covariance = DMatrix::from_fn(n_assets, n_assets, |i, j| {
        holdings[i].returns.as_slice().covariance(holdings[j].returns.as_slice())
    });

    let (factor, used_diagonal_fallback) = match Cholesky::new(covariance.clone()) {
        Some(c) => (c.l(), false),
        None => {
            tracing::warn!("Covariance matrix is not positive-definite, using its diagonal");
            let diag = covariance.diagonal().map(|v| v.max(0.0).sqrt());
            (DMatrix::from_diagonal(&diag), true)
        }
    };

    let normal = Normal::new(0.0, 1.0).map_err(|e| AnalysisError::invalid(e.to_string()))?;
    // Daily drift of the weighted portfolio; the shock term is w . (L z)
    let drift = weights.dot(&means);
    let loadings = factor.transpose() * &weights;

    let initial = config.initial_capital;
    let horizon = config.horizon_days;
    let keep_paths = config.sample_paths.min(config.num_simulations);

    // Path `i` is fully determined by its seed, so it can be replayed later
    let run_path = |i: usize, record: bool| -> (f64, Vec<f64>) {
        let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(i as u64));
        let mut path = if record {
            Vec::with_capacity(horizon + 1)
        } else {
            Vec::new()
        };
        let mut value = initial;
        if record {
            path.push(value);
        }
        for _ in 0..horizon {
            let z = DVector::from_iterator(n_assets, (0..n_assets).map(|_| normal.sample(&mut rng)));
            value *= 1.0 + drift + loadings.dot(&z);
            if record {
                path.push(value);
            }
        }
        (value, path)
    };

    let outcomes: Vec<(f64, Vec<f64>)> = (0..config.num_simulations)
        .into_par_iter()
        .map(|i| run_path(i, i < keep_paths))
        .collect();

    let mut finals = Vec::with_capacity(outcomes.len());
    let mut sample_paths = Vec::with_capacity(keep_paths);
    for (i, (final_value, path)) in outcomes.into_iter().enumerate() {
        finals.push(final_value);
        if i < keep_paths {
            sample_paths.push(path);
        }
    }

    let statistics = summarize(&finals, initial);

    let percentile_paths = [
        (5, statistics.percentile_5),
        (25, statistics.percentile_25),
        (50, statistics.median),
        (75, statistics.percentile_75),
        (95, statistics.percentile_95),
    ]
    .into_iter()
    .map(|(percentile, target)| {
        let path_index = nearest_index(&finals, target);
        let (final_value, path) = run_path(path_index, true);
        PercentilePath {
            percentile,
            path_index,
            final_value,
            path,
        }
    })
    .collect();

    tracing::debug!(
        "Monte Carlo: {} paths x {} days, mean={:.2}, median={:.2}",
        config.num_simulations,
        horizon,
        statistics.mean,
        statistics.median
    );

    Ok(MonteCarloResult {
        statistics,
        sample_paths,
        percentile_paths,
        initial_capital: initial,
        horizon_days: horizon,
        num_simulations: config.num_simulations,
        used_diagonal_fallback,
    })
}

/// Index of the first value closest to `target`.
fn nearest_index(values: &[f64], target: f64) -> usize {
    let mut best = 0;
    let mut best_gap = f64::INFINITY;
    for (i, v) in values.iter().enumerate() {
        let gap = (v - target).abs();
        if gap < best_gap {
            best = i;
            best_gap = gap;
        }
    }
    best
}

fn summarize(finals: &[f64], initial: f64) -> MonteCarloStatistics {
    let mut sorted = finals.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let above = finals.iter().filter(|v| **v > initial).count();

    MonteCarloStatistics {
        mean: finals.mean(),
        median: percentile_sorted(&sorted, 50.0),
        std_dev: finals.population_std_dev(),
        min: sorted.first().copied().unwrap_or(0.0),
        max: sorted.last().copied().unwrap_or(0.0),
        percentile_5: percentile_sorted(&sorted, 5.0),
        percentile_25: percentile_sorted(&sorted, 25.0),
        percentile_75: percentile_sorted(&sorted, 75.0),
        percentile_95: percentile_sorted(&sorted, 95.0),
        probability_positive: above as f64 / finals.len() as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn holdings() -> Vec<HoldingReturns> {
        vec![
            HoldingReturns {
                symbol: "SPY".to_string(),
                weight: 60.0,
                returns: vec![0.004, -0.012, 0.009, 0.002, -0.006, 0.011, -0.003, 0.007],
            },
            HoldingReturns {
                symbol: "TLT".to_string(),
                weight: 40.0,
                returns: vec![-0.002, 0.006, -0.004, 0.001, 0.003, -0.005, 0.002, -0.001],
            },
        ]
    }

    fn small_config() -> MonteCarloConfig {
        MonteCarloConfig {
            initial_capital: 10_000.0,
            horizon_days: 30,
            num_simulations: 200,
            seed: 7,
            sample_paths: 5,
        }
    }

    #[test]
    fn test_reproducible_for_seed() {
        let a = simulate(&holdings(), &small_config()).unwrap();
        let b = simulate(&holdings(), &small_config()).unwrap();
        assert_eq!(a, b);

        let other = MonteCarloConfig { seed: 8, ..small_config() };
        assert_ne!(simulate(&holdings(), &other).unwrap().statistics, a.statistics);
    }

    #[test]
    fn test_statistics_are_ordered() {
        let r = simulate(&holdings(), &small_config()).unwrap();
        let s = &r.statistics;
        assert!(!r.used_diagonal_fallback);
        assert!(s.min <= s.percentile_5);
        assert!(s.percentile_5 <= s.percentile_25);
        assert!(s.percentile_25 <= s.median);
        assert!(s.median <= s.percentile_75);
        assert!(s.percentile_75 <= s.percentile_95);
        assert!(s.percentile_95 <= s.max);
        assert!((0.0..=1.0).contains(&s.probability_positive));
    }

    #[test]
    fn test_sample_paths_shape() {
        let r = simulate(&holdings(), &small_config()).unwrap();
        assert_eq!(r.sample_paths.len(), 5);
        for path in &r.sample_paths {
            assert_eq!(path.len(), 31);
            assert_eq!(path[0], 10_000.0);
        }
    }

    #[test]
    fn test_percentile_paths_end_nearest_their_percentile() {
        // Keep every path so the nearest one can be checked directly
        let config = MonteCarloConfig { sample_paths: 200, ..small_config() };
        let r = simulate(&holdings(), &config).unwrap();
        let finals: Vec<f64> = r.sample_paths.iter().map(|p| p[p.len() - 1]).collect();
        assert_eq!(finals.len(), 200);

        let s = &r.statistics;
        let targets = [
            (5, s.percentile_5),
            (25, s.percentile_25),
            (50, s.median),
            (75, s.percentile_75),
            (95, s.percentile_95),
        ];
        assert_eq!(r.percentile_paths.len(), targets.len());
        for (pp, (percentile, target)) in r.percentile_paths.iter().zip(targets) {
            assert_eq!(pp.percentile, percentile);
            assert_eq!(pp.path.len(), 31);
            assert_eq!(pp.path[0], 10_000.0);
            assert_eq!(pp.path[30], pp.final_value);
            // Replayed from its seed, it matches the stored simulation exactly
            assert_eq!(pp.path, r.sample_paths[pp.path_index]);
            let gap = (pp.final_value - target).abs();
            assert!(finals.iter().all(|f| gap <= (f - target).abs()));
        }
        let ends: Vec<f64> = r.percentile_paths.iter().map(|p| p.final_value).collect();
        assert!(ends.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_percentile_paths_without_sample_paths() {
        let config = MonteCarloConfig { sample_paths: 0, ..small_config() };
        let r = simulate(&holdings(), &config).unwrap();
        assert!(r.sample_paths.is_empty());
        assert_eq!(r.percentile_paths.len(), 5);
        assert!(r.percentile_paths.iter().all(|p| p.path.len() == 31));
    }

    #[test]
    fn test_nearest_index_prefers_first() {
        assert_eq!(nearest_index(&[1.0, 3.0, 5.0, 3.0], 3.2), 1);
        assert_eq!(nearest_index(&[1.0, 2.0], 1.5), 0);
    }

    #[test]
    fn test_constant_returns_compound_deterministically() {
        let flat = vec![HoldingReturns {
            symbol: "CASH".to_string(),
            weight: 100.0,
            returns: vec![0.001; 10],
        }];
        let config = MonteCarloConfig { horizon_days: 10, num_simulations: 20, ..small_config() };
        let r = simulate(&flat, &config).unwrap();
        let expected = 10_000.0 * 1.001_f64.powi(10);
        assert_relative_eq!(r.statistics.mean, expected, max_relative = 1e-9);
        assert_relative_eq!(r.statistics.min, r.statistics.max, max_relative = 1e-9);
        assert_eq!(r.statistics.probability_positive, 1.0);
    }

    #[test]
    fn test_zero_covariance_uses_diagonal() {
        let idle = vec![HoldingReturns {
            symbol: "CASH".to_string(),
            weight: 100.0,
            returns: vec![0.0; 5],
        }];
        let r = simulate(&idle, &small_config()).unwrap();
        assert!(r.used_diagonal_fallback);
        assert_eq!(r.statistics.min, 10_000.0);
        assert_eq!(r.statistics.max, 10_000.0);
        assert_eq!(r.statistics.probability_positive, 0.0);
    }

    #[test]
    fn test_invalid_configuration() {
        let h = holdings();
        for bad in [
            MonteCarloConfig { num_simulations: 0, ..small_config() },
            MonteCarloConfig { horizon_days: 0, ..small_config() },
            MonteCarloConfig { initial_capital: 0.0, ..small_config() },
        ] {
            assert!(matches!(simulate(&h, &bad), Err(AnalysisError::InvalidInput(_))));
        }

        let mut short = holdings();
        short[1].returns.truncate(3);
        assert!(simulate(&short, &small_config()).is_err());
        assert!(simulate(&[], &small_config()).is_err());
    }
}
