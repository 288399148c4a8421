use std::sync::Arc;

use analysis_core::{AnalysisError, MetricKey, Stock};
use portfolio_manager::{
    MonteCarloResult, OptimizationResult, RebalanceCalculator, RebalancePlan, RiskCalculator,
    RiskMetricsBundle, TargetPolicy,
};
use quant_analysis::{ClusteringResult, CorrelationMatrix, CorrelationPair, HeatmapRow};
use stock_screener::StockScreener;
use tokio::task::JoinSet;

use crate::request::{AnalyticsReport, AnalyticsRequest, EngineFailure};

enum EngineOutput {
    Heatmap(Vec<HeatmapRow>),
    Correlation(CorrelationMatrix, Vec<CorrelationPair>),
    Clustering(Result<ClusteringResult, AnalysisError>),
    Risk(Result<RiskMetricsBundle, AnalysisError>),
    Rebalance(Result<RebalancePlan, AnalysisError>),
    MonteCarlo(Result<MonteCarloResult, AnalysisError>),
    Optimization(Result<OptimizationResult, AnalysisError>),
}

/// Screen the universe, then fan the independent engines out onto the
/// blocking pool and gather their outputs into one report.
pub async fn run(request: AnalyticsRequest) -> AnalyticsReport {
    let mut report = AnalyticsReport::new();
    let config = Arc::new(request.config);

    // Screening narrows the universe the cross-sectional engines see
    let universe: Arc<Vec<Stock>> = match &request.criteria {
        Some(criteria) => {
            let result = StockScreener::new(config.screener.clone()).screen(&request.stocks, criteria);
            tracing::info!(
                "Screened {} stocks, {} passed",
                result.total_screened,
                result.total_passed
            );
            let matches = Arc::new(result.matches.clone());
            report.screen = Some(result);
            matches
        }
        None => Arc::new(request.stocks),
    };

    let mut set: JoinSet<EngineOutput> = JoinSet::new();

    if let Some(selection) = request.selection.clone() {
        let stocks = Arc::clone(&universe);
        let metrics = selection.keys();
        set.spawn_blocking(move || {
            let rows = quant_analysis::rank_by_score(quant_analysis::heatmap(&stocks, &selection));
            EngineOutput::Heatmap(rows)
        });

        if metrics.len() >= 2 {
            let stocks = Arc::clone(&universe);
            let top = config.top_correlations;
            set.spawn_blocking(move || {
                let pairs = quant_analysis::correlation_matrix(&stocks, &metrics);
                let matrix = quant_analysis::full_matrix(&stocks, &metrics);
                EngineOutput::Correlation(matrix, quant_analysis::strongest(&pairs, top))
            });
        }
    }

    if let Some(clustering) = request.clustering.clone() {
        let n = universe.len();
        let k = clustering
            .k
            .unwrap_or_else(|| config.clustering_limits.recommended_k(n));
        if config.clustering_limits.should_cluster(n) && k > 0 {
            let stocks = Arc::clone(&universe);
            let cfg = Arc::clone(&config);
            set.spawn_blocking(move || {
                EngineOutput::Clustering(cluster(&stocks, &clustering.features, k, &cfg))
            });
        } else {
            tracing::info!("Skipping clustering: {} stocks is below the minimum population", n);
        }
    }

    if !request.returns.is_empty() {
        let returns = Arc::new(request.returns);
        let benchmark = request.benchmark;
        let holdings = Arc::clone(&returns);
        let cfg = Arc::clone(&config);
        set.spawn_blocking(move || {
            EngineOutput::Risk(RiskCalculator::compute(&holdings, benchmark.as_deref(), &cfg.risk))
        });

        if request.monte_carlo {
            let holdings = Arc::clone(&returns);
            let cfg = Arc::clone(&config);
            set.spawn_blocking(move || {
                EngineOutput::MonteCarlo(portfolio_manager::simulate(&holdings, &cfg.monte_carlo))
            });
        }

        if request.optimize {
            let holdings = Arc::clone(&returns);
            let cfg = Arc::clone(&config);
            set.spawn_blocking(move || {
                EngineOutput::Optimization(portfolio_manager::optimize(&holdings, &cfg.optimizer))
            });
        }
    }

    if !request.holdings.is_empty() {
        match request.total_value {
            Some(total_value) => {
                let holdings = request.holdings;
                let policy = request.targets.unwrap_or(TargetPolicy::Holdings);
                let cfg = Arc::clone(&config);
                set.spawn_blocking(move || {
                    EngineOutput::Rebalance(RebalanceCalculator::plan(
                        &holdings,
                        &policy,
                        total_value,
                        &cfg.rebalance,
                    ))
                });
            }
            None => tracing::info!("Skipping rebalance: request has holdings but no totalValue"),
        }
    }

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(output) => absorb(&mut report, output),
            Err(e) => {
                tracing::error!("Engine task failed: {}", e);
                report.failures.push(EngineFailure {
                    engine: "task".to_string(),
                    message: e.to_string(),
                });
            }
        }
    }

    report
}

fn cluster(
    stocks: &[Stock],
    features: &[MetricKey],
    k: usize,
    config: &crate::config::RunnerConfig,
) -> Result<ClusteringResult, AnalysisError> {
    let mut result = quant_analysis::kmeans(stocks, features, k, &config.kmeans)?;
    quant_analysis::describe_clusters(&mut result.clusters, &config.rules());
    Ok(result)
}

fn absorb(report: &mut AnalyticsReport, output: EngineOutput) {
    match output {
        EngineOutput::Heatmap(rows) => report.heatmap = Some(rows),
        EngineOutput::Correlation(matrix, top) => {
            report.correlation_matrix = Some(matrix);
            report.strongest_correlations = Some(top);
        }
        EngineOutput::Clustering(r) => record(report, "clustering", r, |rep, v| rep.clustering = Some(v)),
        EngineOutput::Risk(r) => record(report, "risk", r, |rep, v| rep.risk = Some(v)),
        EngineOutput::Rebalance(r) => record(report, "rebalance", r, |rep, v| rep.rebalance = Some(v)),
        EngineOutput::MonteCarlo(r) => {
            record(report, "monteCarlo", r, |rep, v| rep.monte_carlo = Some(v))
        }
        EngineOutput::Optimization(r) => {
            record(report, "optimizer", r, |rep, v| rep.optimization = Some(v))
        }
    }
}

fn record<T>(
    report: &mut AnalyticsReport,
    engine: &str,
    result: Result<T, AnalysisError>,
    store: impl FnOnce(&mut AnalyticsReport, T),
) {
    match result {
        Ok(value) => store(report, value),
        Err(e) => {
            tracing::warn!("{} rejected its input: {}", engine, e);
            report.failures.push(EngineFailure {
                engine: engine.to_string(),
                message: e.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::MetricSelection;
    use portfolio_manager::{Holding, HoldingReturns, TradeAction};
    use stock_screener::{Bound, ScreenCriteria};

    use crate::request::ClusteringRequest;

    fn universe() -> Vec<Stock> {
        (0..12)
            .map(|i| {
                let f = i as f64;
                Stock::new(format!("S{:02}", i))
                    .with_metric(MetricKey::Pe, 8.0 + f * 3.0)
                    .with_metric(MetricKey::EpsGrowth, f * 2.5)
                    .with_metric(MetricKey::DividendYield, 4.0 - f * 0.3)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_full_request() {
        let request = AnalyticsRequest {
            stocks: universe(),
            criteria: Some(ScreenCriteria::default().with_fundamental(MetricKey::Pe, Bound::max(100.0))),
            selection: Some(MetricSelection::with_defaults(&[MetricKey::Pe, MetricKey::EpsGrowth])),
            clustering: Some(ClusteringRequest {
                features: vec![MetricKey::Pe, MetricKey::EpsGrowth],
                k: None,
            }),
            holdings: vec![
                Holding { symbol: "A".into(), quantity: 10.0, current_weight: 60.0, target_weight: 50.0 },
                Holding { symbol: "B".into(), quantity: 10.0, current_weight: 40.0, target_weight: 50.0 },
            ],
            returns: vec![HoldingReturns {
                symbol: "A".into(),
                weight: 100.0,
                returns: vec![0.01, -0.02, 0.03, -0.01, 0.02],
            }],
            total_value: Some(10_000.0),
            ..Default::default()
        };

        let report = run(request).await;
        assert!(report.failures.is_empty());
        assert_eq!(report.screen.as_ref().map(|s| s.total_passed), Some(12));
        assert_eq!(report.heatmap.as_ref().map(|h| h.len()), Some(12));
        assert!(report.correlation_matrix.is_some());
        // 12 stocks -> k = 2
        assert_eq!(report.clustering.as_ref().map(|c| c.k), Some(2));
        assert!(report.risk.is_some());
        assert!(report.monte_carlo.is_none());

        let plan = report.rebalance.unwrap();
        assert_eq!(plan.suggestions[0].action, TradeAction::Sell);
        assert_eq!(plan.suggestions[1].action, TradeAction::Buy);
    }

    #[tokio::test]
    async fn test_optimizer_and_monte_carlo() {
        let request = AnalyticsRequest {
            returns: vec![
                HoldingReturns {
                    symbol: "A".into(),
                    weight: 50.0,
                    returns: vec![0.011, -0.009, 0.011, -0.009],
                },
                HoldingReturns {
                    symbol: "B".into(),
                    weight: 50.0,
                    returns: vec![0.0055, 0.0055, -0.0045, -0.0045],
                },
            ],
            monte_carlo: true,
            optimize: true,
            ..Default::default()
        };
        let report = run(request).await;
        assert!(report.failures.is_empty());
        assert!(report.risk.is_some());
        assert_eq!(report.monte_carlo.map(|m| m.percentile_paths.len()), Some(5));

        let opt = report.optimization.unwrap();
        let total: f64 = opt.max_sharpe.weights.iter().map(|w| w.weight).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert_eq!(opt.efficient_frontier.len(), 20);
    }

    #[tokio::test]
    async fn test_small_universe_skips_clustering() {
        let request = AnalyticsRequest {
            stocks: universe().into_iter().take(4).collect(),
            clustering: Some(ClusteringRequest {
                features: vec![MetricKey::Pe],
                k: None,
            }),
            ..Default::default()
        };
        let report = run(request).await;
        assert!(report.clustering.is_none());
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn test_engine_errors_are_reported() {
        let request = AnalyticsRequest {
            holdings: vec![Holding {
                symbol: "A".into(),
                quantity: 1.0,
                current_weight: 80.0,
                target_weight: 80.0,
            }],
            total_value: Some(1000.0),
            ..Default::default()
        };
        let report = run(request).await;
        assert!(report.rebalance.is_none());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].engine, "rebalance");
    }

    #[tokio::test]
    async fn test_rebalance_skipped_without_total_value() {
        let request = AnalyticsRequest {
            holdings: vec![
                Holding { symbol: "A".into(), quantity: 10.0, current_weight: 60.0, target_weight: 50.0 },
                Holding { symbol: "B".into(), quantity: 10.0, current_weight: 40.0, target_weight: 50.0 },
            ],
            total_value: None,
            ..Default::default()
        };
        let report = run(request).await;
        assert!(report.rebalance.is_none());
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn test_request_from_json() {
        let json = r#"{
            "config": { "rebalance": { "driftTolerance": 5.0 } },
            "stocks": [{ "symbol": "AAPL", "name": "Apple", "sector": "Technology", "pe": 28.0 }],
            "selection": [{ "metric": "pe", "reversed": true }]
        }"#;
        let request: AnalyticsRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.config.rebalance.drift_tolerance, 5.0);
        let report = run(request).await;
        let rows = report.heatmap.unwrap();
        assert_eq!(rows[0].cells[0].percentile, Some(50.0));
    }
}
