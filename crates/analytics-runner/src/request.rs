use analysis_core::{MetricKey, MetricSelection, Stock};
use chrono::{DateTime, Utc};
use portfolio_manager::{
    Holding, HoldingReturns, MonteCarloResult, OptimizationResult, RebalancePlan,
    RiskMetricsBundle, TargetPolicy,
};
use quant_analysis::{ClusteringResult, CorrelationMatrix, CorrelationPair, HeatmapRow};
use serde::{Deserialize, Serialize};
use stock_screener::{ScreenCriteria, ScreenResult};

use crate::config::RunnerConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClusteringRequest {
    pub features: Vec<MetricKey>,
    /// Defaults to the recommended k for the screened population
    pub k: Option<usize>,
}

/// One analytics run. Engines whose inputs are absent are skipped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalyticsRequest {
    pub config: RunnerConfig,
    pub stocks: Vec<Stock>,
    pub criteria: Option<ScreenCriteria>,
    pub selection: Option<MetricSelection>,
    pub clustering: Option<ClusteringRequest>,
    pub holdings: Vec<Holding>,
    pub returns: Vec<HoldingReturns>,
    pub benchmark: Option<Vec<f64>>,
    pub targets: Option<TargetPolicy>,
    pub total_value: Option<f64>,
    /// Run the Monte Carlo projection over `returns`
    pub monte_carlo: bool,
    /// Run the mean-variance optimizer over `returns`
    pub optimize: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineFailure {
    pub engine: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub generated_at: DateTime<Utc>,
    pub screen: Option<ScreenResult>,
    pub heatmap: Option<Vec<HeatmapRow>>,
    pub correlation_matrix: Option<CorrelationMatrix>,
    pub strongest_correlations: Option<Vec<CorrelationPair>>,
    pub clustering: Option<ClusteringResult>,
    pub risk: Option<RiskMetricsBundle>,
    pub rebalance: Option<RebalancePlan>,
    pub monte_carlo: Option<MonteCarloResult>,
    pub optimization: Option<OptimizationResult>,
    pub failures: Vec<EngineFailure>,
}

impl AnalyticsReport {
    pub fn new() -> Self {
        Self {
            generated_at: Utc::now(),
            screen: None,
            heatmap: None,
            correlation_matrix: None,
            strongest_correlations: None,
            clustering: None,
            risk: None,
            rebalance: None,
            monte_carlo: None,
            optimization: None,
            failures: Vec::new(),
        }
    }
}
