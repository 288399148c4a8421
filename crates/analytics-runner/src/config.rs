use portfolio_manager::{MonteCarloConfig, OptimizerConfig, RebalanceConfig, RiskConfig};
use quant_analysis::{CharacteristicRule, ClusteringLimits, KMeansConfig};
use serde::{Deserialize, Serialize};
use stock_screener::ScreenerConfig;

const DEFAULT_TOP_CORRELATIONS: usize = 10;

/// Every engine's configuration, read from the `config` block of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RunnerConfig {
    pub screener: ScreenerConfig,
    pub kmeans: KMeansConfig,
    pub clustering_limits: ClusteringLimits,
    /// Replaces the built-in characteristic table when present
    pub characteristic_rules: Option<Vec<CharacteristicRule>>,
    pub risk: RiskConfig,
    pub rebalance: RebalanceConfig,
    pub monte_carlo: MonteCarloConfig,
    pub optimizer: OptimizerConfig,
    /// How many of the strongest correlation pairs to report
    pub top_correlations: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            screener: ScreenerConfig::default(),
            kmeans: KMeansConfig::default(),
            clustering_limits: ClusteringLimits::default(),
            characteristic_rules: None,
            risk: RiskConfig::default(),
            rebalance: RebalanceConfig::default(),
            monte_carlo: MonteCarloConfig::default(),
            optimizer: OptimizerConfig::default(),
            top_correlations: DEFAULT_TOP_CORRELATIONS,
        }
    }
}

impl RunnerConfig {
    pub fn rules(&self) -> Vec<CharacteristicRule> {
        self.characteristic_rules
            .clone()
            .unwrap_or_else(quant_analysis::default_rules)
    }
}
