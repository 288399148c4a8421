//! Portfolio risk statistics, drift rebalancing, mean-variance optimization
//! and Monte Carlo projection over in-memory holdings and return series.

pub mod config;
pub mod models;
pub mod monte_carlo;
pub mod optimizer;
pub mod rebalancing;
pub mod risk_metrics;
pub mod shared_math;

pub use config::{MonteCarloConfig, OptimizerConfig, RebalanceConfig, RiskConfig};
pub use models::*;
pub use monte_carlo::simulate;
pub use optimizer::optimize;
pub use rebalancing::{
    estimate_transaction_cost, rebalance_suggestions, rebalance_suggestions_within,
    RebalanceCalculator,
};
pub use risk_metrics::RiskCalculator;
