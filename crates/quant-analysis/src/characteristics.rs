use analysis_core::MetricKey;
use serde::{Deserialize, Serialize};

use crate::clustering::Cluster;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparison {
    Below,
    Above,
}

/// Labels a cluster when its average for `metric` is strictly
/// below/above `threshold`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacteristicRule {
    pub metric: MetricKey,
    pub comparison: Comparison,
    pub threshold: f64,
    pub label: String,
}

impl CharacteristicRule {
    pub fn below(metric: MetricKey, threshold: f64, label: impl Into<String>) -> Self {
        Self {
            metric,
            comparison: Comparison::Below,
            threshold,
            label: label.into(),
        }
    }

    pub fn above(metric: MetricKey, threshold: f64, label: impl Into<String>) -> Self {
        Self {
            metric,
            comparison: Comparison::Above,
            threshold,
            label: label.into(),
        }
    }

    pub fn matches(&self, average: f64) -> bool {
        match self.comparison {
            Comparison::Below => average < self.threshold,
            Comparison::Above => average > self.threshold,
        }
    }
}

pub fn default_rules() -> Vec<CharacteristicRule> {
    vec![
        CharacteristicRule::below(MetricKey::Pe, 15.0, "Low valuation"),
        CharacteristicRule::above(MetricKey::Pe, 30.0, "Premium valuation"),
        CharacteristicRule::below(MetricKey::Pb, 1.5, "Trading near book"),
        CharacteristicRule::above(MetricKey::EpsGrowth, 15.0, "High growth"),
        CharacteristicRule::below(MetricKey::EpsGrowth, 0.0, "Shrinking earnings"),
        CharacteristicRule::above(MetricKey::DividendYield, 3.0, "Income"),
        CharacteristicRule::above(MetricKey::DebtToEquity, 2.0, "Highly leveraged"),
        CharacteristicRule::above(MetricKey::Volatility, 40.0, "High volatility"),
        CharacteristicRule::below(MetricKey::Volatility, 20.0, "Low volatility"),
        CharacteristicRule::above(MetricKey::Rsi, 70.0, "Overbought"),
        CharacteristicRule::below(MetricKey::Rsi, 30.0, "Oversold"),
        CharacteristicRule::above(MetricKey::MarketCap, 200e9, "Mega cap"),
        CharacteristicRule::below(MetricKey::MarketCap, 2e9, "Small cap"),
        CharacteristicRule::above(MetricKey::ShortInterest, 15.0, "Heavily shorted"),
        CharacteristicRule::above(MetricKey::PerformanceScore, 70.0, "Strong performers"),
    ]
}

/// Append the label of every rule that fires on a cluster's averages.
///
/// Rules whose metric was not a clustering feature are skipped.
pub fn describe_clusters(clusters: &mut [Cluster], rules: &[CharacteristicRule]) {
    for cluster in clusters.iter_mut() {
        for rule in rules {
            let Some(&avg) = cluster.averages.get(&rule.metric) else {
                continue;
            };
            if rule.matches(avg) && !cluster.characteristics.contains(&rule.label) {
                cluster.characteristics.push(rule.label.clone());
            }
        }
    }
}
