use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Numeric metrics carried on a [`Stock`](crate::Stock).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricKey {
    Price,
    ChangePercent,
    Volume,
    MarketCap,
    Pe,
    Pb,
    DividendYield,
    EpsGrowth,
    DebtToEquity,
    Rsi,
    Volatility,
    AnalystRating,
    EarningsSurprise,
    ShortInterest,
    InsiderOwnership,
    InstitutionalOwnership,
    PerformanceScore,
}

impl MetricKey {
    pub const ALL: [MetricKey; 17] = [
        MetricKey::Price,
        MetricKey::ChangePercent,
        MetricKey::Volume,
        MetricKey::MarketCap,
        MetricKey::Pe,
        MetricKey::Pb,
        MetricKey::DividendYield,
        MetricKey::EpsGrowth,
        MetricKey::DebtToEquity,
        MetricKey::Rsi,
        MetricKey::Volatility,
        MetricKey::AnalystRating,
        MetricKey::EarningsSurprise,
        MetricKey::ShortInterest,
        MetricKey::InsiderOwnership,
        MetricKey::InstitutionalOwnership,
        MetricKey::PerformanceScore,
    ];

    /// Wire name (camelCase)
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKey::Price => "price",
            MetricKey::ChangePercent => "changePercent",
            MetricKey::Volume => "volume",
            MetricKey::MarketCap => "marketCap",
            MetricKey::Pe => "pe",
            MetricKey::Pb => "pb",
            MetricKey::DividendYield => "dividendYield",
            MetricKey::EpsGrowth => "epsGrowth",
            MetricKey::DebtToEquity => "debtToEquity",
            MetricKey::Rsi => "rsi",
            MetricKey::Volatility => "volatility",
            MetricKey::AnalystRating => "analystRating",
            MetricKey::EarningsSurprise => "earningsSurprise",
            MetricKey::ShortInterest => "shortInterest",
            MetricKey::InsiderOwnership => "insiderOwnership",
            MetricKey::InstitutionalOwnership => "institutionalOwnership",
            MetricKey::PerformanceScore => "performanceScore",
        }
    }

    /// Default "lower is better" convention for heatmap ranking.
    pub fn lower_is_better(&self) -> bool {
        matches!(
            self,
            MetricKey::Pe
                | MetricKey::Pb
                | MetricKey::DebtToEquity
                | MetricKey::Volatility
                | MetricKey::AnalystRating
                | MetricKey::ShortInterest
        )
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKey {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricKey::ALL
            .iter()
            .copied()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| AnalysisError::invalid(format!("unknown metric '{}'", s)))
    }
}

/// One entry of a metric selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedMetric {
    pub metric: MetricKey,
    /// Lower raw values rank higher when set
    #[serde(default)]
    pub reversed: bool,
}

/// Ordered list of metrics chosen at call time, shared by the heatmap and
/// correlation/clustering engines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricSelection {
    pub metrics: Vec<SelectedMetric>,
}

impl MetricSelection {
    pub fn new(metrics: Vec<SelectedMetric>) -> Self {
        Self { metrics }
    }

    /// Selection using each metric's default reversed flag.
    pub fn with_defaults(keys: &[MetricKey]) -> Self {
        Self {
            metrics: keys
                .iter()
                .map(|&metric| SelectedMetric {
                    metric,
                    reversed: metric.lower_is_better(),
                })
                .collect(),
        }
    }

    pub fn keys(&self) -> Vec<MetricKey> {
        self.metrics.iter().map(|m| m.metric).collect()
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trips_wire_names() {
        for key in MetricKey::ALL {
            assert_eq!(key.as_str().parse::<MetricKey>().unwrap(), key);
        }
        assert_eq!("DIVIDENDYIELD".parse::<MetricKey>().unwrap(), MetricKey::DividendYield);
        assert!("ebitda".parse::<MetricKey>().is_err());
    }

    #[test]
    fn test_serde_name_matches_as_str() {
        let json = serde_json::to_string(&MetricKey::DebtToEquity).unwrap();
        assert_eq!(json, "\"debtToEquity\"");
    }

    #[test]
    fn test_selection_defaults() {
        let sel = MetricSelection::with_defaults(&[MetricKey::Pe, MetricKey::EpsGrowth]);
        assert!(sel.metrics[0].reversed);
        assert!(!sel.metrics[1].reversed);
        assert_eq!(sel.keys(), vec![MetricKey::Pe, MetricKey::EpsGrowth]);
    }
}
