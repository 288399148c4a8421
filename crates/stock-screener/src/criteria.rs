use std::collections::BTreeMap;

use analysis_core::{MacdSignal, MetricKey};
use serde::{Deserialize, Serialize};

use crate::sentinels::MissingValue;

/// Optional inclusive bounds on one metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bound {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl Bound {
    pub fn min(min: f64) -> Self {
        Self { min: Some(min), max: None }
    }

    pub fn max(max: f64) -> Self {
        Self { min: None, max: Some(max) }
    }

    pub fn between(min: f64, max: f64) -> Self {
        Self { min: Some(min), max: Some(max) }
    }

    pub fn is_unset(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    /// Whether `value` satisfies every populated side. A missing value is
    /// replaced by the sentinel declared for the side being checked.
    pub fn admits(&self, value: Option<f64>, missing: MissingValue) -> bool {
        if let Some(min) = self.min {
            if value.unwrap_or(missing.for_min) < min {
                return false;
            }
        }
        if let Some(max) = self.max {
            if value.unwrap_or(missing.for_max) > max {
                return false;
            }
        }
        true
    }
}

/// Metric bounds within one criteria category.
pub type CategoryRules = BTreeMap<MetricKey, Bound>;

/// How the multi-select pattern filter treats a stock's tags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagMatch {
    /// Selecting patterns does not constrain the result.
    #[default]
    Presence,
    /// The stock must carry at least one selected tag.
    Any,
}

/// Full screening rule set. The default value matches every stock.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenCriteria {
    #[serde(default)]
    pub fundamental: CategoryRules,
    #[serde(default)]
    pub technical: CategoryRules,
    #[serde(default)]
    pub quantitative: CategoryRules,
    #[serde(default)]
    pub macd_signal: Option<MacdSignal>,
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl ScreenCriteria {
    pub fn is_empty(&self) -> bool {
        self.bounds().all(|(_, b)| b.is_unset())
            && self.macd_signal.is_none()
            && self.patterns.is_empty()
    }

    /// All populated bounds across the three categories, in category order.
    pub fn bounds(&self) -> impl Iterator<Item = (MetricKey, &Bound)> {
        self.fundamental
            .iter()
            .chain(self.technical.iter())
            .chain(self.quantitative.iter())
            .map(|(k, b)| (*k, b))
    }

    pub fn with_fundamental(mut self, metric: MetricKey, bound: Bound) -> Self {
        self.fundamental.insert(metric, bound);
        self
    }

    pub fn with_technical(mut self, metric: MetricKey, bound: Bound) -> Self {
        self.technical.insert(metric, bound);
        self
    }

    pub fn with_quantitative(mut self, metric: MetricKey, bound: Bound) -> Self {
        self.quantitative.insert(metric, bound);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ZERO: MissingValue = MissingValue { for_min: 0.0, for_max: 0.0 };
    const HIGH_MAX: MissingValue = MissingValue { for_min: 0.0, for_max: 999.0 };

    #[test]
    fn test_bound_admits_present_values() {
        let b = Bound::between(5.0, 20.0);
        assert!(b.admits(Some(5.0), ZERO));
        assert!(b.admits(Some(20.0), ZERO));
        assert!(!b.admits(Some(4.99), ZERO));
        assert!(!b.admits(Some(20.01), ZERO));
    }

    #[test]
    fn test_bound_uses_side_specific_sentinel() {
        // Missing value fails a positive minimum...
        assert!(!Bound::min(1.0).admits(None, HIGH_MAX));
        // ...and an upper bound when the max sentinel is high.
        assert!(!Bound::max(25.0).admits(None, HIGH_MAX));
        assert!(Bound::max(25.0).admits(None, ZERO));
    }

    #[test]
    fn test_empty_criteria() {
        assert!(ScreenCriteria::default().is_empty());
        let c = ScreenCriteria::default().with_fundamental(MetricKey::Pe, Bound::default());
        assert!(c.is_empty());
        let c = c.with_technical(MetricKey::Rsi, Bound::max(70.0));
        assert!(!c.is_empty());
    }

    #[test]
    fn test_deserialize_criteria() {
        let json = r#"{
            "fundamental": { "pe": { "max": 25 }, "dividendYield": { "min": 2 } },
            "technical": { "rsi": { "min": 30, "max": 70 } },
            "macdSignal": "bullish",
            "patterns": ["breakout"]
        }"#;
        let c: ScreenCriteria = serde_json::from_str(json).unwrap();
        assert_eq!(c.fundamental[&MetricKey::Pe], Bound::max(25.0));
        assert_eq!(c.technical[&MetricKey::Rsi], Bound::between(30.0, 70.0));
        assert!(c.quantitative.is_empty());
        assert_eq!(c.bounds().count(), 3);
    }
}
