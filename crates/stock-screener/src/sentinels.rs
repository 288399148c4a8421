use std::collections::BTreeMap;

use analysis_core::MetricKey;
use serde::{Deserialize, Serialize};

/// Substitute values for a missing metric, one per bound side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingValue {
    pub for_min: f64,
    pub for_max: f64,
}

impl MissingValue {
    pub const fn both(value: f64) -> Self {
        Self { for_min: value, for_max: value }
    }
}

/// Value used for missing upper-bounded valuation/risk metrics ("N/A" fails a max filter).
pub const MISSING_MAX_SENTINEL: f64 = 999.0;

/// Neutral RSI used when the indicator is unavailable.
pub const NEUTRAL_RSI: f64 = 50.0;

/// Per-metric sentinel declarations.
///
/// Metrics absent from the map fall back to `0` for both sides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SentinelTable {
    entries: BTreeMap<MetricKey, MissingValue>,
}

impl SentinelTable {
    pub fn empty() -> Self {
        Self { entries: BTreeMap::new() }
    }

    pub fn get(&self, metric: MetricKey) -> MissingValue {
        self.entries
            .get(&metric)
            .copied()
            .unwrap_or(MissingValue::both(0.0))
    }

    pub fn set(&mut self, metric: MetricKey, missing: MissingValue) {
        self.entries.insert(metric, missing);
    }

    pub fn with(mut self, metric: MetricKey, missing: MissingValue) -> Self {
        self.set(metric, missing);
        self
    }
}

impl Default for SentinelTable {
    fn default() -> Self {
        let mut table = Self::empty();
        for metric in MetricKey::ALL {
            let missing = match metric {
                MetricKey::Pe
                | MetricKey::Pb
                | MetricKey::DebtToEquity
                | MetricKey::Volatility
                | MetricKey::ShortInterest
                | MetricKey::AnalystRating => MissingValue {
                    for_min: 0.0,
                    for_max: MISSING_MAX_SENTINEL,
                },
                MetricKey::Rsi => MissingValue::both(NEUTRAL_RSI),
                _ => MissingValue::both(0.0),
            };
            table.set(metric, missing);
        }
        table
    }
}
