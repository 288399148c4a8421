use serde::{Deserialize, Serialize};

use crate::metrics::MetricKey;

/// MACD crossover state reported by the upstream technicals feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MacdSignal {
    Bullish,
    Bearish,
    Neutral,
}

impl MacdSignal {
    pub fn to_label(&self) -> &'static str {
        match self {
            MacdSignal::Bullish => "bullish",
            MacdSignal::Bearish => "bearish",
            MacdSignal::Neutral => "neutral",
        }
    }
}

/// Per-stock record consumed by every engine.
///
/// Any metric may be absent. Records are produced by the data-fetch layer
/// and are never mutated here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stock {
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sector: String,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub change_percent: Option<f64>,
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub pe: Option<f64>,
    #[serde(default)]
    pub pb: Option<f64>,
    #[serde(default)]
    pub dividend_yield: Option<f64>,
    #[serde(default)]
    pub eps_growth: Option<f64>,
    #[serde(default)]
    pub debt_to_equity: Option<f64>,
    #[serde(default)]
    pub rsi: Option<f64>,
    #[serde(default)]
    pub macd_signal: Option<MacdSignal>,
    #[serde(default)]
    pub volatility: Option<f64>,
    /// 1 = strong buy .. 5 = strong sell
    #[serde(default)]
    pub analyst_rating: Option<f64>,
    #[serde(default)]
    pub earnings_surprise: Option<f64>,
    #[serde(default)]
    pub short_interest: Option<f64>,
    #[serde(default)]
    pub insider_ownership: Option<f64>,
    #[serde(default)]
    pub institutional_ownership: Option<f64>,
    #[serde(default)]
    pub performance_score: Option<f64>,
    /// Chart-pattern tags (e.g. "cup-and-handle")
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl Stock {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Default::default()
        }
    }

    /// Look up a numeric metric by key.
    pub fn metric(&self, key: MetricKey) -> Option<f64> {
        match key {
            MetricKey::Price => self.price,
            MetricKey::ChangePercent => self.change_percent,
            MetricKey::Volume => self.volume,
            MetricKey::MarketCap => self.market_cap,
            MetricKey::Pe => self.pe,
            MetricKey::Pb => self.pb,
            MetricKey::DividendYield => self.dividend_yield,
            MetricKey::EpsGrowth => self.eps_growth,
            MetricKey::DebtToEquity => self.debt_to_equity,
            MetricKey::Rsi => self.rsi,
            MetricKey::Volatility => self.volatility,
            MetricKey::AnalystRating => self.analyst_rating,
            MetricKey::EarningsSurprise => self.earnings_surprise,
            MetricKey::ShortInterest => self.short_interest,
            MetricKey::InsiderOwnership => self.insider_ownership,
            MetricKey::InstitutionalOwnership => self.institutional_ownership,
            MetricKey::PerformanceScore => self.performance_score,
        }
    }

    /// Metric value with null coerced to zero, as used by the correlation
    /// and clustering vectors.
    pub fn metric_or_zero(&self, key: MetricKey) -> f64 {
        self.metric(key).unwrap_or(0.0)
    }

    /// Builder-style setter, mostly for fixtures.
    pub fn with_metric(mut self, key: MetricKey, value: f64) -> Self {
        let slot = match key {
            MetricKey::Price => &mut self.price,
            MetricKey::ChangePercent => &mut self.change_percent,
            MetricKey::Volume => &mut self.volume,
            MetricKey::MarketCap => &mut self.market_cap,
            MetricKey::Pe => &mut self.pe,
            MetricKey::Pb => &mut self.pb,
            MetricKey::DividendYield => &mut self.dividend_yield,
            MetricKey::EpsGrowth => &mut self.eps_growth,
            MetricKey::DebtToEquity => &mut self.debt_to_equity,
            MetricKey::Rsi => &mut self.rsi,
            MetricKey::Volatility => &mut self.volatility,
            MetricKey::AnalystRating => &mut self.analyst_rating,
            MetricKey::EarningsSurprise => &mut self.earnings_surprise,
            MetricKey::ShortInterest => &mut self.short_interest,
            MetricKey::InsiderOwnership => &mut self.insider_ownership,
            MetricKey::InstitutionalOwnership => &mut self.institutional_ownership,
            MetricKey::PerformanceScore => &mut self.performance_score,
        };
        *slot = Some(value);
        self
    }
}
