use analysis_core::{MacdSignal, Stock};
use serde::{Deserialize, Serialize};

use crate::criteria::{ScreenCriteria, TagMatch};
use crate::sentinels::SentinelTable;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenerConfig {
    #[serde(default)]
    pub sentinels: SentinelTable,
    #[serde(default)]
    pub tag_match: TagMatch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenResult {
    pub matches: Vec<Stock>,
    pub total_screened: usize,
    pub total_passed: usize,
}

pub struct StockScreener {
    config: ScreenerConfig,
}

impl Default for StockScreener {
    fn default() -> Self {
        Self::new(ScreenerConfig::default())
    }
}

impl StockScreener {
    pub fn new(config: ScreenerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScreenerConfig {
        &self.config
    }

    /// Return the stocks that satisfy every populated rule, in input order.
    pub fn screen(&self, stocks: &[Stock], criteria: &ScreenCriteria) -> ScreenResult {
        let total_screened = stocks.len();

        let matches: Vec<Stock> = if criteria.is_empty() {
            stocks.to_vec()
        } else {
            stocks
                .iter()
                .filter(|s| self.passes(s, criteria))
                .cloned()
                .collect()
        };

        let total_passed = matches.len();
        tracing::debug!(
            "Screen complete: {}/{} stocks passed filters",
            total_passed,
            total_screened
        );

        ScreenResult {
            matches,
            total_screened,
            total_passed,
        }
    }

    /// Evaluate one stock against the rule set.
    pub fn passes(&self, stock: &Stock, criteria: &ScreenCriteria) -> bool {
        let bounds_ok = criteria.bounds().all(|(metric, bound)| {
            bound.admits(stock.metric(metric), self.config.sentinels.get(metric))
        });
        if !bounds_ok {
            return false;
        }

        match criteria.macd_signal {
            None | Some(MacdSignal::Neutral) => {}
            Some(wanted) => {
                if stock.macd_signal != Some(wanted) {
                    return false;
                }
            }
        }

        if criteria.patterns.is_empty() {
            return true;
        }
        match self.config.tag_match {
            TagMatch::Presence => true,
            TagMatch::Any => criteria
                .patterns
                .iter()
                .any(|p| stock.patterns.iter().any(|t| t.eq_ignore_ascii_case(p))),
        }
    }
}

/// Screen with the default sentinel table and presence-only tag matching.
pub fn screen(stocks: &[Stock], criteria: &ScreenCriteria) -> Vec<Stock> {
    StockScreener::default().screen(stocks, criteria).matches
}
