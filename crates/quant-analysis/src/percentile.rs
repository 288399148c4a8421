use std::collections::HashMap;

use analysis_core::{MetricKey, MetricSelection, Stock};
use serde::{Deserialize, Serialize};

/// Percentile given to the only member of a one-value population.
const SINGLE_VALUE_PERCENTILE: f64 = 50.0;

/// Percentile rank (0-100) of every stock that has a value for `metric`.
///
/// Values are sorted ascending and a stock's rank is the position of the
/// first sorted value `>= value`, scaled by `count - 1`. Ties therefore share
/// the lowest position. Stocks without a value are absent from the map.
pub fn percentile_rank(stocks: &[Stock], metric: MetricKey, reversed: bool) -> HashMap<String, f64> {
    let mut sorted: Vec<f64> = stocks
        .iter()
        .filter_map(|s| s.metric(metric))
        .filter(|v| v.is_finite())
        .collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let count = sorted.len();
    let mut ranks = HashMap::with_capacity(count);
    if count == 0 {
        return ranks;
    }

    for stock in stocks {
        let value = match stock.metric(metric) {
            Some(v) if v.is_finite() => v,
            _ => continue,
        };
        let pct = if count == 1 {
            SINGLE_VALUE_PERCENTILE
        } else {
            let idx = sorted.partition_point(|&x| x < value);
            idx as f64 / (count - 1) as f64 * 100.0
        };
        let pct = if reversed { 100.0 - pct } else { pct };
        ranks.insert(stock.symbol.clone(), pct);
    }
    ranks
}

/// Mean percentile across the selected metrics.
///
/// A stock missing a metric contributes 0 for that slot but still counts in
/// the denominator, so incomplete records are penalised rather than
/// averaged over fewer metrics.
pub fn aggregate_score(stocks: &[Stock], selection: &MetricSelection) -> HashMap<String, f64> {
    if selection.is_empty() {
        return HashMap::new();
    }
    let per_metric = rank_all(stocks, selection);
    let n = selection.len() as f64;

    stocks
        .iter()
        .map(|s| {
            let sum: f64 = per_metric
                .iter()
                .map(|ranks| ranks.get(&s.symbol).copied().unwrap_or(0.0))
                .sum();
            (s.symbol.clone(), sum / n)
        })
        .collect()
}

fn rank_all(stocks: &[Stock], selection: &MetricSelection) -> Vec<HashMap<String, f64>> {
    selection
        .metrics
        .iter()
        .map(|m| percentile_rank(stocks, m.metric, m.reversed))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapCell {
    pub metric: MetricKey,
    pub value: Option<f64>,
    pub percentile: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapRow {
    pub symbol: String,
    pub name: String,
    pub sector: String,
    pub cells: Vec<HeatmapCell>,
    pub score: f64,
}

/// One row per stock (input order) with raw values, percentiles and the
/// aggregate score.
pub fn heatmap(stocks: &[Stock], selection: &MetricSelection) -> Vec<HeatmapRow> {
    let per_metric = rank_all(stocks, selection);
    let n = selection.len();

    let rows: Vec<HeatmapRow> = stocks
        .iter()
        .map(|s| {
            let cells: Vec<HeatmapCell> = selection
                .metrics
                .iter()
                .zip(per_metric.iter())
                .map(|(m, ranks)| HeatmapCell {
                    metric: m.metric,
                    value: s.metric(m.metric),
                    percentile: ranks.get(&s.symbol).copied(),
                })
                .collect();
            let score = if n == 0 {
                0.0
            } else {
                cells.iter().map(|c| c.percentile.unwrap_or(0.0)).sum::<f64>() / n as f64
            };
            HeatmapRow {
                symbol: s.symbol.clone(),
                name: s.name.clone(),
                sector: s.sector.clone(),
                cells,
                score,
            }
        })
        .collect();

    tracing::debug!("Heatmap built: {} stocks x {} metrics", rows.len(), n);
    rows
}

/// Sort rows by aggregate score, best first. Equal scores keep input order.
pub fn rank_by_score(mut rows: Vec<HeatmapRow>) -> Vec<HeatmapRow> {
    rows.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    rows
}
