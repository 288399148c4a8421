use analysis_core::{MetricKey, Stock};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

const HIGH_THRESHOLD: f64 = 0.7;
const MODERATE_THRESHOLD: f64 = 0.4;

/// Relative size below which a sum-of-squares term is treated as zero
const DEGENERATE_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Significance {
    High,
    Moderate,
    Low,
}

impl Significance {
    pub fn classify(r: f64) -> Self {
        let abs = r.abs();
        if abs >= HIGH_THRESHOLD {
            Significance::High
        } else if abs >= MODERATE_THRESHOLD {
            Significance::Moderate
        } else {
            Significance::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationPair {
    pub metric_a: MetricKey,
    pub metric_b: MetricKey,
    pub coefficient: f64,
    pub significance: Significance,
}

/// Pearson correlation using the raw-sums form
/// `(nΣxy − ΣxΣy) / sqrt((nΣx² − (Σx)²)(nΣy² − (Σy)²))`.
///
/// Returns 0 for fewer than two points or a constant series. Slices of
/// different length are truncated to the shorter one.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return 0.0;
    }
    let (x, y) = (&x[..n], &y[..n]);
    let nf = n as f64;

    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xy = 0.0;
    let mut sum_x2 = 0.0;
    let mut sum_y2 = 0.0;
    for i in 0..n {
        sum_x += x[i];
        sum_y += y[i];
        sum_xy += x[i] * y[i];
        sum_x2 += x[i] * x[i];
        sum_y2 += y[i] * y[i];
    }

    let var_x = nf * sum_x2 - sum_x * sum_x;
    let var_y = nf * sum_y2 - sum_y * sum_y;
    if var_x <= DEGENERATE_TOLERANCE * nf * sum_x2 || var_y <= DEGENERATE_TOLERANCE * nf * sum_y2 {
        return 0.0;
    }
    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return 0.0;
    }

    ((nf * sum_xy - sum_x * sum_y) / denom).clamp(-1.0, 1.0)
}

fn dedup_metrics(metrics: &[MetricKey]) -> Vec<MetricKey> {
    let mut out: Vec<MetricKey> = Vec::with_capacity(metrics.len());
    for m in metrics {
        if !out.contains(m) {
            out.push(*m);
        }
    }
    out
}

fn columns(stocks: &[Stock], metrics: &[MetricKey]) -> Vec<Vec<f64>> {
    metrics
        .iter()
        .map(|&m| stocks.iter().map(|s| s.metric_or_zero(m)).collect())
        .collect()
}

/// Correlation of every unordered metric pair, nulls read as 0.
///
/// Pairs come out in selection order (`(0,1), (0,2), .., (1,2), ..`);
/// duplicate metrics are ignored so no self-pair is emitted.
pub fn correlation_matrix(stocks: &[Stock], metrics: &[MetricKey]) -> Vec<CorrelationPair> {
    let metrics = dedup_metrics(metrics);
    if stocks.is_empty() || metrics.len() < 2 {
        return Vec::new();
    }
    let cols = columns(stocks, &metrics);

    let index_pairs: Vec<(usize, usize)> = (0..metrics.len())
        .flat_map(|i| ((i + 1)..metrics.len()).map(move |j| (i, j)))
        .collect();

    let pairs: Vec<CorrelationPair> = index_pairs
        .par_iter()
        .map(|&(i, j)| {
            let r = pearson(&cols[i], &cols[j]);
            CorrelationPair {
                metric_a: metrics[i],
                metric_b: metrics[j],
                coefficient: r,
                significance: Significance::classify(r),
            }
        })
        .collect();

    tracing::debug!(
        "Correlation matrix: {} metrics over {} stocks -> {} pairs",
        metrics.len(),
        stocks.len(),
        pairs.len()
    );
    pairs
}

/// Dense symmetric matrix with a unit diagonal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub metrics: Vec<MetricKey>,
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: MetricKey, b: MetricKey) -> Option<f64> {
        let i = self.metrics.iter().position(|m| *m == a)?;
        let j = self.metrics.iter().position(|m| *m == b)?;
        Some(self.values[i][j])
    }
}

pub fn full_matrix(stocks: &[Stock], metrics: &[MetricKey]) -> CorrelationMatrix {
    let metrics = dedup_metrics(metrics);
    let n = metrics.len();
    let mut values = vec![vec![0.0; n]; n];
    for (i, row) in values.iter_mut().enumerate() {
        row[i] = 1.0;
    }
    for pair in correlation_matrix(stocks, &metrics) {
        let i = metrics.iter().position(|m| *m == pair.metric_a);
        let j = metrics.iter().position(|m| *m == pair.metric_b);
        if let (Some(i), Some(j)) = (i, j) {
            values[i][j] = pair.coefficient;
            values[j][i] = pair.coefficient;
        }
    }
    CorrelationMatrix { metrics, values }
}

/// Pairs ordered by absolute coefficient, strongest first.
pub fn strongest(pairs: &[CorrelationPair], limit: usize) -> Vec<CorrelationPair> {
    let mut sorted = pairs.to_vec();
    sorted.sort_by(|a, b| {
        b.coefficient
            .abs()
            .partial_cmp(&a.coefficient.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    sorted.truncate(limit);
    sorted
}
