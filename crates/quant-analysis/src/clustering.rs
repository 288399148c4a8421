use std::collections::BTreeMap;
use std::fmt;

use analysis_core::{AnalysisError, MetricKey, Stock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Smallest universe worth clustering; callers skip below this.
pub const MIN_CLUSTER_POPULATION: usize = 6;
pub const DEFAULT_MAX_ITERATIONS: usize = 100;
const DEFAULT_MAX_K: usize = 4;
const STOCKS_PER_CLUSTER: usize = 5;

/// Population guard and k heuristic used by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusteringLimits {
    pub min_population: usize,
    pub max_k: usize,
}

impl Default for ClusteringLimits {
    fn default() -> Self {
        Self {
            min_population: MIN_CLUSTER_POPULATION,
            max_k: DEFAULT_MAX_K,
        }
    }
}

impl ClusteringLimits {
    /// `min(max_k, n / 5)`
    pub fn recommended_k(&self, n: usize) -> usize {
        (n / STOCKS_PER_CLUSTER).min(self.max_k)
    }

    pub fn should_cluster(&self, n: usize) -> bool {
        n >= self.min_population && self.recommended_k(n) > 0
    }
}

pub fn recommended_k(n: usize) -> usize {
    ClusteringLimits::default().recommended_k(n)
}

pub fn should_cluster(n: usize) -> bool {
    ClusteringLimits::default().should_cluster(n)
}

/// Chooses the first k-means++ centroid. Must be deterministic for a given
/// input so repeated calls produce identical clusters.
pub trait SeedStrategy: fmt::Debug + Send + Sync {
    /// Index into `points` (non-empty, parallel to `symbols`).
    fn first_index(&self, symbols: &[&str], points: &[Vec<f64>]) -> usize;
}

/// Always seed from the first stock.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstPoint;

impl SeedStrategy for FirstPoint {
    fn first_index(&self, _symbols: &[&str], _points: &[Vec<f64>]) -> usize {
        0
    }
}

/// FNV-1a hash of the symbol list, modulo the population.
#[derive(Debug, Clone, Copy, Default)]
pub struct SymbolHash;

impl SymbolHash {
    fn fnv1a(symbols: &[&str]) -> u64 {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for s in symbols {
            for b in s.bytes().chain(std::iter::once(0u8)) {
                hash ^= b as u64;
                hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
            }
        }
        hash
    }
}

impl SeedStrategy for SymbolHash {
    fn first_index(&self, symbols: &[&str], points: &[Vec<f64>]) -> usize {
        (Self::fnv1a(symbols) % points.len() as u64) as usize
    }
}

/// Uniform pick from a `StdRng` with a fixed seed.
#[derive(Debug, Clone, Copy)]
pub struct FixedSeed(pub u64);

impl SeedStrategy for FixedSeed {
    fn first_index(&self, _symbols: &[&str], points: &[Vec<f64>]) -> usize {
        let mut rng = StdRng::seed_from_u64(self.0);
        rng.gen_range(0..points.len())
    }
}

/// Serializable choice among the built-in seed strategies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "camelCase")]
pub enum SeedChoice {
    #[default]
    FirstPoint,
    SymbolHash,
    FixedSeed { seed: u64 },
}

impl SeedStrategy for SeedChoice {
    fn first_index(&self, symbols: &[&str], points: &[Vec<f64>]) -> usize {
        match self {
            SeedChoice::FirstPoint => FirstPoint.first_index(symbols, points),
            SeedChoice::SymbolHash => SymbolHash.first_index(symbols, points),
            SeedChoice::FixedSeed { seed } => FixedSeed(*seed).first_index(symbols, points),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FeatureScaling {
    /// Distances over raw metric values
    #[default]
    None,
    /// Each feature rescaled to [0, 1] across the universe
    MinMax,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KMeansConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default)]
    pub scaling: FeatureScaling,
    #[serde(default)]
    pub seed: SeedChoice,
}

fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            scaling: FeatureScaling::None,
            seed: SeedChoice::FirstPoint,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub symbol: String,
    pub cluster_id: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    pub id: usize,
    pub members: Vec<String>,
    /// Mean of member vectors in the (possibly scaled) distance space
    pub centroid: Vec<f64>,
    /// Mean raw value of each clustering feature
    pub averages: BTreeMap<MetricKey, f64>,
    #[serde(default)]
    pub characteristics: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusteringResult {
    pub features: Vec<MetricKey>,
    pub k: usize,
    pub assignments: Vec<Assignment>,
    /// Non-empty clusters ordered by id
    pub clusters: Vec<Cluster>,
    pub iterations: usize,
    pub converged: bool,
}

impl ClusteringResult {
    pub fn cluster_of(&self, symbol: &str) -> Option<usize> {
        self.assignments
            .iter()
            .find(|a| a.symbol == symbol)
            .map(|a| a.cluster_id)
    }
}

/// Partition `stocks` into `k` clusters over `features` (nulls read as 0).
///
/// Seeding is k-means++ farthest-point: the first centroid comes from
/// `config.seed`, each next one is the point whose distance to its nearest
/// chosen centroid is largest (lowest index on ties). Lloyd iterations run
/// until no assignment changes or `max_iterations` is reached.
pub fn kmeans(
    stocks: &[Stock],
    features: &[MetricKey],
    k: usize,
    config: &KMeansConfig,
) -> Result<ClusteringResult, AnalysisError> {
    kmeans_with_seed(stocks, features, k, config, &config.seed)
}

/// [`kmeans`] with a caller-supplied seed strategy (overrides `config.seed`).
pub fn kmeans_with_seed(
    stocks: &[Stock],
    features: &[MetricKey],
    k: usize,
    config: &KMeansConfig,
    seed: &dyn SeedStrategy,
) -> Result<ClusteringResult, AnalysisError> {
    if k == 0 {
        return Err(AnalysisError::invalid("k must be positive"));
    }
    if features.is_empty() {
        return Err(AnalysisError::invalid("clustering needs at least one feature"));
    }
    if config.max_iterations == 0 {
        return Err(AnalysisError::invalid("max_iterations must be positive"));
    }
    if stocks.is_empty() {
        return Ok(ClusteringResult {
            features: features.to_vec(),
            k,
            ..Default::default()
        });
    }
    let n = stocks.len();
    if k > n {
        return Err(AnalysisError::invalid(format!(
            "k = {} exceeds the {} stocks supplied",
            k, n
        )));
    }

    let raw: Vec<Vec<f64>> = stocks
        .iter()
        .map(|s| {
            features
                .iter()
                .map(|&f| s.metric(f).filter(|v| v.is_finite()).unwrap_or(0.0))
                .collect()
        })
        .collect();
    let points = match config.scaling {
        FeatureScaling::None => raw.clone(),
        FeatureScaling::MinMax => min_max_scale(&raw, features.len()),
    };
    let symbols: Vec<&str> = stocks.iter().map(|s| s.symbol.as_str()).collect();

    let mut centroids = seed_centroids(&symbols, &points, k, seed);

    let mut assignments = vec![usize::MAX; n];
    let mut iterations = 0;
    let mut converged = false;
    while iterations < config.max_iterations {
        iterations += 1;
        let mut changed = false;
        for (i, p) in points.iter().enumerate() {
            let c = nearest(p, &centroids);
            if assignments[i] != c {
                assignments[i] = c;
                changed = true;
            }
        }
        if !changed {
            converged = true;
            break;
        }
        centroids = recompute_centroids(&points, &assignments, &centroids);
    }

    if !converged {
        tracing::warn!(
            "k-means hit the iteration cap ({}) before assignments settled",
            config.max_iterations
        );
    }

    let clusters = build_clusters(stocks, features, &raw, &points, &assignments, k);
    tracing::debug!(
        "k-means: {} stocks, k={}, {} iterations, converged={}",
        n,
        k,
        iterations,
        converged
    );

    Ok(ClusteringResult {
        features: features.to_vec(),
        k,
        assignments: stocks
            .iter()
            .zip(assignments.iter())
            .map(|(s, &c)| Assignment {
                symbol: s.symbol.clone(),
                cluster_id: c,
            })
            .collect(),
        clusters,
        iterations,
        converged,
    })
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

fn nearest(point: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let d = squared_distance(point, c);
        if d < best_dist {
            best_dist = d;
            best = i;
        }
    }
    best
}

fn seed_centroids(
    symbols: &[&str],
    points: &[Vec<f64>],
    k: usize,
    seed: &dyn SeedStrategy,
) -> Vec<Vec<f64>> {
    let first = seed.first_index(symbols, points) % points.len();
    let mut centroids = vec![points[first].clone()];

    while centroids.len() < k {
        let mut best_idx = 0;
        let mut best_dist = f64::NEG_INFINITY;
        for (i, p) in points.iter().enumerate() {
            let d = centroids
                .iter()
                .map(|c| squared_distance(p, c))
                .fold(f64::INFINITY, f64::min);
            if d > best_dist {
                best_dist = d;
                best_idx = i;
            }
        }
        centroids.push(points[best_idx].clone());
    }
    centroids
}

/// Member means; a cluster that lost all members keeps its old centroid.
fn recompute_centroids(
    points: &[Vec<f64>],
    assignments: &[usize],
    previous: &[Vec<f64>],
) -> Vec<Vec<f64>> {
    let dims = previous.first().map(|c| c.len()).unwrap_or(0);
    let mut sums = vec![vec![0.0; dims]; previous.len()];
    let mut counts = vec![0usize; previous.len()];
    for (p, &c) in points.iter().zip(assignments.iter()) {
        counts[c] += 1;
        for (s, v) in sums[c].iter_mut().zip(p.iter()) {
            *s += v;
        }
    }
    sums.into_iter()
        .zip(counts)
        .zip(previous.iter())
        .map(|((sum, count), prev)| {
            if count == 0 {
                prev.clone()
            } else {
                sum.into_iter().map(|s| s / count as f64).collect()
            }
        })
        .collect()
}

fn min_max_scale(raw: &[Vec<f64>], dims: usize) -> Vec<Vec<f64>> {
    let mut lo = vec![f64::INFINITY; dims];
    let mut hi = vec![f64::NEG_INFINITY; dims];
    for row in raw {
        for d in 0..dims {
            lo[d] = lo[d].min(row[d]);
            hi[d] = hi[d].max(row[d]);
        }
    }
    raw.iter()
        .map(|row| {
            (0..dims)
                .map(|d| {
                    let range = hi[d] - lo[d];
                    if range > 0.0 {
                        (row[d] - lo[d]) / range
                    } else {
                        0.0
                    }
                })
                .collect()
        })
        .collect()
}

fn build_clusters(
    stocks: &[Stock],
    features: &[MetricKey],
    raw: &[Vec<f64>],
    points: &[Vec<f64>],
    assignments: &[usize],
    k: usize,
) -> Vec<Cluster> {
    (0..k)
        .filter_map(|id| {
            let idx: Vec<usize> = (0..stocks.len()).filter(|&i| assignments[i] == id).collect();
            if idx.is_empty() {
                return None;
            }
            let count = idx.len() as f64;
            let mean_of = |rows: &[Vec<f64>], d: usize| idx.iter().map(|&i| rows[i][d]).sum::<f64>() / count;

            let centroid = (0..features.len()).map(|d| mean_of(points, d)).collect();
            let mut averages = BTreeMap::new();
            for (d, f) in features.iter().enumerate() {
                averages.insert(*f, mean_of(raw, d));
            }
            Some(Cluster {
                id,
                members: idx.iter().map(|&i| stocks[i].symbol.clone()).collect(),
                centroid,
                averages,
                characteristics: Vec::new(),
            })
        })
        .collect()
}
