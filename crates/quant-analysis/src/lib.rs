//! Cross-sectional analytics over a stock universe: percentile heatmaps,
//! metric correlations and k-means clustering.
//!
//! Every entry point is a pure function over borrowed input; nothing is
//! cached between calls.

pub mod characteristics;
pub mod clustering;
pub mod correlation;
pub mod percentile;

pub use characteristics::{default_rules, describe_clusters, CharacteristicRule, Comparison};
pub use clustering::{
    kmeans, recommended_k, should_cluster, Assignment, Cluster, ClusteringLimits,
    ClusteringResult, FeatureScaling, FirstPoint, FixedSeed, KMeansConfig, SeedChoice,
    SeedStrategy, SymbolHash, MIN_CLUSTER_POPULATION,
};
pub use correlation::{
    correlation_matrix, full_matrix, pearson, strongest, CorrelationMatrix, CorrelationPair,
    Significance,
};
pub use percentile::{
    aggregate_score, heatmap, percentile_rank, rank_by_score, HeatmapCell, HeatmapRow,
};
