//! One configuration for both engines.
//!
//! ```rust
//! use partita::config::{fit, Algorithm, ClusteringConfig};
//! use partita::cluster::ClusterModel;
//! use partita::data::Dataset;
//!
//! let config = ClusteringConfig::from_json(r#"{"algorithm": "k_means", "num_clusters": {"fixed": 2}}"#).unwrap();
//! assert_eq!(config.algorithm, Algorithm::KMeans);
//!
//! let data = Dataset::from_rows(&[vec![0.0], vec![0.2], vec![9.0], vec![9.1]]).unwrap();
//! let model = fit(&data, &config).unwrap();
//! assert_eq!(model.cluster_count(), 2);
//! ```

use crate::canopy::CanopyConfig;
use crate::cluster::{Clusterer, Em, FittedModel, Kmeans};
use crate::data::Dataset;
use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use crate::init::InitMethod;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use crate::cluster::ClusterCount;

/// Which engine [`fit`] runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// EM mixture model.
    #[default]
    Em,
    /// K-means.
    KMeans,
}

/// Settings for [`fit`]. Fields not used by the chosen algorithm are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    /// Engine to run.
    pub algorithm: Algorithm,
    /// Cluster count; k-means reads `Auto` as 2.
    pub num_clusters: ClusterCount,
    /// Iteration cap (100 for EM, 500 for k-means when unset).
    pub max_iterations: Option<usize>,
    /// EM stops once the log-likelihood gains less than this.
    pub min_log_likelihood_improvement: f64,
    /// The cluster-count search stops once held-out log-likelihood gains less than this.
    pub min_log_likelihood_improvement_cv: f64,
    /// Folds for the cluster-count search.
    pub num_folds: usize,
    /// Largest k the search tries.
    pub max_clusters: Option<usize>,
    /// EM standard-deviation floor.
    pub min_std_dev: f64,
    /// Per-attribute floors, one per schema attribute.
    pub min_std_dev_per_attribute: Option<Vec<f64>>,
    /// K-means fits tried when initialising EM.
    pub kmeans_runs: usize,
    /// K-means distance.
    pub metric: DistanceMetric,
    /// Range-normalise numeric attributes inside the distance.
    pub normalize: bool,
    /// K-means seeding.
    pub init: InitMethod,
    /// Canopy settings.
    pub canopy: CanopyConfig,
    /// Take k-means errors from the last assignment step.
    pub fast_distance: bool,
    /// Worker count (1 = sequential).
    pub execution_slots: usize,
    /// Random seed (10 for k-means, 100 for EM when unset).
    pub seed: Option<u64>,
    /// Keep per-record k-means assignments.
    pub preserve_order: bool,
    /// Impute missing values before k-means.
    pub replace_missing: bool,
    /// Report per-cluster standard deviations for k-means.
    pub display_std_devs: bool,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Em,
            num_clusters: ClusterCount::Auto,
            max_iterations: None,
            min_log_likelihood_improvement: 1e-6,
            min_log_likelihood_improvement_cv: 1e-6,
            num_folds: 10,
            max_clusters: None,
            min_std_dev: 1e-6,
            min_std_dev_per_attribute: None,
            kmeans_runs: 10,
            metric: DistanceMetric::Euclidean,
            normalize: true,
            init: InitMethod::Random,
            canopy: CanopyConfig::default(),
            fast_distance: false,
            execution_slots: 1,
            seed: None,
            preserve_order: false,
            replace_missing: true,
            display_std_devs: false,
        }
    }
}

impl ClusteringConfig {
    /// Default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from JSON; absent fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the algorithm.
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Set the cluster count.
    pub fn with_num_clusters(mut self, count: ClusterCount) -> Self {
        self.num_clusters = count;
        self
    }

    /// Set maximum iterations.
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = Some(max);
        self
    }

    /// Set the upper bound of the cluster-count search.
    pub fn with_max_clusters(mut self, max: usize) -> Self {
        self.max_clusters = Some(max);
        self
    }

    /// Set the number of folds.
    pub fn with_num_folds(mut self, folds: usize) -> Self {
        self.num_folds = folds;
        self
    }

    /// Set the distance.
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Set the k-means seeding.
    pub fn with_init(mut self, init: InitMethod) -> Self {
        self.init = init;
        self
    }

    /// Set canopy options.
    pub fn with_canopy(mut self, canopy: CanopyConfig) -> Self {
        self.canopy = canopy;
        self
    }

    /// Set the number of execution slots.
    pub fn with_execution_slots(mut self, slots: usize) -> Self {
        self.execution_slots = slots;
        self
    }

    /// Set random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Keep per-record k-means assignments.
    pub fn with_preserve_order(mut self, preserve: bool) -> Self {
        self.preserve_order = preserve;
        self
    }

    /// Check parameter ranges shared by both engines.
    pub fn validate(&self) -> Result<()> {
        if self.num_clusters == ClusterCount::Fixed(0) {
            return Err(Error::invalid("num_clusters", "must be > 0"));
        }
        if self.max_iterations == Some(0) {
            return Err(Error::invalid("max_iterations", "must be > 0"));
        }
        if self.execution_slots == 0 {
            return Err(Error::invalid("execution_slots", "must be > 0"));
        }
        if self.num_folds < 2 {
            return Err(Error::invalid("num_folds", "must be >= 2"));
        }
        if !(self.min_std_dev > 0.0) {
            return Err(Error::invalid("min_std_dev", "must be > 0"));
        }
        if self.kmeans_runs == 0 {
            return Err(Error::invalid("kmeans_runs", "must be > 0"));
        }
        self.canopy.validate()
    }

    /// The k-means engine this configuration describes.
    pub fn kmeans(&self) -> Kmeans {
        let k = match self.num_clusters {
            ClusterCount::Fixed(k) => k,
            ClusterCount::Auto => 2,
        };
        Kmeans::new(k)
            .with_max_iter(self.max_iterations.unwrap_or(500))
            .with_metric(self.metric)
            .with_normalize(self.normalize)
            .with_init(self.init)
            .with_canopy(self.canopy.clone())
            .with_fast_distance(self.fast_distance)
            .with_execution_slots(self.execution_slots)
            .with_seed(self.seed.unwrap_or(10))
            .with_preserve_order(self.preserve_order)
            .with_replace_missing(self.replace_missing)
            .with_display_std_devs(self.display_std_devs)
    }

    /// The EM engine this configuration describes.
    pub fn em(&self) -> Em {
        let mut em = Em::new()
            .with_num_clusters(self.num_clusters)
            .with_max_iter(self.max_iterations.unwrap_or(100))
            .with_min_improvement(self.min_log_likelihood_improvement)
            .with_min_improvement_cv(self.min_log_likelihood_improvement_cv)
            .with_num_folds(self.num_folds)
            .with_min_std_dev(self.min_std_dev)
            .with_kmeans_runs(self.kmeans_runs)
            .with_execution_slots(self.execution_slots)
            .with_seed(self.seed.unwrap_or(100));
        if let Some(max) = self.max_clusters {
            em = em.with_max_clusters(max);
        }
        if let Some(floors) = &self.min_std_dev_per_attribute {
            em = em.with_min_std_dev_per_attribute(floors.clone());
        }
        em
    }
}

/// Fit `data` with the engine `config` selects.
pub fn fit(data: &Dataset, config: &ClusteringConfig) -> Result<FittedModel> {
    config.validate()?;
    debug!(algorithm = ?config.algorithm, "dispatching fit");
    match config.algorithm {
        Algorithm::KMeans => Ok(FittedModel::Kmeans(config.kmeans().fit(data)?)),
        Algorithm::Em => Ok(FittedModel::Em(config.em().fit(data)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ClusterModel;

    #[test]
    fn defaults() {
        let c = ClusteringConfig::default();
        assert_eq!(c.algorithm, Algorithm::Em);
        assert_eq!(c.num_clusters, ClusterCount::Auto);
        assert_eq!(c.num_folds, 10);
        assert_eq!(c.kmeans_runs, 10);
        assert!(c.normalize);
        assert!(c.replace_missing);
        assert!(!c.canopy.enabled);
        assert_eq!(c.kmeans().k(), 2);
    }

    #[test]
    fn json_fills_missing_fields() {
        let c = ClusteringConfig::from_json(
            r#"{"algorithm": "k_means", "metric": "manhattan", "init": "k-means++", "canopy": {"enabled": true}}"#,
        )
        .unwrap();
        assert_eq!(c.algorithm, Algorithm::KMeans);
        assert_eq!(c.metric, DistanceMetric::Manhattan);
        assert_eq!(c.init, InitMethod::KMeansPlusPlus);
        assert!(c.canopy.enabled);
        assert_eq!(c.canopy.max_candidates, 100);
        assert_eq!(c.min_std_dev, 1e-6);
    }

    #[test]
    fn json_round_trip() {
        let c = ClusteringConfig::new()
            .with_num_clusters(ClusterCount::Fixed(3))
            .with_seed(7);
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(ClusteringConfig::from_json(&json).unwrap(), c);
    }

    #[test]
    fn bad_json_is_a_config_error() {
        assert!(matches!(
            ClusteringConfig::from_json("{\"num_folds\": \"ten\"}"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            ClusteringConfig::from_json("{\"num_folds\": 1}"),
            Err(Error::InvalidArgument { name: "num_folds", .. })
        ));
    }

    #[test]
    fn fit_dispatches() {
        let data = Dataset::from_rows(&[vec![0.0], vec![0.1], vec![5.0], vec![5.1]]).unwrap();
        let km = fit(
            &data,
            &ClusteringConfig::new()
                .with_algorithm(Algorithm::KMeans)
                .with_num_clusters(ClusterCount::Fixed(2)),
        )
        .unwrap();
        assert!(matches!(km, FittedModel::Kmeans(_)));
        assert_eq!(km.cluster_count(), 2);

        let em = fit(&data, &ClusteringConfig::new()).unwrap();
        assert!(matches!(em, FittedModel::Em(_)));
        // Four records are too few for the cross-validated search
        assert_eq!(em.cluster_count(), 1);
    }
}
