//! Clustering traits.

use crate::data::{Dataset, Record};
use crate::error::Result;

/// Trait for clustering algorithms.
pub trait Clusterer {
    /// Model produced by [`Clusterer::fit`].
    type Model: ClusterModel;

    /// Fit a model to `data`.
    fn fit(&self, data: &Dataset) -> Result<Self::Model>;

    /// Fit the model to data and return cluster assignments.
    ///
    /// Returns a vector of cluster labels, one per input record.
    fn fit_predict(&self, data: &Dataset) -> Result<Vec<usize>> {
        self.fit(data)?.assign_all(data)
    }
}

/// A fitted clustering.
pub trait ClusterModel {
    /// Structured, printable description of the fitted parameters.
    type Report;

    /// Index of the cluster `record` belongs to.
    fn assign(&self, record: &Record) -> Result<usize>;

    /// Membership distribution over clusters.
    ///
    /// Entry \[c\] is the probability that `record` belongs to cluster c.
    /// Hard models return a one-hot vector.
    fn membership(&self, record: &Record) -> Result<Vec<f64>>;

    /// Get the number of clusters.
    fn cluster_count(&self) -> usize;

    /// Describe the model. Repeated calls return equal reports.
    fn describe(&self) -> Self::Report;

    /// Assign every record of `data`.
    fn assign_all(&self, data: &Dataset) -> Result<Vec<usize>> {
        data.records().iter().map(|r| self.assign(r)).collect()
    }
}
