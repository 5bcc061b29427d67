//! Clustering algorithms for grouping records.
//!
//! ## Hard vs Soft Clustering
//!
//! **Hard clustering** assigns each record to exactly one cluster. Simple, but
//! loses information when records genuinely sit between groups.
//!
//! **Soft clustering** gives each record a probability distribution over
//! clusters. [`EmModel::membership`] reports these probabilities;
//! [`KmeansModel::membership`](ClusterModel::membership) is one-hot.
//!
//! ## Algorithms
//!
//! ### K-means
//!
//! Assign each record to the nearest centroid, then move every centroid to
//! the mean (Euclidean) or median (Manhattan) of its members. Repeat until
//! no assignment changes.
//!
//! **Objective**: Minimize within-cluster error:
//!
//! ```text
//! J = Σ_k Σ_{x ∈ C_k} w(x) d(x, μ_k)²     (Euclidean)
//! J = Σ_k Σ_{x ∈ C_k} w(x) d(x, μ_k)      (Manhattan)
//! ```
//!
//! Starting centroids come from [`InitMethod`](crate::init::InitMethod).
//! With canopies enabled, a centroid is only compared to records whose
//! canopies it shares.
//!
//! ### EM mixture
//!
//! Models each cluster as independent per-attribute distributions
//! (Gaussian for numeric, smoothed categorical for nominal):
//!
//! ```text
//! P(x) = Σ_c π_c Π_j p_j(x_j | c)
//! ```
//!
//! Initialised from k-means; the number of clusters can be chosen by
//! cross-validated log-likelihood.
//!
//! ## Usage
//!
//! ```rust
//! use partita::cluster::{ClusterCount, ClusterModel, Clusterer, Em, Kmeans};
//! use partita::data::Dataset;
//!
//! let data = Dataset::from_rows(&[
//!     vec![0.0, 0.0],
//!     vec![0.1, 0.1],
//!     vec![10.0, 10.0],
//!     vec![10.1, 10.1],
//! ])
//! .unwrap();
//!
//! // Hard clustering with K-means
//! let labels = Kmeans::new(2).fit_predict(&data).unwrap();
//! assert_eq!(labels[0], labels[1]); // First two together
//! assert_ne!(labels[0], labels[2]); // Separate from last two
//!
//! // Soft clustering with EM
//! let model = Em::new()
//!     .with_num_clusters(ClusterCount::Fixed(2))
//!     .fit(&data)
//!     .unwrap();
//! let probs = model.membership(data.record(0)).unwrap();
//! assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-9);
//! ```

mod em;
mod kmeans;
pub mod mixture;
mod traits;

pub use em::{seeded_rng, ClusterCount, Em, EmModel, EmReport, BURN_IN_DRAWS};
pub use kmeans::{CentroidReport, Kmeans, KmeansModel, KmeansReport};
pub use traits::{ClusterModel, Clusterer};

use crate::data::{Attribute, Record, Value};
use crate::error::Result;
use serde::Serialize;
use std::fmt;

/// A model from either engine, as returned by [`crate::config::fit`].
#[derive(Debug, Clone)]
pub enum FittedModel {
    /// K-means model.
    Kmeans(KmeansModel),
    /// EM mixture model.
    Em(EmModel),
}

/// Report of a [`FittedModel`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum ModelReport {
    /// K-means report.
    Kmeans(KmeansReport),
    /// EM report.
    Em(EmReport),
}

impl fmt::Display for ModelReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelReport::Kmeans(r) => fmt::Display::fmt(r, f),
            ModelReport::Em(r) => fmt::Display::fmt(r, f),
        }
    }
}

impl ClusterModel for FittedModel {
    type Report = ModelReport;

    fn assign(&self, record: &Record) -> Result<usize> {
        match self {
            FittedModel::Kmeans(m) => m.assign(record),
            FittedModel::Em(m) => m.assign(record),
        }
    }

    fn membership(&self, record: &Record) -> Result<Vec<f64>> {
        match self {
            FittedModel::Kmeans(m) => m.membership(record),
            FittedModel::Em(m) => m.membership(record),
        }
    }

    fn cluster_count(&self) -> usize {
        match self {
            FittedModel::Kmeans(m) => m.cluster_count(),
            FittedModel::Em(m) => m.cluster_count(),
        }
    }

    fn describe(&self) -> ModelReport {
        match self {
            FittedModel::Kmeans(m) => ModelReport::Kmeans(m.describe()),
            FittedModel::Em(m) => ModelReport::Em(m.describe()),
        }
    }
}

/// Render a cell: four decimals for numbers, the label for nominal values.
pub(crate) fn format_value(attr: &Attribute, value: Value) -> String {
    match value {
        Value::Numeric(x) => format!("{x:.4}"),
        Value::Nominal(v) => attr.label(v).map_or_else(|| v.to_string(), str::to_string),
        Value::Missing => "missing".to_string(),
    }
}

/// Write rows as aligned columns: first column left-aligned, the rest right-aligned.
pub(crate) fn write_table(f: &mut fmt::Formatter<'_>, rows: &[Vec<String>]) -> fmt::Result {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut widths = vec![0; columns];
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }
    for row in rows {
        let mut line = String::new();
        for (i, cell) in row.iter().enumerate() {
            if i == 0 {
                line.push_str(&format!("{cell:<width$}", width = widths[0]));
            } else {
                line.push_str(&format!("  {cell:>width$}", width = widths[i]));
            }
        }
        writeln!(f, "{}", line.trim_end())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Table(Vec<Vec<String>>);

    impl fmt::Display for Table {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write_table(f, &self.0)
        }
    }

    #[test]
    fn table_alignment() {
        let t = Table(vec![
            vec!["Attribute".into(), "0".into()],
            vec!["x".into(), "12.5000".into()],
        ]);
        assert_eq!(t.to_string(), "Attribute        0\nx          12.5000\n");
    }

    #[test]
    fn value_formatting() {
        let colour = Attribute::nominal("colour", ["red", "green"]);
        assert_eq!(format_value(&colour, Value::Nominal(1)), "green");
        assert_eq!(format_value(&colour, Value::Missing), "missing");
        assert_eq!(format_value(&Attribute::numeric("x"), Value::Numeric(1.0)), "1.0000");
    }
}
