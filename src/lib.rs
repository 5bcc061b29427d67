//! # partita
//!
//! Partition-based clustering for tabular data with numeric and nominal
//! attributes, missing values and per-record weights.
//!
//! Two engines:
//!
//! - [`Kmeans`]: hard assignments with Euclidean or Manhattan distance,
//!   four seeding methods and optional canopy pruning.
//! - [`Em`]: a mixture of per-attribute Gaussian and categorical models,
//!   initialised from k-means, with the number of clusters optionally chosen
//!   by cross-validation.
//!
//! Both run their per-record work on a fixed number of execution slots
//! (the `parallel` feature, on by default, backs slots with a rayon pool).
//!
//! ```rust
//! use partita::{ClusterModel, Clusterer, Dataset, Kmeans};
//!
//! let data = Dataset::from_rows(&[vec![1.0, 1.0], vec![1.2, 0.9], vec![8.0, 8.0], vec![8.1, 7.9]]).unwrap();
//! let model = Kmeans::new(2).fit(&data).unwrap();
//! assert_eq!(model.cluster_count(), 2);
//! println!("{}", model.describe());
//! ```

pub mod canopy;
pub mod cluster;
pub mod config;
pub mod data;
pub mod distance;
/// Error types used across `partita`.
pub mod error;
pub mod init;
pub mod metrics;
pub mod pool;

pub use error::{Error, Result};

pub use canopy::{CanopyConfig, Canopies};
pub use cluster::{
    ClusterCount, ClusterModel, Clusterer, Em, EmModel, EmReport, FittedModel, Kmeans, KmeansModel, KmeansReport,
    ModelReport,
};
pub use config::{fit, Algorithm, ClusteringConfig};
pub use data::{Attribute, Dataset, MissingValueReplacer, Record, Schema, Value};
pub use distance::{Distance, DistanceFunction, DistanceMetric};
pub use init::{InitMethod, Seeding};
pub use metrics::{adjusted_rand_index, purity};
pub use pool::WorkerPool;
