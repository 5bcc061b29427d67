//! K-means clustering.
//!
//! Partitions data into k clusters by minimizing the **within-cluster error**:
//! squared distances for the Euclidean metric, plain distances for Manhattan.
//!
//! # The Objective
//!
//! ```text
//! Euclidean: E = Σₖ Σᵢ∈Cₖ wᵢ ||xᵢ - μₖ||²     (μₖ = weighted mean)
//! Manhattan: E = Σₖ Σᵢ∈Cₖ wᵢ |xᵢ - mₖ|₁       (mₖ = weighted median)
//! ```
//!
//! Nominal coordinates are the weighted mode in both cases.
//!
//! # Lloyd's Algorithm
//!
//! 1. Seed up to k centroids ([`InitMethod`])
//! 2. **Assign**: each record → nearest centroid
//! 3. **Update**: each centroid → mean/median/mode of its members
//! 4. Repeat until no record changes cluster, or the iteration cap is hit
//!
//! A cluster that ends an assignment step with no members is dropped and
//! k shrinks by one; the fit never fails because of it.
//!
//! # Canopy Pruning
//!
//! With canopies enabled, each record and each centroid is located against
//! the canopies. A centroid sharing no canopy with a record is skipped for
//! that record only when the triangle inequality through the canopy centres
//! puts it strictly farther than the best centroid seen so far. Pruned and
//! unpruned runs therefore make identical assignments.
//!
//! # Execution Slots
//!
//! The assignment and update steps split their work across a [`WorkerPool`];
//! results are merged in range order, so the outcome does not depend on
//! the number of slots.

use super::{write_table, ClusterModel, Clusterer};
use crate::canopy::{Canopies, CanopyConfig, CanopyPosition};
use crate::data::{max_index, weighted_variance, Attribute, Dataset, MissingValueReplacer, Record, Schema, Value};
use crate::distance::{Distance, DistanceFunction, DistanceMetric};
use crate::error::{Error, Result};
use crate::init::{InitMethod, SeedContext, Seeding};
use crate::pool::WorkerPool;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::borrow::Cow;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;
use tracing::{debug, info, warn};

const UNASSIGNED: usize = usize::MAX;

/// K-means clustering algorithm.
#[derive(Debug, Clone)]
pub struct Kmeans {
    /// Number of clusters.
    k: usize,
    /// Maximum iterations.
    max_iter: usize,
    metric: DistanceMetric,
    normalize: bool,
    init: InitMethod,
    canopy: CanopyConfig,
    /// Skip the exact error pass after convergence.
    fast_distance: bool,
    execution_slots: usize,
    /// Random seed.
    seed: u64,
    preserve_order: bool,
    replace_missing: bool,
    display_std_devs: bool,
}

impl Kmeans {
    /// Create a new K-means clusterer.
    pub fn new(k: usize) -> Self {
        Self {
            k,
            max_iter: 500,
            metric: DistanceMetric::Euclidean,
            normalize: true,
            init: InitMethod::Random,
            canopy: CanopyConfig::default(),
            fast_distance: false,
            execution_slots: 1,
            seed: 10,
            preserve_order: false,
            replace_missing: true,
            display_std_devs: false,
        }
    }

    /// Set maximum iterations.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set the distance metric.
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Range-normalise numeric attributes inside the distance.
    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    /// Set the initialisation method.
    pub fn with_init(mut self, init: InitMethod) -> Self {
        self.init = init;
        self
    }

    /// Set canopy parameters (used for pruning and for canopy seeding).
    pub fn with_canopy(mut self, canopy: CanopyConfig) -> Self {
        self.canopy = canopy;
        self
    }

    /// Take errors from the last assignment step instead of an exact pass.
    pub fn with_fast_distance(mut self, fast: bool) -> Self {
        self.fast_distance = fast;
        self
    }

    /// Set the number of execution slots.
    pub fn with_execution_slots(mut self, slots: usize) -> Self {
        self.execution_slots = slots;
        self
    }

    /// Set random seed for reproducibility.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Keep per-record assignments in the fitted model.
    pub fn with_preserve_order(mut self, preserve: bool) -> Self {
        self.preserve_order = preserve;
        self
    }

    /// Impute missing values with the global mean/mode before fitting.
    pub fn with_replace_missing(mut self, replace: bool) -> Self {
        self.replace_missing = replace;
        self
    }

    /// Include per-cluster standard deviations in the report.
    pub fn with_display_std_devs(mut self, display: bool) -> Self {
        self.display_std_devs = display;
        self
    }

    /// Requested number of clusters.
    pub fn k(&self) -> usize {
        self.k
    }

    fn validate(&self) -> Result<()> {
        if self.k == 0 {
            return Err(Error::invalid("num_clusters", "must be > 0"));
        }
        if self.max_iter == 0 {
            return Err(Error::invalid("max_iterations", "must be > 0"));
        }
        if self.execution_slots == 0 {
            return Err(Error::invalid("execution_slots", "must be > 0"));
        }
        self.canopy.validate()
    }

    /// Fit using an existing pool.
    pub(crate) fn fit_with_pool(&self, data: &Dataset, pool: &WorkerPool) -> Result<KmeansModel> {
        self.validate()?;
        if data.is_empty() {
            return Err(Error::EmptyInput);
        }

        let replacer = self.replace_missing.then(|| MissingValueReplacer::fit(data));
        let data: Cow<'_, Dataset> = match &replacer {
            Some(r) => Cow::Owned(r.apply_dataset(data)),
            None => Cow::Borrowed(data),
        };
        let data = data.as_ref();
        let n = data.len();
        let schema = data.schema();
        let metric = self.metric;
        let distance = DistanceFunction::new(metric, data, self.normalize);

        info!(
            n = n,
            k = self.k,
            metric = ?metric,
            init = ?self.init,
            slots = pool.slots(),
            "kmeans fit started"
        );

        let all: Vec<&Record> = data.records().iter().collect();
        let full = summarize(schema, metric, &all);
        let full_std_devs = std_devs(schema, &all);

        let canopies = if self.canopy.enabled || self.init == InitMethod::Canopy {
            Some(Canopies::build(data, &distance, &self.canopy)?)
        } else {
            None
        };

        let mut rng = StdRng::seed_from_u64(self.seed);
        let ctx = SeedContext {
            data,
            distance: &distance,
            k: self.k,
            canopies: canopies.as_ref(),
            canopy_config: &self.canopy,
        };
        let mut centroids = self.init.initialize(&ctx, &mut rng)?;
        if centroids.is_empty() {
            return Err(Error::InsufficientData { needed: 1, got: 0 });
        }
        if centroids.len() < self.k {
            debug!(requested = self.k, seeded = centroids.len(), "fewer distinct seeds than k");
        }
        let initial_start_points = centroids.clone();

        let pruning = match &canopies {
            Some(c) if self.canopy.enabled => {
                let positions: Vec<CanopyPosition> = data.records().iter().map(|r| c.locate(r)).collect();
                Some((c, positions))
            }
            _ => None,
        };

        let mut labels = vec![UNASSIGNED; n];
        let mut nearest_dist: Vec<f64>;
        let mut iterations = 0;
        let mut clusters: Vec<ClusterStats>;

        loop {
            iterations += 1;

            let centroid_positions: Option<Vec<CanopyPosition>> = pruning
                .as_ref()
                .map(|(c, _)| centroids.iter().map(|x| c.locate(x)).collect());
            let prune = pruning
                .as_ref()
                .zip(centroid_positions.as_ref())
                .map(|((_, records), centroids)| Pruning { records, centroids });

            let chunks = pool.run(n, |range| {
                assign_range(data, &distance, &centroids, &labels, prune.as_ref(), range)
            });
            let mut changed = 0;
            let mut skipped = 0;
            let mut next = Vec::with_capacity(n);
            let mut dists = Vec::with_capacity(n);
            for chunk in chunks {
                changed += chunk.changed;
                skipped += chunk.skipped;
                next.extend(chunk.labels);
                dists.extend(chunk.distances);
            }
            labels = next;
            nearest_dist = dists;

            let k = centroids.len();
            let members = group_members(&labels, k);
            let summaries: Vec<Option<ClusterStats>> = if pool.engaged(n) {
                pool.map_ranges(pool.partition(k), |range| {
                    range
                        .map(|c| move_centroid(data, schema, metric, &members[c]))
                        .collect::<Vec<_>>()
                })
                .into_iter()
                .flatten()
                .collect()
            } else {
                members
                    .iter()
                    .map(|m| move_centroid(data, schema, metric, m))
                    .collect()
            };

            let converged = changed == 0 || iterations >= self.max_iter;

            let empty = summaries.iter().filter(|s| s.is_none()).count();
            if empty > 0 {
                warn!(
                    iteration = iterations,
                    empty = empty,
                    remaining = k - empty,
                    "dropping empty clusters"
                );
                let remap = compact_indices(&summaries);
                for l in labels.iter_mut() {
                    *l = remap[*l];
                }
            }
            clusters = summaries.into_iter().flatten().collect();
            centroids = clusters.iter().map(|c| c.centroid.clone()).collect();

            debug!(
                iteration = iterations,
                changed = changed,
                skipped = skipped,
                clusters = centroids.len(),
                "kmeans iteration"
            );

            if converged {
                break;
            }
        }

        let k = centroids.len();
        let mut squared_errors = vec![0.0; k];
        if self.fast_distance {
            for (i, r) in data.records().iter().enumerate() {
                squared_errors[labels[i]] += metric.error(nearest_dist[i], r.weight());
            }
        } else {
            for r in data.records() {
                let (c, d) = nearest(&distance, &centroids, r);
                squared_errors[c] += metric.error(d, r.weight());
            }
        }

        let members = group_members(&labels, k);
        let cluster_std_devs: Vec<Vec<Option<f64>>> = members
            .iter()
            .map(|m| {
                let records: Vec<&Record> = m.iter().map(|&i| data.record(i)).collect();
                std_devs(schema, &records)
            })
            .collect();

        info!(
            iterations = iterations,
            clusters = k,
            error = squared_errors.iter().sum::<f64>(),
            "kmeans fit finished"
        );

        Ok(KmeansModel {
            schema: data.schema_arc(),
            metric,
            init: self.init,
            distance,
            replacer,
            centroids,
            cluster_sizes: clusters.iter().map(|c| c.size).collect(),
            squared_errors,
            std_devs: cluster_std_devs,
            missing_weights: clusters.iter().map(|c| c.missing.clone()).collect(),
            nominal_counts: clusters.into_iter().map(|c| c.nominal_counts).collect(),
            full,
            full_std_devs,
            initial_start_points,
            iterations,
            assignments: self.preserve_order.then_some(labels),
            display_std_devs: self.display_std_devs,
        })
    }
}

impl Clusterer for Kmeans {
    type Model = KmeansModel;

    fn fit(&self, data: &Dataset) -> Result<KmeansModel> {
        self.validate()?;
        let pool = WorkerPool::new(self.execution_slots)?;
        self.fit_with_pool(data, &pool)
    }
}

struct Pruning<'a> {
    records: &'a [CanopyPosition],
    centroids: &'a [CanopyPosition],
}

struct AssignChunk {
    labels: Vec<usize>,
    distances: Vec<f64>,
    changed: usize,
    /// Distance computations avoided by canopy bounds.
    skipped: usize,
}

fn assign_range(
    data: &Dataset,
    distance: &DistanceFunction,
    centroids: &[Record],
    previous: &[usize],
    pruning: Option<&Pruning<'_>>,
    range: Range<usize>,
) -> AssignChunk {
    let mut chunk = AssignChunk {
        labels: Vec::with_capacity(range.len()),
        distances: Vec::with_capacity(range.len()),
        changed: 0,
        skipped: 0,
    };
    for i in range {
        let positions = pruning.map(|p| (&p.records[i], p.centroids));
        let (c, d, skipped) = nearest_pruned(distance, centroids, data.record(i), positions);
        chunk.skipped += skipped;
        if c != previous[i] {
            chunk.changed += 1;
        }
        chunk.labels.push(c);
        chunk.distances.push(d);
    }
    chunk
}

/// Nearest centroid and its distance, lowest index on ties.
fn nearest(distance: &DistanceFunction, centroids: &[Record], record: &Record) -> (usize, f64) {
    let (c, d, _) = nearest_pruned(distance, centroids, record, None);
    (c, d)
}

/// [`nearest`], skipping centroids the canopy bound proves farther than the
/// current best. Also returns how many were skipped.
fn nearest_pruned(
    distance: &DistanceFunction,
    centroids: &[Record],
    record: &Record,
    positions: Option<(&CanopyPosition, &[CanopyPosition])>,
) -> (usize, f64, usize) {
    let mut best = (0, f64::INFINITY);
    let mut skipped = 0;
    for (c, centroid) in centroids.iter().enumerate() {
        if let Some((own, theirs)) = positions {
            if !own.set.intersects(&theirs[c].set) && own.lower_bound(&theirs[c]) > best.1 {
                skipped += 1;
                continue;
            }
        }
        let d = distance.compute(record, centroid, best.1);
        if d < best.1 {
            best = (c, d);
        }
    }
    (best.0, best.1, skipped)
}

fn group_members(labels: &[usize], k: usize) -> Vec<Vec<usize>> {
    let mut members = vec![Vec::new(); k];
    for (i, &l) in labels.iter().enumerate() {
        members[l].push(i);
    }
    members
}

/// Old cluster index → index among the surviving clusters.
fn compact_indices<T>(summaries: &[Option<T>]) -> Vec<usize> {
    let mut next = 0;
    summaries
        .iter()
        .map(|s| {
            let idx = next;
            if s.is_some() {
                next += 1;
            }
            idx
        })
        .collect()
}

/// Centroid and bookkeeping for one cluster.
#[derive(Debug, Clone, PartialEq)]
struct ClusterStats {
    centroid: Record,
    size: f64,
    missing: Vec<f64>,
    nominal_counts: Vec<Vec<f64>>,
}

fn move_centroid(data: &Dataset, schema: &Schema, metric: DistanceMetric, members: &[usize]) -> Option<ClusterStats> {
    if members.is_empty() {
        return None;
    }
    let records: Vec<&Record> = members.iter().map(|&i| data.record(i)).collect();
    Some(summarize(schema, metric, &records))
}

/// Mean (or median) and mode per attribute, plus missing weights and histograms.
fn summarize(schema: &Schema, metric: DistanceMetric, records: &[&Record]) -> ClusterStats {
    let mut values = Vec::with_capacity(schema.len());
    let mut missing = Vec::with_capacity(schema.len());
    let mut nominal_counts = Vec::with_capacity(schema.len());

    for (j, attr) in schema.iter().enumerate() {
        let mut weight_missing = 0.0;
        match attr {
            Attribute::Numeric { .. } => {
                let mut observed = Vec::with_capacity(records.len());
                for r in records {
                    match r.value(j) {
                        Value::Numeric(x) => observed.push((x, r.weight())),
                        _ => weight_missing += r.weight(),
                    }
                }
                let weight: f64 = observed.iter().map(|(_, w)| w).sum();
                let value = if weight <= 0.0 {
                    Value::Missing
                } else if metric.uses_median() {
                    if records.len() == 1 {
                        records[0].value(j)
                    } else {
                        Value::Numeric(weighted_median(observed))
                    }
                } else {
                    Value::Numeric(observed.iter().map(|(x, w)| x * w).sum::<f64>() / weight)
                };
                values.push(value);
                nominal_counts.push(Vec::new());
            }
            Attribute::Nominal { values: labels, .. } => {
                let mut counts = vec![0.0; labels.len()];
                for r in records {
                    match r.value(j) {
                        Value::Nominal(v) => counts[v] += r.weight(),
                        _ => weight_missing += r.weight(),
                    }
                }
                let value = match max_index(&counts) {
                    Some(v) if counts[v] >= weight_missing => Value::Nominal(v),
                    _ => Value::Missing,
                };
                values.push(value);
                nominal_counts.push(counts);
            }
        }
        missing.push(weight_missing);
    }

    ClusterStats {
        centroid: Record::new(values),
        size: records.iter().map(|r| r.weight()).sum(),
        missing,
        nominal_counts,
    }
}

/// Weighted median; averages the two middle values when the cumulative
/// weight lands exactly on half.
fn weighted_median(mut values: Vec<(f64, f64)>) -> f64 {
    values.sort_by(|a, b| a.0.total_cmp(&b.0));
    let half = values.iter().map(|(_, w)| w).sum::<f64>() / 2.0;
    let mut cumulative = 0.0;
    for (i, &(x, w)) in values.iter().enumerate() {
        cumulative += w;
        if cumulative > half {
            return x;
        }
        if cumulative == half && w > 0.0 {
            return match values[i + 1..].iter().find(|(_, w)| *w > 0.0) {
                Some(&(y, _)) => (x + y) / 2.0,
                None => x,
            };
        }
    }
    values.last().map_or(f64::NAN, |v| v.0)
}

/// Weighted standard deviation per numeric attribute; `None` for nominal ones.
fn std_devs(schema: &Schema, records: &[&Record]) -> Vec<Option<f64>> {
    schema
        .iter()
        .enumerate()
        .map(|(j, attr)| {
            attr.is_numeric().then(|| {
                weighted_variance(
                    records
                        .iter()
                        .filter_map(|r| r.value(j).as_f64().map(|x| (x, r.weight()))),
                )
                .sqrt()
            })
        })
        .collect()
}

/// A fitted k-means model.
#[derive(Debug, Clone)]
pub struct KmeansModel {
    schema: Arc<Schema>,
    metric: DistanceMetric,
    init: InitMethod,
    distance: DistanceFunction,
    replacer: Option<MissingValueReplacer>,
    centroids: Vec<Record>,
    cluster_sizes: Vec<f64>,
    squared_errors: Vec<f64>,
    std_devs: Vec<Vec<Option<f64>>>,
    missing_weights: Vec<Vec<f64>>,
    nominal_counts: Vec<Vec<Vec<f64>>>,
    full: ClusterStats,
    full_std_devs: Vec<Option<f64>>,
    initial_start_points: Vec<Record>,
    iterations: usize,
    assignments: Option<Vec<usize>>,
    display_std_devs: bool,
}

impl KmeansModel {
    fn prepare<'a>(&self, record: &'a Record) -> Result<Cow<'a, Record>> {
        self.schema.check(record)?;
        Ok(match &self.replacer {
            Some(r) => Cow::Owned(r.apply(record)),
            None => Cow::Borrowed(record),
        })
    }

    /// Final cluster centres.
    pub fn centroids(&self) -> &[Record] {
        &self.centroids
    }

    /// Sum of member weights per cluster.
    pub fn cluster_sizes(&self) -> &[f64] {
        &self.cluster_sizes
    }

    /// Per-cluster error (squared distances for Euclidean, distances for Manhattan).
    pub fn squared_errors(&self) -> &[f64] {
        &self.squared_errors
    }

    /// Total within-cluster error.
    pub fn squared_error(&self) -> f64 {
        self.squared_errors.iter().sum()
    }

    /// Iterations performed.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Per-record cluster index, kept when order preservation was requested.
    pub fn assignments(&self) -> Option<&[usize]> {
        self.assignments.as_deref()
    }

    /// Per-cluster, per-attribute standard deviation (`None` for nominal attributes).
    pub fn std_devs(&self) -> &[Vec<Option<f64>>] {
        &self.std_devs
    }

    /// Per-cluster, per-attribute weight of missing values.
    pub fn missing_weights(&self) -> &[Vec<f64>] {
        &self.missing_weights
    }

    /// Per-cluster label histograms (empty for numeric attributes).
    pub fn nominal_counts(&self) -> &[Vec<Vec<f64>>] {
        &self.nominal_counts
    }

    /// Centroids as seeded, before the first iteration.
    pub fn initial_start_points(&self) -> &[Record] {
        &self.initial_start_points
    }

    /// Mean/median/mode of the whole training set.
    pub fn full_data_centroid(&self) -> &Record {
        &self.full.centroid
    }

    /// The metric used.
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Membership weights from normalised inverse squared distances.
    ///
    /// One-hot when the record coincides with a centroid.
    pub fn soft_membership(&self, record: &Record) -> Result<Vec<f64>> {
        let record = self.prepare(record)?;
        let dists: Vec<f64> = self
            .centroids
            .iter()
            .map(|c| self.distance.distance(&record, c))
            .collect();
        let mut out = vec![0.0; dists.len()];
        if let Some(hit) = dists.iter().position(|&d| d == 0.0) {
            out[hit] = 1.0;
            return Ok(out);
        }
        let mut total = 0.0;
        for (o, d) in out.iter_mut().zip(&dists) {
            *o = 1.0 / (d * d);
            total += *o;
        }
        for o in out.iter_mut() {
            *o /= total;
        }
        Ok(out)
    }
}

impl ClusterModel for KmeansModel {
    type Report = KmeansReport;

    fn assign(&self, record: &Record) -> Result<usize> {
        let record = self.prepare(record)?;
        Ok(nearest(&self.distance, &self.centroids, &record).0)
    }

    fn membership(&self, record: &Record) -> Result<Vec<f64>> {
        let c = self.assign(record)?;
        let mut out = vec![0.0; self.centroids.len()];
        out[c] = 1.0;
        Ok(out)
    }

    fn cluster_count(&self) -> usize {
        self.centroids.len()
    }

    fn describe(&self) -> KmeansReport {
        let full = CentroidReport {
            size: self.full.size,
            centroid: self.full.centroid.values().to_vec(),
            std_devs: self.display_std_devs.then(|| self.full_std_devs.clone()),
            missing_weight: self.full.missing.clone(),
            nominal_counts: self.full.nominal_counts.clone(),
            error: None,
        };
        let clusters = (0..self.centroids.len())
            .map(|c| CentroidReport {
                size: self.cluster_sizes[c],
                centroid: self.centroids[c].values().to_vec(),
                std_devs: self.display_std_devs.then(|| self.std_devs[c].clone()),
                missing_weight: self.missing_weights[c].clone(),
                nominal_counts: self.nominal_counts[c].clone(),
                error: Some(self.squared_errors[c]),
            })
            .collect();
        KmeansReport {
            metric: self.metric,
            init: self.init,
            iterations: self.iterations,
            error: self.squared_error(),
            attributes: self.schema.iter().cloned().collect(),
            initial_start_points: self
                .initial_start_points
                .iter()
                .map(|r| r.values().to_vec())
                .collect(),
            full_data: full,
            clusters,
        }
    }
}

/// Summary of one centroid column of a [`KmeansReport`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CentroidReport {
    /// Sum of member weights.
    pub size: f64,
    /// Coordinates.
    pub centroid: Vec<Value>,
    /// Standard deviations, when requested.
    pub std_devs: Option<Vec<Option<f64>>>,
    /// Missing weight per attribute.
    pub missing_weight: Vec<f64>,
    /// Label histograms.
    pub nominal_counts: Vec<Vec<f64>>,
    /// Within-cluster error (absent for the full-data column).
    pub error: Option<f64>,
}

/// Structured description of a [`KmeansModel`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KmeansReport {
    /// Distance metric.
    pub metric: DistanceMetric,
    /// Initialisation method.
    pub init: InitMethod,
    /// Iterations performed.
    pub iterations: usize,
    /// Total within-cluster error.
    pub error: f64,
    /// Training schema.
    pub attributes: Vec<Attribute>,
    /// Seeds before the first iteration.
    pub initial_start_points: Vec<Vec<Value>>,
    /// Whole-data column.
    pub full_data: CentroidReport,
    /// One column per cluster.
    pub clusters: Vec<CentroidReport>,
}

impl fmt::Display for KmeansReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "kMeans")?;
        writeln!(f, "======")?;
        writeln!(f)?;
        writeln!(f, "Number of iterations: {}", self.iterations)?;
        let label = match self.metric {
            DistanceMetric::Euclidean => "Within cluster sum of squared errors",
            DistanceMetric::Manhattan => "Sum of within cluster distances",
        };
        writeln!(f, "{label}: {:.4}", self.error)?;
        writeln!(f)?;
        writeln!(f, "Initial starting points ({:?}):", self.init)?;
        for (i, point) in self.initial_start_points.iter().enumerate() {
            let cells: Vec<String> = point
                .iter()
                .zip(&self.attributes)
                .map(|(v, a)| super::format_value(a, *v))
                .collect();
            writeln!(f, "Cluster {i}: {}", cells.join(","))?;
        }
        writeln!(f)?;
        writeln!(f, "Final cluster centroids:")?;

        let columns: Vec<&CentroidReport> = std::iter::once(&self.full_data).chain(&self.clusters).collect();
        let mut rows = Vec::new();
        let mut header = vec!["Attribute".to_string(), "Full Data".to_string()];
        header.extend((0..self.clusters.len()).map(|c| c.to_string()));
        rows.push(header);
        let mut sizes = vec![String::new()];
        sizes.extend(columns.iter().map(|c| format!("({})", c.size)));
        rows.push(sizes);

        for (j, attr) in self.attributes.iter().enumerate() {
            let mut row = vec![attr.name().to_string()];
            row.extend(columns.iter().map(|c| super::format_value(attr, c.centroid[j])));
            rows.push(row);
            if attr.is_numeric() && columns.iter().all(|c| c.std_devs.is_some()) {
                let mut row = vec![String::new()];
                row.extend(columns.iter().map(|c| {
                    match c.std_devs.as_ref().and_then(|s| s[j]) {
                        Some(sd) => format!("+/-{sd:.4}"),
                        None => String::new(),
                    }
                }));
                rows.push(row);
            }
        }
        write_table(f, &rows)
    }
}
