//! Canopy pre-clustering.
//!
//! A single cheap pass over the records that produces overlapping regions
//! ("canopies") around candidate centres, using two radii:
//!
//! - **T2** (tight): a record within T2 of a candidate adds its weight to the
//!   candidate's density and to the running centre estimate.
//! - **T1** (loose, `T1 >= T2`): a record within T1 of some candidate is
//!   covered; a record covered by no candidate becomes a new candidate.
//!
//! At most `max_candidates` candidates are held at once. Every
//! `pruning_period` records, and once at the end, candidates whose density
//! is below `min_density` are dropped.
//!
//! The result serves two purposes:
//!
//! 1. **Seeding**: the densest canopy centres become initial k-means centroids.
//! 2. **Pruning**: every record and every centroid is located against the
//!    canopies ([`CanopyPosition`]): the set of canopies within T1 plus the
//!    exact distance to each centre. When a centroid shares no canopy with a
//!    record, the centres give a triangle-inequality lower bound on their
//!    distance, and the centroid is skipped only if that bound already loses
//!    to the best centroid found so far.
//!
//! # References
//!
//! McCallum, Nigam & Ungar (2000). "Efficient Clustering of High-Dimensional
//! Data Sets with Application to Reference Matching." KDD-00.

use crate::data::{max_index, Attribute, Dataset, Record, Schema, Value};
use crate::distance::{Distance, DistanceFunction};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Canopy parameters.
///
/// A negative `t2` asks for the radius to be derived from the spread of the
/// data; a negative `t1` is read as a positive multiplier of T2.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanopyConfig {
    /// Use canopies to skip distance computations during k-means assignment.
    pub enabled: bool,
    /// Loose radius.
    pub t1: f64,
    /// Tight radius.
    pub t2: f64,
    /// Maximum candidate canopies held in memory.
    pub max_candidates: usize,
    /// Prune low-density candidates after this many records.
    pub pruning_period: usize,
    /// Minimum T2 density a candidate needs to survive pruning.
    pub min_density: f64,
}

impl Default for CanopyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            t1: -1.25,
            t2: -1.0,
            max_candidates: 100,
            pruning_period: 10_000,
            min_density: 2.0,
        }
    }
}

impl CanopyConfig {
    /// Enable or disable canopy pruning.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the loose radius (negative = multiple of T2).
    pub fn with_t1(mut self, t1: f64) -> Self {
        self.t1 = t1;
        self
    }

    /// Set the tight radius (negative = heuristic).
    pub fn with_t2(mut self, t2: f64) -> Self {
        self.t2 = t2;
        self
    }

    /// Set the candidate cap.
    pub fn with_max_candidates(mut self, max: usize) -> Self {
        self.max_candidates = max;
        self
    }

    /// Set the periodic pruning rate.
    pub fn with_pruning_period(mut self, period: usize) -> Self {
        self.pruning_period = period;
        self
    }

    /// Set the minimum density.
    pub fn with_min_density(mut self, density: f64) -> Self {
        self.min_density = density;
        self
    }

    /// Check parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if self.max_candidates == 0 {
            return Err(Error::invalid("canopy.max_candidates", "must be > 0"));
        }
        if self.pruning_period == 0 {
            return Err(Error::invalid("canopy.pruning_period", "must be > 0"));
        }
        if self.t1.is_nan() || self.t2.is_nan() || self.t2 == 0.0 {
            return Err(Error::invalid("canopy.t2", "radii must be non-zero numbers"));
        }
        if self.t1 > 0.0 && self.t2 > 0.0 && self.t1 < self.t2 {
            return Err(Error::invalid("canopy.t1", "T1 must be >= T2"));
        }
        Ok(())
    }
}

/// Set of canopy indices, stored as a bitset.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CanopySet {
    bits: Vec<u64>,
}

impl CanopySet {
    fn with_capacity(n: usize) -> Self {
        Self {
            bits: vec![0; n.div_ceil(64)],
        }
    }

    fn insert(&mut self, index: usize) {
        self.bits[index / 64] |= 1 << (index % 64);
    }

    /// Whether canopy `index` is in the set.
    pub fn contains(&self, index: usize) -> bool {
        self.bits
            .get(index / 64)
            .is_some_and(|w| w & (1 << (index % 64)) != 0)
    }

    /// True when no canopy covers the point.
    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|&w| w == 0)
    }

    /// Number of canopies in the set.
    pub fn len(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// True when the two sets share a canopy.
    pub fn intersects(&self, other: &CanopySet) -> bool {
        self.bits.iter().zip(&other.bits).any(|(a, b)| a & b != 0)
    }

    /// Canopy indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits.iter().enumerate().flat_map(|(word, &bits)| {
            (0..64)
                .filter(move |&b| bits & (1u64 << b) != 0)
                .map(move |b| word * 64 + b)
        })
    }
}

/// A point located against a set of canopies.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CanopyPosition {
    /// Canopies within T1 of the point.
    pub set: CanopySet,
    /// Exact distance to every canopy centre, NaN for centres with a missing
    /// value. Empty when the point itself has a missing value.
    pub distances: Vec<f64>,
}

impl CanopyPosition {
    /// Lower bound on the distance between two located points.
    ///
    /// Uses `|d(a, z) - d(b, z)| <= d(a, b)` for each centre `z` in this
    /// point's set, shrunk slightly to absorb rounding. Missing-value
    /// differences do not obey the triangle inequality, so pairs involving
    /// one contribute nothing and the bound falls back to 0.
    pub fn lower_bound(&self, other: &CanopyPosition) -> f64 {
        if self.distances.is_empty() || other.distances.is_empty() {
            return 0.0;
        }
        self.set
            .iter()
            .map(|j| {
                let (a, b) = (self.distances[j], other.distances[j]);
                (a - b).abs() - ROUNDING_SLACK * (a + b)
            })
            .filter(|bound| !bound.is_nan())
            .fold(0.0, f64::max)
    }
}

const ROUNDING_SLACK: f64 = 1e-9;

/// Running weighted mean/mode of the records near a candidate.
#[derive(Debug, Clone)]
struct CentreAccumulator {
    numeric: Vec<(f64, f64)>,
    nominal: Vec<Vec<f64>>,
}

impl CentreAccumulator {
    fn new(schema: &Schema) -> Self {
        Self {
            numeric: vec![(0.0, 0.0); schema.len()],
            nominal: schema.iter().map(|a| vec![0.0; a.num_values()]).collect(),
        }
    }

    fn add(&mut self, record: &Record) {
        let w = record.weight();
        for (attr, value) in record.values().iter().enumerate() {
            match *value {
                Value::Numeric(x) => {
                    self.numeric[attr].0 += w * x;
                    self.numeric[attr].1 += w;
                }
                Value::Nominal(v) => self.nominal[attr][v] += w,
                Value::Missing => {}
            }
        }
    }

    fn centre(&self, schema: &Schema) -> Record {
        let values = schema
            .iter()
            .enumerate()
            .map(|(attr, a)| match a {
                Attribute::Numeric { .. } => {
                    let (sum, w) = self.numeric[attr];
                    if w > 0.0 {
                        Value::Numeric(sum / w)
                    } else {
                        Value::Missing
                    }
                }
                Attribute::Nominal { .. } => match max_index(&self.nominal[attr]) {
                    Some(v) if self.nominal[attr][v] > 0.0 => Value::Nominal(v),
                    _ => Value::Missing,
                },
            })
            .collect();
        Record::new(values)
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    seed: Record,
    density: f64,
    acc: CentreAccumulator,
}

/// Canopies built from one dataset.
#[derive(Debug, Clone)]
pub struct Canopies {
    centres: Vec<Record>,
    densities: Vec<f64>,
    t1: f64,
    t2: f64,
    distance: DistanceFunction,
}

impl Canopies {
    /// Run the canopy pass over `data`.
    pub fn build(data: &Dataset, distance: &DistanceFunction, config: &CanopyConfig) -> Result<Self> {
        config.validate()?;
        if data.is_empty() {
            return Err(Error::EmptyInput);
        }

        let t2 = if config.t2 > 0.0 {
            config.t2
        } else {
            heuristic_t2(data, distance)
        };
        let t1 = if config.t1 < 0.0 { -config.t1 * t2 } else { config.t1 };
        if t1 < t2 {
            return Err(Error::invalid("canopy.t1", "T1 must be >= T2"));
        }

        let schema = data.schema();
        let mut candidates: Vec<Candidate> = Vec::new();

        for (i, record) in data.records().iter().enumerate() {
            let mut covered = false;
            for c in candidates.iter_mut() {
                let d = distance.distance(record, &c.seed);
                if d < t2 {
                    c.density += record.weight();
                    c.acc.add(record);
                }
                if d < t1 {
                    covered = true;
                }
            }

            if !covered {
                if candidates.len() >= config.max_candidates {
                    prune(&mut candidates, config.min_density);
                }
                if candidates.len() >= config.max_candidates {
                    evict_sparsest(&mut candidates);
                }
                let mut acc = CentreAccumulator::new(schema);
                acc.add(record);
                candidates.push(Candidate {
                    seed: record.clone(),
                    density: record.weight(),
                    acc,
                });
            }

            if (i + 1) % config.pruning_period == 0 {
                prune(&mut candidates, config.min_density);
            }
        }
        prune(&mut candidates, config.min_density);

        debug!(
            canopies = candidates.len(),
            t1 = t1,
            t2 = t2,
            "canopy pass complete"
        );

        Ok(Self {
            centres: candidates.iter().map(|c| c.acc.centre(schema)).collect(),
            densities: candidates.iter().map(|c| c.density).collect(),
            t1,
            t2,
            distance: distance.clone(),
        })
    }

    /// Number of canopies.
    pub fn len(&self) -> usize {
        self.centres.len()
    }

    /// True when no canopy survived.
    pub fn is_empty(&self) -> bool {
        self.centres.is_empty()
    }

    /// Canopy centres.
    pub fn centres(&self) -> &[Record] {
        &self.centres
    }

    /// T2 density of each canopy.
    pub fn densities(&self) -> &[f64] {
        &self.densities
    }

    /// Resolved loose radius.
    pub fn t1(&self) -> f64 {
        self.t1
    }

    /// Resolved tight radius.
    pub fn t2(&self) -> f64 {
        self.t2
    }

    /// Canopies whose centre lies within T1 of `record`.
    pub fn assign(&self, record: &Record) -> CanopySet {
        let mut set = CanopySet::with_capacity(self.centres.len());
        for (i, c) in self.centres.iter().enumerate() {
            if self.distance.compute(record, c, self.t1) < self.t1 {
                set.insert(i);
            }
        }
        set
    }

    /// Canopy set and centre distances of `record`.
    pub fn locate(&self, record: &Record) -> CanopyPosition {
        let complete = !record.values().iter().any(Value::is_missing);
        let mut set = CanopySet::with_capacity(self.centres.len());
        let mut distances = Vec::with_capacity(if complete { self.centres.len() } else { 0 });
        for (i, c) in self.centres.iter().enumerate() {
            let d = self.distance.distance(record, c);
            if d < self.t1 {
                set.insert(i);
            }
            if complete {
                let usable = !c.values().iter().any(Value::is_missing);
                distances.push(if usable { d } else { f64::NAN });
            }
        }
        CanopyPosition { set, distances }
    }

    /// Up to `k` centres, densest first (ties keep creation order).
    pub fn densest(&self, k: usize) -> Vec<Record> {
        let mut order: Vec<usize> = (0..self.centres.len()).collect();
        order.sort_by(|&a, &b| self.densities[b].total_cmp(&self.densities[a]));
        order
            .into_iter()
            .take(k)
            .map(|i| self.centres[i].clone())
            .collect()
    }
}

/// Drop candidates below `min_density`, unless that would drop them all.
fn prune(candidates: &mut Vec<Candidate>, min_density: f64) {
    if candidates.iter().any(|c| c.density >= min_density) {
        candidates.retain(|c| c.density >= min_density);
    }
}

fn evict_sparsest(candidates: &mut Vec<Candidate>) {
    if let Some((i, _)) = candidates
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.density.total_cmp(&b.density))
    {
        candidates.remove(i);
    }
}

/// T2 derived from the spread of the data.
///
/// Half the root of the summed per-attribute variances, measured in the
/// distance's own units; each nominal attribute counts as 0.25. Falls back
/// to 1 when that is zero.
pub fn heuristic_t2(data: &Dataset, distance: &DistanceFunction) -> f64 {
    let mut total = 0.0;
    for (attr, a) in data.schema().iter().enumerate() {
        if a.is_nominal() {
            total += 0.25;
            continue;
        }
        let var = data.variance(attr);
        total += match data.range(attr) {
            Some((lo, hi)) if distance.normalizes() && hi > lo => var / ((hi - lo) * (hi - lo)),
            Some(_) if distance.normalizes() => 0.0,
            _ => var,
        };
    }
    let t2 = 0.5 * total.sqrt();
    if t2 > 0.0 && t2.is_finite() {
        t2
    } else {
        1.0
    }
}
