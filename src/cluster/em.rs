//! Expectation-maximization over a mixture of per-attribute distributions.
//!
//! Each cluster models numeric attributes with a univariate Gaussian and
//! nominal attributes with a smoothed categorical (see [`super::mixture`]).
//!
//! # The EM Algorithm
//!
//! **E-step**: membership of record n in cluster c:
//! ```text
//! γₙc = πc p(xₙ | c) / Σⱼ πⱼ p(xₙ | j)
//! ```
//!
//! **M-step**: re-estimate from membership-weighted sums:
//! - πc = Σₙ wₙ γₙc, normalised
//! - μ = Σ wγx / Σ wγ
//! - σ² = (Σ wγx² - (Σ wγx)² / Σ wγ) / Σ wγ, floored
//!
//! The objective is the weighted mean log-likelihood. Iteration stops when it
//! improves by less than `min_log_likelihood_improvement`. If the last step
//! made it worse, the previous parameters are restored.
//!
//! # Initialisation
//!
//! The best of `kmeans_runs` k-means fits (lowest squared error) supplies
//! means, standard deviations, label counts and priors.
//!
//! # Choosing k
//!
//! With [`ClusterCount::Auto`], k = 1, 2, ... is scored by mean held-out
//! log-likelihood over `num_folds` folds. The search stops at the first k that
//! fails to improve on k - 1 by more than `min_log_likelihood_improvement_cv`,
//! and the previous k is kept.
//!
//! # Failure Modes
//!
//! - **Degenerate parameters**: a non-finite log-likelihood or zero prior mass,
//!   in initialisation or iteration, restarts the fit with the next seed;
//!   after repeated failures k shrinks
//! - **Local optima**: EM converges to a local maximum; more k-means runs help

use super::kmeans::{Kmeans, KmeansModel};
use super::mixture::{
    log_sum_exp, logs_to_probs, normalize, AttributeEstimator, DiscreteEstimator, Generations, MixtureParams,
    NormalEstimator, StdDevPolicy, SufficientStats,
};
use super::{write_table, ClusterModel, Clusterer};
use crate::data::{max_index, Attribute, Dataset, MissingValueReplacer, Record, Schema, Value};
use crate::error::{Error, Result};
use crate::pool::WorkerPool;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Values drawn and discarded from every freshly seeded generator.
pub const BURN_IN_DRAWS: usize = 10;

/// Restarts at one k before k is reduced, and retries of one search level.
const MAX_RESTARTS: usize = 5;

/// Below this many records the cross-validated search is skipped and k = 1.
const MIN_RECORDS_FOR_CV: usize = 10;

/// Generator for `seed` with the first [`BURN_IN_DRAWS`] doubles discarded.
pub fn seeded_rng(seed: u64) -> StdRng {
    let mut rng = StdRng::seed_from_u64(seed);
    for _ in 0..BURN_IN_DRAWS {
        let _: f64 = rng.random();
    }
    rng
}

/// Generator for a restart: burn-in discards a double and an integer per draw.
fn restart_rng(seed: u64) -> StdRng {
    let mut rng = StdRng::seed_from_u64(seed);
    for _ in 0..BURN_IN_DRAWS {
        let _: f64 = rng.random();
        let _: u32 = rng.random();
    }
    rng
}

/// Requested number of clusters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterCount {
    /// Choose k by cross-validation.
    #[default]
    Auto,
    /// Use exactly this many (fewer if the data cannot support them).
    Fixed(usize),
}

/// EM clustering.
#[derive(Debug, Clone)]
pub struct Em {
    num_clusters: ClusterCount,
    max_iter: usize,
    min_improvement: f64,
    min_improvement_cv: f64,
    num_folds: usize,
    max_clusters: Option<usize>,
    min_std_dev: f64,
    min_std_dev_per_attribute: Option<Vec<f64>>,
    kmeans_runs: usize,
    execution_slots: usize,
    seed: u64,
}

impl Default for Em {
    fn default() -> Self {
        Self::new()
    }
}

impl Em {
    /// EM with automatic cluster-count selection.
    pub fn new() -> Self {
        Self {
            num_clusters: ClusterCount::Auto,
            max_iter: 100,
            min_improvement: 1e-6,
            min_improvement_cv: 1e-6,
            num_folds: 10,
            max_clusters: None,
            min_std_dev: 1e-6,
            min_std_dev_per_attribute: None,
            kmeans_runs: 10,
            execution_slots: 1,
            seed: 100,
        }
    }

    /// Set the cluster count.
    pub fn with_num_clusters(mut self, count: ClusterCount) -> Self {
        self.num_clusters = count;
        self
    }

    /// Set maximum iterations.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Minimum log-likelihood gain to keep iterating.
    pub fn with_min_improvement(mut self, eps: f64) -> Self {
        self.min_improvement = eps;
        self
    }

    /// Minimum held-out log-likelihood gain to try one more cluster.
    pub fn with_min_improvement_cv(mut self, eps: f64) -> Self {
        self.min_improvement_cv = eps;
        self
    }

    /// Set the number of cross-validation folds.
    pub fn with_num_folds(mut self, folds: usize) -> Self {
        self.num_folds = folds;
        self
    }

    /// Upper bound for the cross-validated search.
    pub fn with_max_clusters(mut self, max: usize) -> Self {
        self.max_clusters = Some(max);
        self
    }

    /// Standard-deviation floor.
    pub fn with_min_std_dev(mut self, min: f64) -> Self {
        self.min_std_dev = min;
        self
    }

    /// Per-attribute standard-deviation floors (overrides the single floor).
    pub fn with_min_std_dev_per_attribute(mut self, floors: Vec<f64>) -> Self {
        self.min_std_dev_per_attribute = Some(floors);
        self
    }

    /// Number of k-means fits tried for initialisation.
    pub fn with_kmeans_runs(mut self, runs: usize) -> Self {
        self.kmeans_runs = runs;
        self
    }

    /// Set the number of execution slots.
    pub fn with_execution_slots(mut self, slots: usize) -> Self {
        self.execution_slots = slots;
        self
    }

    /// Set random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.num_clusters == ClusterCount::Fixed(0) {
            return Err(Error::invalid("num_clusters", "must be > 0"));
        }
        if self.max_iter == 0 {
            return Err(Error::invalid("max_iterations", "must be > 0"));
        }
        if self.num_folds < 2 {
            return Err(Error::invalid("num_folds", "must be >= 2"));
        }
        if self.max_clusters == Some(0) {
            return Err(Error::invalid("max_clusters", "must be > 0"));
        }
        if !(self.min_std_dev > 0.0) {
            return Err(Error::invalid("min_std_dev", "must be > 0"));
        }
        if self.kmeans_runs == 0 {
            return Err(Error::invalid("kmeans_runs", "must be > 0"));
        }
        if self.execution_slots == 0 {
            return Err(Error::invalid("execution_slots", "must be > 0"));
        }
        Ok(())
    }

    fn floors(&self, schema: &Schema) -> Result<Vec<f64>> {
        match &self.min_std_dev_per_attribute {
            None => Ok(vec![self.min_std_dev; schema.len()]),
            Some(f) if f.len() == schema.len() => Ok(f.clone()),
            Some(f) => Err(Error::invalid(
                "min_std_dev_per_attribute",
                format!("expected {} values, got {}", schema.len(), f.len()),
            )),
        }
    }

    fn policy(&self, data: &Dataset, floors: &[f64]) -> StdDevPolicy {
        StdDevPolicy {
            floors: floors.to_vec(),
            global: (0..data.num_attributes())
                .map(|j| data.variance(j).sqrt())
                .collect(),
            min_std_dev: self.min_std_dev,
        }
    }

    /// Fit k clusters to `data`, restarting with new seeds on degenerate fits.
    fn fit_fixed(&self, data: &Dataset, k: usize, floors: &[f64], pool: &mut WorkerPool) -> Result<Trained> {
        let policy = self.policy(data, floors);
        self.with_restarts(k, pool, |k, rng, pool| {
            let params = self.initialize(data, k, &policy, rng, pool)?;
            self.iterate(data, params, &policy, pool)
        })
    }

    /// Run `attempt` at k until it succeeds or fails unrecoverably.
    ///
    /// A recoverable failure, in initialisation or iteration alike, bumps the
    /// seed, reseeds with burn-in and rebuilds the pool. After more than
    /// [`MAX_RESTARTS`] restarts at one k, k drops by one; reaching zero is an
    /// error.
    fn with_restarts<T>(
        &self,
        k: usize,
        pool: &mut WorkerPool,
        mut attempt: impl FnMut(usize, &mut StdRng, &WorkerPool) -> Result<T>,
    ) -> Result<T> {
        let mut rng = seeded_rng(self.seed);
        let mut k = k;
        let mut seed = self.seed;
        let mut restarts = 0;

        loop {
            match attempt(k, &mut rng, &*pool) {
                Ok(done) => return Ok(done),
                Err(e) if e.is_recoverable() => {
                    seed = seed.wrapping_add(1);
                    restarts += 1;
                    rng = restart_rng(seed);
                    if restarts > MAX_RESTARTS {
                        k -= 1;
                        restarts = 0;
                        if k == 0 {
                            return Err(Error::NumericDegeneracy(format!(
                                "EM failed for every cluster count: {e}"
                            )));
                        }
                        warn!(clusters = k, "reducing cluster count after repeated failures");
                    } else {
                        warn!(seed = seed, restart = restarts, error = %e, "restarting EM");
                    }
                    *pool = WorkerPool::new(self.execution_slots)?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Best of several k-means runs, converted to mixture parameters.
    fn initialize(
        &self,
        data: &Dataset,
        k: usize,
        policy: &StdDevPolicy,
        rng: &mut StdRng,
        pool: &WorkerPool,
    ) -> Result<MixtureParams> {
        let mut best: Option<KmeansModel> = None;
        for _ in 0..self.kmeans_runs {
            let seed = u64::from(rng.random::<u32>());
            let model = Kmeans::new(k)
                .with_seed(seed)
                .with_execution_slots(self.execution_slots)
                .with_display_std_devs(true)
                .with_replace_missing(false)
                .fit_with_pool(data, pool)?;
            if best.as_ref().map_or(true, |b| model.squared_error() < b.squared_error()) {
                best = Some(model);
            }
        }
        let best = best.ok_or_else(|| Error::invalid("kmeans_runs", "must be > 0"))?;
        params_from_kmeans(&best, data, policy)
    }

    fn iterate(&self, data: &Dataset, init: MixtureParams, policy: &StdDevPolicy, pool: &WorkerPool) -> Result<Trained> {
        let k = init.num_clusters();
        let mut generations = Generations::new(init);
        let mut trace = Vec::new();
        let mut llk = 0.0;
        let mut performed = None;

        for i in 0..self.max_iter {
            let llk_old = llk;
            let (ll, memberships) = e_step(data, generations.current(), pool)?;
            llk = ll;
            trace.push(llk);
            debug!(iteration = i, log_likelihood = llk, "EM iteration");

            if i > 0 && llk - llk_old < self.min_improvement {
                if llk - llk_old < 0.0 {
                    generations.rollback();
                    llk = llk_old;
                    performed = Some(i - 1);
                } else {
                    performed = Some(i);
                }
                break;
            }

            let next = m_step(data, &memberships, k, policy, pool)?;
            generations.advance(next);
        }

        Ok(Trained {
            params: generations.into_current(),
            iterations: performed.unwrap_or(self.max_iter),
            log_likelihood: llk,
            trace,
        })
    }

    /// Cross-validated search over k = 1, 2, ...
    fn select_cluster_count(&self, data: &Dataset, floors: &[f64], pool: &mut WorkerPool) -> Result<usize> {
        self.search_cluster_count(data, pool, |em, train, test, k, pool| {
            let trained = em.fit_fixed(train, k, floors, pool)?;
            e_step(test, &trained.params, pool).map(|(ll, _)| ll)
        })
    }

    /// The search itself; `score` fits one training fold at k and returns
    /// the held-out log-likelihood.
    ///
    /// A recoverable fold failure retries the whole level with the next
    /// seed. More than [`MAX_RESTARTS`] retries abort the search, keeping the
    /// last accepted k.
    fn search_cluster_count(
        &self,
        data: &Dataset,
        pool: &mut WorkerPool,
        mut score: impl FnMut(&Em, &Dataset, &Dataset, usize, &mut WorkerPool) -> Result<f64>,
    ) -> Result<usize> {
        let n = data.len();
        let folds = self.num_folds.min(n);
        let upper = self.max_clusters.unwrap_or(usize::MAX);
        let mut best = f64::MIN;
        let mut num = 1;
        let mut seed = self.seed;
        let mut retries = 0;

        'search: while num <= upper {
            let mut cvr = StdRng::seed_from_u64(self.seed);
            let shuffled = data.shuffled(&mut cvr);
            let mut total = 0.0;
            let mut failed = false;

            for fold in 0..folds {
                let (train_idx, test_idx) = fold_split(n, folds, fold);
                let train = shuffled.subset(&train_idx).shuffled(&mut cvr);
                if num > train.len() {
                    debug!(clusters = num, train = train.len(), "too few records for this level");
                    break 'search;
                }
                let test = shuffled.subset(&test_idx);
                let fold_em = Em {
                    seed,
                    ..self.clone()
                };
                match score(&fold_em, &train, &test, num, &mut *pool) {
                    Ok(ll) => total += ll,
                    Err(e) if e.is_recoverable() => {
                        seed = seed.wrapping_add(1);
                        retries += 1;
                        failed = true;
                        warn!(clusters = num, fold = fold, error = %e, "cross-validation fold failed");
                        break;
                    }
                    Err(e) => return Err(e),
                }
            }

            if failed {
                if retries > MAX_RESTARTS {
                    warn!(clusters = num, "aborting cluster-count search");
                    break;
                }
                continue;
            }
            retries = 0;
            seed = self.seed;

            let mean = total / folds as f64;
            debug!(clusters = num, mean_log_likelihood = mean, "cross-validation level");
            if mean - best > self.min_improvement_cv {
                best = mean;
                num += 1;
            } else {
                break;
            }
        }

        Ok((num - 1).max(1))
    }
}

impl Clusterer for Em {
    type Model = EmModel;

    fn fit(&self, data: &Dataset) -> Result<EmModel> {
        self.validate()?;
        if data.is_empty() {
            return Err(Error::EmptyInput);
        }
        let floors = self.floors(data.schema())?;
        let replacer = MissingValueReplacer::fit(data);
        let data = replacer.apply_dataset(data);
        let mut pool = WorkerPool::new(self.execution_slots)?;

        info!(
            n = data.len(),
            clusters = ?self.num_clusters,
            slots = pool.slots(),
            "EM fit started"
        );

        let (k, selected) = match self.num_clusters {
            ClusterCount::Fixed(k) => (k, false),
            ClusterCount::Auto if data.len() < MIN_RECORDS_FOR_CV => (1, false),
            ClusterCount::Auto => (self.select_cluster_count(&data, &floors, &mut pool)?, true),
        };

        let trained = self.fit_fixed(&data, k, &floors, &mut pool)?;

        info!(
            clusters = trained.params.num_clusters(),
            iterations = trained.iterations,
            log_likelihood = trained.log_likelihood,
            "EM fit finished"
        );

        Ok(EmModel {
            schema: data.schema_arc(),
            replacer,
            params: trained.params,
            iterations: trained.iterations,
            log_likelihood: trained.log_likelihood,
            trace: trained.trace,
            selected_by_cross_validation: selected,
        })
    }
}

#[derive(Debug, Clone)]
struct Trained {
    params: MixtureParams,
    iterations: usize,
    log_likelihood: f64,
    trace: Vec<f64>,
}

/// Train/test indices of one fold over `n` shuffled records.
///
/// Fold sizes differ by at most one; the first `n % folds` folds get the extra record.
fn fold_split(n: usize, folds: usize, fold: usize) -> (Vec<usize>, Vec<usize>) {
    let per = n / folds;
    let rem = n % folds;
    let (size, offset) = if fold < rem { (per + 1, fold) } else { (per, rem) };
    let first = fold * per + offset;
    let test: Vec<usize> = (first..first + size).collect();
    let train: Vec<usize> = (0..first).chain(first + size..n).collect();
    (train, test)
}

fn params_from_kmeans(model: &KmeansModel, data: &Dataset, policy: &StdDevPolicy) -> Result<MixtureParams> {
    let schema = data.schema();
    let mut estimators = Vec::with_capacity(model.cluster_count());

    for c in 0..model.cluster_count() {
        let centroid = &model.centroids()[c];
        let cluster = schema
            .iter()
            .enumerate()
            .map(|(j, attr)| match attr {
                Attribute::Nominal { values, .. } => {
                    let mut d = DiscreteEstimator::laplace(values.len());
                    for (v, &count) in model.nominal_counts()[c][j].iter().enumerate() {
                        d.add(v, count);
                    }
                    AttributeEstimator::Discrete(d)
                }
                Attribute::Numeric { .. } => {
                    let floor = policy.floors[j];
                    let mean = match centroid.value(j) {
                        Value::Numeric(x) => x,
                        _ => data.mean_or_mode(j).as_f64().unwrap_or(0.0),
                    };
                    let mut std_dev = model.std_devs()[c][j].unwrap_or(f64::NAN);
                    if std_dev < floor {
                        std_dev = policy.global[j];
                        if std_dev.is_infinite() || std_dev < floor {
                            std_dev = floor;
                        }
                    }
                    if std_dev <= 0.0 || std_dev.is_nan() {
                        std_dev = policy.min_std_dev;
                    }
                    AttributeEstimator::Normal(NormalEstimator {
                        mean,
                        std_dev,
                        weight_sum: 1.0,
                    })
                }
            })
            .collect();
        estimators.push(cluster);
    }

    let mut priors = model.cluster_sizes().to_vec();
    normalize(&mut priors)?;
    Ok(MixtureParams::new(priors, estimators))
}

struct EChunk {
    start: usize,
    memberships: Vec<Vec<f64>>,
    log_likelihood: f64,
    weight: f64,
}

fn e_range(data: &Dataset, params: &MixtureParams, range: Range<usize>) -> Result<EChunk> {
    let mut chunk = EChunk {
        start: range.start,
        memberships: Vec::with_capacity(range.len()),
        log_likelihood: 0.0,
        weight: 0.0,
    };
    for i in range {
        let record = data.record(i);
        let joint = params.log_joint(record);
        chunk.memberships.push(logs_to_probs(&joint)?);
        chunk.log_likelihood += record.weight() * log_sum_exp(&joint);
        chunk.weight += record.weight();
    }
    Ok(chunk)
}

/// Memberships and weighted mean log-likelihood.
fn e_step(data: &Dataset, params: &MixtureParams, pool: &WorkerPool) -> Result<(f64, Array2<f64>)> {
    let n = data.len();
    let k = params.num_clusters();
    let chunks = pool.run(n, |range| e_range(data, params, range));

    let mut memberships = Array2::zeros((n, k));
    let mut log_likelihood = 0.0;
    let mut weight = 0.0;
    for chunk in chunks {
        let chunk = chunk?;
        log_likelihood += chunk.log_likelihood;
        weight += chunk.weight;
        for (offset, probs) in chunk.memberships.iter().enumerate() {
            for (c, &p) in probs.iter().enumerate() {
                memberships[[chunk.start + offset, c]] = p;
            }
        }
    }

    let mean = if weight > 0.0 { log_likelihood / weight } else { 0.0 };
    if !mean.is_finite() {
        return Err(Error::NumericDegeneracy(format!("log-likelihood is {mean}")));
    }
    Ok((mean, memberships))
}

fn m_step(
    data: &Dataset,
    memberships: &Array2<f64>,
    k: usize,
    policy: &StdDevPolicy,
    pool: &WorkerPool,
) -> Result<MixtureParams> {
    let schema = data.schema();
    let partials = pool.run(data.len(), |range| {
        let mut stats = SufficientStats::new(schema, k);
        for i in range {
            stats.accumulate(data.record(i), memberships.row(i));
        }
        stats
    });

    let mut partials = partials.into_iter();
    let mut stats = partials.next().unwrap_or_else(|| SufficientStats::new(schema, k));
    for p in partials {
        stats.merge(p);
    }
    stats.finish(policy)
}

/// A fitted EM model.
#[derive(Debug, Clone)]
pub struct EmModel {
    schema: Arc<Schema>,
    replacer: MissingValueReplacer,
    params: MixtureParams,
    iterations: usize,
    log_likelihood: f64,
    trace: Vec<f64>,
    selected_by_cross_validation: bool,
}

impl EmModel {
    fn prepare(&self, record: &Record) -> Result<Record> {
        self.schema.check(record)?;
        Ok(self.replacer.apply(record))
    }

    /// Fitted priors and estimators.
    pub fn params(&self) -> &MixtureParams {
        &self.params
    }

    /// Cluster priors.
    pub fn priors(&self) -> &[f64] {
        self.params.priors()
    }

    /// `log p(x | c)` per cluster.
    pub fn log_density_per_cluster(&self, record: &Record) -> Result<Vec<f64>> {
        Ok(self.params.log_density_per_cluster(&self.prepare(record)?))
    }

    /// `log p(x, c)` per cluster.
    pub fn log_joint_densities(&self, record: &Record) -> Result<Vec<f64>> {
        Ok(self.params.log_joint(&self.prepare(record)?))
    }

    /// `log p(x)` under the mixture.
    pub fn log_density(&self, record: &Record) -> Result<f64> {
        Ok(log_sum_exp(&self.log_joint_densities(record)?))
    }

    /// Iterations performed in the final fit.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Mean log-likelihood of the training data under the final parameters.
    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    /// Mean log-likelihood after every E-step of the final fit.
    pub fn log_likelihood_trace(&self) -> &[f64] {
        &self.trace
    }

    /// Whether k was chosen by cross-validation.
    pub fn selected_by_cross_validation(&self) -> bool {
        self.selected_by_cross_validation
    }
}

impl ClusterModel for EmModel {
    type Report = EmReport;

    fn assign(&self, record: &Record) -> Result<usize> {
        let joint = self.log_joint_densities(record)?;
        max_index(&joint).ok_or_else(|| Error::NumericDegeneracy("model has no clusters".to_string()))
    }

    fn membership(&self, record: &Record) -> Result<Vec<f64>> {
        logs_to_probs(&self.log_joint_densities(record)?)
    }

    fn cluster_count(&self) -> usize {
        self.params.num_clusters()
    }

    fn describe(&self) -> EmReport {
        EmReport {
            num_clusters: self.params.num_clusters(),
            selected_by_cross_validation: self.selected_by_cross_validation,
            iterations: self.iterations,
            log_likelihood: self.log_likelihood,
            attributes: self.schema.iter().cloned().collect(),
            priors: self.params.priors().to_vec(),
            clusters: (0..self.params.num_clusters())
                .map(|c| self.params.estimators(c).to_vec())
                .collect(),
        }
    }
}

/// Structured description of an [`EmModel`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmReport {
    /// Number of clusters.
    pub num_clusters: usize,
    /// Whether k came from the cross-validated search.
    pub selected_by_cross_validation: bool,
    /// Iterations performed.
    pub iterations: usize,
    /// Final mean log-likelihood.
    pub log_likelihood: f64,
    /// Training schema.
    pub attributes: Vec<Attribute>,
    /// Cluster priors.
    pub priors: Vec<f64>,
    /// `clusters[c][j]`: model of attribute j in cluster c.
    pub clusters: Vec<Vec<AttributeEstimator>>,
}

impl fmt::Display for EmReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "EM")?;
        writeln!(f, "==")?;
        writeln!(f)?;
        if self.selected_by_cross_validation {
            writeln!(f, "Number of clusters selected by cross validation: {}", self.num_clusters)?;
        } else {
            writeln!(f, "Number of clusters: {}", self.num_clusters)?;
        }
        writeln!(f, "Number of iterations performed: {}", self.iterations)?;
        writeln!(f, "Log likelihood: {:.5}", self.log_likelihood)?;
        writeln!(f)?;

        let mut rows = Vec::new();
        let mut header = vec!["Attribute".to_string()];
        header.extend((0..self.num_clusters).map(|c| c.to_string()));
        rows.push(header);
        let mut priors = vec![String::new()];
        priors.extend(self.priors.iter().map(|p| format!("({p:.2})")));
        rows.push(priors);

        for (j, attr) in self.attributes.iter().enumerate() {
            rows.push(vec![attr.name().to_string()]);
            match attr {
                Attribute::Numeric { .. } => {
                    let mut mean = vec!["  mean".to_string()];
                    let mut sd = vec!["  std. dev.".to_string()];
                    for cluster in &self.clusters {
                        if let AttributeEstimator::Normal(n) = &cluster[j] {
                            mean.push(format!("{:.4}", n.mean));
                            sd.push(format!("{:.4}", n.std_dev));
                        }
                    }
                    rows.push(mean);
                    rows.push(sd);
                }
                Attribute::Nominal { values, .. } => {
                    for (v, label) in values.iter().enumerate() {
                        let mut row = vec![format!("  {label}")];
                        for cluster in &self.clusters {
                            if let AttributeEstimator::Discrete(d) = &cluster[j] {
                                row.push(format!("{:.4}", d.counts()[v]));
                            }
                        }
                        rows.push(row);
                    }
                }
            }
        }
        write_table(f, &rows)
    }
}
