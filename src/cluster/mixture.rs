//! Per-cluster attribute models for the EM engine.
//!
//! Each cluster holds one estimator per attribute:
//!
//! - numeric attributes: a univariate Gaussian ([`NormalEstimator`])
//! - nominal attributes: a Laplace-smoothed categorical ([`DiscreteEstimator`])
//!
//! Attributes are treated as independent within a cluster, so the log-density
//! of a record under cluster c is the sum of per-attribute log-densities.
//! Missing values contribute nothing.
//!
//! ```text
//! log p(x | c) = Σⱼ log pⱼ(xⱼ | c)
//! log p(x, c)  = log πc + log p(x | c)
//! log p(x)     = logsumexp_c log p(x, c)
//! ```

use crate::data::{Attribute, Record, Schema, Value};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::mem;

/// `ln(sqrt(2π))`
const LOG_SQRT_2PI: f64 = 0.918_938_533_204_672_8;

/// Log-density of `x` under N(mean, std_dev²).
pub fn log_normal_density(x: f64, mean: f64, std_dev: f64) -> f64 {
    let diff = x - mean;
    -(diff * diff) / (2.0 * std_dev * std_dev) - LOG_SQRT_2PI - std_dev.ln()
}

/// Log-sum-exp for numerical stability.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NEG_INFINITY;
    }
    let max_val = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max_val.is_infinite() {
        return max_val;
    }
    max_val
        + values
            .iter()
            .map(|&v| (v - max_val).exp())
            .sum::<f64>()
            .ln()
}

/// Turn log-weights into a probability vector.
///
/// Fails when the weights cannot be normalised (all `-inf`, or NaN).
pub fn logs_to_probs(logs: &[f64]) -> Result<Vec<f64>> {
    let max_val = logs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !max_val.is_finite() {
        return Err(Error::NumericDegeneracy(format!(
            "cannot normalise log weights (max = {max_val})"
        )));
    }
    let mut probs: Vec<f64> = logs.iter().map(|&l| (l - max_val).exp()).collect();
    normalize(&mut probs)?;
    Ok(probs)
}

/// Scale `values` to sum to one.
pub(crate) fn normalize(values: &mut [f64]) -> Result<()> {
    let sum: f64 = values.iter().sum();
    if !(sum > 0.0 && sum.is_finite()) {
        return Err(Error::NumericDegeneracy(format!(
            "cannot normalise weights summing to {sum}"
        )));
    }
    for v in values.iter_mut() {
        *v /= sum;
    }
    Ok(())
}

/// Categorical distribution with add-one smoothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscreteEstimator {
    counts: Vec<f64>,
    total: f64,
}

impl DiscreteEstimator {
    /// Estimator over `num_values` labels, every count starting at 1.
    pub fn laplace(num_values: usize) -> Self {
        Self {
            counts: vec![1.0; num_values],
            total: num_values as f64,
        }
    }

    /// Add `weight` to label `value`.
    pub fn add(&mut self, value: usize, weight: f64) {
        self.counts[value] += weight;
        self.total += weight;
    }

    /// Smoothed probability of `value`.
    pub fn probability(&self, value: usize) -> f64 {
        if self.total > 0.0 {
            self.counts[value] / self.total
        } else {
            0.0
        }
    }

    /// Smoothed counts.
    pub fn counts(&self) -> &[f64] {
        &self.counts
    }
}

/// Univariate Gaussian.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalEstimator {
    /// Mean.
    pub mean: f64,
    /// Standard deviation.
    pub std_dev: f64,
    /// Total responsibility mass behind the estimate.
    pub weight_sum: f64,
}

impl NormalEstimator {
    /// Log-density of `x`.
    pub fn log_density(&self, x: f64) -> f64 {
        log_normal_density(x, self.mean, self.std_dev)
    }
}

/// Model of one attribute within one cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeEstimator {
    /// Numeric attribute.
    Normal(NormalEstimator),
    /// Nominal attribute.
    Discrete(DiscreteEstimator),
}

impl AttributeEstimator {
    /// Log-density of a value; 0 for missing or mismatched values.
    pub fn log_density(&self, value: Value) -> f64 {
        match (self, value) {
            (AttributeEstimator::Normal(n), Value::Numeric(x)) => n.log_density(x),
            (AttributeEstimator::Discrete(d), Value::Nominal(v)) => d.probability(v).ln(),
            _ => 0.0,
        }
    }
}

/// Priors plus per-cluster attribute estimators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixtureParams {
    priors: Vec<f64>,
    estimators: Vec<Vec<AttributeEstimator>>,
}

impl MixtureParams {
    /// Assemble parameters; `estimators[c][j]` models attribute j in cluster c.
    pub fn new(priors: Vec<f64>, estimators: Vec<Vec<AttributeEstimator>>) -> Self {
        debug_assert_eq!(priors.len(), estimators.len());
        Self { priors, estimators }
    }

    /// Number of clusters.
    pub fn num_clusters(&self) -> usize {
        self.priors.len()
    }

    /// Cluster priors.
    pub fn priors(&self) -> &[f64] {
        &self.priors
    }

    /// Estimators of cluster `c`.
    pub fn estimators(&self, c: usize) -> &[AttributeEstimator] {
        &self.estimators[c]
    }

    /// `log p(x | c)` for every cluster.
    pub fn log_density_per_cluster(&self, record: &Record) -> Vec<f64> {
        self.estimators
            .iter()
            .map(|cluster| {
                cluster
                    .iter()
                    .zip(record.values())
                    .map(|(e, &v)| e.log_density(v))
                    .sum()
            })
            .collect()
    }

    /// `log p(x, c)` for every cluster.
    pub fn log_joint(&self, record: &Record) -> Vec<f64> {
        let mut logs = self.log_density_per_cluster(record);
        for (l, p) in logs.iter_mut().zip(&self.priors) {
            *l += p.ln();
        }
        logs
    }
}

/// Current parameters plus the generation before them.
#[derive(Debug, Clone)]
pub(crate) struct Generations<T> {
    current: T,
    previous: T,
}

impl<T: Clone> Generations<T> {
    pub(crate) fn new(initial: T) -> Self {
        Self {
            previous: initial.clone(),
            current: initial,
        }
    }
}

impl<T> Generations<T> {
    pub(crate) fn current(&self) -> &T {
        &self.current
    }

    /// Install `next`; the old current becomes previous.
    pub(crate) fn advance(&mut self, next: T) {
        self.previous = mem::replace(&mut self.current, next);
    }

    /// Swap current and previous.
    pub(crate) fn rollback(&mut self) {
        mem::swap(&mut self.current, &mut self.previous);
    }

    pub(crate) fn into_current(self) -> T {
        self.current
    }
}

#[derive(Debug, Clone, PartialEq)]
enum AttributeStats {
    Numeric { sum_wx: f64, sum_wx2: f64, sum_w: f64 },
    Nominal(Vec<f64>),
}

/// Responsibility-weighted sums for one M-step, mergeable across workers.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SufficientStats {
    prior_mass: Vec<f64>,
    // [cluster][attribute]
    attributes: Vec<Vec<AttributeStats>>,
}

/// Floors and fallbacks applied when turning sums into standard deviations.
#[derive(Debug, Clone)]
pub(crate) struct StdDevPolicy {
    /// Floor per attribute.
    pub floors: Vec<f64>,
    /// Whole-data standard deviation per attribute.
    pub global: Vec<f64>,
    /// Last-resort value.
    pub min_std_dev: f64,
}

impl SufficientStats {
    pub(crate) fn new(schema: &Schema, k: usize) -> Self {
        let template: Vec<AttributeStats> = schema
            .iter()
            .map(|a| match a {
                Attribute::Numeric { .. } => AttributeStats::Numeric {
                    sum_wx: 0.0,
                    sum_wx2: 0.0,
                    sum_w: 0.0,
                },
                Attribute::Nominal { values, .. } => AttributeStats::Nominal(vec![0.0; values.len()]),
            })
            .collect();
        Self {
            prior_mass: vec![0.0; k],
            attributes: vec![template; k],
        }
    }

    /// Add one record with its membership vector.
    pub(crate) fn accumulate<'m>(&mut self, record: &Record, membership: impl IntoIterator<Item = &'m f64>) {
        let w = record.weight();
        for (c, &r) in membership.into_iter().enumerate() {
            let wr = w * r;
            self.prior_mass[c] += wr;
            for (stats, &value) in self.attributes[c].iter_mut().zip(record.values()) {
                match (stats, value) {
                    (AttributeStats::Numeric { sum_wx, sum_wx2, sum_w }, Value::Numeric(x)) => {
                        *sum_wx += x * wr;
                        *sum_wx2 += x * x * wr;
                        *sum_w += wr;
                    }
                    (AttributeStats::Nominal(counts), Value::Nominal(v)) => counts[v] += wr,
                    _ => {}
                }
            }
        }
    }

    /// Elementwise sum with another worker's partial result.
    pub(crate) fn merge(&mut self, other: SufficientStats) {
        for (a, b) in self.prior_mass.iter_mut().zip(other.prior_mass) {
            *a += b;
        }
        for (mine, theirs) in self.attributes.iter_mut().zip(other.attributes) {
            for (a, b) in mine.iter_mut().zip(theirs) {
                match (a, b) {
                    (
                        AttributeStats::Numeric { sum_wx, sum_wx2, sum_w },
                        AttributeStats::Numeric {
                            sum_wx: x,
                            sum_wx2: x2,
                            sum_w: w,
                        },
                    ) => {
                        *sum_wx += x;
                        *sum_wx2 += x2;
                        *sum_w += w;
                    }
                    (AttributeStats::Nominal(counts), AttributeStats::Nominal(theirs)) => {
                        for (c, o) in counts.iter_mut().zip(theirs) {
                            *c += o;
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    /// Re-estimate priors and attribute models.
    pub(crate) fn finish(self, policy: &StdDevPolicy) -> Result<MixtureParams> {
        let mut priors = self.prior_mass;
        normalize(&mut priors)?;

        let estimators = self
            .attributes
            .into_iter()
            .map(|cluster| {
                cluster
                    .into_iter()
                    .enumerate()
                    .map(|(j, stats)| match stats {
                        AttributeStats::Nominal(counts) => {
                            let mut d = DiscreteEstimator::laplace(counts.len());
                            for (v, c) in counts.into_iter().enumerate() {
                                d.add(v, c);
                            }
                            AttributeEstimator::Discrete(d)
                        }
                        AttributeStats::Numeric { sum_wx, sum_wx2, sum_w } => {
                            AttributeEstimator::Normal(normal_from_sums(sum_wx, sum_wx2, sum_w, j, policy))
                        }
                    })
                    .collect()
            })
            .collect();

        Ok(MixtureParams::new(priors, estimators))
    }
}

fn normal_from_sums(sum_wx: f64, sum_wx2: f64, sum_w: f64, attr: usize, policy: &StdDevPolicy) -> NormalEstimator {
    if sum_w <= 0.0 {
        // No mass: a flat density that cannot win any record.
        return NormalEstimator {
            mean: policy.min_std_dev,
            std_dev: f64::MAX,
            weight_sum: sum_w,
        };
    }
    let floor = policy.floors[attr];
    let var = ((sum_wx2 - sum_wx * sum_wx / sum_w) / sum_w).max(0.0);
    let mut std_dev = var.sqrt();
    if std_dev <= floor {
        std_dev = policy.global[attr];
        if std_dev <= floor {
            std_dev = floor;
        }
    }
    if std_dev <= 0.0 || !std_dev.is_finite() {
        std_dev = policy.min_std_dev;
    }
    NormalEstimator {
        mean: sum_wx / sum_w,
        std_dev,
        weight_sum: sum_w,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn policy(n: usize) -> StdDevPolicy {
        StdDevPolicy {
            floors: vec![1e-6; n],
            global: vec![2.0; n],
            min_std_dev: 1e-6,
        }
    }

    #[test]
    fn standard_normal_at_zero() {
        let expected = -(2.0 * std::f64::consts::PI).sqrt().ln();
        assert_relative_eq!(log_normal_density(0.0, 0.0, 1.0), expected, epsilon = 1e-12);
        assert_relative_eq!(log_normal_density(1.0, 0.0, 1.0), expected - 0.5, epsilon = 1e-12);
    }

    #[test]
    fn log_sum_exp_is_stable() {
        assert_relative_eq!(log_sum_exp(&[1000.0, 1000.0]), 1000.0 + 2f64.ln(), epsilon = 1e-9);
        assert_eq!(log_sum_exp(&[]), f64::NEG_INFINITY);
        assert_eq!(log_sum_exp(&[f64::NEG_INFINITY]), f64::NEG_INFINITY);
    }

    #[test]
    fn logs_to_probs_normalises() {
        let p = logs_to_probs(&[0.0, 2f64.ln()]).unwrap();
        assert_relative_eq!(p[0], 1.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(p[1], 2.0 / 3.0, epsilon = 1e-12);
        assert!(logs_to_probs(&[f64::NEG_INFINITY; 2]).is_err());
    }

    #[test]
    fn laplace_smoothing() {
        let mut d = DiscreteEstimator::laplace(3);
        assert_relative_eq!(d.probability(0), 1.0 / 3.0);
        d.add(0, 3.0);
        assert_relative_eq!(d.probability(0), 4.0 / 6.0);
        assert_relative_eq!(d.probability(2), 1.0 / 6.0);
    }

    #[test]
    fn generations_rollback_restores_previous() {
        let mut g = Generations::new(1);
        g.advance(2);
        g.advance(3);
        assert_eq!(*g.current(), 3);
        g.rollback();
        assert_eq!(*g.current(), 2);
        assert_eq!(g.into_current(), 2);
    }

    #[test]
    fn m_step_from_sums() {
        let schema = Schema::new(vec![Attribute::numeric("x"), Attribute::nominal("c", ["a", "b"])]);
        let mut stats = SufficientStats::new(&schema, 2);
        let r1 = Record::new(vec![Value::Numeric(1.0), Value::Nominal(0)]);
        let r2 = Record::new(vec![Value::Numeric(3.0), Value::Nominal(1)]);
        stats.accumulate(&r1, &[1.0, 0.0]);
        stats.accumulate(&r2, &[1.0, 0.0]);
        let params = stats.finish(&policy(2)).unwrap();

        assert_eq!(params.priors(), &[1.0, 0.0]);
        match &params.estimators(0)[0] {
            AttributeEstimator::Normal(n) => {
                assert_relative_eq!(n.mean, 2.0);
                assert_relative_eq!(n.std_dev, 1.0);
                assert_relative_eq!(n.weight_sum, 2.0);
            }
            other => panic!("unexpected {other:?}"),
        }
        match &params.estimators(0)[1] {
            AttributeEstimator::Discrete(d) => assert_eq!(d.counts(), &[2.0, 2.0]),
            other => panic!("unexpected {other:?}"),
        }
        // Cluster without mass gets a flat Gaussian
        match &params.estimators(1)[0] {
            AttributeEstimator::Normal(n) => assert_eq!(n.std_dev, f64::MAX),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn degenerate_std_dev_falls_back_to_global() {
        let schema = Schema::numeric(1);
        let mut stats = SufficientStats::new(&schema, 1);
        for _ in 0..3 {
            stats.accumulate(&Record::from_numeric(&[5.0]), &[1.0]);
        }
        let params = stats.finish(&policy(1)).unwrap();
        match &params.estimators(0)[0] {
            AttributeEstimator::Normal(n) => assert_eq!(n.std_dev, 2.0),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn merge_matches_single_pass() {
        let schema = Schema::numeric(1);
        let records: Vec<Record> = (0..6).map(|i| Record::from_numeric(&[i as f64])).collect();
        let resp = [0.25, 0.75];

        let mut whole = SufficientStats::new(&schema, 2);
        for r in &records {
            whole.accumulate(r, &resp);
        }
        let mut left = SufficientStats::new(&schema, 2);
        let mut right = SufficientStats::new(&schema, 2);
        for r in &records[..3] {
            left.accumulate(r, &resp);
        }
        for r in &records[3..] {
            right.accumulate(r, &resp);
        }
        left.merge(right);
        assert_eq!(left, whole);
    }

    #[test]
    fn zero_prior_mass_is_degenerate() {
        let schema = Schema::numeric(1);
        let stats = SufficientStats::new(&schema, 2);
        assert!(matches!(stats.finish(&policy(1)), Err(Error::NumericDegeneracy(_))));
    }

    #[test]
    fn joint_adds_log_prior() {
        let params = MixtureParams::new(
            vec![0.5, 0.5],
            vec![
                vec![AttributeEstimator::Normal(NormalEstimator { mean: 0.0, std_dev: 1.0, weight_sum: 1.0 })],
                vec![AttributeEstimator::Normal(NormalEstimator { mean: 5.0, std_dev: 1.0, weight_sum: 1.0 })],
            ],
        );
        let r = Record::from_numeric(&[0.0]);
        let per = params.log_density_per_cluster(&r);
        let joint = params.log_joint(&r);
        assert_relative_eq!(joint[0], per[0] + 0.5f64.ln());
        assert!(per[0] > per[1]);
        // Missing values contribute nothing
        let m = Record::from_numeric(&[f64::NAN]);
        assert_eq!(params.log_density_per_cluster(&m), vec![0.0, 0.0]);
    }
}
