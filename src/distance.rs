//! Distances between records of one schema.
//!
//! Two metrics are supported:
//!
//! | Metric | Numeric term | Centroid rule |
//! |--------|--------------|---------------|
//! | [`DistanceMetric::Euclidean`] | `(a - b)²`, root of the sum | weighted mean |
//! | [`DistanceMetric::Manhattan`] | `\|a - b\|` | weighted median |
//!
//! Nominal attributes add 1 on mismatch and 0 on match. Missing values add a
//! worst-case difference: 1 when both sides are missing, otherwise the larger
//! distance from the present value to either end of the attribute's range.
//!
//! Numeric differences are range-normalised to `[0, 1]` by default, using the
//! minimum and maximum seen in the data the function was built from.
//!
//! # Early exit
//!
//! [`Distance::compute`] takes a `limit`. Once the running total passes it the
//! computation stops and returns some value `>= limit`. Such a value is only
//! good for a "farther than the current best" test, never as a distance.

use crate::data::{Attribute, Dataset, Record, Schema, Value};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Distance metric selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DistanceMetric {
    /// Root of summed squared differences; centroids are means.
    #[default]
    Euclidean,
    /// Sum of absolute differences; centroids are medians.
    Manhattan,
}

impl DistanceMetric {
    /// True when cluster centres must use per-attribute medians.
    pub fn uses_median(self) -> bool {
        matches!(self, DistanceMetric::Manhattan)
    }

    /// Contribution of one record to its cluster's error.
    ///
    /// Euclidean distances are squared; both are scaled by the record weight.
    pub fn error(self, distance: f64, weight: f64) -> f64 {
        match self {
            DistanceMetric::Euclidean => distance * distance * weight,
            DistanceMetric::Manhattan => distance * weight,
        }
    }
}

/// A distance over records.
pub trait Distance: Send + Sync {
    /// Distance between `a` and `b`, allowed to stop early once it exceeds `limit`.
    fn compute(&self, a: &Record, b: &Record, limit: f64) -> f64;

    /// Exact distance between `a` and `b`.
    fn distance(&self, a: &Record, b: &Record) -> f64 {
        self.compute(a, b, f64::INFINITY)
    }
}

/// Observed extent of a numeric attribute.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Extent {
    min: f64,
    width: f64,
}

/// Metric bound to a schema and the attribute ranges of a dataset.
#[derive(Debug, Clone)]
pub struct DistanceFunction {
    metric: DistanceMetric,
    schema: Arc<Schema>,
    extents: Vec<Option<Extent>>,
    normalize: bool,
}

impl DistanceFunction {
    /// Build a distance for `data`'s schema, taking numeric ranges from `data`.
    pub fn new(metric: DistanceMetric, data: &Dataset, normalize: bool) -> Self {
        let extents = (0..data.num_attributes())
            .map(|a| {
                if data.schema().attribute(a).is_numeric() {
                    data.range(a).map(|(min, max)| Extent {
                        min,
                        width: max - min,
                    })
                } else {
                    None
                }
            })
            .collect();
        Self {
            metric,
            schema: data.schema_arc(),
            extents,
            normalize,
        }
    }

    /// The metric in use.
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Whether numeric attributes are range-normalised.
    pub fn normalizes(&self) -> bool {
        self.normalize
    }

    fn scaled(&self, attr: usize, x: f64) -> f64 {
        if !self.normalize {
            return x;
        }
        match self.extents[attr] {
            Some(Extent { min, width }) if width > 0.0 => (x - min) / width,
            _ => 0.0,
        }
    }

    fn numeric_difference(&self, attr: usize, a: Value, b: Value) -> f64 {
        match (a, b) {
            (Value::Numeric(x), Value::Numeric(y)) => self.scaled(attr, x) - self.scaled(attr, y),
            (Value::Numeric(v), _) | (_, Value::Numeric(v)) => match self.extents[attr] {
                Some(Extent { min, width }) if self.normalize => {
                    let s = if width > 0.0 { (v - min) / width } else { 0.0 };
                    s.max(1.0 - s)
                }
                Some(Extent { min, width }) => (v - min).abs().max((min + width - v).abs()),
                None => 1.0,
            },
            _ => match self.extents[attr] {
                Some(Extent { width, .. }) if !self.normalize => width,
                _ => 1.0,
            },
        }
    }

    fn difference(&self, attr: usize, a: Value, b: Value) -> f64 {
        match self.schema.attribute(attr) {
            Attribute::Numeric { .. } => self.numeric_difference(attr, a, b),
            Attribute::Nominal { .. } => match (a, b) {
                (Value::Nominal(x), Value::Nominal(y)) if x == y => 0.0,
                _ => 1.0,
            },
        }
    }
}

impl Distance for DistanceFunction {
    fn compute(&self, a: &Record, b: &Record, limit: f64) -> f64 {
        let pairs = a.values().iter().zip(b.values()).enumerate();
        match self.metric {
            DistanceMetric::Euclidean => {
                let bound = limit * limit;
                let mut sum = 0.0;
                for (attr, (&x, &y)) in pairs {
                    let d = self.difference(attr, x, y);
                    sum += d * d;
                    if sum > bound {
                        break;
                    }
                }
                sum.sqrt()
            }
            DistanceMetric::Manhattan => {
                let mut sum = 0.0;
                for (attr, (&x, &y)) in pairs {
                    sum += self.difference(attr, x, y).abs();
                    if sum > limit {
                        break;
                    }
                }
                sum
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn rows() -> Dataset {
        Dataset::from_rows(&[vec![0.0, 0.0], vec![3.0, 4.0], vec![10.0, 8.0]]).unwrap()
    }

    #[test]
    fn raw_euclidean_and_manhattan() {
        let d = rows();
        let e = DistanceFunction::new(DistanceMetric::Euclidean, &d, false);
        let m = DistanceFunction::new(DistanceMetric::Manhattan, &d, false);
        assert_relative_eq!(e.distance(d.record(0), d.record(1)), 5.0);
        assert_relative_eq!(m.distance(d.record(0), d.record(1)), 7.0);
    }

    #[test]
    fn normalised_difference_uses_range() {
        let d = rows();
        let e = DistanceFunction::new(DistanceMetric::Euclidean, &d, true);
        // (0.3)² + (0.5)²
        assert_relative_eq!(
            e.distance(d.record(0), d.record(1)),
            (0.09f64 + 0.25).sqrt(),
            epsilon = 1e-12
        );
        assert_relative_eq!(e.distance(d.record(0), d.record(2)), 2f64.sqrt());
    }

    #[test]
    fn missing_value_heuristic() {
        let d = rows();
        let m = DistanceFunction::new(DistanceMetric::Manhattan, &d, true);
        let a = Record::from_numeric(&[f64::NAN, f64::NAN]);
        let b = Record::from_numeric(&[2.0, f64::NAN]);
        // attr 0: max(0.2, 0.8); attr 1: both missing
        assert_relative_eq!(m.distance(&a, &b), 1.8, epsilon = 1e-12);

        let raw = DistanceFunction::new(DistanceMetric::Manhattan, &d, false);
        // attr 0: max(|2-0|, |10-2|); attr 1: range width 8
        assert_relative_eq!(raw.distance(&a, &b), 16.0);
    }

    #[test]
    fn nominal_mismatch_costs_one() {
        let schema = Schema::new(vec![Attribute::nominal("c", ["x", "y"])]);
        let d = Dataset::new(
            schema,
            vec![
                Record::new(vec![Value::Nominal(0)]),
                Record::new(vec![Value::Nominal(1)]),
                Record::new(vec![Value::Missing]),
            ],
        )
        .unwrap();
        let e = DistanceFunction::new(DistanceMetric::Euclidean, &d, true);
        assert_eq!(e.distance(d.record(0), d.record(0)), 0.0);
        assert_eq!(e.distance(d.record(0), d.record(1)), 1.0);
        assert_eq!(e.distance(d.record(2), d.record(2)), 1.0);
    }

    #[test]
    fn early_exit_never_undercuts_limit() {
        let d = Dataset::from_rows(&[vec![0.0; 6], vec![1.0; 6]]).unwrap();
        for metric in [DistanceMetric::Euclidean, DistanceMetric::Manhattan] {
            let f = DistanceFunction::new(metric, &d, false);
            let exact = f.distance(d.record(0), d.record(1));
            let bounded = f.compute(d.record(0), d.record(1), 1.5);
            assert!(bounded >= 1.5);
            assert!(bounded <= exact);
        }
    }

    #[test]
    fn error_contribution() {
        assert_eq!(DistanceMetric::Euclidean.error(2.0, 0.5), 2.0);
        assert_eq!(DistanceMetric::Manhattan.error(2.0, 0.5), 1.0);
        assert!(DistanceMetric::Manhattan.uses_median());
    }
}
