//! Tabular data consumed by the clustering engines.
//!
//! A [`Dataset`] is an ordered list of [`Record`]s sharing one [`Schema`].
//! Each attribute is either numeric or nominal (a fixed set of labels), and
//! every record carries a non-negative weight.
//!
//! ```rust
//! use partita::data::{Attribute, Dataset, Record, Schema, Value};
//!
//! let schema = Schema::new(vec![
//!     Attribute::numeric("height"),
//!     Attribute::nominal("colour", ["red", "green"]),
//! ]);
//! let data = Dataset::new(
//!     schema,
//!     vec![
//!         Record::new(vec![Value::Numeric(1.5), Value::Nominal(0)]),
//!         Record::new(vec![Value::Missing, Value::Nominal(1)]).with_weight(2.0),
//!     ],
//! )
//! .unwrap();
//! assert_eq!(data.len(), 2);
//! assert_eq!(data.sum_of_weights(), 3.0);
//! ```

mod missing;

pub use missing::MissingValueReplacer;

use crate::error::{Error, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Descriptor of a single column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Attribute {
    /// Real-valued attribute.
    Numeric {
        /// Attribute name.
        name: String,
    },
    /// Categorical attribute over a fixed, ordered set of labels.
    Nominal {
        /// Attribute name.
        name: String,
        /// Allowed labels; a [`Value::Nominal`] indexes into this list.
        values: Vec<String>,
    },
}

impl Attribute {
    /// A numeric attribute.
    pub fn numeric(name: impl Into<String>) -> Self {
        Attribute::Numeric { name: name.into() }
    }

    /// A nominal attribute with the given labels.
    pub fn nominal<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Attribute::Nominal {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Attribute name.
    pub fn name(&self) -> &str {
        match self {
            Attribute::Numeric { name } | Attribute::Nominal { name, .. } => name,
        }
    }

    /// True for numeric attributes.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Attribute::Numeric { .. })
    }

    /// True for nominal attributes.
    pub fn is_nominal(&self) -> bool {
        matches!(self, Attribute::Nominal { .. })
    }

    /// Number of labels (0 for numeric attributes).
    pub fn num_values(&self) -> usize {
        match self {
            Attribute::Numeric { .. } => 0,
            Attribute::Nominal { values, .. } => values.len(),
        }
    }

    /// Label of a nominal value.
    pub fn label(&self, index: usize) -> Option<&str> {
        match self {
            Attribute::Numeric { .. } => None,
            Attribute::Nominal { values, .. } => values.get(index).map(String::as_str),
        }
    }

    fn kind(&self) -> String {
        match self {
            Attribute::Numeric { .. } => "numeric".to_string(),
            Attribute::Nominal { values, .. } => format!("nominal({})", values.len()),
        }
    }
}

/// Ordered attribute list shared by all records of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    attributes: Vec<Attribute>,
}

impl Schema {
    /// Create a schema from attribute descriptors.
    pub fn new(attributes: Vec<Attribute>) -> Self {
        Self { attributes }
    }

    /// An all-numeric schema with attributes named `a0`, `a1`, ...
    pub fn numeric(n: usize) -> Self {
        Self::new((0..n).map(|i| Attribute::numeric(format!("a{i}"))).collect())
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// True when the schema has no attributes.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Attribute at `index`.
    pub fn attribute(&self, index: usize) -> &Attribute {
        &self.attributes[index]
    }

    /// Iterate over attributes in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Attribute> {
        self.attributes.iter()
    }

    /// Check that `record` is type-compatible with this schema.
    pub fn check(&self, record: &Record) -> Result<()> {
        if record.len() != self.len() {
            return Err(Error::SchemaMismatch {
                index: record.len(),
                expected: format!("{} values", self.len()),
                found: format!("{} values", record.len()),
            });
        }
        if !(record.weight().is_finite() && record.weight() >= 0.0) {
            return Err(Error::invalid(
                "weight",
                format!("record weight must be finite and >= 0, got {}", record.weight()),
            ));
        }
        for (index, (attr, value)) in self.attributes.iter().zip(record.values()).enumerate() {
            let ok = match (attr, value) {
                (_, Value::Missing) => true,
                (Attribute::Numeric { .. }, Value::Numeric(x)) => x.is_finite(),
                (Attribute::Nominal { values, .. }, Value::Nominal(v)) => *v < values.len(),
                _ => false,
            };
            if !ok {
                return Err(Error::SchemaMismatch {
                    index,
                    expected: attr.kind(),
                    found: value.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// One cell of a record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Finite real number.
    Numeric(f64),
    /// Index into the attribute's label list.
    Nominal(usize),
    /// No observation.
    Missing,
}

impl Value {
    /// True for [`Value::Missing`].
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Numeric payload, if any.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Numeric(x) => Some(x),
            _ => None,
        }
    }

    /// Nominal payload, if any.
    pub fn as_nominal(&self) -> Option<usize> {
        match *self {
            Value::Nominal(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Numeric(x) => write!(f, "{x}"),
            Value::Nominal(v) => write!(f, "#{v}"),
            Value::Missing => write!(f, "?"),
        }
    }
}

/// Fixed-schema feature vector with a weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    values: Vec<Value>,
    weight: f64,
}

impl Record {
    /// Record with weight 1.
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            values,
            weight: 1.0,
        }
    }

    /// All-numeric record; NaN entries become [`Value::Missing`].
    pub fn from_numeric(values: &[f64]) -> Self {
        Self::new(
            values
                .iter()
                .map(|&x| if x.is_nan() { Value::Missing } else { Value::Numeric(x) })
                .collect(),
        )
    }

    /// Set the weight.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Values in attribute order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Value at attribute `index`.
    pub fn value(&self, index: usize) -> Value {
        self.values[index]
    }

    /// Record weight.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when the record holds no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Key for exact value-tuple equality (weight ignored).
    pub(crate) fn key(&self) -> RecordKey {
        RecordKey(
            self.values
                .iter()
                .map(|v| match *v {
                    // +0.0 and -0.0 compare equal
                    Value::Numeric(x) => (0u8, if x == 0.0 { 0 } else { x.to_bits() }),
                    Value::Nominal(i) => (1u8, i as u64),
                    Value::Missing => (2u8, 0),
                })
                .collect(),
        )
    }
}

/// Hashable identity of a record's values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct RecordKey(Vec<(u8, u64)>);

/// Ordered collection of records over one schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    schema: Arc<Schema>,
    records: Vec<Record>,
}

impl Dataset {
    /// Create a dataset, validating every record against the schema.
    pub fn new(schema: Schema, records: Vec<Record>) -> Result<Self> {
        for record in &records {
            schema.check(record)?;
        }
        Ok(Self {
            schema: Arc::new(schema),
            records,
        })
    }

    /// All-numeric dataset from rows of equal length. NaN marks a missing value.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let d = rows.first().map_or(0, Vec::len);
        let records = rows.iter().map(|r| Record::from_numeric(r)).collect();
        Self::new(Schema::numeric(d), records)
    }

    /// Records are trusted to match `schema`.
    pub(crate) fn from_parts(schema: Arc<Schema>, records: Vec<Record>) -> Self {
        Self { schema, records }
    }

    /// The schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub(crate) fn schema_arc(&self) -> Arc<Schema> {
        Arc::clone(&self.schema)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when there are no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of attributes.
    pub fn num_attributes(&self) -> usize {
        self.schema.len()
    }

    /// Record at `index`.
    pub fn record(&self, index: usize) -> &Record {
        &self.records[index]
    }

    /// All records.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Weight of record `index`.
    pub fn weight(&self, index: usize) -> f64 {
        self.records[index].weight
    }

    /// Value of record `index` at attribute `attr`.
    pub fn value(&self, index: usize, attr: usize) -> Value {
        self.records[index].values[attr]
    }

    /// Sum of record weights.
    pub fn sum_of_weights(&self) -> f64 {
        self.records.iter().map(|r| r.weight).sum()
    }

    /// New dataset holding the records at `indices`, in that order.
    pub fn subset(&self, indices: &[usize]) -> Dataset {
        Self::from_parts(
            self.schema_arc(),
            indices.iter().map(|&i| self.records[i].clone()).collect(),
        )
    }

    /// Copy with the records randomly permuted.
    pub fn shuffled<R: Rng + ?Sized>(&self, rng: &mut R) -> Dataset {
        let mut records = self.records.clone();
        for j in (1..records.len()).rev() {
            let i = rng.random_range(0..=j);
            records.swap(i, j);
        }
        Self::from_parts(self.schema_arc(), records)
    }

    /// Weighted mean (numeric) or weighted mode (nominal) of an attribute.
    ///
    /// Missing when the attribute has no observed values.
    pub fn mean_or_mode(&self, attr: usize) -> Value {
        match self.schema.attribute(attr) {
            Attribute::Numeric { .. } => {
                let (mut sum, mut w) = (0.0, 0.0);
                for r in &self.records {
                    if let Value::Numeric(x) = r.values[attr] {
                        sum += r.weight * x;
                        w += r.weight;
                    }
                }
                if w > 0.0 {
                    Value::Numeric(sum / w)
                } else {
                    Value::Missing
                }
            }
            Attribute::Nominal { .. } => {
                let counts = self.nominal_counts(attr);
                match max_index(&counts) {
                    Some(i) if counts[i] > 0.0 => Value::Nominal(i),
                    _ => Value::Missing,
                }
            }
        }
    }

    /// Weighted, bias-corrected variance of a numeric attribute (0 for nominal).
    pub fn variance(&self, attr: usize) -> f64 {
        weighted_variance(
            self.records
                .iter()
                .filter_map(|r| r.values[attr].as_f64().map(|x| (x, r.weight))),
        )
    }

    /// Observed (min, max) of a numeric attribute.
    pub fn range(&self, attr: usize) -> Option<(f64, f64)> {
        self.records
            .iter()
            .filter_map(|r| r.values[attr].as_f64())
            .fold(None, |acc, x| match acc {
                None => Some((x, x)),
                Some((lo, hi)) => Some((lo.min(x), hi.max(x))),
            })
    }

    /// Weighted label histogram of a nominal attribute (empty for numeric).
    pub fn nominal_counts(&self, attr: usize) -> Vec<f64> {
        let mut counts = vec![0.0; self.schema.attribute(attr).num_values()];
        for r in &self.records {
            if let Value::Nominal(v) = r.values[attr] {
                counts[v] += r.weight;
            }
        }
        counts
    }

    /// Total weight of records missing attribute `attr`.
    pub fn missing_weight(&self, attr: usize) -> f64 {
        self.records
            .iter()
            .filter(|r| r.values[attr].is_missing())
            .map(|r| r.weight)
            .sum()
    }
}

/// Weighted incremental variance with `Σw - 1` in the denominator.
///
/// Returns 0 when the total weight is at most 1.
pub(crate) fn weighted_variance(values: impl Iterator<Item = (f64, f64)>) -> f64 {
    let (mut mean, mut m2, mut sum_w) = (0.0, 0.0, 0.0);
    for (x, w) in values {
        if w <= 0.0 {
            continue;
        }
        sum_w += w;
        let delta = x - mean;
        mean += w * delta / sum_w;
        m2 += w * delta * (x - mean);
    }
    if sum_w <= 1.0 {
        return 0.0;
    }
    (m2 / (sum_w - 1.0)).max(0.0)
}

/// Index of the first maximum, `None` for an empty slice.
pub(crate) fn max_index(values: &[f64]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some(b) if values[b] >= v => {}
            _ => best = Some(i),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn mixed() -> Dataset {
        let schema = Schema::new(vec![
            Attribute::numeric("x"),
            Attribute::nominal("c", ["a", "b", "c"]),
        ]);
        Dataset::new(
            schema,
            vec![
                Record::new(vec![Value::Numeric(1.0), Value::Nominal(0)]),
                Record::new(vec![Value::Numeric(3.0), Value::Nominal(1)]).with_weight(3.0),
                Record::new(vec![Value::Missing, Value::Nominal(1)]),
                Record::new(vec![Value::Numeric(5.0), Value::Missing]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn rejects_out_of_range_nominal() {
        let schema = Schema::new(vec![Attribute::nominal("c", ["a"])]);
        let err = Dataset::new(schema, vec![Record::new(vec![Value::Nominal(1)])]).unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch { index: 0, .. }));
    }

    #[test]
    fn rejects_wrong_arity_and_kind() {
        let err = Dataset::from_rows(&[vec![1.0, 2.0], vec![1.0]]).unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch { .. }));

        let schema = Schema::numeric(1);
        let err = Dataset::new(schema, vec![Record::new(vec![Value::Nominal(0)])]).unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch { .. }));
    }

    #[test]
    fn rejects_negative_weight() {
        let schema = Schema::numeric(1);
        let r = Record::from_numeric(&[1.0]).with_weight(-1.0);
        assert!(Dataset::new(schema, vec![r]).is_err());
    }

    #[test]
    fn from_rows_marks_nan_missing() {
        let d = Dataset::from_rows(&[vec![1.0, f64::NAN]]).unwrap();
        assert!(d.value(0, 1).is_missing());
        assert_eq!(d.value(0, 0), Value::Numeric(1.0));
    }

    #[test]
    fn weighted_statistics() {
        let d = mixed();
        // (1*1 + 3*3 + 5*1) / 5
        assert_eq!(d.mean_or_mode(0), Value::Numeric(3.0));
        assert_eq!(d.mean_or_mode(1), Value::Nominal(1));
        assert_eq!(d.nominal_counts(1), vec![1.0, 4.0, 0.0]);
        assert_eq!(d.missing_weight(0), 1.0);
        assert_eq!(d.range(0), Some((1.0, 5.0)));
        // Σw(x-3)² = 4 + 0 + 4 = 8, over Σw - 1 = 4
        assert_relative_eq!(d.variance(0), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn variance_of_single_unit_weight_is_zero() {
        assert_eq!(weighted_variance([(3.0, 1.0)].into_iter()), 0.0);
    }

    #[test]
    fn record_key_ignores_weight_and_signed_zero() {
        let a = Record::from_numeric(&[0.0, 1.0]);
        let b = Record::from_numeric(&[-0.0, 1.0]).with_weight(4.0);
        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), Record::from_numeric(&[0.0, 2.0]).key());
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let d = Dataset::from_rows(&(0..20).map(|i| vec![i as f64]).collect::<Vec<_>>()).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let s = d.shuffled(&mut rng);
        let mut xs: Vec<f64> = s.records().iter().map(|r| r.value(0).as_f64().unwrap()).collect();
        xs.sort_by(f64::total_cmp);
        assert_eq!(xs, (0..20).map(|i| i as f64).collect::<Vec<_>>());
    }

    #[test]
    fn max_index_prefers_first() {
        assert_eq!(max_index(&[1.0, 3.0, 3.0]), Some(1));
        assert_eq!(max_index(&[]), None);
    }
}
