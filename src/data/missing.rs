//! Global mean/mode imputation.

use super::{Dataset, Record, Value};
use serde::{Deserialize, Serialize};

/// Replaces missing values with the training data's weighted mean (numeric)
/// or weighted mode (nominal).
///
/// Attributes with no observed values keep their missing marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingValueReplacer {
    fill: Vec<Value>,
}

impl MissingValueReplacer {
    /// Learn replacement values from `data`.
    pub fn fit(data: &Dataset) -> Self {
        Self {
            fill: (0..data.num_attributes())
                .map(|a| data.mean_or_mode(a))
                .collect(),
        }
    }

    /// Replacement value per attribute.
    pub fn fill_values(&self) -> &[Value] {
        &self.fill
    }

    /// Copy of `record` with missing values filled in.
    pub fn apply(&self, record: &Record) -> Record {
        if !record.values().iter().any(Value::is_missing) {
            return record.clone();
        }
        let values = record
            .values()
            .iter()
            .zip(&self.fill)
            .map(|(v, f)| if v.is_missing() { *f } else { *v })
            .collect();
        Record::new(values).with_weight(record.weight())
    }

    /// Copy of `data` with missing values filled in.
    pub fn apply_dataset(&self, data: &Dataset) -> Dataset {
        Dataset::from_parts(
            data.schema_arc(),
            data.records().iter().map(|r| self.apply(r)).collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Attribute, Schema};

    #[test]
    fn fills_mean_and_mode() {
        let schema = Schema::new(vec![
            Attribute::numeric("x"),
            Attribute::nominal("c", ["a", "b"]),
        ]);
        let data = Dataset::new(
            schema,
            vec![
                Record::new(vec![Value::Numeric(2.0), Value::Nominal(1)]),
                Record::new(vec![Value::Numeric(4.0), Value::Missing]),
                Record::new(vec![Value::Missing, Value::Nominal(1)]).with_weight(2.0),
            ],
        )
        .unwrap();

        let rep = MissingValueReplacer::fit(&data);
        let filled = rep.apply_dataset(&data);
        assert_eq!(filled.value(1, 1), Value::Nominal(1));
        assert_eq!(filled.value(2, 0), Value::Numeric(3.0));
        assert_eq!(filled.weight(2), 2.0);
    }

    #[test]
    fn all_missing_attribute_stays_missing() {
        let data = Dataset::from_rows(&[vec![f64::NAN], vec![f64::NAN]]).unwrap();
        let rep = MissingValueReplacer::fit(&data);
        assert!(rep.apply(data.record(0)).value(0).is_missing());
    }
}
