//! Tabular numeric datasets
//!
//! A [`Dataset`] is an ordered list of named numeric columns of equal length.
//! Missing values are stored as `NaN` and serialized as JSON `null`.

use crate::error::{DriftError, Result};
use ndarray::Array2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;

/// A single named column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Values, `NaN` marks a missing entry
    #[serde(with = "nullable_floats")]
    pub values: Vec<f64>,
}

impl Column {
    /// Create a new column
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Finite values only
    pub fn non_missing(&self) -> Vec<f64> {
        self.values.iter().copied().filter(|v| v.is_finite()).collect()
    }

    /// Whether the column holds at least one finite value
    pub fn has_values(&self) -> bool {
        self.values.iter().any(|v| v.is_finite())
    }
}

#[derive(Serialize, Deserialize)]
struct DatasetRepr {
    columns: Vec<Column>,
}

/// Ordered, named collection of numeric columns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DatasetRepr", into = "DatasetRepr")]
pub struct Dataset {
    columns: Vec<Column>,
    n_rows: usize,
}

impl TryFrom<DatasetRepr> for Dataset {
    type Error = DriftError;

    fn try_from(repr: DatasetRepr) -> Result<Self> {
        Dataset::new(repr.columns)
    }
}

impl From<Dataset> for DatasetRepr {
    fn from(ds: Dataset) -> Self {
        DatasetRepr { columns: ds.columns }
    }
}

impl Dataset {
    /// Create a dataset, validating equal lengths and unique names
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let n_rows = columns.first().map(|c| c.values.len()).unwrap_or(0);
        let mut seen = HashSet::with_capacity(columns.len());

        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(DriftError::DataError(format!(
                    "duplicate column name '{}'",
                    column.name
                )));
            }
            if column.values.len() != n_rows {
                return Err(DriftError::ShapeError {
                    expected: format!("{} rows in column '{}'", n_rows, column.name),
                    actual: format!("{} rows", column.values.len()),
                });
            }
        }

        Ok(Self { columns, n_rows })
    }

    /// Build from `(name, values)` pairs
    pub fn from_columns<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Vec<f64>)>,
        S: Into<String>,
    {
        Self::new(
            columns
                .into_iter()
                .map(|(name, values)| Column::new(name, values))
                .collect(),
        )
    }

    /// Build from row records (JSON objects).
    ///
    /// Column order follows first appearance. Keys missing from a record,
    /// `null`, and non-numeric strings become missing values.
    pub fn from_records(records: &[Value]) -> Result<Self> {
        let mut names: Vec<String> = Vec::new();
        let mut index: std::collections::HashMap<String, usize> = std::collections::HashMap::new();

        for (row, record) in records.iter().enumerate() {
            let obj = record.as_object().ok_or_else(|| {
                DriftError::DataError(format!("record {} is not a JSON object", row))
            })?;
            for key in obj.keys() {
                if !index.contains_key(key) {
                    index.insert(key.clone(), names.len());
                    names.push(key.clone());
                }
            }
        }

        let mut values = vec![vec![f64::NAN; records.len()]; names.len()];
        for (row, record) in records.iter().enumerate() {
            if let Some(obj) = record.as_object() {
                for (key, value) in obj {
                    values[index[key]][row] = json_to_f64(value);
                }
            }
        }

        Self::new(
            names
                .into_iter()
                .zip(values)
                .map(|(name, vals)| Column::new(name, vals))
                .collect(),
        )
    }

    /// Parse JSON text in either record (`[{..}, ..]`) or column form
    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        match value {
            Value::Array(records) => Self::from_records(&records),
            other => Ok(serde_json::from_value(other)?),
        }
    }

    /// Load a JSON file in record or column form
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Number of rows
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of columns
    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// True when there are no rows or no columns
    pub fn is_empty(&self) -> bool {
        self.n_rows == 0 || self.columns.is_empty()
    }

    /// All columns in order
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column names in order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Look up a column by name
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Finite values of a column, empty when the column is absent
    pub fn non_missing(&self, name: &str) -> Vec<f64> {
        self.column(name).map(Column::non_missing).unwrap_or_default()
    }

    /// Columns present in both datasets with at least one finite value on
    /// each side, in this dataset's order, minus `exclude`
    pub fn shared_numeric_columns(&self, other: &Dataset, exclude: Option<&str>) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| Some(c.name.as_str()) != exclude)
            .filter(|c| c.has_values())
            .filter(|c| other.column(&c.name).map_or(false, Column::has_values))
            .map(|c| c.name.clone())
            .collect()
    }

    /// Row-major matrix over the given columns; rows with a missing value in
    /// any selected column are dropped
    pub fn to_matrix(&self, names: &[String]) -> Result<Array2<f64>> {
        let selected: Vec<&Column> = names
            .iter()
            .map(|name| {
                self.column(name)
                    .ok_or_else(|| DriftError::DataError(format!("unknown column '{}'", name)))
            })
            .collect::<Result<_>>()?;

        let mut data = Vec::with_capacity(self.n_rows * selected.len());
        let mut kept = 0;
        for row in 0..self.n_rows {
            if selected.iter().all(|c| c.values[row].is_finite()) {
                data.extend(selected.iter().map(|c| c.values[row]));
                kept += 1;
            }
        }

        Ok(Array2::from_shape_vec((kept, selected.len()), data)?)
    }

    /// Seeded sample of at most `n` rows without replacement, in original
    /// row order
    pub fn sample_rows(&self, n: usize, seed: u64) -> Self {
        if self.n_rows <= n {
            return self.clone();
        }
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut rows = rand::seq::index::sample(&mut rng, self.n_rows, n).into_vec();
        rows.sort_unstable();

        let columns = self
            .columns
            .iter()
            .map(|c| Column::new(c.name.clone(), rows.iter().map(|&r| c.values[r]).collect()))
            .collect();
        Self {
            columns,
            n_rows: rows.len(),
        }
    }

    /// Return a copy with `f` applied to every value of one column
    pub fn map_column(&self, name: &str, f: impl Fn(f64) -> f64) -> Result<Self> {
        let mut out = self.clone();
        let column = out
            .columns
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| DriftError::DataError(format!("unknown column '{}'", name)))?;
        for v in column.values.iter_mut() {
            *v = f(*v);
        }
        Ok(out)
    }
}

fn json_to_f64(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

mod nullable_floats {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        let opts: Vec<Option<f64>> = values
            .iter()
            .map(|v| if v.is_finite() { Some(*v) } else { None })
            .collect();
        opts.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        let opts: Vec<Option<f64>> = Vec::deserialize(deserializer)?;
        Ok(opts.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rejects_ragged_columns() {
        let result = Dataset::from_columns(vec![("a", vec![1.0, 2.0]), ("b", vec![1.0])]);
        assert!(matches!(result, Err(DriftError::ShapeError { .. })));
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let result = Dataset::from_columns(vec![("a", vec![1.0]), ("a", vec![2.0])]);
        assert!(matches!(result, Err(DriftError::DataError(_))));
    }

    #[test]
    fn test_from_records_fills_missing() {
        let records = vec![
            json!({"x": 1.0, "y": "2.5"}),
            json!({"x": null, "flag": true}),
            json!({"x": 3, "y": "n/a"}),
        ];
        let ds = Dataset::from_records(&records).unwrap();

        assert_eq!(ds.n_rows(), 3);
        assert_eq!(ds.n_columns(), 3);
        assert_eq!(ds.non_missing("x"), vec![1.0, 3.0]);
        assert_eq!(ds.non_missing("y"), vec![2.5]);
        assert_eq!(ds.non_missing("flag"), vec![1.0]);
    }

    #[test]
    fn test_shared_columns_skip_empty_and_excluded() {
        let reference = Dataset::from_columns(vec![
            ("a", vec![1.0, 2.0]),
            ("b", vec![f64::NAN, f64::NAN]),
            ("target", vec![0.0, 1.0]),
            ("only_ref", vec![1.0, 1.0]),
        ])
        .unwrap();
        let current = Dataset::from_columns(vec![
            ("target", vec![1.0, 0.0]),
            ("b", vec![1.0, 2.0]),
            ("a", vec![3.0, 4.0]),
        ])
        .unwrap();

        assert_eq!(reference.shared_numeric_columns(&current, Some("target")), vec!["a"]);
        assert_eq!(reference.shared_numeric_columns(&current, None), vec!["a", "target"]);
    }

    #[test]
    fn test_to_matrix_drops_incomplete_rows() {
        let ds = Dataset::from_columns(vec![
            ("a", vec![1.0, 2.0, 3.0]),
            ("b", vec![4.0, f64::NAN, 6.0]),
        ])
        .unwrap();
        let x = ds.to_matrix(&["a".to_string(), "b".to_string()]).unwrap();
        assert_eq!(x.dim(), (2, 2));
        assert_eq!(x[[1, 0]], 3.0);
        assert_eq!(x[[1, 1]], 6.0);
    }

    #[test]
    fn test_sample_rows_is_seeded_and_ordered() {
        let ds = Dataset::from_columns(vec![("a", (0..100).map(|i| i as f64).collect())]).unwrap();
        let a = ds.sample_rows(10, 7);
        let b = ds.sample_rows(10, 7);

        assert_eq!(a, b);
        assert_eq!(a.n_rows(), 10);
        let values = a.non_missing("a");
        assert!(values.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(ds.sample_rows(500, 7).n_rows(), 100);
    }

    #[test]
    fn test_json_column_form_roundtrip_keeps_missing() {
        let ds = Dataset::from_columns(vec![("a", vec![1.0, f64::NAN])]).unwrap();
        let text = serde_json::to_string(&ds).unwrap();
        assert_eq!(text, r#"{"columns":[{"name":"a","values":[1.0,null]}]}"#);

        let back = Dataset::from_json_str(&text).unwrap();
        assert_eq!(back.n_rows(), 2);
        assert_eq!(back.non_missing("a"), vec![1.0]);
    }
}
