// The in-memory survey table.

use std::collections::HashMap;

use log::debug;

use crate::config::{IndicatorError, Value};

static MISSING: Value = Value::Missing;

/// A table of survey responses.
///
/// Rows are responses, identified by a stable id. Columns are named by
/// the short question identifiers of the survey instrument ("105-1",
/// "36-7", ...). The names are opaque keys, they are never parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    ids: Vec<String>,
    names: Vec<String>,
    columns: HashMap<String, Vec<Value>>,
}

impl Dataset {
    /// An empty table (no columns) over the given responses.
    pub fn new(ids: Vec<String>) -> Dataset {
        Dataset {
            ids,
            names: Vec::new(),
            columns: HashMap::new(),
        }
    }

    /// An empty table of `n` responses with generated ids.
    pub fn with_len(n: usize) -> Dataset {
        Dataset::new((1..=n).map(|i| format!("response-{:08}", i)).collect())
    }

    pub fn from_columns(
        ids: Vec<String>,
        columns: Vec<(String, Vec<Value>)>,
    ) -> Result<Dataset, IndicatorError> {
        let mut res = Dataset::new(ids);
        for (name, values) in columns {
            if res.has_column(&name) {
                return Err(IndicatorError::DuplicateColumn { column: name });
            }
            res.set_column(&name, values)?;
        }
        Ok(res)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// The column names, in insertion order.
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.columns.get(name).map(|v| v.as_slice())
    }

    /// Like `column` but reports which indicator needed the column.
    pub fn require_column(&self, name: &str, indicator: &str) -> Result<&[Value], IndicatorError> {
        self.column(name).ok_or_else(|| IndicatorError::MissingColumn {
            indicator: indicator.to_string(),
            column: name.to_string(),
        })
    }

    /// Checks that all the columns exist.
    pub fn require_columns(&self, names: &[&str], indicator: &str) -> Result<(), IndicatorError> {
        for name in names {
            self.require_column(name, indicator)?;
        }
        Ok(())
    }

    /// The value at the given row. Absent columns read as missing.
    pub fn value(&self, row: usize, column: &str) -> &Value {
        self.columns
            .get(column)
            .and_then(|c| c.get(row))
            .unwrap_or(&MISSING)
    }

    /// Adds a column, or replaces it if it already exists.
    pub fn set_column(&mut self, name: &str, values: Vec<Value>) -> Result<(), IndicatorError> {
        if values.len() != self.len() {
            return Err(IndicatorError::LengthMismatch {
                column: name.to_string(),
                expected: self.len(),
                found: values.len(),
            });
        }
        if self.columns.insert(name.to_string(), values).is_none() {
            self.names.push(name.to_string());
        }
        Ok(())
    }

    /// Drops the given columns. Unknown names are ignored. Returns the number of columns dropped.
    pub fn drop_columns<S: AsRef<str>>(&mut self, names: &[S]) -> usize {
        let mut dropped = 0;
        for name in names {
            if self.columns.remove(name.as_ref()).is_some() {
                dropped += 1;
            }
        }
        let columns = &self.columns;
        self.names.retain(|n| columns.contains_key(n));
        dropped
    }

    pub fn rename_column(&mut self, from: &str, to: &str) -> Result<(), IndicatorError> {
        if from == to {
            return Ok(());
        }
        if self.has_column(to) {
            return Err(IndicatorError::DuplicateColumn {
                column: to.to_string(),
            });
        }
        let values = self.columns.remove(from).ok_or_else(|| IndicatorError::MissingColumn {
            indicator: String::new(),
            column: from.to_string(),
        })?;
        self.columns.insert(to.to_string(), values);
        for n in self.names.iter_mut() {
            if n == from {
                *n = to.to_string();
            }
        }
        Ok(())
    }

    /// Renames every column by position.
    pub fn rename_all(&mut self, new_names: &[String]) -> Result<(), IndicatorError> {
        if new_names.len() != self.names.len() {
            return Err(IndicatorError::LengthMismatch {
                column: "<column names>".to_string(),
                expected: self.names.len(),
                found: new_names.len(),
            });
        }
        let mut columns: HashMap<String, Vec<Value>> = HashMap::new();
        for (old, new) in self.names.iter().zip(new_names.iter()) {
            if columns.contains_key(new) {
                return Err(IndicatorError::DuplicateColumn {
                    column: new.clone(),
                });
            }
            let values = self.columns.remove(old).unwrap_or_default();
            columns.insert(new.clone(), values);
        }
        self.columns = columns;
        self.names = new_names.to_vec();
        Ok(())
    }

    pub fn row(&self, index: usize) -> RowView<'_> {
        RowView { data: self, index }
    }

    pub fn rows(&self) -> impl Iterator<Item = RowView<'_>> {
        (0..self.len()).map(move |index| RowView { data: self, index })
    }

    /// Keeps the rows accepted by the predicate. Returns the number of rows removed.
    pub fn retain_rows<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&RowView<'_>) -> bool,
    {
        let kept: Vec<usize> = self.rows().filter(|r| keep(r)).map(|r| r.index).collect();
        let removed = self.len() - kept.len();
        if removed > 0 {
            *self = self.select_rows(&kept);
        }
        debug!("retain_rows: removed {} rows, {} left", removed, self.len());
        removed
    }

    /// A new table with the given rows, in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> Dataset {
        let ids = rows.iter().map(|i| self.ids[*i].clone()).collect();
        let columns = self
            .columns
            .iter()
            .map(|(name, values)| {
                (
                    name.clone(),
                    rows.iter().map(|i| values[*i].clone()).collect(),
                )
            })
            .collect();
        Dataset {
            ids,
            names: self.names.clone(),
            columns,
        }
    }

    pub fn missing_count(&self, column: &str) -> usize {
        self.column(column)
            .map(|c| c.iter().filter(|v| v.is_missing()).count())
            .unwrap_or(0)
    }

    /// All the rows of the table.
    pub fn full_view(&self) -> View<'_> {
        View {
            data: self,
            rows: (0..self.len()).collect(),
        }
    }

    /// The given rows. Out of range indices are ignored.
    pub fn view(&self, mut rows: Vec<usize>) -> View<'_> {
        rows.retain(|i| *i < self.len());
        View { data: self, rows }
    }

    /// The rows accepted by the predicate.
    pub fn filtered_view<F>(&self, keep: F) -> View<'_>
    where
        F: Fn(&RowView<'_>) -> bool,
    {
        View {
            data: self,
            rows: self.rows().filter(|r| keep(r)).map(|r| r.index).collect(),
        }
    }
}

/// A borrowed row of a dataset.
#[derive(Clone, Copy)]
pub struct RowView<'a> {
    data: &'a Dataset,
    index: usize,
}

impl<'a> RowView<'a> {
    pub fn get(&self, column: &str) -> &'a Value {
        self.data.value(self.index, column)
    }

    /// The numeric value of a column, if it holds a number.
    pub fn number(&self, column: &str) -> Option<f64> {
        self.get(column).as_f64()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn id(&self) -> &'a str {
        &self.data.ids[self.index]
    }
}

/// A subset of the rows of a dataset, read-only.
#[derive(Clone)]
pub struct View<'a> {
    data: &'a Dataset,
    rows: Vec<usize>,
}

impl<'a> View<'a> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    pub fn data(&self) -> &'a Dataset {
        self.data
    }

    pub fn values(&self, column: &str) -> Option<Vec<&'a Value>> {
        let c = self.data.column(column)?;
        Some(self.rows.iter().map(|i| &c[*i]).collect())
    }

    pub fn row_views(&self) -> impl Iterator<Item = RowView<'a>> + '_ {
        let data = self.data;
        self.rows.iter().map(move |i| data.row(*i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::from_columns(
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
            vec![
                (
                    "3".to_string(),
                    vec!["Male".into(), "Female".into(), Value::Missing],
                ),
                ("8".to_string(), vec![4.into(), 2.into(), 7.into()]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn set_column_checks_length() {
        let mut d = sample();
        let err = d.set_column("x", vec![1.into()]).unwrap_err();
        assert_eq!(
            err,
            IndicatorError::LengthMismatch {
                column: "x".to_string(),
                expected: 3,
                found: 1
            }
        );
        d.set_column("8", vec![1.into(), 1.into(), 1.into()]).unwrap();
        assert_eq!(d.column_names(), &["3".to_string(), "8".to_string()]);
        assert_eq!(d.value(2, "8"), &Value::from(1));
    }

    #[test]
    fn absent_columns_read_missing() {
        let d = sample();
        assert!(d.value(0, "nope").is_missing());
        assert!(d.row(1).get("nope").is_missing());
        assert_eq!(d.row(1).id(), "b");
    }

    #[test]
    fn retain_and_rename() {
        let mut d = sample();
        let removed = d.retain_rows(|r| !r.get("3").is_missing());
        assert_eq!(removed, 1);
        assert_eq!(d.ids(), &["a".to_string(), "b".to_string()]);
        d.rename_column("3", "gender").unwrap();
        assert!(d.has_column("gender"));
        assert!(!d.has_column("3"));
        assert_eq!(d.column_names()[0], "gender");
        assert!(d.rename_column("gender", "8").is_err());
    }

    #[test]
    fn rename_all_is_positional() {
        let mut d = sample();
        d.rename_all(&["x".to_string(), "y".to_string()]).unwrap();
        assert_eq!(d.value(0, "y"), &Value::from(4));
        assert!(d.rename_all(&["z".to_string()]).is_err());
    }

    #[test]
    fn views() {
        let mut d = sample();
        let v = d.filtered_view(|r| r.number("8").map(|x| x > 3.0).unwrap_or(false));
        assert_eq!(v.rows(), &[0, 2]);
        assert_eq!(
            v.values("3").unwrap(),
            vec![&Value::from("Male"), &Value::Missing]
        );
        assert_eq!(d.missing_count("3"), 1);
        assert_eq!(d.drop_columns(&["3", "nope"]), 1);
    }

    #[test]
    fn generated_ids() {
        let d = Dataset::with_len(2);
        assert_eq!(d.ids()[1], "response-00000002");
    }
}
