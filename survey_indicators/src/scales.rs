// Helpers shared by the composite indices: answer scales, first-match
// selection and row-wise statistics.

use crate::config::{IndicatorError, Value};
use crate::dataset::{Dataset, RowView};

/// Maps the text answers of one question to points.
#[derive(Debug, Clone, Copy)]
pub struct Scale {
    pub column: &'static str,
    pub levels: &'static [(&'static str, f64)],
}

impl Scale {
    /// The points of the first matching level, `None` when nothing matches.
    pub fn score(&self, row: &RowView<'_>) -> Option<f64> {
        let v = row.get(self.column);
        self.levels
            .iter()
            .find(|(label, _)| v.is_text(label))
            .map(|(_, points)| *points)
    }
}

/// The value of the first case whose condition holds.
///
/// All the conditions are evaluated beforehand by the caller. Overlapping
/// conditions are resolved by declaration order.
pub fn first_match<T: Copy>(cases: &[(bool, T)]) -> Option<T> {
    cases.iter().find(|(hit, _)| *hit).map(|(_, v)| *v)
}

/// Mean of the values that are present, `None` when none is.
pub fn mean_present(values: &[Option<f64>]) -> Option<f64> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        None
    } else {
        Some(present.iter().sum::<f64>() / present.len() as f64)
    }
}

/// Sum of the numeric values of the columns, missing values counting as 0.
pub fn sum_numbers(row: &RowView<'_>, columns: &[&str]) -> f64 {
    columns.iter().filter_map(|c| row.number(c)).sum()
}

/// How many of the columns hold exactly the number `x`.
pub fn count_equal(row: &RowView<'_>, columns: &[&str], x: f64) -> usize {
    columns.iter().filter(|c| row.get(c).is_number(x)).count()
}

/// Writes a numeric column, `None` becoming missing.
pub fn write_numbers(data: &mut Dataset, name: &str, values: Vec<Option<f64>>) -> Result<(), IndicatorError> {
    data.set_column(name, values.into_iter().map(Value::from_option).collect())
}

/// Writes a text column.
pub fn write_texts(data: &mut Dataset, name: &str, values: Vec<&str>) -> Result<(), IndicatorError> {
    data.set_column(name, values.into_iter().map(Value::text).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCALE: Scale = Scale {
        column: "q",
        levels: &[("Low", 1.0), ("High", 5.0)],
    };

    #[test]
    fn scale_and_selection() {
        let mut d = Dataset::with_len(2);
        d.set_column("q", vec!["High".into(), "Other".into()]).unwrap();
        assert_eq!(SCALE.score(&d.row(0)), Some(5.0));
        assert_eq!(SCALE.score(&d.row(1)), None);
        assert_eq!(first_match(&[(false, 1), (true, 2), (true, 3)]), Some(2));
        assert_eq!(first_match::<i32>(&[(false, 1)]), None);
    }

    #[test]
    fn row_statistics() {
        assert_eq!(mean_present(&[Some(1.0), None, Some(3.0)]), Some(2.0));
        assert_eq!(mean_present(&[None, None]), None);
        let mut d = Dataset::with_len(1);
        d.set_column("a", vec![1.into()]).unwrap();
        d.set_column("b", vec![Value::Missing]).unwrap();
        d.set_column("c", vec![1.into()]).unwrap();
        let row = d.row(0);
        assert_eq!(sum_numbers(&row, &["a", "b", "c"]), 2.0);
        assert_eq!(count_equal(&row, &["a", "b", "c"], 1.0), 2);
    }
}
