// Primitives shared by the readers.

use std::path::Path;

use survey_indicators::{Dataset, Value};

use crate::pmf::*;

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}

/// Ids of the responses when the source has no id column: `<file name>-<row number>`.
pub fn make_default_id(path: &str) -> impl Fn(usize) -> String {
    let simplified_file_name = simplify_file_name(path);
    move |lineno| format!("{}-{:08}", simplified_file_name, lineno)
}

/// Reads a cell written as text. Empty cells are missing, numbers are numbers.
pub fn parse_cell(s: &str) -> Value {
    if s.trim().is_empty() {
        return Value::Missing;
    }
    match s.trim().parse::<f64>() {
        Ok(x) if x.is_finite() => Value::number(x),
        _ => Value::text(s),
    }
}

/// Assembles the rows read from a file into a dataset.
///
/// Short rows are padded with missing values. Headers left empty are named
/// `Unnamed: <position>`.
pub fn build_dataset(
    path: &str,
    headers: Vec<String>,
    rows: Vec<Vec<Value>>,
    id_column: Option<&str>,
) -> PmfResult<Dataset> {
    let headers: Vec<String> = headers
        .into_iter()
        .enumerate()
        .map(|(idx, h)| {
            if h.trim().is_empty() {
                format!("Unnamed: {}", idx)
            } else {
                h
            }
        })
        .collect();

    let id_idx: Option<usize> = match id_column {
        Some(name) => match headers.iter().position(|h| h == name) {
            Some(idx) => Some(idx),
            None => whatever!("The id column {:?} is not in {}", name, path),
        },
        None => None,
    };

    let default_id = make_default_id(path);
    let mut ids: Vec<String> = Vec::with_capacity(rows.len());
    let mut columns: Vec<Vec<Value>> = vec![Vec::with_capacity(rows.len()); headers.len()];
    for (idx, row) in rows.into_iter().enumerate() {
        if row.len() > headers.len() {
            whatever!(
                "{}: row {} has {} cells for {} columns",
                path,
                idx + 1,
                row.len(),
                headers.len()
            )
        }
        let id = match id_idx.and_then(|i| row.get(i)) {
            Some(v) if !v.is_missing() => v.to_string(),
            _ => default_id(idx + 1),
        };
        ids.push(id);
        let mut cells = row.into_iter();
        for column in columns.iter_mut() {
            column.push(cells.next().unwrap_or(Value::Missing));
        }
    }
    debug!(
        "build_dataset: {}: {} rows, {} columns",
        path,
        ids.len(),
        headers.len()
    );
    Dataset::from_columns(ids, headers.into_iter().zip(columns).collect())
        .context(InvalidTableSnafu { step: path })
}

/// Stacks two tables. Columns present in only one of them are missing in the other.
pub fn append_datasets(first: Dataset, second: Dataset) -> PmfResult<Dataset> {
    let mut names: Vec<String> = first.column_names().to_vec();
    for n in second.column_names() {
        if !names.contains(n) {
            names.push(n.clone());
        }
    }
    let ids: Vec<String> = first.ids().iter().chain(second.ids()).cloned().collect();
    let mut res = Dataset::new(ids);
    for name in names.iter() {
        let mut values: Vec<Value> = Vec::with_capacity(res.len());
        for d in [&first, &second] {
            match d.column(name) {
                Some(c) => values.extend_from_slice(c),
                None => values.extend(std::iter::repeat(Value::Missing).take(d.len())),
            }
        }
        res.set_column(name, values)
            .context(InvalidTableSnafu { step: "append" })?;
    }
    info!(
        "append_datasets: {} + {} responses",
        first.len(),
        second.len()
    );
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells() {
        assert_eq!(parse_cell(""), Value::Missing);
        assert_eq!(parse_cell("  "), Value::Missing);
        assert_eq!(parse_cell("12"), Value::number(12.0));
        assert_eq!(parse_cell(" 2.5"), Value::number(2.5));
        assert_eq!(parse_cell(" No"), Value::text(" No"));
        assert_eq!(parse_cell("NaN"), Value::text("NaN"));
    }

    #[test]
    fn default_ids() {
        let f = make_default_id("/data/survey.csv");
        assert_eq!(f(3), "survey.csv-00000003");
    }

    #[test]
    fn datasets_from_rows() {
        let d = build_dataset(
            "s.csv",
            vec!["id".to_string(), "".to_string(), "q".to_string()],
            vec![
                vec![Value::text("a"), Value::number(1.0), Value::text("Yes")],
                vec![Value::Missing, Value::number(2.0)],
            ],
            Some("id"),
        )
        .unwrap();
        assert_eq!(d.ids(), &["a".to_string(), "s.csv-00000002".to_string()]);
        assert!(d.has_column("Unnamed: 1"));
        assert_eq!(d.value(1, "q"), &Value::Missing);

        assert!(build_dataset("s.csv", vec!["a".to_string()], vec![], Some("b")).is_err());
        assert!(build_dataset(
            "s.csv",
            vec!["a".to_string(), "a".to_string()],
            vec![],
            None
        )
        .is_err());
    }

    #[test]
    fn append() {
        let mut a = Dataset::with_len(1);
        a.set_column("x", vec![Value::number(1.0)]).unwrap();
        let mut b = Dataset::with_len(2);
        b.set_column("y", vec![Value::text("u"), Value::text("v")])
            .unwrap();
        let c = append_datasets(a, b).unwrap();
        assert_eq!(c.len(), 3);
        assert_eq!(c.column_names(), &["x".to_string(), "y".to_string()]);
        assert_eq!(c.value(2, "x"), &Value::Missing);
        assert_eq!(c.value(0, "y"), &Value::Missing);
    }
}
