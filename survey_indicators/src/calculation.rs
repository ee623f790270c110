// The calculation engine: one derived column per indicator.

use log::{debug, info, warn};

use crate::config::*;
use crate::dataset::{Dataset, RowView};

/// What the calculation of an indicator produced.
///
/// The `IndicatorSpec` is never modified: the columns to tabulate and the
/// resolved variable type live here.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorResult {
    pub name: String,
    /// The columns the aggregation works on. For calculated indicators, this
    /// is the single derived column (named after the indicator).
    pub columns: Vec<String>,
    pub variable_type: VariableType,
    /// The rows that take part in the aggregation, after the row condition.
    pub rows: Vec<usize>,
    /// Rows removed by `divide` because a source value was missing.
    pub dropped_rows: usize,
    /// True when the relabelling was already applied to the values of the column.
    pub relabel_applied: bool,
    pub calculated: bool,
}

/// Calculates an indicator and writes its derived column into the dataset.
///
/// Descriptive indicators (method `none`) leave the dataset untouched and
/// simply resolve the rows to tabulate.
pub fn calculate(data: &mut Dataset, spec: &IndicatorSpec) -> Result<IndicatorResult, IndicatorError> {
    if spec.source_columns.is_empty() {
        return Err(IndicatorError::NoSourceColumns {
            indicator: spec.name.clone(),
        });
    }
    for col in spec.source_columns.iter() {
        data.require_column(col, &spec.name)?;
    }
    if let Some(cond) = spec.condition.as_ref() {
        for col in cond.columns() {
            data.require_column(&col, &spec.name)?;
        }
    }

    let mut rows: Vec<usize> = match spec.condition.as_ref() {
        Some(cond) => data.filtered_view(|r| cond.matches(r)).rows().to_vec(),
        None => (0..data.len()).collect(),
    };
    debug!(
        "calculate: {}: {} of {} rows selected",
        spec.name,
        rows.len(),
        data.len()
    );

    if !spec.is_calculated() {
        return Ok(IndicatorResult {
            name: spec.name.clone(),
            columns: spec.source_columns.clone(),
            variable_type: spec.variable_type,
            rows,
            dropped_rows: 0,
            relabel_applied: false,
            calculated: false,
        });
    }

    info!("Calculating {} with method {}", spec.name, spec.method.name());

    let mut dropped_rows = 0;
    if let CalculationMethod::Divide { .. } = spec.method {
        let before = rows.len();
        rows.retain(|i| {
            spec.source_columns
                .iter()
                .all(|c| !data.value(*i, c).is_missing())
        });
        dropped_rows = before - rows.len();
        if dropped_rows > 0 {
            warn!(
                "calculate: {}: dropped {} rows with missing values in {:?}",
                spec.name, dropped_rows, spec.source_columns
            );
        }
    }

    let computed: Vec<Value> = rows
        .iter()
        .map(|i| {
            let row = data.row(*i);
            let v = derive_value(&spec.method, &spec.source_columns, &row);
            match spec.value_relabel.as_ref() {
                Some(relabel) => relabel.apply(&v),
                None => v,
            }
        })
        .collect();

    let mut column: Vec<Value> = match (spec.unmatched_rows, data.column(&spec.name)) {
        (UnmatchedRows::Preserve, Some(existing)) => existing.to_vec(),
        _ => vec![Value::Missing; data.len()],
    };
    for (i, v) in rows.iter().zip(computed.into_iter()) {
        column[*i] = v;
    }
    data.set_column(&spec.name, column)?;

    Ok(IndicatorResult {
        name: spec.name.clone(),
        columns: vec![spec.name.clone()],
        variable_type: VariableType::Single,
        rows,
        dropped_rows,
        relabel_applied: spec.value_relabel.is_some(),
        calculated: true,
    })
}

fn pass_label(pass: bool) -> Value {
    if pass {
        Value::text(PASS)
    } else {
        Value::text(NOT_PASS)
    }
}

fn derive_value(method: &CalculationMethod, columns: &[String], row: &RowView<'_>) -> Value {
    match method {
        CalculationMethod::None => Value::Missing,
        CalculationMethod::Score {
            score_map,
            valid_point,
        } => {
            let v = row.get(&columns[0]);
            let score = match score_map {
                Some(m) => Some(m.score(v)),
                None => v.as_f64(),
            };
            pass_label(score.map(|s| s >= *valid_point).unwrap_or(false))
        }
        CalculationMethod::Divide { buckets } => match row.get(&columns[0]).as_f64() {
            Some(x) => Value::text(assign_bucket(x, buckets)),
            None => Value::text(UNMAPPED_BUCKET),
        },
        CalculationMethod::ScoreAverage {
            score_map,
            valid_point,
        } => {
            let total: f64 = columns.iter().map(|c| score_map.score(row.get(c))).sum();
            pass_label(total / columns.len() as f64 >= *valid_point)
        }
        CalculationMethod::ScoreSum {
            score_map,
            valid_point,
        } => {
            let total: f64 = columns.iter().map(|c| score_map.score(row.get(c))).sum();
            pass_label(total >= *valid_point)
        }
        CalculationMethod::SelectAllYes => pass_label(columns.iter().all(|c| row.get(c).is_text(YES))),
        CalculationMethod::SelectAllNo => pass_label(columns.iter().all(|c| row.get(c).is_text(NO))),
        CalculationMethod::SelectAnyYes => pass_label(columns.iter().any(|c| row.get(c).is_text(YES))),
        CalculationMethod::SelectAnyNo => pass_label(columns.iter().any(|c| row.get(c).is_text(NO))),
        CalculationMethod::SelectManual {
            scorer,
            valid_point,
        } => pass_label(scorer.score(row) >= *valid_point),
    }
}

/// Finds the label of the bucket containing `x`.
///
/// Interval keys are tried first (sorted by lower bound), then the `UpTo`
/// keys in ascending order. Values outside every bucket get the blank
/// label `" "`.
pub fn assign_bucket(x: f64, buckets: &[Bucket]) -> &str {
    let mut intervals: Vec<(f64, f64, &str)> = Vec::new();
    let mut points: Vec<(f64, &str)> = Vec::new();
    for b in buckets.iter() {
        match b.key {
            BucketKey::Interval(lower, upper) => intervals.push((lower, upper, &b.label)),
            BucketKey::UpTo(k) => points.push((k, &b.label)),
        }
    }
    intervals.sort_by(|a, b| a.0.total_cmp(&b.0));
    points.sort_by(|a, b| a.0.total_cmp(&b.0));

    for (lower, upper, label) in intervals.iter() {
        if x > *lower && x <= *upper {
            return *label;
        }
    }
    let last = points.len().saturating_sub(1);
    for (i, (k, label)) in points.iter().enumerate() {
        let hit = if i == 0 {
            x <= *k
        } else if i == last {
            x > *k
        } else {
            x > points[i - 1].0 && x <= *k
        };
        if hit {
            return *label;
        }
    }
    UNMAPPED_BUCKET
}
