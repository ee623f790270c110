// The aggregation engine: count and percentage tables.

use std::collections::{BTreeSet, HashMap};

use log::{debug, warn};

use crate::config::{Breakdown, IndicatorError, Relabel, Value};
use crate::dataset::View;

pub const COUNT: &str = "Count";
pub const PERCENTAGE: &str = "Percentage";
const PERCENT_SUFFIX: &str = "(%)";

/// A labelled table of numbers.
///
/// `rows` are in display order. Every row has one value per entry of `columns`.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub index_name: String,
    pub columns: Vec<String>,
    pub rows: Vec<TableRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub label: String,
    pub values: Vec<f64>,
}

impl Table {
    pub fn row(&self, label: &str) -> Option<&TableRow> {
        self.rows.iter().find(|r| r.label == label)
    }

    pub fn get(&self, row: &str, column: &str) -> Option<f64> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.row(row).map(|r| r.values[idx])
    }

    pub fn row_labels(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.label.as_str()).collect()
    }
}

/// The tables of one breakdown column.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakdownBlock {
    pub label: String,
    pub column: String,
    pub table: Table,
}

/// Rounds half to even, the way the reports have always been rounded.
pub fn round_half_even(x: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (x * factor).round_ties_even() / factor
}

fn percent(part: f64, total: f64) -> f64 {
    if total == 0.0 {
        0.0
    } else {
        part / total * 100.0
    }
}

fn values_of<'a>(view: &View<'a>, column: &str) -> Result<Vec<&'a Value>, IndicatorError> {
    view.values(column)
        .ok_or_else(|| IndicatorError::MissingColumn {
            indicator: String::new(),
            column: column.to_string(),
        })
}

/// Counts the categories of a column.
///
/// With an order, the rows follow it exactly: absent categories are zero,
/// values outside the order are not counted. Without one, categories are
/// sorted by decreasing count (ties in order of first appearance).
/// The percentage is rounded to one decimal.
pub fn count(
    view: &View<'_>,
    column: &str,
    order: Option<&[Value]>,
    index_name: &str,
) -> Result<Table, IndicatorError> {
    let values = values_of(view, column)?;
    let mut tally: Vec<(Value, u64)> = match order {
        Some(order) => order.iter().map(|v| (v.clone(), 0)).collect(),
        None => Vec::new(),
    };
    let mut positions: HashMap<Value, usize> = tally
        .iter()
        .enumerate()
        .map(|(i, (v, _))| (v.clone(), i))
        .collect();
    for v in values.into_iter().filter(|v| !v.is_missing()) {
        match positions.get(v) {
            Some(i) => tally[*i].1 += 1,
            None if order.is_none() => {
                positions.insert(v.clone(), tally.len());
                tally.push((v.clone(), 1));
            }
            None => {}
        }
    }
    if order.is_none() {
        tally.sort_by(|a, b| b.1.cmp(&a.1));
    }
    let total: u64 = tally.iter().map(|(_, c)| *c).sum();
    let rows = tally
        .into_iter()
        .map(|(v, c)| TableRow {
            label: v.to_string(),
            values: vec![
                c as f64,
                round_half_even(percent(c as f64, total as f64), 1),
            ],
        })
        .collect();
    Ok(Table {
        index_name: index_name.to_string(),
        columns: vec![COUNT.to_string(), PERCENTAGE.to_string()],
        rows,
    })
}

fn observed_categories<'a>(lists: impl Iterator<Item = &'a Value>) -> Vec<Value> {
    lists
        .filter(|v| !v.is_missing())
        .cloned()
        .collect::<BTreeSet<Value>>()
        .into_iter()
        .collect()
}

/// The overall table of a multi indicator: one column per source column.
///
/// The count rows come first, followed by one `<label>(%)` row per
/// category holding the percentage of the column total (not rounded).
/// `row_labels` renames the category rows by position.
pub fn multi_table(
    view: &View<'_>,
    columns: &[String],
    categories: Option<&[Value]>,
    column_labels: Option<&[String]>,
    row_labels: Option<&[String]>,
    index_name: &str,
) -> Result<Table, IndicatorError> {
    let mut all_values: Vec<Vec<&Value>> = Vec::with_capacity(columns.len());
    for col in columns.iter() {
        all_values.push(values_of(view, col)?);
    }
    let categories: Vec<Value> = match categories {
        Some(c) => c.to_vec(),
        None => observed_categories(all_values.iter().flatten().copied()),
    };

    let headers: Vec<String> = match column_labels {
        Some(labels) if labels.len() == columns.len() => labels.to_vec(),
        Some(labels) => {
            warn!(
                "multi_table: {}: {} labels for {} columns, using the column names",
                index_name,
                labels.len(),
                columns.len()
            );
            columns.to_vec()
        }
        None => columns.to_vec(),
    };

    // counts[category][column]
    let mut counts: Vec<Vec<f64>> = vec![vec![0.0; columns.len()]; categories.len()];
    for (j, values) in all_values.iter().enumerate() {
        for v in values.iter() {
            if let Some(i) = categories.iter().position(|c| c == *v) {
                counts[i][j] += 1.0;
            }
        }
    }
    let totals: Vec<f64> = (0..columns.len())
        .map(|j| counts.iter().map(|r| r[j]).sum())
        .collect();

    let labels: Vec<String> = categories
        .iter()
        .enumerate()
        .map(|(i, c)| {
            row_labels
                .and_then(|l| l.get(i))
                .cloned()
                .unwrap_or_else(|| c.to_string())
        })
        .collect();

    let mut rows: Vec<TableRow> = labels
        .iter()
        .zip(counts.iter())
        .map(|(label, values)| TableRow {
            label: label.clone(),
            values: values.clone(),
        })
        .collect();
    for (label, values) in labels.iter().zip(counts.iter()) {
        rows.push(TableRow {
            label: format!("{}{}", label, PERCENT_SUFFIX),
            values: values
                .iter()
                .zip(totals.iter())
                .map(|(c, t)| percent(*c, *t))
                .collect(),
        });
    }
    Ok(Table {
        index_name: index_name.to_string(),
        columns: headers,
        rows,
    })
}

/// Cross-tabulates the values of `columns` against one breakdown column.
///
/// The values of all the columns are pooled (one entry per response and
/// column). Rows are the breakdown groups, sorted, followed by the same
/// groups suffixed with `(%)`: the percentage of the group total, rounded
/// to two decimals. Columns are the categories, following `order` when
/// given. Rows where the value or the group is missing are not counted.
pub fn breakdown_table(
    view: &View<'_>,
    columns: &[String],
    breakdown: &Breakdown,
    order: Option<&[Value]>,
    relabel: Option<&Relabel>,
) -> Result<Table, IndicatorError> {
    let groups_col = values_of(view, &breakdown.column)?;
    let mut pairs: Vec<(&Value, &Value)> = Vec::new();
    for col in columns.iter() {
        let values = values_of(view, col)?;
        for (v, g) in values.into_iter().zip(groups_col.iter()) {
            if v.is_missing() || g.is_missing() {
                continue;
            }
            if let Some(order) = order {
                if !order.contains(v) {
                    continue;
                }
            }
            pairs.push((v, *g));
        }
    }

    let categories: Vec<Value> = match order {
        Some(o) => o.to_vec(),
        None => observed_categories(pairs.iter().map(|(v, _)| *v)),
    };
    let groups: Vec<Value> = observed_categories(pairs.iter().map(|(_, g)| *g));

    // counts[group][category]
    let mut counts: Vec<Vec<f64>> = vec![vec![0.0; categories.len()]; groups.len()];
    for (v, g) in pairs.iter() {
        let gi = groups.iter().position(|x| x == *g);
        let ci = categories.iter().position(|x| x == *v);
        if let (Some(gi), Some(ci)) = (gi, ci) {
            counts[gi][ci] += 1.0;
        }
    }

    let headers: Vec<String> = categories
        .iter()
        .map(|c| match relabel {
            Some(r) => r.apply(c).to_string(),
            None => c.to_string(),
        })
        .collect();

    let mut rows: Vec<TableRow> = groups
        .iter()
        .zip(counts.iter())
        .map(|(g, values)| TableRow {
            label: g.to_string(),
            values: values.clone(),
        })
        .collect();
    for (g, values) in groups.iter().zip(counts.iter()) {
        let total: f64 = values.iter().sum();
        rows.push(TableRow {
            label: format!("{}{}", g, PERCENT_SUFFIX),
            values: values
                .iter()
                .map(|c| round_half_even(percent(*c, total), 2))
                .collect(),
        });
    }
    debug!(
        "breakdown_table: {} by {}: {} groups, {} categories",
        columns.join(","),
        breakdown.column,
        groups.len(),
        categories.len()
    );
    Ok(Table {
        index_name: breakdown.label.clone(),
        columns: headers,
        rows,
    })
}

/// One block per breakdown, in the declared order.
pub fn breakdown_tables(
    view: &View<'_>,
    columns: &[String],
    breakdowns: &[Breakdown],
    order: Option<&[Value]>,
    relabel: Option<&Relabel>,
) -> Result<Vec<BreakdownBlock>, IndicatorError> {
    let mut res = Vec::with_capacity(breakdowns.len());
    for b in breakdowns.iter() {
        res.push(BreakdownBlock {
            label: b.label.clone(),
            column: b.column.clone(),
            table: breakdown_table(view, columns, b, order, relabel)?,
        });
    }
    Ok(res)
}

/// Mean of a numeric column per group, groups sorted.
///
/// Non-numeric and missing values are skipped. The second column holds the
/// number of values averaged.
pub fn group_means(view: &View<'_>, value_column: &str, by_column: &str) -> Result<Table, IndicatorError> {
    let values = values_of(view, value_column)?;
    let groups = values_of(view, by_column)?;
    let mut acc: HashMap<&Value, (f64, usize)> = HashMap::new();
    for (v, g) in values.iter().zip(groups.iter()) {
        if g.is_missing() {
            continue;
        }
        if let Some(x) = v.as_f64() {
            let e = acc.entry(*g).or_insert((0.0, 0));
            e.0 += x;
            e.1 += 1;
        }
    }
    let mut keys: Vec<&Value> = acc.keys().copied().collect();
    keys.sort();
    let rows = keys
        .into_iter()
        .map(|k| {
            let (sum, n) = acc[k];
            TableRow {
                label: k.to_string(),
                values: vec![sum / n as f64, n as f64],
            }
        })
        .collect();
    Ok(Table {
        index_name: by_column.to_string(),
        columns: vec![value_column.to_string(), "N".to_string()],
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;

    fn data() -> Dataset {
        let mut d = Dataset::with_len(6);
        d.set_column(
            "q",
            vec![
                "Yes".into(),
                "No".into(),
                "Yes".into(),
                Value::Missing,
                "Yes".into(),
                "Maybe".into(),
            ],
        )
        .unwrap();
        d.set_column(
            "4",
            vec![
                "Sudan".into(),
                "Sudan".into(),
                "South Sudan".into(),
                "Sudan".into(),
                "South Sudan".into(),
                Value::Missing,
            ],
        )
        .unwrap();
        d.set_column(
            "m1",
            vec![1.into(), 0.into(), 1.into(), 1.into(), 0.into(), 1.into()],
        )
        .unwrap();
        d.set_column(
            "m2",
            vec![0.into(), 0.into(), 0.into(), 1.into(), 0.into(), 0.into()],
        )
        .unwrap();
        d
    }

    #[test]
    fn count_without_order() {
        let d = data();
        let t = count(&d.full_view(), "q", None, "q").unwrap();
        assert_eq!(t.row_labels(), vec!["Yes", "No", "Maybe"]);
        assert_eq!(t.get("Yes", COUNT), Some(3.0));
        assert_eq!(t.get("Yes", PERCENTAGE), Some(60.0));
        assert_eq!(t.get("No", PERCENTAGE), Some(20.0));
    }

    #[test]
    fn count_with_order_zero_fills() {
        let d = data();
        let order: Vec<Value> = vec!["No".into(), "Yes".into(), "Cannot do at all".into()];
        let t = count(&d.full_view(), "q", Some(&order), "q").unwrap();
        assert_eq!(t.row_labels(), vec!["No", "Yes", "Cannot do at all"]);
        assert_eq!(t.get("Cannot do at all", COUNT), Some(0.0));
        // "Maybe" is outside the order
        assert_eq!(t.get("Yes", PERCENTAGE), Some(75.0));
    }

    #[test]
    fn count_rounds_to_one_decimal() {
        let mut d = Dataset::with_len(3);
        d.set_column("x", vec!["a".into(), "b".into(), "b".into()])
            .unwrap();
        let t = count(&d.full_view(), "x", None, "x").unwrap();
        assert_eq!(t.get("b", PERCENTAGE), Some(66.7));
        assert_eq!(t.get("a", PERCENTAGE), Some(33.3));
    }

    #[test]
    fn half_even() {
        assert_eq!(round_half_even(2.5, 0), 2.0);
        assert_eq!(round_half_even(3.5, 0), 4.0);
        assert_eq!(round_half_even(0.125, 2), 0.12);
    }

    #[test]
    fn multi_table_layout() {
        let d = data();
        let cats: Vec<Value> = vec![1.into(), 0.into()];
        let t = multi_table(
            &d.full_view(),
            &["m1".to_string(), "m2".to_string()],
            Some(&cats),
            Some(&["Onion".to_string(), "Okra".to_string()]),
            Some(&["Yes".to_string(), "No".to_string()]),
            "105",
        )
        .unwrap();
        assert_eq!(t.columns, vec!["Onion", "Okra"]);
        assert_eq!(t.row_labels(), vec!["Yes", "No", "Yes(%)", "No(%)"]);
        assert_eq!(t.get("Yes", "Onion"), Some(4.0));
        assert_eq!(t.get("No", "Okra"), Some(5.0));
        let p = t.get("Yes(%)", "Onion").unwrap();
        assert!((p - 400.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn multi_table_zero_fills_categories() {
        let d = data();
        let cats: Vec<Value> = vec![1.into(), 0.into(), 2.into()];
        let t = multi_table(
            &d.full_view(),
            &["m2".to_string()],
            Some(&cats),
            None,
            None,
            "m",
        )
        .unwrap();
        assert_eq!(t.get("2", "m2"), Some(0.0));
        assert_eq!(t.get("2(%)", "m2"), Some(0.0));
    }

    #[test]
    fn breakdown_percentages_sum_to_100() {
        let d = data();
        let b = Breakdown::new("4", "Country");
        let t = breakdown_table(&d.full_view(), &["q".to_string()], &b, None, None).unwrap();
        assert_eq!(t.index_name, "Country");
        assert_eq!(t.columns, vec!["No", "Yes"]);
        assert_eq!(
            t.row_labels(),
            vec!["South Sudan", "Sudan", "South Sudan(%)", "Sudan(%)"]
        );
        assert_eq!(t.get("Sudan", "Yes"), Some(1.0));
        assert_eq!(t.get("Sudan(%)", "No"), Some(50.0));
        for g in ["South Sudan(%)", "Sudan(%)"] {
            let total: f64 = t.row(g).unwrap().values.iter().sum();
            assert!((total - 100.0).abs() < 0.1);
        }
    }

    #[test]
    fn breakdown_with_order_and_relabel() {
        let d = data();
        let b = Breakdown::new("4", "Country");
        let order: Vec<Value> = vec![1.into(), 0.into()];
        let relabel = Relabel::new([(1, "Yes"), (0, "No")]);
        let t = breakdown_table(
            &d.full_view(),
            &["m1".to_string(), "m2".to_string()],
            &b,
            Some(&order),
            Some(&relabel),
        )
        .unwrap();
        assert_eq!(t.columns, vec!["Yes", "No"]);
        // Sudan: m1 = 1, 0, 1 and m2 = 0, 0, 1
        assert_eq!(t.get("Sudan", "Yes"), Some(3.0));
        assert_eq!(t.get("Sudan", "No"), Some(3.0));
        assert_eq!(t.get("South Sudan(%)", "Yes"), Some(25.0));
    }

    #[test]
    fn relabelled_and_raw_counts_agree() {
        let mut d = data();
        let raw = count(&d.full_view(), "m1", None, "m1").unwrap();
        let relabel = Relabel::new([(1, "Yes"), (0, "No")]);
        let relabelled: Vec<Value> = d
            .column("m1")
            .unwrap()
            .iter()
            .map(|v| relabel.apply(v))
            .collect();
        d.set_column("m1", relabelled).unwrap();
        let after = count(&d.full_view(), "m1", None, "m1").unwrap();
        assert_eq!(raw.get("1", COUNT), after.get("Yes", COUNT));
        assert_eq!(raw.get("0", COUNT), after.get("No", COUNT));
    }

    #[test]
    fn means_by_group() {
        let d = data();
        let t = group_means(&d.full_view(), "m1", "4").unwrap();
        assert_eq!(t.row_labels(), vec!["South Sudan", "Sudan"]);
        assert_eq!(t.get("South Sudan", "m1"), Some(0.5));
        assert_eq!(t.get("Sudan", "N"), Some(3.0));
    }

    #[test]
    fn missing_breakdown_column() {
        let d = data();
        let b = Breakdown::new("nope", "Nope");
        assert!(breakdown_tables(&d.full_view(), &["q".to_string()], &[b], None, None).is_err());
    }
}
