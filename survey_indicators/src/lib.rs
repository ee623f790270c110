mod config;
mod dataset;

pub mod aggregation;
pub mod builder;
pub mod calculation;
pub mod disability;
pub mod livelihood;
pub mod manual;
pub mod resilience;
pub mod scales;
pub mod wash;

use std::collections::HashSet;

use log::{info, warn};

pub use crate::aggregation::{BreakdownBlock, Table, TableRow};
pub use crate::calculation::IndicatorResult;
pub use crate::config::*;
pub use crate::dataset::{Dataset, RowView, View};

/// The tables of one indicator (one sheet of the report).
///
/// Multi indicators produce one report per source column: the overall
/// table covers all the columns, the breakdown only the column of the sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorReport {
    pub name: String,
    pub sheet_name: String,
    pub number: Option<String>,
    pub display: DisplayInfo,
    pub variable_type: VariableType,
    pub overall: Table,
    pub breakdowns: Vec<BreakdownBlock>,
    /// Rows left out by `divide` because of missing values.
    pub dropped_rows: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorFailure {
    pub indicator: String,
    pub error: IndicatorError,
}

/// The output of a framework run.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub framework: String,
    pub stage: String,
    pub reports: Vec<IndicatorReport>,
    pub failures: Vec<IndicatorFailure>,
}

/// Builds the tables of a calculated indicator.
pub fn aggregate(
    data: &Dataset,
    spec: &IndicatorSpec,
    result: &IndicatorResult,
) -> Result<Vec<IndicatorReport>, IndicatorError> {
    let view = data.view(result.rows.clone());
    // An order that cannot be applied is dropped: the categories are then unordered.
    let order = match spec.category_order.as_deref() {
        Some(o) if has_duplicates(o) => {
            warn!(
                "Indicator {}: the category order {:?} has duplicates, it is ignored",
                spec.name, o
            );
            None
        }
        o => o,
    };
    // The values of a calculated column already carry the new labels.
    let relabel = if result.relabel_applied {
        None
    } else {
        spec.value_relabel.as_ref()
    };
    let with_context = |e: IndicatorError| match e {
        IndicatorError::MissingColumn { column, .. } => IndicatorError::MissingColumn {
            indicator: spec.name.clone(),
            column,
        },
        e => e,
    };

    let report = |sheet_name: String, overall: Table, breakdowns: Vec<BreakdownBlock>| IndicatorReport {
        name: spec.name.clone(),
        sheet_name,
        number: spec.number.clone(),
        display: spec.display.clone(),
        variable_type: result.variable_type,
        overall,
        breakdowns,
        dropped_rows: result.dropped_rows,
    };

    match result.variable_type {
        VariableType::Single => {
            let column = result.columns.first().ok_or_else(|| IndicatorError::NoSourceColumns {
                indicator: spec.name.clone(),
            })?;
            let overall = aggregation::count(&view, column, order, &spec.name).map_err(with_context)?;
            let breakdowns =
                aggregation::breakdown_tables(&view, &result.columns, &spec.breakdown, order, relabel)
                    .map_err(with_context)?;
            Ok(vec![report(spec.name.clone(), overall, breakdowns)])
        }
        VariableType::Multi => {
            let row_labels: Option<Vec<String>> =
                relabel.map(|r| r.pairs().iter().map(|(_, to)| to.to_string()).collect());
            let mut res = Vec::with_capacity(result.columns.len());
            for (i, column) in result.columns.iter().enumerate() {
                let index_name = match spec.number.as_ref() {
                    Some(n) => format!("{}-{}", n, i),
                    None => format!("{}-{}", spec.name, i),
                };
                let overall = aggregation::multi_table(
                    &view,
                    &result.columns,
                    order,
                    spec.column_labels.as_deref(),
                    row_labels.as_deref(),
                    &index_name,
                )
                .map_err(with_context)?;
                let breakdowns = aggregation::breakdown_tables(
                    &view,
                    std::slice::from_ref(column),
                    &spec.breakdown,
                    order,
                    relabel,
                )
                .map_err(with_context)?;
                res.push(report(format!("{}-{}", spec.name, i), overall, breakdowns));
            }
            Ok(res)
        }
    }
}

fn has_duplicates(values: &[Value]) -> bool {
    let mut seen: HashSet<&Value> = HashSet::new();
    !values.iter().all(|v| seen.insert(v))
}

/// A Performance Management Framework: an ordered list of indicators
/// evaluated together over one table.
#[derive(Debug, Clone)]
pub struct Framework {
    pub name: String,
    pub stage: String,
    indicators: Vec<IndicatorSpec>,
}

impl Framework {
    pub fn new(name: &str, stage: &str) -> Framework {
        Framework {
            name: name.to_string(),
            stage: stage.to_string(),
            indicators: Vec::new(),
        }
    }

    pub fn add_indicator(&mut self, spec: IndicatorSpec) {
        self.indicators.push(spec);
    }

    pub fn add_indicators<I: IntoIterator<Item = IndicatorSpec>>(&mut self, specs: I) {
        self.indicators.extend(specs);
    }

    pub fn indicators(&self) -> &[IndicatorSpec] {
        &self.indicators
    }

    /// Runs the framework over the table.
    ///
    /// All the indicators are calculated first, in declaration order, then
    /// aggregated. A failing indicator is recorded in the failures and does
    /// not stop the others. An indicator whose derived column was already
    /// written during this run is rejected.
    pub fn run(&self, data: &mut Dataset) -> Evaluation {
        info!(
            "Evaluating framework {} ({}): {} indicators over {} responses",
            self.name,
            self.stage,
            self.indicators.len(),
            data.len()
        );
        let mut failures: Vec<IndicatorFailure> = Vec::new();
        let mut written: HashSet<String> = HashSet::new();
        let mut calculated: Vec<(&IndicatorSpec, IndicatorResult)> = Vec::new();

        for spec in self.indicators.iter() {
            if spec.is_calculated() && !written.insert(spec.name.clone()) {
                warn!("Indicator {} was already calculated in this run, skipping", spec.name);
                failures.push(IndicatorFailure {
                    indicator: spec.name.clone(),
                    error: IndicatorError::DuplicateColumn {
                        column: spec.name.clone(),
                    },
                });
                continue;
            }
            match calculation::calculate(data, spec) {
                Ok(res) => calculated.push((spec, res)),
                Err(e) => {
                    warn!("Indicator {} could not be calculated: {}", spec.name, e);
                    failures.push(IndicatorFailure {
                        indicator: spec.name.clone(),
                        error: e,
                    });
                }
            }
        }
        info!("All indicators have been calculated");

        let mut reports: Vec<IndicatorReport> = Vec::new();
        for (spec, res) in calculated.iter() {
            info!("{} analysis starts", spec.name);
            match aggregate(data, spec, res) {
                Ok(r) => reports.extend(r),
                Err(e) => {
                    warn!("Indicator {} could not be tabulated: {}", spec.name, e);
                    failures.push(IndicatorFailure {
                        indicator: spec.name.clone(),
                        error: e,
                    });
                }
            }
        }

        Evaluation {
            framework: self.name.clone(),
            stage: self.stage.clone(),
            reports,
            failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::{COUNT, PERCENTAGE};
    use crate::builder::IndicatorBuilder;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn survey() -> Dataset {
        let mut d = Dataset::with_len(5);
        d.set_column(
            "4",
            vec![
                "Sudan".into(),
                "Sudan".into(),
                "South Sudan".into(),
                "South Sudan".into(),
                "Sudan".into(),
            ],
        )
        .unwrap();
        d.set_column(
            "141",
            vec![
                "High".into(),
                "Low".into(),
                "Very high".into(),
                "High".into(),
                "Moderate".into(),
            ],
        )
        .unwrap();
        d.set_column(
            "83-1",
            vec![1.into(), 0.into(), 1.into(), 1.into(), 0.into()],
        )
        .unwrap();
        d.set_column(
            "83-2",
            vec![0.into(), 0.into(), 1.into(), 0.into(), 0.into()],
        )
        .unwrap();
        d
    }

    #[test]
    fn framework_end_to_end() {
        init_logger();
        let mut d = survey();
        let mut fw = Framework::new("ASRD", "Evaluation");
        fw.add_indicators(vec![
            IndicatorBuilder::new("satisfaction", &["141"])
                .method(MethodKind::Score)
                .score_map(ScoreMap::new([("High", 4.0), ("Very high", 5.0)]))
                .valid_point(4.0)
                .add_breakdown("4", "Country")
                .add_var_order(&[PASS, NOT_PASS])
                .build()
                .unwrap(),
            IndicatorBuilder::new("handwashing", &["83-1", "83-2"])
                .multi()
                .add_var_order(&[1, 0])
                .add_var_change(Relabel::new([(1, "Yes"), (0, "No")]))
                .add_label(&["After defecation", "Before eating"])
                .add_breakdown("4", "Country")
                .build()
                .unwrap(),
            IndicatorBuilder::new("broken", &["nope"]).build().unwrap(),
        ]);
        let eval = fw.run(&mut d);

        assert_eq!(eval.failures.len(), 1);
        assert_eq!(eval.failures[0].indicator, "broken");
        assert_eq!(eval.reports.len(), 3);

        let sat = &eval.reports[0];
        assert_eq!(sat.overall.row_labels(), vec![PASS, NOT_PASS]);
        assert_eq!(sat.overall.get(PASS, COUNT), Some(3.0));
        assert_eq!(sat.overall.get(PASS, PERCENTAGE), Some(60.0));
        let block = &sat.breakdowns[0];
        assert_eq!(block.label, "Country");
        assert_eq!(block.table.get("South Sudan(%)", PASS), Some(100.0));

        let hw0 = &eval.reports[1];
        assert_eq!(hw0.sheet_name, "handwashing-0");
        assert_eq!(hw0.overall.columns, vec!["After defecation", "Before eating"]);
        assert_eq!(hw0.overall.get("Yes", "After defecation"), Some(3.0));
        assert_eq!(hw0.breakdowns[0].table.columns, vec!["Yes", "No"]);
        assert_eq!(hw0.breakdowns[0].table.get("Sudan", "Yes"), Some(1.0));
        let hw1 = &eval.reports[2];
        assert_eq!(hw1.breakdowns[0].table.get("Sudan", "No"), Some(3.0));
    }

    #[test]
    fn repeated_indicators_are_rejected() {
        init_logger();
        let mut d = survey();
        let spec = IndicatorBuilder::new("any yes", &["141"])
            .method(MethodKind::SelectAnyYes)
            .build()
            .unwrap();
        let mut fw = Framework::new("x", "y");
        fw.add_indicator(spec.clone());
        fw.add_indicator(spec);
        let eval = fw.run(&mut d);
        assert_eq!(eval.reports.len(), 1);
        assert_eq!(
            eval.failures[0].error,
            IndicatorError::DuplicateColumn {
                column: "any yes".to_string()
            }
        );
    }

    #[test]
    fn missing_breakdown_column_fails_only_that_indicator() {
        init_logger();
        let mut d = survey();
        let mut fw = Framework::new("x", "y");
        fw.add_indicator(
            IndicatorBuilder::new("a", &["141"])
                .add_breakdown("3", "Gender")
                .build()
                .unwrap(),
        );
        fw.add_indicator(IndicatorBuilder::new("b", &["4"]).build().unwrap());
        let eval = fw.run(&mut d);
        assert_eq!(eval.reports.len(), 1);
        assert_eq!(eval.reports[0].name, "b");
        assert_eq!(
            eval.failures[0].error,
            IndicatorError::MissingColumn {
                indicator: "a".to_string(),
                column: "3".to_string()
            }
        );
    }

    #[test]
    fn duplicated_category_order_is_ignored() {
        init_logger();
        let mut d = Dataset::with_len(3);
        d.set_column("q", vec!["Yes".into(), "Yes".into(), "No".into()])
            .unwrap();
        let mut fw = Framework::new("x", "y");
        fw.add_indicator(
            IndicatorBuilder::new("q", &["q"])
                .add_var_order(&["Yes", "No", "Yes"])
                .build()
                .unwrap(),
        );
        let eval = fw.run(&mut d);
        assert!(eval.failures.is_empty());
        let t = &eval.reports[0].overall;
        assert_eq!(t.row_labels(), vec!["Yes", "No"]);
        assert_eq!(t.get("Yes", COUNT), Some(2.0));
        assert_eq!(t.get("No", PERCENTAGE), Some(33.3));
    }
}
