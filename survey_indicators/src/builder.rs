pub use crate::config::*;

/// A builder for indicator descriptors.
///
/// All the parameters can be given in any order. The combination is only
/// checked by `build`, which fails when the calculation method lacks one of
/// its parameters.
///
/// ```
/// use survey_indicators::builder::IndicatorBuilder;
/// use survey_indicators::{MethodKind, ScoreMap, IndicatorError};
///
/// let spec = IndicatorBuilder::new("satisfaction", &["141"])
///     .number("3.1")
///     .method(MethodKind::Score)
///     .score_map(ScoreMap::new([("High", 4.0), ("Very high", 5.0)]))
///     .valid_point(4.0)
///     .add_breakdown("4", "Country")
///     .add_var_order(&["Pass", "Not Pass"])
///     .build()?;
/// assert_eq!(spec.source_columns, vec!["141".to_string()]);
///
/// # Ok::<(), IndicatorError>(())
/// ```
#[derive(Debug, Clone)]
pub struct IndicatorBuilder {
    name: String,
    number: Option<String>,
    columns: Vec<String>,
    method: MethodKind,
    score_map: Option<ScoreMap>,
    valid_point: Option<f64>,
    buckets: Vec<Bucket>,
    scorer: Option<ManualScorer>,
    category_order: Option<Vec<Value>>,
    breakdown: Vec<Breakdown>,
    variable_type: VariableType,
    value_relabel: Option<Relabel>,
    column_labels: Option<Vec<String>>,
    condition: Option<RowCondition>,
    unmatched_rows: UnmatchedRows,
    display: DisplayInfo,
}

impl IndicatorBuilder {
    pub fn new<S: AsRef<str>>(name: &str, columns: &[S]) -> IndicatorBuilder {
        IndicatorBuilder {
            name: name.to_string(),
            number: None,
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            method: MethodKind::None,
            score_map: None,
            valid_point: None,
            buckets: Vec::new(),
            scorer: None,
            category_order: None,
            breakdown: Vec::new(),
            variable_type: VariableType::Single,
            value_relabel: None,
            column_labels: None,
            condition: None,
            unmatched_rows: UnmatchedRows::Clear,
            display: DisplayInfo::DEFAULT,
        }
    }

    pub fn number(mut self, number: &str) -> IndicatorBuilder {
        self.number = Some(number.to_string());
        self
    }

    pub fn method(mut self, method: MethodKind) -> IndicatorBuilder {
        self.method = method;
        self
    }

    pub fn score_map(mut self, score_map: ScoreMap) -> IndicatorBuilder {
        self.score_map = Some(score_map);
        self
    }

    pub fn valid_point(mut self, valid_point: f64) -> IndicatorBuilder {
        self.valid_point = Some(valid_point);
        self
    }

    /// Adds a bucket for the `divide` method.
    pub fn add_bucket(mut self, bucket: Bucket) -> IndicatorBuilder {
        self.buckets.push(bucket);
        self
    }

    pub fn scorer(mut self, scorer: ManualScorer) -> IndicatorBuilder {
        self.scorer = Some(scorer);
        self
    }

    /// Treats every source column as its own yes/no sub-indicator.
    pub fn multi(mut self) -> IndicatorBuilder {
        self.variable_type = VariableType::Multi;
        self
    }

    /// Adds a breakdown. Breakdowns are tabulated in the order they are added.
    pub fn add_breakdown(mut self, column: &str, label: &str) -> IndicatorBuilder {
        self.breakdown.push(Breakdown::new(column, label));
        self
    }

    /// Sets the ordered list of categories of the indicator.
    pub fn add_var_order<V: Clone + Into<Value>>(mut self, order: &[V]) -> IndicatorBuilder {
        self.category_order = Some(order.iter().cloned().map(|v| v.into()).collect());
        self
    }

    /// Recodes the final values, e.g. `1 -> "Yes"`.
    pub fn add_var_change(mut self, relabel: Relabel) -> IndicatorBuilder {
        self.value_relabel = Some(relabel);
        self
    }

    /// Column labels for the overall table of a multi indicator.
    pub fn add_label<S: AsRef<str>>(mut self, labels: &[S]) -> IndicatorBuilder {
        self.column_labels = Some(labels.iter().map(|s| s.as_ref().to_string()).collect());
        self
    }

    pub fn condition(mut self, condition: RowCondition) -> IndicatorBuilder {
        self.condition = Some(condition);
        self
    }

    pub fn unmatched_rows(mut self, policy: UnmatchedRows) -> IndicatorBuilder {
        self.unmatched_rows = policy;
        self
    }

    pub fn description(mut self, description: &str) -> IndicatorBuilder {
        self.display.description = description.to_string();
        self
    }

    pub fn output_type(mut self, output_type: OutputType) -> IndicatorBuilder {
        self.display.output_type = output_type;
        self
    }

    pub fn period(mut self, period: &str) -> IndicatorBuilder {
        self.display.period = Some(period.to_string());
        self
    }

    pub fn add_target(mut self, target: f64) -> IndicatorBuilder {
        self.display.target = Some(target);
        self
    }

    pub fn add_baseline(mut self, baseline: f64) -> IndicatorBuilder {
        self.display.baseline = Some(baseline);
        self
    }

    pub fn add_midline(mut self, midline: f64) -> IndicatorBuilder {
        self.display.midline = Some(midline);
        self
    }

    fn require_valid_point(&self) -> Result<f64, IndicatorError> {
        self.valid_point
            .ok_or_else(|| IndicatorError::MissingValidPoint {
                indicator: self.name.clone(),
                method: self.method.name(),
            })
    }

    fn require_score_map(&self) -> Result<ScoreMap, IndicatorError> {
        self.score_map
            .clone()
            .ok_or_else(|| IndicatorError::MissingScoreMap {
                indicator: self.name.clone(),
                method: self.method.name(),
            })
    }

    fn require_single_column(&self) -> Result<(), IndicatorError> {
        if self.columns.len() != 1 {
            return Err(IndicatorError::SingleColumnMethod {
                indicator: self.name.clone(),
                method: self.method.name(),
                found: self.columns.len(),
            });
        }
        Ok(())
    }

    fn calculation_method(&self) -> Result<CalculationMethod, IndicatorError> {
        let res = match self.method {
            MethodKind::None => {
                if self.variable_type == VariableType::Single {
                    self.require_single_column()?;
                }
                CalculationMethod::None
            }
            MethodKind::Score => {
                self.require_single_column()?;
                CalculationMethod::Score {
                    score_map: self.score_map.clone(),
                    valid_point: self.require_valid_point()?,
                }
            }
            MethodKind::Divide => {
                self.require_single_column()?;
                if self.buckets.is_empty() {
                    return Err(IndicatorError::MissingBuckets {
                        indicator: self.name.clone(),
                    });
                }
                CalculationMethod::Divide {
                    buckets: self.buckets.clone(),
                }
            }
            MethodKind::ScoreAverage => CalculationMethod::ScoreAverage {
                score_map: self.require_score_map()?,
                valid_point: self.require_valid_point()?,
            },
            MethodKind::ScoreSum => CalculationMethod::ScoreSum {
                score_map: self.require_score_map()?,
                valid_point: self.require_valid_point()?,
            },
            MethodKind::SelectAllYes => CalculationMethod::SelectAllYes,
            MethodKind::SelectAllNo => CalculationMethod::SelectAllNo,
            MethodKind::SelectAnyYes => CalculationMethod::SelectAnyYes,
            MethodKind::SelectAnyNo => CalculationMethod::SelectAnyNo,
            MethodKind::SelectManual => CalculationMethod::SelectManual {
                scorer: self.scorer.clone().ok_or_else(|| IndicatorError::MissingScorer {
                    indicator: self.name.clone(),
                })?,
                valid_point: self.require_valid_point()?,
            },
        };
        Ok(res)
    }

    pub fn build(self) -> Result<IndicatorSpec, IndicatorError> {
        if self.name.trim().is_empty() {
            return Err(IndicatorError::EmptyName);
        }
        if self.columns.is_empty() {
            return Err(IndicatorError::NoSourceColumns {
                indicator: self.name,
            });
        }
        let method = self.calculation_method()?;
        Ok(IndicatorSpec {
            name: self.name,
            number: self.number,
            source_columns: self.columns,
            method,
            category_order: self.category_order,
            breakdown: self.breakdown,
            variable_type: self.variable_type,
            value_relabel: self.value_relabel,
            column_labels: self.column_labels,
            condition: self.condition,
            unmatched_rows: self.unmatched_rows,
            display: self.display,
        })
    }
}
