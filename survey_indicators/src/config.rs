// ********* Survey values ***********

use std::cmp::Ordering;
use std::error::Error;
use std::fmt::{Debug, Display};
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::dataset::RowView;

/// Label written by the scoring methods when the threshold is reached.
pub const PASS: &str = "Pass";
/// Label written by the scoring methods when the threshold is not reached.
pub const NOT_PASS: &str = "Not Pass";
/// Label assigned by `divide` to values that fall in none of the declared buckets.
pub const UNMAPPED_BUCKET: &str = " ";
pub const YES: &str = "Yes";
pub const NO: &str = "No";

/// A single cell of the survey table.
///
/// Numbers are stored as `f64` (surveys export integers and decimals in the
/// same columns). NaN is never stored: `Value::number` turns it into `Missing`.
#[derive(Debug, Clone)]
pub enum Value {
    Missing,
    Number(f64),
    Text(String),
}

impl Value {
    pub fn number(x: f64) -> Value {
        if x.is_nan() {
            Value::Missing
        } else {
            Value::Number(x)
        }
    }

    pub fn text(s: impl Into<String>) -> Value {
        Value::Text(s.into())
    }

    /// Wraps an optional number, mapping `None` to `Missing`.
    pub fn from_option(x: Option<f64>) -> Value {
        x.map(Value::number).unwrap_or(Value::Missing)
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// True when the value is exactly the given text.
    pub fn is_text(&self, s: &str) -> bool {
        self.as_str() == Some(s)
    }

    /// True when the value is a number equal to `x`.
    pub fn is_number(&self, x: f64) -> bool {
        self.as_f64() == Some(x)
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Missing => 0,
            Value::Number(_) => 1,
            Value::Text(_) => 2,
        }
    }
}

// -0.0 and 0.0 must hash the same way since they compare equal.
fn number_bits(x: f64) -> u64 {
    if x == 0.0 {
        0.0f64.to_bits()
    } else if x.is_nan() {
        f64::NAN.to_bits()
    } else {
        x.to_bits()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Missing, Value::Missing) => true,
            (Value::Number(a), Value::Number(b)) => number_bits(*a) == number_bits(*b),
            (Value::Text(a), Value::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Value::Missing => {}
            Value::Number(x) => number_bits(*x).hash(state),
            Value::Text(s) => s.hash(state),
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => {
                if number_bits(*a) == number_bits(*b) {
                    Ordering::Equal
                } else {
                    a.total_cmp(b)
                }
            }
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Value) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Missing => Ok(()),
            Value::Number(x) if x.fract() == 0.0 && x.abs() < 1e15 => write!(f, "{}", *x as i64),
            Value::Number(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Value {
        Value::number(x)
    }
}

impl From<i64> for Value {
    fn from(x: i64) -> Value {
        Value::Number(x as f64)
    }
}

impl From<i32> for Value {
    fn from(x: i32) -> Value {
        Value::Number(x as f64)
    }
}

// ********* Calculation parameters ***********

/// Weights given to the raw answers by the scoring methods.
///
/// Answers that are not in the map score 0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreMap {
    entries: Vec<(Value, f64)>,
}

impl ScoreMap {
    pub fn new<I, V>(entries: I) -> ScoreMap
    where
        I: IntoIterator<Item = (V, f64)>,
        V: Into<Value>,
    {
        ScoreMap {
            entries: entries.into_iter().map(|(v, s)| (v.into(), s)).collect(),
        }
    }

    pub fn lookup(&self, v: &Value) -> Option<f64> {
        self.entries
            .iter()
            .find(|(key, _)| key == v)
            .map(|(_, score)| *score)
    }

    pub fn score(&self, v: &Value) -> f64 {
        self.lookup(v).unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The key of a `divide` bucket.
///
/// - `UpTo(k)` keys are sorted and turned into consecutive ranges: the first
/// one is `value <= k`, the last one is `value > k` and the ones in between
/// are `(previous, k]`.
/// - `Interval(lower, upper)` keys match `lower < value <= upper` and are
/// always tested before the `UpTo` keys.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BucketKey {
    UpTo(f64),
    Interval(f64, f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub key: BucketKey,
    pub label: String,
}

impl Bucket {
    pub fn up_to(k: f64, label: &str) -> Bucket {
        Bucket {
            key: BucketKey::UpTo(k),
            label: label.to_string(),
        }
    }

    pub fn interval(lower: f64, upper: f64, label: &str) -> Bucket {
        Bucket {
            key: BucketKey::Interval(lower, upper),
            label: label.to_string(),
        }
    }
}

/// One line of a hand-written scoring recipe: every column of `columns`
/// whose answer equals `equals` adds `points` to the score.
#[derive(Debug, Clone, PartialEq)]
pub struct PointRule {
    pub columns: Vec<String>,
    pub equals: Value,
    pub points: f64,
}

type ScoreFn = dyn Fn(&RowView<'_>) -> f64;

/// A user-supplied scoring function for `score_select_manual` indicators.
#[derive(Clone)]
pub struct ManualScorer {
    name: String,
    score_fn: Rc<ScoreFn>,
}

impl ManualScorer {
    pub fn new<F>(name: &str, f: F) -> ManualScorer
    where
        F: Fn(&RowView<'_>) -> f64 + 'static,
    {
        ManualScorer {
            name: name.to_string(),
            score_fn: Rc::new(f),
        }
    }

    /// Builds a scorer out of a list of point rules.
    pub fn from_rules(name: &str, rules: Vec<PointRule>) -> ManualScorer {
        ManualScorer::new(name, move |row| {
            let mut score = 0.0;
            for rule in rules.iter() {
                for col in rule.columns.iter() {
                    if *row.get(col) == rule.equals {
                        score += rule.points;
                    }
                }
            }
            score
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn score(&self, row: &RowView<'_>) -> f64 {
        (self.score_fn)(row)
    }
}

impl Debug for ManualScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ManualScorer({})", self.name)
    }
}

impl PartialEq for ManualScorer {
    fn eq(&self, other: &ManualScorer) -> bool {
        self.name == other.name && Rc::ptr_eq(&self.score_fn, &other.score_fn)
    }
}

/// The names of the calculation methods, as found in configuration files.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum MethodKind {
    None,
    Score,
    Divide,
    ScoreAverage,
    ScoreSum,
    SelectAllYes,
    SelectAllNo,
    SelectAnyYes,
    SelectAnyNo,
    SelectManual,
}

impl MethodKind {
    pub fn from_name(name: &str) -> Option<MethodKind> {
        let res = match name {
            "none" | "" => MethodKind::None,
            "score" => MethodKind::Score,
            "divide" => MethodKind::Divide,
            "score_average" => MethodKind::ScoreAverage,
            "score_sum" => MethodKind::ScoreSum,
            "score_select_allyes" => MethodKind::SelectAllYes,
            "score_select_allno" => MethodKind::SelectAllNo,
            "score_select_anyyes" => MethodKind::SelectAnyYes,
            "score_select_anyno" => MethodKind::SelectAnyNo,
            "score_select_manual" => MethodKind::SelectManual,
            _ => return None,
        };
        Some(res)
    }

    pub fn name(&self) -> &'static str {
        match self {
            MethodKind::None => "none",
            MethodKind::Score => "score",
            MethodKind::Divide => "divide",
            MethodKind::ScoreAverage => "score_average",
            MethodKind::ScoreSum => "score_sum",
            MethodKind::SelectAllYes => "score_select_allyes",
            MethodKind::SelectAllNo => "score_select_allno",
            MethodKind::SelectAnyYes => "score_select_anyyes",
            MethodKind::SelectAnyNo => "score_select_anyno",
            MethodKind::SelectManual => "score_select_manual",
        }
    }
}

/// How an indicator column is derived from its source columns.
///
/// Each variant carries exactly the parameters it needs. Use the builder to
/// construct it from loose parameters: invalid combinations are rejected there.
#[derive(Debug, Clone, PartialEq)]
pub enum CalculationMethod {
    /// Descriptive statistics only, the source columns are tabulated as they are.
    None,
    /// Single column. Without a score map, the raw numeric answer is the score.
    Score {
        score_map: Option<ScoreMap>,
        valid_point: f64,
    },
    /// Single numeric column, bucketed into labels.
    Divide { buckets: Vec<Bucket> },
    ScoreAverage {
        score_map: ScoreMap,
        valid_point: f64,
    },
    ScoreSum {
        score_map: ScoreMap,
        valid_point: f64,
    },
    SelectAllYes,
    SelectAllNo,
    SelectAnyYes,
    SelectAnyNo,
    SelectManual {
        scorer: ManualScorer,
        valid_point: f64,
    },
}

impl CalculationMethod {
    pub fn kind(&self) -> MethodKind {
        match self {
            CalculationMethod::None => MethodKind::None,
            CalculationMethod::Score { .. } => MethodKind::Score,
            CalculationMethod::Divide { .. } => MethodKind::Divide,
            CalculationMethod::ScoreAverage { .. } => MethodKind::ScoreAverage,
            CalculationMethod::ScoreSum { .. } => MethodKind::ScoreSum,
            CalculationMethod::SelectAllYes => MethodKind::SelectAllYes,
            CalculationMethod::SelectAllNo => MethodKind::SelectAllNo,
            CalculationMethod::SelectAnyYes => MethodKind::SelectAnyYes,
            CalculationMethod::SelectAnyNo => MethodKind::SelectAnyNo,
            CalculationMethod::SelectManual { .. } => MethodKind::SelectManual,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }
}

// ********* Indicator descriptors **********

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum VariableType {
    /// One output column.
    Single,
    /// Every source column is an independent yes/no sub-indicator.
    Multi,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum OutputType {
    Count,
    Percentage,
}

/// What happens to the rows excluded by the indicator condition when the
/// derived column is written.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum UnmatchedRows {
    /// The derived column is missing for the excluded rows.
    Clear,
    /// The excluded rows keep whatever the column held before (or missing
    /// if the column did not exist).
    Preserve,
}

/// A breakdown (disaggregation) of an indicator.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Breakdown {
    pub column: String,
    pub label: String,
}

impl Breakdown {
    pub fn new(column: &str, label: &str) -> Breakdown {
        Breakdown {
            column: column.to_string(),
            label: label.to_string(),
        }
    }
}

/// Recoding of the final values, e.g. `1 -> "Yes"`. Unmapped values pass through.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relabel {
    pairs: Vec<(Value, Value)>,
}

impl Relabel {
    pub fn new<I, K, V>(pairs: I) -> Relabel
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Value>,
        V: Into<Value>,
    {
        Relabel {
            pairs: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn apply(&self, v: &Value) -> Value {
        self.pairs
            .iter()
            .find(|(from, _)| from == v)
            .map(|(_, to)| to.clone())
            .unwrap_or_else(|| v.clone())
    }

    pub fn pairs(&self) -> &[(Value, Value)] {
        &self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Row filter applied before an indicator is calculated.
#[derive(Debug, Clone, PartialEq)]
pub enum RowCondition {
    Equals { column: String, value: Value },
    NotEquals { column: String, value: Value },
    OneOf { column: String, values: Vec<Value> },
    NotMissing { column: String },
    All(Vec<RowCondition>),
    Any(Vec<RowCondition>),
}

impl RowCondition {
    pub fn equals(column: &str, value: impl Into<Value>) -> RowCondition {
        RowCondition::Equals {
            column: column.to_string(),
            value: value.into(),
        }
    }

    pub fn matches(&self, row: &RowView<'_>) -> bool {
        match self {
            RowCondition::Equals { column, value } => row.get(column) == value,
            RowCondition::NotEquals { column, value } => row.get(column) != value,
            RowCondition::OneOf { column, values } => values.contains(row.get(column)),
            RowCondition::NotMissing { column } => !row.get(column).is_missing(),
            RowCondition::All(conds) => conds.iter().all(|c| c.matches(row)),
            RowCondition::Any(conds) => conds.iter().any(|c| c.matches(row)),
        }
    }

    /// All the columns this condition reads.
    pub fn columns(&self) -> Vec<String> {
        match self {
            RowCondition::Equals { column, .. }
            | RowCondition::NotEquals { column, .. }
            | RowCondition::OneOf { column, .. }
            | RowCondition::NotMissing { column } => vec![column.clone()],
            RowCondition::All(conds) | RowCondition::Any(conds) => {
                conds.iter().flat_map(|c| c.columns()).collect()
            }
        }
    }
}

/// Metadata used to annotate the tables and charts of an indicator.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayInfo {
    pub description: String,
    pub output_type: OutputType,
    pub period: Option<String>,
    pub target: Option<f64>,
    pub baseline: Option<f64>,
    pub midline: Option<f64>,
}

impl DisplayInfo {
    pub const DEFAULT: DisplayInfo = DisplayInfo {
        description: String::new(),
        output_type: OutputType::Percentage,
        period: None,
        target: None,
        baseline: None,
        midline: None,
    };
}

/// The immutable description of one indicator. Build it with `IndicatorBuilder`.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSpec {
    pub name: String,
    pub number: Option<String>,
    pub source_columns: Vec<String>,
    pub method: CalculationMethod,
    pub category_order: Option<Vec<Value>>,
    pub breakdown: Vec<Breakdown>,
    pub variable_type: VariableType,
    pub value_relabel: Option<Relabel>,
    /// Column labels of the overall table of `Multi` indicators.
    pub column_labels: Option<Vec<String>>,
    pub condition: Option<RowCondition>,
    pub unmatched_rows: UnmatchedRows,
    pub display: DisplayInfo,
}

impl IndicatorSpec {
    pub fn is_calculated(&self) -> bool {
        self.method != CalculationMethod::None
    }
}

// ********* Errors **********

/// Errors that prevent an indicator from being built, calculated or tabulated.
///
/// None of them is fatal to the other indicators of a framework.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum IndicatorError {
    EmptyName,
    NoSourceColumns {
        indicator: String,
    },
    MissingScoreMap {
        indicator: String,
        method: &'static str,
    },
    MissingValidPoint {
        indicator: String,
        method: &'static str,
    },
    MissingBuckets {
        indicator: String,
    },
    MissingScorer {
        indicator: String,
    },
    SingleColumnMethod {
        indicator: String,
        method: &'static str,
        found: usize,
    },
    MissingColumn {
        indicator: String,
        column: String,
    },
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },
    DuplicateColumn {
        column: String,
    },
}

impl Error for IndicatorError {}

impl Display for IndicatorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndicatorError::EmptyName => write!(f, "an indicator must have a name"),
            IndicatorError::NoSourceColumns { indicator } => {
                write!(f, "indicator {}: no source columns", indicator)
            }
            IndicatorError::MissingScoreMap { indicator, method } => write!(
                f,
                "indicator {}: method {} requires a score map",
                indicator, method
            ),
            IndicatorError::MissingValidPoint { indicator, method } => write!(
                f,
                "indicator {}: method {} requires a valid point",
                indicator, method
            ),
            IndicatorError::MissingBuckets { indicator } => {
                write!(f, "indicator {}: method divide requires buckets", indicator)
            }
            IndicatorError::MissingScorer { indicator } => write!(
                f,
                "indicator {}: method score_select_manual requires a scorer",
                indicator
            ),
            IndicatorError::SingleColumnMethod {
                indicator,
                method,
                found,
            } => write!(
                f,
                "indicator {}: method {} works on exactly one column, found {}",
                indicator, method, found
            ),
            IndicatorError::MissingColumn { indicator, column } => {
                write!(f, "indicator {}: column {:?} not found", indicator, column)
            }
            IndicatorError::LengthMismatch {
                column,
                expected,
                found,
            } => write!(
                f,
                "column {:?} has {} values, the table has {} rows",
                column, found, expected
            ),
            IndicatorError::DuplicateColumn { column } => {
                write!(f, "column {:?} already exists", column)
            }
        }
    }
}
