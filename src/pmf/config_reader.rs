use crate::pmf::*;

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;

use survey_indicators::builder::IndicatorBuilder;
use survey_indicators::{
    Bucket, IndicatorSpec, ManualScorer, MethodKind, OutputType, PointRule, Relabel, RowCondition,
    ScoreMap, UnmatchedRows, Value,
};

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "projectName")]
    pub project_name: String,
    #[serde(rename = "outputDirectory")]
    pub output_directory: Option<String>,
    pub stage: Option<String>,
    pub period: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct DataSource {
    pub provider: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "worksheetName")]
    pub worksheet_name: Option<String>,
    #[serde(rename = "idColumn")]
    pub id_column: Option<String>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub value: JSValue,
    pub score: f64,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct BucketConfig {
    pub above: Option<f64>,
    #[serde(rename = "upTo")]
    pub up_to: f64,
    pub label: String,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct PointRuleConfig {
    pub columns: Vec<String>,
    pub equals: JSValue,
    pub points: f64,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct BreakdownConfig {
    pub column: String,
    pub label: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RelabelConfig {
    pub from: JSValue,
    pub to: JSValue,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ConditionConfig {
    pub column: Option<String>,
    pub equals: Option<JSValue>,
    #[serde(rename = "notEquals")]
    pub not_equals: Option<JSValue>,
    #[serde(rename = "oneOf")]
    pub one_of: Option<Vec<JSValue>>,
    #[serde(rename = "notMissing")]
    pub not_missing: Option<bool>,
    pub all: Option<Vec<ConditionConfig>>,
    pub any: Option<Vec<ConditionConfig>>,
}

impl ConditionConfig {
    pub fn to_condition(&self) -> PmfResult<RowCondition> {
        if let Some(all) = &self.all {
            let conds = all
                .iter()
                .map(|c| c.to_condition())
                .collect::<PmfResult<Vec<RowCondition>>>()?;
            return Ok(RowCondition::All(conds));
        }
        if let Some(any) = &self.any {
            let conds = any
                .iter()
                .map(|c| c.to_condition())
                .collect::<PmfResult<Vec<RowCondition>>>()?;
            return Ok(RowCondition::Any(conds));
        }
        let column = match &self.column {
            Some(c) => c.clone(),
            None => whatever!("A condition needs a column (or 'all' / 'any'): {:?}", self),
        };
        if let Some(v) = &self.equals {
            return Ok(RowCondition::Equals {
                column,
                value: json_to_value(v)?,
            });
        }
        if let Some(v) = &self.not_equals {
            return Ok(RowCondition::NotEquals {
                column,
                value: json_to_value(v)?,
            });
        }
        if let Some(vs) = &self.one_of {
            return Ok(RowCondition::OneOf {
                column,
                values: json_to_values(vs)?,
            });
        }
        if self.not_missing == Some(true) {
            return Ok(RowCondition::NotMissing { column });
        }
        whatever!("The condition on column {:?} has no test", column)
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorConfig {
    pub name: String,
    pub number: Option<JSValue>,
    pub columns: Vec<String>,
    pub method: Option<String>,
    #[serde(rename = "scoreMap")]
    pub score_map: Option<Vec<ScoreEntry>>,
    #[serde(rename = "validPoint")]
    pub valid_point: Option<f64>,
    pub buckets: Option<Vec<BucketConfig>>,
    pub points: Option<Vec<PointRuleConfig>>,
    #[serde(rename = "categoryOrder")]
    pub category_order: Option<Vec<JSValue>>,
    pub breakdown: Option<Vec<BreakdownConfig>>,
    #[serde(rename = "variableType")]
    pub variable_type: Option<String>,
    pub relabel: Option<Vec<RelabelConfig>>,
    pub labels: Option<Vec<String>>,
    pub condition: Option<ConditionConfig>,
    #[serde(rename = "unmatchedRows")]
    pub unmatched_rows: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "outputType")]
    pub output_type: Option<String>,
    pub period: Option<String>,
    pub target: Option<f64>,
    pub baseline: Option<f64>,
    pub midline: Option<f64>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct GroupMeansConfig {
    pub column: String,
    pub by: Vec<String>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct FrameworkConfig {
    pub name: String,
    #[serde(rename = "rowFilter")]
    pub row_filter: Option<ConditionConfig>,
    #[serde(rename = "groupMeans")]
    pub group_means: Option<Vec<GroupMeansConfig>>,
    pub indicators: Vec<IndicatorConfig>,
}

// ********* Cleaning stage ***********

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct AnonymiseConfig {
    pub column: String,
    pub prefix: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct PilotDatesConfig {
    pub column: String,
    pub dates: Vec<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct MissingValuesConfig {
    pub columns: Vec<String>,
    /// `dropRows` or `dropSparseColumns`
    pub policy: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ReplacementConfig {
    pub columns: Vec<String>,
    pub from: String,
    pub to: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SurveyTypeConfig {
    pub column: String,
    #[serde(rename = "ifYes")]
    pub if_yes: String,
    pub otherwise: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    #[serde(rename = "columnNames")]
    pub column_names: Option<Vec<String>>,
    #[serde(rename = "duplicateKeys")]
    pub duplicate_keys: Option<Vec<String>>,
    pub anonymise: Option<Vec<AnonymiseConfig>>,
    #[serde(rename = "pilotDates")]
    pub pilot_dates: Option<PilotDatesConfig>,
    #[serde(rename = "dropColumns")]
    pub drop_columns: Option<Vec<String>>,
    #[serde(rename = "missingValues")]
    pub missing_values: Option<MissingValuesConfig>,
    #[serde(rename = "openEndedColumns")]
    pub open_ended_columns: Option<Vec<String>>,
    pub replacements: Option<Vec<ReplacementConfig>>,
    #[serde(rename = "surveyType")]
    pub survey_type: Option<SurveyTypeConfig>,
    pub regions: Option<Vec<String>>,
    pub locations: Option<Vec<String>>,
    /// Names of the derived columns to compute: `poverty`, `decent_work`, `sri`,
    /// `output_121`, `output_122`, `output_213`, `output_214`, `output_215`.
    pub derivations: Option<Vec<String>>,
    /// `dryFallback` (default) or `sameSeason`
    #[serde(rename = "rainyStatus")]
    pub rainy_status: Option<String>,
    #[serde(rename = "ageColumn")]
    pub age_column: Option<String>,
    #[serde(rename = "disabilityColumns")]
    pub disability_columns: Option<Vec<String>>,
    #[serde(rename = "cleanedFile")]
    pub cleaned_file: Option<String>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct PmfConfig {
    #[serde(rename = "outputSettings")]
    pub output_settings: OutputSettings,
    #[serde(rename = "dataSources", default)]
    pub data_sources: Vec<DataSource>,
    pub preprocessing: Option<PreprocessingConfig>,
    pub frameworks: Vec<FrameworkConfig>,
}

pub fn read_config(path: &str) -> PmfResult<PmfConfig> {
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    let config: PmfConfig = serde_json::from_str(&contents).context(ParsingJsonSnafu {})?;
    Ok(config)
}

pub fn json_to_value(js: &JSValue) -> PmfResult<Value> {
    match js {
        JSValue::Null => Ok(Value::Missing),
        JSValue::Number(n) => match n.as_f64() {
            Some(x) => Ok(Value::number(x)),
            None => whatever!("Could not read the number {}", n),
        },
        JSValue::String(s) => Ok(Value::text(s.as_str())),
        x => whatever!("Expected a number, a string or null, found {}", x),
    }
}

fn json_to_values(js: &[JSValue]) -> PmfResult<Vec<Value>> {
    js.iter().map(json_to_value).collect()
}

fn read_label(js: &JSValue) -> PmfResult<String> {
    match js {
        JSValue::String(s) => Ok(s.clone()),
        JSValue::Number(n) => Ok(n.to_string()),
        x => whatever!("Expected a number or a string, found {}", x),
    }
}

/// Builds the descriptor of an indicator. `default_period` is used when the
/// indicator does not name its own period.
pub fn build_indicator(ic: &IndicatorConfig, default_period: Option<&str>) -> PmfResult<IndicatorSpec> {
    let method_name = ic.method.clone().unwrap_or_else(|| "none".to_string());
    let method = match MethodKind::from_name(&method_name) {
        Some(m) => m,
        None => whatever!("Indicator {}: unknown method {:?}", ic.name, method_name),
    };
    let mut b = IndicatorBuilder::new(&ic.name, ic.columns.as_slice()).method(method);

    if let Some(n) = &ic.number {
        b = b.number(&read_label(n)?);
    }
    if let Some(entries) = &ic.score_map {
        let mut pairs: Vec<(Value, f64)> = Vec::with_capacity(entries.len());
        for e in entries.iter() {
            pairs.push((json_to_value(&e.value)?, e.score));
        }
        b = b.score_map(ScoreMap::new(pairs));
    }
    if let Some(vp) = ic.valid_point {
        b = b.valid_point(vp);
    }
    for bc in ic.buckets.iter().flatten() {
        let bucket = match bc.above {
            Some(lower) => Bucket::interval(lower, bc.up_to, &bc.label),
            None => Bucket::up_to(bc.up_to, &bc.label),
        };
        b = b.add_bucket(bucket);
    }
    if let Some(points) = &ic.points {
        let mut rules: Vec<PointRule> = Vec::with_capacity(points.len());
        for p in points.iter() {
            rules.push(PointRule {
                columns: p.columns.clone(),
                equals: json_to_value(&p.equals)?,
                points: p.points,
            });
        }
        b = b.scorer(ManualScorer::from_rules(&ic.name, rules));
    }
    if let Some(order) = &ic.category_order {
        let order = json_to_values(order)?;
        b = b.add_var_order(order.as_slice());
    }
    for bd in ic.breakdown.iter().flatten() {
        b = b.add_breakdown(&bd.column, &bd.label);
    }
    b = match ic.variable_type.as_deref() {
        Some("multi") => b.multi(),
        Some("single") => b,
        // Several descriptive columns are read as a multiple choice question.
        None if method == MethodKind::None && ic.columns.len() > 1 => b.multi(),
        None => b,
        Some(x) => whatever!("Indicator {}: unknown variable type {:?}", ic.name, x),
    };
    if let Some(relabel) = &ic.relabel {
        let mut pairs: Vec<(Value, Value)> = Vec::with_capacity(relabel.len());
        for r in relabel.iter() {
            pairs.push((json_to_value(&r.from)?, json_to_value(&r.to)?));
        }
        b = b.add_var_change(Relabel::new(pairs));
    }
    if let Some(labels) = &ic.labels {
        b = b.add_label(labels.as_slice());
    }
    if let Some(cond) = &ic.condition {
        b = b.condition(cond.to_condition()?);
    }
    b = match ic.unmatched_rows.as_deref() {
        None | Some("clear") => b.unmatched_rows(UnmatchedRows::Clear),
        Some("preserve") => b.unmatched_rows(UnmatchedRows::Preserve),
        Some(x) => whatever!("Indicator {}: unknown unmatchedRows policy {:?}", ic.name, x),
    };
    if let Some(d) = &ic.description {
        b = b.description(d);
    }
    b = match ic.output_type.as_deref() {
        None | Some("percentage") => b.output_type(OutputType::Percentage),
        Some("count") => b.output_type(OutputType::Count),
        Some(x) => whatever!("Indicator {}: unknown output type {:?}", ic.name, x),
    };
    if let Some(p) = ic.period.as_deref().or(default_period) {
        b = b.period(p);
    }
    if let Some(x) = ic.target {
        b = b.add_target(x);
    }
    if let Some(x) = ic.baseline {
        b = b.add_baseline(x);
    }
    if let Some(x) = ic.midline {
        b = b.add_midline(x);
    }
    b.build().context(InvalidIndicatorSnafu {
        name: ic.name.clone(),
    })
}
