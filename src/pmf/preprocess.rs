// The cleaning stage: everything done to the survey table before the
// indicators are calculated. Steps run in a fixed order and each one is optional.

use std::collections::{HashMap, HashSet};

use survey_indicators::wash::RainyStatus;
use survey_indicators::{disability, livelihood, resilience, wash};
use survey_indicators::{Dataset, IndicatorError, RowView, Value};

use crate::pmf::config_reader::*;
use crate::pmf::output::write_dataset_csv;
use crate::pmf::*;

pub const COLUMNS_BOOK: &str = "columns_book.csv";
pub const OPEN_ENDED: &str = "open_ended.csv";
pub const CLEANED: &str = "cleaned.csv";
pub const SURVEY_TYPE: &str = "survey_type";
pub const STATE: &str = "state";
pub const LOCALITY: &str = "locality";

/// Share of missing values above which a required column is dropped.
const SPARSE_THRESHOLD: f64 = 0.1;

const DERIVATIONS: [&str; 8] = [
    "poverty",
    "decent_work",
    "sri",
    "output_121",
    "output_122",
    "output_213",
    "output_214",
    "output_215",
];

pub fn run_cleaning(data: &mut Dataset, pc: &PreprocessingConfig, out_dir: &Path) -> PmfResult<()> {
    info!(
        "Cleaning starts: {} responses, {} columns",
        data.len(),
        data.column_names().len()
    );
    // Configuration mistakes are reported before anything is modified.
    let rainy_status = read_rainy_status(pc.rainy_status.as_deref())?;
    for name in pc.derivations.iter().flatten() {
        if !DERIVATIONS.contains(&name.as_str()) {
            whatever!(
                "Unknown derivation {:?}, expected one of {:?}",
                name,
                DERIVATIONS
            )
        }
    }

    if let Some(names) = &pc.column_names {
        rename_columns(data, names, out_dir)?;
    }
    if let Some(keys) = &pc.duplicate_keys {
        remove_duplicates(data, keys)?;
    }
    for ac in pc.anonymise.iter().flatten() {
        anonymise(data, ac)?;
    }
    if let Some(pd) = &pc.pilot_dates {
        remove_pilot_rows(data, pd)?;
    }
    if let Some(cols) = &pc.drop_columns {
        let dropped = data.drop_columns(cols.as_slice());
        info!("Dropped {} of {} columns", dropped, cols.len());
    }
    if let Some(mv) = &pc.missing_values {
        handle_missing_values(data, mv)?;
    }
    if let Some(cols) = &pc.open_ended_columns {
        extract_open_ended(data, cols, out_dir)?;
    }
    for rc in pc.replacements.iter().flatten() {
        replace_values(data, rc)?;
    }
    if let Some(st) = &pc.survey_type {
        add_survey_type(data, st)?;
    }
    if let Some(cols) = &pc.regions {
        coalesce(data, cols, STATE)?;
    }
    if let Some(cols) = &pc.locations {
        coalesce(data, cols, LOCALITY)?;
    }
    for name in pc.derivations.iter().flatten() {
        if let Err(e) = derive(data, name, rainy_status) {
            warn!("Derivation {} skipped: {}", name, e);
        }
    }
    if let Some(age_col) = &pc.age_column {
        if let Err(e) = livelihood::derive_age_group(data, age_col) {
            warn!("Age groups skipped: {}", e);
        }
    }
    if let Some(cols) = &pc.disability_columns {
        if let Err(e) = disability::derive_disability(data, cols.as_slice()) {
            warn!("Disability classification skipped: {}", e);
        }
    }

    let cleaned_p = out_dir.join(pc.cleaned_file.as_deref().unwrap_or(CLEANED));
    write_dataset_csv(&cleaned_p, data)?;
    info!(
        "Cleaning done: {} responses, {} columns, written to {}",
        data.len(),
        data.column_names().len(),
        cleaned_p.display()
    );
    Ok(())
}

fn read_rainy_status(s: Option<&str>) -> PmfResult<RainyStatus> {
    match s {
        None | Some("dryFallback") => Ok(RainyStatus::DryFallback),
        Some("sameSeason") => Ok(RainyStatus::SameSeason),
        Some(x) => whatever!(
            "rainyStatus must be dryFallback or sameSeason, found {:?}",
            x
        ),
    }
}

fn require_columns(data: &Dataset, cols: &[String], step: &str) -> PmfResult<()> {
    for c in cols.iter() {
        if !data.has_column(c) {
            whatever!("{}: column {:?} not found", step, c)
        }
    }
    Ok(())
}

/// Renames every column by position and writes the correspondence table.
fn rename_columns(data: &mut Dataset, names: &[String], out_dir: &Path) -> PmfResult<()> {
    let original: Vec<String> = data.column_names().to_vec();
    data.rename_all(names)
        .context(InvalidTableSnafu { step: "columnNames" })?;

    let p = out_dir.join(COLUMNS_BOOK);
    let path_s = p.display().to_string();
    let mut wtr = csv::Writer::from_path(&p).context(CsvWriteSnafu { path: path_s.as_str() })?;
    wtr.write_record(&["Column Names", "Original Names"])
        .context(CsvWriteSnafu { path: path_s.as_str() })?;
    for (new, old) in names.iter().zip(original.iter()) {
        wtr.write_record(&[new, old])
            .context(CsvWriteSnafu { path: path_s.as_str() })?;
    }
    wtr.flush().context(WritingFileSnafu { path: path_s })?;
    info!("{} columns renamed", names.len());
    Ok(())
}

/// Keeps the first of the rows sharing all the key values.
fn remove_duplicates(data: &mut Dataset, keys: &[String]) -> PmfResult<()> {
    require_columns(data, keys, "duplicateKeys")?;
    let key_of = |r: &RowView<'_>| -> Vec<Value> { keys.iter().map(|k| r.get(k).clone()).collect() };

    let mut sizes: HashMap<Vec<Value>, usize> = HashMap::new();
    for r in data.rows() {
        *sizes.entry(key_of(&r)).or_insert(0) += 1;
    }
    let involved: usize = sizes.values().filter(|n| **n > 1).sum();
    info!("Duplicates: {} responses share their key with another one", involved);

    let mut seen: HashSet<Vec<Value>> = HashSet::new();
    let removed = data.retain_rows(|r| seen.insert(key_of(r)));
    info!("Duplicates: {} responses removed, {} left", removed, data.len());
    Ok(())
}

/// Replaces the values of a column with random identifiers. Equal values get
/// the same identifier.
fn anonymise(data: &mut Dataset, ac: &AnonymiseConfig) -> PmfResult<()> {
    let column = match data.column(&ac.column) {
        Some(c) => c,
        None => whatever!("anonymise: column {:?} not found", ac.column),
    };
    let mut ids: HashMap<&Value, String> = HashMap::new();
    let values: Vec<Value> = column
        .iter()
        .map(|v| {
            if v.is_missing() {
                Value::Missing
            } else {
                let id = ids
                    .entry(v)
                    .or_insert_with(|| format!("{}{}", ac.prefix, uuid::Uuid::new_v4()));
                Value::text(id.as_str())
            }
        })
        .collect();
    info!("{}: {} distinct values anonymised", ac.column, ids.len());
    data.set_column(&ac.column, values)
        .context(InvalidTableSnafu { step: "anonymise" })
}

fn remove_pilot_rows(data: &mut Dataset, pd: &PilotDatesConfig) -> PmfResult<()> {
    require_columns(data, std::slice::from_ref(&pd.column), "pilotDates")?;
    let removed = data.retain_rows(|r| {
        let d = r.get(&pd.column).to_string();
        !pd.dates.iter().any(|p| *p == d)
    });
    info!("Pilot rows: {} responses removed, {} left", removed, data.len());
    Ok(())
}

fn handle_missing_values(data: &mut Dataset, mv: &MissingValuesConfig) -> PmfResult<()> {
    require_columns(data, mv.columns.as_slice(), "missingValues")?;
    let mut required: Vec<String> = mv.columns.clone();
    match mv.policy.as_str() {
        "dropRows" => {}
        "dropSparseColumns" => {
            let limit = SPARSE_THRESHOLD * data.len() as f64;
            let (sparse, dense): (Vec<String>, Vec<String>) = required
                .into_iter()
                .partition(|c| data.missing_count(c) as f64 > limit);
            let dropped = data.drop_columns(sparse.as_slice());
            if dropped > 0 {
                warn!(
                    "Missing values: {} columns dropped (more than {}% missing): {:?}",
                    dropped,
                    SPARSE_THRESHOLD * 100.0,
                    sparse
                );
            }
            required = dense;
        }
        x => whatever!(
            "missingValues policy must be dropRows or dropSparseColumns, found {:?}",
            x
        ),
    }
    let removed = data.retain_rows(|r| required.iter().all(|c| !r.get(c).is_missing()));
    info!(
        "Missing values: {} responses removed, {} left",
        removed,
        data.len()
    );
    Ok(())
}

/// Saves the distinct answers of the open-ended questions, then removes them.
fn extract_open_ended(data: &mut Dataset, cols: &[String], out_dir: &Path) -> PmfResult<()> {
    require_columns(data, cols, "openEndedColumns")?;
    let answers: Vec<Vec<String>> = cols
        .iter()
        .map(|c| {
            let mut seen: HashSet<&Value> = HashSet::new();
            data.column(c)
                .unwrap_or_default()
                .iter()
                .filter(|v| !v.is_missing() && seen.insert(*v))
                .map(|v| v.to_string())
                .collect()
        })
        .collect();

    let p = out_dir.join(OPEN_ENDED);
    let path_s = p.display().to_string();
    let mut wtr = csv::Writer::from_path(&p).context(CsvWriteSnafu { path: path_s.as_str() })?;
    wtr.write_record(cols)
        .context(CsvWriteSnafu { path: path_s.as_str() })?;
    let depth = answers.iter().map(|a| a.len()).max().unwrap_or(0);
    for i in 0..depth {
        let record: Vec<&str> = answers
            .iter()
            .map(|a| a.get(i).map(|s| s.as_str()).unwrap_or(""))
            .collect();
        wtr.write_record(&record)
            .context(CsvWriteSnafu { path: path_s.as_str() })?;
    }
    wtr.flush().context(WritingFileSnafu { path: path_s })?;
    data.drop_columns(cols);
    info!("{} open-ended columns saved and removed", cols.len());
    Ok(())
}

fn replace_values(data: &mut Dataset, rc: &ReplacementConfig) -> PmfResult<()> {
    let from = Value::text(rc.from.as_str());
    for c in rc.columns.iter() {
        let column = match data.column(c) {
            Some(column) => column,
            None => {
                warn!("Replacement {:?} -> {:?}: column {:?} not found", rc.from, rc.to, c);
                continue;
            }
        };
        let mut replaced = 0;
        let values: Vec<Value> = column
            .iter()
            .map(|v| {
                if *v == from {
                    replaced += 1;
                    Value::text(rc.to.as_str())
                } else {
                    v.clone()
                }
            })
            .collect();
        debug!("replace_values: {}: {} values replaced", c, replaced);
        data.set_column(c, values)
            .context(InvalidTableSnafu { step: "replacements" })?;
    }
    Ok(())
}

fn add_survey_type(data: &mut Dataset, st: &SurveyTypeConfig) -> PmfResult<()> {
    require_columns(data, std::slice::from_ref(&st.column), "surveyType")?;
    let values: Vec<Value> = data
        .rows()
        .map(|r| {
            if r.get(&st.column).is_text("Yes") {
                Value::text(st.if_yes.as_str())
            } else {
                Value::text(st.otherwise.as_str())
            }
        })
        .collect();
    data.set_column(SURVEY_TYPE, values)
        .context(InvalidTableSnafu { step: "surveyType" })
}

/// The first value present across the columns becomes the target column.
/// The source columns are dropped.
fn coalesce(data: &mut Dataset, cols: &[String], target: &str) -> PmfResult<()> {
    let present: Vec<&String> = cols.iter().filter(|c| data.has_column(c)).collect();
    if present.is_empty() {
        warn!("{}: none of the columns {:?} found", target, cols);
        return Ok(());
    }
    let values: Vec<Value> = data
        .rows()
        .map(|r| {
            present
                .iter()
                .map(|c| r.get(c))
                .find(|v| !v.is_missing())
                .cloned()
                .unwrap_or(Value::Missing)
        })
        .collect();
    let filled = values.iter().filter(|v| !v.is_missing()).count();
    data.set_column(target, values)
        .context(InvalidTableSnafu { step: target })?;
    let sources: Vec<&str> = present
        .iter()
        .map(|c| c.as_str())
        .filter(|c| *c != target)
        .collect();
    data.drop_columns(sources.as_slice());
    info!("{}: filled for {} of {} responses", target, filled, data.len());
    Ok(())
}

fn derive(data: &mut Dataset, name: &str, rainy_status: RainyStatus) -> Result<(), IndicatorError> {
    match name {
        "poverty" => livelihood::derive_poverty(data),
        "decent_work" => livelihood::derive_decent_work(data),
        "sri" => resilience::derive_sri(data),
        "output_121" => wash::derive_output_121(data, rainy_status),
        "output_122" => wash::derive_output_122(data),
        "output_213" => livelihood::derive_output_213(data),
        "output_214" => livelihood::derive_output_214(data),
        "output_215" => wash::derive_output_215(data),
        // Names are checked before the cleaning starts.
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> std::path::PathBuf {
        let p = std::env::temp_dir().join(format!("pmfeval-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&p).unwrap();
        p
    }

    fn texts(xs: &[&str]) -> Vec<Value> {
        xs.iter()
            .map(|x| if x.is_empty() { Value::Missing } else { Value::text(*x) })
            .collect()
    }

    fn table(columns: &[(&str, &[&str])]) -> Dataset {
        let n = columns.first().map(|(_, v)| v.len()).unwrap_or(0);
        let mut d = Dataset::with_len(n);
        for (name, values) in columns {
            d.set_column(name, texts(values)).unwrap();
        }
        d
    }

    fn empty_config() -> PreprocessingConfig {
        serde_json::from_str("{}").unwrap()
    }

    #[test]
    fn renaming_writes_the_book() {
        let dir = temp_dir();
        let mut d = table(&[("Country?", &["Sudan"]), ("Age?", &["30"])]);
        rename_columns(&mut d, &["4".to_string(), "5".to_string()], &dir).unwrap();
        assert_eq!(d.column_names(), &["4".to_string(), "5".to_string()]);
        let book = fs::read_to_string(dir.join(COLUMNS_BOOK)).unwrap();
        assert_eq!(
            book.lines().collect::<Vec<_>>(),
            vec!["Column Names,Original Names", "4,Country?", "5,Age?"]
        );
        assert!(rename_columns(&mut d, &["4".to_string()], &dir).is_err());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn duplicates() {
        let mut d = table(&[
            ("name", &["a", "b", "a", "a", "c"]),
            ("village", &["x", "x", "x", "y", "y"]),
            ("q", &["1", "2", "3", "4", "5"]),
        ]);
        remove_duplicates(&mut d, &["name".to_string(), "village".to_string()]).unwrap();
        assert_eq!(d.len(), 4);
        assert_eq!(d.value(1, "q"), &Value::text("2"));
        assert_eq!(d.value(2, "q"), &Value::text("4"));
        assert!(remove_duplicates(&mut d, &["nope".to_string()]).is_err());
    }

    #[test]
    fn anonymisation() {
        let mut d = table(&[("name", &["Ann", "Bob", "Ann", ""])]);
        anonymise(
            &mut d,
            &AnonymiseConfig {
                column: "name".to_string(),
                prefix: "resp-".to_string(),
            },
        )
        .unwrap();
        let c = d.column("name").unwrap();
        assert_eq!(c[0], c[2]);
        assert_ne!(c[0], c[1]);
        assert!(c[0].as_str().unwrap().starts_with("resp-"));
        assert!(c[3].is_missing());
    }

    #[test]
    fn pilot_rows() {
        let mut d = table(&[("date", &["2023-03-14", "2023-03-15", "2023-03-16", ""])]);
        remove_pilot_rows(
            &mut d,
            &PilotDatesConfig {
                column: "date".to_string(),
                dates: vec!["2023-03-14".to_string(), "2023-03-15".to_string()],
            },
        )
        .unwrap();
        assert_eq!(d.len(), 2);
        assert_eq!(d.value(0, "date"), &Value::text("2023-03-16"));
    }

    #[test]
    fn missing_values() {
        let rows: &[(&str, &[&str])] = &[
            ("a", &["1", "2", "", "4", "5", "6", "7", "8", "9", "10", "11"]),
            ("b", &["1", "", "", "4", "5", "6", "7", "8", "9", "10", "11"]),
            ("c", &["", "", "", "", "", "", "", "", "", "", ""]),
        ];
        let cols = vec!["a".to_string(), "b".to_string()];

        let mut d = table(rows);
        handle_missing_values(
            &mut d,
            &MissingValuesConfig {
                columns: cols.clone(),
                policy: "dropRows".to_string(),
            },
        )
        .unwrap();
        assert_eq!(d.len(), 9);
        assert!(d.has_column("b"));

        // b misses 2 of 11 values (more than 10%): the column goes, not the rows.
        let mut d = table(rows);
        handle_missing_values(
            &mut d,
            &MissingValuesConfig {
                columns: cols.clone(),
                policy: "dropSparseColumns".to_string(),
            },
        )
        .unwrap();
        assert!(!d.has_column("b"));
        assert!(d.has_column("a"));
        assert_eq!(d.len(), 10);

        let mut d = table(rows);
        assert!(handle_missing_values(
            &mut d,
            &MissingValuesConfig {
                columns: cols,
                policy: "fill".to_string(),
            },
        )
        .is_err());
    }

    #[test]
    fn open_ended() {
        let dir = temp_dir();
        let mut d = table(&[
            ("q", &["Yes", "No", "Yes"]),
            ("why", &["far", "", "far"]),
            ("other", &["a", "b", "c"]),
        ]);
        extract_open_ended(&mut d, &["why".to_string(), "other".to_string()], &dir).unwrap();
        assert_eq!(d.column_names(), &["q".to_string()]);
        let s = fs::read_to_string(dir.join(OPEN_ENDED)).unwrap();
        assert_eq!(
            s.lines().collect::<Vec<_>>(),
            vec!["why,other", "far,a", ",b", ",c"]
        );
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn replacements_and_survey_type() {
        let mut d = table(&[("q", &["Average", " No", "Good"]), ("host", &["Yes", "No", ""])]);
        for (from, to) in [("Average", "Moderate"), (" No", "No")] {
            replace_values(
                &mut d,
                &ReplacementConfig {
                    columns: vec!["q".to_string(), "absent".to_string()],
                    from: from.to_string(),
                    to: to.to_string(),
                },
            )
            .unwrap();
        }
        assert_eq!(d.column("q").unwrap(), texts(&["Moderate", "No", "Good"]).as_slice());

        add_survey_type(
            &mut d,
            &SurveyTypeConfig {
                column: "host".to_string(),
                if_yes: "Host community".to_string(),
                otherwise: "Displaced".to_string(),
            },
        )
        .unwrap();
        assert_eq!(
            d.column(SURVEY_TYPE).unwrap(),
            texts(&["Host community", "Displaced", "Displaced"]).as_slice()
        );
    }

    #[test]
    fn regions() {
        let mut d = table(&[
            ("state", &["", "Blue Nile", ""]),
            ("ss_state", &["Jonglei", "Unity", ""]),
            ("other", &["1", "2", "3"]),
        ]);
        coalesce(
            &mut d,
            &["state".to_string(), "ss_state".to_string(), "nope".to_string()],
            STATE,
        )
        .unwrap();
        assert_eq!(
            d.column(STATE).unwrap(),
            texts(&["Jonglei", "Blue Nile", ""]).as_slice()
        );
        assert!(!d.has_column("ss_state"));
        assert!(d.has_column("other"));
    }

    #[test]
    fn full_cleaning() {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = temp_dir();
        let mut d = table(&[
            ("Work 1", &["Yes", "No", "No"]),
            ("Work 2", &["No", "No", "Yes"]),
            ("Age", &["30", "", "70"]),
        ]);
        d.set_column(
            "Age",
            vec![Value::number(30.0), Value::Missing, Value::number(70.0)],
        )
        .unwrap();
        let mut pc = empty_config();
        pc.column_names = Some(vec!["90".to_string(), "98".to_string(), "5".to_string()]);
        // sri needs columns this table does not have: it is skipped.
        pc.derivations = Some(vec!["sri".to_string(), "decent_work".to_string()]);
        pc.age_column = Some("5".to_string());
        pc.cleaned_file = Some("clean.csv".to_string());
        run_cleaning(&mut d, &pc, &dir).unwrap();

        assert!(!d.has_column(resilience::SRI));
        assert_eq!(
            d.column(livelihood::DECENT_WORK).unwrap(),
            texts(&["Yes", "No", "Yes"]).as_slice()
        );
        assert_eq!(
            d.column(livelihood::AGE_GROUP).unwrap(),
            texts(&["25 - 34", "", "Above 65 years"]).as_slice()
        );
        assert!(dir.join("clean.csv").exists());
        assert!(dir.join(COLUMNS_BOOK).exists());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn configuration_mistakes() {
        let dir = temp_dir();
        let mut d = table(&[("q", &["Yes"])]);
        let mut pc = empty_config();
        pc.derivations = Some(vec!["income".to_string()]);
        assert!(run_cleaning(&mut d, &pc, &dir).is_err());

        let mut pc = empty_config();
        pc.rainy_status = Some("wet".to_string());
        assert!(run_cleaning(&mut d, &pc, &dir).is_err());
        fs::remove_dir_all(&dir).unwrap();
    }
}
