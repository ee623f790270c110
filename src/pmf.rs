use log::{debug, info, warn};

use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use serde_json::Value as JSValue;

use survey_indicators::{Dataset, Framework, IndicatorError};

use crate::args::Args;
use crate::pmf::config_reader::*;

pub mod config_reader;
pub mod io_common;
pub mod io_csv;
pub mod io_excel;
pub mod output;
pub mod preprocess;

#[derive(Debug, Snafu)]
pub enum PmfError {
    #[snafu(display("Error opening file {path}"))]
    OpeningFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error writing file {path}"))]
    WritingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON: {source}"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error opening Excel file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("The Excel file {path} has no worksheet or no header"))]
    EmptyExcel { path: String },
    #[snafu(display("Worksheet {name} not found in {path}"))]
    MissingWorksheet { name: String, path: String },
    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error parsing line {lineno} of {path}: {source}"))]
    CsvLineParse {
        source: csv::Error,
        path: String,
        lineno: usize,
    },
    #[snafu(display("Error writing CSV file {path}: {source}"))]
    CsvWrite { source: csv::Error, path: String },
    #[snafu(display("Invalid table ({step}): {source}"))]
    InvalidTable {
        step: String,
        source: IndicatorError,
    },
    #[snafu(display("Invalid indicator {name}: {source}"))]
    InvalidIndicator {
        name: String,
        source: IndicatorError,
    },
    #[snafu(display("Provider not implemented {provider:?}"))]
    UnknownProvider { provider: String },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type PmfResult<T> = Result<T, PmfError>;

fn read_source(root: &Path, source: &DataSource) -> PmfResult<Dataset> {
    let p: PathBuf = root.join(&source.file_path);
    let path = p.as_path().display().to_string();
    info!("Attempting to read survey file {:?}", path);
    match source.provider.as_str() {
        "csv" => io_csv::read_csv(&path, source.id_column.as_deref()),
        "xlsx" | "excel" => io_excel::read_excel(
            &path,
            source.worksheet_name.as_deref(),
            source.id_column.as_deref(),
        ),
        x => UnknownProviderSnafu { provider: x }.fail(),
    }
}

fn load_data(args: &Args, config: &PmfConfig, root: &Path) -> PmfResult<Dataset> {
    // The command line input replaces the data sources of the configuration.
    if let Some(input) = &args.input {
        let source = DataSource {
            provider: args.input_type.clone().unwrap_or_else(|| "csv".to_string()),
            file_path: input.clone(),
            worksheet_name: args.excel_worksheet_name.clone(),
            id_column: None,
        };
        return read_source(Path::new(""), &source);
    }

    let mut res: Option<Dataset> = None;
    for source in config.data_sources.iter() {
        let file_data = read_source(root, source)?;
        res = Some(match res {
            None => file_data,
            Some(acc) => io_common::append_datasets(acc, file_data)?,
        });
    }
    match res {
        Some(data) => Ok(data),
        None => whatever!("no data sources detected"),
    }
}

fn run_framework(
    data: &Dataset,
    fc: &FrameworkConfig,
    settings: &OutputSettings,
    out_dir: &Path,
) -> PmfResult<JSValue> {
    let mut fw_data = match &fc.row_filter {
        Some(filter) => {
            let cond = filter.to_condition()?;
            for col in cond.columns() {
                if !data.has_column(&col) {
                    whatever!(
                        "Framework {}: the row filter uses the unknown column {:?}",
                        fc.name,
                        col
                    )
                }
            }
            let rows = data.filtered_view(|r| cond.matches(r)).rows().to_vec();
            info!(
                "Framework {}: {} of {} responses pass the row filter",
                fc.name,
                rows.len(),
                data.len()
            );
            data.select_rows(&rows)
        }
        None => data.clone(),
    };

    let stage = settings.stage.clone().unwrap_or_default();
    let mut framework = Framework::new(&fc.name, &stage);
    let mut config_failures: Vec<(String, String)> = Vec::new();
    for ic in fc.indicators.iter() {
        match build_indicator(ic, settings.period.as_deref()) {
            Ok(spec) => framework.add_indicator(spec),
            Err(e) => {
                warn!("Indicator {} is skipped: {}", ic.name, e);
                config_failures.push((ic.name.clone(), e.to_string()));
            }
        }
    }
    debug!(
        "run_framework: {}: {} indicators",
        fc.name,
        framework.indicators().len()
    );

    let evaluation = framework.run(&mut fw_data);

    let fw_dir = out_dir.join(output::file_stem(&fc.name));
    fs::create_dir_all(&fw_dir).context(WritingFileSnafu {
        path: fw_dir.display().to_string(),
    })?;
    output::write_sheets(&fw_dir, &evaluation)?;
    for gm in fc.group_means.iter().flatten() {
        output::write_group_means(&fw_dir, &fw_data, gm)?;
    }
    Ok(output::evaluation_to_json(&evaluation, &config_failures))
}

pub fn run_report(args: &Args) -> PmfResult<()> {
    let config_p = Path::new(args.config.as_str());
    let config = read_config(&args.config)?;
    info!("config: {:?}", config);

    let root: PathBuf = config_p
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_default();

    let mut data = load_data(args, &config, &root)?;
    info!(
        "Initial data points: {} ({} columns)",
        data.len(),
        data.column_names().len()
    );

    let out_dir: PathBuf = match (&args.out, &config.output_settings.output_directory) {
        (Some(out), _) => PathBuf::from(out),
        (None, Some(out)) => root.join(out),
        (None, None) => root.clone(),
    };
    fs::create_dir_all(&out_dir).context(WritingFileSnafu {
        path: out_dir.display().to_string(),
    })?;

    match (&config.preprocessing, args.skip_preprocessing) {
        (Some(pc), false) => preprocess::run_cleaning(&mut data, pc, &out_dir)?,
        (Some(_), true) => info!("Skipping the cleaning steps"),
        (None, _) => {}
    }

    let mut frameworks_js: Vec<JSValue> = Vec::new();
    for fc in config.frameworks.iter() {
        info!("Framework {} starts", fc.name);
        frameworks_js.push(run_framework(&data, fc, &config.output_settings, &out_dir)?);
    }

    // Assemble the final json
    let summary_js = json!({
        "project": config.output_settings.project_name,
        "stage": config.output_settings.stage,
        "period": config.output_settings.period,
        "frameworks": frameworks_js,
    });
    let pretty_js_summary = serde_json::to_string_pretty(&summary_js).context(ParsingJsonSnafu {})?;
    let summary_p = out_dir.join(format!(
        "{}_summary.json",
        output::file_stem(&config.output_settings.project_name)
    ));
    output::write_text(&summary_p, &pretty_js_summary)?;
    info!("Summary written to {}", summary_p.display());

    // The reference summary, if provided for comparison
    if let Some(reference_p) = &args.reference {
        output::check_reference(&pretty_js_summary, reference_p)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let p = std::env::temp_dir().join(format!("pmfeval-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&p).unwrap();
        p
    }

    fn args(config: &Path) -> Args {
        Args {
            config: config.display().to_string(),
            reference: None,
            out: None,
            input: None,
            input_type: None,
            excel_worksheet_name: None,
            skip_preprocessing: false,
            verbose: false,
        }
    }

    const DATA: &str = "\
country,q1,q2
Sudan,Yes,Yes
Sudan,No,Yes
South Sudan,Yes,No
";

    const CONFIG: &str = r#"{
        "outputSettings": { "projectName": "test", "outputDirectory": "out", "stage": "Evaluation" },
        "dataSources": [ { "provider": "csv", "filePath": "data.csv" } ],
        "preprocessing": { "columnNames": ["4", "q1", "q2"], "cleanedFile": "cleaned.csv" },
        "frameworks": [
            {
                "name": "wash",
                "indicators": [
                    {
                        "name": "both yes",
                        "columns": ["q1", "q2"],
                        "method": "score_select_allyes",
                        "categoryOrder": ["Pass", "Not Pass"],
                        "breakdown": [ { "column": "4", "label": "Country" } ]
                    },
                    { "name": "bad", "columns": ["q1"], "method": "divide" },
                    { "name": "unknown", "columns": ["nope"] }
                ]
            }
        ]
    }"#;

    #[test]
    fn end_to_end() {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = temp_dir();
        fs::write(dir.join("data.csv"), DATA).unwrap();
        fs::write(dir.join("config.json"), CONFIG).unwrap();
        run_report(&args(&dir.join("config.json"))).unwrap();

        let out = dir.join("out");
        assert!(out.join("columns_book.csv").exists());
        assert!(out.join("cleaned.csv").exists());
        assert!(out.join("wash").join("both yes.csv").exists());

        let summary: JSValue =
            serde_json::from_str(&fs::read_to_string(out.join("test_summary.json")).unwrap())
                .unwrap();
        let fw = &summary["frameworks"][0];
        assert_eq!(fw["framework"], "wash");
        let failures = fw["failures"].as_array().unwrap();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0]["indicator"], "bad");
        assert_eq!(failures[1]["indicator"], "unknown");
        let report = &fw["reports"][0];
        assert_eq!(report["name"], "both yes");
        assert_eq!(report["overall"]["rows"][0]["label"], "Pass");
        assert_eq!(report["overall"]["rows"][0]["values"][0], 1.0);

        // The same run checked against its own summary.
        let mut a = args(&dir.join("config.json"));
        a.reference = Some(out.join("test_summary.json").display().to_string());
        a.out = Some(dir.join("out2").display().to_string());
        run_report(&a).unwrap();
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn reference_mismatch_is_an_error() {
        let dir = temp_dir();
        fs::write(dir.join("data.csv"), DATA).unwrap();
        fs::write(dir.join("config.json"), CONFIG).unwrap();
        fs::write(dir.join("reference.json"), "{\"frameworks\": []}").unwrap();
        let mut a = args(&dir.join("config.json"));
        a.reference = Some(dir.join("reference.json").display().to_string());
        assert!(run_report(&a).is_err());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn unknown_provider() {
        let source = DataSource {
            provider: "sav".to_string(),
            file_path: "data.sav".to_string(),
            worksheet_name: None,
            id_column: None,
        };
        assert!(matches!(
            read_source(Path::new(""), &source),
            Err(PmfError::UnknownProvider { .. })
        ));
    }
}
