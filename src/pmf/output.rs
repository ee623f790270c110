// Writing the report: the CSV sheets, the cleaned data and the JSON summary.

use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use survey_indicators::aggregation::group_means;
use survey_indicators::{
    Dataset, Evaluation, IndicatorReport, OutputType, Table, Value, VariableType,
};

use crate::pmf::config_reader::GroupMeansConfig;
use crate::pmf::*;

/// A file name for an indicator, framework or project name.
pub fn file_stem(name: &str) -> String {
    let s: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if s.is_empty() {
        "unnamed".to_string()
    } else {
        s
    }
}

pub fn write_text(path: &Path, contents: &str) -> PmfResult<()> {
    fs::write(path, contents).context(WritingFileSnafu {
        path: path.display().to_string(),
    })
}

fn format_number(x: f64) -> String {
    Value::number(x).to_string()
}

fn write_table<W: std::io::Write>(
    wtr: &mut csv::Writer<W>,
    table: &Table,
    path: &str,
) -> PmfResult<()> {
    let mut header: Vec<&str> = vec![table.index_name.as_str()];
    header.extend(table.columns.iter().map(|s| s.as_str()));
    wtr.write_record(&header).context(CsvWriteSnafu { path })?;
    for row in table.rows.iter() {
        let mut record: Vec<String> = vec![row.label.clone()];
        record.extend(row.values.iter().map(|x| format_number(*x)));
        wtr.write_record(&record).context(CsvWriteSnafu { path })?;
    }
    Ok(())
}

fn write_sheet(path: &Path, report: &IndicatorReport) -> PmfResult<()> {
    let path_s = path.display().to_string();
    let mut wtr = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(path)
        .context(CsvWriteSnafu { path: path_s.as_str() })?;

    let description = if report.display.description.is_empty() {
        report.name.as_str()
    } else {
        report.display.description.as_str()
    };
    wtr.write_record(&[description])
        .context(CsvWriteSnafu { path: path_s.as_str() })?;
    for block in report.breakdowns.iter() {
        write_table(&mut wtr, &block.table, &path_s)?;
    }
    wtr.write_record(&[""])
        .context(CsvWriteSnafu { path: path_s.as_str() })?;
    write_table(&mut wtr, &report.overall, &path_s)?;
    wtr.flush().context(WritingFileSnafu { path: path_s })?;
    Ok(())
}

/// One CSV file per report, named after its sheet.
pub fn write_sheets(dir: &Path, evaluation: &Evaluation) -> PmfResult<()> {
    for report in evaluation.reports.iter() {
        let p = dir.join(format!("{}.csv", file_stem(&report.sheet_name)));
        debug!("write_sheets: {}", p.display());
        write_sheet(&p, report)?;
    }
    info!(
        "Framework {}: {} sheets written to {}",
        evaluation.framework,
        evaluation.reports.len(),
        dir.display()
    );
    Ok(())
}

pub fn write_dataset_csv(path: &Path, data: &Dataset) -> PmfResult<()> {
    let path_s = path.display().to_string();
    let mut wtr = csv::Writer::from_path(path).context(CsvWriteSnafu { path: path_s.as_str() })?;
    wtr.write_record(data.column_names())
        .context(CsvWriteSnafu { path: path_s.as_str() })?;
    for row in data.rows() {
        let record: Vec<String> = data
            .column_names()
            .iter()
            .map(|c| row.get(c).to_string())
            .collect();
        wtr.write_record(&record)
            .context(CsvWriteSnafu { path: path_s.as_str() })?;
    }
    wtr.flush().context(WritingFileSnafu { path: path_s })?;
    Ok(())
}

/// Writes the mean of a column per group, one file per grouping column.
pub fn write_group_means(dir: &Path, data: &Dataset, gm: &GroupMeansConfig) -> PmfResult<()> {
    let view = data.full_view();
    for by in gm.by.iter() {
        match group_means(&view, &gm.column, by) {
            Ok(table) => {
                let p = dir.join(format!(
                    "means_{}_by_{}.csv",
                    file_stem(&gm.column),
                    file_stem(by)
                ));
                let path_s = p.display().to_string();
                let mut wtr =
                    csv::Writer::from_path(&p).context(CsvWriteSnafu { path: path_s.as_str() })?;
                write_table(&mut wtr, &table, &path_s)?;
                wtr.flush().context(WritingFileSnafu { path: path_s })?;
            }
            Err(e) => warn!("Group means of {} by {} skipped: {}", gm.column, by, e),
        }
    }
    Ok(())
}

// ********* JSON summary ***********

pub fn table_to_json(table: &Table) -> JSValue {
    let rows: Vec<JSValue> = table
        .rows
        .iter()
        .map(|r| json!({"label": r.label, "values": r.values}))
        .collect();
    json!({
        "index": table.index_name,
        "columns": table.columns,
        "rows": rows,
    })
}

pub fn report_to_json(report: &IndicatorReport) -> JSValue {
    let breakdowns: Vec<JSValue> = report
        .breakdowns
        .iter()
        .map(|b| {
            json!({
                "label": b.label,
                "column": b.column,
                "table": table_to_json(&b.table),
            })
        })
        .collect();
    let output_type = match report.display.output_type {
        OutputType::Count => "count",
        OutputType::Percentage => "percentage",
    };
    let variable_type = match report.variable_type {
        VariableType::Single => "single",
        VariableType::Multi => "multi",
    };
    json!({
        "name": report.name,
        "sheet": report.sheet_name,
        "number": report.number,
        "description": report.display.description,
        "outputType": output_type,
        "period": report.display.period,
        "target": report.display.target,
        "baseline": report.display.baseline,
        "midline": report.display.midline,
        "variableType": variable_type,
        "droppedRows": report.dropped_rows,
        "overall": table_to_json(&report.overall),
        "breakdowns": breakdowns,
    })
}

/// The summary of a framework. The indicators rejected when reading the
/// configuration come first in the failure list.
pub fn evaluation_to_json(evaluation: &Evaluation, config_failures: &[(String, String)]) -> JSValue {
    let reports: Vec<JSValue> = evaluation.reports.iter().map(report_to_json).collect();
    let failures: Vec<JSValue> = config_failures
        .iter()
        .map(|(name, message)| json!({"indicator": name, "message": message}))
        .chain(
            evaluation
                .failures
                .iter()
                .map(|f| json!({"indicator": f.indicator, "message": f.error.to_string()})),
        )
        .collect();
    json!({
        "framework": evaluation.framework,
        "stage": evaluation.stage,
        "reports": reports,
        "failures": failures,
    })
}

pub fn read_summary(path: &str) -> PmfResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    debug!("read_summary: {} bytes", contents.len());
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}

/// Compares the pretty-printed summary with a reference summary.
pub fn check_reference(pretty_js_summary: &str, reference_path: &str) -> PmfResult<()> {
    let summary_ref = read_summary(reference_path)?;
    let pretty_js_summary_ref =
        serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
    if pretty_js_summary_ref != pretty_js_summary {
        warn!("Found differences with the reference string");
        print_diff(pretty_js_summary_ref.as_str(), pretty_js_summary, "\n");
        whatever!("Difference detected between calculated summary and reference summary")
    }
    info!("The summary matches the reference {}", reference_path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use survey_indicators::{BreakdownBlock, DisplayInfo, IndicatorError, IndicatorFailure, TableRow};

    fn temp_dir() -> std::path::PathBuf {
        let p = std::env::temp_dir().join(format!("pmfeval-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&p).unwrap();
        p
    }

    fn table(index: &str) -> Table {
        Table {
            index_name: index.to_string(),
            columns: vec!["Count".to_string(), "Percentage".to_string()],
            rows: vec![
                TableRow {
                    label: "Yes".to_string(),
                    values: vec![2.0, 66.67],
                },
                TableRow {
                    label: "No".to_string(),
                    values: vec![1.0, 33.33],
                },
            ],
        }
    }

    fn evaluation() -> Evaluation {
        let mut display = DisplayInfo::DEFAULT;
        display.description = "Households with access".to_string();
        display.target = Some(60.0);
        Evaluation {
            framework: "wash".to_string(),
            stage: "Evaluation".to_string(),
            reports: vec![IndicatorReport {
                name: "access".to_string(),
                sheet_name: "access/1".to_string(),
                number: Some("1.2.1".to_string()),
                display,
                variable_type: VariableType::Single,
                overall: table("1.2.1"),
                breakdowns: vec![BreakdownBlock {
                    label: "Country".to_string(),
                    column: "4".to_string(),
                    table: table("Country"),
                }],
                dropped_rows: 0,
            }],
            failures: vec![IndicatorFailure {
                indicator: "other".to_string(),
                error: IndicatorError::MissingColumn {
                    indicator: "other".to_string(),
                    column: "x".to_string(),
                },
            }],
        }
    }

    #[test]
    fn stems() {
        assert_eq!(file_stem("both yes"), "both yes");
        assert_eq!(file_stem("a/b:c"), "a_b_c");
        assert_eq!(file_stem("  "), "unnamed");
    }

    #[test]
    fn sheets() {
        let dir = temp_dir();
        write_sheets(&dir, &evaluation()).unwrap();
        let s = fs::read_to_string(dir.join("access_1.csv")).unwrap();
        let lines: Vec<&str> = s.lines().collect();
        assert_eq!(lines[0], "Households with access");
        assert_eq!(lines[1], "Country,Count,Percentage");
        assert_eq!(lines[2], "Yes,2,66.67");
        assert_eq!(lines[5], "1.2.1,Count,Percentage");
        assert_eq!(lines.len(), 8);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn summary() {
        let js = evaluation_to_json(
            &evaluation(),
            &[("bad".to_string(), "unknown method".to_string())],
        );
        assert_eq!(js["framework"], "wash");
        assert_eq!(js["failures"][0]["indicator"], "bad");
        assert_eq!(js["failures"][1]["indicator"], "other");
        let r = &js["reports"][0];
        assert_eq!(r["outputType"], "percentage");
        assert_eq!(r["target"], 60.0);
        assert_eq!(r["baseline"], JSValue::Null);
        assert_eq!(r["overall"]["rows"][1]["values"][1], 33.33);
        assert_eq!(r["breakdowns"][0]["table"]["index"], "Country");
    }

    #[test]
    fn reference() {
        let dir = temp_dir();
        let pretty = serde_json::to_string_pretty(&json!({"a": [1.5, "x"]})).unwrap();
        let p = dir.join("ref.json");
        // The reference does not need to be pretty-printed.
        fs::write(&p, "{\"a\":[1.5,\"x\"]}").unwrap();
        assert!(check_reference(&pretty, &p.display().to_string()).is_ok());
        fs::write(&p, "{\"a\":[2.5,\"x\"]}").unwrap();
        assert!(check_reference(&pretty, &p.display().to_string()).is_err());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn datasets_and_means() {
        let dir = temp_dir();
        let mut d = Dataset::with_len(3);
        d.set_column(
            "sri",
            vec![Value::number(1.0), Value::number(2.0), Value::number(4.0)],
        )
        .unwrap();
        d.set_column(
            "gender",
            vec![Value::text("F"), Value::text("F"), Value::text("M")],
        )
        .unwrap();
        write_dataset_csv(&dir.join("clean.csv"), &d).unwrap();
        let s = fs::read_to_string(dir.join("clean.csv")).unwrap();
        assert_eq!(s.lines().next(), Some("sri,gender"));
        assert_eq!(s.lines().nth(2), Some("2,F"));

        let gm = GroupMeansConfig {
            column: "sri".to_string(),
            by: vec!["gender".to_string(), "nope".to_string()],
        };
        write_group_means(&dir, &d, &gm).unwrap();
        let s = fs::read_to_string(dir.join("means_sri_by_gender.csv")).unwrap();
        let lines: Vec<&str> = s.lines().collect();
        assert_eq!(lines, vec!["gender,sri,N", "F,1.5,2", "M,4,1"]);
        assert!(!dir.join("means_sri_by_nope.csv").exists());
        fs::remove_dir_all(&dir).unwrap();
    }
}
