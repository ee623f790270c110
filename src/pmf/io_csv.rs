// Primitives for reading CSV files.

use survey_indicators::{Dataset, Value};

use crate::pmf::io_common::{build_dataset, parse_cell};
use crate::pmf::*;

/// Reads a survey export. The first line holds the column names.
pub fn read_csv(path: &str, id_column: Option<&str>) -> PmfResult<Dataset> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;

    let headers: Vec<String> = rdr
        .headers()
        .context(CsvLineParseSnafu { path, lineno: 1_usize })?
        .iter()
        .map(|s| s.to_string())
        .collect();
    debug!("read_csv: {}: headers: {:?}", path, headers);

    let mut rows: Vec<Vec<Value>> = Vec::new();
    for (idx, line_r) in rdr.records().enumerate() {
        // The header is on line 1.
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu { path, lineno })?;
        rows.push(line.iter().map(parse_cell).collect());
    }
    info!("read_csv: {}: {} responses", path, rows.len());
    build_dataset(path, headers, rows, id_column)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(content: &str) -> String {
        let p = std::env::temp_dir().join(format!("pmfeval-{}.csv", uuid::Uuid::new_v4()));
        std::fs::write(&p, content).unwrap();
        p.display().to_string()
    }

    #[test]
    fn read_survey() {
        let p = write_temp("id,4,8,note\nr1,Sudan,5,\nr2,South Sudan,7.5, fine\n,Sudan\n");
        let d = read_csv(&p, Some("id")).unwrap();
        assert_eq!(d.len(), 3);
        assert_eq!(d.column_names().len(), 4);
        assert_eq!(d.ids()[0], "r1");
        assert!(d.ids()[2].ends_with("-00000003"));
        assert_eq!(d.value(0, "8"), &Value::number(5.0));
        assert_eq!(d.value(1, "8"), &Value::number(7.5));
        assert_eq!(d.value(0, "note"), &Value::Missing);
        assert_eq!(d.value(1, "note"), &Value::text(" fine"));
        assert_eq!(d.value(2, "8"), &Value::Missing);
        std::fs::remove_file(&p).unwrap();
    }

    #[test]
    fn missing_file() {
        assert!(matches!(
            read_csv("/nonexistent/pmfeval.csv", None),
            Err(PmfError::CsvOpen { .. })
        ));
    }

    #[test]
    fn too_many_cells() {
        let p = write_temp("a,b\n1,2,3\n");
        assert!(read_csv(&p, None).is_err());
        std::fs::remove_file(&p).unwrap();
    }
}
