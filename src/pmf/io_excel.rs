// Reading survey exports saved as Excel workbooks.

use calamine::{open_workbook, DataType, Range, Reader, Xlsx};
use chrono::{Duration, NaiveDate, Timelike};

use survey_indicators::{Dataset, Value};

use crate::pmf::io_common::build_dataset;
use crate::pmf::*;

/// Reads a worksheet (by default the first one). The first row holds the column names.
pub fn read_excel(
    path: &str,
    worksheet_name: Option<&str>,
    id_column: Option<&str>,
) -> PmfResult<Dataset> {
    let wrange = get_range(path, worksheet_name)?;

    let mut iter = wrange.rows();
    let header = iter.next().context(EmptyExcelSnafu { path })?;
    let headers: Vec<String> = header.iter().map(|c| cell_to_value(c).to_string()).collect();
    debug!("read_excel: header: {:?}", headers);

    let rows: Vec<Vec<Value>> = iter
        .map(|row| row.iter().map(cell_to_value).collect())
        .collect();
    info!("read_excel: {}: {} responses", path, rows.len());
    build_dataset(path, headers, rows, id_column)
}

fn get_range(path: &str, worksheet_name: Option<&str>) -> PmfResult<Range<DataType>> {
    debug!(
        "read_excel: path: {:?} worksheet: {:?}",
        path, worksheet_name
    );
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;

    // A worksheet name was provided, use it.
    if let Some(name) = worksheet_name {
        workbook
            .worksheet_range(name)
            .context(MissingWorksheetSnafu { name, path })?
            .context(OpeningExcelSnafu { path })
    } else {
        workbook
            .worksheet_range_at(0)
            .context(EmptyExcelSnafu { path })?
            .context(OpeningExcelSnafu { path })
    }
}

fn cell_to_value(cell: &DataType) -> Value {
    match cell {
        DataType::Int(i) => Value::number(*i as f64),
        DataType::Float(f) => Value::number(*f),
        DataType::String(s) if s.is_empty() => Value::Missing,
        DataType::String(s) => Value::text(s.as_str()),
        DataType::Bool(b) => Value::text(b.to_string()),
        DataType::DateTime(serial) => match excel_date(*serial) {
            Some(s) => Value::text(s),
            None => Value::number(*serial),
        },
        DataType::Error(e) => {
            warn!("read_excel: error cell {:?} read as missing", e);
            Value::Missing
        }
        DataType::Empty => Value::Missing,
        #[allow(unreachable_patterns)]
        other => Value::text(other.to_string()),
    }
}

/// Converts an Excel serial date (days since 1899-12-30) to `YYYY-MM-DD`,
/// followed by the time of day when there is one.
pub fn excel_date(serial: f64) -> Option<String> {
    if !serial.is_finite() {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    let dt = epoch.checked_add_signed(Duration::milliseconds(millis))?;
    if dt.num_seconds_from_midnight() == 0 {
        Some(dt.format("%Y-%m-%d").to_string())
    } else {
        Some(dt.format("%Y-%m-%d %H:%M:%S").to_string())
    }
}
