// Livelihood indicators: poverty, decent work, agriculture (213),
// income (214) and the age groups used as a breakdown.

use log::info;

use crate::aggregation::round_half_even;
use crate::config::{IndicatorError, Value, YES};
use crate::dataset::{Dataset, RowView};
use crate::scales::{mean_present, write_numbers, write_texts};

pub const COUNTRY: &str = "4";
pub const HOUSEHOLD_SIZE: &str = "8";
pub const INCOME: &str = "10";

pub const NATIONAL_POVERTY: &str = "National poverty";
pub const DECENT_WORK: &str = "decent_work";
pub const OUTPUT_213: &str = "output_213";
pub const OUTPUT_214: &str = "output_214";
pub const AGE_GROUP: &str = "Age Group";

pub const SUDAN: &str = "Sudan";
pub const SOUTH_SUDAN: &str = "South Sudan";

/// International poverty line, in USD per person and day.
const POVERTY_LINE_USD: f64 = 2.15;
const DAYS_PER_MONTH: f64 = 30.0;

/// Local currency per USD used for the poverty threshold.
pub fn exchange_rate(country: &str) -> Option<f64> {
    match country {
        SUDAN => Some(601.5),
        SOUTH_SUDAN => Some(130.26),
        _ => None,
    }
}

/// The monthly income under which a household of the given size is poor.
pub fn poverty_threshold(country: &str, household_size: f64) -> Option<f64> {
    exchange_rate(country)
        .map(|rate| round_half_even(POVERTY_LINE_USD * DAYS_PER_MONTH * rate * household_size, 0))
}

/// "Poverty" / "Not poverty", missing for the other countries.
///
/// A missing income or household size never counts as poverty.
pub fn poverty_status(row: &RowView<'_>) -> Value {
    let country = match row.get(COUNTRY).as_str() {
        Some(c) => c,
        None => return Value::Missing,
    };
    if exchange_rate(country).is_none() {
        return Value::Missing;
    }
    let poor = match (row.number(HOUSEHOLD_SIZE), row.number(INCOME)) {
        (Some(size), Some(income)) => poverty_threshold(country, size)
            .map(|t| income < t)
            .unwrap_or(false),
        _ => false,
    };
    Value::text(if poor { "Poverty" } else { "Not poverty" })
}

pub fn derive_poverty(data: &mut Dataset) -> Result<(), IndicatorError> {
    data.require_columns(&[COUNTRY, HOUSEHOLD_SIZE, INCOME], NATIONAL_POVERTY)?;
    let values: Vec<Value> = data.rows().map(|r| poverty_status(&r)).collect();
    let poor = values.iter().filter(|v| v.is_text("Poverty")).count();
    data.set_column(NATIONAL_POVERTY, values)?;
    info!("{}: {} of {} households below the threshold", NATIONAL_POVERTY, poor, data.len());
    Ok(())
}

/// "Yes" when either question on work conditions was answered "Yes".
pub fn derive_decent_work(data: &mut Dataset) -> Result<(), IndicatorError> {
    data.require_columns(&["90", "98"], DECENT_WORK)?;
    let values: Vec<&str> = data
        .rows()
        .map(|r| {
            if r.get("90").is_text(YES) || r.get("98").is_text(YES) {
                "Yes"
            } else {
                "No"
            }
        })
        .collect();
    write_texts(data, DECENT_WORK, values)
}

pub const CROPS: usize = 14;
const DIVERSIFIED_ANSWER: &str = "Yes, and I still produce the existing crops";

/// Production change of one crop: 1 increased, 2 not increased, missing
/// when the household does not produce it.
pub fn crop_change(row: &RowView<'_>, crop: usize) -> Option<f64> {
    if !row.get(&format!("105-{}", crop)).is_number(1.0) {
        return None;
    }
    let answer = row.get(&format!("105-I-{}", crop));
    if answer.is_text(YES) {
        Some(1.0)
    } else {
        Some(2.0)
    }
}

/// Writes `agri-1` to `agri-14`, the summary columns and `output_213`.
pub fn derive_output_213(data: &mut Dataset) -> Result<(), IndicatorError> {
    let mut required: Vec<String> = Vec::new();
    for i in 1..=CROPS {
        required.push(format!("105-{}", i));
        required.push(format!("105-I-{}", i));
    }
    required.push("106".to_string());
    required.push("107".to_string());
    for c in required.iter() {
        data.require_column(c, OUTPUT_213)?;
    }

    let changes: Vec<Vec<Option<f64>>> = data
        .rows()
        .map(|r| (1..=CROPS).map(|i| crop_change(&r, i)).collect())
        .collect();
    let diversified: Vec<bool> = data
        .rows()
        .map(|r| {
            r.get("106").is_text(DIVERSIFIED_ANSWER)
                && r.number("107").map(|n| n >= 1.0).unwrap_or(false)
        })
        .collect();

    for i in 0..CROPS {
        write_numbers(
            data,
            &format!("agri-{}", i + 1),
            changes.iter().map(|c| c[i]).collect(),
        )?;
    }
    let averages: Vec<Option<f64>> = changes.iter().map(|c| mean_present(c)).collect();
    let increased: Vec<bool> = averages
        .iter()
        .map(|a| a.map(|x| x < 2.0).unwrap_or(false))
        .collect();
    write_numbers(data, "agri_avg", averages)?;
    write_texts(
        data,
        "agri_increased",
        increased
            .iter()
            .map(|b| if *b { "Increased" } else { "Not increased" })
            .collect(),
    )?;
    write_texts(
        data,
        "agri_diversified",
        diversified
            .iter()
            .map(|b| if *b { "Diversified" } else { "Not diversified" })
            .collect(),
    )?;
    write_texts(
        data,
        OUTPUT_213,
        increased
            .iter()
            .zip(diversified.iter())
            .map(|(i, d)| {
                if *i || *d {
                    "Increased/Diversified"
                } else {
                    "No changes"
                }
            })
            .collect(),
    )?;
    Ok(())
}

/// Income level above which household income counts as increased.
pub fn income_threshold(country: &str) -> Option<f64> {
    match country {
        SOUTH_SUDAN => Some(45875.0),
        SUDAN => Some(40000.0),
        _ => None,
    }
}

pub fn derive_output_214(data: &mut Dataset) -> Result<(), IndicatorError> {
    data.require_columns(&[COUNTRY, "111", "112"], OUTPUT_214)?;
    let values: Vec<&str> = data
        .rows()
        .map(|r| {
            let mean = mean_present(&[r.number("111"), r.number("112")]);
            let threshold = r.get(COUNTRY).as_str().and_then(income_threshold);
            match (mean, threshold) {
                (Some(m), Some(t)) if m > t => "Increased",
                _ => "Not increased",
            }
        })
        .collect();
    write_texts(data, OUTPUT_214, values)
}

const AGE_BINS: [(f64, &str); 6] = [
    (24.0, "18 - 24"),
    (34.0, "25 - 34"),
    (44.0, "35 - 44"),
    (54.0, "45 - 54"),
    (64.0, "55 - 64"),
    (f64::INFINITY, "Above 65 years"),
];

/// The age group of an age, `None` at 17 and under.
pub fn age_group(age: f64) -> Option<&'static str> {
    if age <= 17.0 {
        return None;
    }
    AGE_BINS
        .iter()
        .find(|(upper, _)| age <= *upper)
        .map(|(_, label)| *label)
}

/// Writes the `Age Group` column. Ages are truncated to whole years first.
pub fn derive_age_group(data: &mut Dataset, age_column: &str) -> Result<(), IndicatorError> {
    data.require_column(age_column, AGE_GROUP)?;
    let values: Vec<Value> = data
        .rows()
        .map(|r| {
            r.number(age_column)
                .and_then(|a| age_group(a.trunc()))
                .map(Value::text)
                .unwrap_or(Value::Missing)
        })
        .collect();
    data.set_column(AGE_GROUP, values)
}
