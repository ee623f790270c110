// Water (output 121) and sanitation (output 122) access scores.

use log::{info, warn};

use crate::aggregation::round_half_even;
use crate::config::{IndicatorError, Value, YES};
use crate::dataset::{Dataset, RowView};
use crate::scales::{mean_present, sum_numbers, write_numbers, write_texts};

pub const OUTPUT_121: &str = "output_121";
pub const OUTPUT_121_SCORE: &str = "output_121_score";
pub const OUTPUT_122: &str = "output_122";
pub const OUTPUT_122_SCORE: &str = "output_122_score";
pub const OUTPUT_215: &str = "output_215";

pub const IMPROVED: &str = "Improved";
pub const NOT_IMPROVED: &str = "Not improved";
pub const NO_ACCESS: &str = "No access";

pub const IMPROVED_SOURCES: [&str; 5] = [
    "Handpump or borehole",
    "Protected shallow well",
    "Protected dug well",
    "Tube well",
    "Tap stand",
];

const REPAIR_STATUS: [(&str, f64); 3] = [
    ("Minor repair", 0.67),
    ("Major repair", 0.33),
    ("It is beyond repair", 0.0),
];

const WATER_QUALITY: [(&str, f64); 5] = [
    ("Very Poor", 0.0),
    ("Poor", 0.25),
    ("Average", 0.5),
    ("Good", 0.75),
    ("Excellent", 1.0),
];

fn lookup(table: &[(&str, f64)], v: &Value) -> Option<f64> {
    table
        .iter()
        .find(|(label, _)| v.is_text(label))
        .map(|(_, x)| *x)
}

/// The questions of one season of the water module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaterSeason {
    /// Prefix of the derived columns.
    pub name: &'static str,
    pub source: &'static str,
    pub always_available: &'static str,
    pub days_available: &'static str,
    pub functional: &'static str,
    pub repair_state: &'static str,
    pub fenced: &'static str,
    pub animals: &'static str,
    pub trip_minutes: &'static str,
    pub wait_minutes: &'static str,
    pub quality: &'static str,
}

impl WaterSeason {
    pub const DRY: WaterSeason = WaterSeason {
        name: "dry",
        source: "43",
        always_available: "44",
        days_available: "45",
        functional: "47",
        repair_state: "48",
        fenced: "49",
        animals: "50",
        trip_minutes: "51",
        wait_minutes: "52",
        quality: "53",
    };

    pub const RAINY: WaterSeason = WaterSeason {
        name: "rainy",
        source: "55",
        always_available: "56",
        days_available: "57",
        functional: "59",
        repair_state: "60",
        fenced: "61",
        animals: "62",
        trip_minutes: "63",
        wait_minutes: "64",
        quality: "65",
    };

    pub fn columns(&self) -> [&'static str; 10] {
        [
            self.source,
            self.always_available,
            self.days_available,
            self.functional,
            self.repair_state,
            self.fenced,
            self.animals,
            self.trip_minutes,
            self.wait_minutes,
            self.quality,
        ]
    }

    /// The water point status: 1 when functional, else the state of repair.
    pub fn status(&self, row: &RowView<'_>) -> Option<f64> {
        if row.get(self.functional).is_text(YES) {
            Some(1.0)
        } else {
            lookup(&REPAIR_STATUS, row.get(self.repair_state))
        }
    }

    pub fn components(&self, row: &RowView<'_>, status: Option<f64>) -> SeasonComponents {
        let source = if IMPROVED_SOURCES.iter().any(|s| row.get(self.source).is_text(s)) {
            1.0
        } else {
            0.0
        };
        let time = match (row.number(self.trip_minutes), row.number(self.wait_minutes)) {
            (Some(trip), Some(wait)) => Some(round_half_even((trip * 2.0 + wait) / 30.0, 2)),
            _ => None,
        };
        let availability = if row.get(self.always_available).is_text(YES) {
            Some(1.0)
        } else {
            row.number(self.days_available)
                .map(|d| round_half_even(d / 7.0, 2))
        };
        SeasonComponents {
            source,
            time,
            availability,
            status,
            animal: if row.get(self.animals).is_text(YES) { 0.0 } else { 1.0 },
            fencing: if row.get(self.fenced).is_text(YES) { 1.0 } else { 0.0 },
            quality: lookup(&WATER_QUALITY, row.get(self.quality)),
        }
    }
}

/// Where the rainy season status comes from.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub enum RainyStatus {
    /// The dry season status when known, the rainy state of repair otherwise.
    /// This is how the published reports were computed.
    #[default]
    DryFallback,
    /// The rainy season questions only.
    SameSeason,
}

/// The water access sub-scores of one season.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeasonComponents {
    pub source: f64,
    pub time: Option<f64>,
    pub availability: Option<f64>,
    pub status: Option<f64>,
    pub animal: f64,
    pub fencing: f64,
    pub quality: Option<f64>,
}

impl SeasonComponents {
    /// An improved source within a one-unit trip.
    pub fn has_access(&self) -> bool {
        self.source == 1.0 && self.time.map(|t| t <= 1.0).unwrap_or(false)
    }

    /// The mean of the sub-scores, only for households with access.
    pub fn score(&self) -> Option<f64> {
        if !self.has_access() {
            return None;
        }
        mean_present(&[
            self.time,
            self.availability,
            self.status,
            Some(self.animal),
            Some(self.fencing),
            self.quality,
        ])
    }
}

fn yes_no(b: bool) -> &'static str {
    if b {
        "Yes"
    } else {
        "No"
    }
}

fn write_season(data: &mut Dataset, name: &str, comps: &[SeasonComponents]) -> Result<(), IndicatorError> {
    let col = |suffix: &str| format!("{}_{}", name, suffix);
    write_numbers(data, &col("access_source"), comps.iter().map(|c| Some(c.source)).collect())?;
    write_numbers(data, &col("access_time"), comps.iter().map(|c| c.time).collect())?;
    write_numbers(data, &col("availability"), comps.iter().map(|c| c.availability).collect())?;
    write_numbers(data, &col("status"), comps.iter().map(|c| c.status).collect())?;
    write_numbers(data, &col("animal"), comps.iter().map(|c| Some(c.animal)).collect())?;
    write_numbers(data, &col("fencing"), comps.iter().map(|c| Some(c.fencing)).collect())?;
    write_numbers(data, &col("quality"), comps.iter().map(|c| c.quality).collect())?;
    write_texts(data, &col("access"), comps.iter().map(|c| yes_no(c.has_access())).collect())?;
    write_numbers(data, &col("score"), comps.iter().map(|c| c.score()).collect())?;
    Ok(())
}

/// The combined score: the rounded mean of both seasons, "No access" when
/// either season has no score.
pub fn water_score(dry: Option<f64>, rainy: Option<f64>) -> Value {
    match (dry, rainy) {
        (Some(d), Some(r)) => Value::number(round_half_even((d + r) / 2.0, 0)),
        _ => Value::text(NO_ACCESS),
    }
}

/// Writes the per-season water columns, `output_121` and `output_121_score`.
pub fn derive_output_121(data: &mut Dataset, rainy_status: RainyStatus) -> Result<(), IndicatorError> {
    let mut required: Vec<&str> = WaterSeason::DRY.columns().to_vec();
    required.extend(WaterSeason::RAINY.columns());
    data.require_columns(&required, OUTPUT_121)?;

    let mut dry: Vec<SeasonComponents> = Vec::with_capacity(data.len());
    let mut rainy: Vec<SeasonComponents> = Vec::with_capacity(data.len());
    for row in data.rows() {
        let dry_status = WaterSeason::DRY.status(&row);
        let rainy_status = match rainy_status {
            RainyStatus::DryFallback => dry_status.or_else(|| {
                lookup(&REPAIR_STATUS, row.get(WaterSeason::RAINY.repair_state))
            }),
            RainyStatus::SameSeason => WaterSeason::RAINY.status(&row),
        };
        dry.push(WaterSeason::DRY.components(&row, dry_status));
        rainy.push(WaterSeason::RAINY.components(&row, rainy_status));
    }
    write_season(data, WaterSeason::DRY.name, &dry)?;
    write_season(data, WaterSeason::RAINY.name, &rainy)?;

    let improved: Vec<&str> = dry
        .iter()
        .zip(rainy.iter())
        .map(|(d, r)| {
            if d.has_access() && r.has_access() {
                IMPROVED
            } else {
                NOT_IMPROVED
            }
        })
        .collect();
    let n_improved = improved.iter().filter(|s| **s == IMPROVED).count();
    write_texts(data, OUTPUT_121, improved)?;
    data.set_column(
        OUTPUT_121_SCORE,
        dry.iter()
            .zip(rainy.iter())
            .map(|(d, r)| water_score(d.score(), r.score()))
            .collect(),
    )?;
    info!(
        "Water access ({}): {} of {} households improved",
        OUTPUT_121,
        n_improved,
        data.len()
    );
    Ok(())
}

const LATRINES: [(&str, f64); 3] = [
    ("Home latrine", 1.0),
    ("Shared latrine", 0.67),
    ("Communal latrine", 0.33),
];

const LATRINE_SAFETY: [(&str, f64); 4] = [
    ("Agree", 1.0),
    ("Neither agree nor disagree", 0.5),
    ("Disagree", 0.0),
    ("I do not use latrines", 0.0),
];

const CLEANING: [(&str, f64); 2] = [("Daily", 1.0), ("Weekly", 0.67)];

const SANITATION_COLUMNS: [&str; 13] = [
    "73", "74-1", "74-2", "74-3", "74-4", "75", "76", "77", "78", "79", "80", "81", "82",
];

/// The sanitation sub-scores of one household.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SanitationComponents {
    pub latrine_usage: f64,
    pub handwashing: f64,
    pub ownership: f64,
    pub accessibility: f64,
    pub features: f64,
    pub safety: Option<f64>,
    pub clean: f64,
}

impl SanitationComponents {
    pub fn from_row(row: &RowView<'_>) -> SanitationComponents {
        let ownership_of = lookup(&LATRINES, row.get("73"));
        let uses = ownership_of.is_some();
        let handwashing = if row.get("78").is_text(YES) { 1.0 } else { 0.0 };
        if !uses {
            return SanitationComponents {
                latrine_usage: 0.0,
                handwashing,
                ownership: 0.0,
                accessibility: 0.0,
                features: 0.0,
                safety: Some(0.0),
                clean: 0.0,
            };
        }
        let yes_count = ["79", "80", "81"]
            .iter()
            .filter(|c| row.get(c).is_text(YES))
            .count() as f64;
        let clean = if row.get("76").is_text("No") || row.get("76").is_text("I do not use latrines") {
            0.0
        } else {
            lookup(&CLEANING, row.get("77")).unwrap_or(0.33)
        };
        SanitationComponents {
            latrine_usage: 1.0,
            handwashing,
            ownership: ownership_of.unwrap_or(0.0),
            accessibility: if row.get("75").is_text(YES) { 1.0 } else { 0.0 },
            features: round_half_even(sum_numbers(row, &["74-1", "74-2", "74-3", "74-4"]) / 4.0, 2),
            safety: lookup(&LATRINE_SAFETY, row.get("82")).map(|x| (yes_count + x) / 4.0),
            clean,
        }
    }

    pub fn improved(&self) -> bool {
        self.latrine_usage + self.handwashing == 2.0
    }

    /// Mean of the five sub-scores, skipping a missing safety score.
    pub fn score(&self) -> Option<f64> {
        mean_present(&[
            Some(self.ownership),
            Some(self.accessibility),
            Some(self.features),
            self.safety,
            Some(self.clean),
        ])
    }
}

/// Writes the sanitation columns, `output_122` and `output_122_score`.
pub fn derive_output_122(data: &mut Dataset) -> Result<(), IndicatorError> {
    data.require_columns(&SANITATION_COLUMNS, OUTPUT_122)?;
    let comps: Vec<SanitationComponents> = data.rows().map(|r| SanitationComponents::from_row(&r)).collect();
    let numbers: [(&str, fn(&SanitationComponents) -> Option<f64>); 7] = [
        ("latrine_usage", |c| Some(c.latrine_usage)),
        ("handwashing", |c| Some(c.handwashing)),
        ("ownership", |c| Some(c.ownership)),
        ("sanitation_accessibility", |c| Some(c.accessibility)),
        ("sanitation_features", |c| Some(c.features)),
        ("sanitation_safety", |c| c.safety),
        ("sanitation_clean", |c| Some(c.clean)),
    ];
    for (name, get) in numbers.iter() {
        write_numbers(data, name, comps.iter().map(get).collect())?;
    }
    write_texts(
        data,
        OUTPUT_122,
        comps
            .iter()
            .map(|c| if c.improved() { IMPROVED } else { NOT_IMPROVED })
            .collect(),
    )?;
    write_numbers(data, OUTPUT_122_SCORE, comps.iter().map(|c| c.score()).collect())?;
    info!(
        "Sanitation access ({}): {} of {} households improved",
        OUTPUT_122,
        comps.iter().filter(|c| c.improved()).count(),
        data.len()
    );
    Ok(())
}

/// Basic needs: "Increased" when water or sanitation access improved.
pub fn derive_output_215(data: &mut Dataset) -> Result<(), IndicatorError> {
    data.require_columns(&[OUTPUT_121, OUTPUT_122], OUTPUT_215)?;
    let values: Vec<&str> = data
        .rows()
        .map(|r| {
            if r.get(OUTPUT_121).is_text(IMPROVED) || r.get(OUTPUT_122).is_text(IMPROVED) {
                "Increased"
            } else {
                "Not increased"
            }
        })
        .collect();
    if values.is_empty() {
        warn!("{}: empty table", OUTPUT_215);
    }
    write_texts(data, OUTPUT_215, values)
}
