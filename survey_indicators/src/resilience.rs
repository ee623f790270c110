// Household self-reliance / resilience index (`sri`).
//
// Each sub-dimension is scored from one question (or a group of
// multiple-choice columns), missing sub-scores count as 0, and the index
// is a fixed linear combination clamped to [1, 5].

use log::info;

use crate::config::IndicatorError;
use crate::dataset::{Dataset, RowView};
use crate::scales::{count_equal, first_match, mean_present, sum_numbers, write_numbers, Scale};

pub const SRI: &str = "sri";

pub const SRI_1A: Scale = Scale {
    column: "26",
    levels: &[
        ("No shelter", 1.0),
        (
            "Makeshift shelter (shack, kiosk, vehicle)/Shelter not fit for safe habitation",
            2.0,
        ),
        (
            "Temporarily hosted by friends, family, community/faith group, or emergency shelter",
            3.0,
        ),
        ("Traditional hut, inadequate", 4.0),
        ("Traditional hut, adequate", 5.0),
    ],
};

pub const SRI_1B: Scale = Scale {
    column: "28",
    levels: &[
        ("2-3 times", 1.0),
        ("1 time", 3.0),
        ("None", 5.0),
        ("Not applicable", 0.0),
    ],
};

pub const SRI_2: Scale = Scale {
    column: "29",
    levels: &[
        ("Household did not eat yesterday", 1.0),
        ("Household was able to eat, but not even a full meal", 2.0),
        ("Household was able to eat 1 full meal", 3.0),
        ("Household was able to eat 2-3 full meals", 5.0),
    ],
};

pub const SRI_3: Scale = Scale {
    column: "30",
    levels: &[
        ("No school-aged children in household", 0.0),
        ("None are in school", 1.0),
        ("Some are in school", 3.0),
        ("All are in school", 5.0),
    ],
};

pub const SRI_4: Scale = Scale {
    column: "31",
    levels: &[
        ("Have not needed health care in last 3 months", 0.0),
        ("Did not receive the needed health care", 1.0),
        ("Received some of the needed health care", 3.0),
        ("Received all of the needed health care", 5.0),
    ],
};

pub const SRI_5: Scale = Scale {
    column: "32",
    levels: &[
        (
            "Adult(s) in household has health condition that interferes with adult employment",
            1.0,
        ),
        (
            "Dependent(s) in household has health condition that interferes with adult employment",
            3.0,
        ),
        ("None of the above", 5.0),
    ],
};

pub const SRI_7: Scale = Scale {
    column: "35",
    levels: &[
        ("No employment", 1.0),
        ("Temporary, irregular, seasonal", 2.0),
        ("Regular part-time (including self-employment)", 3.0),
        (
            "Full-time (including self-employment), without necessary legal documentation",
            4.0,
        ),
        (
            "Full-time (including self-employment), with legal documentation",
            5.0,
        ),
    ],
};

pub const SRI_11: Scale = Scale {
    column: "39",
    levels: &[
        ("No, no savings or saleable assets", 1.0),
        (
            "Yes, but not enough to cover one month’s expenses (basic needs)",
            3.0,
        ),
        ("Yes, enough to cover one month’s expenses (basic needs)", 4.0),
        (
            "Yes, enough to cover one month’s expenses (basic needs) plus enough to purchase an asset, or reinvest into one’s business, or to sustain a moderate health crisis",
            5.0,
        ),
    ],
};

pub const SRI_12A: Scale = Scale {
    column: "40",
    levels: &[
        ("Knows no one who could lend money", 1.0),
        ("Knows someone/ has community support that could lend money", 5.0),
    ],
};

// The third label carries a stray parenthesis in the survey export.
pub const SRI_12B: Scale = Scale {
    column: "41",
    levels: &[
        ("Neither", 1.0),
        ("Household members ask others for advice/information ONLY", 3.0),
        ("People ask household members for advice/information ONLY)", 3.0),
        ("Both of them", 5.0),
    ],
};

const INCOME_SOURCES: [&str; 7] = ["36-1", "36-2", "36-3", "36-4", "36-5", "36-6", "36-7"];
const COPING: [&str; 5] = ["37-2", "37-3", "37-4", "37-5", "37-6"];
const SUPPORT: [&str; 6] = ["38-2", "38-3", "38-4", "38-5", "38-6", "38-7"];

/// All the sub-scores of one household. `None` is a missing sub-score.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SriScores {
    pub sri_1a: Option<f64>,
    pub sri_1b: Option<f64>,
    pub sri_2: Option<f64>,
    pub sri_3: Option<f64>,
    pub sri_4: Option<f64>,
    pub sri_5: Option<f64>,
    pub sri_6: Option<f64>,
    pub sri_7: Option<f64>,
    pub sri_8: Option<f64>,
    pub sri_9: Option<f64>,
    pub sri_10: Option<f64>,
    pub sri_11: Option<f64>,
    pub sri_12a: Option<f64>,
    pub sri_12b: Option<f64>,
    pub sri_12: Option<f64>,
}

fn sri_6(row: &RowView<'_>) -> f64 {
    if row.get("33-9").is_number(1.0) {
        5.0
    } else if row.get("34").is_text("Yes") {
        1.0
    } else {
        3.0
    }
}

/// Income source mix, from the 0/1 columns 36-1 to 36-7.
pub fn sri_8(row: &RowView<'_>) -> Option<f64> {
    let is = |c: &str, x: f64| row.get(c).is_number(x);
    let others = |skip: &str| {
        let cols: Vec<&str> = INCOME_SOURCES.iter().copied().filter(|c| *c != skip).collect();
        sum_numbers(row, &cols)
    };
    first_match(&[
        (is("36-7", 1.0) && others("36-7") == 0.0, 3.0),
        (is("36-6", 1.0) && others("36-6") == 0.0, 5.0),
        (is("36-6", 1.0) && others("36-6") > 0.0, 3.0),
        (is("36-7", 0.0) && is("36-6", 0.0), 1.0),
    ])
}

/// Negative coping strategies. A yes on 36-1 overrides the count.
pub fn sri_9(row: &RowView<'_>) -> Option<f64> {
    if row.get("36-1").is_number(1.0) {
        return Some(5.0);
    }
    match count_equal(row, &COPING, 1.0) {
        3 | 4 | 5 => Some(1.0),
        2 => Some(2.0),
        1 => Some(3.0),
        _ => None,
    }
}

/// Support network. A yes on 38-1 overrides the count.
pub fn sri_10(row: &RowView<'_>) -> Option<f64> {
    if row.get("38-1").is_number(1.0) {
        return Some(5.0);
    }
    match count_equal(row, &SUPPORT, 1.0) {
        4 | 5 => Some(1.0),
        2 | 3 => Some(2.0),
        1 => Some(3.0),
        _ => None,
    }
}

pub fn sri_scores(row: &RowView<'_>) -> SriScores {
    let sri_12a = SRI_12A.score(row);
    let sri_12b = SRI_12B.score(row);
    SriScores {
        sri_1a: SRI_1A.score(row),
        sri_1b: SRI_1B.score(row),
        sri_2: SRI_2.score(row),
        sri_3: SRI_3.score(row),
        sri_4: SRI_4.score(row),
        sri_5: SRI_5.score(row),
        sri_6: Some(sri_6(row)),
        sri_7: SRI_7.score(row),
        sri_8: sri_8(row),
        sri_9: sri_9(row),
        sri_10: sri_10(row),
        sri_11: SRI_11.score(row),
        sri_12a,
        sri_12b,
        sri_12: mean_present(&[sri_12a, sri_12b]),
    }
}

impl SriScores {
    /// Fills the missing sub-scores with 0 (12a and 12b stay as they are).
    pub fn filled(&self) -> SriScores {
        let f = |x: Option<f64>| Some(x.unwrap_or(0.0));
        SriScores {
            sri_1a: f(self.sri_1a),
            sri_1b: f(self.sri_1b),
            sri_2: f(self.sri_2),
            sri_3: f(self.sri_3),
            sri_4: f(self.sri_4),
            sri_5: f(self.sri_5),
            sri_6: f(self.sri_6),
            sri_7: f(self.sri_7),
            sri_8: f(self.sri_8),
            sri_9: f(self.sri_9),
            sri_10: f(self.sri_10),
            sri_11: f(self.sri_11),
            sri_12a: self.sri_12a,
            sri_12b: self.sri_12b,
            sri_12: f(self.sri_12),
        }
    }

    /// The index. When 1b is 0 (not applicable), it is left out of the average.
    pub fn index(&self) -> f64 {
        let s = self.filled();
        let v = |x: Option<f64>| x.unwrap_or(0.0);
        let base = v(s.sri_1a)
            + v(s.sri_3)
            + v(s.sri_4)
            + v(s.sri_6)
            + v(s.sri_7)
            + v(s.sri_8)
            + v(s.sri_10)
            + v(s.sri_11)
            + v(s.sri_12);
        let average = if v(s.sri_1b) == 0.0 {
            base / 9.0
        } else {
            (base + v(s.sri_1b)) / 10.0
        };
        let raw = average
            - (5.0 - v(s.sri_2)) * 0.15
            - (3.0 - v(s.sri_5)) * 0.05
            - (5.0 - v(s.sri_9)) * 0.2;
        raw.clamp(1.0, 5.0)
    }
}

/// Writes the sub-scores (`sri_1a` ... `sri_12`) and the index (`sri`).
pub fn derive_sri(data: &mut Dataset) -> Result<(), IndicatorError> {
    let mut required: Vec<&str> = vec![
        SRI_1A.column,
        SRI_1B.column,
        SRI_2.column,
        SRI_3.column,
        SRI_4.column,
        SRI_5.column,
        "33-9",
        "34",
        SRI_7.column,
        "38-1",
        SRI_11.column,
        SRI_12A.column,
        SRI_12B.column,
    ];
    required.extend(INCOME_SOURCES.iter());
    required.extend(COPING.iter());
    required.extend(SUPPORT.iter());
    data.require_columns(&required, SRI)?;

    let scores: Vec<SriScores> = data.rows().map(|r| sri_scores(&r)).collect();
    let filled: Vec<SriScores> = scores.iter().map(|s| s.filled()).collect();
    let columns: [(&str, fn(&SriScores) -> Option<f64>); 15] = [
        ("sri_1a", |s| s.sri_1a),
        ("sri_1b", |s| s.sri_1b),
        ("sri_2", |s| s.sri_2),
        ("sri_3", |s| s.sri_3),
        ("sri_4", |s| s.sri_4),
        ("sri_5", |s| s.sri_5),
        ("sri_6", |s| s.sri_6),
        ("sri_7", |s| s.sri_7),
        ("sri_8", |s| s.sri_8),
        ("sri_9", |s| s.sri_9),
        ("sri_10", |s| s.sri_10),
        ("sri_11", |s| s.sri_11),
        ("sri_12a", |s| s.sri_12a),
        ("sri_12b", |s| s.sri_12b),
        ("sri_12", |s| s.sri_12),
    ];
    for (name, get) in columns.iter() {
        write_numbers(data, name, filled.iter().map(get).collect())?;
    }
    write_numbers(data, SRI, scores.iter().map(|s| Some(s.index())).collect())?;
    info!("Resilience index ({}) computed for {} households", SRI, data.len());
    Ok(())
}
