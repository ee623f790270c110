// Washington Group Short Set (WG-SS) disability classification.

use log::info;

use crate::config::{IndicatorError, Value};
use crate::dataset::{Dataset, RowView};

pub const WG_DISABILITY: &str = "WG-Disability";
pub const DISABILITY: &str = "Disability";

pub const SOME_DIFFICULTY: &str = "Some difficulty";
pub const A_LOT_OF_DIFFICULTY: &str = "A lot of difficulty";
pub const CANNOT_DO_AT_ALL: &str = "Cannot do at all";

/// The severity tiers, from none to the most severe.
#[derive(Eq, PartialEq, Debug, Clone, Copy, PartialOrd, Ord, Hash)]
pub enum DisabilityTier {
    NoDisability,
    Tier1,
    Tier2,
    Tier3,
    Tier4,
}

impl DisabilityTier {
    pub fn label(&self) -> &'static str {
        match self {
            DisabilityTier::NoDisability => "No_disability",
            DisabilityTier::Tier1 => "DISABILITY1",
            DisabilityTier::Tier2 => "DISABILITY2",
            DisabilityTier::Tier3 => "DISABILITY3",
            DisabilityTier::Tier4 => "DISABILITY4",
        }
    }

    /// Tiers 3 and 4 count as a disability.
    pub fn is_disability(&self) -> bool {
        matches!(self, DisabilityTier::Tier3 | DisabilityTier::Tier4)
    }

    pub fn binary_label(&self) -> &'static str {
        if self.is_disability() {
            "Disability"
        } else {
            "No Disability"
        }
    }
}

/// Classifies one respondent. The checks run in order and the first one wins.
pub fn classify<'a, I>(answers: I) -> DisabilityTier
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut some = 0;
    let mut a_lot = false;
    let mut cannot = false;
    for v in answers {
        if v.is_text(CANNOT_DO_AT_ALL) {
            cannot = true;
        } else if v.is_text(A_LOT_OF_DIFFICULTY) {
            a_lot = true;
        } else if v.is_text(SOME_DIFFICULTY) {
            some += 1;
        }
    }
    if cannot {
        DisabilityTier::Tier4
    } else if a_lot {
        DisabilityTier::Tier3
    } else if some >= 2 {
        DisabilityTier::Tier2
    } else if some >= 1 {
        DisabilityTier::Tier1
    } else {
        DisabilityTier::NoDisability
    }
}

pub fn classify_row<S: AsRef<str>>(row: &RowView<'_>, columns: &[S]) -> DisabilityTier {
    classify(columns.iter().map(|c| row.get(c.as_ref())))
}

/// Writes the `WG-Disability` tier column and the binary `Disability` column.
pub fn derive_disability<S: AsRef<str>>(data: &mut Dataset, columns: &[S]) -> Result<(), IndicatorError> {
    for c in columns.iter() {
        data.require_column(c.as_ref(), WG_DISABILITY)?;
    }
    let tiers: Vec<DisabilityTier> = data.rows().map(|r| classify_row(&r, columns)).collect();
    let with_disability = tiers.iter().filter(|t| t.is_disability()).count();
    data.set_column(
        WG_DISABILITY,
        tiers.iter().map(|t| Value::text(t.label())).collect(),
    )?;
    data.set_column(
        DISABILITY,
        tiers.iter().map(|t| Value::text(t.binary_label())).collect(),
    )?;
    info!(
        "New disability variable ({}) created: {} of {} respondents with a disability",
        DISABILITY,
        with_disability,
        data.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(answers: &[&str]) -> DisabilityTier {
        let values: Vec<Value> = answers.iter().map(|s| Value::from(*s)).collect();
        classify(values.iter())
    }

    #[test]
    fn priority_order() {
        assert_eq!(
            tier(&[SOME_DIFFICULTY, SOME_DIFFICULTY, CANNOT_DO_AT_ALL]),
            DisabilityTier::Tier4
        );
        assert_eq!(
            tier(&[SOME_DIFFICULTY, SOME_DIFFICULTY, A_LOT_OF_DIFFICULTY]),
            DisabilityTier::Tier3
        );
        assert_eq!(tier(&[SOME_DIFFICULTY, SOME_DIFFICULTY]), DisabilityTier::Tier2);
        assert_eq!(tier(&[SOME_DIFFICULTY, "No difficulty"]), DisabilityTier::Tier1);
        assert_eq!(tier(&["No difficulty"]), DisabilityTier::NoDisability);
        assert_eq!(tier(&[]), DisabilityTier::NoDisability);
    }

    #[test]
    fn more_difficulty_never_lowers_the_tier() {
        let mut answers = vec!["No difficulty"; 6];
        let mut previous = tier(&answers);
        for i in 0..6 {
            answers[i] = SOME_DIFFICULTY;
            let t = tier(&answers);
            assert!(t >= previous);
            previous = t;
        }
        assert_eq!(previous, DisabilityTier::Tier2);
    }

    #[test]
    fn binary_collapse() {
        assert_eq!(DisabilityTier::Tier4.binary_label(), "Disability");
        assert_eq!(DisabilityTier::Tier3.binary_label(), "Disability");
        assert_eq!(DisabilityTier::Tier2.binary_label(), "No Disability");
        assert_eq!(DisabilityTier::NoDisability.label(), "No_disability");
    }

    #[test]
    fn derive_columns() {
        let mut d = Dataset::with_len(2);
        d.set_column("20", vec![CANNOT_DO_AT_ALL.into(), SOME_DIFFICULTY.into()])
            .unwrap();
        d.set_column("21", vec![Value::Missing, "No difficulty".into()])
            .unwrap();
        derive_disability(&mut d, &["20", "21"]).unwrap();
        assert_eq!(d.value(0, WG_DISABILITY), &Value::from("DISABILITY4"));
        assert_eq!(d.value(1, WG_DISABILITY), &Value::from("DISABILITY1"));
        assert_eq!(d.value(1, DISABILITY), &Value::from("No Disability"));
        assert!(derive_disability(&mut d, &["99"]).is_err());
    }
}
