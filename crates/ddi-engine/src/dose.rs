//! Dose evaluation against baseline safety ranges
//!
//! Adults are checked per dose in mg. Children are checked as a daily
//! mg/kg figure, which needs the dose, the frequency and the weight. Every
//! gap (no baseline, no dose, unconvertible unit, incomplete range) ends up
//! as `status = unknown` with a comment saying why.

use crate::reference::{BaselineTable, DrugBaseline};
use crate::request::{DrugEntry, PatientContext};
use crate::units::convert_to_mg;
use serde::{Deserialize, Serialize};

/// Outcome of a dose range check
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoseStatus {
    /// Not assessable (no baseline, no dose, unconvertible unit, incomplete range)
    Unknown,
    Below,
    Within,
    Above,
}

impl DoseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DoseStatus::Unknown => "unknown",
            DoseStatus::Below => "below",
            DoseStatus::Within => "within",
            DoseStatus::Above => "above",
        }
    }
}

/// Result of checking one drug's dose; never modified after creation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DoseAssessment {
    pub drug: String,
    pub baseline_found: bool,
    pub status: DoseStatus,
    /// Percentage over the applicable maximum (0 unless `status == Above`)
    pub percent_above: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mg_per_kg_per_day: Option<f64>,
    pub comment: String,
}

impl DoseAssessment {
    fn unknown(drug: &str, baseline_found: bool, comment: impl Into<String>) -> Self {
        DoseAssessment {
            drug: drug.to_string(),
            baseline_found,
            status: DoseStatus::Unknown,
            percent_above: 0.0,
            mg_per_kg_per_day: None,
            comment: comment.into(),
        }
    }

    pub fn is_above(&self) -> bool {
        self.status == DoseStatus::Above
    }
}

/// A range is usable when both ends are finite, `0 <= min <= max` and `max > 0`
fn usable_range(min: Option<f64>, max: Option<f64>) -> Option<(f64, f64)> {
    match (min, max) {
        (Some(min), Some(max))
            if min.is_finite() && max.is_finite() && min >= 0.0 && max > 0.0 && min <= max =>
        {
            Some((min, max))
        }
        _ => None,
    }
}

/// Below/within/above classification shared by the adult and pediatric paths
fn classify(value: f64, min: f64, max: f64) -> (DoseStatus, f64) {
    if value < min {
        (DoseStatus::Below, 0.0)
    } else if value > max {
        (DoseStatus::Above, (value - max) / max * 100.0)
    } else {
        (DoseStatus::Within, 0.0)
    }
}

/// Check one drug entry against the baseline table
pub fn evaluate_dose(
    baseline: &BaselineTable,
    entry: &DrugEntry,
    patient: &PatientContext,
) -> DoseAssessment {
    let drug = entry.name.as_str();

    let record = match baseline.get(drug) {
        Some(record) => record,
        None => return DoseAssessment::unknown(drug, false, "No baseline dosing info available"),
    };

    let (dose_value, dose_unit) = match (entry.dose_value, entry.dose_unit.as_deref()) {
        (Some(value), Some(unit)) => (value, unit),
        (None, _) => return DoseAssessment::unknown(drug, true, "No dose given"),
        (Some(_), None) => return DoseAssessment::unknown(drug, true, "No dose unit given"),
    };

    let dose_mg = match convert_to_mg(dose_value, dose_unit) {
        Ok(mg) => mg,
        Err(e) => {
            return DoseAssessment::unknown(
                drug,
                true,
                format!("Unsupported or non-convertible unit for automated check: {}", e),
            )
        }
    };

    if patient.is_pediatric {
        match patient.weight_kg {
            Some(weight) if weight.is_finite() && weight > 0.0 => {
                evaluate_pediatric(drug, record, dose_mg, entry.frequency_per_day, weight)
            }
            _ => {
                DoseAssessment::unknown(drug, true, "Pediatric check requires patient weight (kg)")
            }
        }
    } else {
        evaluate_adult(drug, record, dose_mg)
    }
}

fn evaluate_adult(drug: &str, record: &DrugBaseline, dose_mg: f64) -> DoseAssessment {
    let adult = match &record.adult {
        Some(adult) => adult,
        None => return DoseAssessment::unknown(drug, true, "No adult dosing guidance available"),
    };
    let (min, max) = match usable_range(adult.min_mg_per_dose, adult.max_mg_per_dose) {
        Some(range) => range,
        None => return DoseAssessment::unknown(drug, true, "Incomplete adult baseline"),
    };

    let (status, percent_above) = classify(dose_mg, min, max);
    let comment = match status {
        DoseStatus::Below => format!("Below typical adult per-dose range ({}-{} mg)", min, max),
        DoseStatus::Above => format!(
            "Above typical adult per-dose max ({} mg) by {:.1}%",
            max, percent_above
        ),
        _ => format!("Within typical adult per-dose range ({}-{} mg)", min, max),
    };

    DoseAssessment {
        drug: drug.to_string(),
        baseline_found: true,
        status,
        percent_above,
        mg_per_kg_per_day: None,
        comment,
    }
}

fn evaluate_pediatric(
    drug: &str,
    record: &DrugBaseline,
    dose_mg: f64,
    frequency_per_day: f64,
    weight_kg: f64,
) -> DoseAssessment {
    let mg_per_kg_per_day = dose_mg * frequency_per_day / weight_kg;

    let guidance = match &record.pediatric_mg_per_kg_per_day {
        Some(guidance) => guidance,
        None => {
            let mut assessment =
                DoseAssessment::unknown(drug, true, "No pediatric dosing guidance available");
            assessment.mg_per_kg_per_day = Some(mg_per_kg_per_day);
            return assessment;
        }
    };
    let (min, max) = match usable_range(guidance.min, guidance.max) {
        Some(range) => range,
        None => {
            let mut assessment =
                DoseAssessment::unknown(drug, true, "Incomplete pediatric baseline");
            assessment.mg_per_kg_per_day = Some(mg_per_kg_per_day);
            return assessment;
        }
    };

    let (status, percent_above) = classify(mg_per_kg_per_day, min, max);
    let comment = match status {
        DoseStatus::Below => format!("Below pediatric guidance ({} mg/kg/day)", min),
        DoseStatus::Above => format!(
            "Above pediatric guidance ({} mg/kg/day) by {:.1}%",
            max, percent_above
        ),
        _ => format!("Within pediatric range ({}-{} mg/kg/day)", min, max),
    };

    DoseAssessment {
        drug: drug.to_string(),
        baseline_found: true,
        status,
        percent_above,
        mg_per_kg_per_day: Some(mg_per_kg_per_day),
        comment,
    }
}
