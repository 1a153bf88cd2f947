//! Assessment requests and their validation
//!
//! Requests arrive as loosely-typed form data: numbers may be JSON numbers
//! or numeric strings, and fields may be missing. Validation turns them into
//! [`ValidatedRequest`] or rejects them before any evaluation runs.

use crate::pair_key::drug_key;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Request-level problems; the whole request is rejected
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("enter at least two distinct drugs with names (got {0})")]
    TooFewDrugs(usize),
    #[error("pediatric mode requires a positive patient weight (kg)")]
    PediatricWeightRequired,
    #[error("{drug}: {field} '{value}' is not a number")]
    MalformedNumber {
        drug: String,
        field: &'static str,
        value: String,
    },
    #[error("{drug}: {field} must be {requirement} (got {value})")]
    OutOfRange {
        drug: String,
        field: &'static str,
        requirement: &'static str,
        value: f64,
    },
    #[error("drug name is required")]
    MissingName,
}

/// A numeric form field: a JSON number or a numeric string
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericInput {
    Number(f64),
    Text(String),
}

impl NumericInput {
    /// Parse the field; blank text counts as absent
    fn parse(&self, drug: &str, field: &'static str) -> Result<Option<f64>, ValidationError> {
        match self {
            NumericInput::Number(v) => Ok(Some(*v)),
            NumericInput::Text(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return Ok(None);
                }
                text.parse::<f64>()
                    .map(Some)
                    .map_err(|_| ValidationError::MalformedNumber {
                        drug: drug.to_string(),
                        field,
                        value: text.to_string(),
                    })
            }
        }
    }
}

impl From<f64> for NumericInput {
    fn from(v: f64) -> Self {
        NumericInput::Number(v)
    }
}

/// One drug row as submitted by the caller
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DrugInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "dose_value")]
    pub dose: Option<NumericInput>,
    #[serde(default, alias = "dose_unit")]
    pub unit: Option<String>,
    #[serde(default, alias = "frequency_per_day")]
    pub freq: Option<NumericInput>,
    #[serde(default)]
    pub route: Option<String>,
}

impl DrugInput {
    /// Row with a numeric dose; frequency and route left unset
    pub fn new(name: &str, dose: f64, unit: &str) -> Self {
        DrugInput {
            name: Some(name.to_string()),
            dose: Some(NumericInput::Number(dose)),
            unit: Some(unit.to_string()),
            freq: None,
            route: None,
        }
    }

    pub fn with_frequency(mut self, per_day: f64) -> Self {
        self.freq = Some(NumericInput::Number(per_day));
        self
    }

    pub fn with_route(mut self, route: &str) -> Self {
        self.route = Some(route.to_string());
        self
    }

    /// Validate this row on its own, returning the entry and any defaults applied
    pub fn to_entry(&self) -> Result<(DrugEntry, Vec<String>), ValidationError> {
        let name = self.name.as_deref().unwrap_or("").trim();
        if name.is_empty() {
            return Err(ValidationError::MissingName);
        }
        let mut warnings = Vec::new();
        let entry = DrugEntry::from_input(name, self, &mut warnings)?;
        Ok((entry, warnings))
    }
}

/// A full assessment request
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AssessmentRequest {
    #[serde(default)]
    pub drugs: Vec<DrugInput>,
    #[serde(default)]
    pub is_pediatric: bool,
    #[serde(default)]
    pub weight_kg: Option<NumericInput>,
}

impl AssessmentRequest {
    pub fn new(drugs: Vec<DrugInput>) -> Self {
        AssessmentRequest {
            drugs,
            is_pediatric: false,
            weight_kg: None,
        }
    }

    pub fn pediatric(mut self, weight_kg: Option<f64>) -> Self {
        self.is_pediatric = true;
        self.weight_kg = weight_kg.map(NumericInput::Number);
        self
    }

    /// Validate the request. Nothing is evaluated unless this succeeds.
    pub fn validate(&self) -> Result<ValidatedRequest, ValidationError> {
        let patient = self.patient_context()?;
        let mut warnings = Vec::new();
        let mut seen = HashSet::new();
        let mut drugs = Vec::new();

        for input in &self.drugs {
            let name = input.name.as_deref().unwrap_or("").trim();
            if name.is_empty() {
                continue;
            }
            if !seen.insert(drug_key(name)) {
                warnings.push(format!(
                    "{}: listed more than once, only the first entry is assessed",
                    name
                ));
                log::warn!("dropping duplicate drug entry '{}'", name);
                continue;
            }
            drugs.push(DrugEntry::from_input(name, input, &mut warnings)?);
        }

        if drugs.len() < 2 {
            return Err(ValidationError::TooFewDrugs(drugs.len()));
        }

        Ok(ValidatedRequest {
            drugs,
            patient,
            warnings,
        })
    }

    /// Patient context, rejecting pediatric mode without a usable weight
    pub fn patient_context(&self) -> Result<PatientContext, ValidationError> {
        if !self.is_pediatric {
            return Ok(PatientContext::adult());
        }
        let weight = match &self.weight_kg {
            Some(input) => input.parse("patient", "weight_kg")?,
            None => None,
        };
        match weight {
            Some(w) if w.is_finite() && w > 0.0 => Ok(PatientContext::pediatric(w)),
            _ => Err(ValidationError::PediatricWeightRequired),
        }
    }
}

/// A validated drug entry; immutable for the request.
/// Dose and unit may be absent, in which case the dose check reports `unknown`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DrugEntry {
    pub name: String,
    pub dose_value: Option<f64>,
    pub dose_unit: Option<String>,
    pub frequency_per_day: f64,
    pub route: String,
}

impl DrugEntry {
    fn from_input(
        name: &str,
        input: &DrugInput,
        warnings: &mut Vec<String>,
    ) -> Result<Self, ValidationError> {
        let dose_value = match &input.dose {
            Some(raw) => raw.parse(name, "dose")?,
            None => None,
        };
        match dose_value {
            Some(dose) if !dose.is_finite() || dose < 0.0 => {
                return Err(ValidationError::OutOfRange {
                    drug: name.to_string(),
                    field: "dose",
                    requirement: "a finite, non-negative number",
                    value: dose,
                })
            }
            Some(_) => {}
            None => warnings.push(format!("{}: no dose given, dose check skipped", name)),
        }

        let dose_unit = input
            .unit
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string);
        if dose_unit.is_none() && dose_value.is_some() {
            warnings.push(format!("{}: no dose unit given, dose check skipped", name));
        }

        let frequency = match &input.freq {
            Some(raw) => raw.parse(name, "frequency")?,
            None => None,
        };
        let frequency_per_day = match frequency {
            Some(f) if f.is_finite() && f > 0.0 => f,
            Some(f) => {
                return Err(ValidationError::OutOfRange {
                    drug: name.to_string(),
                    field: "frequency",
                    requirement: "a positive number of doses per day",
                    value: f,
                })
            }
            None => {
                warnings.push(format!("{}: no frequency given, assuming once daily", name));
                1.0
            }
        };

        let route = input
            .route
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or("unspecified")
            .to_string();

        Ok(DrugEntry {
            name: name.to_string(),
            dose_value,
            dose_unit,
            frequency_per_day,
            route,
        })
    }
}

/// Patient context shared by every dose check in a request
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatientContext {
    pub is_pediatric: bool,
    pub weight_kg: Option<f64>,
}

impl PatientContext {
    pub fn adult() -> Self {
        PatientContext {
            is_pediatric: false,
            weight_kg: None,
        }
    }

    pub fn pediatric(weight_kg: f64) -> Self {
        PatientContext {
            is_pediatric: true,
            weight_kg: Some(weight_kg),
        }
    }
}

/// Output of [`AssessmentRequest::validate`]
#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedRequest {
    /// Distinct drugs, in the order first submitted
    pub drugs: Vec<DrugEntry>,
    pub patient: PatientContext,
    /// Defaults applied and entries dropped during validation
    pub warnings: Vec<String>,
}
