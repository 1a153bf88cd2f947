//! Dose unit normalization
//!
//! Mass units convert exactly to milligrams. Volume and potency units
//! (mL, IU) depend on the product's concentration, which the engine
//! never knows, so they are reported as non-convertible.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Dose units recognised by the engine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoseUnit {
    Milligram,
    Gram,
    Microgram,
    /// Volume; needs a concentration to reach mg
    Millilitre,
    /// Potency; substance-specific
    InternationalUnit,
}

impl DoseUnit {
    /// Parse a unit label (case-insensitive, surrounding whitespace ignored)
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "mg" | "milligram" | "milligrams" => Some(DoseUnit::Milligram),
            "g" | "gram" | "grams" => Some(DoseUnit::Gram),
            "mcg" | "µg" | "μg" | "ug" | "microgram" | "micrograms" => Some(DoseUnit::Microgram),
            "ml" | "millilitre" | "milliliter" | "millilitres" | "milliliters" => {
                Some(DoseUnit::Millilitre)
            }
            "iu" | "international unit" | "international units" => {
                Some(DoseUnit::InternationalUnit)
            }
            _ => None,
        }
    }

    /// Whether a value in this unit can be expressed in mg without extra data
    pub fn is_mass(&self) -> bool {
        matches!(self, DoseUnit::Milligram | DoseUnit::Gram | DoseUnit::Microgram)
    }

    /// Short label
    pub fn symbol(&self) -> &'static str {
        match self {
            DoseUnit::Milligram => "mg",
            DoseUnit::Gram => "g",
            DoseUnit::Microgram => "mcg",
            DoseUnit::Millilitre => "mL",
            DoseUnit::InternationalUnit => "IU",
        }
    }
}

/// Why a dose could not be expressed in milligrams
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    #[error("{0} cannot be converted to mg without a concentration or potency")]
    RequiresConcentration(&'static str),
    #[error("unrecognized dose unit '{0}'")]
    UnknownUnit(String),
    #[error("dose value {0} is not a finite number")]
    NonFiniteValue(f64),
}

/// Convert a dose to milligrams.
///
/// ```rust
/// use ddi_engine::units::convert_to_mg;
///
/// assert_eq!(convert_to_mg(1.0, "g").unwrap(), 1000.0);
/// assert_eq!(convert_to_mg(500.0, "mcg").unwrap(), 0.5);
/// assert!(convert_to_mg(5.0, "mL").is_err());
/// ```
pub fn convert_to_mg(value: f64, unit: &str) -> Result<f64, ConversionError> {
    if !value.is_finite() {
        return Err(ConversionError::NonFiniteValue(value));
    }
    let unit = DoseUnit::parse(unit)
        .ok_or_else(|| ConversionError::UnknownUnit(unit.trim().to_string()))?;
    match unit {
        DoseUnit::Milligram => Ok(value),
        DoseUnit::Gram => Ok(value * 1000.0),
        DoseUnit::Microgram => Ok(value / 1000.0),
        DoseUnit::Millilitre | DoseUnit::InternationalUnit => {
            Err(ConversionError::RequiresConcentration(unit.symbol()))
        }
    }
}
