//! Timestamped reports and CSV export

use crate::compose::PairRecord;
use crate::engine::Assessment;
use crate::DataError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

/// An assessment stamped with the time it was produced
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssessmentReport {
    pub generated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub assessment: Assessment,
}

impl AssessmentReport {
    pub fn new(assessment: Assessment) -> Self {
        Self::at(assessment, Utc::now())
    }

    pub fn at(assessment: Assessment, generated_at: DateTime<Utc>) -> Self {
        AssessmentReport {
            generated_at,
            assessment,
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, DataError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// One CSV row per pair
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), DataError> {
        write_pairs_csv(&self.assessment.pairs, writer)
    }
}

/// Flat row layout for spreadsheet export
#[derive(Debug, Serialize)]
struct PairRow<'a> {
    drug_a: &'a str,
    drug_b: &'a str,
    pair_key: String,
    found_in_knowledge_base: bool,
    raw_probability: Option<f64>,
    escalation: f64,
    adjusted_probability: Option<f64>,
    risk_tier: &'a str,
    dose_status_a: &'a str,
    dose_comment_a: &'a str,
    dose_status_b: &'a str,
    dose_comment_b: &'a str,
    interaction_description: &'a str,
}

impl<'a> From<&'a PairRecord> for PairRow<'a> {
    fn from(record: &'a PairRecord) -> Self {
        PairRow {
            drug_a: &record.drug_a,
            drug_b: &record.drug_b,
            pair_key: record.pair_key.to_string(),
            found_in_knowledge_base: record.found_in_knowledge_base,
            raw_probability: record.raw_probability(),
            escalation: record.escalation,
            adjusted_probability: record.adjusted_probability(),
            risk_tier: record.risk_tier().map_or("Failed", |t| t.as_str()),
            dose_status_a: record.dose_assessment_a.status.as_str(),
            dose_comment_a: &record.dose_assessment_a.comment,
            dose_status_b: record.dose_assessment_b.status.as_str(),
            dose_comment_b: &record.dose_assessment_b.comment,
            interaction_description: record.interaction_description.as_deref().unwrap_or(""),
        }
    }
}

pub fn write_pairs_csv<W: Write>(pairs: &[PairRecord], writer: W) -> Result<(), DataError> {
    let mut out = csv::Writer::from_writer(writer);
    for record in pairs {
        out.serialize(PairRow::from(record))?;
    }
    out.flush().map_err(|source| DataError::Io {
        path: "<csv output>".to_string(),
        source,
    })?;
    Ok(())
}
