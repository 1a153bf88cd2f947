//! Human-readable rendering for terminal output

use colored::*;
use ddi_engine::{AssessmentReport, DoseAssessment, DoseStatus, PairRecord, PairScore, RiskTier};
use std::fmt::Write;

fn tier_label(tier: RiskTier, color: bool) -> String {
    if !color {
        return tier.to_string();
    }
    match tier {
        RiskTier::Low => tier.as_str().green().to_string(),
        RiskTier::Moderate => tier.as_str().yellow().bold().to_string(),
        RiskTier::High => tier.as_str().red().bold().to_string(),
    }
}

fn probability(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |p| format!("{:.3}", p))
}

fn pair_row(record: &PairRecord, color: bool) -> String {
    let tier = match record.risk_tier() {
        Some(tier) => tier_label(tier, color),
        None if color => "FAILED".magenta().bold().to_string(),
        None => "FAILED".to_string(),
    };
    let source = if record.found_in_knowledge_base { "kb" } else { "model" };
    format!(
        "{:<20} {:<20} {:>6} {:>6} {:>6}  {:<5}  {}",
        record.drug_a,
        record.drug_b,
        probability(record.raw_probability()),
        format!("+{:.2}", record.escalation),
        probability(record.adjusted_probability()),
        source,
        tier
    )
}

/// Full report as an aligned table with dose notes and the session summary
pub fn report_table(report: &AssessmentReport, color: bool) -> String {
    let assessment = &report.assessment;
    let mut out = String::new();
    let rule = "─".repeat(78);

    let snapshot = &assessment.snapshot_fingerprint;
    let _ = writeln!(
        out,
        "Generated {}  snapshot {}",
        report.generated_at.to_rfc3339(),
        snapshot.get(..12).unwrap_or(snapshot)
    );
    for warning in &assessment.warnings {
        let _ = writeln!(out, "warning: {}", warning);
    }

    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "Doses");
    let _ = writeln!(out, "{}", rule);
    for dose in &assessment.dose_assessments {
        let _ = writeln!(out, "{}", dose_line_with(dose, color));
    }

    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(
        out,
        "{:<20} {:<20} {:>6} {:>6} {:>6}  {:<5}  {}",
        "Drug A", "Drug B", "Raw", "Esc", "Adj", "Src", "Tier"
    );
    let _ = writeln!(out, "{}", rule);
    for record in &assessment.pairs {
        let _ = writeln!(out, "{}", pair_row(record, color));
        if let PairScore::Failed { reason } = &record.score {
            let _ = writeln!(out, "    {}", reason);
        }
    }

    let summary = &assessment.summary;
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(
        out,
        "Pairs: {}  risky: {} ({:.1}%)  failed: {}",
        summary.total_pairs,
        summary.risky_pairs,
        summary.percent_risky * 100.0,
        summary.failed_pairs
    );
    let _ = write!(
        out,
        "Avg confidence: {:.3}  combined: {:.3}  overall: {}",
        summary.avg_confidence,
        summary.combined_score,
        tier_label(summary.overall_level, color)
    );
    out
}

fn dose_line_with(dose: &DoseAssessment, color: bool) -> String {
    let status = dose.status.as_str();
    let status = match (color, dose.status) {
        (false, _) => status.to_string(),
        (true, DoseStatus::Above) => status.red().bold().to_string(),
        (true, DoseStatus::Below) => status.yellow().to_string(),
        (true, DoseStatus::Within) => status.green().to_string(),
        (true, DoseStatus::Unknown) => status.dimmed().to_string(),
    };
    format!("{:<20} {:<8} {}", dose.drug, status, dose.comment)
}

/// One dose check on a single line
pub fn dose_line(dose: &DoseAssessment) -> String {
    dose_line_with(dose, true)
}

/// Verdict for a single pair
pub fn prediction_line(drug1: &str, drug2: &str, probability: f64, curated: bool) -> String {
    let verdict = if probability > 0.5 {
        "YES (interaction likely)".red().bold()
    } else {
        "NO (interaction unlikely)".green()
    };
    let source = if curated { "knowledge base" } else { "model" };
    format!(
        "{} + {}: {} p={:.3} [{}]",
        drug1, drug2, verdict, probability, source
    )
}
