//! DDI Assess CLI Tool
//!
//! Run drug-drug interaction risk assessments from the command line.
//!
//! Usage:
//!   ddi-assess assess <request.json> [--format json|csv|table] [--output <file>]
//!   ddi-assess dose <drug> <dose> <unit> [--freq <n>] [--pediatric --weight <kg>]
//!   ddi-assess drugs [--query <text>] [--limit <n>]
//!   ddi-assess predict <drug1> <drug2>

mod output;

use clap::{Parser, Subcommand, ValueEnum};
use ddi_engine::{
    AssessmentEngine, AssessmentReport, AssessmentRequest, DrugInput, EngineConfig,
    LinearTextClassifier, ReferenceData,
};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "ddi-assess")]
#[command(author = "DDI Engine Developers")]
#[command(version = "0.1.0")]
#[command(about = "Assess drug-drug interaction and dosing risk", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Baseline dosing table (JSON)
    #[arg(long, env = "DDI_BASELINE", default_value = "data/dosing_baseline.json")]
    baseline: PathBuf,

    /// Curated interaction knowledge base (CSV or JSON)
    #[arg(long, env = "DDI_KNOWLEDGE_BASE", default_value = "data/knowledge_base.csv")]
    knowledge_base: PathBuf,

    /// Exported interaction classifier (JSON); pairs outside the knowledge base fail without it
    #[arg(long, env = "DDI_MODEL")]
    model: Option<PathBuf>,

    /// Score pairs on a single thread
    #[arg(long)]
    sequential: bool,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Csv,
    Table,
}

#[derive(Subcommand)]
enum Commands {
    /// Assess every pair of drugs in a request file
    Assess {
        /// Request JSON: {"drugs": [...], "is_pediatric": bool, "weight_kg": number}
        request: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: Format,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check a single dose against the baseline table
    Dose {
        drug: String,
        dose: f64,
        /// mg, g, mcg (mL and IU are reported as non-convertible)
        unit: String,

        /// Doses per day
        #[arg(long, default_value = "1")]
        freq: f64,

        #[arg(long)]
        pediatric: bool,

        /// Patient weight in kg (required with --pediatric)
        #[arg(long)]
        weight: Option<f64>,
    },

    /// List known drug names
    Drugs {
        /// Case-insensitive substring filter
        #[arg(short, long)]
        query: Option<String>,

        #[arg(short, long, default_value = "30")]
        limit: usize,
    },

    /// Raw interaction probability for one pair
    Predict { drug1: String, drug2: String },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let engine = build_engine(&cli)?;

    match cli.command {
        Commands::Assess {
            request,
            format,
            output: destination,
        } => {
            let content = fs::read_to_string(&request)?;
            let request: AssessmentRequest = serde_json::from_str(&content)?;
            let report = AssessmentReport::new(engine.assess(&request)?);

            let rendered = match format {
                Format::Json => report.to_json_pretty()?,
                Format::Csv => {
                    let mut buf = Vec::new();
                    report.write_csv(&mut buf)?;
                    String::from_utf8(buf)?
                }
                Format::Table => output::report_table(&report, destination.is_none()),
            };

            if let Some(path) = destination {
                fs::write(&path, &rendered)?;
                eprintln!("Output written to: {}", path.display());
            } else {
                println!("{}", rendered);
            }
        }
        Commands::Dose {
            drug,
            dose,
            unit,
            freq,
            pediatric,
            weight,
        } => {
            let input = DrugInput::new(&drug, dose, &unit).with_frequency(freq);
            let mut request = AssessmentRequest::new(vec![input.clone()]);
            if pediatric {
                request = request.pediatric(weight);
            }
            // single drug: validate the patient and the row without the pair checks
            let patient = request.patient_context()?;
            let (entry, _) = input.to_entry()?;
            let assessment = engine.evaluate_dose(&entry, &patient);
            println!("{}", output::dose_line(&assessment));
        }
        Commands::Drugs { query, limit } => {
            let names = match query {
                Some(q) => engine.reference().search_drugs(&q, limit),
                None => engine.reference().known_drugs().into_iter().take(limit).collect(),
            };
            for name in names {
                println!("{}", name);
            }
        }
        Commands::Predict { drug1, drug2 } => {
            let (probability, curated) = engine.predict_pair(&drug1, &drug2)?;
            println!("{}", output::prediction_line(&drug1, &drug2, probability, curated));
        }
    }

    Ok(())
}

fn build_engine(cli: &Cli) -> Result<AssessmentEngine, Box<dyn std::error::Error>> {
    let reference = ReferenceData::load(&cli.baseline, &cli.knowledge_base)?;
    log::info!(
        "reference snapshot {} ({} baseline drugs, {} known pairs)",
        reference.fingerprint(),
        reference.baseline().len(),
        reference.knowledge_base().len()
    );

    let config = EngineConfig::default().with_parallel(!cli.sequential);
    let mut engine = AssessmentEngine::new(Arc::new(reference)).with_config(config)?;
    if let Some(path) = &cli.model {
        engine = engine.with_classifier(Arc::new(LinearTextClassifier::load(path)?));
    } else {
        log::warn!("no classifier model given; only knowledge-base pairs can be scored");
    }
    Ok(engine)
}
