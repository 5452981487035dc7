//! Textgate CLI - offline analysis and configuration tooling.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use textgate_core::PipelineConfig;
use textgate_detect::{Detector, RiskValidator, Thresholds, ValidationDecision};
use textgate_normalize::{Normalizer, NormalizerConfig, TransformTag};
use textgate_signatures::{Category, SignatureBank};

#[derive(Parser)]
#[command(name = "textgate")]
#[command(about = "Textgate - request defense for generative-text backends")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Analyze a piece of text without contacting a provider
    Scan {
        /// The text to analyze
        text: String,
        /// Emit the full report as JSON
        #[arg(short, long)]
        json: bool,
    },
    /// Check configuration validity
    Check {
        /// Configuration file path
        #[arg(short, long, default_value = "config/textgate.json")]
        config: String,
    },
    /// Show the built-in signature bank
    Status,
}

#[derive(Serialize)]
struct ScanReport {
    canonical: String,
    transforms: Vec<TransformTag>,
    suspicion: f64,
    decision: ValidationDecision,
    category: Option<Category>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Scan { text, json }) => scan(&text, json),
        Some(Commands::Check { config }) => check(&config),
        Some(Commands::Status) => {
            status();
            Ok(())
        }
        None => {
            println!("Textgate v0.1.0 - Use --help for commands");
            Ok(())
        }
    }
}

/// Runs the input-side stages (normalize, detect, validate) on one text.
fn scan(text: &str, json: bool) -> anyhow::Result<()> {
    let normalizer = Normalizer::new(NormalizerConfig::default());
    let detector = Detector::new(Arc::new(SignatureBank::builtin()));
    let validator = RiskValidator::new(detector.clone(), Thresholds::default());

    let normalized = normalizer.normalize(text);
    let detection = detector.detect(&normalized.canonical);
    let decision = validator.validate(
        &normalized.canonical,
        &detection,
        normalized.suspicion_score(),
    );

    let report = ScanReport {
        canonical: normalized.canonical.clone(),
        transforms: normalized.transforms.clone(),
        suspicion: normalized.suspicion_score(),
        category: detection.category,
        decision,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("action:    {:?}", report.decision.action);
        println!("risk:      {:.2}", report.decision.risk_score);
        match report.category {
            Some(c) => println!("category:  {}", c.as_str()),
            None => println!("category:  -"),
        }
        println!("reason:    {}", report.decision.reason);
        if !report.transforms.is_empty() {
            println!("decoded:   {:?}", report.transforms);
            println!("canonical: {}", report.canonical);
        }
    }
    Ok(())
}

fn check(path: &str) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read config file {path}"))?;
    let config: PipelineConfig =
        serde_json::from_str(&raw).with_context(|| format!("invalid config in {path}"))?;
    println!(
        "config OK: default tier {}, block threshold {:.2}",
        config.default_tier.as_str(),
        config.thresholds.block
    );
    Ok(())
}

fn status() {
    let bank = SignatureBank::builtin();
    println!("signature bank: {} signatures", bank.len());
    for category in Category::all() {
        let count = bank
            .signatures()
            .filter(|s| s.category == category)
            .count();
        println!("  {:<22} {}", category.as_str(), count);
    }
}
