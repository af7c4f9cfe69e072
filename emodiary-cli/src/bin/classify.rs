//! Command-line emotion classification
//!
//! Classifies a single text argument, or every line of a TSV file
//! (`text<TAB>label`, label optional). With labels, prints accuracy and a
//! per-class table. Scoring runs in parallel over a shared classifier.

use anyhow::{Context, Result, bail};
use clap::Parser;
use emodiary_engine::emotion::NUM_CLASSES;
use emodiary_engine::{Emotion, EmotionResult, InferenceContext, Settings};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "emodiary-classify")]
#[command(about = "Classify diary text with the emotion model")]
struct Cli {
    /// Text to classify (omit when using --file)
    text: Option<String>,

    /// TSV file with one `text<TAB>label` row per line
    #[arg(short, long, conflicts_with = "text")]
    file: Option<PathBuf>,

    /// Write per-row predictions as JSON
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Settings file (defaults to ~/.config/emodiary/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory relative weight search paths resolve against
    #[arg(long, default_value = ".")]
    model_dir: PathBuf,

    /// Number of parallel scoring threads (default: all cores)
    #[arg(long)]
    threads: Option<usize>,

    /// Enable verbose logging (debug level)
    #[arg(short, long)]
    verbose: bool,
}

/// One TSV row
#[derive(Debug, Clone, PartialEq)]
struct Example {
    text: String,
    label: Option<Emotion>,
}

#[derive(Serialize)]
struct Prediction<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<Emotion>,
    #[serde(flatten)]
    result: &'a EmotionResult,
}

/// Parse TSV content. Blank lines are skipped; unknown labels are an error.
fn parse_tsv(content: &str) -> Result<Vec<Example>> {
    let mut examples = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let (text, label) = match line.split_once('\t') {
            Some((text, label)) if !label.trim().is_empty() => {
                let emotion = Emotion::parse(label)
                    .with_context(|| format!("line {}: unknown emotion label {:?}", line_no + 1, label))?;
                (text, Some(emotion))
            }
            Some((text, _)) => (text, None),
            None => (line, None),
        };
        examples.push(Example {
            text: text.trim().to_string(),
            label,
        });
    }
    Ok(examples)
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct ClassStats {
    support: usize,
    predicted: usize,
    correct: usize,
}

#[derive(Debug)]
struct Report {
    total: usize,
    correct: usize,
    per_class: [ClassStats; NUM_CLASSES],
}

impl Report {
    fn from_pairs(pairs: impl IntoIterator<Item = (Emotion, Emotion)>) -> Self {
        let mut report = Report {
            total: 0,
            correct: 0,
            per_class: [ClassStats::default(); NUM_CLASSES],
        };
        for (gold, predicted) in pairs {
            report.total += 1;
            report.per_class[gold.index()].support += 1;
            report.per_class[predicted.index()].predicted += 1;
            if gold == predicted {
                report.correct += 1;
                report.per_class[gold.index()].correct += 1;
            }
        }
        report
    }

    fn accuracy(&self) -> f64 {
        ratio(self.correct, self.total)
    }

    fn print(&self) {
        println!(
            "accuracy: {:.2}% ({}/{})",
            self.accuracy() * 100.0,
            self.correct,
            self.total
        );
        println!("{:<8} {:>8} {:>9} {:>8} {:>9}", "label", "support", "predicted", "recall", "precision");
        for emotion in Emotion::ALL {
            let stats = self.per_class[emotion.index()];
            println!(
                "{:<8} {:>8} {:>9} {:>7.1}% {:>8.1}%",
                emotion.label(),
                stats.support,
                stats.predicted,
                ratio(stats.correct, stats.support) * 100.0,
                ratio(stats.correct, stats.predicted) * 100.0
            );
        }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "emodiary_engine=debug"
    } else {
        "emodiary_engine=warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .ok(); // ignore error if already initialized
    }

    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    // Classification only
    settings.generation.text_enabled = false;
    settings.generation.image_enabled = false;

    eprintln!("Loading emotion classifier '{}'...", settings.model.family);
    let ctx = InferenceContext::from_settings(&settings, &cli.model_dir)?;
    if let Some(reason) = ctx.unavailable_reason() {
        bail!("emotion model is not loaded: {reason}");
    }

    let examples = match (&cli.text, &cli.file) {
        (Some(text), None) => vec![Example {
            text: text.clone(),
            label: None,
        }],
        (None, Some(path)) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            parse_tsv(&content)?
        }
        _ => bail!("pass either a text argument or --file"),
    };

    let pb = ProgressBar::new(examples.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}, ETA: {eta})")
            .context("invalid progress template")?
            .progress_chars("=>-"),
    );

    let results: Vec<EmotionResult> = examples
        .par_iter()
        .map(|example| {
            let result = ctx
                .classify(&example.text)
                .with_context(|| format!("failed to classify {:?}", example.text));
            pb.inc(1);
            result
        })
        .collect::<Result<_>>()?;
    pb.finish_and_clear();

    if let [result] = results.as_slice() {
        if cli.file.is_none() {
            println!("{} ({:.2}%)", result.emotion, result.confidence);
            for (emotion, p) in result.probabilities.iter() {
                println!("  {:<4} {:>6.2}%", emotion.label(), p * 100.0);
            }
        }
    }

    let labelled: Vec<(Emotion, Emotion)> = examples
        .iter()
        .zip(&results)
        .filter_map(|(example, result)| example.label.map(|gold| (gold, result.emotion)))
        .collect();
    if !labelled.is_empty() {
        Report::from_pairs(labelled).print();
    }

    if let Some(output) = &cli.output {
        let predictions: Vec<Prediction> = examples
            .iter()
            .zip(&results)
            .map(|(example, result)| Prediction {
                text: &example.text,
                label: example.label,
                result,
            })
            .collect();
        let json = serde_json::to_string_pretty(&predictions)?;
        std::fs::write(output, json)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        eprintln!("Wrote {} predictions to {}", predictions.len(), output.display());
    }

    Ok(())
}
