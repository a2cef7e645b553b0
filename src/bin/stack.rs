//! stack: run a stacking ensemble described by a TOML file.
//!
//! ## Usage
//!
//! ```bash
//! stack --config run.toml --train train.csv --test test.csv --output preds.csv
//!
//! # per-fold and per-trial detail
//! stack -c run.toml --train train.csv --test test.csv -o preds.csv --verbose
//!
//! # RUST_LOG overrides --verbose
//! RUST_LOG=stacklearne_rs=trace stack ...
//! ```
//!
//! The training CSV must contain the configured `target` column. The test CSV
//! may contain it too; it is ignored. Empty cells are imputed with the
//! configured strategy, fitted on the training rows.

use anyhow::{bail, Context, Result};
use clap::Parser;
use stacklearne_rs::config::StackingConfig;
use stacklearne_rs::dataset::{write_predictions_csv, Dataset};
use stacklearne_rs::preprocessing::{FittedTransformer, SimpleImputer, Transformer};
use stacklearne_rs::StackingError;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stack")]
#[command(about = "Tune base models, build out-of-fold meta-features and fit a stacked model")]
struct Args {
    /// TOML run configuration
    #[arg(short, long)]
    config: PathBuf,

    /// Labeled training CSV
    #[arg(long)]
    train: PathBuf,

    /// Test CSV to predict
    #[arg(long)]
    test: PathBuf,

    /// Where to write `id,prediction` rows
    #[arg(short, long)]
    output: PathBuf,

    /// Directory for tuning reports (overrides `output_dir` in the config)
    #[arg(long)]
    report_dir: Option<PathBuf>,

    /// Log folds and trials
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("stacklearne_rs={0},stack={0}", default_level))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = StackingConfig::from_file(&args.config)
        .with_context(|| format!("loading config {}", args.config.display()))?;
    if let Some(dir) = args.report_dir {
        config.output_dir = Some(dir);
    }

    let train = Dataset::from_csv(&args.train, Some(&config.target))
        .with_context(|| format!("reading training data {}", args.train.display()))?;
    let test = load_test(&args.test, &config.target)
        .with_context(|| format!("reading test data {}", args.test.display()))?;
    if train.feature_names() != test.feature_names() {
        bail!(
            "train and test columns differ: {:?} vs {:?}",
            train.feature_names(),
            test.feature_names()
        );
    }
    info!(
        train_rows = train.n_samples(),
        test_rows = test.n_samples(),
        features = train.n_features(),
        "data loaded"
    );

    let imputer = SimpleImputer::new(config.impute.clone())
        .fit(train.features())
        .context("fitting imputer")?;
    let train_x = imputer.transform(train.features())?;
    let test_x = imputer.transform(test.features())?;
    let train = train.with_features(train_x)?;
    let test = test.with_features(test_x)?;

    let outcome = config
        .ensemble()
        .context("invalid configuration")?
        .fit(&train, &test)
        .context("stacking failed")?;

    for report in &outcome.base_reports {
        info!(
            model = %report.name,
            cv_score = report.tuning.best_score(),
            params = ?report.tuning.best_params(),
            "base model"
        );
    }

    let file = File::create(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;
    write_predictions_csv(BufWriter::new(file), outcome.predictions.view())?;
    info!(
        path = %args.output.display(),
        rows = outcome.predictions.len(),
        "predictions written"
    );
    Ok(())
}

/// Reads the test CSV, dropping the target column when present.
fn load_test(path: &Path, target: &str) -> stacklearne_rs::Result<Dataset> {
    match Dataset::from_csv(path, Some(target)) {
        Err(StackingError::InvalidParameter { .. }) => Dataset::from_csv(path, None),
        other => other,
    }
}
