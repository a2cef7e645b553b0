//! Titanic-style survival prediction with a stacked ensemble.
//!
//! This demo:
//! - Generates a synthetic passenger table with missing ages
//! - Imputes missing values, then holds out 20% of the rows
//! - Tunes a decision tree, k-NN and logistic regression on stratified folds
//! - Stacks their out-of-fold predictions under a logistic meta model
//! - Compares every base model against the stack on the holdout rows

use ndarray::{s, Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use stacklearne_rs::dataset::Dataset;
use stacklearne_rs::metrics::{accuracy, roc_auc, Metric};
use stacklearne_rs::preprocessing::{FittedTransformer, ImputeStrategy, SimpleImputer, Transformer};
use stacklearne_rs::stacking::{BaseModelSpec, ModelKind, StackingEnsemble};
use stacklearne_rs::tuning::{ParamRange, StrategyConfig};
use std::error::Error;
use tracing_subscriber::EnvFilter;

/// Synthetic passengers.
///
/// Features (7 total):
/// - Pclass: 1, 2, 3
/// - Sex: 0 = male, 1 = female
/// - Age: years, about 15% missing (NaN)
/// - SibSp, Parch: relatives aboard
/// - Fare: ticket fare, higher in first class
/// - Embarked: 0 = C, 1 = Q, 2 = S
///
/// Survival is more likely for women, children and first class.
fn create_titanic_data(n: usize, seed: u64) -> (Array2<f64>, Array1<f64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut x = Array2::<f64>::zeros((n, 7));
    let mut y = Array1::<f64>::zeros(n);

    for i in 0..n {
        let pclass = rng.random_range(1..=3) as f64;
        let sex = if rng.random::<f64>() < 0.35 { 1.0 } else { 0.0 };
        let age: f64 = rng.random_range(1.0..70.0);
        let sibsp = rng.random_range(0..=3) as f64;
        let parch = rng.random_range(0..=2) as f64;
        let fare = (4.0 - pclass) * rng.random_range(8.0..30.0);
        let embarked = rng.random_range(0..=2) as f64;

        let score = -0.8 + 2.4 * sex - 0.9 * (pclass - 2.0) + if age < 12.0 { 1.2 } else { 0.0 }
            - 0.2 * sibsp;
        let p = 1.0 / (1.0 + (-score).exp());
        y[i] = if rng.random::<f64>() < p { 1.0 } else { 0.0 };

        let age = if rng.random::<f64>() < 0.15 { f64::NAN } else { age };
        x.row_mut(i)
            .assign(&ndarray::arr1(&[pclass, sex, age, sibsp, parch, fare, embarked]));
    }
    (x, y)
}

fn main() -> Result<(), Box<dyn Error>> {
    // RUST_LOG=stacklearne_rs=debug shows every fold and trial
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("stacklearne_rs=info")),
        )
        .init();

    println!("=== Titanic Stacking Example ===\n");

    // 1. Create dataset
    let (x, y) = create_titanic_data(400, 7);
    let missing = x.iter().filter(|v| v.is_nan()).count();
    println!(
        "Dataset: {} samples, {} features, {} missing cells",
        x.nrows(),
        x.ncols(),
        missing
    );

    // 2. Impute (statistics from the training part only) and split 80/20
    let n_train = x.nrows() * 4 / 5;
    let imputer = SimpleImputer::new(ImputeStrategy::Median).fit(x.slice(s![..n_train, ..]))?;
    println!("Imputed Age with median {:.1}", imputer.statistics()[2]);
    let x = imputer.transform(x.view())?;

    let train = Dataset::new(
        x.slice(s![..n_train, ..]).to_owned(),
        y.slice(s![..n_train]).to_owned(),
    )?;
    let holdout_y = y.slice(s![n_train..]).to_owned();
    let test = Dataset::unlabeled(x.slice(s![n_train.., ..]).to_owned())?;
    println!(
        "Train: {} samples, Holdout: {} samples\n",
        train.n_samples(),
        test.n_samples()
    );

    // 3. Configure the stack
    let ensemble = StackingEnsemble::builder()
        .base_model(
            BaseModelSpec::new("tree", ModelKind::Tree)
                .search("max_depth", ParamRange::integer(2.0, 7.0))
                .search("min_samples_leaf", ParamRange::integer(1.0, 15.0)),
        )
        .base_model(
            BaseModelSpec::new("knn", ModelKind::Knn)
                .search("k", ParamRange::integer(3.0, 40.0))
                .search("distance_weighted", ParamRange::integer(0.0, 1.0)),
        )
        .base_model(
            BaseModelSpec::new("logistic", ModelKind::Logistic)
                .param("max_epochs", 300.0)
                .search("learning_rate", ParamRange::log(0.005, 0.2))
                .search("l2", ParamRange::log(1e-4, 1e-1)),
        )
        .meta_model(BaseModelSpec::new("meta", ModelKind::Logistic).param("l2", 0.01))
        .folds(5)
        .metric(Metric::RocAuc)
        .n_trials(12)
        .strategy(StrategyConfig::LatinHypercube)
        .seed(42)
        .parallel(true)
        .build()?;

    // 4. Fit: tuning, out-of-fold features, meta model
    println!("--- Fitting stacked ensemble ---\n");
    let outcome = ensemble.fit(&train, &test)?;

    for report in &outcome.base_reports {
        println!(
            "{:<9} cv roc_auc = {:.4}  oof roc_auc = {:.4}  params = {:?}",
            report.name,
            report.tuning.best_score(),
            report.oof_score.unwrap_or(f64::NAN),
            report.tuning.best_params()
        );
    }
    println!(
        "\nMeta-features: train {:?}, test {:?}",
        outcome.meta_train.dim(),
        outcome.meta_test.dim()
    );

    // 5. Holdout comparison
    println!("\n--- Holdout evaluation ---\n");
    for (j, name) in outcome.column_names().iter().enumerate() {
        let column = outcome.meta_test.column(j);
        println!(
            "{:<9} roc_auc = {:.4}  accuracy = {:.4}",
            name,
            roc_auc(holdout_y.view(), column).unwrap_or(f64::NAN),
            accuracy(holdout_y.view(), column)
        );
    }
    println!(
        "{:<9} roc_auc = {:.4}  accuracy = {:.4}",
        "stack",
        roc_auc(holdout_y.view(), outcome.predictions.view()).unwrap_or(f64::NAN),
        accuracy(holdout_y.view(), outcome.predictions.view())
    );

    Ok(())
}
