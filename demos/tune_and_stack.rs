//! Tuning a single model, then running a full stack from a TOML config.
//!
//! This demo:
//! - Tunes a k-NN regressor by grid search and prints every trial
//! - Builds out-of-fold features sequentially and in parallel and checks they agree
//! - Runs a TOML-configured stack with a tuned meta model and writes reports
//! - Persists the best base model and reloads it

use ndarray::{s, Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use stacklearne_rs::config::StackingConfig;
use stacklearne_rs::dataset::Dataset;
use stacklearne_rs::metrics::Metric;
use stacklearne_rs::model::{DecisionTree, Estimator, FittedDecisionTree, KNeighbors, Predictor};
use stacklearne_rs::oof::OutOfFold;
use stacklearne_rs::partition::KFold;
use stacklearne_rs::serialization::PersistentModel;
use stacklearne_rs::tuning::{GridSearch, ParamRange, SearchSpace, Tuner, TuningReport};
use std::error::Error;
use tracing_subscriber::EnvFilter;
use std::time::Instant;

const CONFIG: &str = r#"
folds = 4
stratified = false
metric = "rmse"
n_trials = 8
seed = 3

[strategy]
kind = "random"

[[base_models]]
name = "tree"
kind = "tree"
search.max_depth = { low = 2, high = 8, integer = true }

[[base_models]]
name = "knn"
kind = "knn"
search.k = { low = 2, high = 25, integer = true }

[[base_models]]
name = "ridge"
kind = "linear"
params = { max_epochs = 300 }
search.l2 = { low = 0.0001, high = 1.0, log_scale = true }

[meta_model]
kind = "linear"
search.l2 = { low = 0.0001, high = 0.1, log_scale = true }
"#;

/// y = sin(x0) * 3 + x1^2 / 4 + noise, with two irrelevant columns.
fn create_regression_data(n: usize, seed: u64) -> (Array2<f64>, Array1<f64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let x: Array2<f64> = Array2::from_shape_fn((n, 4), |_| rng.random_range(-3.0..3.0));
    let y = x
        .rows()
        .into_iter()
        .map(|r| 3.0 * r[0].sin() + r[1] * r[1] / 4.0 + rng.random_range(-0.3..0.3))
        .collect();
    (x, y)
}

fn main() -> Result<(), Box<dyn Error>> {
    // RUST_LOG=stacklearne_rs=debug shows every fold and trial
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("stacklearne_rs=info")),
        )
        .init();

    println!("=== Tune and Stack Example ===\n");

    let (x, y) = create_regression_data(500, 11);
    let n_train = 400;
    let x_train = x.slice(s![..n_train, ..]);
    let y_train = y.slice(s![..n_train]);
    let x_test = x.slice(s![n_train.., ..]);

    // ============================================================
    // 1. TUNE ONE MODEL
    // ============================================================

    println!("--- Grid search over k for k-NN ---\n");
    let partition = KFold::new(5).shuffle(true).seed(1).split_indices(n_train)?;
    let space = SearchSpace::new().with("k", ParamRange::integer(1.0, 31.0));
    let report = Tuner::new(space, Metric::Rmse)
        .n_trials(7)
        .named("knn")
        .tune(
            KNeighbors::from_params,
            &mut GridSearch::new(7),
            &partition,
            x_train,
            y_train,
        )?;
    for trial in &report.trials {
        println!(
            "trial {}: k = {:>4}  rmse = {:.4}",
            trial.index,
            trial.params.get("k").unwrap_or(f64::NAN),
            trial.score.unwrap_or(f64::NAN)
        );
    }
    println!("best: {:?} (rmse {:.4})\n", report.best_params(), report.best_score());

    // ============================================================
    // 2. OUT-OF-FOLD FEATURES, SEQUENTIAL VS PARALLEL
    // ============================================================

    println!("--- Out-of-fold generation ---\n");
    let knn = KNeighbors::from_params(report.best_params())?;
    let models = [knn.clone(), KNeighbors::new(3), KNeighbors::new(15)];

    let start = Instant::now();
    let sequential = OutOfFold::new(partition.clone()).stack(&models, x_train, y_train, x_test)?;
    let t_seq = start.elapsed();

    let start = Instant::now();
    let parallel = OutOfFold::new(partition.clone())
        .parallel(true)
        .stack(&models, x_train, y_train, x_test)?;
    let t_par = start.elapsed();

    println!("meta-train {:?}, meta-test {:?}", sequential.train.dim(), sequential.test.dim());
    println!("sequential {:?}, parallel {:?}", t_seq, t_par);
    println!("identical: {}\n", sequential == parallel);

    // ============================================================
    // 3. CONFIGURED STACK
    // ============================================================

    println!("--- Stack from TOML config ---\n");
    let report_dir = std::env::temp_dir().join("stacklearne-demo-reports");
    let mut config = StackingConfig::from_toml_str(CONFIG)?;
    config.output_dir = Some(report_dir.clone());

    let train = Dataset::new(x_train.to_owned(), y_train.to_owned())?;
    let test = Dataset::unlabeled(x_test.to_owned())?;
    let outcome = config.ensemble()?.fit(&train, &test)?;

    for report in &outcome.base_reports {
        println!(
            "{:<6} cv rmse = {:.4}  oof rmse = {:.4}",
            report.name,
            report.tuning.best_score(),
            report.oof_score.unwrap_or(f64::NAN)
        );
    }
    println!("meta params: {:?}", outcome.meta_params);

    let y_holdout = y.slice(s![n_train..]);
    println!(
        "holdout rmse: stack = {:.4}",
        Metric::Rmse.score(y_holdout, outcome.predictions.view())?
    );

    let reloaded = TuningReport::load_json(report_dir.join("tree.tuning.json"))?;
    println!(
        "reloaded {} report: {} trials, best {:?}\n",
        reloaded.model,
        reloaded.trials.len(),
        reloaded.best_params()
    );

    // ============================================================
    // 4. PERSIST THE BEST TREE
    // ============================================================

    println!("--- Model persistence ---\n");
    let tree = DecisionTree::from_params(reloaded.best_params())?;
    let fitted = tree.fit(x_train, y_train)?;
    let path = report_dir.join("tree.bin");
    fitted.save_to_file(&path)?;
    let loaded = FittedDecisionTree::load_from_file(&path)?;
    println!(
        "saved {} nodes (depth {}) to {}; predictions match: {}",
        loaded.nodes().len(),
        loaded.depth(),
        path.display(),
        loaded.predict(x_test)? == fitted.predict(x_test)?
    );

    Ok(())
}
