//! Two-level stacking: tuned base models, out-of-fold meta-features, and a
//! second-level model fitted on them.
//!
//! [`StackingEnsemble::fit`] runs the whole pipeline on one labeled training
//! set and one test set:
//!
//! 1. split the training rows into folds (stratified by label if requested);
//! 2. tune every base model by cross-validated search on those folds;
//! 3. generate out-of-fold meta-features with each model's best parameters;
//! 4. fit the meta model on the meta-train matrix and predict meta-test.
//!
//! The same partition is used for tuning and for meta-feature generation, so
//! every base model is scored and stacked on identical folds.
//!
//! # Example
//!
//! ```rust
//! use stacklearne_rs::dataset::Dataset;
//! use stacklearne_rs::stacking::{BaseModelSpec, ModelKind, StackingEnsemble};
//! use stacklearne_rs::tuning::ParamRange;
//! use ndarray::{Array1, Array2};
//!
//! let x = Array2::from_shape_fn((60, 2), |(i, j)| (i * (j + 1)) as f64 % 17.0);
//! let y = Array1::from_shape_fn(60, |i| ((i * 2) % 17 > 8) as u8 as f64);
//! let train = Dataset::new(x.clone(), y).unwrap();
//! let test = Dataset::unlabeled(x.slice(ndarray::s![..10, ..]).to_owned()).unwrap();
//!
//! let ensemble = StackingEnsemble::builder()
//!     .base_model(
//!         BaseModelSpec::new("tree", ModelKind::Tree)
//!             .search("max_depth", ParamRange::integer(1.0, 4.0)),
//!     )
//!     .base_model(BaseModelSpec::new("knn", ModelKind::Knn).param("k", 5.0))
//!     .folds(3)
//!     .n_trials(3)
//!     .build()
//!     .unwrap();
//!
//! let outcome = ensemble.fit(&train, &test).unwrap();
//! assert_eq!(outcome.meta_train.dim(), (60, 2));
//! assert_eq!(outcome.predictions.len(), 10);
//! ```

use crate::dataset::Dataset;
use crate::error::{ModelError, Result, StackingError};
use crate::metrics::Metric;
use crate::model::{
    BoxedEstimator, DecisionTree, Estimator, KNeighbors, LinearRegression, LogisticRegression,
    Predictor,
};
use crate::oof::{MetaFeatures, OutOfFold};
use crate::partition::{FoldPartition, KFold, Splitter, StratifiedKFold};
use crate::tuning::{
    ParamRange, ParamSet, SearchSpace, StrategyConfig, Tuner, TuningReport,
};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Built-in model families available to configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Linear,
    Logistic,
    Knn,
    Tree,
}

impl ModelKind {
    /// Builds an estimator of this kind from hyper-parameters.
    pub fn build(&self, params: &ParamSet) -> std::result::Result<BoxedEstimator, ModelError> {
        Ok(match self {
            ModelKind::Linear => BoxedEstimator::new(LinearRegression::from_params(params)?),
            ModelKind::Logistic => BoxedEstimator::new(LogisticRegression::from_params(params)?),
            ModelKind::Knn => BoxedEstimator::new(KNeighbors::from_params(params)?),
            ModelKind::Tree => BoxedEstimator::new(DecisionTree::from_params(params)?),
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Linear => "linear",
            ModelKind::Logistic => "logistic",
            ModelKind::Knn => "knn",
            ModelKind::Tree => "tree",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named model: its kind, fixed parameters, and the ranges to tune.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BaseModelSpec {
    pub name: String,
    pub kind: ModelKind,
    #[serde(default)]
    pub params: ParamSet,
    #[serde(default)]
    pub search: SearchSpace,
}

impl BaseModelSpec {
    pub fn new(name: impl Into<String>, kind: ModelKind) -> Self {
        Self {
            name: name.into(),
            kind,
            params: ParamSet::new(),
            search: SearchSpace::new(),
        }
    }

    /// Fixes a parameter. Tuned values for the same name take precedence.
    pub fn param(mut self, name: impl Into<String>, value: f64) -> Self {
        self.params.insert(name, value);
        self
    }

    /// Adds a tuned parameter range.
    pub fn search(mut self, name: impl Into<String>, range: ParamRange) -> Self {
        self.search = self.search.with(name, range);
        self
    }

    /// Estimator with the fixed parameters overlaid by `tuned`.
    pub fn build(&self, tuned: &ParamSet) -> std::result::Result<BoxedEstimator, ModelError> {
        Ok(self
            .kind
            .build(&self.params.merged(tuned))?
            .named(self.name.clone()))
    }
}

/// Per-base-model results of a stacking run.
#[derive(Debug, Clone)]
pub struct BaseModelReport {
    pub name: String,
    pub tuning: TuningReport,
    /// Metric of the out-of-fold column against the training labels. `None`
    /// if the metric is undefined for these labels.
    pub oof_score: Option<f64>,
}

/// Everything produced by [`StackingEnsemble::fit`].
#[derive(Debug, Clone)]
pub struct StackingOutcome {
    /// Out-of-fold predictions, one column per base model.
    pub meta_train: Array2<f64>,
    /// Fold-averaged test predictions, same column order.
    pub meta_test: Array2<f64>,
    pub base_reports: Vec<BaseModelReport>,
    /// Meta-model predictions for the test rows.
    pub predictions: Array1<f64>,
    /// Parameters the meta model was fitted with.
    pub meta_params: ParamSet,
    /// Present when the meta model had a search space.
    pub meta_report: Option<TuningReport>,
}

impl StackingOutcome {
    /// Meta-feature column names, in column order.
    pub fn column_names(&self) -> Vec<&str> {
        self.base_reports.iter().map(|r| r.name.as_str()).collect()
    }

    /// Best tuned parameters of the named base model.
    pub fn best_params(&self, model: &str) -> Option<&ParamSet> {
        self.base_reports
            .iter()
            .find(|r| r.name == model)
            .map(|r| r.tuning.best_params())
    }
}

/// Configured two-level stacking pipeline. Create one with [`StackingEnsemble::builder`].
pub struct StackingEnsemble {
    base_models: Vec<BaseModelSpec>,
    meta_model: BaseModelSpec,
    splitter: Option<Box<dyn Splitter + Send + Sync>>,
    folds: usize,
    stratified: bool,
    shuffle: bool,
    seed: u64,
    metric: Metric,
    n_trials: usize,
    strategy: StrategyConfig,
    parallel: bool,
    output_dir: Option<PathBuf>,
}

impl fmt::Debug for StackingEnsemble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackingEnsemble")
            .field("base_models", &self.base_models)
            .field("meta_model", &self.meta_model)
            .field("custom_splitter", &self.splitter.is_some())
            .field("folds", &self.folds)
            .field("stratified", &self.stratified)
            .field("metric", &self.metric)
            .field("n_trials", &self.n_trials)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

impl StackingEnsemble {
    pub fn builder() -> StackingBuilder {
        StackingBuilder::default()
    }

    pub fn base_models(&self) -> &[BaseModelSpec] {
        &self.base_models
    }

    pub fn meta_model(&self) -> &BaseModelSpec {
        &self.meta_model
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Fold partition of the training set.
    pub fn partition(&self, train: &Dataset) -> Result<FoldPartition> {
        if let Some(splitter) = &self.splitter {
            return splitter.split(train);
        }
        if self.stratified {
            StratifiedKFold::new(self.folds)
                .shuffle(self.shuffle)
                .seed(self.seed)
                .split(train)
        } else {
            KFold::new(self.folds)
                .shuffle(self.shuffle)
                .seed(self.seed)
                .split(train)
        }
    }

    /// Tunes, stacks and fits the meta model.
    ///
    /// # Errors
    /// - [`StackingError::EmptyData`] if `train` has no labels.
    /// - [`StackingError::ShapeMismatch`] if train and test column counts differ.
    /// - [`StackingError::Model`] if either set contains missing values, or a
    ///   model rejects its parameters.
    /// - Any tuning or out-of-fold error, unchanged. Nothing is returned for
    ///   partially completed runs.
    pub fn fit(&self, train: &Dataset, test: &Dataset) -> Result<StackingOutcome> {
        let y = train.require_labels()?;
        let x = train.features();
        let x_test = test.features();
        if x_test.ncols() != x.ncols() {
            return Err(StackingError::ShapeMismatch {
                context: "test feature columns",
                expected: x.ncols(),
                got: x_test.ncols(),
            });
        }
        check_finite("training", x)?;
        check_finite("test", x_test)?;
        check_finite_labels(y)?;

        if let Some(dir) = &self.output_dir {
            fs::create_dir_all(dir)?;
        }

        let oof = OutOfFold::new(self.partition(train)?).parallel(self.parallel);
        info!(
            base_models = self.base_models.len(),
            folds = oof.partition().n_folds(),
            n_train = x.nrows(),
            n_test = x_test.nrows(),
            metric = %self.metric,
            "stacking"
        );

        let mut parts = Vec::with_capacity(self.base_models.len());
        let mut base_reports = Vec::with_capacity(self.base_models.len());
        for spec in &self.base_models {
            let tuning = self.tune(spec, oof.partition(), x, y)?;
            let estimator = spec.build(tuning.best_params())?;
            let meta = oof.generate(&estimator, x, y, x_test)?;

            let oof_score = self.metric.score(y, meta.train.column(0)).ok();
            info!(
                model = %spec.name,
                cv_score = tuning.best_score(),
                oof_score = oof_score.unwrap_or(f64::NAN),
                "base model stacked"
            );
            parts.push(meta);
            base_reports.push(BaseModelReport {
                name: spec.name.clone(),
                tuning,
                oof_score,
            });
        }
        let MetaFeatures { train: meta_train, test: meta_test } = MetaFeatures::hstack(&parts)?;

        let (meta_params, meta_report) = if self.meta_model.search.is_empty() {
            (ParamSet::new(), None)
        } else {
            let report = self.tune(&self.meta_model, oof.partition(), meta_train.view(), y)?;
            (report.best_params().clone(), Some(report))
        };
        let meta_estimator = self.meta_model.build(&meta_params)?;
        let predictions = meta_estimator
            .fit(meta_train.view(), y)?
            .predict(meta_test.view())?;
        let meta_params = self.meta_model.params.merged(&meta_params);
        info!(
            model = %self.meta_model.name,
            params = ?meta_params,
            "meta model fitted"
        );

        Ok(StackingOutcome {
            meta_train,
            meta_test,
            base_reports,
            predictions,
            meta_params,
            meta_report,
        })
    }

    fn tune(
        &self,
        spec: &BaseModelSpec,
        partition: &FoldPartition,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
    ) -> Result<TuningReport> {
        let mut strategy = self.strategy.build(self.seed, self.n_trials);
        let report = Tuner::new(spec.search.clone(), self.metric)
            .n_trials(self.n_trials)
            .named(spec.name.clone())
            .tune(|p| spec.build(p), &mut *strategy, partition, x, y)?;

        if report.n_failed() > 0 {
            warn!(
                model = %spec.name,
                failed = report.n_failed(),
                trials = report.trials.len(),
                "some tuning trials failed"
            );
        }
        if let Some(dir) = &self.output_dir {
            let path = report_path(dir, &spec.name);
            report.save_json(&path)?;
            info!(path = %path.display(), "tuning report written");
        }
        Ok(report)
    }
}

/// `<dir>/<model>.tuning.json`
pub fn report_path(dir: &Path, model: &str) -> PathBuf {
    dir.join(format!("{}.tuning.json", model))
}

fn check_finite_labels(y: ArrayView1<'_, f64>) -> Result<()> {
    match y.iter().position(|v| !v.is_finite()) {
        Some(row) => Err(ModelError::InvalidInput(format!(
            "training labels contain a missing or non-finite value at row {}",
            row
        ))
        .into()),
        None => Ok(()),
    }
}

fn check_finite(which: &str, x: ArrayView2<'_, f64>) -> Result<()> {
    match x.indexed_iter().find(|(_, v)| !v.is_finite()) {
        Some(((row, col), _)) => Err(ModelError::InvalidInput(format!(
            "{} features contain a missing or non-finite value at row {}, column {}; impute first",
            which, row, col
        ))
        .into()),
        None => Ok(()),
    }
}

/// Builder for [`StackingEnsemble`].
///
/// Defaults: 5 stratified, shuffled folds with seed 0, ROC AUC, 10 trials
/// per model, Latin hypercube search, logistic meta model.
pub struct StackingBuilder {
    base_models: Vec<BaseModelSpec>,
    meta_model: BaseModelSpec,
    splitter: Option<Box<dyn Splitter + Send + Sync>>,
    folds: usize,
    stratified: bool,
    shuffle: bool,
    seed: u64,
    metric: Metric,
    n_trials: usize,
    strategy: StrategyConfig,
    parallel: bool,
    output_dir: Option<PathBuf>,
}

impl Default for StackingBuilder {
    fn default() -> Self {
        Self {
            base_models: Vec::new(),
            meta_model: BaseModelSpec::new("meta", ModelKind::Logistic),
            splitter: None,
            folds: 5,
            stratified: true,
            shuffle: true,
            seed: 0,
            metric: Metric::default(),
            n_trials: 10,
            strategy: StrategyConfig::default(),
            parallel: false,
            output_dir: None,
        }
    }
}

impl StackingBuilder {
    pub fn base_model(mut self, spec: BaseModelSpec) -> Self {
        self.base_models.push(spec);
        self
    }

    pub fn base_models(mut self, specs: impl IntoIterator<Item = BaseModelSpec>) -> Self {
        self.base_models.extend(specs);
        self
    }

    pub fn meta_model(mut self, spec: BaseModelSpec) -> Self {
        self.meta_model = spec;
        self
    }

    /// Custom fold assignment. Overrides `folds`, `stratified`, `shuffle` and `seed`
    /// for partitioning (the seed still drives the search strategy).
    pub fn splitter(mut self, splitter: impl Splitter + Send + Sync + 'static) -> Self {
        self.splitter = Some(Box::new(splitter));
        self
    }

    pub fn folds(mut self, folds: usize) -> Self {
        self.folds = folds;
        self
    }

    pub fn stratified(mut self, stratified: bool) -> Self {
        self.stratified = stratified;
        self
    }

    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    pub fn n_trials(mut self, n_trials: usize) -> Self {
        self.n_trials = n_trials;
        self
    }

    pub fn strategy(mut self, strategy: StrategyConfig) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Directory for `<model>.tuning.json` reports; created on fit.
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// # Errors
    /// [`StackingError::InvalidParameter`] for no base models, duplicate
    /// model names (a base model may not reuse the meta model's name), fewer
    /// than 2 folds, zero trials, or a malformed search
    /// space.
    pub fn build(self) -> Result<StackingEnsemble> {
        if self.base_models.is_empty() {
            return Err(StackingError::invalid_parameter(
                "base_models",
                "at least one base model is required",
            ));
        }
        // names key the report files, the meta model's included
        let mut seen = HashSet::new();
        for spec in &self.base_models {
            if spec.name == self.meta_model.name {
                return Err(StackingError::invalid_parameter(
                    "base_models",
                    format!("model name '{}' is taken by the meta model", spec.name),
                ));
            }
            if !seen.insert(spec.name.as_str()) {
                return Err(StackingError::invalid_parameter(
                    "base_models",
                    format!("duplicate model name '{}'", spec.name),
                ));
            }
        }
        if self.splitter.is_none() && self.folds < 2 {
            return Err(StackingError::invalid_parameter(
                "folds",
                format!("must be >= 2, got {}", self.folds),
            ));
        }
        if self.n_trials == 0 {
            return Err(StackingError::invalid_parameter("n_trials", "must be >= 1"));
        }
        for spec in self.base_models.iter().chain(std::iter::once(&self.meta_model)) {
            spec.search.validate().map_err(|reason| {
                StackingError::invalid_parameter(format!("{}.search", spec.name), reason)
            })?;
        }

        Ok(StackingEnsemble {
            base_models: self.base_models,
            meta_model: self.meta_model,
            splitter: self.splitter,
            folds: self.folds,
            stratified: self.stratified,
            shuffle: self.shuffle,
            seed: self.seed,
            metric: self.metric,
            n_trials: self.n_trials,
            strategy: self.strategy,
            parallel: self.parallel,
            output_dir: self.output_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::s;

    /// Two well separated blobs; odd rows are class 1.
    fn blobs(n: usize) -> (Dataset, Dataset) {
        let x = Array2::from_shape_fn((n, 2), |(i, j)| {
            let centre = if i % 2 == 1 { 5.0 } else { 0.0 };
            centre + ((i * (j + 3)) % 7) as f64 * 0.1
        });
        let y = Array1::from_shape_fn(n, |i| (i % 2) as f64);
        let test = x.slice(s![..10, ..]).to_owned();
        (
            Dataset::new(x, y).unwrap(),
            Dataset::unlabeled(test).unwrap(),
        )
    }

    fn ensemble() -> StackingBuilder {
        StackingEnsemble::builder()
            .base_model(
                BaseModelSpec::new("tree", ModelKind::Tree)
                    .search("max_depth", ParamRange::integer(1.0, 3.0)),
            )
            .base_model(
                BaseModelSpec::new("knn", ModelKind::Knn)
                    .search("k", ParamRange::integer(1.0, 7.0)),
            )
            .folds(4)
            .n_trials(3)
            .seed(11)
    }

    #[test]
    fn test_fit_produces_aligned_outputs() {
        let (train, test) = blobs(40);
        let outcome = ensemble().build().unwrap().fit(&train, &test).unwrap();

        assert_eq!(outcome.meta_train.dim(), (40, 2));
        assert_eq!(outcome.meta_test.dim(), (10, 2));
        assert_eq!(outcome.predictions.len(), 10);
        assert_eq!(outcome.column_names(), vec!["tree", "knn"]);
        assert!(outcome.best_params("tree").unwrap().get("max_depth").is_some());
        assert!(outcome.best_params("missing").is_none());
        assert!(outcome.meta_report.is_none());

        // blobs are separable: every base model scores perfectly
        for report in &outcome.base_reports {
            assert_eq!(report.tuning.best_score(), 1.0);
            assert_eq!(report.oof_score, Some(1.0));
        }
        // meta predictions are probabilities ordered like the labels
        for (i, &p) in outcome.predictions.iter().enumerate() {
            assert!((0.0..=1.0).contains(&p));
            assert_eq!(p >= 0.5, i % 2 == 1);
        }
    }

    #[test]
    fn test_meta_model_can_be_tuned() {
        let (train, test) = blobs(40);
        let outcome = ensemble()
            .meta_model(
                BaseModelSpec::new("meta_tree", ModelKind::Tree)
                    .param("min_samples_leaf", 2.0)
                    .search("max_depth", ParamRange::integer(1.0, 2.0)),
            )
            .metric(Metric::Accuracy)
            .build()
            .unwrap()
            .fit(&train, &test)
            .unwrap();

        let report = outcome.meta_report.as_ref().unwrap();
        assert_eq!(report.model, "meta_tree");
        assert_eq!(outcome.meta_params.get("min_samples_leaf"), Some(2.0));
        assert!(outcome.meta_params.get("max_depth").is_some());
    }

    #[test]
    fn test_reports_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("reports");
        let (train, test) = blobs(40);

        let outcome = ensemble().output_dir(&out).build().unwrap().fit(&train, &test).unwrap();

        for name in ["tree", "knn"] {
            let loaded = TuningReport::load_json(report_path(&out, name)).unwrap();
            assert_eq!(loaded.model, name);
            assert_eq!(Some(loaded.best_params()), outcome.best_params(name));
        }
    }

    #[test]
    fn test_plain_kfold_and_custom_splitter_agree() {
        let (train, test) = blobs(40);
        let kfold = ensemble()
            .metric(Metric::Accuracy)
            .stratified(false)
            .build()
            .unwrap()
            .fit(&train, &test)
            .unwrap();
        let custom = ensemble()
            .metric(Metric::Accuracy)
            .splitter(KFold::new(4).shuffle(true).seed(11))
            .build()
            .unwrap()
            .fit(&train, &test)
            .unwrap();
        assert_eq!(kfold.meta_train, custom.meta_train);
        assert_eq!(kfold.predictions, custom.predictions);
    }

    #[test]
    fn test_builder_validation() {
        assert!(matches!(
            StackingEnsemble::builder().build(),
            Err(StackingError::InvalidParameter { .. })
        ));
        assert!(matches!(
            ensemble().folds(1).build(),
            Err(StackingError::InvalidParameter { .. })
        ));
        assert!(matches!(
            ensemble().n_trials(0).build(),
            Err(StackingError::InvalidParameter { .. })
        ));
        assert!(matches!(
            ensemble()
                .base_model(BaseModelSpec::new("tree", ModelKind::Linear))
                .build(),
            Err(StackingError::InvalidParameter { .. })
        ));
        assert!(matches!(
            ensemble()
                .base_model(
                    BaseModelSpec::new("lr", ModelKind::Logistic)
                        .search("learning_rate", ParamRange::log(-1.0, 1.0))
                )
                .build(),
            Err(StackingError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_base_model_cannot_share_meta_name() {
        let clash = ensemble()
            .base_model(
                BaseModelSpec::new("meta", ModelKind::Tree)
                    .search("max_depth", ParamRange::integer(1.0, 4.0)),
            )
            .meta_model(
                BaseModelSpec::new("meta", ModelKind::Knn)
                    .search("k", ParamRange::integer(1.0, 9.0)),
            )
            .build();
        match clash {
            Err(StackingError::InvalidParameter { reason, .. }) => {
                assert!(reason.contains("meta model"), "{}", reason)
            }
            other => panic!("expected InvalidParameter, got {:?}", other),
        }

        // renaming the meta model keeps both reports apart
        let dir = tempfile::tempdir().unwrap();
        let (train, test) = blobs(40);
        let outcome = ensemble()
            .base_model(
                BaseModelSpec::new("meta", ModelKind::Tree)
                    .search("max_depth", ParamRange::integer(1.0, 4.0)),
            )
            .meta_model(
                BaseModelSpec::new("stacker", ModelKind::Knn)
                    .search("k", ParamRange::integer(1.0, 9.0)),
            )
            .n_trials(2)
            .output_dir(dir.path())
            .build()
            .unwrap()
            .fit(&train, &test)
            .unwrap();
        let base = TuningReport::load_json(report_path(dir.path(), "meta")).unwrap();
        assert!(base.best_params().get("max_depth").is_some());
        let meta = TuningReport::load_json(report_path(dir.path(), "stacker")).unwrap();
        assert!(meta.best_params().get("k").is_some());
        assert!(outcome.meta_report.is_some());
    }

    #[test]
    fn test_fit_rejects_bad_inputs() {
        let (train, _) = blobs(40);
        let ensemble = ensemble().build().unwrap();

        let narrow = Dataset::unlabeled(Array2::zeros((3, 1))).unwrap();
        assert!(matches!(
            ensemble.fit(&train, &narrow),
            Err(StackingError::ShapeMismatch { .. })
        ));

        let unlabeled = Dataset::unlabeled(train.features().to_owned()).unwrap();
        assert!(ensemble.fit(&unlabeled, &unlabeled).is_err());

        let mut x = train.features().to_owned();
        x[[3, 1]] = f64::NAN;
        let gappy = Dataset::new(x, train.labels().unwrap().to_owned()).unwrap();
        assert!(matches!(
            ensemble.fit(&gappy, &narrow),
            Err(StackingError::ShapeMismatch { .. })
        ));
        let test = Dataset::unlabeled(Array2::zeros((3, 2))).unwrap();
        assert!(matches!(
            ensemble.fit(&gappy, &test),
            Err(StackingError::Model(ModelError::InvalidInput(_)))
        ));

        // an empty target cell is reported up front, not as failed trials
        let mut y = train.labels().unwrap().to_owned();
        y[5] = f64::NAN;
        let missing_label = Dataset::new(train.features().to_owned(), y).unwrap();
        match ensemble.fit(&missing_label, &test) {
            Err(StackingError::Model(ModelError::InvalidInput(msg))) => {
                assert!(msg.contains("labels") && msg.contains("row 5"), "{}", msg)
            }
            other => panic!("expected InvalidInput, got {:?}", other.map(|o| o.predictions)),
        }
    }

    #[test]
    fn test_model_kind_builds_and_rejects() {
        let tree = ModelKind::Tree.build(&ParamSet::new().with("max_depth", 2.0)).unwrap();
        assert_eq!(tree.name(), "tree");
        assert!(ModelKind::Knn.build(&ParamSet::new().with("max_depth", 2.0)).is_err());

        let spec = BaseModelSpec::new("deep", ModelKind::Tree).param("max_depth", 1.0);
        assert_eq!(spec.build(&ParamSet::new()).unwrap().name(), "deep");

        let kind: ModelKind = serde_json::from_str("\"logistic\"").unwrap();
        assert_eq!(kind, ModelKind::Logistic);
        assert_eq!(ModelKind::Knn.to_string(), "knn");
    }
}
