//! Hyper-parameter tuning by cross-validated search.
//!
//! A [`Tuner`] repeatedly asks a [`SearchStrategy`] for a [`ParamSet`], builds
//! an estimator from it, and scores the estimator by the mean per-fold
//! validation metric over a [`FoldPartition`]. Every evaluation is recorded
//! as a [`Trial`]; the resulting [`TuningReport`] can be written to and read
//! from JSON so a tuned configuration survives between runs.

use crate::error::{ModelError, Phase, Result, StackingError};
use crate::metrics::Metric;
use crate::model::{Estimator, Predictor};
use crate::partition::FoldPartition;
use crate::serialization::{read_json, write_json};
use ndarray::{ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

mod space;
mod strategy;

pub use space::{ParamRange, ParamSet, SearchSpace};
pub use strategy::{GridSearch, LatinHypercube, RandomSearch, SearchStrategy, StrategyConfig};

/// One evaluated parameter set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub index: usize,
    pub params: ParamSet,
    /// Mean validation score, `None` if the trial failed.
    pub score: Option<f64>,
    /// Per-fold validation scores.
    #[serde(default)]
    pub fold_scores: Vec<f64>,
    /// Failure message for failed trials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// All trials of one tuning run and the best of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningReport {
    pub model: String,
    pub metric: Metric,
    pub trials: Vec<Trial>,
    pub best: Trial,
}

impl TuningReport {
    pub fn best_params(&self) -> &ParamSet {
        &self.best.params
    }

    /// Score of the best trial. Always present: failed trials are never best.
    pub fn best_score(&self) -> f64 {
        self.best.score.unwrap_or(f64::NAN)
    }

    pub fn n_failed(&self) -> usize {
        self.trials.iter().filter(|t| t.score.is_none()).count()
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_json(self, path)
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        read_json(path)
    }
}

fn check_inputs(
    partition: &FoldPartition,
    x: &ArrayView2<'_, f64>,
    y: &ArrayView1<'_, f64>,
) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(StackingError::ShapeMismatch {
            context: "training labels",
            expected: x.nrows(),
            got: y.len(),
        });
    }
    if partition.n_samples() != x.nrows() {
        return Err(StackingError::ShapeMismatch {
            context: "partition rows",
            expected: x.nrows(),
            got: partition.n_samples(),
        });
    }
    partition.validate()
}

/// Validation score of `estimator` on every fold of `partition`.
///
/// # Errors
/// - [`StackingError::ShapeMismatch`] / [`StackingError::IncompletePartition`]
///   for inconsistent inputs, before any fold is fitted.
/// - [`StackingError::PredictorFailure`] if a fold's fit or predict fails.
/// - Any error of [`Metric::score`] (e.g. a single-class validation fold for
///   ROC AUC).
pub fn cross_val_scores<E: Estimator + ?Sized>(
    estimator: &E,
    partition: &FoldPartition,
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, f64>,
    metric: Metric,
) -> Result<Vec<f64>> {
    check_inputs(partition, &x, &y)?;
    partition
        .iter()
        .enumerate()
        .map(|(fold_idx, fold)| {
            let fail = |phase| {
                move |source: ModelError| StackingError::PredictorFailure {
                    fold: fold_idx,
                    phase,
                    source,
                }
            };
            let model = estimator
                .fit(
                    x.select(Axis(0), &fold.train).view(),
                    y.select(Axis(0), &fold.train).view(),
                )
                .map_err(fail(Phase::Fit))?;
            let preds = model
                .predict(x.select(Axis(0), &fold.validation).view())
                .map_err(fail(Phase::Predict))?;
            metric.score(y.select(Axis(0), &fold.validation).view(), preds.view())
        })
        .collect()
}

/// Cross-validated search over a [`SearchSpace`].
#[derive(Debug, Clone)]
pub struct Tuner {
    space: SearchSpace,
    metric: Metric,
    n_trials: usize,
    model: String,
}

impl Tuner {
    /// A tuner running 10 trials, reporting under the name `"model"`.
    pub fn new(space: SearchSpace, metric: Metric) -> Self {
        Self {
            space,
            metric,
            n_trials: 10,
            model: "model".to_string(),
        }
    }

    pub fn n_trials(mut self, n_trials: usize) -> Self {
        self.n_trials = n_trials;
        self
    }

    /// Name recorded in the report and in log events.
    pub fn named(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn space(&self) -> &SearchSpace {
        &self.space
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Runs the search.
    ///
    /// `factory` turns a suggested parameter set into an estimator; a factory
    /// error aborts tuning. A trial whose fit, predict or scoring fails is
    /// recorded with `score = None` and never selected as best. An empty
    /// search space is evaluated exactly once with an empty parameter set.
    ///
    /// # Errors
    /// - [`StackingError::InvalidParameter`] for zero trials or a malformed space.
    /// - [`StackingError::ShapeMismatch`] / [`StackingError::IncompletePartition`]
    ///   for inconsistent inputs, before any trial.
    /// - [`StackingError::Model`] if `factory` rejects a parameter set.
    /// - [`StackingError::NoSuccessfulTrial`] if every trial failed.
    pub fn tune<E, F, S>(
        &self,
        factory: F,
        strategy: &mut S,
        partition: &FoldPartition,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
    ) -> Result<TuningReport>
    where
        E: Estimator,
        F: Fn(&ParamSet) -> std::result::Result<E, ModelError>,
        S: SearchStrategy + ?Sized,
    {
        if self.n_trials == 0 {
            return Err(StackingError::invalid_parameter("n_trials", "must be >= 1"));
        }
        self.space
            .validate()
            .map_err(|reason| StackingError::invalid_parameter("search_space", reason))?;
        check_inputs(partition, &x, &y)?;

        let n_trials = if self.space.is_empty() { 1 } else { self.n_trials };
        info!(
            model = %self.model,
            strategy = strategy.name(),
            n_trials,
            metric = %self.metric,
            "tuning"
        );

        let mut trials: Vec<Trial> = Vec::with_capacity(n_trials);
        for index in 0..n_trials {
            let params = strategy.suggest(&self.space, &trials);

            // deterministic estimators score identically on a repeated point
            let trial = match trials.iter().find(|t| t.params == params) {
                Some(seen) => Trial {
                    index,
                    ..seen.clone()
                },
                None => {
                    let estimator = factory(&params)?;
                    self.evaluate(index, params, &estimator, partition, x, y)
                }
            };

            match (trial.score, &trial.error) {
                (Some(score), _) => debug!(trial = index, score, params = ?trial.params, "trial"),
                (None, Some(err)) => warn!(trial = index, error = %err, "trial failed"),
                (None, None) => {}
            }
            trials.push(trial);
        }

        let best = self
            .select_best(&trials)
            .cloned()
            .ok_or_else(|| StackingError::NoSuccessfulTrial {
                model: self.model.clone(),
                trials: trials.len(),
            })?;
        info!(
            model = %self.model,
            best_score = best.score.unwrap_or(f64::NAN),
            best_params = ?best.params,
            "tuning finished"
        );

        Ok(TuningReport {
            model: self.model.clone(),
            metric: self.metric,
            trials,
            best,
        })
    }

    fn evaluate<E: Estimator>(
        &self,
        index: usize,
        params: ParamSet,
        estimator: &E,
        partition: &FoldPartition,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
    ) -> Trial {
        let (score, fold_scores, error) =
            match cross_val_scores(estimator, partition, x, y, self.metric) {
                Ok(scores) => {
                    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
                    if mean.is_finite() {
                        (Some(mean), scores, None)
                    } else {
                        (None, scores, Some("score is not finite".to_string()))
                    }
                }
                Err(err) => (None, Vec::new(), Some(err.to_string())),
            };
        Trial {
            index,
            params,
            score,
            fold_scores,
            error,
        }
    }

    /// Earliest trial with the best score.
    fn select_best<'a>(&self, trials: &'a [Trial]) -> Option<&'a Trial> {
        let mut best: Option<(&Trial, f64)> = None;
        for trial in trials {
            let Some(score) = trial.score else { continue };
            if best.map_or(true, |(_, b)| self.metric.is_better(score, b)) {
                best = Some((trial, score));
            }
        }
        best.map(|(trial, _)| trial)
    }
}
