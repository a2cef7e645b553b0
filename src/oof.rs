//! Out-of-fold meta-feature generation.
//!
//! For every fold of a [`FoldPartition`] a fresh model is fitted on the
//! fold's training rows. It predicts the fold's validation rows, which are
//! written into the training column at exactly those positions, and the whole
//! test matrix, which becomes one row of a `(folds × ntest)` buffer. Once all
//! folds are done the test column is the mean of that buffer over folds.
//!
//! Because every training row sits in exactly one validation slice, each
//! entry of the training column comes from a model that never saw that row.
//!
//! ```rust
//! use stacklearne_rs::model::LinearRegression;
//! use stacklearne_rs::oof;
//! use stacklearne_rs::partition::KFold;
//! use ndarray::array;
//!
//! let x_train = array![[0.0], [1.0], [2.0], [3.0], [4.0], [5.0]];
//! let y_train = array![0.0, 2.0, 4.0, 6.0, 8.0, 10.0];
//! let x_test = array![[6.0], [7.0]];
//!
//! let partition = KFold::new(3).split_indices(6).unwrap();
//! let meta = oof::generate(
//!     &LinearRegression::new(),
//!     &partition,
//!     x_train.view(),
//!     y_train.view(),
//!     x_test.view(),
//! )
//! .unwrap();
//!
//! assert_eq!(meta.train.dim(), (6, 1));
//! assert_eq!(meta.test.dim(), (2, 1));
//! ```

use crate::error::{Phase, Result, StackingError};
use crate::model::{Estimator, Predictor};
use crate::partition::{Fold, FoldPartition};
use ndarray::{concatenate, Array1, Array2, ArrayView1, ArrayView2, Axis};
use tracing::debug;

/// Meta-feature columns produced for one or more base models.
#[derive(Debug, Clone, PartialEq)]
pub struct MetaFeatures {
    /// Out-of-fold predictions, `(ntrain, n_models)`.
    pub train: Array2<f64>,
    /// Fold-averaged test predictions, `(ntest, n_models)`.
    pub test: Array2<f64>,
}

impl MetaFeatures {
    /// Number of meta-feature columns.
    pub fn n_columns(&self) -> usize {
        self.train.ncols()
    }

    /// Concatenates meta-features column-wise, preserving order.
    ///
    /// # Errors
    /// [`StackingError::EmptyData`] for an empty slice and
    /// [`StackingError::ShapeMismatch`] if row counts disagree.
    pub fn hstack(parts: &[MetaFeatures]) -> Result<MetaFeatures> {
        let first = parts
            .first()
            .ok_or_else(|| StackingError::EmptyData("no meta-features to stack".into()))?;
        for part in parts {
            if part.train.nrows() != first.train.nrows() {
                return Err(StackingError::ShapeMismatch {
                    context: "meta-feature train rows",
                    expected: first.train.nrows(),
                    got: part.train.nrows(),
                });
            }
            if part.test.nrows() != first.test.nrows() {
                return Err(StackingError::ShapeMismatch {
                    context: "meta-feature test rows",
                    expected: first.test.nrows(),
                    got: part.test.nrows(),
                });
            }
        }

        let train: Vec<_> = parts.iter().map(|p| p.train.view()).collect();
        let test: Vec<_> = parts.iter().map(|p| p.test.view()).collect();
        let concat_error = |e: ndarray::ShapeError| {
            StackingError::invalid_parameter("meta_features", e.to_string())
        };
        Ok(MetaFeatures {
            train: concatenate(Axis(1), &train).map_err(concat_error)?,
            test: concatenate(Axis(1), &test).map_err(concat_error)?,
        })
    }
}

/// Rejects inconsistent shapes and non-exact-cover partitions before any fit.
fn check_inputs(
    partition: &FoldPartition,
    x_train: &ArrayView2<'_, f64>,
    y_train: &ArrayView1<'_, f64>,
    x_test: &ArrayView2<'_, f64>,
) -> Result<()> {
    if x_train.nrows() != y_train.len() {
        return Err(StackingError::ShapeMismatch {
            context: "training labels",
            expected: x_train.nrows(),
            got: y_train.len(),
        });
    }
    if partition.n_samples() != x_train.nrows() {
        return Err(StackingError::ShapeMismatch {
            context: "partition rows",
            expected: x_train.nrows(),
            got: partition.n_samples(),
        });
    }
    if x_test.ncols() != x_train.ncols() {
        return Err(StackingError::ShapeMismatch {
            context: "test feature columns",
            expected: x_train.ncols(),
            got: x_test.ncols(),
        });
    }
    partition.validate()
}

/// Predictions of one fold's model: validation rows, then the whole test set.
struct FoldOutput {
    validation: Array1<f64>,
    test: Array1<f64>,
}

fn checked_predict<P: Predictor>(
    model: &P,
    x: ArrayView2<'_, f64>,
    fold: usize,
) -> Result<Array1<f64>> {
    let preds = model
        .predict(x)
        .map_err(|source| StackingError::PredictorFailure {
            fold,
            phase: Phase::Predict,
            source,
        })?;
    if preds.len() != x.nrows() {
        return Err(StackingError::PredictorFailure {
            fold,
            phase: Phase::Predict,
            source: crate::error::ModelError::InvalidInput(format!(
                "predictor returned {} values for {} rows",
                preds.len(),
                x.nrows()
            )),
        });
    }
    Ok(preds)
}

fn run_fold<E: Estimator + ?Sized>(
    estimator: &E,
    index: usize,
    fold: &Fold,
    x_train: ArrayView2<'_, f64>,
    y_train: ArrayView1<'_, f64>,
    x_test: ArrayView2<'_, f64>,
) -> Result<FoldOutput> {
    debug!(
        fold = index,
        n_train = fold.train.len(),
        n_validation = fold.validation.len(),
        "fitting fold"
    );
    let x_fit = x_train.select(Axis(0), &fold.train);
    let y_fit = y_train.select(Axis(0), &fold.train);
    let model = estimator
        .fit(x_fit.view(), y_fit.view())
        .map_err(|source| StackingError::PredictorFailure {
            fold: index,
            phase: Phase::Fit,
            source,
        })?;

    let x_validation = x_train.select(Axis(0), &fold.validation);
    let validation = checked_predict(&model, x_validation.view(), index)?;
    let test = checked_predict(&model, x_test, index)?;
    Ok(FoldOutput { validation, test })
}

/// Scatters per-fold outputs into the train column and averages the test rows.
fn assemble(
    partition: &FoldPartition,
    outputs: Vec<FoldOutput>,
    n_test: usize,
) -> MetaFeatures {
    let mut train = Array1::<f64>::zeros(partition.n_samples());
    let mut test_buffer = Array2::<f64>::zeros((partition.n_folds(), n_test));

    for ((fold, output), mut buffer_row) in partition
        .iter()
        .zip(outputs)
        .zip(test_buffer.axis_iter_mut(Axis(0)))
    {
        for (&row, &value) in fold.validation.iter().zip(output.validation.iter()) {
            train[row] = value;
        }
        buffer_row.assign(&output.test);
    }

    let test = test_buffer
        .mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(n_test));
    MetaFeatures {
        train: train.insert_axis(Axis(1)),
        test: test.insert_axis(Axis(1)),
    }
}

/// Generates out-of-fold meta-features for one estimator, folds in order.
///
/// # Errors
/// - [`StackingError::ShapeMismatch`] if `x_train` and `y_train` disagree on
///   rows, the partition covers a different row count, or train and test
///   column counts differ.
/// - [`StackingError::IncompletePartition`] if the partition is not an exact
///   cover of the training rows.
/// - [`StackingError::PredictorFailure`] for the first fold whose fit or
///   predict fails. No partial result is returned.
pub fn generate<E: Estimator + ?Sized>(
    estimator: &E,
    partition: &FoldPartition,
    x_train: ArrayView2<'_, f64>,
    y_train: ArrayView1<'_, f64>,
    x_test: ArrayView2<'_, f64>,
) -> Result<MetaFeatures> {
    check_inputs(partition, &x_train, &y_train, &x_test)?;
    debug!(
        model = estimator.name(),
        folds = partition.n_folds(),
        n_train = x_train.nrows(),
        n_test = x_test.nrows(),
        "generating out-of-fold predictions"
    );

    let outputs = partition
        .iter()
        .enumerate()
        .map(|(i, fold)| run_fold(estimator, i, fold, x_train, y_train, x_test))
        .collect::<Result<Vec<_>>>()?;
    Ok(assemble(partition, outputs, x_test.nrows()))
}

/// Same contract as [`generate`], with folds fitted concurrently on the
/// `rayon` thread pool.
///
/// Each fold owns its model and writes disjoint positions, so the result is
/// identical to [`generate`] for deterministic estimators. If several folds
/// fail, the error of the lowest-indexed one is returned.
#[cfg(feature = "parallel")]
pub fn generate_parallel<E: Estimator + Sync + ?Sized>(
    estimator: &E,
    partition: &FoldPartition,
    x_train: ArrayView2<'_, f64>,
    y_train: ArrayView1<'_, f64>,
    x_test: ArrayView2<'_, f64>,
) -> Result<MetaFeatures> {
    use rayon::prelude::*;

    check_inputs(partition, &x_train, &y_train, &x_test)?;
    debug!(
        model = estimator.name(),
        folds = partition.n_folds(),
        "generating out-of-fold predictions in parallel"
    );

    let results: Vec<Result<FoldOutput>> = partition
        .folds()
        .par_iter()
        .enumerate()
        .map(|(i, fold)| run_fold(estimator, i, fold, x_train, y_train, x_test))
        .collect();
    let outputs = results.into_iter().collect::<Result<Vec<_>>>()?;
    Ok(assemble(partition, outputs, x_test.nrows()))
}

/// A fold partition bound to a generation mode, for producing the meta-feature
/// matrix of several base models at once.
#[derive(Debug, Clone)]
pub struct OutOfFold {
    partition: FoldPartition,
    parallel: bool,
}

impl OutOfFold {
    pub fn new(partition: FoldPartition) -> Self {
        Self {
            partition,
            parallel: false,
        }
    }

    /// Fit folds concurrently. Without the `parallel` feature this is a no-op.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn partition(&self) -> &FoldPartition {
        &self.partition
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    /// Meta-features of a single estimator.
    pub fn generate<E: Estimator + Sync + ?Sized>(
        &self,
        estimator: &E,
        x_train: ArrayView2<'_, f64>,
        y_train: ArrayView1<'_, f64>,
        x_test: ArrayView2<'_, f64>,
    ) -> Result<MetaFeatures> {
        #[cfg(feature = "parallel")]
        if self.is_parallel() {
            return generate_parallel(estimator, &self.partition, x_train, y_train, x_test);
        }
        generate(estimator, &self.partition, x_train, y_train, x_test)
    }

    /// Meta-features of every estimator, one column each in input order.
    pub fn stack<E: Estimator + Sync>(
        &self,
        estimators: &[E],
        x_train: ArrayView2<'_, f64>,
        y_train: ArrayView1<'_, f64>,
        x_test: ArrayView2<'_, f64>,
    ) -> Result<MetaFeatures> {
        let parts = estimators
            .iter()
            .map(|e| self.generate(e, x_train, y_train, x_test))
            .collect::<Result<Vec<_>>>()?;
        MetaFeatures::hstack(&parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ModelError, PartitionDefect};
    use crate::model::{BoxedEstimator, DecisionTree, KNeighbors, LinearRegression};
    use crate::partition::KFold;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // --- test estimators -------------------------------------------------

    /// Predicts the mean of its training labels for every row.
    struct MeanOfLabels;

    struct Constant(f64);

    impl Predictor for Constant {
        fn predict(&self, x: ArrayView2<'_, f64>) -> std::result::Result<Array1<f64>, ModelError> {
            Ok(Array1::from_elem(x.nrows(), self.0))
        }
    }

    impl Estimator for MeanOfLabels {
        type Fitted = Constant;

        fn fit(
            &self,
            _x: ArrayView2<'_, f64>,
            y: ArrayView1<'_, f64>,
        ) -> std::result::Result<Constant, ModelError> {
            Ok(Constant(y.mean().unwrap_or(0.0)))
        }
    }

    /// Predicts the sum of its training labels, so each fold yields a distinct constant.
    struct SumOfLabels;

    impl Estimator for SumOfLabels {
        type Fitted = Constant;

        fn fit(
            &self,
            _x: ArrayView2<'_, f64>,
            y: ArrayView1<'_, f64>,
        ) -> std::result::Result<Constant, ModelError> {
            Ok(Constant(y.sum()))
        }
    }

    /// Remembers `row id -> label` for training rows (column 0 holds the row id)
    /// and predicts 1 only for rows it was shown with label 1.
    struct Memorizer;

    struct Memory(HashMap<u64, f64>);

    impl Predictor for Memory {
        fn predict(&self, x: ArrayView2<'_, f64>) -> std::result::Result<Array1<f64>, ModelError> {
            Ok(x.outer_iter()
                .map(|row| match self.0.get(&row[0].to_bits()) {
                    Some(&label) if label == 1.0 => 1.0,
                    _ => 0.0,
                })
                .collect())
        }
    }

    impl Estimator for Memorizer {
        type Fitted = Memory;

        fn fit(
            &self,
            x: ArrayView2<'_, f64>,
            y: ArrayView1<'_, f64>,
        ) -> std::result::Result<Memory, ModelError> {
            Ok(Memory(
                x.outer_iter()
                    .zip(y.iter())
                    .map(|(row, &label)| (row[0].to_bits(), label))
                    .collect(),
            ))
        }
    }

    /// Counts fits; predicts zeros.
    struct Counting<'a>(&'a AtomicUsize);

    impl Estimator for Counting<'_> {
        type Fitted = Constant;

        fn fit(
            &self,
            _x: ArrayView2<'_, f64>,
            _y: ArrayView1<'_, f64>,
        ) -> std::result::Result<Constant, ModelError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Constant(0.0))
        }
    }

    /// Fails to fit whenever the training slice contains row id `bad_row`.
    struct FailsOn {
        bad_row: f64,
    }

    impl Estimator for FailsOn {
        type Fitted = Constant;

        fn fit(
            &self,
            x: ArrayView2<'_, f64>,
            _y: ArrayView1<'_, f64>,
        ) -> std::result::Result<Constant, ModelError> {
            if x.column(0).iter().any(|&v| v == self.bad_row) {
                return Err(ModelError::NumericalError("poisoned row".into()));
            }
            Ok(Constant(0.0))
        }
    }

    /// Returns one value too few.
    struct ShortPredictor;

    impl Estimator for ShortPredictor {
        type Fitted = Short;

        fn fit(
            &self,
            _x: ArrayView2<'_, f64>,
            _y: ArrayView1<'_, f64>,
        ) -> std::result::Result<Short, ModelError> {
            Ok(Short)
        }
    }

    struct Short;

    impl Predictor for Short {
        fn predict(&self, x: ArrayView2<'_, f64>) -> std::result::Result<Array1<f64>, ModelError> {
            Ok(Array1::zeros(x.nrows().saturating_sub(1)))
        }
    }

    // --- helpers -----------------------------------------------------------

    /// Column 0 is the row id, column 1 a noisy feature.
    fn id_matrix(n: usize) -> Array2<f64> {
        Array2::from_shape_fn((n, 2), |(i, j)| if j == 0 { i as f64 } else { (i * 7 % 5) as f64 })
    }

    fn random_partition(rng: &mut StdRng, n: usize) -> FoldPartition {
        let k = rng.random_range(2..=n.min(8));
        let mut rows: Vec<usize> = (0..n).collect();
        rows.shuffle(rng);
        let mut sets = vec![Vec::new(); k];
        // every fold gets at least one row, the rest land anywhere
        for (pos, row) in rows.into_iter().enumerate() {
            let fold = if pos < k { pos } else { rng.random_range(0..k) };
            sets[fold].push(row);
        }
        FoldPartition::from_validation_sets(n, sets).unwrap()
    }

    // --- properties ----------------------------------------------------------

    #[test]
    fn test_random_partitions_cover_every_row_once() {
        let mut rng = StdRng::seed_from_u64(17);
        for _ in 0..100 {
            let n = rng.random_range(2..60);
            let partition = random_partition(&mut rng, n);

            let mut seen = vec![0usize; n];
            for fold in &partition {
                for &i in &fold.validation {
                    seen[i] += 1;
                }
            }
            assert!(seen.iter().all(|&c| c == 1));

            let x = id_matrix(n);
            let y = Array1::from_shape_fn(n, |i| (i % 2) as f64);
            let meta =
                generate(&MeanOfLabels, &partition, x.view(), y.view(), x.view()).unwrap();
            assert!(meta.train.iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn test_no_self_leakage_with_memorizing_predictor() {
        let n = 40;
        let x = id_matrix(n);
        let mut rng = StdRng::seed_from_u64(3);
        let y = Array1::from_shape_fn(n, |_| if rng.random::<bool>() { 1.0 } else { 0.0 });
        let partition = KFold::new(5).shuffle(true).seed(11).split_indices(n).unwrap();

        let meta = generate(&Memorizer, &partition, x.view(), y.view(), x.view()).unwrap();

        // a row's own label was never in the model that predicted it
        assert!(meta.train.iter().all(|&p| p == 0.0));
        // sanity check: the memorizer does replay labels it has seen
        let in_sample = Memorizer.fit(x.view(), y.view()).unwrap().predict(x.view()).unwrap();
        assert_eq!(in_sample, y);
    }

    #[test]
    fn test_output_shapes() {
        let x_train = id_matrix(13);
        let y_train = Array1::zeros(13);
        let x_test = id_matrix(4);
        let partition = KFold::new(4).split_indices(13).unwrap();

        let meta = generate(
            &MeanOfLabels,
            &partition,
            x_train.view(),
            y_train.view(),
            x_test.view(),
        )
        .unwrap();
        assert_eq!(meta.train.dim(), (13, 1));
        assert_eq!(meta.test.dim(), (4, 1));
        assert_eq!(meta.n_columns(), 1);
    }

    #[test]
    fn test_test_predictions_are_fold_means() {
        let n = 9;
        let x = id_matrix(n);
        let y = Array1::from_shape_fn(n, |i| i as f64);
        let sets = vec![vec![0, 1], vec![2, 3, 4, 5], vec![6, 7, 8]];
        let partition = FoldPartition::from_validation_sets(n, sets.clone()).unwrap();

        let total: f64 = y.sum();
        let constants: Vec<f64> = sets
            .iter()
            .map(|v| total - v.iter().map(|&i| y[i]).sum::<f64>())
            .collect();
        let expected = constants.iter().sum::<f64>() / constants.len() as f64;

        let x_test = id_matrix(5);
        let meta = generate(&SumOfLabels, &partition, x.view(), y.view(), x_test.view()).unwrap();
        for &v in meta.test.iter() {
            assert_abs_diff_eq!(v, expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_repeated_runs_are_identical() {
        let x = Array2::from_shape_fn((30, 3), |(i, j)| ((i * 13 + j * 7) % 11) as f64);
        let y = Array1::from_shape_fn(30, |i| ((i * 3) % 7) as f64);
        let partition = KFold::new(5).shuffle(true).seed(2).split_indices(30).unwrap();

        let a = generate(&DecisionTree::new(), &partition, x.view(), y.view(), x.view()).unwrap();
        let b = generate(&DecisionTree::new(), &partition, x.view(), y.view(), x.view()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_six_row_example() {
        let x = id_matrix(6);
        let y = array![0.0, 0.0, 1.0, 1.0, 0.0, 0.0];
        let partition =
            FoldPartition::from_validation_sets(6, vec![vec![0, 1, 2], vec![3, 4, 5]]).unwrap();

        let meta = generate(&MeanOfLabels, &partition, x.view(), y.view(), x.view()).unwrap();
        for &v in meta.train.iter() {
            assert_abs_diff_eq!(v, 1.0 / 3.0, epsilon = 1e-12);
        }
        for &v in meta.test.iter() {
            assert_abs_diff_eq!(v, 1.0 / 3.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_missing_index_fails_before_any_fit() {
        let fits = AtomicUsize::new(0);
        let x = id_matrix(6);
        let y = Array1::zeros(6);
        let partition = FoldPartition::new_unchecked(
            6,
            vec![
                Fold {
                    train: vec![3, 4],
                    validation: vec![0, 1, 2],
                },
                Fold {
                    train: vec![0, 1, 2],
                    validation: vec![3, 4],
                },
            ],
        );

        let err = generate(&Counting(&fits), &partition, x.view(), y.view(), x.view()).unwrap_err();
        assert!(matches!(
            err,
            StackingError::IncompletePartition(PartitionDefect::MissingIndex(5))
        ));
        assert_eq!(fits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_overlapping_and_empty_partitions_are_rejected() {
        let x = id_matrix(4);
        let y = Array1::zeros(4);
        let overlap = FoldPartition::new_unchecked(
            4,
            vec![
                Fold {
                    train: vec![0, 2, 3],
                    validation: vec![0, 1],
                },
                Fold {
                    train: vec![0, 1],
                    validation: vec![2, 3],
                },
            ],
        );
        assert!(matches!(
            generate(&MeanOfLabels, &overlap, x.view(), y.view(), x.view()),
            Err(StackingError::IncompletePartition(
                PartitionDefect::TrainValidationOverlap { fold: 0, index: 0 }
            ))
        ));

        let empty = FoldPartition::new_unchecked(4, Vec::new());
        assert!(matches!(
            generate(&MeanOfLabels, &empty, x.view(), y.view(), x.view()),
            Err(StackingError::IncompletePartition(PartitionDefect::Empty))
        ));
    }

    #[test]
    fn test_shape_mismatches() {
        let fits = AtomicUsize::new(0);
        let x = id_matrix(6);
        let partition = KFold::new(2).split_indices(6).unwrap();

        let short_y = Array1::zeros(5);
        let err = generate(&Counting(&fits), &partition, x.view(), short_y.view(), x.view())
            .unwrap_err();
        assert!(matches!(
            err,
            StackingError::ShapeMismatch { context: "training labels", expected: 6, got: 5 }
        ));

        let y = Array1::zeros(6);
        let narrow_test = Array2::zeros((3, 1));
        let err = generate(&Counting(&fits), &partition, x.view(), y.view(), narrow_test.view())
            .unwrap_err();
        assert!(matches!(err, StackingError::ShapeMismatch { .. }));

        let other = KFold::new(2).split_indices(8).unwrap();
        let err = generate(&Counting(&fits), &other, x.view(), y.view(), x.view()).unwrap_err();
        assert!(matches!(
            err,
            StackingError::ShapeMismatch { context: "partition rows", .. }
        ));
        assert_eq!(fits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_predictor_failure_carries_fold_and_phase() {
        let x = id_matrix(6);
        let y = Array1::zeros(6);
        let partition =
            FoldPartition::from_validation_sets(6, vec![vec![0, 1], vec![2, 3], vec![4, 5]])
                .unwrap();

        // row 4 is in the training slice of folds 0 and 1; fold 0 fails first
        let err = generate(&FailsOn { bad_row: 4.0 }, &partition, x.view(), y.view(), x.view())
            .unwrap_err();
        match err {
            StackingError::PredictorFailure { fold, phase, source } => {
                assert_eq!(fold, 0);
                assert_eq!(phase, Phase::Fit);
                assert!(matches!(source, ModelError::NumericalError(_)));
            }
            other => panic!("unexpected error {:?}", other),
        }

        let err = generate(&ShortPredictor, &partition, x.view(), y.view(), x.view()).unwrap_err();
        assert!(matches!(
            err,
            StackingError::PredictorFailure { fold: 0, phase: Phase::Predict, .. }
        ));
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_matches_sequential() {
        let x = Array2::from_shape_fn((50, 2), |(i, j)| ((i * 31 + j * 17) % 23) as f64);
        let y = Array1::from_shape_fn(50, |i| ((i * 5) % 3) as f64);
        let x_test = Array2::from_shape_fn((7, 2), |(i, j)| (i + j) as f64);
        let partition = KFold::new(5).shuffle(true).seed(9).split_indices(50).unwrap();
        let knn = KNeighbors::new(3);

        let seq = generate(&knn, &partition, x.view(), y.view(), x_test.view()).unwrap();
        let par = generate_parallel(&knn, &partition, x.view(), y.view(), x_test.view()).unwrap();
        assert_eq!(seq, par);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_reports_lowest_failing_fold() {
        let x = id_matrix(6);
        let y = Array1::zeros(6);
        let partition =
            FoldPartition::from_validation_sets(6, vec![vec![0, 1], vec![2, 3], vec![4, 5]])
                .unwrap();

        // row 0 is trained on by folds 1 and 2 only
        let err = generate_parallel(&FailsOn { bad_row: 0.0 }, &partition, x.view(), y.view(), x.view())
            .unwrap_err();
        assert!(matches!(err, StackingError::PredictorFailure { fold: 1, .. }));
    }

    #[test]
    fn test_out_of_fold_stacks_columns_in_order() {
        let x = Array2::from_shape_fn((20, 1), |(i, _)| i as f64);
        let y = x.column(0).mapv(|v| 2.0 * v);
        let x_test = array![[20.0], [21.0]];
        let oof = OutOfFold::new(KFold::new(4).split_indices(20).unwrap()).parallel(true);

        let models = vec![
            BoxedEstimator::new(MeanOfLabels).named("mean"),
            BoxedEstimator::new(LinearRegression::new().max_epochs(500)),
        ];
        let meta = oof.stack(&models, x.view(), y.view(), x_test.view()).unwrap();
        assert_eq!(meta.train.dim(), (20, 2));
        assert_eq!(meta.test.dim(), (2, 2));

        let mean_only = oof.generate(&MeanOfLabels, x.view(), y.view(), x_test.view()).unwrap();
        assert_eq!(meta.train.column(0), mean_only.train.column(0));
        // the linear column tracks the target far better than the mean column
        assert!((meta.test[[0, 1]] - 40.0).abs() < (meta.test[[0, 0]] - 40.0).abs());
    }

    #[test]
    fn test_hstack_checks_rows() {
        let a = MetaFeatures {
            train: Array2::zeros((3, 1)),
            test: Array2::zeros((2, 1)),
        };
        let b = MetaFeatures {
            train: Array2::zeros((4, 1)),
            test: Array2::zeros((2, 1)),
        };
        assert!(matches!(
            MetaFeatures::hstack(&[a.clone(), b]),
            Err(StackingError::ShapeMismatch { .. })
        ));
        assert!(matches!(MetaFeatures::hstack(&[]), Err(StackingError::EmptyData(_))));
        assert_eq!(MetaFeatures::hstack(&[a.clone(), a]).unwrap().n_columns(), 2);
    }
}
