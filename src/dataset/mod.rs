//! In-memory datasets for stacking workloads.
//!
//! A [`Dataset`] owns a feature matrix `X` of shape `(n_samples, n_features)`,
//! an optional label vector `y` of shape `(n_samples,)` and optional column
//! names. Training sets carry labels; test sets usually do not.
//!
//! # Example
//!
//! ```rust
//! use stacklearne_rs::dataset::Dataset;
//!
//! let x = vec![vec![1.0, 0.5], vec![2.0, 1.5], vec![3.0, 2.5]];
//! let y = vec![0.0, 1.0, 1.0];
//! let dataset = Dataset::from_rows(x, y).unwrap();
//!
//! assert_eq!(dataset.n_samples(), 3);
//! assert_eq!(dataset.n_features(), 2);
//!
//! // Row selection keeps labels aligned
//! let subset = dataset.select(&[2, 0]);
//! assert_eq!(subset.labels().unwrap().to_vec(), vec![1.0, 0.0]);
//! ```

use crate::error::{Result, StackingError};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

mod loader;
pub use self::loader::write_predictions_csv;

/// Feature matrix with optional aligned labels.
#[derive(Debug, Clone)]
pub struct Dataset {
    x: Array2<f64>,
    y: Option<Array1<f64>>,
    feature_names: Vec<String>,
}

impl Dataset {
    /// Creates a labeled dataset.
    ///
    /// # Errors
    ///
    /// - [`StackingError::EmptyData`] if `x` has no rows or no columns
    /// - [`StackingError::ShapeMismatch`] if `y.len() != x.nrows()`
    pub fn new(x: Array2<f64>, y: Array1<f64>) -> Result<Self> {
        check_not_empty(&x)?;
        if x.nrows() != y.len() {
            return Err(StackingError::ShapeMismatch {
                context: "dataset labels",
                expected: x.nrows(),
                got: y.len(),
            });
        }
        Ok(Self {
            x,
            y: Some(y),
            feature_names: Vec::new(),
        })
    }

    /// Creates a dataset without labels (e.g. a test set).
    pub fn unlabeled(x: Array2<f64>) -> Result<Self> {
        check_not_empty(&x)?;
        Ok(Self {
            x,
            y: None,
            feature_names: Vec::new(),
        })
    }

    /// Builds a labeled dataset from row vectors.
    ///
    /// All rows must have the same length.
    pub fn from_rows(rows: Vec<Vec<f64>>, y: Vec<f64>) -> Result<Self> {
        let x = rows_to_array(rows)?;
        Self::new(x, Array1::from(y))
    }

    /// Attaches column names. The count must equal the number of features.
    pub fn with_feature_names(mut self, names: Vec<String>) -> Result<Self> {
        if names.len() != self.n_features() {
            return Err(StackingError::ShapeMismatch {
                context: "feature names",
                expected: self.n_features(),
                got: names.len(),
            });
        }
        self.feature_names = names;
        Ok(self)
    }

    pub fn n_samples(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    pub fn features(&self) -> ArrayView2<'_, f64> {
        self.x.view()
    }

    pub fn labels(&self) -> Option<ArrayView1<'_, f64>> {
        self.y.as_ref().map(|y| y.view())
    }

    /// Returns the labels or [`StackingError::EmptyData`] for an unlabeled set.
    pub fn require_labels(&self) -> Result<ArrayView1<'_, f64>> {
        self.labels()
            .ok_or_else(|| StackingError::EmptyData("dataset has no labels".into()))
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn is_labeled(&self) -> bool {
        self.y.is_some()
    }

    /// Returns a new dataset made of the given rows, in the given order.
    ///
    /// # Panics
    ///
    /// Panics if an index is out of bounds. Callers holding a validated
    /// [`FoldPartition`](crate::partition::FoldPartition) never hit this.
    pub fn select(&self, indices: &[usize]) -> Dataset {
        Dataset {
            x: self.x.select(Axis(0), indices),
            y: self.y.as_ref().map(|y| y.select(Axis(0), indices)),
            feature_names: self.feature_names.clone(),
        }
    }

    /// Replaces the feature matrix (e.g. with a transformed copy), keeping
    /// labels and names.
    ///
    /// # Errors
    ///
    /// [`StackingError::ShapeMismatch`] if the shape changes.
    pub fn with_features(mut self, x: Array2<f64>) -> Result<Self> {
        if x.dim() != self.x.dim() {
            let (context, expected, got) = if x.nrows() != self.x.nrows() {
                ("replacement rows", self.x.nrows(), x.nrows())
            } else {
                ("replacement columns", self.x.ncols(), x.ncols())
            };
            return Err(StackingError::ShapeMismatch {
                context,
                expected,
                got,
            });
        }
        self.x = x;
        Ok(self)
    }

    /// Splits into feature matrix and labels, consuming the dataset.
    pub fn into_parts(self) -> (Array2<f64>, Option<Array1<f64>>) {
        (self.x, self.y)
    }
}

fn check_not_empty(x: &Array2<f64>) -> Result<()> {
    if x.nrows() == 0 {
        return Err(StackingError::EmptyData("dataset has no rows".into()));
    }
    if x.ncols() == 0 {
        return Err(StackingError::EmptyData("dataset has no feature columns".into()));
    }
    Ok(())
}

/// Converts row vectors into a matrix, checking that rows are rectangular.
pub(crate) fn rows_to_array(rows: Vec<Vec<f64>>) -> Result<Array2<f64>> {
    let n_rows = rows.len();
    if n_rows == 0 {
        return Err(StackingError::EmptyData("dataset has no rows".into()));
    }
    let n_cols = rows[0].len();
    if let Some(bad) = rows.iter().find(|row| row.len() != n_cols) {
        return Err(StackingError::ShapeMismatch {
            context: "row length",
            expected: n_cols,
            got: bad.len(),
        });
    }
    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((n_rows, n_cols), flat).map_err(|_| StackingError::ShapeMismatch {
        context: "row-major buffer",
        expected: n_rows * n_cols,
        got: 0,
    })
}
