//! Column-wise preprocessing transformers.
//!
//! Transformers follow the same unfitted / fitted split as models:
//! - [`Transformer`]: configuration, `fit` learns statistics from data.
//! - [`FittedTransformer`]: learned statistics, `transform` only.
//!
//! The linear and k-NN reference models standardize their inputs internally
//! with [`StandardScaler`]; [`SimpleImputer`] fills missing CSV cells before
//! data reaches any model.

use crate::error::ModelError;
use ndarray::{Array2, ArrayView2};

pub mod imputation;
pub mod scaling;

pub use imputation::{FittedSimpleImputer, ImputeStrategy, SimpleImputer, SimpleImputerParams};
pub use scaling::{FittedStandardScaler, StandardScaler, StandardScalerConfig, StandardScalerParams};

/// Unfitted transformer with hyper-parameters.
pub trait Transformer {
    type Fitted: FittedTransformer;

    /// Learns per-column statistics from `data`.
    ///
    /// # Errors
    /// Returns [`ModelError::InvalidInput`] on empty data.
    fn fit(&self, data: ArrayView2<'_, f64>) -> Result<Self::Fitted, ModelError>;

    fn fit_transform(&self, data: ArrayView2<'_, f64>) -> Result<Array2<f64>, ModelError> {
        self.fit(data)?.transform(data)
    }
}

/// Fitted transformer ready for inference.
pub trait FittedTransformer {
    /// Applies the learned statistics.
    ///
    /// # Errors
    /// Returns [`ModelError::FeatureMismatch`] if the column count differs
    /// from the data seen during `fit`.
    fn transform(&self, data: ArrayView2<'_, f64>) -> Result<Array2<f64>, ModelError>;

    /// Number of columns seen during `fit`.
    fn n_features_in(&self) -> usize;
}

pub(crate) fn check_width(data: &ArrayView2<'_, f64>, expected: usize) -> Result<(), ModelError> {
    if data.ncols() != expected {
        return Err(ModelError::FeatureMismatch {
            expected,
            got: data.ncols(),
        });
    }
    Ok(())
}
