//! Standard Scaler (Z-score normalization).
//!
//! Transforms features by removing the mean and scaling to unit variance:
//! ```text
//! z = (x - u) / s
//! ```
//! where `u` is the column mean of the training samples and `s` the
//! population standard deviation. Constant columns keep `s = 1`.
//!
//! # Example
//! ```rust
//! use stacklearne_rs::preprocessing::{FittedTransformer, StandardScaler, Transformer};
//! use ndarray::array;
//!
//! let data = array![[1.0, 10.0], [3.0, 10.0]];
//! let fitted = StandardScaler::new().fit(data.view()).unwrap();
//! let scaled = fitted.transform(data.view()).unwrap();
//! assert_eq!(scaled[[0, 0]], -1.0);
//! assert_eq!(scaled[[0, 1]], 0.0);
//! ```

use super::{check_width, FittedTransformer, Transformer};
use crate::error::ModelError;
use crate::serialization::PersistentModel;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Configuration for [`StandardScaler`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StandardScalerConfig {
    /// Center the data before scaling.
    pub with_mean: bool,
    /// Scale the data to unit variance.
    pub with_std: bool,
}

impl Default for StandardScalerConfig {
    fn default() -> Self {
        Self {
            with_mean: true,
            with_std: true,
        }
    }
}

/// Serializable parameters of a [`FittedStandardScaler`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StandardScalerParams {
    pub config: StandardScalerConfig,
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

/// StandardScaler transformer (unfitted).
#[derive(Clone, Debug, Default)]
pub struct StandardScaler {
    config: StandardScalerConfig,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether to center data by mean.
    pub fn with_mean(mut self, with_mean: bool) -> Self {
        self.config.with_mean = with_mean;
        self
    }

    /// Set whether to scale data to unit variance.
    pub fn with_std(mut self, with_std: bool) -> Self {
        self.config.with_std = with_std;
        self
    }
}

impl Transformer for StandardScaler {
    type Fitted = FittedStandardScaler;

    fn fit(&self, data: ArrayView2<'_, f64>) -> Result<FittedStandardScaler, ModelError> {
        let cols = data.ncols();
        if data.nrows() == 0 {
            return Err(ModelError::InvalidInput(
                "cannot fit StandardScaler on empty data".into(),
            ));
        }

        let mean = if self.config.with_mean {
            data.mean_axis(Axis(0))
                .unwrap_or_else(|| Array1::zeros(cols))
        } else {
            Array1::zeros(cols)
        };

        let std = if self.config.with_std {
            // population std (ddof = 0); constant columns are left unscaled
            data.std_axis(Axis(0), 0.0)
                .mapv(|s| if s > f64::EPSILON && s.is_finite() { s } else { 1.0 })
        } else {
            Array1::ones(cols)
        };

        Ok(FittedStandardScaler {
            config: self.config.clone(),
            mean,
            std,
        })
    }
}

/// Fitted StandardScaler ready for inference.
#[derive(Clone, Debug)]
pub struct FittedStandardScaler {
    config: StandardScalerConfig,
    mean: Array1<f64>,
    std: Array1<f64>,
}

impl FittedStandardScaler {
    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn std(&self) -> &Array1<f64> {
        &self.std
    }

    /// Maps scaled data back to the original units.
    pub fn inverse_transform(&self, data: ArrayView2<'_, f64>) -> Result<Array2<f64>, ModelError> {
        check_width(&data, self.n_features_in())?;
        Ok(&data * &self.std + &self.mean)
    }
}

impl FittedTransformer for FittedStandardScaler {
    fn transform(&self, data: ArrayView2<'_, f64>) -> Result<Array2<f64>, ModelError> {
        check_width(&data, self.n_features_in())?;
        Ok((&data - &self.mean) / &self.std)
    }

    fn n_features_in(&self) -> usize {
        self.mean.len()
    }
}

impl PersistentModel for FittedStandardScaler {
    type Params = StandardScalerParams;

    fn extract_params(&self) -> StandardScalerParams {
        StandardScalerParams {
            config: self.config.clone(),
            mean: self.mean.to_vec(),
            std: self.std.to_vec(),
        }
    }

    fn from_params(params: StandardScalerParams) -> Result<Self, ModelError> {
        if params.mean.len() != params.std.len() {
            return Err(ModelError::Serialization(format!(
                "scaler has {} means but {} deviations",
                params.mean.len(),
                params.std.len()
            )));
        }
        Ok(Self {
            config: params.config,
            mean: Array1::from(params.mean),
            std: Array1::from(params.std),
        })
    }
}
