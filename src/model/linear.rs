//! Linear reference models trained by mini-batch gradient descent.
//!
//! [`LinearModel`] is the trainable core (weights + bias) with the
//! `Unfitted` → `Fitted` state transition. [`LinearRegression`] and
//! [`LogisticRegression`] are the estimators built on top of it: they
//! standardize inputs, run a [`Trainer`] with the matching loss, and return a
//! fitted predictor that carries the scaler and the learned parameters.

use super::{check_fit_input, check_predict_input, Estimator, Fitted, ParamOps, Predictor};
use super::{TrainableModel, Unfitted};
use crate::error::ModelError;
use crate::loss::{sigmoid, BCEWithLogitsLoss, Loss, MSELoss};
use crate::optimizer::SGD;
use crate::preprocessing::{
    FittedStandardScaler, FittedTransformer, StandardScaler, StandardScalerParams, Transformer,
};
use crate::regularizers::{NoRegularizer, L2};
use crate::serialization::PersistentModel;
use crate::trainer::Trainer;
use crate::tuning::ParamSet;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use tracing::debug;

/// Weights and bias of a linear model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearParams {
    pub weights: Array1<f64>,
    pub bias: f64,
}

impl LinearParams {
    pub fn zeros(n_features: usize) -> Self {
        Self {
            weights: Array1::zeros(n_features),
            bias: 0.0,
        }
    }
}

impl ParamOps for LinearParams {
    fn add(&self, other: &Self) -> Self {
        Self {
            weights: &self.weights + &other.weights,
            bias: self.bias + other.bias,
        }
    }

    fn scale(&self, factor: f64) -> Self {
        Self {
            weights: &self.weights * factor,
            bias: self.bias * factor,
        }
    }

    fn is_finite(&self) -> bool {
        self.bias.is_finite() && self.weights.iter().all(|w| w.is_finite())
    }
}

/// Linear model `x·w + b`, parametrized by training state.
#[derive(Debug, Clone)]
pub struct LinearModel<S> {
    params: LinearParams,
    _state: PhantomData<S>,
}

impl LinearModel<Unfitted> {
    /// Zero-initialized model for `n_features` inputs.
    pub fn new(n_features: usize) -> Self {
        Self::from_params(LinearParams::zeros(n_features))
    }

    pub fn from_params(params: LinearParams) -> Self {
        Self {
            params,
            _state: PhantomData,
        }
    }
}

impl TrainableModel for LinearModel<Unfitted> {
    type Params = LinearParams;
    type Output = LinearModel<Fitted>;

    fn forward(&self, x: ArrayView2<'_, f64>) -> Array1<f64> {
        x.dot(&self.params.weights) + self.params.bias
    }

    fn backward(&self, x: ArrayView2<'_, f64>, grad_output: ArrayView1<'_, f64>) -> LinearParams {
        LinearParams {
            weights: x.t().dot(&grad_output),
            bias: grad_output.sum(),
        }
    }

    fn params(&self) -> &LinearParams {
        &self.params
    }

    fn update_params(&mut self, new_params: LinearParams) {
        self.params = new_params;
    }

    fn into_fitted(self) -> LinearModel<Fitted> {
        LinearModel {
            params: self.params,
            _state: PhantomData,
        }
    }
}

impl LinearModel<Fitted> {
    /// Raw linear output `x·w + b`.
    pub fn decision_function(&self, x: ArrayView2<'_, f64>) -> Array1<f64> {
        x.dot(&self.params.weights) + self.params.bias
    }

    pub fn params(&self) -> &LinearParams {
        &self.params
    }

    pub fn n_features(&self) -> usize {
        self.params.weights.len()
    }
}

/// Gradient-descent settings shared by both linear estimators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientDescent {
    pub learning_rate: f64,
    /// L2 penalty strength (0 disables regularization).
    pub l2: f64,
    pub max_epochs: usize,
    pub batch_size: usize,
    pub tolerance: f64,
    /// Standardize features before training.
    pub standardize: bool,
}

impl Default for GradientDescent {
    fn default() -> Self {
        Self {
            learning_rate: 0.05,
            l2: 0.0,
            max_epochs: 200,
            batch_size: 32,
            tolerance: 1e-7,
            standardize: true,
        }
    }
}

impl GradientDescent {
    /// Names accepted by `from_params`.
    pub const PARAMS: &'static [&'static str] = &["learning_rate", "l2", "max_epochs", "batch_size"];

    fn from_param_set(model: &str, params: &ParamSet) -> Result<Self, ModelError> {
        params.check_known(model, Self::PARAMS)?;
        let defaults = Self::default();
        let settings = Self {
            learning_rate: params.get_or("learning_rate", defaults.learning_rate),
            l2: params.get_or("l2", defaults.l2),
            max_epochs: params.get_usize_or("max_epochs", defaults.max_epochs)?,
            batch_size: params.get_usize_or("batch_size", defaults.batch_size)?,
            ..defaults
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ModelError> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(ModelError::invalid_parameter(
                "learning_rate",
                format!("must be a positive number, got {}", self.learning_rate),
            ));
        }
        if !(self.l2.is_finite() && self.l2 >= 0.0) {
            return Err(ModelError::invalid_parameter(
                "l2",
                format!("must be >= 0, got {}", self.l2),
            ));
        }
        if self.max_epochs == 0 {
            return Err(ModelError::invalid_parameter("max_epochs", "must be >= 1"));
        }
        if self.batch_size == 0 {
            return Err(ModelError::invalid_parameter("batch_size", "must be >= 1"));
        }
        Ok(())
    }

    /// Fits an optional scaler, then trains a linear model with `loss`.
    fn train<L: Loss>(
        &self,
        loss: L,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
    ) -> Result<(Option<FittedStandardScaler>, LinearModel<Fitted>), ModelError> {
        self.validate()?;
        check_fit_input(&x, &y)?;

        let scaler = if self.standardize {
            Some(StandardScaler::new().fit(x)?)
        } else {
            None
        };
        let xs = scale(scaler.as_ref(), x)?;

        let model = LinearModel::<Unfitted>::new(x.ncols());
        let optimizer = SGD::new(self.learning_rate);
        let fitted = if self.l2 > 0.0 {
            Trainer::builder(loss, optimizer, L2::new(self.l2))
                .batch_size(self.batch_size)
                .max_epochs(self.max_epochs)
                .tolerance(self.tolerance)
                .build()
                .fit(model, xs.view(), y)?
        } else {
            Trainer::builder(loss, optimizer, NoRegularizer)
                .batch_size(self.batch_size)
                .max_epochs(self.max_epochs)
                .tolerance(self.tolerance)
                .build()
                .fit(model, xs.view(), y)?
        };
        debug!(
            n_samples = x.nrows(),
            n_features = x.ncols(),
            bias = fitted.params().bias,
            "linear model trained"
        );
        Ok((scaler, fitted))
    }
}

fn scale(
    scaler: Option<&FittedStandardScaler>,
    x: ArrayView2<'_, f64>,
) -> Result<Array2<f64>, ModelError> {
    match scaler {
        Some(s) => s.transform(x),
        None => Ok(x.to_owned()),
    }
}

/// Least-squares regression with optional L2 penalty.
///
/// # Example
/// ```rust
/// use stacklearne_rs::model::{Estimator, LinearRegression, Predictor};
/// use ndarray::array;
///
/// let x = array![[0.0], [1.0], [2.0], [3.0]];
/// let y = array![1.0, 3.0, 5.0, 7.0];
///
/// let fitted = LinearRegression::new().max_epochs(500).fit(x.view(), y.view()).unwrap();
/// let pred = fitted.predict(array![[4.0]].view()).unwrap();
/// assert!((pred[0] - 9.0).abs() < 0.1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinearRegression {
    pub settings: GradientDescent,
}

/// Logistic regression for binary `0/1` labels; predicts probabilities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub settings: GradientDescent,
}

macro_rules! gradient_descent_setters {
    ($ty:ty, $label:literal) => {
        impl $ty {
            pub fn new() -> Self {
                Self::default()
            }

            /// Builds the estimator from tuned hyper-parameters. Unknown names
            /// are rejected; missing names keep their defaults.
            pub fn from_params(params: &ParamSet) -> Result<Self, ModelError> {
                Ok(Self {
                    settings: GradientDescent::from_param_set($label, params)?,
                })
            }

            pub fn learning_rate(mut self, lr: f64) -> Self {
                self.settings.learning_rate = lr;
                self
            }

            pub fn l2(mut self, lambda: f64) -> Self {
                self.settings.l2 = lambda;
                self
            }

            pub fn max_epochs(mut self, epochs: usize) -> Self {
                self.settings.max_epochs = epochs;
                self
            }

            pub fn batch_size(mut self, size: usize) -> Self {
                self.settings.batch_size = size;
                self
            }

            pub fn tolerance(mut self, tolerance: f64) -> Self {
                self.settings.tolerance = tolerance;
                self
            }

            pub fn standardize(mut self, standardize: bool) -> Self {
                self.settings.standardize = standardize;
                self
            }
        }
    };
}

gradient_descent_setters!(LinearRegression, "linear");
gradient_descent_setters!(LogisticRegression, "logistic");

impl Estimator for LinearRegression {
    type Fitted = FittedLinear;

    fn fit(&self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<FittedLinear, ModelError> {
        let (scaler, model) = self.settings.train(MSELoss, x, y)?;
        Ok(FittedLinear { scaler, model })
    }

    fn name(&self) -> &str {
        "linear"
    }
}

impl Estimator for LogisticRegression {
    type Fitted = FittedLogistic;

    fn fit(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
    ) -> Result<FittedLogistic, ModelError> {
        if let Some(bad) = y.iter().find(|&&t| t != 0.0 && t != 1.0) {
            return Err(ModelError::InvalidInput(format!(
                "logistic regression needs 0/1 labels, found {}",
                bad
            )));
        }
        let (scaler, model) = self.settings.train(BCEWithLogitsLoss, x, y)?;
        Ok(FittedLogistic {
            inner: FittedLinear { scaler, model },
        })
    }

    fn name(&self) -> &str {
        "logistic"
    }
}

/// Serializable state of a fitted linear or logistic model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedLinearParams {
    pub linear: LinearParams,
    pub scaler: Option<StandardScalerParams>,
}

/// Fitted [`LinearRegression`].
#[derive(Debug, Clone)]
pub struct FittedLinear {
    scaler: Option<FittedStandardScaler>,
    model: LinearModel<Fitted>,
}

impl FittedLinear {
    /// Learned weights and bias, in standardized feature units when the
    /// model was trained with `standardize`.
    pub fn coefficients(&self) -> &LinearParams {
        self.model.params()
    }

    pub fn n_features(&self) -> usize {
        self.model.n_features()
    }

    fn decision_function(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>, ModelError> {
        check_predict_input(&x, self.n_features())?;
        let xs = scale(self.scaler.as_ref(), x)?;
        Ok(self.model.decision_function(xs.view()))
    }
}

impl Predictor for FittedLinear {
    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>, ModelError> {
        self.decision_function(x)
    }
}

impl PersistentModel for FittedLinear {
    type Params = FittedLinearParams;

    fn extract_params(&self) -> FittedLinearParams {
        FittedLinearParams {
            linear: self.model.params().clone(),
            scaler: self.scaler.as_ref().map(|s| s.extract_params()),
        }
    }

    fn from_params(params: FittedLinearParams) -> Result<Self, ModelError> {
        let scaler = params
            .scaler
            .map(FittedStandardScaler::from_params)
            .transpose()?;
        if let Some(s) = &scaler {
            if s.n_features_in() != params.linear.weights.len() {
                return Err(ModelError::Serialization(format!(
                    "scaler expects {} features but weights have {}",
                    s.n_features_in(),
                    params.linear.weights.len()
                )));
            }
        }
        Ok(Self {
            scaler,
            model: LinearModel::<Unfitted>::from_params(params.linear).into_fitted(),
        })
    }
}

/// Fitted [`LogisticRegression`]; `predict` returns `P(y = 1)`.
#[derive(Debug, Clone)]
pub struct FittedLogistic {
    inner: FittedLinear,
}

impl FittedLogistic {
    pub fn coefficients(&self) -> &LinearParams {
        self.inner.coefficients()
    }

    /// Log-odds for each row.
    pub fn decision_function(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>, ModelError> {
        self.inner.decision_function(x)
    }
}

impl Predictor for FittedLogistic {
    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>, ModelError> {
        Ok(self.decision_function(x)?.mapv(sigmoid))
    }
}

impl PersistentModel for FittedLogistic {
    type Params = FittedLinearParams;

    fn extract_params(&self) -> FittedLinearParams {
        self.inner.extract_params()
    }

    fn from_params(params: FittedLinearParams) -> Result<Self, ModelError> {
        Ok(Self {
            inner: FittedLinear::from_params(params)?,
        })
    }
}
