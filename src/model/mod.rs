//! Model capabilities and reference base models.
//!
//! The stacking machinery only needs two operations from a model, split over
//! two traits in the same way training and inference are split everywhere in
//! this crate:
//!
//! - [`Estimator`]: unfitted configuration. `fit(&self, ..)` returns a brand
//!   new fitted model, so no state can leak from one fit into the next.
//! - [`Predictor`]: fitted model, `predict` only.
//!
//! Heterogeneous model lists (the first layer of a stack) use the
//! type-erased [`BoxedEstimator`].

use crate::error::ModelError;
use ndarray::{Array1, ArrayView1, ArrayView2};

pub mod state;
pub use state::{Fitted, Unfitted};

pub mod knn;
pub mod linear;
pub mod tree;

pub use knn::{FittedKNeighbors, KNeighbors, Weighting};
pub use linear::{FittedLinear, FittedLogistic, LinearModel, LinearRegression, LogisticRegression};
pub use tree::{DecisionTree, FittedDecisionTree};

/// A model under gradient-based training.
///
/// Implemented by `LinearModel<Unfitted>`; consumed by
/// [`Trainer`](crate::trainer::Trainer).
pub trait TrainableModel {
    type Params: ParamOps;
    type Output;

    /// Raw model output for a batch (before any link function).
    fn forward(&self, x: ArrayView2<'_, f64>) -> Array1<f64>;

    /// Gradients w.r.t. parameters given `dL/d(output)`.
    fn backward(&self, x: ArrayView2<'_, f64>, grad_output: ArrayView1<'_, f64>) -> Self::Params;

    fn params(&self) -> &Self::Params;

    fn update_params(&mut self, new_params: Self::Params);

    fn into_fitted(self) -> Self::Output;
}

/// Arithmetic on parameter structures, used by optimizers and regularizers.
pub trait ParamOps: Clone {
    fn add(&self, other: &Self) -> Self;
    fn scale(&self, factor: f64) -> Self;
    fn is_finite(&self) -> bool;
}

/// A fitted model that maps a feature matrix to one prediction per row.
pub trait Predictor {
    /// Predicts every row of `x`.
    ///
    /// Implementations must return exactly `x.nrows()` values.
    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>, ModelError>;
}

/// An unfitted model configuration.
pub trait Estimator {
    type Fitted: Predictor;

    /// Fits a fresh model on `x` / `y`.
    fn fit(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
    ) -> Result<Self::Fitted, ModelError>;

    /// Human-readable name used in logs and tuning reports.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<P: Predictor + ?Sized> Predictor for Box<P> {
    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>, ModelError> {
        (**self).predict(x)
    }
}

/// Object-safe form of [`Estimator`], implemented for every thread-safe estimator.
pub trait DynEstimator: Send + Sync {
    fn fit_dyn(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
    ) -> Result<BoxedPredictor, ModelError>;

    fn dyn_name(&self) -> &str;
}

impl<E> DynEstimator for E
where
    E: Estimator + Send + Sync,
    E::Fitted: Send + Sync + 'static,
{
    fn fit_dyn(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
    ) -> Result<BoxedPredictor, ModelError> {
        let fitted = self.fit(x, y)?;
        Ok(Box::new(fitted))
    }

    fn dyn_name(&self) -> &str {
        self.name()
    }
}

/// Type-erased fitted model.
pub type BoxedPredictor = Box<dyn Predictor + Send + Sync>;

/// Type-erased estimator with an optional display name.
pub struct BoxedEstimator {
    inner: Box<dyn DynEstimator>,
    name: Option<String>,
}

impl BoxedEstimator {
    pub fn new<E>(estimator: E) -> Self
    where
        E: Estimator + Send + Sync + 'static,
        E::Fitted: Send + Sync + 'static,
    {
        Self {
            inner: Box::new(estimator),
            name: None,
        }
    }

    /// Overrides the name reported by [`Estimator::name`].
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl Estimator for BoxedEstimator {
    type Fitted = BoxedPredictor;

    fn fit(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
    ) -> Result<Self::Fitted, ModelError> {
        self.inner.fit_dyn(x, y)
    }

    fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.inner.dyn_name())
    }
}

impl std::fmt::Debug for BoxedEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxedEstimator")
            .field("name", &self.name())
            .finish()
    }
}

/// Shared input checks for `fit`.
pub(crate) fn check_fit_input(
    x: &ArrayView2<'_, f64>,
    y: &ArrayView1<'_, f64>,
) -> Result<(), ModelError> {
    if x.nrows() == 0 {
        return Err(ModelError::InvalidInput("cannot fit on zero rows".into()));
    }
    if x.nrows() != y.len() {
        return Err(ModelError::InvalidInput(format!(
            "x has {} rows but y has {} labels",
            x.nrows(),
            y.len()
        )));
    }
    check_finite(x)?;
    if y.iter().any(|v| !v.is_finite()) {
        return Err(ModelError::InvalidInput("labels contain NaN or infinity".into()));
    }
    Ok(())
}

/// Shared input checks for `predict`.
pub(crate) fn check_predict_input(
    x: &ArrayView2<'_, f64>,
    n_features: usize,
) -> Result<(), ModelError> {
    if x.ncols() != n_features {
        return Err(ModelError::FeatureMismatch {
            expected: n_features,
            got: x.ncols(),
        });
    }
    check_finite(x)
}

fn check_finite(x: &ArrayView2<'_, f64>) -> Result<(), ModelError> {
    if x.iter().any(|v| !v.is_finite()) {
        return Err(ModelError::InvalidInput(
            "features contain NaN or infinity".into(),
        ));
    }
    Ok(())
}
