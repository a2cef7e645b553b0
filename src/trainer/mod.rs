use crate::{
    error::ModelError,
    loss::Loss,
    model::{ParamOps, TrainableModel},
    optimizer::Optimizer,
    regularizers::Regularizer,
};
use ndarray::{ArrayView1, ArrayView2, Axis};
use tracing::{debug, trace};

/// Orchestrates the mini-batch training loop for a [`TrainableModel`].
///
/// Combines a loss function, optimizer, and regularizer. Once built via
/// [`TrainerBuilder`], a trainer is immutable and can be reused for many models
/// (every fold of a cross-validation run shares one trainer).
///
/// `fit` consumes an unfitted model and returns its fitted counterpart, which
/// contains only inference logic.
#[derive(Debug, Clone)]
pub struct Trainer<L, O, R> {
    pub(crate) batch_size: usize,
    pub(crate) max_epochs: usize,
    pub(crate) tolerance: f64,
    pub(crate) loss_fn: L,
    pub(crate) optimizer: O,
    pub(crate) regularizer: R,
}

/// Fluent builder for constructing a [`Trainer`].
///
/// Defaults:
/// - `batch_size`: 32
/// - `max_epochs`: 1000
/// - `tolerance`: 0.0 (always run every epoch)
#[derive(Debug, Clone)]
pub struct TrainerBuilder<L, O, R> {
    batch_size: usize,
    max_epochs: usize,
    tolerance: f64,
    loss_fn: L,
    optimizer: O,
    regularizer: R,
}

impl<L, O, R> TrainerBuilder<L, O, R> {
    /// Creates a new `TrainerBuilder` with the given components.
    ///
    /// # Arguments
    /// * `loss_fn`: differentiable loss (e.g., `MSELoss`)
    /// * `optimizer`: parameter updater (e.g., `SGD`)
    /// * `regularizer`: penalty term (e.g., `L2` or `NoRegularizer`)
    pub fn new(loss_fn: L, optimizer: O, regularizer: R) -> Self {
        Self {
            batch_size: 32,
            max_epochs: 1000,
            tolerance: 0.0,
            loss_fn,
            optimizer,
            regularizer,
        }
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn max_epochs(mut self, epochs: usize) -> Self {
        self.max_epochs = epochs;
        self
    }

    /// Stops early once the epoch loss changes by less than `tolerance`.
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn build(self) -> Trainer<L, O, R> {
        Trainer {
            batch_size: self.batch_size,
            max_epochs: self.max_epochs,
            tolerance: self.tolerance,
            loss_fn: self.loss_fn,
            optimizer: self.optimizer,
            regularizer: self.regularizer,
        }
    }
}

impl<L, O, R> Trainer<L, O, R> {
    /// Convenience constructor that starts the builder pattern.
    pub fn builder(loss_fn: L, optimizer: O, regularizer: R) -> TrainerBuilder<L, O, R> {
        TrainerBuilder::new(loss_fn, optimizer, regularizer)
    }
}

impl<L: Loss, O, R> Trainer<L, O, R> {
    /// Trains the model on `x` / `y` for up to `max_epochs`.
    ///
    /// Rows are visited in order, `batch_size` at a time. Gradients are
    /// averaged per batch before regularization is added.
    ///
    /// # Errors
    /// - [`ModelError::InvalidInput`] for empty or misaligned data
    /// - [`ModelError::InvalidParameter`] for a zero batch size
    /// - [`ModelError::NumericalError`] when the loss or parameters stop being finite
    pub fn fit<M>(
        &self,
        mut model: M,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
    ) -> Result<M::Output, ModelError>
    where
        M: TrainableModel,
        O: Optimizer<M::Params>,
        R: Regularizer<M>,
    {
        let n_total = x.nrows();
        if n_total == 0 {
            return Err(ModelError::InvalidInput("dataset is empty".into()));
        }
        if n_total != y.len() {
            return Err(ModelError::InvalidInput(format!(
                "x has {} rows but y has {} labels",
                n_total,
                y.len()
            )));
        }
        if self.batch_size == 0 {
            return Err(ModelError::invalid_parameter("batch_size", "must be > 0"));
        }

        let mut prev_loss = f64::INFINITY;
        for epoch in 0..self.max_epochs {
            let mut total_loss = 0.0;
            let batches = x
                .axis_chunks_iter(Axis(0), self.batch_size)
                .zip(y.axis_chunks_iter(Axis(0), self.batch_size));

            for (batch_x, batch_y) in batches {
                let preds = model.forward(batch_x);
                total_loss += self.loss_fn.loss(preds.view(), batch_y) * batch_x.nrows() as f64;

                let (_, reg_grad) = self.regularizer.penalty_grad(&model);
                let grad_preds = self.loss_fn.grad_wrt_prediction(preds.view(), batch_y);
                let grads = model.backward(batch_x, grad_preds.view());

                let total_grads = grads.add(&reg_grad);
                let new_params = self.optimizer.step(model.params(), &total_grads);
                if !new_params.is_finite() {
                    return Err(ModelError::NumericalError(format!(
                        "parameters diverged at epoch {}",
                        epoch
                    )));
                }
                model.update_params(new_params);
            }

            let (penalty, _) = self.regularizer.penalty_grad(&model);
            let avg_loss = total_loss / n_total as f64 + penalty;
            trace!(epoch, loss = avg_loss, "epoch finished");

            if !avg_loss.is_finite() {
                return Err(ModelError::NumericalError(format!(
                    "loss is not finite at epoch {}",
                    epoch
                )));
            }
            if self.tolerance > 0.0 && (prev_loss - avg_loss).abs() < self.tolerance {
                debug!(epoch, loss = avg_loss, "converged");
                break;
            }
            prev_loss = avg_loss;
        }

        Ok(model.into_fitted())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        loss::{BCEWithLogitsLoss, MSELoss},
        model::linear::LinearModel,
        model::Unfitted,
        optimizer::SGD,
        regularizers::{NoRegularizer, L2},
    };
    use ndarray::{array, Array1, Array2};

    // === TrainerBuilder Tests ===

    #[test]
    fn test_trainer_builder_default_values() {
        let builder = TrainerBuilder::new(MSELoss, SGD::new(0.01), NoRegularizer);

        assert_eq!(builder.batch_size, 32);
        assert_eq!(builder.max_epochs, 1000);
        assert_eq!(builder.tolerance, 0.0);
    }

    #[test]
    fn test_trainer_builder_chaining() {
        let trainer = Trainer::builder(MSELoss, SGD::new(0.01), NoRegularizer)
            .batch_size(64)
            .max_epochs(500)
            .tolerance(1e-6)
            .build();

        assert_eq!(trainer.batch_size, 64);
        assert_eq!(trainer.max_epochs, 500);
        assert_eq!(trainer.tolerance, 1e-6);
    }

    // === Fit Tests ===

    #[test]
    fn test_fit_linear_identity() {
        // y = x
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![1.0, 2.0, 3.0, 4.0];

        let trainer = Trainer::builder(MSELoss, SGD::new(0.05), NoRegularizer)
            .batch_size(4)
            .max_epochs(2000)
            .build();
        let fitted = trainer
            .fit(LinearModel::<Unfitted>::new(1), x.view(), y.view())
            .unwrap();

        let pred = fitted.decision_function(array![[2.5]].view());
        assert!((pred[0] - 2.5).abs() < 0.05, "Expected ~2.5, got {}", pred[0]);
    }

    #[test]
    fn test_fit_linear_with_bias() {
        // y = 2*x + 1
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![1.0, 3.0, 5.0, 7.0];

        let trainer = Trainer::builder(MSELoss, SGD::new(0.05), NoRegularizer)
            .batch_size(2)
            .max_epochs(3000)
            .build();
        let fitted = trainer
            .fit(LinearModel::<Unfitted>::new(1), x.view(), y.view())
            .unwrap();

        let params = fitted.params();
        assert!((params.weights[0] - 2.0).abs() < 0.05, "w = {}", params.weights[0]);
        assert!((params.bias - 1.0).abs() < 0.1, "b = {}", params.bias);
    }

    #[test]
    fn test_l2_shrinks_weights() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![0.0, 2.0, 4.0, 6.0];

        let plain = Trainer::builder(MSELoss, SGD::new(0.05), NoRegularizer)
            .max_epochs(2000)
            .build()
            .fit(LinearModel::<Unfitted>::new(1), x.view(), y.view())
            .unwrap();
        let ridge = Trainer::builder(MSELoss, SGD::new(0.05), L2::new(0.5))
            .max_epochs(2000)
            .build()
            .fit(LinearModel::<Unfitted>::new(1), x.view(), y.view())
            .unwrap();

        assert!(ridge.params().weights[0].abs() < plain.params().weights[0].abs());
    }

    #[test]
    fn test_fit_logistic_separates_classes() {
        let x = array![[-2.0], [-1.0], [-0.5], [0.5], [1.0], [2.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let trainer = Trainer::builder(BCEWithLogitsLoss, SGD::new(0.5), NoRegularizer)
            .max_epochs(500)
            .build();
        let fitted = trainer
            .fit(LinearModel::<Unfitted>::new(1), x.view(), y.view())
            .unwrap();

        let logits = fitted.decision_function(x.view());
        for (z, t) in logits.iter().zip(y.iter()) {
            assert_eq!(*z > 0.0, *t == 1.0);
        }
    }

    #[test]
    fn test_fit_rejects_empty_and_misaligned() {
        let trainer = Trainer::builder(MSELoss, SGD::new(0.01), NoRegularizer).build();

        let empty = Array2::<f64>::zeros((0, 2));
        let err = trainer
            .fit(LinearModel::<Unfitted>::new(2), empty.view(), Array1::zeros(0).view())
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidInput(_)));

        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let err = trainer
            .fit(LinearModel::<Unfitted>::new(2), x.view(), array![1.0].view())
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidInput(_)));
    }

    #[test]
    fn test_fit_reports_divergence() {
        let x = array![[100.0], [200.0], [300.0]];
        let y = array![1.0, 2.0, 3.0];

        let trainer = Trainer::builder(MSELoss, SGD::new(10.0), NoRegularizer)
            .max_epochs(1000)
            .build();
        let err = trainer
            .fit(LinearModel::<Unfitted>::new(1), x.view(), y.view())
            .unwrap_err();
        assert!(matches!(err, ModelError::NumericalError(_)));
    }

    #[test]
    fn test_zero_batch_size_is_invalid() {
        let trainer = Trainer::builder(MSELoss, SGD::new(0.01), NoRegularizer)
            .batch_size(0)
            .build();
        let x = array![[1.0]];
        let err = trainer
            .fit(LinearModel::<Unfitted>::new(1), x.view(), array![1.0].view())
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidParameter { .. }));
    }
}
