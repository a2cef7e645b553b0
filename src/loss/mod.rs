use ndarray::{Array1, ArrayView1, Zip};

/// A differentiable loss function used during model training.
///
/// Implementors define:
/// - How to compute the scalar loss value (for logging and divergence checks).
/// - How to compute the gradient of the loss w.r.t. the model's raw output.
///
/// The gradient is passed to [`TrainableModel::backward`](crate::model::TrainableModel::backward).
pub trait Loss {
    /// Mean loss over the batch.
    fn loss(&self, prediction: ArrayView1<'_, f64>, target: ArrayView1<'_, f64>) -> f64;

    /// Gradient of the mean loss w.r.t. the prediction: ∂L/∂pred.
    fn grad_wrt_prediction(
        &self,
        prediction: ArrayView1<'_, f64>,
        target: ArrayView1<'_, f64>,
    ) -> Array1<f64>;
}

/// Mean Squared Error (MSE) loss: `L = (1/n) * Σ(pred_i - target_i)^2`
///
/// Gradient w.r.t. prediction: `∂L/∂pred = (pred - target) / n`
///
/// Note: The factor of 2 is omitted, as it can be absorbed into the learning rate.
#[derive(Debug, Clone, Copy, Default)]
pub struct MSELoss;

impl Loss for MSELoss {
    fn loss(&self, pred: ArrayView1<'_, f64>, target: ArrayView1<'_, f64>) -> f64 {
        let diff = &pred - &target;
        diff.dot(&diff) / pred.len().max(1) as f64
    }

    fn grad_wrt_prediction(
        &self,
        pred: ArrayView1<'_, f64>,
        target: ArrayView1<'_, f64>,
    ) -> Array1<f64> {
        let n = pred.len().max(1) as f64;
        (&pred - &target) / n
    }
}

/// Binary Cross-Entropy loss with logits input (numerically stable).
///
/// Computes: `L = -(t * log(σ(z)) + (1-t) * log(1 - σ(z)))`
/// using the stable formulation: `max(z,0) - z*t + log(1 + exp(-|z|))`
///
/// Gradient w.r.t. logits: `∂L/∂z = (σ(z) - t) / n`
#[derive(Debug, Clone, Copy, Default)]
pub struct BCEWithLogitsLoss;

impl Loss for BCEWithLogitsLoss {
    fn loss(&self, logits: ArrayView1<'_, f64>, targets: ArrayView1<'_, f64>) -> f64 {
        let total: f64 = Zip::from(&logits)
            .and(&targets)
            .fold(0.0, |acc, &z, &t| {
                acc + z.max(0.0) - z * t + (-z.abs()).exp().ln_1p()
            });
        total / logits.len().max(1) as f64
    }

    fn grad_wrt_prediction(
        &self,
        logits: ArrayView1<'_, f64>,
        targets: ArrayView1<'_, f64>,
    ) -> Array1<f64> {
        let n = logits.len().max(1) as f64;
        Zip::from(&logits)
            .and(&targets)
            .map_collect(|&z, &t| (sigmoid(z) - t) / n)
    }
}

/// Logistic function, stable for large `|z|`.
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}
