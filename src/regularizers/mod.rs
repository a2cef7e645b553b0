use crate::model::linear::{LinearModel, LinearParams};
use crate::model::{TrainableModel, Unfitted};

/// Penalty on model parameters added to the training loss.
///
/// Returns the penalty value and its gradient w.r.t. the parameters.
pub trait Regularizer<M: TrainableModel> {
    fn penalty_grad(&self, model: &M) -> (f64, M::Params);
}

/// Ridge penalty `λ·‖w‖²`. The bias is not penalized.
#[derive(Debug, Clone, Copy)]
pub struct L2 {
    lambda: f64,
}

impl L2 {
    pub fn new(lambda: f64) -> Self {
        Self { lambda }
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }
}

impl Regularizer<LinearModel<Unfitted>> for L2 {
    fn penalty_grad(&self, model: &LinearModel<Unfitted>) -> (f64, LinearParams) {
        let params = model.params();
        let penalty = self.lambda * params.weights.dot(&params.weights);
        let grad = LinearParams {
            weights: &params.weights * (2.0 * self.lambda),
            bias: 0.0,
        };
        (penalty, grad)
    }
}

/// No penalty.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRegularizer;

impl Regularizer<LinearModel<Unfitted>> for NoRegularizer {
    fn penalty_grad(&self, model: &LinearModel<Unfitted>) -> (f64, LinearParams) {
        (0.0, LinearParams::zeros(model.params().weights.len()))
    }
}
