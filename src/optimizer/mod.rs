use crate::model::ParamOps;

/// Trait for gradient-based optimizers.
///
/// Optimizers update model parameters from computed gradients. Training logic
/// ([`Trainer`](crate::trainer::Trainer)) is decoupled from the update rule, so
/// any model whose parameters implement [`ParamOps`] can be paired with any
/// optimizer.
///
/// # Example
/// ```rust
/// use stacklearne_rs::model::linear::LinearParams;
/// use stacklearne_rs::optimizer::{Optimizer, SGD};
/// use ndarray::array;
///
/// let params = LinearParams { weights: array![1.0, 2.0], bias: 0.5 };
/// let grads = LinearParams { weights: array![0.1, -0.2], bias: -0.01 };
///
/// let sgd = SGD::new(0.1);
/// let updated = sgd.step(&params, &grads);
/// assert!((updated.weights[0] - 0.99).abs() < 1e-12);
/// ```
pub trait Optimizer<P> {
    /// Returns `params - update(gradients)` as a new value; inputs are not mutated.
    fn step(&self, params: &P, gradients: &P) -> P;
}

/// Stochastic Gradient Descent (SGD) optimizer.
///
/// ```text
/// θ ← θ - η · ∇L(θ)
/// ```
///
/// Stateless: no momentum and no adaptive learning rates.
#[derive(Debug, Clone, Copy)]
pub struct SGD {
    lr: f64,
}

impl SGD {
    /// Creates a new SGD optimizer with the specified learning rate.
    pub fn new(lr: f64) -> Self {
        Self { lr }
    }

    /// Returns the current learning rate.
    pub fn learning_rate(&self) -> f64 {
        self.lr
    }
}

impl<P: ParamOps> Optimizer<P> for SGD {
    fn step(&self, params: &P, gradients: &P) -> P {
        // Using (-lr) enables a single scaling operation instead of scale + subtract
        params.add(&gradients.scale(-self.lr))
    }
}
