/// Marker type for a model that has **not been trained yet**.
///
/// Used as the state parameter of [`LinearModel`](crate::model::LinearModel):
/// a `LinearModel<Unfitted>` exposes the forward/backward passes consumed by
/// the [`Trainer`](crate::trainer::Trainer) and nothing else.
#[derive(Debug, Clone, Copy)]
pub struct Unfitted;

/// Marker type for a model that has been **fully trained**.
///
/// A `LinearModel<Fitted>` carries only inference parameters. No optimizer
/// state, loss function or training hyper-parameters survive the transition.
#[derive(Debug, Clone, Copy)]
pub struct Fitted;
