//! # stacklearne-rs
//!
//! Stacking ensembles in Rust: leakage-free out-of-fold meta-features,
//! cross-validated hyper-parameter search, and a second-level model on top.
//!
//! ## Core Design Principles
//!
//! - **No leakage**: every out-of-fold prediction comes from a model that never
//!   saw that row. Partitions are checked to be an exact cover before any fit.
//! - **Fresh models per fold**: [`Estimator::fit`](model::Estimator::fit) takes
//!   `&self` and returns a new fitted model, so folds cannot share state.
//! - **Training/Inference Separation**: fitted models carry only prediction
//!   parameters; losses, optimizers and the trainer live in separate modules.
//! - **Pluggable search**: tuning strategies implement
//!   [`SearchStrategy`](tuning::SearchStrategy) and see the full trial history.
//!
//! ## Quick Start
//!
//! ```rust
//! use stacklearne_rs::model::{DecisionTree, KNeighbors};
//! use stacklearne_rs::oof::OutOfFold;
//! use stacklearne_rs::partition::StratifiedKFold;
//! use ndarray::{Array1, Array2};
//!
//! let x = Array2::from_shape_fn((30, 2), |(i, j)| ((i + j) % 5) as f64 + (i % 2) as f64 * 4.0);
//! let y = Array1::from_shape_fn(30, |i| (i % 2) as f64);
//! let x_test = x.slice(ndarray::s![..6, ..]).to_owned();
//!
//! let partition = StratifiedKFold::new(3).split_labels(y.view()).unwrap();
//! let oof = OutOfFold::new(partition);
//!
//! let tree = oof.generate(&DecisionTree::new(), x.view(), y.view(), x_test.view()).unwrap();
//! let knn = oof.generate(&KNeighbors::new(3), x.view(), y.view(), x_test.view()).unwrap();
//!
//! assert_eq!(tree.train.dim(), (30, 1));
//! assert_eq!(knn.test.dim(), (6, 1));
//! ```
//!
//! ## Module Structure
//!
//! - `oof`: Out-of-fold meta-feature generation (sequential and parallel)
//! - `partition`: Fold partitions and K-fold / stratified splitters
//! - `model`: Estimator / predictor traits and reference models
//! - `tuning`: Search spaces, search strategies, cross-validated tuner
//! - `stacking`: End-to-end two-level stacking pipeline
//! - `metrics`: ROC AUC, accuracy, log loss and regression metrics
//! - `loss`, `optimizer`, `regularizers`, `trainer`: Gradient training for linear models
//! - `preprocessing`: Standardization and missing-value imputation
//! - `dataset`: In-memory datasets and CSV I/O
//! - `config`: TOML run configuration
//! - `serialization`: Model persistence and report files
//!
//! ## Example Projects
//!
//! See the `demos/` directory for complete pipelines:
//! - Stacking on a Titanic-style CSV
//! - Tuning base models, then stacking them with a tuned meta model

/// Error types shared across the crate.
pub mod error;

/// Data loading utilities and dataset abstractions.
pub mod dataset;

/// Data preprocessing transformers.
pub mod preprocessing;

/// Fold partitions and splitters.
pub mod partition;

/// Differentiable loss functions for model training.
pub mod loss;

/// Estimators, predictors and reference models.
pub mod model;

/// Optimization algorithms for parameter updates.
pub mod optimizer;

/// Weight regularization strategies to prevent overfitting.
pub mod regularizers;

/// Model persistence utilities.
pub mod serialization;

/// High-level training loop orchestration.
pub mod trainer;

pub mod metrics;
pub mod oof;
pub mod tuning;
pub mod stacking;
pub mod config;

pub use config::StackingConfig;
pub use dataset::Dataset;
pub use error::{ModelError, Result, StackingError};
pub use metrics::Metric;
pub use model::{BoxedEstimator, Estimator, Predictor};
pub use oof::{MetaFeatures, OutOfFold};
pub use partition::{FoldPartition, KFold, Splitter, StratifiedKFold};
pub use stacking::{BaseModelSpec, ModelKind, StackingEnsemble, StackingOutcome};
pub use tuning::{ParamRange, ParamSet, SearchSpace, Tuner, TuningReport};
