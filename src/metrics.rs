//! Scoring functions for model selection and reporting.
//!
//! Classification metrics expect `0/1` labels and predicted probabilities (or
//! any monotone score for [`roc_auc`]). All functions take `(y_true, y_pred)`.
//! Inputs of different lengths give `NaN` (`None` for [`roc_auc`]); use
//! [`Metric::score`] to get a [`StackingError::ShapeMismatch`] instead.

use crate::error::{Result, StackingError};
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Clip bound for probabilities in [`log_loss`].
const EPS: f64 = 1e-15;

/// Area under the ROC curve via the rank-sum (Mann–Whitney U) statistic.
///
/// Tied scores receive their average rank. Returns `None` when `y_true`
/// contains only one class.
pub fn roc_auc(y_true: ArrayView1<'_, f64>, y_score: ArrayView1<'_, f64>) -> Option<f64> {
    let n = y_true.len();
    let n_pos = y_true.iter().filter(|&&t| t == 1.0).count();
    let n_neg = n - n_pos;
    if n_pos == 0 || n_neg == 0 || y_score.len() != n {
        return None;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| y_score[a].total_cmp(&y_score[b]));

    let mut rank_sum_pos = 0.0;
    let mut start = 0;
    while start < n {
        let mut end = start + 1;
        while end < n && y_score[order[end]] == y_score[order[start]] {
            end += 1;
        }
        // ranks are 1-based: positions start..end share rank (start+1 + end) / 2
        let avg_rank = (start + 1 + end) as f64 / 2.0;
        let pos_in_group = order[start..end]
            .iter()
            .filter(|&&i| y_true[i] == 1.0)
            .count();
        rank_sum_pos += avg_rank * pos_in_group as f64;
        start = end;
    }

    let n_pos = n_pos as f64;
    let u = rank_sum_pos - n_pos * (n_pos + 1.0) / 2.0;
    Some(u / (n_pos * n_neg as f64))
}

/// Fraction of rows where `y_pred >= 0.5` agrees with `y_true == 1`.
pub fn accuracy(y_true: ArrayView1<'_, f64>, y_pred: ArrayView1<'_, f64>) -> f64 {
    if y_true.len() != y_pred.len() {
        return f64::NAN;
    }
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|&(&t, &p)| (p >= 0.5) == (t == 1.0))
        .count();
    correct as f64 / y_true.len() as f64
}

/// Binary cross-entropy with probabilities clipped to `[1e-15, 1 - 1e-15]`.
pub fn log_loss(y_true: ArrayView1<'_, f64>, y_pred: ArrayView1<'_, f64>) -> f64 {
    if y_true.len() != y_pred.len() {
        return f64::NAN;
    }
    if y_true.is_empty() {
        return 0.0;
    }
    let total: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(&t, &p)| {
            let p = p.clamp(EPS, 1.0 - EPS);
            -(t * p.ln() + (1.0 - t) * (1.0 - p).ln())
        })
        .sum();
    total / y_true.len() as f64
}

pub fn mse(y_true: ArrayView1<'_, f64>, y_pred: ArrayView1<'_, f64>) -> f64 {
    if y_true.len() != y_pred.len() {
        return f64::NAN;
    }
    if y_true.is_empty() {
        return 0.0;
    }
    squared_error(y_true, y_pred) / y_true.len() as f64
}

fn squared_error(y_true: ArrayView1<'_, f64>, y_pred: ArrayView1<'_, f64>) -> f64 {
    y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(&t, &p)| (t - p) * (t - p))
        .sum()
}

pub fn rmse(y_true: ArrayView1<'_, f64>, y_pred: ArrayView1<'_, f64>) -> f64 {
    mse(y_true, y_pred).sqrt()
}

pub fn mae(y_true: ArrayView1<'_, f64>, y_pred: ArrayView1<'_, f64>) -> f64 {
    if y_true.len() != y_pred.len() {
        return f64::NAN;
    }
    if y_true.is_empty() {
        return 0.0;
    }
    let total: f64 = y_true.iter().zip(y_pred.iter()).map(|(&t, &p)| (t - p).abs()).sum();
    total / y_true.len() as f64
}

/// Coefficient of determination. A constant target scores `1.0` for a perfect
/// fit and `0.0` otherwise.
pub fn r2(y_true: ArrayView1<'_, f64>, y_pred: ArrayView1<'_, f64>) -> f64 {
    if y_true.len() != y_pred.len() {
        return f64::NAN;
    }
    let Some(mean) = y_true.mean() else {
        return 0.0;
    };
    let ss_res = squared_error(y_true, y_pred);
    let ss_tot: f64 = y_true.mapv(|t| (t - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// Metric used to score tuning trials and report results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    #[default]
    RocAuc,
    Accuracy,
    LogLoss,
    Mse,
    Rmse,
    Mae,
    R2,
}

impl Metric {
    /// Scores predictions against labels.
    ///
    /// # Errors
    /// - [`StackingError::ShapeMismatch`] if the lengths differ.
    /// - [`StackingError::EmptyData`] for empty inputs.
    /// - [`StackingError::InvalidParameter`] for ROC AUC on single-class labels.
    pub fn score(&self, y_true: ArrayView1<'_, f64>, y_pred: ArrayView1<'_, f64>) -> Result<f64> {
        if y_true.len() != y_pred.len() {
            return Err(StackingError::ShapeMismatch {
                context: "metric inputs",
                expected: y_true.len(),
                got: y_pred.len(),
            });
        }
        if y_true.is_empty() {
            return Err(StackingError::EmptyData(format!("cannot compute {} on no rows", self)));
        }

        Ok(match self {
            Metric::RocAuc => roc_auc(y_true, y_pred).ok_or_else(|| {
                StackingError::invalid_parameter("roc_auc", "labels contain a single class")
            })?,
            Metric::Accuracy => accuracy(y_true, y_pred),
            Metric::LogLoss => log_loss(y_true, y_pred),
            Metric::Mse => mse(y_true, y_pred),
            Metric::Rmse => rmse(y_true, y_pred),
            Metric::Mae => mae(y_true, y_pred),
            Metric::R2 => r2(y_true, y_pred),
        })
    }

    pub fn greater_is_better(&self) -> bool {
        matches!(self, Metric::RocAuc | Metric::Accuracy | Metric::R2)
    }

    /// `true` if score `a` beats score `b` under this metric.
    pub fn is_better(&self, a: f64, b: f64) -> bool {
        if self.greater_is_better() {
            a > b
        } else {
            a < b
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::RocAuc => "roc_auc",
            Metric::Accuracy => "accuracy",
            Metric::LogLoss => "log_loss",
            Metric::Mse => "mse",
            Metric::Rmse => "rmse",
            Metric::Mae => "mae",
            Metric::R2 => "r2",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
