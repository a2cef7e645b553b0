//! k-nearest-neighbours regression / probability estimation.
//!
//! The prediction for a row is the (optionally distance-weighted) mean label
//! of its `k` nearest training rows under Euclidean distance. With `0/1`
//! labels that mean is the fraction of positive neighbours, so the model can
//! serve as a probabilistic classifier in a stack.

use super::{check_fit_input, check_predict_input, Estimator, Predictor};
use crate::error::ModelError;
use crate::preprocessing::{
    FittedStandardScaler, FittedTransformer, StandardScaler, StandardScalerParams, Transformer,
};
use crate::serialization::PersistentModel;
use crate::tuning::ParamSet;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// How neighbour labels are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weighting {
    #[default]
    Uniform,
    /// Weight each neighbour by `1 / distance`. Exact matches take precedence.
    Distance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KNeighbors {
    pub k: usize,
    pub weighting: Weighting,
    pub standardize: bool,
}

impl Default for KNeighbors {
    fn default() -> Self {
        Self {
            k: 5,
            weighting: Weighting::Uniform,
            standardize: true,
        }
    }
}

impl KNeighbors {
    pub const PARAMS: &'static [&'static str] = &["k", "distance_weighted"];

    pub fn new(k: usize) -> Self {
        Self {
            k,
            ..Self::default()
        }
    }

    pub fn weighting(mut self, weighting: Weighting) -> Self {
        self.weighting = weighting;
        self
    }

    pub fn standardize(mut self, standardize: bool) -> Self {
        self.standardize = standardize;
        self
    }

    /// Reads `k` and `distance_weighted` (values `>= 0.5` select
    /// [`Weighting::Distance`]).
    pub fn from_params(params: &ParamSet) -> Result<Self, ModelError> {
        params.check_known("knn", Self::PARAMS)?;
        let defaults = Self::default();
        let weighting = match params.get("distance_weighted") {
            Some(v) if v >= 0.5 => Weighting::Distance,
            Some(_) => Weighting::Uniform,
            None => defaults.weighting,
        };
        let model = Self {
            k: params.get_usize_or("k", defaults.k)?,
            weighting,
            ..defaults
        };
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.k == 0 {
            return Err(ModelError::invalid_parameter("k", "must be >= 1"));
        }
        Ok(())
    }
}

impl Estimator for KNeighbors {
    type Fitted = FittedKNeighbors;

    fn fit(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
    ) -> Result<FittedKNeighbors, ModelError> {
        self.validate()?;
        check_fit_input(&x, &y)?;

        let scaler = if self.standardize {
            Some(StandardScaler::new().fit(x)?)
        } else {
            None
        };
        let points = match &scaler {
            Some(s) => s.transform(x)?,
            None => x.to_owned(),
        };

        Ok(FittedKNeighbors {
            k: self.k,
            weighting: self.weighting,
            scaler,
            points,
            labels: y.to_owned(),
        })
    }

    fn name(&self) -> &str {
        "knn"
    }
}

/// Fitted [`KNeighbors`]: the (scaled) training rows and their labels.
#[derive(Debug, Clone)]
pub struct FittedKNeighbors {
    k: usize,
    weighting: Weighting,
    scaler: Option<FittedStandardScaler>,
    points: Array2<f64>,
    labels: Array1<f64>,
}

impl FittedKNeighbors {
    /// Effective neighbour count (never more than the training rows).
    pub fn k(&self) -> usize {
        self.k.min(self.labels.len())
    }

    fn predict_row(&self, row: ArrayView1<'_, f64>, scratch: &mut Vec<(f64, usize)>) -> f64 {
        scratch.clear();
        scratch.extend(self.points.outer_iter().enumerate().map(|(i, p)| {
            let d2: f64 = p.iter().zip(row.iter()).map(|(a, b)| (a - b).powi(2)).sum();
            (d2, i)
        }));
        // nearest first; index breaks ties so results do not depend on sort internals
        scratch.sort_unstable_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        let neighbours = &scratch[..self.k()];

        match self.weighting {
            Weighting::Uniform => {
                neighbours.iter().map(|&(_, i)| self.labels[i]).sum::<f64>()
                    / neighbours.len() as f64
            }
            Weighting::Distance => {
                let exact: Vec<f64> = neighbours
                    .iter()
                    .filter(|(d2, _)| *d2 == 0.0)
                    .map(|&(_, i)| self.labels[i])
                    .collect();
                if !exact.is_empty() {
                    return exact.iter().sum::<f64>() / exact.len() as f64;
                }
                let (num, den) = neighbours.iter().fold((0.0, 0.0), |(num, den), &(d2, i)| {
                    let w = 1.0 / d2.sqrt();
                    (num + w * self.labels[i], den + w)
                });
                num / den
            }
        }
    }
}

impl Predictor for FittedKNeighbors {
    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>, ModelError> {
        check_predict_input(&x, self.points.ncols())?;
        let queries = match &self.scaler {
            Some(s) => s.transform(x)?,
            None => x.to_owned(),
        };

        let mut scratch = Vec::with_capacity(self.labels.len());
        Ok(queries
            .axis_iter(Axis(0))
            .map(|row| self.predict_row(row, &mut scratch))
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedKNeighborsParams {
    pub k: usize,
    pub weighting: Weighting,
    pub scaler: Option<StandardScalerParams>,
    pub points: Array2<f64>,
    pub labels: Array1<f64>,
}

impl PersistentModel for FittedKNeighbors {
    type Params = FittedKNeighborsParams;

    fn extract_params(&self) -> FittedKNeighborsParams {
        FittedKNeighborsParams {
            k: self.k,
            weighting: self.weighting,
            scaler: self.scaler.as_ref().map(|s| s.extract_params()),
            points: self.points.clone(),
            labels: self.labels.clone(),
        }
    }

    fn from_params(params: FittedKNeighborsParams) -> Result<Self, ModelError> {
        if params.points.nrows() != params.labels.len() || params.labels.is_empty() {
            return Err(ModelError::Serialization(format!(
                "k-NN state has {} points and {} labels",
                params.points.nrows(),
                params.labels.len()
            )));
        }
        Ok(Self {
            k: params.k,
            weighting: params.weighting,
            scaler: params
                .scaler
                .map(FittedStandardScaler::from_params)
                .transpose()?,
            points: params.points,
            labels: params.labels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn clusters() -> (Array2<f64>, Array1<f64>) {
        let x = array![[0.0, 0.0], [0.1, 0.0], [0.0, 0.1], [5.0, 5.0], [5.1, 5.0], [5.0, 5.1]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_uniform_neighbours() {
        let (x, y) = clusters();
        let fitted = KNeighbors::new(3).fit(x.view(), y.view()).unwrap();
        let preds = fitted.predict(array![[0.05, 0.05], [4.9, 5.0]].view()).unwrap();
        assert_eq!(preds.to_vec(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_k_larger_than_training_set_uses_all_rows() {
        let (x, y) = clusters();
        let fitted = KNeighbors::new(50).fit(x.view(), y.view()).unwrap();
        assert_eq!(fitted.k(), 6);
        let preds = fitted.predict(array![[2.5, 2.5]].view()).unwrap();
        assert_abs_diff_eq!(preds[0], 0.5);
    }

    #[test]
    fn test_distance_weighting() {
        let x = array![[0.0], [1.0], [3.0]];
        let y = array![0.0, 1.0, 3.0];
        let fitted = KNeighbors::new(2)
            .weighting(Weighting::Distance)
            .standardize(false)
            .fit(x.view(), y.view())
            .unwrap();

        // neighbours of 0.5: rows 0 and 1 at distance 0.5 each
        let preds = fitted.predict(array![[0.5], [1.0], [2.0]].view()).unwrap();
        assert_abs_diff_eq!(preds[0], 0.5);
        // exact match wins
        assert_abs_diff_eq!(preds[1], 1.0);
        // 2.0: rows 1 and 2 at distance 1.0
        assert_abs_diff_eq!(preds[2], 2.0);
    }

    #[test]
    fn test_from_params() {
        let model =
            KNeighbors::from_params(&ParamSet::new().with("k", 7.4).with("distance_weighted", 1.0))
                .unwrap();
        assert_eq!(model.k, 7);
        assert_eq!(model.weighting, Weighting::Distance);

        assert!(KNeighbors::from_params(&ParamSet::new().with("k", 0.0)).is_err());
        assert!(KNeighbors::from_params(&ParamSet::new().with("depth", 1.0)).is_err());
    }

    #[test]
    fn test_errors() {
        let (x, y) = clusters();
        let fitted = KNeighbors::default().fit(x.view(), y.view()).unwrap();
        assert!(matches!(
            fitted.predict(array![[1.0]].view()),
            Err(ModelError::FeatureMismatch { expected: 2, got: 1 })
        ));

        let empty = Array2::<f64>::zeros((0, 2));
        assert!(KNeighbors::default()
            .fit(empty.view(), Array1::zeros(0).view())
            .is_err());
    }

    #[test]
    fn test_params_round_trip() {
        let (x, y) = clusters();
        let fitted = KNeighbors::new(2).fit(x.view(), y.view()).unwrap();
        let restored = FittedKNeighbors::from_params(fitted.extract_params()).unwrap();
        let q = array![[1.0, 1.0], [4.0, 4.0]];
        assert_eq!(restored.predict(q.view()).unwrap(), fitted.predict(q.view()).unwrap());
    }
}
