//! Simple Imputer.
//!
//! Replaces missing values (NaN, as produced for empty CSV cells) column by
//! column with a learned statistic or a constant.

use super::{check_width, FittedTransformer, Transformer};
use crate::error::ModelError;
use crate::serialization::PersistentModel;
use ndarray::{Array1, Array2, ArrayView2, Axis, Zip};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Strategy for imputing missing values.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImputeStrategy {
    /// Column mean of the observed values.
    #[default]
    Mean,
    /// Column median of the observed values.
    Median,
    /// Most frequent observed value (smallest value wins ties).
    MostFrequent,
    /// A fixed fill value.
    Constant(f64),
}

/// Serializable parameters of a [`FittedSimpleImputer`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimpleImputerParams {
    pub strategy: ImputeStrategy,
    /// Fill value for each column.
    pub statistics: Vec<f64>,
}

/// SimpleImputer transformer (unfitted).
#[derive(Clone, Debug, Default)]
pub struct SimpleImputer {
    strategy: ImputeStrategy,
}

impl SimpleImputer {
    pub fn new(strategy: ImputeStrategy) -> Self {
        Self { strategy }
    }
}

/// Fill value for one column, ignoring NaN. All-missing columns fill with 0.
fn column_statistic(column: impl Iterator<Item = f64>, strategy: &ImputeStrategy) -> f64 {
    let mut observed: Vec<f64> = column.filter(|v| !v.is_nan()).collect();
    if observed.is_empty() {
        return match strategy {
            ImputeStrategy::Constant(val) => *val,
            _ => 0.0,
        };
    }

    match strategy {
        ImputeStrategy::Mean => observed.iter().sum::<f64>() / observed.len() as f64,
        ImputeStrategy::Median => {
            observed.sort_by(f64::total_cmp);
            let n = observed.len();
            if n % 2 == 0 {
                (observed[n / 2 - 1] + observed[n / 2]) / 2.0
            } else {
                observed[n / 2]
            }
        }
        ImputeStrategy::MostFrequent => {
            let mut counts: HashMap<u64, usize> = HashMap::new();
            for v in &observed {
                *counts.entry(v.to_bits()).or_insert(0) += 1;
            }
            counts
                .into_iter()
                .map(|(bits, count)| (f64::from_bits(bits), count))
                .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.total_cmp(&a.0)))
                .map(|(v, _)| v)
                .unwrap_or(0.0)
        }
        ImputeStrategy::Constant(val) => *val,
    }
}

impl Transformer for SimpleImputer {
    type Fitted = FittedSimpleImputer;

    fn fit(&self, data: ArrayView2<'_, f64>) -> Result<FittedSimpleImputer, ModelError> {
        if data.nrows() == 0 {
            return Err(ModelError::InvalidInput(
                "cannot fit SimpleImputer on empty data".into(),
            ));
        }

        let statistics = data
            .axis_iter(Axis(1))
            .map(|col| column_statistic(col.iter().copied(), &self.strategy))
            .collect::<Array1<f64>>();

        Ok(FittedSimpleImputer {
            strategy: self.strategy.clone(),
            statistics,
        })
    }
}

/// Fitted SimpleImputer ready for inference.
#[derive(Clone, Debug)]
pub struct FittedSimpleImputer {
    strategy: ImputeStrategy,
    statistics: Array1<f64>,
}

impl FittedSimpleImputer {
    /// Fill value for each column.
    pub fn statistics(&self) -> &Array1<f64> {
        &self.statistics
    }
}

impl FittedTransformer for FittedSimpleImputer {
    fn transform(&self, data: ArrayView2<'_, f64>) -> Result<Array2<f64>, ModelError> {
        check_width(&data, self.n_features_in())?;
        let mut out = data.to_owned();
        for mut row in out.axis_iter_mut(Axis(0)) {
            Zip::from(&mut row)
                .and(&self.statistics)
                .for_each(|v, &fill| {
                    if v.is_nan() {
                        *v = fill;
                    }
                });
        }
        Ok(out)
    }

    fn n_features_in(&self) -> usize {
        self.statistics.len()
    }
}

impl PersistentModel for FittedSimpleImputer {
    type Params = SimpleImputerParams;

    fn extract_params(&self) -> SimpleImputerParams {
        SimpleImputerParams {
            strategy: self.strategy.clone(),
            statistics: self.statistics.to_vec(),
        }
    }

    fn from_params(params: SimpleImputerParams) -> Result<Self, ModelError> {
        Ok(Self {
            strategy: params.strategy,
            statistics: Array1::from(params.statistics),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn with_gaps() -> Array2<f64> {
        array![
            [1.0, f64::NAN, 5.0],
            [f64::NAN, 2.0, 5.0],
            [3.0, 4.0, 9.0],
            [f64::NAN, 4.0, f64::NAN],
        ]
    }

    #[test]
    fn test_mean_imputation() {
        let imputed = SimpleImputer::new(ImputeStrategy::Mean)
            .fit_transform(with_gaps().view())
            .unwrap();

        assert_eq!(imputed[[1, 0]], 2.0);
        assert_eq!(imputed[[3, 0]], 2.0);
        assert!((imputed[[0, 1]] - 10.0 / 3.0).abs() < 1e-12);
        assert!(imputed.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_median_and_most_frequent() {
        let data = with_gaps();
        let median = SimpleImputer::new(ImputeStrategy::Median)
            .fit(data.view())
            .unwrap();
        assert_eq!(median.statistics().to_vec(), vec![2.0, 4.0, 5.0]);

        let mode = SimpleImputer::new(ImputeStrategy::MostFrequent)
            .fit(data.view())
            .unwrap();
        // column 0 ties between 1 and 3: smallest wins
        assert_eq!(mode.statistics().to_vec(), vec![1.0, 4.0, 5.0]);
    }

    #[test]
    fn test_constant_and_all_missing_column() {
        let data = array![[f64::NAN, 1.0], [f64::NAN, 2.0]];
        let zero = SimpleImputer::default().fit(data.view()).unwrap();
        assert_eq!(zero.statistics()[0], 0.0);

        let filled = SimpleImputer::new(ImputeStrategy::Constant(-1.0))
            .fit_transform(data.view())
            .unwrap();
        assert_eq!(filled, array![[-1.0, 1.0], [-1.0, 2.0]]);
    }

    #[test]
    fn test_transform_checks_width() {
        let fitted = SimpleImputer::default().fit(with_gaps().view()).unwrap();
        let narrow = array![[1.0]];
        assert!(matches!(
            fitted.transform(narrow.view()),
            Err(ModelError::FeatureMismatch { expected: 3, got: 1 })
        ));
    }

    #[test]
    fn test_params_round_trip() {
        let fitted = SimpleImputer::new(ImputeStrategy::Median)
            .fit(with_gaps().view())
            .unwrap();
        let restored = FittedSimpleImputer::from_params(fitted.extract_params()).unwrap();
        assert_eq!(restored.statistics(), fitted.statistics());
    }
}
