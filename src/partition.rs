//! Fold partitions over training rows.
//!
//! A [`FoldPartition`] is an ordered list of [`Fold`]s whose validation slices
//! cover every training row exactly once. Construction always validates this
//! invariant, and [`FoldPartition::validate`] re-checks it so consumers can
//! fail fast before doing any work.
//!
//! Partitions are produced by a [`Splitter`]:
//!
//! | Splitter            | Use case                                      |
//! |---------------------|-----------------------------------------------|
//! | [`KFold`]           | Regression, or balanced binary targets        |
//! | [`StratifiedKFold`] | Classification; keeps class ratios per fold   |

use crate::dataset::Dataset;
use crate::error::{PartitionDefect, Result, StackingError};
use ndarray::ArrayView1;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;

/// One train/validation split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
}

/// Ordered folds whose validation slices partition `0..n_samples`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldPartition {
    n_samples: usize,
    folds: Vec<Fold>,
}

impl FoldPartition {
    /// Creates a partition from explicit folds.
    ///
    /// # Errors
    ///
    /// [`StackingError::IncompletePartition`] if the validation slices do not
    /// cover `0..n_samples` exactly once, an index is out of range, or a fold
    /// trains on one of its own validation rows.
    pub fn new(n_samples: usize, folds: Vec<Fold>) -> Result<Self> {
        let partition = Self { n_samples, folds };
        partition.validate()?;
        Ok(partition)
    }

    /// Skips validation so tests can hand malformed partitions to consumers.
    #[cfg(test)]
    pub(crate) fn new_unchecked(n_samples: usize, folds: Vec<Fold>) -> Self {
        Self { n_samples, folds }
    }

    /// Creates a partition from validation sets only; each fold trains on the
    /// complement of its validation set.
    pub fn from_validation_sets(n_samples: usize, sets: Vec<Vec<usize>>) -> Result<Self> {
        let folds = sets
            .into_iter()
            .map(|validation| {
                let mut in_validation = vec![false; n_samples];
                for &i in &validation {
                    if i < n_samples {
                        in_validation[i] = true;
                    }
                }
                let train = (0..n_samples).filter(|&i| !in_validation[i]).collect();
                Fold { train, validation }
            })
            .collect();
        Self::new(n_samples, folds)
    }

    /// Checks the exact-cover invariant.
    pub fn validate(&self) -> Result<()> {
        if self.folds.is_empty() {
            return Err(StackingError::IncompletePartition(PartitionDefect::Empty));
        }

        let mut owner: Vec<Option<usize>> = vec![None; self.n_samples];
        for (fold_idx, fold) in self.folds.iter().enumerate() {
            for &index in &fold.validation {
                let slot = owner.get_mut(index).ok_or(StackingError::IncompletePartition(
                    PartitionDefect::IndexOutOfRange {
                        fold: fold_idx,
                        index,
                        n_samples: self.n_samples,
                    },
                ))?;
                if slot.is_some() {
                    return Err(StackingError::IncompletePartition(
                        PartitionDefect::DuplicateIndex(index),
                    ));
                }
                *slot = Some(fold_idx);
            }
        }

        if let Some(missing) = owner.iter().position(Option::is_none) {
            return Err(StackingError::IncompletePartition(
                PartitionDefect::MissingIndex(missing),
            ));
        }

        for (fold_idx, fold) in self.folds.iter().enumerate() {
            for &index in &fold.train {
                match owner.get(index) {
                    None => {
                        return Err(StackingError::IncompletePartition(
                            PartitionDefect::IndexOutOfRange {
                                fold: fold_idx,
                                index,
                                n_samples: self.n_samples,
                            },
                        ))
                    }
                    Some(Some(o)) if *o == fold_idx => {
                        return Err(StackingError::IncompletePartition(
                            PartitionDefect::TrainValidationOverlap {
                                fold: fold_idx,
                                index,
                            },
                        ))
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    pub fn n_folds(&self) -> usize {
        self.folds.len()
    }

    pub fn folds(&self) -> &[Fold] {
        &self.folds
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Fold> {
        self.folds.iter()
    }
}

impl<'a> IntoIterator for &'a FoldPartition {
    type Item = &'a Fold;
    type IntoIter = std::slice::Iter<'a, Fold>;

    fn into_iter(self) -> Self::IntoIter {
        self.folds.iter()
    }
}

/// Produces a [`FoldPartition`] for a dataset.
pub trait Splitter {
    fn split(&self, dataset: &Dataset) -> Result<FoldPartition>;
}

/// K-fold cross-validation.
///
/// Rows are (optionally) shuffled with a seeded RNG, then cut into `n_splits`
/// contiguous validation slices. The first `n_samples % n_splits` slices get
/// one extra row.
#[derive(Debug, Clone)]
pub struct KFold {
    n_splits: usize,
    shuffle: bool,
    seed: u64,
}

impl KFold {
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            shuffle: false,
            seed: 0,
        }
    }

    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Partitions `0..n_samples` without looking at any data.
    pub fn split_indices(&self, n_samples: usize) -> Result<FoldPartition> {
        check_n_splits(self.n_splits, n_samples)?;

        let mut order: Vec<usize> = (0..n_samples).collect();
        if self.shuffle {
            let mut rng = StdRng::seed_from_u64(self.seed);
            order.shuffle(&mut rng);
        }

        let base = n_samples / self.n_splits;
        let extra = n_samples % self.n_splits;
        let mut sets = Vec::with_capacity(self.n_splits);
        let mut start = 0;
        for i in 0..self.n_splits {
            let size = base + usize::from(i < extra);
            sets.push(order[start..start + size].to_vec());
            start += size;
        }
        FoldPartition::from_validation_sets(n_samples, sets)
    }
}

impl Splitter for KFold {
    fn split(&self, dataset: &Dataset) -> Result<FoldPartition> {
        self.split_indices(dataset.n_samples())
    }
}

/// K-fold cross-validation that preserves class proportions.
///
/// Each class's rows are (optionally) shuffled and then dealt round-robin
/// across folds, continuing from where the previous class stopped, so every
/// validation slice holds a near-equal share of every class.
#[derive(Debug, Clone)]
pub struct StratifiedKFold {
    n_splits: usize,
    shuffle: bool,
    seed: u64,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            shuffle: false,
            seed: 0,
        }
    }

    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Partitions rows according to their labels.
    pub fn split_labels(&self, labels: ArrayView1<'_, f64>) -> Result<FoldPartition> {
        let n_samples = labels.len();
        check_n_splits(self.n_splits, n_samples)?;

        // f64 is not Ord; group by bit pattern, which is exact for class codes.
        let mut classes: BTreeMap<u64, Vec<usize>> = BTreeMap::new();
        for (i, &label) in labels.iter().enumerate() {
            classes.entry(label.to_bits()).or_default().push(i);
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut sets = vec![Vec::new(); self.n_splits];
        let mut next_fold = 0;
        for (_, mut members) in classes {
            if self.shuffle {
                members.shuffle(&mut rng);
            }
            for index in members {
                sets[next_fold].push(index);
                next_fold = (next_fold + 1) % self.n_splits;
            }
        }
        for set in &mut sets {
            set.sort_unstable();
        }
        FoldPartition::from_validation_sets(n_samples, sets)
    }
}

impl Splitter for StratifiedKFold {
    fn split(&self, dataset: &Dataset) -> Result<FoldPartition> {
        self.split_labels(dataset.require_labels()?)
    }
}

fn check_n_splits(n_splits: usize, n_samples: usize) -> Result<()> {
    if n_splits < 2 {
        return Err(StackingError::invalid_parameter(
            "n_splits",
            format!("must be >= 2, got {}", n_splits),
        ));
    }
    if n_splits > n_samples {
        return Err(StackingError::invalid_parameter(
            "n_splits",
            format!("{} folds requested for only {} rows", n_splits, n_samples),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;
    use rand::Rng;

    fn assert_exact_cover(partition: &FoldPartition) {
        let mut seen = vec![0usize; partition.n_samples()];
        for fold in partition {
            for &i in &fold.validation {
                seen[i] += 1;
            }
            for &i in &fold.train {
                assert!(!fold.validation.contains(&i));
            }
            assert_eq!(
                fold.train.len() + fold.validation.len(),
                partition.n_samples()
            );
        }
        assert!(seen.iter().all(|&c| c == 1), "coverage: {:?}", seen);
    }

    #[test]
    fn test_kfold_sizes_follow_remainder_rule() {
        let partition = KFold::new(3).split_indices(10).unwrap();
        let sizes: Vec<usize> = partition.iter().map(|f| f.validation.len()).collect();
        assert_eq!(sizes, vec![4, 3, 3]);
        assert_eq!(partition.folds()[0].validation, vec![0, 1, 2, 3]);
        assert_exact_cover(&partition);
    }

    #[test]
    fn test_kfold_shuffle_is_seeded() {
        let a = KFold::new(4).shuffle(true).seed(7).split_indices(20).unwrap();
        let b = KFold::new(4).shuffle(true).seed(7).split_indices(20).unwrap();
        let c = KFold::new(4).shuffle(true).seed(8).split_indices(20).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_exact_cover(&a);
    }

    #[test]
    fn test_kfold_rejects_bad_split_counts() {
        assert!(matches!(
            KFold::new(1).split_indices(10),
            Err(StackingError::InvalidParameter { .. })
        ));
        assert!(matches!(
            KFold::new(11).split_indices(10),
            Err(StackingError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_stratified_preserves_class_balance() {
        // 12 negatives, 6 positives
        let labels: Array1<f64> = (0..18).map(|i| if i % 3 == 0 { 1.0 } else { 0.0 }).collect();
        let partition = StratifiedKFold::new(3)
            .shuffle(true)
            .seed(42)
            .split_labels(labels.view())
            .unwrap();

        assert_exact_cover(&partition);
        for fold in &partition {
            let positives = fold.validation.iter().filter(|&&i| labels[i] == 1.0).count();
            assert_eq!(fold.validation.len(), 6);
            assert_eq!(positives, 2);
        }
    }

    #[test]
    fn test_stratified_requires_labels() {
        let ds = Dataset::unlabeled(ndarray::array![[1.0], [2.0], [3.0]]).unwrap();
        assert!(StratifiedKFold::new(2).split(&ds).is_err());
    }

    #[test]
    fn test_random_partitions_cover_every_row_once() {
        let mut rng = StdRng::seed_from_u64(2024);
        for _ in 0..200 {
            let n_samples = rng.random_range(2..60);
            let n_folds = rng.random_range(2..=n_samples.min(8));
            let mut order: Vec<usize> = (0..n_samples).collect();
            order.shuffle(&mut rng);

            // Random cut points, each fold non-empty
            let mut sets = vec![Vec::new(); n_folds];
            for (pos, index) in order.into_iter().enumerate() {
                let fold = if pos < n_folds { pos } else { rng.random_range(0..n_folds) };
                sets[fold].push(index);
            }

            let partition = FoldPartition::from_validation_sets(n_samples, sets).unwrap();
            assert_exact_cover(&partition);
        }
    }

    #[test]
    fn test_missing_index_is_rejected() {
        let err = FoldPartition::from_validation_sets(6, vec![vec![0, 1, 2], vec![3, 4]])
            .unwrap_err();
        assert!(matches!(
            err,
            StackingError::IncompletePartition(PartitionDefect::MissingIndex(5))
        ));
    }

    #[test]
    fn test_duplicate_index_is_rejected() {
        let err = FoldPartition::from_validation_sets(4, vec![vec![0, 1, 2], vec![2, 3]])
            .unwrap_err();
        assert!(matches!(
            err,
            StackingError::IncompletePartition(PartitionDefect::DuplicateIndex(2))
        ));
    }

    #[test]
    fn test_out_of_range_index_is_rejected() {
        let err =
            FoldPartition::from_validation_sets(3, vec![vec![0, 1], vec![2, 3]]).unwrap_err();
        assert!(matches!(
            err,
            StackingError::IncompletePartition(PartitionDefect::IndexOutOfRange { index: 3, .. })
        ));
    }

    #[test]
    fn test_train_validation_overlap_is_rejected() {
        let folds = vec![
            Fold {
                train: vec![1, 2],
                validation: vec![0, 1],
            },
            Fold {
                train: vec![0, 1],
                validation: vec![2],
            },
        ];
        let err = FoldPartition::new(3, folds).unwrap_err();
        assert!(matches!(
            err,
            StackingError::IncompletePartition(PartitionDefect::TrainValidationOverlap {
                fold: 0,
                index: 1
            })
        ));
    }

    #[test]
    fn test_empty_partition_is_rejected() {
        let err = FoldPartition::new(3, Vec::new()).unwrap_err();
        assert!(matches!(
            err,
            StackingError::IncompletePartition(PartitionDefect::Empty)
        ));
    }
}
