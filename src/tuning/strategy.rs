//! Search strategies: what to try next, given what was tried so far.
//!
//! Strategies work in the normalized unit cube and let
//! [`SearchSpace::decode`] map points to real parameter values. The three
//! shipped strategies are model-free; a surrogate-model optimizer plugs in by
//! implementing [`SearchStrategy`] and reading the trial history.

use super::{ParamSet, SearchSpace, Trial};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Proposes parameter sets for a [`Tuner`](super::Tuner).
pub trait SearchStrategy {
    /// Next parameter set to evaluate. `history` holds every trial so far,
    /// in evaluation order.
    fn suggest(&mut self, space: &SearchSpace, history: &[Trial]) -> ParamSet;

    /// Short label for logs.
    fn name(&self) -> &str;
}

impl<S: SearchStrategy + ?Sized> SearchStrategy for Box<S> {
    fn suggest(&mut self, space: &SearchSpace, history: &[Trial]) -> ParamSet {
        (**self).suggest(space, history)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Independent uniform draws in the unit cube.
#[derive(Debug, Clone)]
pub struct RandomSearch {
    rng: StdRng,
}

impl RandomSearch {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl SearchStrategy for RandomSearch {
    fn suggest(&mut self, space: &SearchSpace, _history: &[Trial]) -> ParamSet {
        let point: Vec<f64> = (0..space.ndim()).map(|_| self.rng.random()).collect();
        space.decode(&point)
    }

    fn name(&self) -> &str {
        "random"
    }
}

/// Latin hypercube design of `n_samples` points, drawn once on first use.
///
/// Each dimension is cut into `n_samples` equal strata and every stratum is
/// used exactly once per dimension. After the design is exhausted, further
/// suggestions are uniform random draws.
#[derive(Debug, Clone)]
pub struct LatinHypercube {
    rng: StdRng,
    n_samples: usize,
    design: Vec<Vec<f64>>,
    next: usize,
}

impl LatinHypercube {
    pub fn new(seed: u64, n_samples: usize) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            n_samples,
            design: Vec::new(),
            next: 0,
        }
    }

    fn build_design(&mut self, ndim: usize) {
        let n = self.n_samples;
        let strata: Vec<Vec<usize>> = (0..ndim)
            .map(|_| {
                let mut perm: Vec<usize> = (0..n).collect();
                perm.shuffle(&mut self.rng);
                perm
            })
            .collect();

        self.design = (0..n)
            .map(|i| {
                strata
                    .iter()
                    .map(|perm| {
                        let lower = perm[i] as f64 / n as f64;
                        lower + self.rng.random::<f64>() / n as f64
                    })
                    .collect()
            })
            .collect();
    }
}

impl SearchStrategy for LatinHypercube {
    fn suggest(&mut self, space: &SearchSpace, _history: &[Trial]) -> ParamSet {
        let ndim = space.ndim();
        if self.next == 0 && self.design.is_empty() {
            self.build_design(ndim);
        }

        let point = match self.design.get(self.next) {
            Some(p) if p.len() == ndim => p.clone(),
            _ => (0..ndim).map(|_| self.rng.random()).collect(),
        };
        self.next += 1;
        space.decode(&point)
    }

    fn name(&self) -> &str {
        "latin_hypercube"
    }
}

/// Full factorial grid with `points_per_dim` evenly spaced values per
/// dimension (endpoints included). Cycles once every cell was visited.
#[derive(Debug, Clone)]
pub struct GridSearch {
    points_per_dim: usize,
    next: usize,
}

impl GridSearch {
    pub fn new(points_per_dim: usize) -> Self {
        Self {
            points_per_dim: points_per_dim.max(1),
            next: 0,
        }
    }

    /// Number of grid cells for a space of `ndim` dimensions (saturating).
    pub fn size(&self, ndim: usize) -> usize {
        u32::try_from(ndim)
            .ok()
            .and_then(|d| self.points_per_dim.checked_pow(d))
            .unwrap_or(usize::MAX)
    }
}

impl SearchStrategy for GridSearch {
    fn suggest(&mut self, space: &SearchSpace, _history: &[Trial]) -> ParamSet {
        let ndim = space.ndim();
        let mut remaining = self.next % self.size(ndim);
        self.next += 1;

        let ppd = self.points_per_dim;
        let point: Vec<f64> = (0..ndim)
            .map(|_| {
                let idx = remaining % ppd;
                remaining /= ppd;
                if ppd > 1 {
                    idx as f64 / (ppd - 1) as f64
                } else {
                    0.5
                }
            })
            .collect();
        space.decode(&point)
    }

    fn name(&self) -> &str {
        "grid"
    }
}

/// Serializable strategy selection, as written in run configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    Random,
    #[default]
    LatinHypercube,
    Grid { points_per_dim: usize },
}

impl StrategyConfig {
    /// Instantiates the strategy; `n_trials` sizes the Latin hypercube design.
    pub fn build(&self, seed: u64, n_trials: usize) -> Box<dyn SearchStrategy + Send> {
        match self {
            StrategyConfig::Random => Box::new(RandomSearch::new(seed)),
            StrategyConfig::LatinHypercube => Box::new(LatinHypercube::new(seed, n_trials)),
            StrategyConfig::Grid { points_per_dim } => Box::new(GridSearch::new(*points_per_dim)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuning::ParamRange;

    fn space() -> SearchSpace {
        SearchSpace::new()
            .with("a", ParamRange::linear(0.0, 1.0))
            .with("b", ParamRange::linear(0.0, 1.0))
    }

    #[test]
    fn test_random_search_is_seeded() {
        let mut a = RandomSearch::new(7);
        let mut b = RandomSearch::new(7);
        for _ in 0..5 {
            let pa = a.suggest(&space(), &[]);
            assert_eq!(pa, b.suggest(&space(), &[]));
            assert!(pa.iter().all(|(_, v)| (0.0..=1.0).contains(&v)));
        }
    }

    #[test]
    fn test_lhs_covers_every_stratum() {
        let n = 10;
        let mut lhs = LatinHypercube::new(3, n);
        let points: Vec<ParamSet> = (0..n).map(|_| lhs.suggest(&space(), &[])).collect();

        for dim in ["a", "b"] {
            let mut strata: Vec<usize> = points
                .iter()
                .map(|p| ((p.get(dim).unwrap() * n as f64).floor() as usize).min(n - 1))
                .collect();
            strata.sort_unstable();
            assert_eq!(strata, (0..n).collect::<Vec<_>>());
        }

        // falls back to random after the design
        let extra = lhs.suggest(&space(), &[]);
        assert_eq!(extra.len(), 2);
    }

    #[test]
    fn test_grid_enumerates_then_cycles() {
        let mut grid = GridSearch::new(3);
        assert_eq!(grid.size(2), 9);

        let first: Vec<ParamSet> = (0..9).map(|_| grid.suggest(&space(), &[])).collect();
        let mut unique = first.clone();
        unique.dedup();
        assert_eq!(unique.len(), 9);
        assert!(first.iter().any(|p| p.get("a") == Some(0.0) && p.get("b") == Some(0.0)));
        assert!(first.iter().any(|p| p.get("a") == Some(1.0) && p.get("b") == Some(1.0)));
        assert!(first.iter().any(|p| p.get("a") == Some(0.5) && p.get("b") == Some(1.0)));

        assert_eq!(grid.suggest(&space(), &[]), first[0]);
    }

    #[test]
    fn test_empty_space_yields_empty_sets() {
        let empty = SearchSpace::new();
        assert!(RandomSearch::new(0).suggest(&empty, &[]).is_empty());
        assert!(LatinHypercube::new(0, 4).suggest(&empty, &[]).is_empty());
        assert!(GridSearch::new(4).suggest(&empty, &[]).is_empty());
    }

    #[test]
    fn test_strategy_config_parsing() {
        let cfg: StrategyConfig = toml::from_str("kind = \"grid\"\npoints_per_dim = 4").unwrap();
        assert_eq!(cfg, StrategyConfig::Grid { points_per_dim: 4 });
        assert_eq!(cfg.build(0, 10).name(), "grid");
        assert_eq!(StrategyConfig::default().build(0, 10).name(), "latin_hypercube");
    }
}
