//! Run configuration loaded from TOML.
//!
//! ## Example
//!
//! ```toml
//! folds = 5
//! metric = "roc_auc"
//! n_trials = 20
//! target = "Survived"
//! output_dir = "reports"
//!
//! [strategy]
//! kind = "latin_hypercube"
//!
//! [[base_models]]
//! name = "tree"
//! kind = "tree"
//! params = { min_samples_leaf = 3 }
//! search.max_depth = { low = 2, high = 8, integer = true }
//!
//! [[base_models]]
//! name = "knn"
//! kind = "knn"
//! search.k = { low = 3, high = 40, integer = true }
//!
//! [meta_model]
//! kind = "logistic"
//! params = { l2 = 0.01 }
//! ```
//!
//! Every top-level key is optional except `base_models`.

use crate::error::Result;
use crate::metrics::Metric;
use crate::preprocessing::ImputeStrategy;
use crate::stacking::{BaseModelSpec, ModelKind, StackingEnsemble};
use crate::tuning::{ParamSet, SearchSpace, StrategyConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

fn default_folds() -> usize {
    5
}

fn default_n_trials() -> usize {
    10
}

fn default_target() -> String {
    "target".to_string()
}

fn yes() -> bool {
    true
}

/// Second-level model. Named `"meta"` in logs and reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetaModelConfig {
    pub kind: ModelKind,
    #[serde(default)]
    pub params: ParamSet,
    #[serde(default)]
    pub search: SearchSpace,
}

impl Default for MetaModelConfig {
    fn default() -> Self {
        Self {
            kind: ModelKind::Logistic,
            params: ParamSet::new(),
            search: SearchSpace::new(),
        }
    }
}

impl MetaModelConfig {
    fn to_spec(&self) -> BaseModelSpec {
        BaseModelSpec {
            name: "meta".to_string(),
            kind: self.kind,
            params: self.params.clone(),
            search: self.search.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StackingConfig {
    #[serde(default = "default_folds")]
    pub folds: usize,
    /// Keep class proportions equal across folds.
    #[serde(default = "yes")]
    pub stratified: bool,
    #[serde(default = "yes")]
    pub shuffle: bool,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub metric: Metric,
    /// Trials per tuned model.
    #[serde(default = "default_n_trials")]
    pub n_trials: usize,
    #[serde(default)]
    pub strategy: StrategyConfig,
    /// Fit folds on the rayon pool (needs the `parallel` feature).
    #[serde(default)]
    pub parallel: bool,
    /// Label column of the training CSV.
    #[serde(default = "default_target")]
    pub target: String,
    /// How empty CSV cells are filled before any model sees the data.
    #[serde(default)]
    pub impute: ImputeStrategy,
    /// Where `<model>.tuning.json` reports go. No reports when unset.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    pub base_models: Vec<BaseModelSpec>,
    #[serde(default)]
    pub meta_model: MetaModelConfig,
}

impl Default for StackingConfig {
    fn default() -> Self {
        Self {
            folds: default_folds(),
            stratified: true,
            shuffle: true,
            seed: 0,
            metric: Metric::default(),
            n_trials: default_n_trials(),
            strategy: StrategyConfig::default(),
            parallel: false,
            target: default_target(),
            impute: ImputeStrategy::default(),
            output_dir: None,
            base_models: Vec::new(),
            meta_model: MetaModelConfig::default(),
        }
    }
}

impl StackingConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Rejects configurations that cannot run: no base models, duplicate
    /// names (`"meta"` is taken by the meta model), fewer than two folds, zero
    /// trials or a malformed search range.
    pub fn validate(&self) -> Result<()> {
        self.ensemble().map(|_| ())
    }

    /// The configured pipeline.
    pub fn ensemble(&self) -> Result<StackingEnsemble> {
        let mut builder = StackingEnsemble::builder()
            .base_models(self.base_models.iter().cloned())
            .meta_model(self.meta_model.to_spec())
            .folds(self.folds)
            .stratified(self.stratified)
            .shuffle(self.shuffle)
            .seed(self.seed)
            .metric(self.metric)
            .n_trials(self.n_trials)
            .strategy(self.strategy.clone())
            .parallel(self.parallel);
        if let Some(dir) = &self.output_dir {
            builder = builder.output_dir(dir);
        }
        builder.build()
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }
}
