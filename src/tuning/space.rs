//! Parameter sets and search spaces.
//!
//! All ranges are searched in a normalized `[0, 1]` coordinate and decoded to
//! their real interval at suggestion time. This keeps strategies independent
//! of parameter units.

use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Named numeric hyper-parameters, as proposed by a search strategy.
///
/// Integer parameters are stored as `f64` and rounded by the consumer
/// (see [`ParamSet::get_usize_or`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamSet(BTreeMap<String, f64>);

impl ParamSet {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) -> Option<f64> {
        self.0.insert(name.into(), value)
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn get_or(&self, name: &str, default: f64) -> f64 {
        self.get(name).unwrap_or(default)
    }

    /// Reads a non-negative integer parameter, rounding to the nearest value.
    pub fn get_usize_or(&self, name: &str, default: usize) -> Result<usize, ModelError> {
        match self.get(name) {
            None => Ok(default),
            Some(v) if v.is_finite() && v >= 0.0 => Ok(v.round() as usize),
            Some(v) => Err(ModelError::invalid_parameter(
                name,
                format!("expected a non-negative integer, got {}", v),
            )),
        }
    }

    /// Returns a copy of `self` with every entry of `overrides` applied on top.
    pub fn merged(&self, overrides: &ParamSet) -> ParamSet {
        let mut out = self.clone();
        for (k, v) in overrides.iter() {
            out.0.insert(k.clone(), v);
        }
        out
    }

    /// Fails on the first name not listed in `known`.
    ///
    /// Model constructors call this so a typo in a config file is an error
    /// instead of a silently ignored parameter.
    pub fn check_known(&self, model: &str, known: &[&str]) -> Result<(), ModelError> {
        match self.0.keys().find(|k| !known.contains(&k.as_str())) {
            Some(unknown) => Err(ModelError::invalid_parameter(
                unknown.clone(),
                format!("not a parameter of {} (expected one of {:?})", model, known),
            )),
            None => Ok(()),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, f64)> + '_ {
        self.0.iter().map(|(k, v)| (k, *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, f64)> for ParamSet {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Interval for one hyper-parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParamRange {
    pub low: f64,
    pub high: f64,
    /// Sample uniformly in log space (learning rates, penalties).
    #[serde(default)]
    pub log_scale: bool,
    /// Round decoded values to whole numbers (depths, neighbor counts).
    #[serde(default)]
    pub integer: bool,
}

impl ParamRange {
    pub fn linear(low: f64, high: f64) -> Self {
        Self {
            low,
            high,
            log_scale: false,
            integer: false,
        }
    }

    pub fn log(low: f64, high: f64) -> Self {
        Self {
            low,
            high,
            log_scale: true,
            integer: false,
        }
    }

    pub fn integer(low: f64, high: f64) -> Self {
        Self {
            low,
            high,
            log_scale: false,
            integer: true,
        }
    }

    /// Maps a normalized coordinate in `[0, 1]` to the real interval.
    pub fn decode(&self, normalized: f64) -> f64 {
        let t = normalized.clamp(0.0, 1.0);
        let value = if self.log_scale {
            let log_low = self.low.ln();
            let log_high = self.high.ln();
            (log_low + t * (log_high - log_low)).exp()
        } else {
            self.low + t * (self.high - self.low)
        };
        if self.integer {
            value.round()
        } else {
            value
        }
    }

    fn validate(&self, name: &str) -> Result<(), String> {
        if !self.low.is_finite() || !self.high.is_finite() {
            return Err(format!("range for '{}' must be finite", name));
        }
        if self.low > self.high {
            return Err(format!(
                "range for '{}' has low {} above high {}",
                name, self.low, self.high
            ));
        }
        if self.log_scale && self.low <= 0.0 {
            return Err(format!("log-scale range for '{}' must be positive", name));
        }
        Ok(())
    }
}

/// Ordered set of named parameter ranges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchSpace {
    ranges: BTreeMap<String, ParamRange>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, range: ParamRange) -> Self {
        self.ranges.insert(name.into(), range);
        self
    }

    pub fn ndim(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &String> + '_ {
        self.ranges.keys()
    }

    /// Decodes one normalized coordinate per dimension, in name order.
    pub fn decode(&self, normalized: &[f64]) -> ParamSet {
        self.ranges
            .iter()
            .zip(normalized.iter())
            .map(|((name, range), &t)| (name.clone(), range.decode(t)))
            .collect()
    }

    /// Checks every range; returns a message naming the first bad one.
    pub fn validate(&self) -> Result<(), String> {
        self.ranges
            .iter()
            .try_for_each(|(name, range)| range.validate(name))
    }
}
