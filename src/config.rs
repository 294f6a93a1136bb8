//! Immutable parameters of a clustering run, validated once on construction.

use crate::error::Error;
use crate::Result;
use std::fmt;
use std::str::FromStr;

/// Default maximum gap (bp) between adjacent bin pairs
pub const DEFAULT_TOL: u64 = 1;
/// Default maximum span (bp) of a cluster on either axis
pub const DEFAULT_UPPER: u64 = 1_000_000;
/// Default cluster-level FDR
pub const DEFAULT_TARGET: f64 = 0.05;

/// How bin pairs are chosen for clustering
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Prefilter {
    /// Keep bin pairs with a raw p-value strictly below the cutoff
    PValue(f64),
    /// Search the bin-pair FDR threshold whose estimated cluster FDR stays under the target
    ClusterFdr,
}

/// Weights given to clusters in the step-up procedure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weighting {
    /// Every cluster weighs the same (plain Benjamini-Hochberg)
    Uniform,
    /// Weight proportional to `1 / size`
    InverseSize,
}

impl FromStr for Weighting {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "uniform" => Ok(Weighting::Uniform),
            "inverse-size" => Ok(Weighting::InverseSize),
            other => Err(Error::invalid_parameter(
                "weighting",
                format!("expected `uniform` or `inverse-size`, got `{}`", other),
            )),
        }
    }
}

impl fmt::Display for Weighting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Weighting::Uniform => f.write_str("uniform"),
            Weighting::InverseSize => f.write_str("inverse-size"),
        }
    }
}

/// Parameters shared by the cluster builder and the FDR controller
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterConfig {
    prefilter: Prefilter,
    tol: u64,
    upper: Option<u64>,
    target: f64,
    weighting: Weighting,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            prefilter: Prefilter::ClusterFdr,
            tol: DEFAULT_TOL,
            upper: Some(DEFAULT_UPPER),
            target: DEFAULT_TARGET,
            weighting: Weighting::Uniform,
        }
    }
}

impl ClusterConfig {
    /// Creates a validated configuration
    pub fn new(
        prefilter: Prefilter,
        tol: u64,
        upper: Option<u64>,
        target: f64,
        weighting: Weighting,
    ) -> Result<Self> {
        Self {
            prefilter,
            tol,
            upper,
            target,
            weighting,
        }
        .validate()
    }

    /// Replaces the prefilter
    pub fn with_prefilter(mut self, prefilter: Prefilter) -> Self {
        self.prefilter = prefilter;
        self
    }

    /// Replaces the adjacency tolerance
    pub fn with_tol(mut self, tol: u64) -> Self {
        self.tol = tol;
        self
    }

    /// Replaces the span bound, `None` disables it
    pub fn with_upper(mut self, upper: Option<u64>) -> Self {
        self.upper = upper;
        self
    }

    /// Replaces the cluster-level FDR target
    pub fn with_target(mut self, target: f64) -> Self {
        self.target = target;
        self
    }

    /// Replaces the step-up weighting
    pub fn with_weighting(mut self, weighting: Weighting) -> Self {
        self.weighting = weighting;
        self
    }

    /// Checks every parameter and hands the configuration back
    pub fn validate(self) -> Result<Self> {
        if !(self.target > 0.0 && self.target < 1.0) {
            return Err(Error::invalid_parameter(
                "target",
                format!("must lie in (0, 1), got {}", self.target),
            ));
        }
        if let Prefilter::PValue(cutoff) = self.prefilter {
            if !(cutoff > 0.0 && cutoff <= 1.0) {
                return Err(Error::invalid_parameter(
                    "pvalue",
                    format!("must lie in (0, 1], got {}", cutoff),
                ));
            }
        }
        if self.upper == Some(0) {
            return Err(Error::invalid_parameter(
                "upper",
                "must be positive, use no bound instead of zero",
            ));
        }
        Ok(self)
    }

    /// Prefilter mode
    pub fn prefilter(&self) -> Prefilter {
        self.prefilter
    }

    /// Maximum gap between adjacent bin pairs on either axis
    pub fn tol(&self) -> u64 {
        self.tol
    }

    /// Maximum span of a multi-member cluster on either axis
    pub fn upper(&self) -> Option<u64> {
        self.upper
    }

    /// Cluster-level FDR target
    pub fn target(&self) -> f64 {
        self.target
    }

    /// Step-up weighting
    pub fn weighting(&self) -> Weighting {
        self.weighting
    }
}
