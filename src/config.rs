use std::fmt;
use std::str::FromStr;

use num_traits::Float;

use crate::error::ClusterError;
use crate::metric::Metric;
use crate::termination::{NoCenterMove, NoImprovement, NoMove, Termination};

/// Which termination policy ends a relocation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convergence {
    /// Every centroid moved less than 1e-7
    NoCenterMove,
    /// Partition unchanged
    NoMove,
    /// Sum of metric distances stopped improving by 1e-8
    NoImprovement,
    /// Sum of squared errors stopped improving by 1e-12
    NoImprovementSquared,
    /// Sum of squared errors stopped improving by 1e-16
    NoImprovementSquaredStrict,
}

impl Convergence {
    /// Build a fresh policy. `metric` is only used by `NoImprovement`.
    pub fn policy<F, M>(&self, metric: M) -> Box<dyn Termination<F>>
    where
        F: Float + Send + Sync + 'static,
        M: Metric<F> + 'static,
    {
        match self {
            Convergence::NoCenterMove => Box::new(NoCenterMove::<F>::new()),
            Convergence::NoMove => Box::new(NoMove::new()),
            Convergence::NoImprovement => Box::new(NoImprovement::<F, _>::objective(metric)),
            Convergence::NoImprovementSquared => Box::new(NoImprovement::<F, _>::squared()),
            Convergence::NoImprovementSquaredStrict => {
                Box::new(NoImprovement::<F, _>::squared_strict())
            }
        }
    }
}

impl FromStr for Convergence {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "center" | "no-center-move" => Ok(Convergence::NoCenterMove),
            "partition" | "no-move" => Ok(Convergence::NoMove),
            "objective" | "no-improvement" => Ok(Convergence::NoImprovement),
            "sse" | "no-improvement-squared" => Ok(Convergence::NoImprovementSquared),
            "sse-strict" | "no-improvement-squared-strict" => {
                Ok(Convergence::NoImprovementSquaredStrict)
            }
            _ => Err(ClusterError::UnknownOption(s.to_string())),
        }
    }
}

impl fmt::Display for Convergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Convergence::NoCenterMove => "no-center-move",
            Convergence::NoMove => "no-move",
            Convergence::NoImprovement => "no-improvement",
            Convergence::NoImprovementSquared => "no-improvement-squared",
            Convergence::NoImprovementSquaredStrict => "no-improvement-squared-strict",
        };
        write!(f, "{}", name)
    }
}

/// Run parameters
/// - threads: relocation workers, also the size of the distance-refresh pool
/// - convergence: termination policy for `run`
#[derive(Debug, Clone)]
pub struct Config {
    pub threads: usize,
    pub convergence: Convergence,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threads: 4,
            convergence: Convergence::NoImprovementSquared,
        }
    }
}
