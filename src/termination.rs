use log::warn;
use ndarray::{Array2, Axis, Zip};
use num_traits::Float;

use crate::clustering::Clustering;
use crate::evaluate::{Evaluator, SumOfDistances, SumOfSquaredErrors};
use crate::metric::Metric;

/// Safety bound: every policy reports done on its 50th check.
pub const MAX_ITERATIONS: usize = 50;

/// Convergence test consulted once after every relocation pass.
///
/// A policy is registered once per run, which resets its history. Each
/// call to `is_done` counts as one iteration. Any failure while computing
/// the signal makes the policy report done, so a broken run stops instead
/// of looping.
pub trait Termination<F>: Send
where
    F: Float + Send + Sync,
{
    /// Reset history for a new run. Returns `false` if `clustering` is
    /// inconsistent; the policy then stops the run on its first check.
    fn register_run(&mut self, clustering: &Clustering<F>) -> bool;

    /// Whether the run has converged after the pass that just completed.
    fn is_done(&mut self, clustering: &Clustering<F>) -> bool;

    /// Checks made since the last registration.
    fn iterations(&self) -> usize;

    /// Whether the last `true` from `is_done` came from the safety bound
    /// rather than the policy's own signal.
    fn hit_limit(&self) -> bool {
        self.iterations() >= MAX_ITERATIONS
    }

    /// Whether the last `true` from `is_done` was a fail-safe stop: the
    /// signal could not be computed, or the policy was never registered on
    /// a consistent clustering.
    fn failed(&self) -> bool {
        false
    }
}

/// History shared by all policies: the iteration counter, the snapshot of
/// the previous pass, and whether the registered state was usable.
#[derive(Debug)]
struct History<S> {
    iteration: usize,
    previous: Option<S>,
    registered: bool,
    failed: bool,
}

impl<S> Default for History<S> {
    fn default() -> Self {
        Self {
            iteration: 0,
            previous: None,
            registered: false,
            failed: false,
        }
    }
}

impl<S> History<S> {
    fn register<F>(&mut self, clustering: &Clustering<F>) -> bool
    where
        F: Float + Send + Sync,
    {
        self.iteration = 0;
        self.previous = None;
        self.failed = false;
        self.registered = match clustering.check() {
            Ok(()) => true,
            Err(e) => {
                warn!("termination registered on inconsistent clustering: {}", e);
                false
            }
        };
        self.registered
    }

    /// Count one check. `true` when the run must stop regardless of signal.
    fn tick(&mut self) -> bool {
        self.iteration += 1;
        self.failed = !self.registered;
        self.iteration >= MAX_ITERATIONS || self.failed
    }

    /// Record a fail-safe stop.
    fn fail(&mut self) -> bool {
        self.failed = true;
        true
    }

    fn swap(&mut self, current: S) -> Option<S> {
        self.previous.replace(current)
    }
}

fn consistent<F>(policy: &str, clustering: &Clustering<F>) -> bool
where
    F: Float + Send + Sync,
{
    match clustering.check() {
        Ok(()) => true,
        Err(e) => {
            warn!("{}: stopping on inconsistent clustering: {}", policy, e);
            false
        }
    }
}

/// Done when no centroid moved more than `epsilon` (L2) since the last pass.
#[derive(Debug)]
pub struct NoCenterMove<F> {
    epsilon: F,
    history: History<Array2<F>>,
}

impl<F> NoCenterMove<F>
where
    F: Float + Send + Sync,
{
    pub fn new() -> Self {
        Self::with_epsilon(F::from(1e-7).unwrap_or_else(F::epsilon))
    }

    pub fn with_epsilon(epsilon: F) -> Self {
        Self {
            epsilon,
            history: History::default(),
        }
    }
}

impl<F> Default for NoCenterMove<F>
where
    F: Float + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<F> Termination<F> for NoCenterMove<F>
where
    F: Float + Send + Sync,
{
    fn register_run(&mut self, clustering: &Clustering<F>) -> bool {
        self.history.register(clustering)
    }

    fn is_done(&mut self, clustering: &Clustering<F>) -> bool {
        if self.history.tick() {
            return true;
        }
        if !consistent("no-center-move", clustering) {
            return self.history.fail();
        }
        let current = clustering.centroids().to_owned();
        let previous = match self.history.swap(current) {
            Some(previous) => previous,
            None => return false,
        };
        let current = clustering.centroids();
        if previous.dim() != current.dim() {
            warn!(
                "no-center-move: centroid shape changed from {:?} to {:?}",
                previous.dim(),
                current.dim()
            );
            return self.history.fail();
        }
        let epsilon = self.epsilon;
        previous
            .axis_iter(Axis(0))
            .zip(current.axis_iter(Axis(0)))
            .all(|(old, new)| {
                let moved = Zip::from(&old)
                    .and(&new)
                    .fold(F::zero(), |acc, &a, &b| acc + (a - b) * (a - b))
                    .sqrt();
                moved < epsilon
            })
    }

    fn iterations(&self) -> usize {
        self.history.iteration
    }

    fn failed(&self) -> bool {
        self.history.failed
    }
}

/// Done when the partition is identical to the one seen on the last pass.
#[derive(Debug, Default)]
pub struct NoMove {
    history: History<Vec<usize>>,
}

impl NoMove {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<F> Termination<F> for NoMove
where
    F: Float + Send + Sync,
{
    fn register_run(&mut self, clustering: &Clustering<F>) -> bool {
        self.history.register(clustering)
    }

    fn is_done(&mut self, clustering: &Clustering<F>) -> bool {
        if self.history.tick() {
            return true;
        }
        if !consistent("no-move", clustering) {
            return self.history.fail();
        }
        match self.history.swap(clustering.partition().to_vec()) {
            Some(previous) => previous == clustering.partition(),
            None => false,
        }
    }

    fn iterations(&self) -> usize {
        self.history.iteration
    }

    fn failed(&self) -> bool {
        self.history.failed
    }
}

/// Done when the objective stops improving: `new >= old - epsilon`.
#[derive(Debug)]
pub struct NoImprovement<F, E> {
    evaluator: E,
    epsilon: F,
    history: History<F>,
}

impl<F, E> NoImprovement<F, E>
where
    F: Float + Send + Sync,
    E: Evaluator<F>,
{
    pub fn new(evaluator: E, epsilon: F) -> Self {
        Self {
            evaluator,
            epsilon,
            history: History::default(),
        }
    }
}

impl<F, M> NoImprovement<F, SumOfDistances<M>>
where
    F: Float + Send + Sync,
    M: Metric<F>,
{
    /// Track the sum of metric distances, `epsilon = 1e-8`.
    pub fn objective(metric: M) -> Self {
        Self::new(
            SumOfDistances::new(metric),
            F::from(1e-8).unwrap_or_else(F::epsilon),
        )
    }
}

impl<F> NoImprovement<F, SumOfSquaredErrors>
where
    F: Float + Send + Sync,
{
    /// Track the (weighted) sum of squared errors, `epsilon = 1e-12`.
    pub fn squared() -> Self {
        Self::new(
            SumOfSquaredErrors,
            F::from(1e-12).unwrap_or_else(F::epsilon),
        )
    }

    /// Track the (weighted) sum of squared errors, `epsilon = 1e-16`.
    pub fn squared_strict() -> Self {
        Self::new(
            SumOfSquaredErrors,
            F::from(1e-16).unwrap_or_else(F::epsilon),
        )
    }
}

impl<F, E> Termination<F> for NoImprovement<F, E>
where
    F: Float + Send + Sync,
    E: Evaluator<F>,
{
    fn register_run(&mut self, clustering: &Clustering<F>) -> bool {
        self.history.register(clustering)
    }

    fn is_done(&mut self, clustering: &Clustering<F>) -> bool {
        if self.history.tick() {
            return true;
        }
        let current = match self.evaluator.evaluate(clustering) {
            Ok(v) if !v.is_nan() => v,
            Ok(_) => {
                warn!("no-improvement: objective evaluated to NaN");
                return self.history.fail();
            }
            Err(e) => {
                warn!("no-improvement: evaluation failed: {}", e);
                return self.history.fail();
            }
        };
        match self.history.swap(current) {
            Some(previous) => current >= previous - self.epsilon,
            None => false,
        }
    }

    fn iterations(&self) -> usize {
        self.history.iteration
    }

    fn failed(&self) -> bool {
        self.history.failed
    }
}
