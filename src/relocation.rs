use std::fmt;
use std::sync::Arc;

use log::{debug, info, warn};
use ndarray::{Array2, Axis, Zip};
use num_traits::Float;
use parking_lot::RwLock;

use crate::clustering::Clustering;
use crate::config::Config;
use crate::error::{ClusterError, Result};
use crate::metric::Metric;
use crate::pool::WorkerPool;
use crate::search::{BestMove, MoveSearch, Workspace};
use crate::termination::Termination;

/// Why a relocation run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The termination policy's own signal fired.
    Converged,
    /// The termination policy hit its iteration bound.
    IterationLimit,
    /// The termination policy could not compute its signal and stopped the
    /// run as a precaution. The clustering is still consistent.
    Failed,
    /// A pass found no improving move, so every later pass would too.
    NoImprovingMove,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Converged => write!(f, "converged"),
            StopReason::IterationLimit => write!(f, "iteration limit"),
            StopReason::Failed => write!(f, "termination check failed"),
            StopReason::NoImprovingMove => write!(f, "no improving move"),
        }
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub passes: usize,
    pub moves: usize,
    pub reason: StopReason,
}

/// Parallel Hartigan relocation over a clustering.
///
/// Each pass refreshes the document-to-centroid distance cache, scans every
/// document across a persistent worker pool, and applies the single best
/// improving move. The master is the only writer of the clustering; workers
/// read it under a shared lock while a pass is in flight.
///
///     use ndarray::arr2;
///     use hartigan::{Clustering, NoMove, Relocation, SquaredEuclidean};
///
///     let x = arr2(&[[0., 0.], [1., 0.], [9., 9.], [10., 9.], [0.5, 1.]]);
///     let clustering = Clustering::new(x, vec![0, 0, 1, 1, 1], 2).unwrap();
///     let mut engine = Relocation::new(clustering, SquaredEuclidean, 2).unwrap();
///     engine.run(&mut NoMove::new()).unwrap();
///     let clustering = engine.into_clustering();
///     assert_eq!(clustering.partition(), &[0, 0, 1, 1, 0]);
pub struct Relocation<F, M> {
    workspace: Arc<RwLock<Workspace<F>>>,
    best: Arc<BestMove<F>>,
    metric: M,
    workers: WorkerPool,
    pool: rayon::ThreadPool,
    passes: usize,
    moves: usize,
}

impl<F, M> Relocation<F, M>
where
    F: Float + Send + Sync + 'static,
    M: Metric<F> + Clone + 'static,
{
    /// Start `threads` relocation workers over `clustering`. The workers
    /// live until the engine is dropped.
    pub fn new(clustering: Clustering<F>, metric: M, threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(ClusterError::InvalidThreads);
        }
        clustering.check()?;
        let distances = Array2::zeros((clustering.len(), clustering.k()));
        let workspace = Arc::new(RwLock::new(Workspace {
            clustering,
            distances,
        }));
        let best = Arc::new(BestMove::new());
        let job = Arc::new(MoveSearch::new(
            Arc::clone(&workspace),
            Arc::clone(&best),
            metric.clone(),
        ));
        let workers = WorkerPool::new(threads, job)?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()?;
        Ok(Self {
            workspace,
            best,
            metric,
            workers,
            pool,
            passes: 0,
            moves: 0,
        })
    }

    pub fn with_config(clustering: Clustering<F>, metric: M, config: &Config) -> Result<Self> {
        Self::new(clustering, metric, config.threads)
    }

    pub fn threads(&self) -> usize {
        self.workers.len()
    }

    pub fn passes(&self) -> usize {
        self.passes
    }

    pub fn moves(&self) -> usize {
        self.moves
    }

    /// Run `f` against the current clustering.
    pub fn inspect<R>(&self, f: impl FnOnce(&Clustering<F>) -> R) -> R {
        f(&self.workspace.read().clustering)
    }

    /// Recompute the distance from every document to every centroid.
    fn refresh_distances(&self) {
        let mut guard = self.workspace.write();
        let Workspace {
            clustering,
            distances,
        } = &mut *guard;
        let clustering = &*clustering;
        let metric = &self.metric;
        self.pool.install(|| {
            Zip::from(distances.axis_iter_mut(Axis(0)))
                .and(clustering.documents().axis_iter(Axis(0)))
                .par_for_each(|mut row, x| {
                    row.iter_mut()
                        .zip(clustering.centroids().axis_iter(Axis(0)))
                        .for_each(|(d, c)| *d = metric.distance(x, c));
                });
        });
    }

    /// One full scan for the best relocation, applying it if it improves
    /// the objective. Returns whether a document moved.
    ///
    /// A pass that finds no improving move leaves the clustering untouched.
    /// Among moves with equal gain the lowest document index wins, so the
    /// result does not depend on the number of workers.
    pub fn run_pass(&mut self) -> Result<bool> {
        self.refresh_distances();
        self.best.clear();
        let n = self.workspace.read().clustering.len();
        self.workers.dispatch(n)?;
        self.passes += 1;

        let candidate = match self.best.take() {
            Some(candidate) => candidate,
            None => {
                debug!("pass {}: no improving move", self.passes);
                return Ok(false);
            }
        };
        let source = {
            let mut guard = self.workspace.write();
            let source = guard.clustering.partition()[candidate.document];
            guard.clustering.relocate(
                candidate.document,
                candidate.target,
                &candidate.source_centroid,
                &candidate.target_centroid,
            );
            source
        };
        self.moves += 1;
        debug!(
            "pass {}: moved document {} from cluster {} to {} (gain {})",
            self.passes,
            candidate.document,
            source,
            candidate.target,
            candidate.gain.to_f64().unwrap_or(f64::NAN)
        );
        Ok(true)
    }

    /// Alternate passes and termination checks until the policy stops the
    /// run or a pass finds nothing to move.
    pub fn run(&mut self, termination: &mut dyn Termination<F>) -> Result<Outcome> {
        termination.register_run(&self.workspace.read().clustering);
        let start = (self.passes, self.moves);
        let reason = loop {
            let moved = self.run_pass()?;
            if termination.is_done(&self.workspace.read().clustering) {
                break if termination.failed() {
                    StopReason::Failed
                } else if termination.hit_limit() {
                    StopReason::IterationLimit
                } else {
                    StopReason::Converged
                };
            }
            if !moved {
                break StopReason::NoImprovingMove;
            }
        };
        let outcome = Outcome {
            passes: self.passes - start.0,
            moves: self.moves - start.1,
            reason,
        };
        if reason == StopReason::Failed {
            warn!(
                "relocation stopped after {} passes, {} moves: {}",
                outcome.passes, outcome.moves, outcome.reason
            );
        } else {
            info!(
                "relocation finished after {} passes, {} moves: {}",
                outcome.passes, outcome.moves, outcome.reason
            );
        }
        Ok(outcome)
    }

    /// Stop the workers and hand back the clustering.
    pub fn into_clustering(self) -> Clustering<F> {
        let Self {
            workspace, workers, ..
        } = self;
        drop(workers);
        match Arc::try_unwrap(workspace) {
            Ok(lock) => lock.into_inner().clustering,
            Err(shared) => shared.read().clustering.clone(),
        }
    }
}

/// Run relocation to convergence using the policy selected in `config`.
pub fn relocate<F, M>(
    clustering: Clustering<F>,
    metric: M,
    config: &Config,
) -> Result<(Outcome, Clustering<F>)>
where
    F: Float + Send + Sync + 'static,
    M: Metric<F> + Clone + 'static,
{
    let mut termination = config.convergence.policy::<F, M>(metric.clone());
    let mut engine = Relocation::with_config(clustering, metric, config)?;
    let outcome = engine.run(termination.as_mut())?;
    Ok((outcome, engine.into_clustering()))
}

#[cfg(test)]
mod test {
    use ndarray::arr2;

    use crate::{
        ClusterError, Clustering, Evaluator, NoImprovement, Relocation, Result, SquaredEuclidean,
        StopReason, SumOfSquaredErrors,
    };

    struct Unavailable;

    impl Evaluator<f64> for Unavailable {
        fn evaluate(&self, _: &Clustering<f64>) -> Result<f64> {
            Err(ClusterError::NoDocuments)
        }
    }

    fn two_blobs() -> Clustering<f64> {
        let x = arr2(&[
            [0., 0.],
            [0.5, 0.2],
            [0.1, 0.9],
            [8., 8.],
            [8.5, 7.9],
            [7.7, 8.4],
        ]);
        Clustering::new(x, vec![0, 1, 0, 1, 0, 1], 2).unwrap()
    }

    #[test]
    fn pass_moves_one_document_and_lowers_objective() {
        let mut engine = Relocation::new(two_blobs(), SquaredEuclidean, 2).unwrap();
        let before = engine.inspect(|c| SumOfSquaredErrors.evaluate(c)).unwrap();
        let old = engine.inspect(|c| c.partition().to_vec());
        assert!(engine.run_pass().unwrap());
        let new = engine.inspect(|c| c.partition().to_vec());
        assert_eq!(old.iter().zip(&new).filter(|(a, b)| a != b).count(), 1);
        let after = engine.inspect(|c| SumOfSquaredErrors.evaluate(c)).unwrap();
        assert!(after < before);
        engine.inspect(|c| c.check()).unwrap();
    }

    #[test]
    fn converged_pass_leaves_state_untouched() {
        let x = arr2(&[[0., 0.], [0.5, 0.2], [8., 8.], [8.5, 7.9]]);
        let clustering = Clustering::new(x, vec![0, 0, 1, 1], 2).unwrap();
        let mut engine = Relocation::new(clustering.clone(), SquaredEuclidean, 3).unwrap();
        assert!(!engine.run_pass().unwrap());
        let after = engine.into_clustering();
        assert_eq!(after.partition(), clustering.partition());
        assert_eq!(after.cardinalities(), clustering.cardinalities());
        assert_eq!(after.centroids(), clustering.centroids());
    }

    #[test]
    fn run_separates_blobs() {
        let mut engine = Relocation::new(two_blobs(), SquaredEuclidean, 4).unwrap();
        let outcome = engine.run(&mut NoImprovement::<f64, _>::squared()).unwrap();
        assert_eq!(outcome.reason, StopReason::Converged);
        let clustering = engine.into_clustering();
        let p = clustering.partition();
        assert!(p[0] == p[1] && p[1] == p[2]);
        assert!(p[3] == p[4] && p[4] == p[5]);
        assert_ne!(p[0], p[3]);
    }

    #[test]
    fn failing_policy_is_not_convergence() {
        let mut engine = Relocation::new(two_blobs(), SquaredEuclidean, 2).unwrap();
        let outcome = engine
            .run(&mut NoImprovement::<f64, _>::new(Unavailable, 1e-8))
            .unwrap();
        assert_eq!(outcome.reason, StopReason::Failed);
        assert_eq!((outcome.passes, outcome.moves), (1, 1));
        engine.inspect(|c| c.check()).unwrap();
    }

    #[test]
    fn zero_threads_rejected() {
        assert!(matches!(
            Relocation::new(two_blobs(), SquaredEuclidean, 0),
            Err(ClusterError::InvalidThreads)
        ));
    }
}
