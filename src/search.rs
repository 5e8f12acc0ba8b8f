use std::ops::Range;
use std::sync::Arc;

use ndarray::{Array1, Array2};
use num_traits::Float;
use parking_lot::{Mutex, MutexGuard, RwLock};

use crate::clustering::{count, Clustering};
use crate::metric::Metric;
use crate::pool::SliceJob;

/// State owned by the relocation master. Workers read it during a pass and
/// never keep a reference past the end of their range.
#[derive(Debug)]
pub(crate) struct Workspace<F> {
    pub(crate) clustering: Clustering<F>,
    /// `[document][cluster]` distance to every current centroid
    pub(crate) distances: Array2<F>,
}

/// A proposed relocation of one document, with both affected centroids
/// already updated for the move.
#[derive(Debug, Clone)]
pub(crate) struct Candidate<F> {
    pub(crate) gain: F,
    pub(crate) document: usize,
    pub(crate) target: usize,
    pub(crate) source_centroid: Array1<F>,
    pub(crate) target_centroid: Array1<F>,
}

/// Best move found so far in the current pass.
///
/// Candidates are ordered by gain, then document index, then target
/// cluster, so the winner of a pass does not depend on how documents were
/// split across workers or which worker reported first.
#[derive(Debug)]
pub(crate) struct BestMove<F> {
    slot: Mutex<Option<Candidate<F>>>,
}

impl<F> BestMove<F>
where
    F: Float,
{
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Candidate<F>>> {
        self.slot.lock()
    }

    fn beats(gain: F, document: usize, target: usize, current: &Option<Candidate<F>>) -> bool {
        match current {
            None => true,
            Some(best) => {
                gain < best.gain
                    || (gain == best.gain && (document, target) < (best.document, best.target))
            }
        }
    }

    /// Whether a move with this key would replace the current best.
    pub(crate) fn improves(&self, gain: F, document: usize, target: usize) -> bool {
        Self::beats(gain, document, target, &self.lock())
    }

    /// Install `candidate` if it beats the current best. Check and update
    /// happen under one lock, so concurrent offers never both win.
    pub(crate) fn offer(&self, candidate: Candidate<F>) -> bool {
        let mut slot = self.lock();
        if Self::beats(candidate.gain, candidate.document, candidate.target, &slot) {
            *slot = Some(candidate);
            true
        } else {
            false
        }
    }

    pub(crate) fn take(&self) -> Option<Candidate<F>> {
        self.lock().take()
    }

    pub(crate) fn clear(&self) {
        *self.lock() = None;
    }
}

/// Hartigan single-point relocation search over a slice of documents.
///
/// For document `i` in cluster `p` and any other cluster `l`, the change
/// in objective from moving `i` to `l` is
/// `n_l/(n_l+1) * d(i,l) - n_p/(n_p-1) * d(i,p)`; negative is better.
/// Documents alone in their cluster are skipped.
pub(crate) struct MoveSearch<F, M> {
    workspace: Arc<RwLock<Workspace<F>>>,
    best: Arc<BestMove<F>>,
    metric: M,
}

impl<F, M> MoveSearch<F, M>
where
    F: Float + Send + Sync,
    M: Metric<F>,
{
    pub(crate) fn new(
        workspace: Arc<RwLock<Workspace<F>>>,
        best: Arc<BestMove<F>>,
        metric: M,
    ) -> Self {
        Self {
            workspace,
            best,
            metric,
        }
    }

    fn search(&self, workspace: &Workspace<F>, range: Range<usize>) {
        let clustering = &workspace.clustering;
        let distances = &workspace.distances;
        let cardinalities = clustering.cardinalities();
        let one = F::one();
        // Only improving moves are ever offered
        let mut local_best = F::zero();
        for i in range {
            let p = clustering.partition()[i];
            let n_p = count::<F>(cardinalities[p]);
            if cardinalities[p] <= 1 {
                continue;
            }
            let loss = n_p / (n_p - one) * distances[[i, p]];
            let mut source_centroid: Option<Array1<F>> = None;
            for (l, &n_l) in cardinalities.iter().enumerate() {
                if l == p {
                    continue;
                }
                let n_l = count::<F>(n_l);
                let gain = n_l / (n_l + one) * distances[[i, l]] - loss;
                if !(gain < local_best) {
                    continue;
                }
                local_best = gain;
                if !self.best.improves(gain, i, l) {
                    continue;
                }
                let x = clustering.document(i);
                let source = source_centroid
                    .get_or_insert_with(|| {
                        self.metric.combine(
                            clustering.centroid(p),
                            n_p / (n_p - one),
                            x,
                            -one / (n_p - one),
                        )
                    })
                    .clone();
                let target =
                    self.metric
                        .combine(clustering.centroid(l), n_l / (n_l + one), x, one / (n_l + one));
                self.best.offer(Candidate {
                    gain,
                    document: i,
                    target: l,
                    source_centroid: source,
                    target_centroid: target,
                });
            }
        }
    }
}

impl<F, M> SliceJob for MoveSearch<F, M>
where
    F: Float + Send + Sync + 'static,
    M: Metric<F> + 'static,
{
    fn run(&self, range: Range<usize>) {
        self.search(&self.workspace.read(), range);
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use ndarray::{arr1, arr2, Array1, Array2, Axis};
    use parking_lot::RwLock;

    use crate::pool::SliceJob;
    use crate::{Clustering, Metric, SquaredEuclidean};

    use super::{BestMove, Candidate, MoveSearch, Workspace};

    fn candidate(gain: f64, document: usize, target: usize) -> Candidate<f64> {
        Candidate {
            gain,
            document,
            target,
            source_centroid: Array1::zeros(1),
            target_centroid: Array1::zeros(1),
        }
    }

    fn workspace(x: Array2<f64>, partition: Vec<usize>, k: usize) -> Workspace<f64> {
        let clustering = Clustering::new(x, partition, k).unwrap();
        let mut distances = Array2::zeros((clustering.len(), k));
        for (i, mut row) in distances.axis_iter_mut(Axis(0)).enumerate() {
            for c in 0..k {
                row[c] = SquaredEuclidean.distance(clustering.document(i), clustering.centroid(c));
            }
        }
        Workspace {
            clustering,
            distances,
        }
    }

    #[test]
    fn offer_keeps_strictly_better() {
        let best = BestMove::new();
        assert!(best.offer(candidate(-1.0, 5, 1)));
        assert!(!best.offer(candidate(-0.5, 0, 0)));
        assert!(best.offer(candidate(-2.0, 9, 0)));
        let won = best.take().unwrap();
        assert_eq!((won.document, won.target), (9, 0));
        assert!(best.take().is_none());
    }

    #[test]
    fn ties_go_to_lowest_document() {
        let best = BestMove::new();
        assert!(best.offer(candidate(-1.0, 7, 0)));
        assert!(best.offer(candidate(-1.0, 3, 2)));
        assert!(best.offer(candidate(-1.0, 3, 1)));
        assert!(!best.offer(candidate(-1.0, 4, 0)));
        let won = best.take().unwrap();
        assert_eq!((won.document, won.target), (3, 1));
    }

    #[test]
    fn concurrent_offers_keep_the_minimum() {
        let best = Arc::new(BestMove::new());
        let gain = |idx: usize| -((idx * 7919 % 1601) as f64);
        let expected = (0..1600).map(gain).fold(f64::INFINITY, f64::min);
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let best = Arc::clone(&best);
                std::thread::spawn(move || {
                    for i in 0..200 {
                        best.offer(candidate(gain(t * 200 + i), t * 200 + i, 0));
                    }
                })
            })
            .collect();
        handles.into_iter().for_each(|h| h.join().unwrap());
        assert_eq!(best.take().unwrap().gain, expected);
    }

    #[test]
    fn finds_misplaced_document() {
        // Document 2 sits next to cluster 1 but is assigned to cluster 0
        let x = arr2(&[[0.], [1.], [9.], [10.], [11.]]);
        let ws = workspace(x, vec![0, 0, 0, 1, 1], 2);
        let shared = Arc::new(RwLock::new(ws));
        let best = Arc::new(BestMove::new());
        let search = MoveSearch::new(Arc::clone(&shared), Arc::clone(&best), SquaredEuclidean);
        search.run(0..5);
        let won = best.take().unwrap();
        assert_eq!((won.document, won.target), (2, 1));
        assert!(won.gain < 0.0);
        assert!((&won.source_centroid - &arr1(&[0.5]))[0].abs() < 1e-12);
        assert!((&won.target_centroid - &arr1(&[10.0]))[0].abs() < 1e-12);
    }

    #[test]
    fn singleton_clusters_are_never_drained() {
        let x = arr2(&[[0.], [100.]]);
        let ws = workspace(x, vec![0, 1], 2);
        let best = Arc::new(BestMove::new());
        let search = MoveSearch::new(Arc::new(RwLock::new(ws)), Arc::clone(&best), SquaredEuclidean);
        search.run(0..2);
        assert!(best.take().is_none());
    }

    #[test]
    fn gain_matches_objective_change() {
        let x = arr2(&[[0., 0.], [1., 0.], [4., 4.], [5., 4.], [2., 2.]]);
        let ws = workspace(x.clone(), vec![0, 0, 1, 1, 1], 2);
        let before = crate::Evaluator::evaluate(&crate::SumOfSquaredErrors, &ws.clustering).unwrap();
        let best = Arc::new(BestMove::new());
        let search = MoveSearch::new(Arc::new(RwLock::new(ws)), Arc::clone(&best), SquaredEuclidean);
        search.run(0..5);
        let won = best.take().unwrap();
        let mut partition = vec![0, 0, 1, 1, 1];
        partition[won.document] = won.target;
        let after = Clustering::new(x, partition, 2).unwrap();
        let after = crate::Evaluator::evaluate(&crate::SumOfSquaredErrors, &after).unwrap();
        assert!((after - before - won.gain).abs() < 1e-9);
    }
}
