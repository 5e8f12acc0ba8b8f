use ndarray::{Axis, Zip};
use num_traits::Float;

use crate::clustering::Clustering;
use crate::error::{ClusterError, Result};
use crate::metric::Metric;

/// Score a clustering. Lower is better for every evaluator in this crate.
///
/// External quality measures (adjusted Rand index, mutual information,
/// density scores) plug in through this same trait.
pub trait Evaluator<F>: Send + Sync
where
    F: Float + Send + Sync,
{
    fn evaluate(&self, clustering: &Clustering<F>) -> Result<F>;
}

/// Sum over all documents of the metric distance to their own centroid.
#[derive(Debug, Default, Clone)]
pub struct SumOfDistances<M> {
    metric: M,
}

impl<M> SumOfDistances<M> {
    pub fn new(metric: M) -> Self {
        Self { metric }
    }
}

impl<F, M> Evaluator<F> for SumOfDistances<M>
where
    F: Float + Send + Sync,
    M: Metric<F>,
{
    fn evaluate(&self, clustering: &Clustering<F>) -> Result<F> {
        clustering.check()?;
        Ok(clustering
            .documents()
            .axis_iter(Axis(0))
            .zip(clustering.partition())
            .fold(F::zero(), |acc, (row, &cluster)| {
                acc + self.metric.distance(row, clustering.centroid(cluster))
            }))
    }
}

/// Weighted sum of squared L2 distances to the own centroid,
/// `sum(w_i * |x_i - c|**2)`. Unweighted clusterings use `w_i = 1`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SumOfSquaredErrors;

impl<F> Evaluator<F> for SumOfSquaredErrors
where
    F: Float + Send + Sync,
{
    fn evaluate(&self, clustering: &Clustering<F>) -> Result<F> {
        clustering.check()?;
        let squared = |i: usize, cluster: usize| {
            Zip::from(&clustering.document(i))
                .and(&clustering.centroid(cluster))
                .fold(F::zero(), |acc, &x, &c| acc + (x - c) * (x - c))
        };
        let mut total = F::zero();
        match clustering.weights() {
            Some(weights) => {
                for (i, (&cluster, &w)) in clustering.partition().iter().zip(weights).enumerate() {
                    if w.is_nan() || w < F::zero() {
                        return Err(ClusterError::InvalidWeight(i));
                    }
                    total = total + w * squared(i, cluster);
                }
            }
            None => {
                for (i, &cluster) in clustering.partition().iter().enumerate() {
                    total = total + squared(i, cluster);
                }
            }
        }
        Ok(total)
    }
}
