use ndarray::{Array1, Array2, ArrayView1, Axis, Zip};
use num_traits::Float;

use crate::error::{ClusterError, Result};

/// Convert a count into the float type used for centroid arithmetic.
pub(crate) fn count<F: Float>(n: usize) -> F {
    F::from(n).unwrap_or_else(F::max_value)
}

/// A partition of documents into `k` non-empty clusters, together with
/// the per-cluster cardinalities and centroids derived from it.
///
/// Documents are the rows of a 2-D array; centroids are the rows of a
/// `k x dim` array. Only the relocation engine mutates a clustering once
/// it has been built, and every mutation keeps the cardinalities and
/// centroids consistent with the partition.
#[derive(Debug, Clone)]
pub struct Clustering<F> {
    documents: Array2<F>,
    partition: Vec<usize>,
    cardinalities: Vec<usize>,
    centroids: Array2<F>,
    weights: Option<Array1<F>>,
}

impl<F> Clustering<F>
where
    F: Float + Send + Sync,
{
    /// Build a clustering from documents and an initial assignment.
    /// - documents: 2-D array of (rows=documents, cols=attr_values)
    /// - partition: cluster index for each row of `documents`
    /// - k: number of clusters; every cluster in `[0, k)` must be used
    pub fn new(documents: Array2<F>, partition: Vec<usize>, k: usize) -> Result<Self> {
        let (n, dim) = documents.dim();
        if n == 0 {
            return Err(ClusterError::NoDocuments);
        }
        if k == 0 {
            return Err(ClusterError::NoClusters);
        }
        if partition.len() != n {
            return Err(ClusterError::PartitionLength {
                expected: n,
                got: partition.len(),
            });
        }
        let mut cardinalities = vec![0usize; k];
        let mut centroids = Array2::<F>::zeros((k, dim));
        for (document, (&cluster, row)) in partition
            .iter()
            .zip(documents.axis_iter(Axis(0)))
            .enumerate()
        {
            if cluster >= k {
                return Err(ClusterError::LabelOutOfRange {
                    document,
                    cluster,
                    k,
                });
            }
            cardinalities[cluster] += 1;
            Zip::from(centroids.row_mut(cluster))
                .and(&row)
                .for_each(|c, &x| *c = *c + x);
        }
        if let Some(empty) = cardinalities.iter().position(|&c| c == 0) {
            return Err(ClusterError::EmptyCluster(empty));
        }
        centroids
            .axis_iter_mut(Axis(0))
            .zip(cardinalities.iter())
            .for_each(|(mut centroid, &n)| {
                let n = count::<F>(n);
                centroid.map_inplace(|c| *c = *c / n);
            });
        Ok(Self {
            documents,
            partition,
            cardinalities,
            centroids,
            weights: None,
        })
    }

    /// Attach one weight per document, used by weighted objectives.
    pub fn with_weights(mut self, weights: Array1<F>) -> Result<Self> {
        if weights.len() != self.len() {
            return Err(ClusterError::WeightLength {
                expected: self.len(),
                got: weights.len(),
            });
        }
        self.weights = Some(weights);
        Ok(self)
    }

    pub fn documents(&self) -> &Array2<F> {
        &self.documents
    }

    pub fn document(&self, i: usize) -> ArrayView1<F> {
        self.documents.row(i)
    }

    pub fn partition(&self) -> &[usize] {
        &self.partition
    }

    pub fn cardinalities(&self) -> &[usize] {
        &self.cardinalities
    }

    pub fn centroids(&self) -> &Array2<F> {
        &self.centroids
    }

    pub fn centroid(&self, cluster: usize) -> ArrayView1<F> {
        self.centroids.row(cluster)
    }

    pub fn weights(&self) -> Option<&Array1<F>> {
        self.weights.as_ref()
    }

    /// Number of clusters
    pub fn k(&self) -> usize {
        self.cardinalities.len()
    }

    /// Number of documents
    pub fn len(&self) -> usize {
        self.partition.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partition.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.documents.ncols()
    }

    /// Document indices grouped by cluster, in cluster order.
    pub fn members(&self) -> Vec<Vec<usize>> {
        let mut members = vec![Vec::new(); self.k()];
        self.partition
            .iter()
            .enumerate()
            .for_each(|(document, &cluster)| members[cluster].push(document));
        members
    }

    /// Re-validate that the partition, cardinalities, centroids and
    /// weights describe the same documents.
    pub fn check(&self) -> Result<()> {
        let n = self.documents.nrows();
        let k = self.k();
        if n == 0 {
            return Err(ClusterError::NoDocuments);
        }
        if k == 0 {
            return Err(ClusterError::NoClusters);
        }
        if self.partition.len() != n {
            return Err(ClusterError::PartitionLength {
                expected: n,
                got: self.partition.len(),
            });
        }
        if self.centroids.dim() != (k, self.dim()) {
            return Err(ClusterError::DimensionMismatch {
                expected: self.dim(),
                got: self.centroids.ncols(),
            });
        }
        let mut counted = vec![0usize; k];
        for (document, &cluster) in self.partition.iter().enumerate() {
            if cluster >= k {
                return Err(ClusterError::LabelOutOfRange {
                    document,
                    cluster,
                    k,
                });
            }
            counted[cluster] += 1;
        }
        if let Some(empty) = counted.iter().position(|&c| c == 0) {
            return Err(ClusterError::EmptyCluster(empty));
        }
        if counted != self.cardinalities {
            return Err(ClusterError::CardinalityMismatch);
        }
        if let Some(weights) = &self.weights {
            if weights.len() != n {
                return Err(ClusterError::WeightLength {
                    expected: n,
                    got: weights.len(),
                });
            }
        }
        Ok(())
    }

    /// Move `document` into `target`, installing the already-updated
    /// centroids of the losing and gaining clusters.
    pub(crate) fn relocate(
        &mut self,
        document: usize,
        target: usize,
        source_centroid: &Array1<F>,
        target_centroid: &Array1<F>,
    ) {
        let source = self.partition[document];
        debug_assert!(source != target);
        debug_assert!(self.cardinalities[source] > 1);
        self.partition[document] = target;
        self.cardinalities[source] -= 1;
        self.cardinalities[target] += 1;
        self.centroids.row_mut(source).assign(source_centroid);
        self.centroids.row_mut(target).assign(target_centroid);
    }
}
