use ndarray::{Array1, ArrayView1, Zip};
use num_traits::Float;

/// Distance between two document vectors, plus the weighted combination
/// used to move centroids incrementally.
pub trait Metric<F>: Send + Sync
where
    F: Float + Send + Sync,
{
    /// Distance between rows `a` and `b`. Lower is closer.
    fn distance(&self, a: ArrayView1<F>, b: ArrayView1<F>) -> F;

    /// Return `wa * a + wb * b`
    fn combine(&self, a: ArrayView1<F>, wa: F, b: ArrayView1<F>, wb: F) -> Array1<F> {
        Zip::from(&a).and(&b).map_collect(|&x, &y| wa * x + wb * y)
    }
}

/// Perform distance calculation as `sum((a - b)**2)`
///
/// This is the metric for which the relocation gain is exact: moving a
/// document with a negative gain strictly lowers the sum of squared errors.
///
///     use ndarray::arr1;
///     use hartigan::{Metric, SquaredEuclidean};
///
///     let d = SquaredEuclidean.distance(arr1(&[1., 1., 1.]).view(), arr1(&[2., 2., 2.]).view());
///     assert!((d - 3.0f64).abs() < 1e-8);
#[derive(Debug, Default, Clone, Copy)]
pub struct SquaredEuclidean;

impl<F> Metric<F> for SquaredEuclidean
where
    F: Float + Send + Sync,
{
    fn distance(&self, a: ArrayView1<F>, b: ArrayView1<F>) -> F {
        Zip::from(&a).and(&b).fold(F::zero(), |acc, &x, &y| {
            let d = x - y;
            acc + d * d
        })
    }
}

/// Perform distance calculation as `sqrt(sum((a - b)**2))`
#[derive(Debug, Default, Clone, Copy)]
pub struct Euclidean;

impl<F> Metric<F> for Euclidean
where
    F: Float + Send + Sync,
{
    fn distance(&self, a: ArrayView1<F>, b: ArrayView1<F>) -> F {
        SquaredEuclidean.distance(a, b).sqrt()
    }
}

/// Perform distance calculation as `1 - (a . b)/(|a|*|b|)`
///
/// A zero vector is treated as orthogonal to everything.
///
///     use ndarray::arr1;
///     use hartigan::{Cosine, Metric};
///
///     let d = Cosine.distance(arr1(&[3., 2., 0., 5.]).view(), arr1(&[1., 0., 0., 0.]).view());
///     assert!((d - 0.5134f64).abs() < 1e-4);
#[derive(Debug, Default, Clone, Copy)]
pub struct Cosine;

impl<F> Metric<F> for Cosine
where
    F: Float + Send + Sync,
{
    fn distance(&self, a: ArrayView1<F>, b: ArrayView1<F>) -> F {
        let (dot, a_sq, b_sq) =
            Zip::from(&a)
                .and(&b)
                .fold((F::zero(), F::zero(), F::zero()), |(d, aa, bb), &x, &y| {
                    (d + x * y, aa + x * x, bb + y * y)
                });
        let a_magnitude = a_sq.sqrt();
        let b_magnitude = b_sq.sqrt();
        if a_magnitude == F::zero() || b_magnitude == F::zero() {
            return F::one();
        }
        F::one() - dot / a_magnitude / b_magnitude
    }
}
