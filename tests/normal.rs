use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use hartigan::{
    Clustering, Evaluator, NoImprovement, NoMove, Relocation, SquaredEuclidean, StopReason,
    SumOfSquaredErrors, MAX_ITERATIONS,
};

const CENTERS: [[f64; 2]; 3] = [[0., 0.], [10., 10.], [-10., 10.]];

/// Points scattered around `CENTERS` with a random starting partition.
fn blobs(seed: u64, n: usize, k: usize) -> Clustering<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut x = Array2::zeros((n, 2));
    for (i, mut row) in x.axis_iter_mut(Axis(0)).enumerate() {
        let c = CENTERS[i % CENTERS.len()];
        row[0] = c[0] + rng.gen_range(-2.0..2.0);
        row[1] = c[1] + rng.gen_range(-2.0..2.0);
    }
    let partition = (0..n)
        .map(|i| if i < k { i } else { rng.gen_range(0..k) })
        .collect();
    Clustering::new(x, partition, k).unwrap()
}

fn sse(engine: &Relocation<f64, SquaredEuclidean>) -> f64 {
    engine
        .inspect(|c| SumOfSquaredErrors.evaluate(c))
        .unwrap()
}

#[test]
fn same_result_for_any_pool_size() {
    let results: Vec<(f64, Vec<usize>)> = [1, 2, 8]
        .iter()
        .map(|&threads| {
            let mut engine = Relocation::new(blobs(7, 90, 3), SquaredEuclidean, threads).unwrap();
            engine
                .run(&mut NoImprovement::<f64, _>::squared())
                .unwrap();
            let objective = sse(&engine);
            let clustering = engine.into_clustering();
            (objective, clustering.partition().to_vec())
        })
        .collect();
    for (objective, partition) in &results[1..] {
        assert!((objective - results[0].0).abs() < 1e-9);
        assert_eq!(partition, &results[0].1);
    }
}

#[test]
fn every_pass_keeps_clusters_populated() {
    let mut engine = Relocation::new(blobs(11, 60, 3), SquaredEuclidean, 4).unwrap();
    for _ in 0..200 {
        let before = sse(&engine);
        let moved = engine.run_pass().unwrap();
        let cardinalities = engine.inspect(|c| c.cardinalities().to_vec());
        assert_eq!(cardinalities.iter().sum::<usize>(), 60);
        assert!(cardinalities.iter().all(|&c| c >= 1));
        engine.inspect(|c| c.check()).unwrap();
        if !moved {
            break;
        }
        assert!(sse(&engine) < before);
    }
}

#[test]
fn idle_pass_is_bit_identical() {
    let mut engine = Relocation::new(blobs(3, 30, 3), SquaredEuclidean, 2).unwrap();
    while engine.run_pass().unwrap() {}
    let snapshot = engine.inspect(|c| c.clone());
    assert!(!engine.run_pass().unwrap());
    let after = engine.into_clustering();
    assert_eq!(after.partition(), snapshot.partition());
    assert_eq!(after.cardinalities(), snapshot.cardinalities());
    assert!(after
        .centroids()
        .iter()
        .zip(snapshot.centroids().iter())
        .all(|(a, b)| a.to_bits() == b.to_bits()));
}

#[test]
fn long_runs_stop_at_the_bound() {
    let mut engine = Relocation::new(blobs(5, 600, 3), SquaredEuclidean, 4).unwrap();
    let outcome = engine.run(&mut NoMove::new()).unwrap();
    assert_eq!(outcome.reason, StopReason::IterationLimit);
    assert_eq!(outcome.passes, MAX_ITERATIONS);
    assert_eq!(outcome.moves, MAX_ITERATIONS);
}
