#[macro_use]
extern crate clap;

use std::fmt::{Debug, Display};
use std::path::Path;
use std::process::exit;
use std::str::FromStr;

use log::info;
use num_traits::Float;

use hartigan::{
    relocate, Clustering, Config, Convergence, Cosine, Euclidean, Evaluator, Metric,
    SquaredEuclidean, SumOfSquaredErrors,
};

use crate::ops::{display_results, from_file, round_robin};

mod ops;

fn cluster<F, M>(input: &Path, k: usize, metric: M, config: &Config)
where
    F: Float + Send + Sync + Default + FromStr + Display + 'static,
    <F as FromStr>::Err: Debug,
    M: Metric<F> + Clone + 'static,
{
    let (x, labels) = from_file::<F>(input.to_path_buf(), "\t").unwrap_or_else(|e| {
        eprintln!("{}", e);
        exit(1);
    });
    if k > x.nrows() {
        eprintln!("Cannot form {} clusters from {} samples", k, x.nrows());
        exit(2);
    }
    let partition = round_robin(x.nrows(), k);
    let clustering = Clustering::new(x, partition, k).unwrap_or_else(|e| {
        eprintln!("{}", e);
        exit(1);
    });
    info!(
        "clustering {} samples into {} clusters with {} threads, stopping on {}",
        clustering.len(),
        k,
        config.threads,
        config.convergence
    );
    let (outcome, clustering) = relocate(clustering, metric, config).unwrap_or_else(|e| {
        eprintln!("{}", e);
        exit(1);
    });
    let objective = SumOfSquaredErrors.evaluate(&clustering).unwrap_or_else(|_| F::nan());
    if let Err(e) = display_results(&outcome, objective, &clustering, &labels) {
        eprintln!("Unable to write results: {}", e);
        exit(1);
    }
}

fn run<F>(input: &Path, k: usize, metric: &str, config: &Config)
where
    F: Float + Send + Sync + Default + FromStr + Display + 'static,
    <F as FromStr>::Err: Debug,
{
    match metric {
        "euclidean" => cluster::<F, _>(input, k, Euclidean, config),
        "cosine" => cluster::<F, _>(input, k, Cosine, config),
        _ => cluster::<F, _>(input, k, SquaredEuclidean, config),
    }
}

fn main() {
    env_logger::init();
    let matches = clap_app!(hartigan =>
        (version: "0.1.0")
        (about: "Parallel Hartigan-style relocation clustering")
        (@arg INPUT: -i --input +takes_value +required "Path to input file")
        (@arg CLUSTERS: -k --clusters +takes_value +required "Number of clusters")
        (@arg THREADS: -t --threads +takes_value "Number of worker threads, default=4")
        (@arg CONVERGENCE: -c --convergence +takes_value "Termination policy: no-center-move, no-move, no-improvement, no-improvement-squared, no-improvement-squared-strict, default=no-improvement-squared")
        (@arg METRIC: -m --metric +takes_value "Distance metric: sqeuclidean, euclidean, cosine, default=sqeuclidean")
        (@arg PRECISION: -r --precision +takes_value "Set f32 or f64 precision, default=f64")
    )
    .get_matches();

    let input_file = matches.value_of("INPUT").unwrap().to_string();
    if !Path::new(&input_file).exists() {
        eprintln!("Unable to locate input file {}", input_file);
        exit(1);
    }
    let k = matches
        .value_of("CLUSTERS")
        .unwrap()
        .parse::<usize>()
        .unwrap_or_else(|_| {
            eprintln!("Unable to parse clusters");
            exit(1);
        });
    let threads = matches
        .value_of("THREADS")
        .unwrap_or("4")
        .parse::<usize>()
        .unwrap_or_else(|_| {
            eprintln!("Unable to parse threads");
            exit(1);
        });
    let convergence = matches
        .value_of("CONVERGENCE")
        .unwrap_or("no-improvement-squared")
        .parse::<Convergence>()
        .unwrap_or_else(|e| {
            eprintln!("{}", e);
            exit(1);
        });
    let metric = matches.value_of("METRIC").unwrap_or("sqeuclidean");
    if !["sqeuclidean", "euclidean", "cosine"].contains(&metric) {
        eprintln!("Unknown metric {}", metric);
        exit(1);
    }
    let precision = matches.value_of("PRECISION").unwrap_or("f64");
    // Validate values
    if threads < 1 || k < 1 {
        eprintln!("Improper parameter set!");
        exit(2);
    }
    let config = Config {
        threads,
        convergence,
    };
    match precision {
        "f32" => run::<f32>(Path::new(&input_file), k, metric, &config),
        _ => run::<f64>(Path::new(&input_file), k, metric, &config),
    }
}
