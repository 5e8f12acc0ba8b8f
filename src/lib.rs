pub use clustering::Clustering;
pub use config::{Config, Convergence};
pub use error::{ClusterError, Result};
pub use evaluate::{Evaluator, SumOfDistances, SumOfSquaredErrors};
pub use metric::{Cosine, Euclidean, Metric, SquaredEuclidean};
pub use pool::{SliceJob, Worker, WorkerPool, WorkerState};
pub use relocation::{relocate, Outcome, Relocation, StopReason};
pub use termination::{NoCenterMove, NoImprovement, NoMove, Termination, MAX_ITERATIONS};

mod clustering;
mod config;
mod error;
mod evaluate;
mod metric;
mod pool;
mod relocation;
mod search;
mod termination;
