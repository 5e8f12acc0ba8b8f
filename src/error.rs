use thiserror::Error;

/// Errors raised while building or driving a clustering run.
#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("document set is empty")]
    NoDocuments,

    #[error("number of clusters must be positive")]
    NoClusters,

    #[error("partition covers {got} documents, expected {expected}")]
    PartitionLength { expected: usize, got: usize },

    #[error("document {document} assigned to cluster {cluster}, but only {k} clusters exist")]
    LabelOutOfRange {
        document: usize,
        cluster: usize,
        k: usize,
    },

    #[error("cluster {0} has no members")]
    EmptyCluster(usize),

    #[error("cardinalities do not match the partition")]
    CardinalityMismatch,

    #[error("weights cover {got} documents, expected {expected}")]
    WeightLength { expected: usize, got: usize },

    #[error("weight of document {0} is negative or NaN")]
    InvalidWeight(usize),

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("thread count must be at least 1")]
    InvalidThreads,

    #[error("failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("failed to spawn worker {0}: {1}")]
    Spawn(usize, std::io::Error),

    #[error("worker {0} exited unexpectedly")]
    WorkerLost(usize),

    #[error("worker {0} was stopped and accepts no more work")]
    WorkerStopped(usize),

    #[error("unknown option: {0}")]
    UnknownOption(String),
}

pub type Result<T> = std::result::Result<T, ClusterError>;
