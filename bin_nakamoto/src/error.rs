/// Error taxonomy for the driver itself, as distinct from the per-crate
/// errors raised during a run (`lib_chain::ChainError`, `lib_network::
/// NetworkError`). Every variant here is caught before the simulation
/// starts: a bad CLI argument, or an output directory that cannot be
/// written to.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("--n must be at least 1, got {0}")]
    NoPeers(usize),
    #[error("--z0 must be a percentage in [0, 100], got {0}")]
    Z0OutOfRange(f64),
    #[error("--z1 must be a percentage in [0, 100], got {0}")]
    Z1OutOfRange(f64),
    #[error("--ttx must be positive, got {0}")]
    NonPositiveTtx(f64),
    #[error("--i must be positive, got {0}")]
    NonPositiveInterarrival(f64),
    #[error("--time must be non-negative, got {0}")]
    NegativeTime(f64),
    #[error("unrecognized --log-level {0:?}; expected one of trace, debug, info, warn, error")]
    BadLogLevel(String),
    #[error("could not create output directory {path}: {source}")]
    OutDir {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}
