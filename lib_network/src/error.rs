/// Error taxonomy for `Network` construction. Nothing in steady-state
/// delivery fails: sends are fire-and-forget scheduler spawns, so the only
/// failure mode here is a caller wiring the network up wrong.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum NetworkError {
    #[error("{endpoints} endpoints but {speeds} speed classes; these must match one-to-one")]
    MismatchedPeerCount { endpoints: usize, speeds: usize },
}
