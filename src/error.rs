// Error type shared by the solver library, the server and the tools

use thiserror::Error;

use crate::types::Coord;

/// Everything that can go wrong between a caller and the solver
#[derive(Debug, Error)]
pub enum SolverError {
    /// Player count, win length or board size outside the supported range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A move that targets an occupied or out-of-bounds cell
    #[error("invalid move ({}, {}): {reason}", .coord.row, .coord.col)]
    InvalidMove { coord: Coord, reason: String },

    /// A request that does not match the service's configuration
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A move was requested on a board without empty cells
    #[error("no viable move left on the board")]
    NoMovesAvailable,

    /// A child state was expected to be valued after the search finished
    #[error("state {0} has no value after the search finished")]
    UnresolvedState(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("value table (de)serialization failed: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("could not start search workers: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    /// The service thread is gone, either stopped or crashed
    #[error("solver service is not running")]
    ServiceStopped,

    /// Configuration file could not be read or parsed
    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SolverError>;
