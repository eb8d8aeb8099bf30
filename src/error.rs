//! Error kinds shared across the shuffle subsystem.

use thiserror::Error;

/// The five error kinds named in the job coordination protocol.
///
/// Every fallible operation in this crate returns one of these; nothing is
/// swallowed into a generic `io::Error`, so callers can tell a storage
/// failure from a network failure from a user bug.
#[derive(Error, Debug)]
pub enum MrError {
    /// create/open/insert/scan on a shard file failed.
    #[error("shard I/O error: {0}")]
    ShardIo(String),

    /// An HTTP fetch or RPC dial/call failed.
    #[error("network error: {0}")]
    Network(String),

    /// An RPC reply had an unexpected shape, or a worker reported an
    /// out-of-range task number.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The source table had fewer rows than map tasks at split time.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// The user-supplied `Map`/`Reduce` returned an error.
    #[error("user function error: {0}")]
    User(String),
}

impl From<rusqlite::Error> for MrError {
    fn from(e: rusqlite::Error) -> MrError {
        MrError::ShardIo(e.to_string())
    }
}

impl From<std::io::Error> for MrError {
    fn from(e: std::io::Error) -> MrError {
        MrError::ShardIo(e.to_string())
    }
}

impl From<reqwest::Error> for MrError {
    fn from(e: reqwest::Error) -> MrError {
        MrError::Network(e.to_string())
    }
}

/// The phase a top-level error occurred in, used only to annotate the
/// process-exit message (spec.md §7: "the process exits with a message
/// naming the phase").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Split,
    Map,
    Reduce,
    Merge,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::Split => "split",
            Phase::Map => "map",
            Phase::Reduce => "reduce",
            Phase::Merge => "merge",
        };
        write!(f, "{}", s)
    }
}

/// Wraps an `MrError` with the phase it happened in, for top-level
/// reporting. Not used internally; only at the binary boundary.
#[derive(Debug, Error)]
#[error("{phase} phase failed: {source}")]
pub struct PhaseError {
    pub phase: Phase,
    #[source]
    pub source: MrError,
}

impl PhaseError {
    pub fn new(phase: Phase, source: MrError) -> PhaseError {
        PhaseError { phase, source }
    }
}
