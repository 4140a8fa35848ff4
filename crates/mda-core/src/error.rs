use crate::types::TimeToLive;
use std::net::IpAddr;
use thiserror::Error;

/// A multipath tracer error result.
pub type Result<T> = std::result::Result<T, Error>;

/// A multipath tracer error.
#[derive(Error, Debug)]
pub enum Error {
    /// An edge insertion violated the increasing-hop invariant.
    ///
    /// This indicates a correlation bug rather than a network condition and
    /// is fatal to the algorithm instance.
    #[error("lattice ordering violation: {src} at ttl {src_ttl} -> {dst} at ttl {dst_ttl}")]
    LatticeOrderingViolation {
        src: IpAddr,
        src_ttl: TimeToLive,
        dst: IpAddr,
        dst_ttl: TimeToLive,
    },
    /// The network collaborator could not send a probe.
    ///
    /// This is transient and recovered locally by retrying, up to the hop's
    /// retry budget.
    #[error("probe failed to send: {0}")]
    ProbeDispatch(String),
    #[error("invalid config: {0}")]
    BadConfig(String),
    /// Early termination was requested by the caller.
    #[error("aborted")]
    Aborted,
    #[error("tracer error: {0}")]
    Other(String),
}
