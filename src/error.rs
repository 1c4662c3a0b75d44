//! # Summary
//!
//! Crate-wide error type. Rejected votes are not errors: they travel as
//! `Ok(false)`. Errors are reserved for input that can never succeed and for
//! transport failures, which the consensus round downgrades to non-votes.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Operation string that does not decode to `PUT:<key>:<value>` or `DELETE:<key>`
    #[error("malformed operation: {0:?}")]
    Malformed(String),

    /// Key or value containing the operation delimiter
    #[error("{0:?} contains the ':' delimiter")]
    Delimiter(String),

    /// Peer is not connected, or its connection dropped mid-request
    #[error("peer {0} unreachable")]
    Unreachable(String),

    /// Peer did not answer inside the RPC window
    #[error("peer {0} timed out")]
    Timeout(String),

    /// Error reply from the remote end
    #[error("remote error: {0}")]
    Remote(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
