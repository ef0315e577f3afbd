//! Error types and result alias for the crate.
//!
//! This module defines [`enum@crate::error::Error`], the crate-wide [Result] alias and
//! [`ErrorKind`], the coarse taxonomy hosts use to decide how to surface a failure:
//! precondition problems the user has to fix, geometry problems, per-patch solver
//! divergence, unavailable resources and cancellation.
use thiserror::Error;

use crate::physics::controller::BakeReport;

pub type Result<T> = std::result::Result<T, Error>;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("could not find meadow ground object {id}")]
    NoGround { id: String },

    #[error("could not find meadow blob grid object {id}")]
    NoBlobGrid { id: String },

    #[error("ground {ground} has no samples; create samples first")]
    NoSamples { ground: String },

    #[error("ground {ground} already has samples; delete them before changing sampling settings")]
    SamplesExist { ground: String },

    #[error("invalid surface: {0}")]
    InvalidSurface(String),

    #[error("no samples could be placed on the surface: {0}")]
    EmptySurface(String),

    #[error("solver diverged on patch '{patch}' at frame {frame}: {reason}")]
    SolverDivergence {
        patch: String,
        frame: i32,
        reason: String,
    },

    #[error("physics bake failed for {} of {} patches: {}", report.failures.len(), report.total(), report.failed_names().join(", "))]
    BakeFailed { report: BakeReport },

    #[error("resource unavailable: {0}")]
    Resource(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Coarse classification of an [`enum@Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing ground, blob grid or samples; the setup must be fixed before retrying.
    Precondition,
    /// Degenerate or non-manifold surface; not retried automatically.
    Geometry,
    /// One or more patches failed to bake.
    SolverDivergence,
    /// Cache directory or file access failed.
    Resource,
    /// Settings failed validation.
    Config,
    /// The caller cancelled the operation.
    Cancelled,
    Other,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NoGround { .. }
            | Error::NoBlobGrid { .. }
            | Error::NoSamples { .. }
            | Error::SamplesExist { .. } => ErrorKind::Precondition,
            Error::InvalidSurface(_) | Error::EmptySurface(_) => ErrorKind::Geometry,
            Error::SolverDivergence { .. } | Error::BakeFailed { .. } => {
                ErrorKind::SolverDivergence
            }
            Error::Resource(_) | Error::Io(_) => ErrorKind::Resource,
            Error::InvalidConfig(_) => ErrorKind::Config,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Other(_) => ErrorKind::Other,
        }
    }
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Error::Other(value)
    }
}

impl From<&str> for Error {
    fn from(value: &str) -> Self {
        Error::Other(value.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::controller::BakeFailure;

    #[test]
    fn from_str_allocates_owned_message() {
        let err: Error = "issue".into();
        assert!(matches!(err, Error::Other(ref msg) if msg == "issue"));
    }

    #[test]
    fn missing_objects_are_preconditions() {
        assert_eq!(
            Error::NoGround { id: "g".into() }.kind(),
            ErrorKind::Precondition
        );
        assert_eq!(
            Error::NoSamples { ground: "g".into() }.kind(),
            ErrorKind::Precondition
        );
        assert_eq!(
            Error::EmptySurface("x".into()).kind(),
            ErrorKind::Geometry
        );
    }

    #[test]
    fn io_errors_map_to_resource() {
        let err: Error = std::io::Error::other("disk").into();
        assert_eq!(err.kind(), ErrorKind::Resource);
    }

    #[test]
    fn bake_failed_message_lists_patches() {
        let report = BakeReport {
            baked: vec!["a".into(), "b".into()],
            failures: vec![BakeFailure {
                patch: "c".into(),
                frame: 3,
                reason: "exploded".into(),
            }],
        };
        let msg = Error::BakeFailed { report }.to_string();
        assert!(msg.contains("1 of 3"), "{msg}");
        assert!(msg.contains('c'), "{msg}");
    }
}
