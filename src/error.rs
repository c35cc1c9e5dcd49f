//! Error types for rig operations that address joints or parameters by index.

use thiserror::Error;

/// Errors returned by index-addressed chain operations and the pseudo-inverse.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RigError {
    /// A joint index past the end of the chain.
    #[error("joint index {index} out of range for chain with {len} joints")]
    JointOutOfRange {
        /// The requested joint index.
        index: usize,
        /// Number of joints in the chain.
        len: usize,
    },

    /// A flat parameter vector whose length does not match the chain.
    #[error("expected {expected} parameters, got {provided}")]
    ParamCountMismatch {
        /// Number of parameters the chain exposes.
        expected: usize,
        /// Number of parameters supplied.
        provided: usize,
    },

    /// The SVD-based pseudo-inverse rejected its input.
    #[error("pseudo-inverse failed: {0}")]
    PseudoInverse(&'static str),
}

/// Result type for rig operations.
pub type RigResult<T> = Result<T, RigError>;
