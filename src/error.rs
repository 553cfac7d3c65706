use thiserror::Error;

pub type PhyloResult<T> = std::result::Result<T, PhyloError>;

/// Errors raised by the matrix, tree, and reconstruction layers.
///
/// All of these are terminal for the current operation: computation is
/// deterministic and pure, so retrying never helps. On error the caller
/// receives no tree, never a partially built one.
#[derive(Error, Debug)]
pub enum PhyloError {
    #[error("invalid distance matrix: {reason}")]
    InvalidMatrix { reason: String },

    #[error("index {index} out of range ({len} entries)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("matrix is not additive: no attachment point satisfies the four-point condition")]
    NonAdditiveInput,

    #[error("no edge between nodes {a} and {b}")]
    MissingEdge { a: usize, b: usize },

    #[error("invalid edge: {reason}")]
    InvalidEdge { reason: String },

    #[error("no path between nodes {from} and {to}")]
    NoPath { from: usize, to: usize },
}

impl PhyloError {
    pub(crate) fn invalid_matrix<S: Into<String>>(reason: S) -> Self {
        PhyloError::InvalidMatrix {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_edge<S: Into<String>>(reason: S) -> Self {
        PhyloError::InvalidEdge {
            reason: reason.into(),
        }
    }
}
