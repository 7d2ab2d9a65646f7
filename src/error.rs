use thiserror::Error;

/// Failure kinds surfaced by the geometric operations.
///
/// Operations never mutate their inputs; on failure any partially built
/// output has already been dropped.
#[derive(Debug, Error)]
pub enum Error {
    /// The input does not satisfy an operation's preconditions: wrong
    /// primitive type, too few floats per vertex, odd-arity edges, or a
    /// degenerate point set (colinear/coplanar input for the hull).
    #[error("invalid input: {0}")]
    InputInvalid(String),

    /// File open/read/write failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A file was syntactically malformed.
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// An index space or size computation overflowed.
    #[error("capacity exceeded: {0}")]
    Capacity(String),

    /// A numerical method failed: singular solve, degenerate face, or a
    /// sweep that could not be completed within tolerance.
    #[error("numerical failure: {0}")]
    Numeric(String),

    /// An internal consistency check failed. These indicate a bug or an
    /// input outside the supported class (e.g. a self-intersecting mesh).
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
