use thiserror::Error;

/// Everything that can go wrong while building or pulling through an accessor
/// graph.
#[derive(Debug, Error)]
pub enum Error {
    /// A required collaborator was not supplied
    #[error("missing collaborator: {0}")]
    NullReference(String),

    /// Mismatched geometries, out-of-range arguments, ...
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A transformed or interpolated coordinate fell outside a grid, and no
    /// padding was configured
    #[error("mapping outside image: {0}")]
    MappingOutsideImage(String),

    /// A query was issued before the required initialization
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn null(what: impl Into<String>) -> Self { Self::NullReference(what.into()) }
    pub(crate) fn param(what: impl Into<String>) -> Self { Self::InvalidParameter(what.into()) }
    pub(crate) fn outside(what: impl Into<String>) -> Self { Self::MappingOutsideImage(what.into()) }
    pub(crate) fn state(what: impl Into<String>) -> Self { Self::InvalidState(what.into()) }
}
