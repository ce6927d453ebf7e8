use thiserror::Error;

/// Result type for transform construction
pub type Result<T> = std::result::Result<T, ZoomError>;

/// Errors raised while constructing a transform.
///
/// Applying an already constructed transform never returns an error, malformed input
/// there is a precondition violation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ZoomError {
    /// A construction parameter had the wrong shape or an unusable value
    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument { name: &'static str, reason: String },
}

impl ZoomError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        ZoomError::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }
}
