use std::fmt;

/// Result type for cohortex-types operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the types layer
#[derive(Debug)]
pub enum Error {
    /// Predicate frame violates the required shape (columns, sorting, uniqueness)
    Shape(String),

    /// Window endpoint bounds are invalid
    Bounds(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Shape(msg) => write!(f, "Frame shape error: {}", msg),
            Error::Bounds(msg) => write!(f, "Endpoint bounds error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}
