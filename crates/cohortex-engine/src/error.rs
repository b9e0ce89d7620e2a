use std::fmt;

/// Result type for cohortex-engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during query evaluation
#[derive(Debug)]
pub enum Error {
    /// Predicate frame violates the required shape
    Frame(cohortex_types::Error),

    /// A referenced predicate column is absent from the frame
    MissingColumn(String),

    /// A constraint tuple is invalid
    Constraint(String),

    /// A tree node carries no usable endpoint expression
    Endpoint(String),

    /// Result cannot be shaped for export
    Export(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Frame(err) => write!(f, "{}", err),
            Error::MissingColumn(msg) => write!(f, "Missing column: {}", msg),
            Error::Constraint(msg) => write!(f, "Invalid constraint: {}", msg),
            Error::Endpoint(msg) => write!(f, "Invalid endpoint: {}", msg),
            Error::Export(msg) => write!(f, "Export error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Frame(err) => Some(err),
            _ => None,
        }
    }
}

impl From<cohortex_types::Error> for Error {
    fn from(err: cohortex_types::Error) -> Self {
        Error::Frame(err)
    }
}
