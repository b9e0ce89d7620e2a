use std::fmt;

/// Result type for cohortex-task operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while loading or validating a task specification
#[derive(Debug)]
pub enum Error {
    /// Configuration file could not be read
    Io(std::io::Error),

    /// Configuration document is not valid YAML
    Yaml(serde_yaml::Error),

    /// Configuration content is invalid (unknown keys, bad names, bad grammar)
    Config(String),

    /// A boundary or derived predicate references an undeclared name
    MissingReference(String),

    /// The derived predicate graph has a cycle
    Cycle(String),

    /// A window's start is configured to occur after its end
    Ordering(String),

    /// More than one window declares `label` or `index_timestamp`
    Cardinality(String),

    /// Endpoint bounds rejected by the types layer
    Bounds(cohortex_types::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::Yaml(err) => write!(f, "YAML error: {}", err),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::MissingReference(msg) => write!(f, "Missing reference: {}", msg),
            Error::Cycle(msg) => write!(f, "Cycle error: {}", msg),
            Error::Ordering(msg) => write!(f, "Ordering error: {}", msg),
            Error::Cardinality(msg) => write!(f, "Cardinality error: {}", msg),
            Error::Bounds(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Yaml(err) => Some(err),
            Error::Bounds(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Yaml(err)
    }
}

impl From<cohortex_types::Error> for Error {
    fn from(err: cohortex_types::Error) -> Self {
        Error::Bounds(err)
    }
}
