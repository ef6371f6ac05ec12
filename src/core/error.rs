use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The operation referenced a table that does not exist
    TableNotAvailable,
    /// Malformed query, unusable index, or a drilldown on an unconfigured field
    IndexError,
    /// Raised only by `wait_for_indexing`
    Timeout,
    /// Durability failure reported by the record store
    Store,
    /// The record store cannot answer this request
    Unsupported,
    Unauthorized,
    InvalidArgument,
    Parse,
    /// The service was destroyed
    Closed,
    Io,
    Internal,
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
}

impl Error {
    pub fn new(kind: ErrorKind, context: String) -> Self {
        Error { kind, context }
    }

    pub fn table_not_available(table: &str) -> Self {
        Error::new(
            ErrorKind::TableNotAvailable,
            format!("table '{}' does not exist", table),
        )
    }

    pub fn index(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::IndexError, context.into())
    }

    pub fn store(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::Store, context.into())
    }

    pub fn closed() -> Self {
        Error::new(ErrorKind::Closed, "data service has been destroyed".to_string())
    }

    pub fn is_table_not_available(&self) -> bool {
        self.kind == ErrorKind::TableNotAvailable
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.context)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error {
            kind: ErrorKind::Io,
            context: err.to_string(),
        }
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error {
            kind: ErrorKind::Parse,
            context: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            kind: ErrorKind::Parse,
            context: format!("JSON error: {}", err),
        }
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error {
            kind: ErrorKind::IndexError,
            context: format!("Invalid wildcard: {}", err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
