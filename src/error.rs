use std::path::PathBuf;

/// Result type alias for the library stages
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the extraction pipeline
#[derive(Debug)]
pub enum Error {
    IoError(std::io::Error),
    /// A run configuration is missing a required key or has the wrong shape
    Config { file: PathBuf, message: String },
    /// A source line could not be split on the delimiter its construct requires
    MalformedLine { file: PathBuf, line: String, message: String },
    /// A documentation block parsed as YAML but its values have the wrong shape
    DocBlock { file: PathBuf, message: String },
    /// A compiled fragment does not have the `components.schemas` layout
    InvalidFragment { file: PathBuf, message: String },
    SerializationError(String),
}

impl Error {
    pub(crate) fn malformed(
        file: impl Into<PathBuf>,
        line: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::MalformedLine {
            file: file.into(),
            line: line.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::IoError(e) => write!(f, "IO error: {}", e),
            Error::Config { file, message } => {
                write!(f, "configuration error in {}: {}", file.display(), message)
            }
            Error::MalformedLine {
                file,
                line,
                message,
            } => write!(
                f,
                "malformed line in {}: {} (line: `{}`)",
                file.display(),
                message,
                line
            ),
            Error::DocBlock { file, message } => {
                write!(f, "invalid documentation block in {}: {}", file.display(), message)
            }
            Error::InvalidFragment { file, message } => {
                write!(f, "invalid compiled fragment {}: {}", file.display(), message)
            }
            Error::SerializationError(msg) => write!(f, "serialization error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(format!("JSON error: {}", err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::SerializationError(format!("YAML error: {}", err))
    }
}
