//! Error types for the landsync crate.

use std::fmt;
use std::path::PathBuf;

/// Result type for landsync operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while synchronising the scene.
///
/// Handlers return these to the watch loop, which logs them and carries on
/// with the next artifact or tick. None of them abort the process.
#[derive(Debug)]
pub enum Error {
    /// An import collaborator failed or produced an unusable result.
    ImportFailure {
        /// The file that was being imported.
        path: PathBuf,
        /// The error message.
        message: String,
    },
    /// An artifact was recognised but its content or name is unusable.
    MalformedArtifact {
        /// The offending artifact.
        path: PathBuf,
        /// Description of what was wrong.
        detail: String,
    },
    /// No prototype object or collection exists for a vegetation class.
    MissingRenderTarget {
        /// The vegetation class id.
        class: String,
    },
    /// An object that must exist at this point is absent.
    MissingObject {
        /// Name of the missing object.
        name: String,
    },
    /// An object with this name is already registered.
    DuplicateObject {
        /// The conflicting name.
        name: String,
    },
    /// A filesystem operation failed.
    Io {
        /// The operation that failed.
        operation: &'static str,
        /// The path involved.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },
    /// Settings are missing or invalid.
    Config {
        /// Description of the problem.
        detail: String,
    },
    /// The watch loop was cancelled and cannot be armed again.
    WatchCancelled,
}

impl Error {
    /// Build an [`Error::ImportFailure`] from any displayable cause.
    pub fn import(path: impl Into<PathBuf>, message: impl fmt::Display) -> Self {
        Error::ImportFailure {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Build an [`Error::MalformedArtifact`].
    pub fn malformed(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Error::MalformedArtifact {
            path: path.into(),
            detail: detail.into(),
        }
    }

    /// Build an [`Error::Io`].
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ImportFailure { path, message } => {
                write!(f, "import of {} failed: {message}", path.display())
            }
            Error::MalformedArtifact { path, detail } => {
                write!(f, "malformed artifact {}: {detail}", path.display())
            }
            Error::MissingRenderTarget { class } => {
                write!(f, "no object or collection to render class '{class}'")
            }
            Error::MissingObject { name } => write!(f, "object '{name}' does not exist"),
            Error::DuplicateObject { name } => write!(f, "object '{name}' already exists"),
            Error::Io {
                operation,
                path,
                source,
            } => write!(f, "{operation} {} failed: {source}", path.display()),
            Error::Config { detail } => write!(f, "invalid settings: {detail}"),
            Error::WatchCancelled => write!(f, "watch loop has been cancelled"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Config {
            detail: e.to_string(),
        }
    }
}
