//! Error handling for scene import operations

use thiserror::Error;

/// Result type alias for scene import operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can abort the import of a file.
///
/// Recoverable problems (bad indices, unknown section types and the like) are
/// never reported through this type; readers log them and carry on. Every
/// variant here means the file being imported produced no scene.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Import operation failed
    #[error("Import failed: {message}")]
    ImportFailed {
        /// Description of the failure
        message: String,
    },

    /// Invalid file path or file not found
    #[error("File error: {message}")]
    FileError {
        /// Description of the failure
        message: String,
    },

    /// Invalid parameters or configuration
    #[error("Invalid parameter: {message}")]
    InvalidParameter {
        /// Description of the failure
        message: String,
    },

    /// No registered reader accepts the input
    #[error("Unsupported format: {format}")]
    UnsupportedFormat {
        /// File name or extension that was rejected
        format: String,
    },

    /// I/O operation failed
    #[error("I/O error: {message}")]
    IoError {
        /// Description of the failure
        message: String,
    },

    /// The staged scene breaks one of the scene graph invariants
    #[error("Invalid scene: {message}")]
    InvalidScene {
        /// Description of the broken invariant
        message: String,
    },

    /// Malformed structure in a text or binary file
    #[error("{format}: parse error{}: {message}", line.map(|l| format!(" at line {l}")).unwrap_or_default())]
    Parse {
        /// Reader that produced the error
        format: &'static str,
        /// 1-based line of the offending token, if known
        line: Option<usize>,
        /// Description of the failure
        message: String,
    },

    /// Declared sizes exceed the bytes actually present
    #[error("{format}: file is truncated (expected {expected} bytes, found {actual})")]
    Truncated {
        /// Reader that produced the error
        format: &'static str,
        /// Size implied by the file's own header
        expected: usize,
        /// Size of the buffer
        actual: usize,
    },

    /// Nesting exceeded the hard depth limit
    #[error("{format}: nesting deeper than {limit} levels")]
    RecursionLimit {
        /// Reader that produced the error
        format: &'static str,
        /// The limit that was exceeded
        limit: usize,
    },

    /// Hierarchy resolution found no root node
    #[error("{format}: unable to find the scene root node")]
    NoRootNode {
        /// Reader that produced the error
        format: &'static str,
    },

    /// A file tried to load itself, directly or through a chain of references
    #[error("Recursive file reference: {path}")]
    SelfReference {
        /// The offending path
        path: String,
    },

    /// The file parsed but yielded nothing to build a scene from
    #[error("{format}: no usable geometry or skeleton")]
    NoGeometry {
        /// Reader that produced the error
        format: &'static str,
    },

    /// String conversion error (UTF-8)
    #[error("String conversion error: {0}")]
    StringConversion(#[from] std::str::Utf8Error),

    /// Generic error with custom message
    #[error("{message}")]
    Other {
        /// Description of the failure
        message: String,
    },
}

impl Error {
    /// Create a new import error
    pub fn import_failed<S: Into<String>>(message: S) -> Self {
        Self::ImportFailed {
            message: message.into(),
        }
    }

    /// Create a new file error
    pub fn file_error<S: Into<String>>(message: S) -> Self {
        Self::FileError {
            message: message.into(),
        }
    }

    /// Create a new invalid parameter error
    pub fn invalid_parameter<S: Into<String>>(message: S) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    /// Create a new unsupported format error
    pub fn unsupported_format<S: Into<String>>(format: S) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    /// Create a new I/O error
    pub fn io_error<S: Into<String>>(message: S) -> Self {
        Self::IoError {
            message: message.into(),
        }
    }

    /// Create a new invalid scene error
    pub fn invalid_scene<S: Into<String>>(message: S) -> Self {
        Self::InvalidScene {
            message: message.into(),
        }
    }

    /// Create a parse error without position information
    pub fn parse<S: Into<String>>(format: &'static str, message: S) -> Self {
        Self::Parse {
            format,
            line: None,
            message: message.into(),
        }
    }

    /// Create a parse error pointing at a line
    pub fn parse_at<S: Into<String>>(format: &'static str, line: usize, message: S) -> Self {
        Self::Parse {
            format,
            line: Some(line),
            message: message.into(),
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Whether this error was caused by hitting the nesting limit
    pub fn is_recursion_limit(&self) -> bool {
        matches!(self, Self::RecursionLimit { .. })
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::io_error(err.to_string())
    }
}
