use std::fmt;

/// Errors raised by a resumable upload engine.
#[derive(Debug)]
pub enum UploadError {
    /// No upload exists under this identifier.
    NotFound(String),
    Io(std::io::Error),
    InvalidId(String),
    /// The declared length exceeds the configured maximum.
    SizeLimitExceeded { declared: u64, limit: u64 },
    /// The stream carried more bytes than the declared length allows.
    LengthExceeded { length: u64 },
    /// A write did not start at the upload's current offset.
    OffsetMismatch { expected: u64, actual: u64 },
    /// The upload has not received all of its bytes yet.
    Incomplete { offset: u64, length: u64 },
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "upload not found: {id}"),
            Self::Io(err) => write!(f, "upload IO error: {err}"),
            Self::InvalidId(msg) => write!(f, "invalid upload id: {msg}"),
            Self::SizeLimitExceeded { declared, limit } => {
                write!(f, "upload length exceeds size limit ({declared} > {limit} bytes)")
            }
            Self::LengthExceeded { length } => {
                write!(f, "stream exceeds declared upload length of {length} bytes")
            }
            Self::OffsetMismatch { expected, actual } => {
                write!(f, "offset mismatch (expected {expected}, got {actual})")
            }
            Self::Incomplete { offset, length } => {
                write!(f, "upload incomplete ({offset} of {length} bytes)")
            }
        }
    }
}

impl std::error::Error for UploadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for UploadError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for UploadError {
    fn from(err: serde_json::Error) -> Self {
        Self::Io(err.into())
    }
}
