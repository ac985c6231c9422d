//! Error types for the FBX library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for FBX operations.
///
/// Every variant is fatal: the call that produced it returns no document
/// or mesh. Recoverable conditions are reported as [`Warning`](super::Warning)s.
#[derive(Error, Debug)]
pub enum Error {
    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Missing `Kaydara FBX Binary` prefix
    #[error("Not an FBX binary file: missing Kaydara magic")]
    NotThisFormat,

    /// Stream is truncated
    #[error("Unexpected end of data at position {0}")]
    UnexpectedEof(u64),

    /// Array declares elements but no payload bytes
    #[error("Corrupt array: {count} elements declared with zero payload length")]
    CorruptArrayLength { count: u32 },

    /// Declared array payload fails the allocation checks
    #[error("Array payload of {bytes} bytes rejected: {reason}")]
    ArrayTooLarge { bytes: u64, reason: &'static str },

    /// Inflated array does not have the declared size
    #[error("Inflated array is {actual} bytes, expected {expected}")]
    InflatedLengthMismatch { expected: usize, actual: usize },

    /// zlib stream could not be decoded
    #[error("Corrupt compressed array: {0}")]
    Inflate(String),

    /// Bytes consumed by the property list differ from the header field
    #[error("Property list is {actual} bytes, header declares {declared}")]
    CorruptPropertyListLength { declared: u64, actual: u64 },

    /// Record end offset points backwards or past the buffer
    #[error("Record end offset {end} is invalid at position {pos}")]
    CorruptEndOffset { end: u64, pos: u64 },

    /// Property type byte is not one of the known codes
    #[error("Unknown property type code 0x{0:02x}")]
    UnknownPropertyType(u8),

    /// Typed lookup found a different type code
    #[error("Type mismatch: expected '{expected}', got '{actual}'")]
    TypeMismatch { expected: char, actual: char },

    /// Typed lookup past the end of the property list
    #[error("Property index {index} out of range (count: {count})")]
    PropertyOutOfRange { index: usize, count: usize },

    /// Required record is absent
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// Record names are length-prefixed by a single byte
    #[error("Record name is {0} bytes, at most 255 allowed")]
    NameTooLong(usize),

    /// Record tree is nested deeper than the reader allows
    #[error("Record nesting exceeds depth {0}")]
    NestingTooDeep(usize),

    /// Vertex injection ran out of coordinates
    #[error("Insufficient data: {needed} coordinates needed, {available} supplied")]
    InsufficientData { needed: usize, available: usize },

    /// Failure inside a named record, innermost record wins
    #[error("In record '{record}'{}: {source}", .index.map(|i| format!(" property {}", i)).unwrap_or_default())]
    InRecord {
        record: String,
        index: Option<usize>,
        #[source]
        source: Box<Error>,
    },

    /// Invalid data structure
    #[error("Invalid file structure: {0}")]
    InvalidStructure(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 conversion error
    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid structure error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidStructure(msg.into())
    }

    /// Attach the offending record (and property index) unless an inner
    /// record already claimed this error.
    pub fn in_record(self, record: &str, index: Option<usize>) -> Self {
        match self {
            e @ Self::InRecord { .. } => e,
            e => Self::InRecord {
                record: record.to_string(),
                index,
                source: Box::new(e),
            },
        }
    }

    /// The error with any record context stripped.
    pub fn root_cause(&self) -> &Error {
        match self {
            Self::InRecord { source, .. } => source.root_cause(),
            e => e,
        }
    }
}

/// Result type alias for FBX operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::NotThisFormat;
        assert!(e.to_string().contains("magic"));

        let e = Error::PropertyOutOfRange { index: 5, count: 3 };
        assert!(e.to_string().contains("5"));
        assert!(e.to_string().contains("3"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_innermost_record_wins() {
        let e = Error::TypeMismatch { expected: 'd', actual: 'f' }
            .in_record("Vertices", Some(0))
            .in_record("Geometry", None);
        match &e {
            Error::InRecord { record, index, .. } => {
                assert_eq!(record, "Vertices");
                assert_eq!(*index, Some(0));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(e.root_cause(), Error::TypeMismatch { .. }));
        assert!(e.to_string().contains("property 0"));
    }
}
