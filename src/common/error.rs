//! Error types for InterchangeDB.

use thiserror::Error;

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
/// This is a common Rust pattern (see `std::io::Result`).
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in InterchangeDB.
///
/// This enum represents every error that can occur in the engine, from the
/// buffer pool up through the query executor. Having a single error type
/// keeps error handling consistent across all layers.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error from disk operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested page does not exist on disk.
    #[error("page {0} not found")]
    PageNotFound(u32),

    /// Buffer pool has no free frames and cannot evict any pages.
    #[error("no free frames available in buffer pool")]
    NoFreeFrames,

    /// The provided page ID is invalid (e.g., exceeds max pages).
    #[error("invalid page id: {0}")]
    InvalidPageId(u32),

    /// Buffer pool is at maximum capacity.
    #[error("buffer pool is full")]
    BufferPoolFull,

    /// Attempted to unpin a page that wasn't pinned.
    #[error("page {0} is not pinned")]
    PageNotPinned(u32),

    /// A read ran past the end of the buffer/stream being read.
    #[error("unexpected end of stream")]
    UnexpectedEndOfStream,

    /// A CString write contained an embedded NUL byte.
    #[error("string contains an embedded null character")]
    InvalidNullCharInString,

    /// The connection string could not be parsed.
    #[error("invalid connection string: {0}")]
    InvalidConnectionString(String),

    /// The database file referenced by the connection string does not exist.
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// The supplied password does not decrypt the database (or none given).
    #[error("invalid password")]
    InvalidPassword,

    /// A page checksum did not match, or the header is unreadable.
    #[error("database corrupted: {0}")]
    DatabaseCorrupted(String),

    /// Insert violated a `Unique` index constraint.
    #[error("index key already exists: {0}")]
    IndexKeyAlreadyExists(String),

    /// An index key serialized to more than `MAX_INDEX_KEY_LENGTH` bytes.
    #[error("index key too long ({0} bytes, max {1})")]
    IndexKeyTooLong(usize, usize),

    /// `GetCollection` referenced a collection that doesn't exist.
    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    /// A collection name failed the `[A-Z_\-0-9]{1,60}` validation.
    #[error("invalid collection name: {0}")]
    InvalidCollectionName(String),

    /// A vector did not match the dimensionality fixed at `EnsureIndex` time.
    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    VectorDimensionMismatch { expected: u16, actual: u16 },

    /// A distance metric name could not be resolved.
    #[error("unsupported vector metric: {0}")]
    UnsupportedMetric(String),

    /// A lock (writer intent, process mutex) was not acquired before the
    /// `TIMEOUT` pragma elapsed.
    #[error("lock wait timed out")]
    LockTimeout,

    /// A write was attempted against a database opened `readonly=true`.
    #[error("database is read-only")]
    ReadOnlyDatabase,

    /// The file is in the legacy v4 layout and `upgrade=true` was not set.
    #[error("database requires upgrade from v4; open with upgrade=true")]
    UpgradeRequired,

    /// Shared mode was requested on a platform without global mutex ACLs.
    #[error("platform does not support shared-mode connections")]
    PlatformNotSupported,

    /// An expression failed to parse or type-check.
    #[error("invalid expression: {0}")]
    InvalidExpression(String),

    /// A `BsonValue` could not be converted to the requested type.
    #[error("invalid cast: {0}")]
    InvalidCast(String),

    /// A slotted data page had no room left for an item of the given size.
    #[error("page full: no room for {0} more bytes")]
    PageFull(usize),

    /// `find_by_id`/`update`/`delete` referenced a document that isn't
    /// (or is no longer) in the collection.
    #[error("document not found: {0}")]
    DocumentNotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::PageNotFound(42);
        assert_eq!(format!("{}", err), "page 42 not found");

        let err = Error::NoFreeFrames;
        assert_eq!(format!("{}", err), "no free frames available in buffer pool");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();

        match err {
            Error::Io(_) => {} // Success
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_result_type_alias() {
        // This function returns our Result type
        fn might_fail() -> Result<u32> {
            Ok(42)
        }

        assert_eq!(might_fail().unwrap(), 42);
    }

    #[test]
    fn test_vector_dimension_mismatch_display() {
        let err = Error::VectorDimensionMismatch {
            expected: 128,
            actual: 64,
        };
        assert_eq!(
            format!("{}", err),
            "vector dimension mismatch: expected 128, got 64"
        );
    }
}
