//! Error types
//!
//! The columnar container and its persistence layer each fail independently, so each gets
//! its own error enum rather than a single crate-wide one; see `DESIGN.md` for the rationale.
//! Topological precondition violations (sewing an already-sewn dart, unsewing a fixed point)
//! are *not* modeled as errors: per the map's failure semantics they are programming errors,
//! asserted in debug builds and undefined in release (matching `force_*`-style methods that
//! `assert!`/`debug_assert!` instead of returning a `Result`).

// ------ IMPORTS

use thiserror::Error;

// ------ CONTENT

/// Convenience alias for fallible [`ChunkArrayContainer`](crate::container::ChunkArrayContainer)
/// operations.
pub type ContainerResult<T> = Result<T, ContainerError>;

/// Container-level error enum.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContainerError {
    /// `add_attribute` was called with a name that is already in use.
    #[error("attribute name already in use: {0}")]
    NameInUse(&'static str),
    /// `get_attribute` was called with a name that has no associated column.
    #[error("unknown attribute: {0}")]
    Missing(&'static str),
    /// `get_attribute` was called with a type that does not match the stored column's type.
    #[error("attribute `{name}` is stored as `{found}`, not `{expected}`")]
    TypeMismatch {
        /// Name of the attribute looked up.
        name: &'static str,
        /// Type requested by the caller.
        expected: &'static str,
        /// Type the column was actually created with.
        found: &'static str,
    },
    /// `get_attribute_force_type` was called between two types of different sizes.
    #[error("cannot reinterpret a {old}-byte column as {new} bytes wide")]
    TypeSizeMismatch {
        /// Size in bytes of the type the caller wants to reinterpret as.
        new: usize,
        /// Size in bytes of the column's actual element type.
        old: usize,
    },
}

/// Convenience alias for fallible persistence operations.
pub type PersistResult<T> = Result<T, PersistError>;

/// Persistence (save/load) error enum.
#[derive(Debug, Error)]
pub enum PersistError {
    /// The stored chunk byte size does not match `C * size_of::<T>()` for the column being
    /// loaded into.
    #[error("stored chunk byte size ({found}) does not match the expected size ({expected})")]
    ChunkByteSizeMismatch {
        /// Size in bytes a chunk of the in-memory column type would occupy.
        expected: u32,
        /// Size in bytes recorded in the persisted stream.
        found: u32,
    },
    /// The stream ended before all the data promised by the header was read.
    #[error("persisted stream is truncated")]
    Truncated,
    /// A column name failed UTF-8 decoding.
    #[error("attribute name is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_error_messages() {
        assert_eq!(
            ContainerError::NameInUse("x").to_string(),
            "attribute name already in use: x"
        );
        assert_eq!(
            ContainerError::TypeSizeMismatch { new: 8, old: 4 }.to_string(),
            "cannot reinterpret a 4-byte column as 8 bytes wide"
        );
    }

    #[test]
    fn persist_error_from_io() {
        let io_err = std::io::Error::from(std::io::ErrorKind::UnexpectedEof);
        let err: PersistError = io_err.into();
        assert!(matches!(err, PersistError::Io(_)));
    }
}
