//! Columnar, slot-addressed attribute storage
//!
//! This module groups the three pieces that make up the storage layer described in the
//! crate's top-level documentation: [`ChunkArray`]/[`BoolChunkArray`] (one column), the
//! [`ChunkArrayContainer`] that owns a set of named columns sharing a free list, and the
//! [`AttributeHandle`]/[`AttributeHandleMut`] views returned by looking a column up by name.

mod chunk_array;
mod container;
mod handle;

pub use chunk_array::{BoolChunkArray, Column, ChunkArray, DEFAULT_CHUNK_SIZE};
pub use container::ChunkArrayContainer;
pub use handle::{AttributeHandle, AttributeHandleMut};

/// Re-exported for [`crate::topology::DartStore`], which reads the same length-prefixed u32
/// header fields its φ-image columns and embedding columns are persisted with.
pub(crate) use chunk_array::read_u32;
