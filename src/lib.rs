//! # cmap-core
//!
//! This crate implements the storage and topology core of an N-dimensional combinatorial-map
//! modeling library: a chunked, slot-addressed columnar attribute container
//! ([`container`]), the dart/φ-permutation topology it is built on ([`topology`]), and the
//! three map structures assembled from them, [`CMap1`], [`CMap2`] and [`CMap3`].
//!
//! A map never touches a column directly. Topological queries (`phi1`, `add_face`,
//! `sew_faces`, orbit walks) go through [`topology::DartStore`]; attribute reads/writes go
//! through an [`container::AttributeHandle`]/[`container::AttributeHandleMut`] obtained from a
//! [`container::ChunkArrayContainer`]. [`orbit::Cell`] is the stable, slot-based identity
//! shared between the two: two cells compare equal iff they resolve to the same embedding
//! slot, regardless of which dart either was constructed from.
//!
//! This crate does not read or write any file format (OFF/OBJ/PLY/STL/Tetgen), nor implement
//! geometry algorithms (normals, triangulation, subdivision); those are consumers of the cell
//! enumeration and attribute read/write surface defined here, layered on top in other crates.

// ------ MODULE DECLARATIONS

pub mod buffer_pool;
mod cmap1;
mod cmap2;
mod cmap3;
pub mod container;
mod dart;
mod error;
mod key;
pub mod markers;
mod orbit;
pub mod topology;

// ------ RE-EXPORTS

pub use buffer_pool::BufferPool;
pub use cmap1::CMap1;
pub use cmap2::CMap2;
pub use cmap3::CMap3;
pub use dart::{Dart, DartId, NULL_DART_ID};
pub use error::{ContainerError, ContainerResult, PersistError, PersistResult};
pub use key::{Key, NULL_KEY};
pub use orbit::{Cell, DartOrbit, EdgeOrbit, FaceOrbit, Orbit, VertexOrbit, VolumeOrbit};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_triangle_round_trips_through_the_public_surface() {
        let mut m: CMap2<32> = CMap2::new();
        let d0 = m.add_face(3);
        let face = m.face_cell(d0);
        assert!(m.is_triangle(face));
        assert_eq!(m.codegree(face), 3);
    }
}
