//! Orbit tags and cell handles
//!
//! An *orbit* is an equivalence class of darts under one of the φ-generated subgroups
//! described in the crate's top-level documentation (vertex, edge, face, volume). This module
//! defines the zero-sized marker types used to tag [`AttributeHandle`](crate::container::AttributeHandle)
//! and [`ChunkArrayContainer`](crate::container::ChunkArrayContainer) by which orbit they
//! belong to, plus [`Cell`], the typed handle to one orbit's representative.

// ------ IMPORTS

use std::marker::PhantomData;

use crate::dart::Dart;
use crate::key::Key;

// ------ CONTENT

/// Marker-type bound shared by every orbit tag ([`DartOrbit`], [`VertexOrbit`], ...).
///
/// Implementors are zero-sized and exist purely at the type level, the same role
/// `OrbitPolicy` plays as a runtime enum in the teacher crate's generic attribute layer —
/// except resolved at compile time here, so `AttributeHandle<VertexOrbit, f32>` and
/// `AttributeHandle<EdgeOrbit, f32>` cannot be confused by the type checker.
pub trait Orbit: Copy + Eq + std::hash::Hash + 'static {
    /// Human-readable name, used in diagnostics and as a container-lookup discriminant.
    const NAME: &'static str;
}

macro_rules! orbit_tag {
    ($(#[$meta:meta])* $name:ident, $repr:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub struct $name;

        impl Orbit for $name {
            const NAME: &'static str = $repr;
        }
    };
}

orbit_tag!(
    /// Tag for columns/cells keyed directly by dart slot (used internally by the dart
    /// container for φ-image and embedding-index columns; not itself an orbit of darts).
    DartOrbit,
    "dart"
);
orbit_tag!(
    /// Tag for the vertex (0-cell) orbit.
    VertexOrbit,
    "vertex"
);
orbit_tag!(
    /// Tag for the edge (1-cell) orbit.
    EdgeOrbit,
    "edge"
);
orbit_tag!(
    /// Tag for the face (2-cell) orbit.
    FaceOrbit,
    "face"
);
orbit_tag!(
    /// Tag for the volume (3-cell) orbit. In [`CMap2`](crate::CMap2) this is the
    /// connected-component orbit ⟨φ1,φ2⟩ (there is no bounded 3-cell below `CMap3`); in
    /// [`CMap3`](crate::CMap3) it is a genuine bounded 3-cell.
    VolumeOrbit,
    "volume"
);

/// A typed handle to one orbit's representative: a resolved embedding slot, plus the dart
/// that produced it for diagnostics.
///
/// Equality is defined as "same embedding index", per the crate's data model: two `Cell`
/// values compare equal iff their `slot` fields match, regardless of which dart of the orbit
/// each was constructed from.
#[derive(Clone, Copy, Debug)]
pub struct Cell<O: Orbit> {
    slot: Key,
    dart: Dart,
    _orbit: PhantomData<O>,
}

impl<O: Orbit> Cell<O> {
    pub(crate) fn new(slot: Key, dart: Dart) -> Self {
        Self { slot, dart, _orbit: PhantomData }
    }

    /// The resolved cell slot, usable to index an [`AttributeHandle`](crate::container::AttributeHandle).
    #[must_use = "unused slot index"]
    pub fn slot(&self) -> Key {
        self.slot
    }

    /// The dart this cell handle was resolved from. Kept only for diagnostics: two `Cell`s
    /// with different darts but the same slot are the same cell.
    #[must_use = "unused dart"]
    pub fn dart(&self) -> Dart {
        self.dart
    }
}

impl<O: Orbit> PartialEq for Cell<O> {
    fn eq(&self, other: &Self) -> bool {
        self.slot == other.slot
    }
}

impl<O: Orbit> Eq for Cell<O> {}

impl<O: Orbit> std::hash::Hash for Cell<O> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.slot.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_with_same_slot_are_equal_regardless_of_dart() {
        let a = Cell::<VertexOrbit>::new(3, Dart::from(1));
        let b = Cell::<VertexOrbit>::new(3, Dart::from(7));
        assert_eq!(a, b);
        assert_eq!(a.slot(), b.slot());
        assert_ne!(a.dart(), b.dart());
    }

    #[test]
    fn cells_with_different_slots_are_not_equal() {
        let a = Cell::<VertexOrbit>::new(1, Dart::from(1));
        let b = Cell::<VertexOrbit>::new(2, Dart::from(1));
        assert_ne!(a, b);
    }
}
