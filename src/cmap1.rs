//! 1-dimensional combinatorial map
//!
//! A `CMap1` is the base layer every higher-dimensional map builds on: darts wired into faces
//! by φ₁ alone. It has no edges or sewing in the usual sense — only [`add_face`](CMap1::add_face)
//! to grow the map, and enumeration over its two orbit kinds, vertex (trivial, one dart each)
//! and face (a φ₁-cycle).

// ------ IMPORTS

use crate::container::{ChunkArrayContainer, DEFAULT_CHUNK_SIZE};
use crate::dart::Dart;
use crate::key::Key;
use crate::markers::DartMarker;
use crate::orbit::{Cell, FaceOrbit, Orbit, VertexOrbit};
use crate::topology::DartStore;

// ------ CONTENT

/// A 1-dimensional combinatorial map: darts and the φ₁ face permutation, nothing else.
#[derive(Debug)]
pub struct CMap1<const C: usize = DEFAULT_CHUNK_SIZE> {
    darts: DartStore<C>,
    faces: ChunkArrayContainer<C>,
}

impl<const C: usize> Default for CMap1<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const C: usize> CMap1<C> {
    /// Build an empty map.
    #[must_use = "constructed object is not used, consider removing this call"]
    pub fn new() -> Self {
        Self { darts: DartStore::new(), faces: ChunkArrayContainer::new() }
    }

    /// Access to the underlying dart store, for code shared with [`crate::CMap2`]/
    /// [`crate::CMap3`].
    pub(crate) fn darts(&self) -> &DartStore<C> {
        &self.darts
    }

    pub(crate) fn darts_mut(&mut self) -> &mut DartStore<C> {
        &mut self.darts
    }

    /// Allocate `n` fresh darts wired into one φ₁-cycle (a face of codegree `n`), and return
    /// one dart of it.
    ///
    /// # Panics
    ///
    /// Panics if `n == 0`.
    pub fn add_face(&mut self, n: Key) -> Dart {
        assert!(n > 0, "add_face(0) is not a face");
        let first = self.darts.new_darts(n);
        for offset in 0..n {
            let a = Dart::from(first.id() + offset);
            let b = Dart::from(first.id() + (offset + 1) % n);
            self.darts.phi1_sew(a, b);
        }
        first
    }

    /// Ascending iterator over every live dart.
    pub fn foreach_dart(&self, mut f: impl FnMut(Dart)) {
        for d in self.darts.iter_darts() {
            f(d);
        }
    }

    /// The trivial vertex cell of `d`: in a 1-map, every dart is its own vertex.
    #[must_use = "unused cell"]
    pub fn vertex_cell(&self, d: Dart) -> Cell<VertexOrbit> {
        Cell::new(d.id(), d)
    }

    /// The face cell containing `d`, lazily allocating and stamping its embedding slot (the
    /// whole φ₁-cycle) on first observation.
    pub fn face_cell(&mut self, d: Dart) -> Cell<FaceOrbit> {
        let gens: [&dyn Fn(&DartStore<C>, Dart) -> Dart; 1] = [&|s: &DartStore<C>, x| s.phi1(x)];
        let slot = self.darts.resolve_embedding(&mut self.faces, FaceOrbit::NAME, &gens, d);
        Cell::new(slot, d)
    }

    /// Enumerate one representative dart per face, first-seen order, using a transient
    /// [`DartMarker`] to skip darts already visited as part of an earlier face.
    pub fn foreach_face(&self, mut f: impl FnMut(Dart)) {
        let mut marker = DartMarker::new(self.darts.marker_pool(), self.darts.nb_chunks());
        for d in self.darts.iter_darts() {
            if marker.is_marked(d) {
                continue;
            }
            let gens: [&dyn Fn(&DartStore<C>, Dart) -> Dart; 1] =
                [&|s: &DartStore<C>, x| s.phi1(x)];
            for od in self.darts.orbit_closure(d, &gens) {
                marker.mark(od);
            }
            f(d);
        }
    }

    /// Number of live darts.
    #[must_use = "unused count"]
    pub fn nb_darts(&self) -> usize {
        self.darts.nb_darts()
    }

    /// Number of live face cells.
    #[must_use = "unused count"]
    pub fn nb_faces(&self) -> usize {
        self.faces.nb_elements()
    }

    /// φ₁ image of `d`.
    #[must_use = "unused dart"]
    pub fn phi1(&self, d: Dart) -> Dart {
        self.darts.phi1(d)
    }

    /// φ₁⁻¹ image of `d`.
    #[must_use = "unused dart"]
    pub fn phi_1(&self, d: Dart) -> Dart {
        self.darts.phi_1(d)
    }

    /// Bind a new attribute column named `name` to the face container.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ContainerError::NameInUse`] if the name is already taken.
    pub fn add_face_attribute<T>(&mut self, name: &'static str) -> crate::error::ContainerResult<()>
    where
        T: Default + Copy + std::fmt::Debug + Send + Sync + 'static,
    {
        self.faces.add_attribute::<FaceOrbit, T>(name)
    }

    /// Fetch a read-only handle to the face attribute column named `name`.
    pub fn get_face_attribute<T>(
        &self,
        name: &'static str,
    ) -> crate::error::ContainerResult<crate::container::AttributeHandle<'_, FaceOrbit, T, C>>
    where
        T: Default + Copy + std::fmt::Debug + 'static,
    {
        self.faces.get_attribute::<FaceOrbit, T>(name)
    }

    /// Fetch a mutable handle to the face attribute column named `name`.
    pub fn get_face_attribute_mut<T>(
        &mut self,
        name: &'static str,
    ) -> crate::error::ContainerResult<crate::container::AttributeHandleMut<'_, FaceOrbit, T, C>>
    where
        T: Default + Copy + std::fmt::Debug + 'static,
    {
        self.faces.get_attribute_mut::<FaceOrbit, T>(name)
    }

    /// Remove the face attribute column named `name`.
    pub fn remove_face_attribute(&mut self, name: &'static str) {
        self.faces.remove_attribute(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestMap = CMap1<32>;

    #[test]
    fn add_face_wires_a_phi1_cycle_of_the_right_length() {
        let mut m = TestMap::new();
        let first = m.add_face(4);
        let mut cur = m.darts.phi1(first);
        let mut count = 1;
        while cur != first {
            count += 1;
            cur = m.darts.phi1(cur);
        }
        assert_eq!(count, 4);
    }

    #[test]
    fn vertex_cell_is_trivial_and_distinct_per_dart() {
        let mut m = TestMap::new();
        let first = m.add_face(3);
        let second = m.darts.phi1(first);
        assert_ne!(m.vertex_cell(first), m.vertex_cell(second));
    }

    #[test]
    fn face_cell_embedding_is_shared_by_the_whole_cycle() {
        let mut m = TestMap::new();
        let first = m.add_face(3);
        let second = m.darts.phi1(first);
        let third = m.darts.phi1(second);
        let f1 = m.face_cell(first);
        assert_eq!(f1, m.face_cell(second));
        assert_eq!(f1, m.face_cell(third));
    }

    #[test]
    fn foreach_face_visits_one_representative_per_face() {
        let mut m = TestMap::new();
        m.add_face(3);
        m.add_face(4);
        let mut count = 0;
        m.foreach_face(|_| count += 1);
        assert_eq!(count, 2);
    }
}
