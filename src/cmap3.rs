//! 3-dimensional combinatorial map
//!
//! `CMap3` extends [`crate::CMap2`] with the φ₃ involution: sewing two boundary darts under
//! φ₃ ([`CMap3::sew_volumes`]) glues a face of one volume onto a face of another, so the two
//! faces (and whatever vertices/edges they share) become a single shared cell; φ₂-sewing
//! ([`CMap3::sew_faces`]) still builds the faces of each volume exactly as in `CMap2`. Vertex,
//! edge and face orbits are walked under an additional φ₃ generator compared to `CMap2`;
//! volumes stay orbits of ⟨φ₁,φ₂⟩ alone, since φ₃ identifies cells *across* volumes rather than
//! merging the volumes themselves.

// ------ IMPORTS

use crate::container::{ChunkArrayContainer, DEFAULT_CHUNK_SIZE};
use crate::dart::Dart;
use crate::key::{Key, NULL_KEY};
use crate::markers::DartMarker;
use crate::orbit::{Cell, EdgeOrbit, FaceOrbit, Orbit, VertexOrbit, VolumeOrbit};
use crate::topology::DartStore;

// ------ CONTENT

type Gen<const C: usize> = dyn Fn(&DartStore<C>, Dart) -> Dart;

/// Vertex orbit, widened with a φ₃ generator relative to [`crate::CMap2`]'s: a vertex on a
/// φ₃-glued face is shared by darts on both sides of the gluing.
fn vertex_gens<const C: usize>() -> [&'static Gen<C>; 3] {
    // The first two generators compose two φ-images; short-circuit to `Dart::NULL` rather than
    // feeding a free (`Dart::NULL`) intermediate image into the second φ.
    [
        &|s: &DartStore<C>, x: Dart| {
            let m = s.phi2(x);
            if m.is_null() { Dart::NULL } else { s.phi1(m) }
        },
        &|s: &DartStore<C>, x: Dart| {
            let m = s.phi_1(x);
            if m.is_null() { Dart::NULL } else { s.phi2(m) }
        },
        &|s: &DartStore<C>, x: Dart| s.phi3(x),
    ]
}

/// Edge orbit, widened with a φ₃ generator relative to `CMap2`'s `⟨φ₂⟩`.
fn edge_gens<const C: usize>() -> [&'static Gen<C>; 2] {
    [&|s: &DartStore<C>, x: Dart| s.phi2(x), &|s: &DartStore<C>, x: Dart| s.phi3(x)]
}

/// Face orbit, widened with a φ₃ generator: two faces identified by a φ₃ sew become one cell.
fn face_gens<const C: usize>() -> [&'static Gen<C>; 3] {
    [
        &|s: &DartStore<C>, x: Dart| s.phi1(x),
        &|s: &DartStore<C>, x: Dart| s.phi_1(x),
        &|s: &DartStore<C>, x: Dart| s.phi3(x),
    ]
}

/// Volume orbit: `⟨φ₁,φ₂⟩`, unchanged from `CMap2` — φ₃ glues cells *across* two volumes, it
/// never merges the volumes themselves into one.
fn volume_gens<const C: usize>() -> [&'static Gen<C>; 3] {
    [
        &|s: &DartStore<C>, x: Dart| s.phi1(x),
        &|s: &DartStore<C>, x: Dart| s.phi_1(x),
        &|s: &DartStore<C>, x: Dart| s.phi2(x),
    ]
}

/// A 3-dimensional combinatorial map: darts, φ₁/φ₂/φ₃, and lazily-allocated vertex/edge/face/
/// volume cell containers.
#[derive(Debug)]
pub struct CMap3<const C: usize = DEFAULT_CHUNK_SIZE> {
    darts: DartStore<C>,
    vertices: ChunkArrayContainer<C>,
    edges: ChunkArrayContainer<C>,
    faces: ChunkArrayContainer<C>,
    volumes: ChunkArrayContainer<C>,
}

impl<const C: usize> Default for CMap3<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const C: usize> CMap3<C> {
    /// Build an empty map.
    #[must_use = "constructed object is not used, consider removing this call"]
    pub fn new() -> Self {
        Self {
            darts: DartStore::new(),
            vertices: ChunkArrayContainer::new(),
            edges: ChunkArrayContainer::new(),
            faces: ChunkArrayContainer::new(),
            volumes: ChunkArrayContainer::new(),
        }
    }

    /// Allocate `n` fresh darts wired into one φ₁-cycle (an open face of codegree `n`, every
    /// dart φ₂- and φ₃-free), and return one dart of it.
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

    /// φ₂-sew two boundary darts together, as in [`crate::CMap2::sew_faces`]. Updates vertex
    /// and edge embeddings (both now walked with the φ₃ generator included); the face orbit is
    /// unaffected by a φ₂ sew, and the volume orbit (`⟨φ₁,φ₂⟩`) may merge two previously
    /// distinct volumes into one.
    ///
    /// # Panics (debug only)
    ///
    /// Panics unless both `d` and `e` are φ₂-free.
    pub fn sew_faces(&mut self, d: Dart, e: Dart) {
        self.darts.phi2_sew(d, e);
        let vgens = vertex_gens::<C>();
        self.darts.reconcile_merge(&mut self.vertices, VertexOrbit::NAME, &vgens, d);
        self.darts.reconcile_merge(&mut self.vertices, VertexOrbit::NAME, &vgens, e);
        let egens = edge_gens::<C>();
        self.darts.reconcile_merge(&mut self.edges, EdgeOrbit::NAME, &egens, d);
        let vol_gens = volume_gens::<C>();
        self.darts.reconcile_merge(&mut self.volumes, VolumeOrbit::NAME, &vol_gens, d);
    }

    /// Undo a [`sew_faces`](CMap3::sew_faces): φ₂-unsew `d` from its partner.
    ///
    /// # Panics (debug only)
    ///
    /// Panics if `d` is already φ₂-free.
    pub fn unsew_faces(&mut self, d: Dart) {
        let e = self.darts.phi2(d);
        debug_assert!(!e.is_null(), "unsew_faces: {d:?} is already phi2-free");
        let corner1_partner = self.darts.phi1(e);
        let corner2_partner = self.darts.phi1(d);
        let edge_slot_before = self.darts.get_embedding(EdgeOrbit::NAME, d);

        self.darts.phi2_unsew(d);

        let vgens = vertex_gens::<C>();
        self.darts.reconcile_split(&mut self.vertices, VertexOrbit::NAME, &vgens, d, corner1_partner);
        self.darts.reconcile_split(&mut self.vertices, VertexOrbit::NAME, &vgens, e, corner2_partner);

        if edge_slot_before != NULL_KEY {
            let egens = edge_gens::<C>();
            self.darts.reconcile_split(&mut self.edges, EdgeOrbit::NAME, &egens, d, e);
        }

        let vol_gens = volume_gens::<C>();
        self.darts.reconcile_split(&mut self.volumes, VolumeOrbit::NAME, &vol_gens, d, e);
    }

    /// φ₃-sew two boundary darts belonging to a face each of two (usually distinct) volumes,
    /// gluing the two faces into one shared cell.
    ///
    /// Updates vertex, edge and face embeddings so the orbits of `d` and `e` share a slot (the
    /// lowest-numbered of any slots the merged orbit already carried wins); the volume orbit
    /// is left untouched, since `⟨φ₁,φ₂⟩` never crosses a φ₃ link.
    ///
    /// # Panics (debug only)
    ///
    /// Panics unless both `d` and `e` are φ₃-free.
    pub fn sew_volumes(&mut self, d: Dart, e: Dart) {
        self.darts.phi3_sew(d, e);
        // Unlike a phi2 edge-sew (which joins two distinct vertex orbits, one at each end of
        // the new edge), phi3(x) is itself one of the vertex/edge/face generators, so seeding
        // the merge walk from `d` alone already reaches `e`'s orbit; a second pass from `e`
        // would just re-walk the same now-merged orbit.
        let vgens = vertex_gens::<C>();
        self.darts.reconcile_merge(&mut self.vertices, VertexOrbit::NAME, &vgens, d);
        let egens = edge_gens::<C>();
        self.darts.reconcile_merge(&mut self.edges, EdgeOrbit::NAME, &egens, d);
        let fgens = face_gens::<C>();
        self.darts.reconcile_merge(&mut self.faces, FaceOrbit::NAME, &fgens, d);
    }

    /// Undo a [`sew_volumes`](CMap3::sew_volumes): φ₃-unsew `d` from its partner.
    ///
    /// If the unsewn darts now lie in distinct orbits, the detached side is restamped onto a
    /// freshly allocated slot; the volume orbit is untouched (it never depended on φ₃).
    ///
    /// # Panics (debug only)
    ///
    /// Panics if `d` is already φ₃-free.
    pub fn unsew_volumes(&mut self, d: Dart) {
        let e = self.darts.phi3(d);
        debug_assert!(!e.is_null(), "unsew_volumes: {d:?} is already phi3-free");

        self.darts.phi3_unsew(d);

        // A single split check suffices here for the same reason `sew_volumes` only needs a
        // single merge: phi3 is a direct generator of these orbits, so `d` and `e` were (and,
        // if still connected some other way, still are) in one orbit together.
        let vgens = vertex_gens::<C>();
        self.darts.reconcile_split(&mut self.vertices, VertexOrbit::NAME, &vgens, d, e);
        let egens = edge_gens::<C>();
        self.darts.reconcile_split(&mut self.edges, EdgeOrbit::NAME, &egens, d, e);
        let fgens = face_gens::<C>();
        self.darts.reconcile_split(&mut self.faces, FaceOrbit::NAME, &fgens, d, e);
    }

    /// The vertex cell at the tail of `d`, lazily resolving its embedding slot.
    pub fn vertex_cell(&mut self, d: Dart) -> Cell<VertexOrbit> {
        let gens = vertex_gens::<C>();
        let slot = self.darts.resolve_embedding(&mut self.vertices, VertexOrbit::NAME, &gens, d);
        Cell::new(slot, d)
    }

    /// The edge cell containing `d`.
    pub fn edge_cell(&mut self, d: Dart) -> Cell<EdgeOrbit> {
        let gens = edge_gens::<C>();
        let slot = self.darts.resolve_embedding(&mut self.edges, EdgeOrbit::NAME, &gens, d);
        Cell::new(slot, d)
    }

    /// The face cell containing `d` — its φ₁-cycle, plus its φ₃-glued twin if sewn.
    pub fn face_cell(&mut self, d: Dart) -> Cell<FaceOrbit> {
        let gens = face_gens::<C>();
        let slot = self.darts.resolve_embedding(&mut self.faces, FaceOrbit::NAME, &gens, d);
        Cell::new(slot, d)
    }

    /// The volume cell containing `d` (its `⟨φ₁,φ₂⟩` orbit).
    pub fn volume_cell(&mut self, d: Dart) -> Cell<VolumeOrbit> {
        let gens = volume_gens::<C>();
        let slot = self.darts.resolve_embedding(&mut self.volumes, VolumeOrbit::NAME, &gens, d);
        Cell::new(slot, d)
    }

    /// Length of the φ₁-cycle containing `face`'s dart.
    #[must_use = "unused codegree"]
    pub fn codegree(&self, face: Cell<FaceOrbit>) -> u32 {
        let mut count = 1;
        let mut cur = self.darts.phi1(face.dart());
        while cur != face.dart() {
            count += 1;
            cur = self.darts.phi1(cur);
        }
        count
    }

    /// Whether `face` has codegree 3, checked in O(1) by walking at most four φ₁ steps.
    #[must_use = "unused boolean"]
    pub fn is_triangle(&self, face: Cell<FaceOrbit>) -> bool {
        let d0 = face.dart();
        let d1 = self.darts.phi1(d0);
        if d1 == d0 {
            return false;
        }
        let d2 = self.darts.phi1(d1);
        if d2 == d0 {
            return false;
        }
        let d3 = self.darts.phi1(d2);
        d3 == d0
    }

    /// Walk φ₁ around `face` and call `g` on each incident vertex cell.
    pub fn foreach_incident_vertex(&mut self, face: Cell<FaceOrbit>, mut g: impl FnMut(Cell<VertexOrbit>)) {
        let start = face.dart();
        let mut cur = start;
        loop {
            let v = self.vertex_cell(cur);
            g(v);
            cur = self.darts.phi1(cur);
            if cur == start {
                break;
            }
        }
    }

    /// Enumerate one representative dart per face, first-seen order.
    pub fn foreach_face(&self, mut f: impl FnMut(Dart)) {
        let mut marker = DartMarker::new(self.darts.marker_pool(), self.darts.nb_chunks());
        let gens = face_gens::<C>();
        for d in self.darts.iter_darts() {
            if marker.is_marked(d) {
                continue;
            }
            for od in self.darts.orbit_closure(d, &gens) {
                marker.mark(od);
            }
            f(d);
        }
    }

    /// Enumerate one representative dart per volume, first-seen order.
    pub fn foreach_volume(&self, mut f: impl FnMut(Dart)) {
        let mut marker = DartMarker::new(self.darts.marker_pool(), self.darts.nb_chunks());
        let gens = volume_gens::<C>();
        for d in self.darts.iter_darts() {
            if marker.is_marked(d) {
                continue;
            }
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

    /// Number of live vertex cells.
    #[must_use = "unused count"]
    pub fn nb_vertices(&self) -> usize {
        self.vertices.nb_elements()
    }

    /// Number of live edge cells.
    #[must_use = "unused count"]
    pub fn nb_edges(&self) -> usize {
        self.edges.nb_elements()
    }

    /// Number of live face cells.
    #[must_use = "unused count"]
    pub fn nb_faces(&self) -> usize {
        self.faces.nb_elements()
    }

    /// Number of live volume cells.
    #[must_use = "unused count"]
    pub fn nb_volumes(&self) -> usize {
        self.volumes.nb_elements()
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

    /// φ₂ image of `d`.
    #[must_use = "unused dart"]
    pub fn phi2(&self, d: Dart) -> Dart {
        self.darts.phi2(d)
    }

    /// φ₃ image of `d`.
    #[must_use = "unused dart"]
    pub fn phi3(&self, d: Dart) -> Dart {
        self.darts.phi3(d)
    }

    /// Bind a new attribute column named `name` to the vertex container.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ContainerError::NameInUse`] if the name is already taken.
    pub fn add_vertex_attribute<T>(&mut self, name: &'static str) -> crate::error::ContainerResult<()>
    where
        T: Default + Copy + std::fmt::Debug + Send + Sync + 'static,
    {
        self.vertices.add_attribute::<VertexOrbit, T>(name)
    }

    /// Fetch a read-only handle to the vertex attribute column named `name`.
    pub fn get_vertex_attribute<T>(
        &self,
        name: &'static str,
    ) -> crate::error::ContainerResult<crate::container::AttributeHandle<'_, VertexOrbit, T, C>>
    where
        T: Default + Copy + std::fmt::Debug + 'static,
    {
        self.vertices.get_attribute::<VertexOrbit, T>(name)
    }

    /// Fetch a mutable handle to the vertex attribute column named `name`.
    pub fn get_vertex_attribute_mut<T>(
        &mut self,
        name: &'static str,
    ) -> crate::error::ContainerResult<crate::container::AttributeHandleMut<'_, VertexOrbit, T, C>>
    where
        T: Default + Copy + std::fmt::Debug + 'static,
    {
        self.vertices.get_attribute_mut::<VertexOrbit, T>(name)
    }

    /// Remove the vertex attribute column named `name`.
    pub fn remove_vertex_attribute(&mut self, name: &'static str) {
        self.vertices.remove_attribute(name);
    }

    /// Bind a new attribute column named `name` to the volume container.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ContainerError::NameInUse`] if the name is already taken.
    pub fn add_volume_attribute<T>(&mut self, name: &'static str) -> crate::error::ContainerResult<()>
    where
        T: Default + Copy + std::fmt::Debug + Send + Sync + 'static,
    {
        self.volumes.add_attribute::<VolumeOrbit, T>(name)
    }

    /// Fetch a read-only handle to the volume attribute column named `name`.
    pub fn get_volume_attribute<T>(
        &self,
        name: &'static str,
    ) -> crate::error::ContainerResult<crate::container::AttributeHandle<'_, VolumeOrbit, T, C>>
    where
        T: Default + Copy + std::fmt::Debug + 'static,
    {
        self.volumes.get_attribute::<VolumeOrbit, T>(name)
    }

    /// Fetch a mutable handle to the volume attribute column named `name`.
    pub fn get_volume_attribute_mut<T>(
        &mut self,
        name: &'static str,
    ) -> crate::error::ContainerResult<crate::container::AttributeHandleMut<'_, VolumeOrbit, T, C>>
    where
        T: Default + Copy + std::fmt::Debug + 'static,
    {
        self.volumes.get_attribute_mut::<VolumeOrbit, T>(name)
    }

    /// Remove the volume attribute column named `name`.
    pub fn remove_volume_attribute(&mut self, name: &'static str) {
        self.volumes.remove_attribute(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestMap = CMap3<32>;

    /// Builds two tetrahedron-like volumes, each a single triangular face glued shut with
    /// itself via φ₂ for simplicity (this crate manages only topology/embedding, not geometry,
    /// so a minimal two-face construction is enough to exercise φ₃ gluing), then φ₃-sews one
    /// face of each volume together.
    fn two_glued_volumes() -> (TestMap, Dart, Dart) {
        let mut m = TestMap::new();
        let f1 = m.add_face(3);
        let f2 = m.add_face(3);
        m.sew_volumes(f1, f2);
        (m, f1, f2)
    }

    #[test]
    fn sew_volumes_links_both_sides_under_phi3() {
        let (m, f1, f2) = two_glued_volumes();
        assert_eq!(m.darts.phi3(f1), f2);
        assert_eq!(m.darts.phi3(f2), f1);
    }

    #[test]
    fn sew_volumes_merges_the_glued_faces_into_one_cell() {
        let (mut m, f1, f2) = two_glued_volumes();
        assert_eq!(m.face_cell(f1), m.face_cell(f2));
    }

    #[test]
    fn sew_volumes_keeps_volumes_distinct() {
        let (mut m, f1, f2) = two_glued_volumes();
        assert_ne!(m.volume_cell(f1), m.volume_cell(f2));
    }

    #[test]
    fn sew_volumes_merges_corresponding_vertices() {
        let (mut m, f1, f2) = two_glued_volumes();
        assert_eq!(m.vertex_cell(f1), m.vertex_cell(f2));
    }

    #[test]
    fn unsew_volumes_restores_two_independent_faces() {
        let (mut m, f1, f2) = two_glued_volumes();
        let merged = m.face_cell(f1);
        let _ = merged;
        m.unsew_volumes(f1);
        assert!(m.darts.phi3(f1).is_null());
        assert!(m.darts.phi3(f2).is_null());
        assert_ne!(m.face_cell(f1), m.face_cell(f2));
    }

    #[test]
    fn codegree_and_is_triangle_are_unaffected_by_phi3() {
        let mut m = TestMap::new();
        let t = m.add_face(3);
        let face = m.face_cell(t);
        assert_eq!(m.codegree(face), 3);
        assert!(m.is_triangle(face));
    }

    #[test]
    fn foreach_volume_visits_one_representative_per_volume() {
        let (m, _, _) = two_glued_volumes();
        let mut count = 0;
        m.foreach_volume(|_| count += 1);
        assert_eq!(count, 2);
    }

    #[test]
    fn nb_cells_and_phi3_forwarding_agree_with_internal_wiring() {
        let (mut m, f1, f2) = two_glued_volumes();
        m.vertex_cell(f1);
        m.edge_cell(f1);
        m.face_cell(f1);
        m.volume_cell(f1);
        m.volume_cell(f2);
        assert_eq!(m.nb_darts(), 6);
        assert_eq!(m.nb_volumes(), 2);
        assert_eq!(m.phi3(f1), f2);
        assert_eq!(m.phi3(f2), f1);
    }

    #[test]
    fn volume_attribute_write_through_handle_is_visible_after_embedding() {
        let (mut m, f1, f2) = two_glued_volumes();
        let vol = m.volume_cell(f1);
        m.add_volume_attribute::<f64>("density").unwrap();
        {
            let mut h = m.get_volume_attribute_mut::<f64>("density").unwrap();
            h[vol] = 2.5;
        }
        let h = m.get_volume_attribute::<f64>("density").unwrap();
        assert_eq!(h[vol], 2.5);
        assert_ne!(vol, m.volume_cell(f2));
    }
}
