//! 2-dimensional combinatorial map
//!
//! `CMap2` extends the φ₁-only face permutation of [`crate::CMap1`] with the φ₂ edge
//! involution: sewing two boundary darts together ([`CMap2::sew_faces`]) glues two open face
//! edges into one shared edge, merging the vertex and edge orbits the sewn darts belong to;
//! [`CMap2::unsew_faces`] undoes it, splitting embeddings back apart when the topology
//! actually disconnects.

// ------ IMPORTS

use crate::container::{ChunkArrayContainer, DEFAULT_CHUNK_SIZE};
use crate::dart::Dart;
use crate::key::{Key, NULL_KEY};
use crate::markers::DartMarker;
use crate::orbit::{Cell, EdgeOrbit, FaceOrbit, Orbit, VertexOrbit, VolumeOrbit};
use crate::topology::DartStore;

// ------ CONTENT

type Gen<const C: usize> = dyn Fn(&DartStore<C>, Dart) -> Dart;

fn vertex_gens<const C: usize>() -> [&'static Gen<C>; 2] {
    // Both generators compose two φ-images; the boundary case (the first image is free, i.e.
    // `Dart::NULL`) must short-circuit rather than feed `Dart::NULL` into the second φ, which
    // has no live slot to look up.
    [
        &|s: &DartStore<C>, x: Dart| {
            let m = s.phi2(x);
            if m.is_null() { Dart::NULL } else { s.phi1(m) }
        },
        &|s: &DartStore<C>, x: Dart| {
            let m = s.phi_1(x);
            if m.is_null() { Dart::NULL } else { s.phi2(m) }
        },
    ]
}

fn edge_gens<const C: usize>() -> [&'static Gen<C>; 1] {
    [&|s: &DartStore<C>, x: Dart| s.phi2(x)]
}

fn face_gens<const C: usize>() -> [&'static Gen<C>; 2] {
    [&|s: &DartStore<C>, x: Dart| s.phi1(x), &|s: &DartStore<C>, x: Dart| s.phi_1(x)]
}

/// Connected-component orbit: in a 2-map this stands in for "volume" per the crate's cell
/// taxonomy, since there is no genuine bounded 3-cell until [`crate::CMap3`].
fn volume_gens<const C: usize>() -> [&'static Gen<C>; 3] {
    [
        &|s: &DartStore<C>, x: Dart| s.phi1(x),
        &|s: &DartStore<C>, x: Dart| s.phi_1(x),
        &|s: &DartStore<C>, x: Dart| s.phi2(x),
    ]
}

/// A 2-dimensional combinatorial map: darts, the φ₁ face permutation and the φ₂ edge
/// involution, plus lazily-allocated vertex/edge/face/volume cell containers.
#[derive(Debug)]
pub struct CMap2<const C: usize = DEFAULT_CHUNK_SIZE> {
    darts: DartStore<C>,
    vertices: ChunkArrayContainer<C>,
    edges: ChunkArrayContainer<C>,
    faces: ChunkArrayContainer<C>,
    volumes: ChunkArrayContainer<C>,
}

impl<const C: usize> Default for CMap2<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const C: usize> CMap2<C> {
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
    /// dart φ₂-free), and return one dart of it.
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

    /// φ₂-sew two boundary darts together.
    ///
    /// Updates vertex and edge embeddings so that the orbits `d` and `e` now belong to share a
    /// slot: the lowest-numbered of any slots the merged orbit already carried wins, the
    /// others are freed.
    ///
    /// # Panics (debug only)
    ///
    /// Panics unless both `d` and `e` are φ₂-free (see [`DartStore::phi2_sew`]).
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

    /// Undo a [`sew_faces`](CMap2::sew_faces): φ₂-unsew `d` from its partner.
    ///
    /// If the unsewn darts now lie in distinct orbits, the detached side is restamped onto a
    /// freshly allocated slot; otherwise (the map was still connected some other way) the
    /// existing embedding is left untouched.
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

        // The edge orbit (<phi2> alone) always splits into two singletons once phi2 clears.
        if edge_slot_before != NULL_KEY {
            let new_slot = self.edges.insert_line();
            self.darts.set_embedding(EdgeOrbit::NAME, e, new_slot);
        }

        let vol_gens = volume_gens::<C>();
        self.darts.reconcile_split(&mut self.volumes, VolumeOrbit::NAME, &vol_gens, d, e);
    }

    /// The vertex cell at the tail of `d`, lazily resolving its embedding slot.
    pub fn vertex_cell(&mut self, d: Dart) -> Cell<VertexOrbit> {
        let gens = vertex_gens::<C>();
        let slot = self.darts.resolve_embedding(&mut self.vertices, VertexOrbit::NAME, &gens, d);
        Cell::new(slot, d)
    }

    /// The edge cell containing `d` (itself and its φ₂ partner, if any).
    pub fn edge_cell(&mut self, d: Dart) -> Cell<EdgeOrbit> {
        let gens = edge_gens::<C>();
        let slot = self.darts.resolve_embedding(&mut self.edges, EdgeOrbit::NAME, &gens, d);
        Cell::new(slot, d)
    }

    /// The face cell containing `d` (its whole φ₁-cycle).
    pub fn face_cell(&mut self, d: Dart) -> Cell<FaceOrbit> {
        let gens = face_gens::<C>();
        let slot = self.darts.resolve_embedding(&mut self.faces, FaceOrbit::NAME, &gens, d);
        Cell::new(slot, d)
    }

    /// The connected-component cell containing `d`.
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

    /// Number of live connected-component cells.
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

    /// Bind a new attribute column named `name` to the edge container.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ContainerError::NameInUse`] if the name is already taken.
    pub fn add_edge_attribute<T>(&mut self, name: &'static str) -> crate::error::ContainerResult<()>
    where
        T: Default + Copy + std::fmt::Debug + Send + Sync + 'static,
    {
        self.edges.add_attribute::<EdgeOrbit, T>(name)
    }

    /// Fetch a read-only handle to the edge attribute column named `name`.
    pub fn get_edge_attribute<T>(
        &self,
        name: &'static str,
    ) -> crate::error::ContainerResult<crate::container::AttributeHandle<'_, EdgeOrbit, T, C>>
    where
        T: Default + Copy + std::fmt::Debug + 'static,
    {
        self.edges.get_attribute::<EdgeOrbit, T>(name)
    }

    /// Fetch a mutable handle to the edge attribute column named `name`.
    pub fn get_edge_attribute_mut<T>(
        &mut self,
        name: &'static str,
    ) -> crate::error::ContainerResult<crate::container::AttributeHandleMut<'_, EdgeOrbit, T, C>>
    where
        T: Default + Copy + std::fmt::Debug + 'static,
    {
        self.edges.get_attribute_mut::<EdgeOrbit, T>(name)
    }

    /// Remove the edge attribute column named `name`.
    pub fn remove_edge_attribute(&mut self, name: &'static str) {
        self.edges.remove_attribute(name);
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

    type TestMap = CMap2<32>;

    /// Builds two triangles sharing one edge, gluing `t1`'s dart 2 to `t2`'s dart 0 — the
    /// same square-from-two-triangles construction used throughout this crate's grounding
    /// corpus, minus geometry (no coordinates are attached; this crate only manages
    /// topology and embedding indices).
    fn two_glued_triangles() -> (TestMap, Dart, Dart) {
        let mut m = TestMap::new();
        let t1 = m.add_face(3);
        let t1_1 = m.darts.phi1(t1);
        let t1_2 = m.darts.phi1(t1_1);
        let t2 = m.add_face(3);
        let t2_1 = m.darts.phi1(t2);
        m.sew_faces(t1_2, t2);
        let _ = t1_1;
        (m, t1, t2_1)
    }

    #[test]
    fn sew_faces_links_both_sides_under_phi2() {
        let (m, t1, _) = two_glued_triangles();
        let t1_2 = m.darts.phi1(m.darts.phi1(t1));
        assert!(!m.darts.phi2(t1_2).is_null());
    }

    #[test]
    fn two_glued_triangles_form_four_vertices_and_five_edges() {
        let (mut m, t1, t2_1) = two_glued_triangles();
        let mut vertex_slots: Vec<Key> = Vec::new();
        let mut cur = t1;
        for _ in 0..3 {
            vertex_slots.push(m.vertex_cell(cur).slot());
            cur = m.darts.phi1(cur);
        }
        let mut cur = t2_1;
        for _ in 0..3 {
            vertex_slots.push(m.vertex_cell(cur).slot());
            cur = m.darts.phi1(cur);
        }
        vertex_slots.sort_unstable();
        vertex_slots.dedup();
        assert_eq!(vertex_slots.len(), 4);

        let mut edge_slots: Vec<Key> = Vec::new();
        let mut cur = t1;
        for _ in 0..3 {
            edge_slots.push(m.edge_cell(cur).slot());
            cur = m.darts.phi1(cur);
        }
        let mut cur = t2_1;
        for _ in 0..3 {
            edge_slots.push(m.edge_cell(cur).slot());
            cur = m.darts.phi1(cur);
        }
        edge_slots.sort_unstable();
        edge_slots.dedup();
        assert_eq!(edge_slots.len(), 5);

        m.face_cell(t1);
        m.face_cell(t2_1);
        assert_eq!(m.nb_vertices(), 4);
        assert_eq!(m.nb_edges(), 5);
        assert_eq!(m.nb_faces(), 2);
        assert_eq!(m.nb_darts(), 6);
    }

    #[test]
    fn public_phi_accessors_match_internal_wiring() {
        let mut m = TestMap::new();
        let t1 = m.add_face(3);
        assert_eq!(m.phi1(t1), m.darts.phi1(t1));
        assert_eq!(m.phi_1(m.phi1(t1)), t1);
        assert!(m.phi2(t1).is_null());
    }

    #[test]
    fn unsew_restores_two_independent_faces() {
        let (mut m, t1, _) = two_glued_triangles();
        let t1_2 = m.darts.phi1(m.darts.phi1(t1));
        let e = m.edge_cell(t1_2);
        let _ = e;
        m.unsew_faces(t1_2);
        assert!(m.darts.phi2(t1_2).is_null());
    }

    #[test]
    fn codegree_and_is_triangle() {
        let mut m = TestMap::new();
        let t = m.add_face(3);
        let q = m.add_face(4);
        let tf = m.face_cell(t);
        let qf = m.face_cell(q);
        assert_eq!(m.codegree(tf), 3);
        assert!(m.is_triangle(tf));
        assert_eq!(m.codegree(qf), 4);
        assert!(!m.is_triangle(qf));
    }

    #[test]
    fn foreach_incident_vertex_visits_codegree_many_vertices() {
        let mut m = TestMap::new();
        let t = m.add_face(3);
        let face = m.face_cell(t);
        let mut count = 0;
        m.foreach_incident_vertex(face, |_| count += 1);
        assert_eq!(count, 3);
    }

    #[test]
    fn attribute_write_through_handle_is_visible_after_embedding() {
        let mut m = TestMap::new();
        let t = m.add_face(3);
        let v = m.vertex_cell(t);
        m.vertices.add_attribute::<VertexOrbit, f64>("weight").unwrap();
        {
            let mut h = m.vertices.get_attribute_mut::<VertexOrbit, f64>("weight").unwrap();
            h[v] = 4.5;
        }
        let h = m.vertices.get_attribute::<VertexOrbit, f64>("weight").unwrap();
        assert_eq!(h[v], 4.5);
    }
}
