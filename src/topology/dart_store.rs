//! Dart slot lifecycle and φ-permutation storage
//!
//! [`DartStore`] is the distinguished container described in the crate's top-level
//! documentation: one [`ChunkArrayContainer`] for dart-slot lifecycle (refcounts, free list),
//! plus the four φ-image columns (φ₁, φ₁⁻¹, φ₂, φ₃) kept as plain fields rather than named
//! attributes, since their default-initialized value (`0`) would collide with a valid slot —
//! they need the null-dart fixed point instead, which `ChunkArrayContainer::add_attribute`
//! has no way to express. Per-orbit embedding columns (dart slot → cell slot) are allocated
//! lazily the first time an orbit is observed, matching §4.8 of the crate's embedding
//! management rules.

// ------ IMPORTS

use std::collections::VecDeque;
use std::io::{Read, Write};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::container::{read_u32, ChunkArray, ChunkArrayContainer, Column, DEFAULT_CHUNK_SIZE};
use crate::dart::{Dart, DartId, NULL_DART_ID};
use crate::error::PersistResult;
use crate::key::{Key, NULL_KEY};
use crate::markers::MarkerPool;

// ------ CONTENT

/// Owns dart-slot lifecycle and the φ-permutation columns shared by [`CMap1`](crate::CMap1),
/// [`CMap2`](crate::CMap2) and [`CMap3`](crate::CMap3).
///
/// `CMap1` only ever touches `phi1`/`phi1_inv`; `CMap2` additionally sews `phi2`; `CMap3`
/// additionally sews `phi3`. Carrying all four unconditionally (rather than making the 2D/3D
/// columns optional) mirrors the teacher lineage's fixed-width `betas` array, which always
/// reserves a slot per dimension regardless of which ones a given map actually links.
#[derive(Debug)]
pub struct DartStore<const C: usize = DEFAULT_CHUNK_SIZE> {
    container: ChunkArrayContainer<C>,
    phi1: ChunkArray<Key, C>,
    phi1_inv: ChunkArray<Key, C>,
    phi2: ChunkArray<Key, C>,
    phi3: ChunkArray<Key, C>,
    embeds: FxHashMap<&'static str, ChunkArray<Key, C>>,
    pool: MarkerPool<C>,
}

impl<const C: usize> Default for DartStore<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const C: usize> DartStore<C> {
    /// Build an empty dart store.
    #[must_use = "constructed object is not used, consider removing this call"]
    pub fn new() -> Self {
        Self {
            container: ChunkArrayContainer::new(),
            phi1: ChunkArray::new(),
            phi1_inv: ChunkArray::new(),
            phi2: ChunkArray::new(),
            phi3: ChunkArray::new(),
            embeds: FxHashMap::default(),
            pool: MarkerPool::new(),
        }
    }

    /// Number of chunks currently allocated, shared across every φ-image and embedding column.
    /// Used to size a freshly-acquired marker.
    #[must_use = "unused count"]
    pub(crate) fn nb_chunks(&self) -> usize {
        self.container.nb_chunks()
    }

    /// Number of live darts.
    #[must_use = "unused count"]
    pub fn nb_darts(&self) -> usize {
        self.container.nb_elements()
    }

    /// Whether `d` currently designates a live dart.
    #[must_use = "unused boolean"]
    pub fn is_live(&self, d: Dart) -> bool {
        self.container.is_live(d.id())
    }

    /// Ascending iterator over every live dart.
    pub fn iter_darts(&self) -> impl Iterator<Item = Dart> + '_ {
        self.container.iter_live().map(Dart::from)
    }

    /// The marker pool backing this store's [`DartMarker`](crate::markers::DartMarker) and
    /// [`CellMarker`](crate::markers::CellMarker) traversals.
    pub(crate) fn marker_pool(&self) -> &MarkerPool<C> {
        &self.pool
    }

    fn grow_aux(&mut self) {
        let n = self.container.nb_chunks();
        self.phi1.set_nb_chunks(n);
        self.phi1_inv.set_nb_chunks(n);
        self.phi2.set_nb_chunks(n);
        self.phi3.set_nb_chunks(n);
        for col in self.embeds.values_mut() {
            col.set_nb_chunks(n);
        }
    }

    fn init_dart_slot(&mut self, slot: Key) {
        self.phi1[slot] = NULL_DART_ID;
        self.phi1_inv[slot] = NULL_DART_ID;
        self.phi2[slot] = NULL_DART_ID;
        self.phi3[slot] = NULL_DART_ID;
        for col in self.embeds.values_mut() {
            col[slot] = NULL_KEY;
        }
    }

    /// Allocate one new, fully unsewn dart: every φ image is the null dart, every embedding
    /// is unset.
    pub fn new_dart(&mut self) -> Dart {
        let slot = self.container.insert_line();
        self.grow_aux();
        self.init_dart_slot(slot);
        Dart::from(slot)
    }

    /// Allocate `n` new, fully unsewn, contiguously-slotted darts; returns the first one.
    pub fn new_darts(&mut self, n: Key) -> Dart {
        let start = self.container.insert_lines(n);
        self.grow_aux();
        for offset in 0..n {
            self.init_dart_slot(start + offset);
        }
        Dart::from(start)
    }

    /// Free a dart slot.
    ///
    /// # Panics (debug only)
    ///
    /// Panics if `d` is still linked into any permutation; callers must unsew it from φ₁, φ₂
    /// and φ₃ first.
    pub fn delete_dart(&mut self, d: Dart) {
        debug_assert!(self.is_phi1_free(d), "delete_dart: {d:?} is still phi1-linked");
        debug_assert!(self.phi1_inv[d.id()] == NULL_DART_ID, "delete_dart: {d:?} still has a phi1 predecessor");
        debug_assert!(self.is_phi2_free(d), "delete_dart: {d:?} is still phi2-linked");
        debug_assert!(self.is_phi3_free(d), "delete_dart: {d:?} is still phi3-linked");
        self.container.remove_line(d.id());
    }

    // ------ permutation images

    /// φ₁(d): the next dart around `d`'s face, or [`Dart::NULL`] if `d` is φ₁-free.
    #[must_use = "unused dart"]
    pub fn phi1(&self, d: Dart) -> Dart {
        Dart::from(self.phi1[d.id()])
    }

    /// φ₁⁻¹(d): the previous dart around `d`'s face, or [`Dart::NULL`] if nothing points to
    /// `d` under φ₁.
    #[must_use = "unused dart"]
    pub fn phi_1(&self, d: Dart) -> Dart {
        Dart::from(self.phi1_inv[d.id()])
    }

    /// φ₂(d): the opposite dart across `d`'s edge, or [`Dart::NULL`] if `d` is a boundary
    /// (unsewn) edge side.
    #[must_use = "unused dart"]
    pub fn phi2(&self, d: Dart) -> Dart {
        Dart::from(self.phi2[d.id()])
    }

    /// φ₃(d): the opposite dart across `d`'s face, or [`Dart::NULL`] if `d` is a boundary
    /// face of its volume.
    #[must_use = "unused dart"]
    pub fn phi3(&self, d: Dart) -> Dart {
        Dart::from(self.phi3[d.id()])
    }

    /// Whether `d` has no φ₁ image (the face permutation is open at `d`).
    #[must_use = "unused boolean"]
    pub fn is_phi1_free(&self, d: Dart) -> bool {
        self.phi1[d.id()] == NULL_DART_ID
    }

    /// Whether `d` has no φ₂ image (the edge is a boundary).
    #[must_use = "unused boolean"]
    pub fn is_phi2_free(&self, d: Dart) -> bool {
        self.phi2[d.id()] == NULL_DART_ID
    }

    /// Whether `d` has no φ₃ image (the face is a boundary of its volume).
    #[must_use = "unused boolean"]
    pub fn is_phi3_free(&self, d: Dart) -> bool {
        self.phi3[d.id()] == NULL_DART_ID
    }

    /// Link `a` to `b` under φ₁: sets φ₁(a)=b and φ₁⁻¹(b)=a.
    ///
    /// # Panics (debug only)
    ///
    /// Panics unless `a` is φ₁-free and `b` has no existing φ₁ predecessor.
    pub fn phi1_sew(&mut self, a: Dart, b: Dart) {
        debug_assert!(self.is_phi1_free(a), "phi1_sew: {a:?} already has a phi1 image");
        debug_assert!(self.phi1_inv[b.id()] == NULL_DART_ID, "phi1_sew: {b:?} already has a phi1 predecessor");
        self.phi1[a.id()] = b.id();
        self.phi1_inv[b.id()] = a.id();
    }

    /// Undo a [`phi1_sew`](DartStore::phi1_sew): restores both `a` and its former image to
    /// φ₁-free.
    ///
    /// # Panics (debug only)
    ///
    /// Panics if `a` is already φ₁-free.
    pub fn phi1_unsew(&mut self, a: Dart) {
        let b = self.phi1(a);
        debug_assert!(!b.is_null(), "phi1_unsew: {a:?} is already phi1-free");
        self.phi1[a.id()] = NULL_DART_ID;
        self.phi1_inv[b.id()] = NULL_DART_ID;
    }

    /// Pair `a` and `b` under the φ₂ involution.
    ///
    /// # Panics (debug only)
    ///
    /// Panics unless both `a` and `b` are φ₂-free.
    pub fn phi2_sew(&mut self, a: Dart, b: Dart) {
        debug_assert!(self.is_phi2_free(a), "phi2_sew: {a:?} already has a phi2 image");
        debug_assert!(self.is_phi2_free(b), "phi2_sew: {b:?} already has a phi2 image");
        self.phi2[a.id()] = b.id();
        self.phi2[b.id()] = a.id();
    }

    /// Undo a [`phi2_sew`](DartStore::phi2_sew): restores both sides to φ₂-free.
    ///
    /// # Panics (debug only)
    ///
    /// Panics if `a` is already φ₂-free.
    pub fn phi2_unsew(&mut self, a: Dart) {
        let b = self.phi2(a);
        debug_assert!(!b.is_null(), "phi2_unsew: {a:?} is already phi2-free");
        self.phi2[a.id()] = NULL_DART_ID;
        self.phi2[b.id()] = NULL_DART_ID;
    }

    /// Pair `a` and `b` under the φ₃ involution.
    ///
    /// # Panics (debug only)
    ///
    /// Panics unless both `a` and `b` are φ₃-free.
    pub fn phi3_sew(&mut self, a: Dart, b: Dart) {
        debug_assert!(self.is_phi3_free(a), "phi3_sew: {a:?} already has a phi3 image");
        debug_assert!(self.is_phi3_free(b), "phi3_sew: {b:?} already has a phi3 image");
        self.phi3[a.id()] = b.id();
        self.phi3[b.id()] = a.id();
    }

    /// Undo a [`phi3_sew`](DartStore::phi3_sew): restores both sides to φ₃-free.
    ///
    /// # Panics (debug only)
    ///
    /// Panics if `a` is already φ₃-free.
    pub fn phi3_unsew(&mut self, a: Dart) {
        let b = self.phi3(a);
        debug_assert!(!b.is_null(), "phi3_unsew: {a:?} is already phi3-free");
        self.phi3[a.id()] = NULL_DART_ID;
        self.phi3[b.id()] = NULL_DART_ID;
    }

    // ------ embeddings

    fn embedding_column(&mut self, orbit_name: &'static str) -> &mut ChunkArray<Key, C> {
        if !self.embeds.contains_key(orbit_name) {
            let mut col: ChunkArray<Key, C> = ChunkArray::new();
            col.set_nb_chunks(self.container.nb_chunks());
            for slot in 0..self.container.capacity() as Key {
                col[slot] = NULL_KEY;
            }
            self.embeds.insert(orbit_name, col);
        }
        self.embeds.get_mut(orbit_name).expect("just inserted")
    }

    /// Read `d`'s current embedding slot for `orbit_name`, or `NULL_KEY` if the column has
    /// never been allocated or `d` has never been stamped.
    #[must_use = "unused embedding slot"]
    pub(crate) fn get_embedding(&self, orbit_name: &'static str, d: Dart) -> Key {
        self.embeds.get(orbit_name).map_or(NULL_KEY, |col| col[d.id()])
    }

    /// Stamp `d`'s embedding slot for `orbit_name`, allocating the column on first use.
    pub(crate) fn set_embedding(&mut self, orbit_name: &'static str, d: Dart, slot: Key) {
        self.embedding_column(orbit_name)[d.id()] = slot;
    }

    /// Resolve `d`'s embedding slot for `orbit_name`, lazily allocating a fresh one from
    /// `cells` and stamping every dart in `d`'s orbit the first time it is observed. This is
    /// the mechanism described for cell resolution: the orbit is walked once, on first
    /// access, and never again unless a later topology change invalidates the stamp (see
    /// [`reconcile_merge`](DartStore::reconcile_merge) /
    /// [`reconcile_split`](DartStore::reconcile_split)).
    pub(crate) fn resolve_embedding(
        &mut self,
        cells: &mut ChunkArrayContainer<C>,
        orbit_name: &'static str,
        gens: &[&dyn Fn(&Self, Dart) -> Dart],
        d: Dart,
    ) -> Key {
        let existing = self.get_embedding(orbit_name, d);
        if existing != NULL_KEY {
            return existing;
        }
        let orbit = self.orbit_closure(d, gens);
        let slot = cells.insert_line();
        for &od in &orbit {
            self.set_embedding(orbit_name, od, slot);
        }
        slot
    }

    /// Reconcile the embedding of `orbit_name` after a topology change has potentially
    /// *merged* two previously distinct orbits into the one now containing `seed`.
    ///
    /// Walks `seed`'s orbit under `gens`, collects every distinct already-embedded slot found
    /// among its darts, keeps the lowest-numbered one and restamps the whole orbit onto it,
    /// freeing the others in `cells`. If no dart in the orbit was embedded yet, this is a
    /// no-op: resolution stays lazy until [`resolve_embedding`](DartStore::resolve_embedding)
    /// is next called.
    pub(crate) fn reconcile_merge(
        &mut self,
        cells: &mut ChunkArrayContainer<C>,
        orbit_name: &'static str,
        gens: &[&dyn Fn(&Self, Dart) -> Dart],
        seed: Dart,
    ) {
        let orbit = self.orbit_closure(seed, gens);
        let mut slots: Vec<Key> = orbit
            .iter()
            .map(|&d| self.get_embedding(orbit_name, d))
            .filter(|&s| s != NULL_KEY)
            .collect();
        slots.sort_unstable();
        slots.dedup();
        let Some(&winner) = slots.first() else {
            return;
        };
        for &d in &orbit {
            self.set_embedding(orbit_name, d, winner);
        }
        for &loser in &slots[1..] {
            cells.remove_line(loser);
        }
    }

    /// Reconcile the embedding of `orbit_name` after a topology change may have *split* the
    /// orbit that used to contain both `a` and `b` into two.
    ///
    /// If `b` is still reachable from `a` under `gens`, nothing changed and this is a no-op.
    /// Otherwise, if the (now stale) shared slot was ever actually embedded, `a`'s side keeps
    /// it and `b`'s whole orbit is restamped onto a freshly allocated slot from `cells`.
    pub(crate) fn reconcile_split(
        &mut self,
        cells: &mut ChunkArrayContainer<C>,
        orbit_name: &'static str,
        gens: &[&dyn Fn(&Self, Dart) -> Dart],
        a: Dart,
        b: Dart,
    ) {
        let orbit_a = self.orbit_closure(a, gens);
        if orbit_a.iter().any(|&d| d.id() == b.id()) {
            return;
        }
        if self.get_embedding(orbit_name, a) == NULL_KEY {
            return;
        }
        let orbit_b = self.orbit_closure(b, gens);
        let new_slot = cells.insert_line();
        for &d in &orbit_b {
            self.set_embedding(orbit_name, d, new_slot);
        }
    }

    // ------ orbit traversal

    /// Generic breadth-first closure of `start` under the given generator set, returning
    /// every reached dart (`start` included) in discovery order. A generator returning
    /// [`Dart::NULL`] (a boundary step) is treated as a dead end, not a new dart.
    pub(crate) fn orbit_closure(
        &self,
        start: Dart,
        gens: &[&dyn Fn(&Self, Dart) -> Dart],
    ) -> Vec<Dart> {
        let mut seen: FxHashSet<DartId> = FxHashSet::default();
        let mut queue = VecDeque::new();
        let mut out = Vec::new();
        seen.insert(start.id());
        queue.push_back(start);
        out.push(start);
        while let Some(d) = queue.pop_front() {
            for gen in gens {
                let next = gen(self, d);
                if next.is_null() {
                    continue;
                }
                if seen.insert(next.id()) {
                    queue.push_back(next);
                    out.push(next);
                }
            }
        }
        out
    }

    // ------ persistence

    /// Serialize dart-slot lifecycle, the four φ-image columns, and every allocated embedding
    /// column, in that order.
    pub fn save(&self, writer: &mut dyn Write) -> PersistResult<()> {
        self.container.save(writer)?;
        let n = self.container.len();
        self.phi1.save(writer, n)?;
        self.phi1_inv.save(writer, n)?;
        self.phi2.save(writer, n)?;
        self.phi3.save(writer, n)?;

        let mut names: Vec<&'static str> = self.embeds.keys().copied().collect();
        names.sort_unstable();
        writer.write_all(&(names.len() as u32).to_le_bytes())?;
        for name in names {
            let bytes = name.as_bytes();
            writer.write_all(&(bytes.len() as u32).to_le_bytes())?;
            writer.write_all(bytes)?;
            self.embeds[name].save(writer, n)?;
        }
        Ok(())
    }

    /// Load a store previously written with [`save`](DartStore::save). Embedding columns are
    /// restored under the same names they were saved with.
    pub fn load(&mut self, reader: &mut dyn Read) -> PersistResult<()> {
        self.container.load(reader)?;
        self.phi1.load(reader)?;
        self.phi1_inv.load(reader)?;
        self.phi2.load(reader)?;
        self.phi3.load(reader)?;

        let nb_embeds = read_u32(reader)?;
        let mut embeds = FxHashMap::default();
        for _ in 0..nb_embeds {
            let len = read_u32(reader)? as usize;
            let mut buf = vec![0u8; len];
            reader.read_exact(&mut buf)?;
            let name: &'static str = Box::leak(String::from_utf8(buf)?.into_boxed_str());
            let mut col: ChunkArray<Key, C> = ChunkArray::new();
            col.load(reader)?;
            embeds.insert(name, col);
        }
        self.embeds = embeds;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestStore = DartStore<32>;

    #[test]
    fn new_dart_is_fully_unsewn() {
        let mut s = TestStore::new();
        let d = s.new_dart();
        assert!(s.is_live(d));
        assert!(s.phi1(d).is_null());
        assert!(s.phi2(d).is_null());
        assert!(s.phi3(d).is_null());
    }

    #[test]
    fn phi1_sew_links_both_directions() {
        let mut s = TestStore::new();
        let a = s.new_dart();
        let b = s.new_dart();
        s.phi1_sew(a, b);
        assert_eq!(s.phi1(a), b);
        assert_eq!(s.phi_1(b), a);
        s.phi1_unsew(a);
        assert!(s.phi1(a).is_null());
        assert!(s.phi_1(b).is_null());
    }

    #[test]
    fn phi2_sew_is_an_involution() {
        let mut s = TestStore::new();
        let a = s.new_dart();
        let b = s.new_dart();
        s.phi2_sew(a, b);
        assert_eq!(s.phi2(a), b);
        assert_eq!(s.phi2(b), a);
        s.phi2_unsew(a);
        assert!(s.phi2(a).is_null());
        assert!(s.phi2(b).is_null());
    }

    #[test]
    fn new_darts_allocates_a_contiguous_run() {
        let mut s = TestStore::new();
        let start = s.new_darts(5);
        for offset in 0..5 {
            assert!(s.is_live(Dart::from(start.id() + offset)));
        }
        assert_eq!(s.nb_darts(), 5);
    }

    #[test]
    fn embedding_round_trips_and_defaults_to_null() {
        let mut s = TestStore::new();
        let d = s.new_dart();
        assert_eq!(s.get_embedding("vertex", d), NULL_KEY);
        s.set_embedding("vertex", d, 7);
        assert_eq!(s.get_embedding("vertex", d), 7);
    }

    #[test]
    fn orbit_closure_follows_generators_until_null() {
        let mut s = TestStore::new();
        let a = s.new_dart();
        let b = s.new_dart();
        let c = s.new_dart();
        s.phi1_sew(a, b);
        s.phi1_sew(b, c);
        s.phi1_sew(c, a);
        let gens: Vec<&dyn Fn(&TestStore, Dart) -> Dart> = vec![&|s: &TestStore, d| s.phi1(d)];
        let mut closure = s.orbit_closure(a, &gens);
        closure.sort_by_key(Dart::id);
        let mut expected = vec![a, b, c];
        expected.sort_by_key(Dart::id);
        assert_eq!(closure, expected);
    }

    #[test]
    fn resolve_embedding_stamps_the_whole_orbit_once() {
        let mut s = TestStore::new();
        let mut cells: ChunkArrayContainer<32> = ChunkArrayContainer::new();
        let a = s.new_dart();
        let b = s.new_dart();
        s.phi1_sew(a, b);
        s.phi1_sew(b, a);
        let gens: Vec<&dyn Fn(&TestStore, Dart) -> Dart> = vec![&|s: &TestStore, d| s.phi1(d)];
        let slot = s.resolve_embedding(&mut cells, "face", &gens, a);
        assert_eq!(s.get_embedding("face", b), slot);
        assert_eq!(s.resolve_embedding(&mut cells, "face", &gens, b), slot);
    }

    #[test]
    fn reconcile_merge_keeps_lowest_slot_and_frees_the_rest() {
        let mut s = TestStore::new();
        let mut cells: ChunkArrayContainer<32> = ChunkArrayContainer::new();
        let a = s.new_dart();
        let b = s.new_dart();
        let slot_a = cells.insert_line();
        let slot_b = cells.insert_line();
        s.set_embedding("vertex", a, slot_a);
        s.set_embedding("vertex", b, slot_b);
        s.phi2_sew(a, b);
        let gens: Vec<&dyn Fn(&TestStore, Dart) -> Dart> = vec![&|s: &TestStore, d| s.phi2(d)];
        s.reconcile_merge(&mut cells, "vertex", &gens, a);
        assert_eq!(s.get_embedding("vertex", a), slot_a);
        assert_eq!(s.get_embedding("vertex", b), slot_a);
        assert!(!cells.is_live(slot_b));
    }

    #[test]
    fn reconcile_split_allocates_a_fresh_slot_for_the_detached_side() {
        let mut s = TestStore::new();
        let mut cells: ChunkArrayContainer<32> = ChunkArrayContainer::new();
        let a = s.new_dart();
        let b = s.new_dart();
        s.phi2_sew(a, b);
        let gens: Vec<&dyn Fn(&TestStore, Dart) -> Dart> = vec![&|s: &TestStore, d| s.phi2(d)];
        let shared = s.resolve_embedding(&mut cells, "vertex", &gens, a);
        s.phi2_unsew(a);
        s.reconcile_split(&mut cells, "vertex", &gens, a, b);
        assert_eq!(s.get_embedding("vertex", a), shared);
        assert_ne!(s.get_embedding("vertex", b), shared);
        assert_ne!(s.get_embedding("vertex", b), NULL_KEY);
    }
}
