//! Scoped visited-sets for traversal
//!
//! [`DartMarker`] and [`CellMarker`] are RAII-scoped boolean columns used to track which
//! darts or cells a traversal has already visited. Both borrow their backing bit column from
//! a [`MarkerPool`] and return it, cleared, on drop, so that repeated traversals do not pay
//! for a fresh allocation every time.

// ------ IMPORTS

use std::cell::RefCell;
use std::marker::PhantomData;

use crate::container::{BoolChunkArray, DEFAULT_CHUNK_SIZE};
use crate::dart::Dart;
use crate::key::Key;
use crate::orbit::{Cell, Orbit};

// ------ CONTENT

/// Pool of recyclable bit columns, sized to the chunk width `C` of the container a marker is
/// acquired for.
///
/// Not thread-safe (matches §5: markers are a single-writer-thread resource), hence the plain
/// [`RefCell`] rather than a mutex — see [`crate::buffer_pool::BufferPool`] for the one
/// genuinely concurrent pool this crate has.
#[derive(Debug, Default)]
pub struct MarkerPool<const C: usize = DEFAULT_CHUNK_SIZE> {
    free: RefCell<Vec<BoolChunkArray<C>>>,
}

impl<const C: usize> MarkerPool<C> {
    /// Build an empty pool.
    #[must_use = "constructed object is not used, consider removing this call"]
    pub fn new() -> Self {
        Self { free: RefCell::new(Vec::new()) }
    }

    /// Hand out a bit column with at least `nb_chunks` chunks, either recycled or freshly
    /// allocated. The returned column is all-`false`.
    fn acquire(&self, nb_chunks: usize) -> BoolChunkArray<C> {
        let mut free = self.free.borrow_mut();
        let mut column = free.pop().unwrap_or_default();
        if column.nb_chunks() < nb_chunks {
            column.set_nb_chunks(nb_chunks);
        }
        column
    }

    /// Return a column to the pool, clearing it first so the next
    /// [`acquire`](MarkerPool::acquire) sees an all-`false` column.
    fn release(&self, mut column: BoolChunkArray<C>) {
        column.clear_all();
        self.free.borrow_mut().push(column);
    }
}

/// RAII-scoped visited-set over dart slots.
///
/// Acquires a bit column sized to the dart container's current chunk count when constructed;
/// releases it back to the owning [`MarkerPool`] (cleared) when dropped.
pub struct DartMarker<'m, const C: usize> {
    pool: &'m MarkerPool<C>,
    bits: Option<BoolChunkArray<C>>,
}

impl<'m, const C: usize> DartMarker<'m, C> {
    pub(crate) fn new(pool: &'m MarkerPool<C>, nb_chunks: usize) -> Self {
        Self { pool, bits: Some(pool.acquire(nb_chunks)) }
    }

    fn bits(&self) -> &BoolChunkArray<C> {
        self.bits.as_ref().expect("marker bits taken before drop")
    }

    fn bits_mut(&mut self) -> &mut BoolChunkArray<C> {
        self.bits.as_mut().expect("marker bits taken before drop")
    }

    /// Mark `d` as visited.
    pub fn mark(&mut self, d: Dart) {
        self.bits_mut().set_true(d.id());
    }

    /// Clear the visited flag on `d`.
    pub fn unmark(&mut self, d: Dart) {
        self.bits_mut().set_false(d.id());
    }

    /// Whether `d` has been marked.
    #[must_use = "unused boolean"]
    pub fn is_marked(&self, d: Dart) -> bool {
        let id = d.id();
        (id as usize) < self.bits().capacity() && self.bits().get(id)
    }
}

impl<const C: usize> Drop for DartMarker<'_, C> {
    fn drop(&mut self) {
        if let Some(bits) = self.bits.take() {
            self.pool.release(bits);
        }
    }
}

/// RAII-scoped visited-set over one orbit's cell slots.
pub struct CellMarker<'m, O: Orbit, const C: usize> {
    pool: &'m MarkerPool<C>,
    bits: Option<BoolChunkArray<C>>,
    _orbit: PhantomData<O>,
}

impl<'m, O: Orbit, const C: usize> CellMarker<'m, O, C> {
    pub(crate) fn new(pool: &'m MarkerPool<C>, nb_chunks: usize) -> Self {
        Self { pool, bits: Some(pool.acquire(nb_chunks)), _orbit: PhantomData }
    }

    fn bits(&self) -> &BoolChunkArray<C> {
        self.bits.as_ref().expect("marker bits taken before drop")
    }

    fn bits_mut(&mut self) -> &mut BoolChunkArray<C> {
        self.bits.as_mut().expect("marker bits taken before drop")
    }

    /// Mark `cell` as visited.
    pub fn mark(&mut self, cell: Cell<O>) {
        self.bits_mut().set_true(cell.slot());
    }

    /// Clear the visited flag on `cell`.
    pub fn unmark(&mut self, cell: Cell<O>) {
        self.bits_mut().set_false(cell.slot());
    }

    /// Whether `cell` has been marked.
    #[must_use = "unused boolean"]
    pub fn is_marked(&self, cell: Cell<O>) -> bool {
        let slot = cell.slot();
        (slot as usize) < self.bits().capacity() && self.bits().get(slot)
    }

    /// Mark a raw slot directly, for callers walking an orbit before a [`Cell`] has been
    /// minted for every dart in it.
    pub(crate) fn mark_slot(&mut self, slot: Key) {
        self.bits_mut().set_true(slot);
    }

    /// Whether the raw slot has been marked. See [`mark_slot`](CellMarker::mark_slot).
    #[must_use = "unused boolean"]
    pub(crate) fn is_slot_marked(&self, slot: Key) -> bool {
        (slot as usize) < self.bits().capacity() && self.bits().get(slot)
    }
}

impl<O: Orbit, const C: usize> Drop for CellMarker<'_, O, C> {
    fn drop(&mut self) {
        if let Some(bits) = self.bits.take() {
            self.pool.release(bits);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dart_marker_tracks_marks_within_scope() {
        let pool: MarkerPool<32> = MarkerPool::new();
        let mut marker = DartMarker::new(&pool, 2);
        let d = Dart::from(5);
        assert!(!marker.is_marked(d));
        marker.mark(d);
        assert!(marker.is_marked(d));
        marker.unmark(d);
        assert!(!marker.is_marked(d));
    }

    #[test]
    fn released_marker_bits_are_recycled_clean() {
        let pool: MarkerPool<32> = MarkerPool::new();
        {
            let mut marker = DartMarker::new(&pool, 1);
            marker.mark(Dart::from(3));
        }
        assert_eq!(pool.free.borrow().len(), 1);
        let marker = DartMarker::new(&pool, 1);
        assert!(!marker.is_marked(Dart::from(3)));
    }
}
