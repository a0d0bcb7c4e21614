//! Typed, orbit-tagged references into a column
//!
//! [`AttributeHandle`] and [`AttributeHandleMut`] are what [`ChunkArrayContainer::get_attribute`]
//! and [`get_attribute_mut`](ChunkArrayContainer::get_attribute_mut) return: a lightweight
//! borrow of one column plus the refcount column needed to skip free slots while iterating.

// ------ IMPORTS

use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

use super::chunk_array::ChunkArray;
use super::container::is_free;
use crate::key::Key;
use crate::orbit::{Cell, Orbit};

// ------ CONTENT

/// Read-only view of one column, scoped to the live slots of the container that owns it.
///
/// Borrows both the column and the owning container's refcount column; this is what makes
/// iteration see exactly the slots that were live when the handle was created and guarantees
/// (via the borrow checker) that no mutating operation on the container can run while the
/// handle is alive — a strictly stronger guarantee than the "not invalidated by unrelated
/// column changes" wording this type's contract is drawn from.
pub struct AttributeHandle<'c, O: Orbit, T, const C: usize> {
    column: &'c ChunkArray<T, C>,
    refcount: &'c ChunkArray<Key, C>,
    next_unused: Key,
    _orbit: PhantomData<O>,
}

impl<'c, O: Orbit, T, const C: usize> AttributeHandle<'c, O, T, C> {
    pub(super) fn new(
        column: &'c ChunkArray<T, C>,
        refcount: &'c ChunkArray<Key, C>,
        next_unused: Key,
    ) -> Self {
        Self { column, refcount, next_unused, _orbit: PhantomData }
    }

    /// Always `true`: a handle cannot outlive the column it borrows, so there is nothing left
    /// to invalidate. Kept as a method (rather than removed) to mirror the C++ original's
    /// `is_valid()` query at the call sites that still want to check it explicitly.
    #[must_use = "unused validity check"]
    pub fn is_valid(&self) -> bool {
        true
    }

    /// Iterate over every live slot's value, in ascending slot order.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        (0..self.next_unused).filter(|&i| !is_free(self.refcount[i])).map(|i| &self.column[i])
    }
}

impl<O: Orbit, T, const C: usize> Index<Key> for AttributeHandle<'_, O, T, C> {
    type Output = T;

    fn index(&self, slot: Key) -> &T {
        &self.column[slot]
    }
}

impl<O: Orbit, T, const C: usize> Index<Cell<O>> for AttributeHandle<'_, O, T, C> {
    type Output = T;

    fn index(&self, cell: Cell<O>) -> &T {
        &self.column[cell.slot()]
    }
}

/// Mutable view of one column, scoped to the live slots of the container that owns it.
///
/// See [`AttributeHandle`] for the shared-borrow counterpart; this one additionally exposes
/// [`set_all_container_values`](AttributeHandleMut::set_all_container_values) and mutable
/// iteration.
pub struct AttributeHandleMut<'c, O: Orbit, T, const C: usize> {
    column: &'c mut ChunkArray<T, C>,
    refcount: &'c ChunkArray<Key, C>,
    next_unused: Key,
    _orbit: PhantomData<O>,
}

impl<'c, O: Orbit, T, const C: usize> AttributeHandleMut<'c, O, T, C> {
    pub(super) fn new(
        column: &'c mut ChunkArray<T, C>,
        refcount: &'c ChunkArray<Key, C>,
        next_unused: Key,
    ) -> Self {
        Self { column, refcount, next_unused, _orbit: PhantomData }
    }

    /// See [`AttributeHandle::is_valid`].
    #[must_use = "unused validity check"]
    pub fn is_valid(&self) -> bool {
        true
    }

    /// Iterate over every live slot's value, in ascending slot order.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        (0..self.next_unused).filter(|&i| !is_free(self.refcount[i])).map(|i| &self.column[i])
    }

    /// Iterate mutably over every live slot's value, in ascending slot order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> + '_ {
        let refcount = self.refcount;
        let next_unused = self.next_unused;
        self.column
            .iter_mut()
            .filter(move |&(i, _)| i < next_unused && !is_free(refcount[i]))
            .map(|(_, v)| v)
    }
}

impl<T: Default + Copy + std::fmt::Debug, O: Orbit, const C: usize>
    AttributeHandleMut<'_, O, T, C>
where
    T: Copy,
{
    /// Write `v` to every live slot.
    pub fn set_all_container_values(&mut self, v: T)
    where
        T: Copy,
    {
        for slot in self.iter_mut() {
            *slot = v;
        }
    }
}

impl<O: Orbit, T, const C: usize> Index<Key> for AttributeHandleMut<'_, O, T, C> {
    type Output = T;

    fn index(&self, slot: Key) -> &T {
        &self.column[slot]
    }
}

impl<O: Orbit, T, const C: usize> IndexMut<Key> for AttributeHandleMut<'_, O, T, C> {
    fn index_mut(&mut self, slot: Key) -> &mut T {
        &mut self.column[slot]
    }
}

impl<O: Orbit, T, const C: usize> Index<Cell<O>> for AttributeHandleMut<'_, O, T, C> {
    type Output = T;

    fn index(&self, cell: Cell<O>) -> &T {
        &self.column[cell.slot()]
    }
}

impl<O: Orbit, T, const C: usize> IndexMut<Cell<O>> for AttributeHandleMut<'_, O, T, C> {
    fn index_mut(&mut self, cell: Cell<O>) -> &mut T {
        &mut self.column[cell.slot()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::container::ChunkArrayContainer;
    use crate::orbit::VertexOrbit;

    #[test]
    fn handle_iterates_only_live_slots_ascending() {
        let mut c: ChunkArrayContainer<32> = ChunkArrayContainer::new();
        c.add_attribute::<VertexOrbit, u32>("tag").unwrap();
        let a = c.insert_line();
        let b = c.insert_line();
        {
            let mut h = c.get_attribute_mut::<VertexOrbit, u32>("tag").unwrap();
            h[a] = 1;
            h[b] = 2;
        }
        c.remove_line(a);
        let h = c.get_attribute::<VertexOrbit, u32>("tag").unwrap();
        let values: Vec<u32> = h.iter().copied().collect();
        assert_eq!(values, vec![2]);
    }
}
